// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::time::Duration;

use serde::Deserialize;

use super::{parse_duration, ConfigError};

/// Roughly one camera frame at 30 fps.
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// A YAML representation of the tracking configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Tracking {
    /// How often recorded frames are replayed, e.g. "33ms".
    frame_interval: Option<String>,
}

impl Tracking {
    /// Returns the frame interval from the configuration.
    pub fn frame_interval(&self) -> Result<Duration, ConfigError> {
        match &self.frame_interval {
            Some(frame_interval) => parse_duration(frame_interval),
            None => Ok(DEFAULT_FRAME_INTERVAL),
        }
    }
}

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
use serde::Deserialize;

use crate::gesture::{Classifier, Viewport};

/// A YAML representation of the gesture classifier configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Gesture {
    /// Width of the screen cursors are reported in (default: 1280)
    width: Option<f32>,

    /// Height of the screen cursors are reported in (default: 720)
    height: Option<f32>,

    /// Angle in degrees a held key must straighten past to release. Unset keeps
    /// classification stateless.
    release_threshold: Option<f32>,
}

impl Gesture {
    /// Returns the cursor viewport.
    pub fn viewport(&self) -> Viewport {
        let default = Viewport::default();
        Viewport {
            width: self.width.unwrap_or(default.width),
            height: self.height.unwrap_or(default.height),
        }
    }

    pub fn release_threshold(&self) -> Option<f32> {
        self.release_threshold
    }

    /// Builds a classifier from this configuration.
    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.viewport()).with_release_threshold(self.release_threshold)
    }
}

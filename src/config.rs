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
use std::path::Path;
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

mod audio;
mod error;
mod gesture;
mod song;
mod tracking;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::gesture::Gesture;
pub use self::song::{Song, Step};
pub use self::tracking::Tracking;

/// Prefix for environment overrides, e.g. AIRPIANO__AUDIO__DEVICE.
const ENV_PREFIX: &str = "AIRPIANO";

/// The top level YAML configuration. Every section is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    audio: Audio,
    #[serde(default)]
    gesture: Gesture,
    #[serde(default)]
    tracking: Tracking,
}

impl Config {
    /// Loads the configuration from an optional YAML file, then applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        Ok(builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<Config>()?)
    }

    /// Parses a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Config, ConfigError> {
        Ok(::config::Config::builder()
            .add_source(::config::File::from_str(
                yaml,
                ::config::FileFormat::Yaml,
            ))
            .build()?
            .try_deserialize::<Config>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn tracking(&self) -> &Tracking {
        &self.tracking
    }

    /// Overrides the audio device, e.g. from the command line.
    pub fn with_device(mut self, device: Option<String>) -> Config {
        self.audio = self.audio.with_device(device);
        self
    }
}

/// Parses a human duration such as "500ms" or "1s".
pub(crate) fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    Ok(DurationString::from_string(value.to_string())
        .map_err(|reason| ConfigError::Duration {
            value: value.to_string(),
            reason: reason.to_string(),
        })?
        .into())
}

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
use std::{fs, path::Path, time::Duration};

use config::{Config, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{parse_duration, ConfigError};

/// A YAML representation of a song.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Song {
    /// The name of the song.
    name: String,
    /// The notes, in order.
    steps: Vec<Step>,
}

/// A YAML representation of one note of a song.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Step {
    /// The note name, e.g. "C4". Used to look up the frequency when none is given.
    note: String,
    /// The frequency in Hz. Overrides the note lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frequency: Option<f32>,
    /// The gap before the next note, e.g. "500ms".
    delay: String,
}

impl Song {
    /// Creates a new song configuration.
    pub fn new(name: &str, steps: Vec<Step>) -> Song {
        Song {
            name: name.to_string(),
            steps,
        }
    }

    /// Deserializes a file from the path into a song configuration struct.
    pub fn deserialize(path: &Path) -> Result<Song, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Song>()?)
    }

    /// Serialize and save a song configuration struct to a file at given path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let serialized = serde_yml::to_string(self)?;
        debug!(path = %path.display(), "Saving song");
        fs::write(path, serialized)?;
        Ok(())
    }

    /// Gets the name of the song.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the steps of the song.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl Step {
    pub fn new(note: &str, frequency: Option<f32>, delay: &str) -> Step {
        Step {
            note: note.to_string(),
            frequency,
            delay: delay.to_string(),
        }
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn frequency(&self) -> Option<f32> {
        self.frequency
    }

    /// Returns the parsed delay.
    pub fn delay(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.delay)
    }
}

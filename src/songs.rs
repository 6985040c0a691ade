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
use std::{fmt, path::Path, time::Duration};

use thiserror::Error;
use tracing::info;

use crate::config::{self, ConfigError};
use crate::keys::key_by_note;
use crate::sequencer::{SequenceStep, SEQUENCE_NOTE_DURATION};

#[derive(Debug, Error)]
pub enum SongError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("song {song}: step {step} names unknown note {note:?} and has no frequency")]
    UnknownNote {
        song: String,
        step: usize,
        note: String,
    },

    #[error("song {song}: step {step} has invalid frequency {frequency}")]
    InvalidFrequency {
        song: String,
        step: usize,
        frequency: f32,
    },

    #[error("song {0} has no steps")]
    Empty(String),
}

/// A named list of steps the sequencer can play.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    name: String,
    steps: Vec<SequenceStep>,
}

impl Song {
    pub fn new(name: &str, steps: Vec<SequenceStep>) -> Song {
        Song {
            name: name.to_string(),
            steps,
        }
    }

    /// Loads and validates a song file.
    pub fn load(path: &Path) -> Result<Song, SongError> {
        let song = Song::from_config(&config::Song::deserialize(path)?)?;
        info!(
            song = song.name,
            steps = song.steps.len(),
            path = %path.display(),
            "Loaded song."
        );
        Ok(song)
    }

    /// Resolves a song configuration. Steps without a frequency take it from the key
    /// layout by note name.
    pub fn from_config(config: &config::Song) -> Result<Song, SongError> {
        let name = config.name();
        if config.steps().is_empty() {
            return Err(SongError::Empty(name.to_string()));
        }

        let steps = config
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let frequency = match step.frequency() {
                    Some(frequency) => frequency,
                    None => match key_by_note(step.note()) {
                        Some((_, key)) => key.frequency,
                        None => {
                            return Err(SongError::UnknownNote {
                                song: name.to_string(),
                                step: index + 1,
                                note: step.note().to_string(),
                            })
                        }
                    },
                };
                if !frequency.is_finite() || frequency <= 0.0 {
                    return Err(SongError::InvalidFrequency {
                        song: name.to_string(),
                        step: index + 1,
                        frequency,
                    });
                }

                let delay_ms = step.delay()?.as_millis() as u64;
                Ok(SequenceStep::new(frequency, delay_ms, step.note()))
            })
            .collect::<Result<Vec<SequenceStep>, SongError>>()?;

        Ok(Song::new(name, steps))
    }

    /// Converts the song back into its file representation.
    pub fn to_config(&self) -> config::Song {
        config::Song::new(
            &self.name,
            self.steps
                .iter()
                .map(|step| {
                    let frequency = match key_by_note(&step.note) {
                        Some((_, key)) if key.frequency == step.frequency => None,
                        _ => Some(step.frequency),
                    };
                    config::Step::new(&step.note, frequency, &format!("{}ms", step.delay_ms))
                })
                .collect(),
        )
    }

    /// Gets the name of the song.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    /// Time from the first note until the last one finishes sounding.
    pub fn duration(&self) -> Duration {
        match self.steps.split_last() {
            Some((_, leading)) => {
                let offset: u64 = leading.iter().map(|step| step.delay_ms).sum();
                Duration::from_millis(offset) + SEQUENCE_NOTE_DURATION
            }
            None => Duration::ZERO,
        }
    }

    /// Gets the duration of the song as a human readable string.
    pub fn duration_string(&self) -> String {
        let duration = self.duration();
        format!("{}.{:03}s", duration.as_secs(), duration.subsec_millis())
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} notes, {})",
            self.name,
            self.steps.len(),
            self.duration_string()
        )
    }
}

fn steps(notes: &[(f32, u64, &str)]) -> Vec<SequenceStep> {
    notes
        .iter()
        .map(|(frequency, delay_ms, note)| SequenceStep::new(*frequency, *delay_ms, note))
        .collect()
}

/// The songs that ship with the instrument.
pub fn builtin_songs() -> Vec<Song> {
    vec![
        Song::new(
            "Twinkle Twinkle",
            steps(&[
                (261.63, 500, "C4"),
                (261.63, 500, "C4"),
                (392.00, 500, "G4"),
                (392.00, 500, "G4"),
                (440.00, 500, "A4"),
                (440.00, 500, "A4"),
                (392.00, 1000, "G4"),
                (349.23, 500, "F4"),
                (349.23, 500, "F4"),
                (329.63, 500, "E4"),
                (329.63, 500, "E4"),
                (293.66, 500, "D4"),
                (293.66, 500, "D4"),
                (261.63, 1000, "C4"),
            ]),
        ),
        Song::new(
            "Ode to Joy",
            steps(&[
                (329.63, 400, "E4"),
                (329.63, 400, "E4"),
                (349.23, 400, "F4"),
                (392.00, 400, "G4"),
                (392.00, 400, "G4"),
                (349.23, 400, "F4"),
                (329.63, 400, "E4"),
                (293.66, 400, "D4"),
                (261.63, 400, "C4"),
                (261.63, 400, "C4"),
                (293.66, 400, "D4"),
                (329.63, 400, "E4"),
                (329.63, 600, "E4"),
                (293.66, 200, "D4"),
                (293.66, 800, "D4"),
            ]),
        ),
        Song::new(
            "Für Elise (Excerpt)",
            steps(&[
                (329.63, 300, "E4"),
                (493.88, 300, "B4"),
                (329.63, 300, "E4"),
                (493.88, 300, "B4"),
                (329.63, 300, "E4"),
                (493.88, 300, "B4"),
                (329.63, 300, "E4"),
                (440.00, 300, "A4"),
                (329.63, 600, "E4"),
            ]),
        ),
    ]
}

/// Finds a song by name, ignoring case.
pub fn find_song<'a>(songs: &'a [Song], name: &str) -> Option<&'a Song> {
    songs
        .iter()
        .find(|song| song.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fs};

    use super::*;

    #[test]
    fn test_builtin_songs() {
        let songs = builtin_songs();
        let names: Vec<&str> = songs.iter().map(|song| song.name()).collect();
        assert_eq!(
            names,
            vec!["Twinkle Twinkle", "Ode to Joy", "Für Elise (Excerpt)"]
        );
        assert_eq!(songs[0].steps().len(), 14);
        assert_eq!(songs[1].steps().len(), 15);
        assert_eq!(songs[2].steps().len(), 9);

        // Every built-in note is on the keyboard at its layout frequency.
        for song in &songs {
            for step in song.steps() {
                let (_, key) = key_by_note(&step.note).expect("note on the keyboard");
                assert_eq!(key.frequency, step.frequency, "{}", step.note);
            }
        }
    }

    #[test]
    fn test_duration() {
        let song = Song::new(
            "short",
            vec![
                SequenceStep::new(261.63, 500, "C4"),
                SequenceStep::new(293.66, 250, "D4"),
            ],
        );
        assert_eq!(song.duration(), Duration::from_millis(1300));
        assert_eq!(song.duration_string(), "1.300s");
        assert_eq!(Song::new("empty", Vec::new()).duration(), Duration::ZERO);
    }

    #[test]
    fn test_find_song() {
        let songs = builtin_songs();
        assert_eq!(
            find_song(&songs, "ode to joy").map(|song| song.name()),
            Some("Ode to Joy")
        );
        assert!(find_song(&songs, "Moonlight Sonata").is_none());
    }

    #[test]
    fn test_load_song_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scale.yaml");
        fs::write(
            &path,
            r#"
name: Scale
steps:
  - note: C4
    delay: 250ms
  - note: D4
    delay: 250ms
  - note: Bb4
    frequency: 466.16
    delay: 1s
"#,
        )?;

        let song = Song::load(&path)?;
        assert_eq!(song.name(), "Scale");
        assert_eq!(
            &song.steps()[..2],
            &[
                SequenceStep::new(261.63, 250, "C4"),
                SequenceStep::new(293.66, 250, "D4"),
            ]
        );
        let last = &song.steps()[2];
        assert_eq!(last.note, "Bb4");
        assert_eq!(last.delay_ms, 1000);
        assert!((last.frequency - 466.16).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn test_unknown_note_is_rejected() {
        let config = config::Song::new("bad", vec![config::Step::new("H9", None, "100ms")]);
        assert!(matches!(
            Song::from_config(&config),
            Err(SongError::UnknownNote { step: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_frequency_is_rejected() {
        let config = config::Song::new("bad", vec![config::Step::new("C4", Some(-1.0), "100ms")]);
        assert!(matches!(
            Song::from_config(&config),
            Err(SongError::InvalidFrequency { .. })
        ));
    }

    #[test]
    fn test_bad_delay_is_rejected() {
        let config = config::Song::new("bad", vec![config::Step::new("C4", None, "later")]);
        assert!(matches!(
            Song::from_config(&config),
            Err(SongError::Config(ConfigError::Duration { .. }))
        ));
    }

    #[test]
    fn test_empty_song_is_rejected() {
        let config = config::Song::new("nothing", Vec::new());
        assert!(matches!(
            Song::from_config(&config),
            Err(SongError::Empty(_))
        ));
    }

    #[test]
    fn test_save_and_reload() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ode.yaml");
        let songs = builtin_songs();
        songs[1].to_config().save(&path)?;

        let reloaded = Song::load(&path)?;
        assert_eq!(reloaded, songs[1]);
        Ok(())
    }
}

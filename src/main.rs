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
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use airpiano::audio;
use airpiano::config::Config;
use airpiano::engine::{Engine, DEFAULT_NOTE_DURATION};
use airpiano::render;
use airpiano::sequencer::{Sequencer, SEQUENCE_NOTE_DURATION};
use airpiano::songs::{builtin_songs, find_song, Song};
use airpiano::synth::voice::RECLAIM_MARGIN;
use airpiano::tracking::{FrameLoop, RecordedTracker};
use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "An air piano played with hand gestures."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the built-in songs.
    Songs {
        /// Writes each built-in song as a YAML file into this directory.
        #[arg[short, long]]
        export: Option<PathBuf>,
    },
    /// Plays a song through the audio interface.
    Play {
        /// The name of a built-in song or the path to a song file.
        song: String,
        /// The path to the config file.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// The device name to play through. Overrides the config.
        #[arg[short, long]]
        device: Option<String>,
    },
    /// Renders a song to a WAV file without an audio device.
    Render {
        /// The name of a built-in song or the path to a song file.
        song: String,
        /// The WAV file to write.
        output: PathBuf,
        /// The sample rate of the WAV file.
        #[arg[short, long, default_value_t = 44100]]
        sample_rate: u32,
    },
    /// Plays a recorded hand tracking session through the gesture classifier.
    Replay {
        /// The recorded session, as JSON or YAML.
        session: PathBuf,
        /// The path to the config file.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// The device name to play through. Overrides the config.
        #[arg[short, long]]
        device: Option<String>,
    },
}

/// Resolves a song argument to a built-in song or a song file.
fn resolve_song(song: &str) -> Result<Song, Box<dyn Error>> {
    if let Some(song) = find_song(&builtin_songs(), song) {
        return Ok(song.clone());
    }
    let path = Path::new(song);
    if path.exists() {
        return Ok(Song::load(path)?);
    }
    Err(format!("no built-in song or song file named {}", song).into())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Songs { export } => {
            let songs = builtin_songs();

            println!("Songs (count: {}):", songs.len());
            for song in songs.iter() {
                println!("- {}", song);
            }

            if let Some(dir) = export {
                fs::create_dir_all(&dir)?;
                for song in songs.iter() {
                    let file_name = song
                        .name()
                        .to_lowercase()
                        .chars()
                        .filter(|c| c.is_alphanumeric() || *c == ' ')
                        .collect::<String>()
                        .replace(' ', "-");
                    let path = dir.join(format!("{}.yaml", file_name));
                    song.to_config().save(&path)?;
                    println!("Wrote {}", path.display());
                }
            }
        }
        Commands::Play {
            song,
            config,
            device,
        } => {
            let song = resolve_song(&song)?;
            let config = Config::load(config.as_deref())?.with_device(device);
            let engine = Arc::new(Engine::new(audio::get_device(config.audio())?));
            engine.init()?;

            let sequencer = Sequencer::new(engine.clone());
            let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
            println!("Playing {}", song);
            sequencer.play(
                song.steps().to_vec(),
                |note| println!("- {}", note),
                move || {
                    let _ = done_tx.send(());
                },
            )?;

            if done_rx
                .recv_timeout(song.duration() + RECLAIM_MARGIN * 10)
                .is_err()
            {
                sequencer.stop();
                return Err("song did not finish in time".into());
            }

            // Let the last note ring out.
            thread::sleep(SEQUENCE_NOTE_DURATION + RECLAIM_MARGIN);
            engine.shutdown();
        }
        Commands::Render {
            song,
            output,
            sample_rate,
        } => {
            let song = resolve_song(&song)?;
            let rendered = render::render_song(&song, sample_rate)?;
            rendered.write_wav(&output)?;
            println!(
                "Rendered {} ({} frames) to {}",
                song,
                rendered.frames(),
                output.display()
            );
        }
        Commands::Replay {
            session,
            config,
            device,
        } => {
            let config = Config::load(config.as_deref())?.with_device(device);
            let tracker = RecordedTracker::load(&session, config.tracking().frame_interval()?)?;
            let engine = Arc::new(Engine::new(audio::get_device(config.audio())?));
            engine.init()?;

            let (events_tx, events_rx) = crossbeam_channel::bounded(64);
            let mut frame_loop = FrameLoop::spawn(
                Box::new(tracker),
                config.gesture().classifier(),
                engine.clone(),
                Some(events_tx),
            )?;

            // The channel disconnects once the loop drops its sender.
            for classification in events_rx.iter() {
                if !classification.pressed.is_empty() {
                    println!("Pressed: {}", classification.pressed);
                }
            }
            frame_loop.join();

            thread::sleep(DEFAULT_NOTE_DURATION + RECLAIM_MARGIN);
            engine.shutdown();
        }
    }

    Ok(())
}

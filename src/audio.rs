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
use std::{fmt, io, sync::Arc};

use thiserror::Error;

use crate::config;

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod thread_priority;

pub use mixer::Mixer;

/// Errors raised while opening or driving an output device.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output device found with name {0}")]
    NoDevice(String),

    #[error("audio host error: {0}")]
    Host(String),

    #[error("failed to query the default output config: {0}")]
    DefaultConfig(String),

    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("failed to build output stream: {0}")]
    BuildStream(String),

    #[error("failed to start output stream: {0}")]
    PlayStream(String),

    #[error("audio output thread error: {0}")]
    Thread(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("mock device error: {0}")]
    Mock(String),
}

/// An audio output device that can host the mixer.
pub trait Device: fmt::Display + Send + Sync {
    /// The sample rate the device runs at.
    fn sample_rate(&self) -> u32;

    /// The number of interleaved output channels.
    fn channels(&self) -> u16;

    /// Opens an output that pulls from the given mixer. The output may come up
    /// suspended; callers resume it before expecting sound.
    fn open(&self, mixer: Arc<Mixer>) -> Result<Box<dyn Output>, AudioError>;
}

/// A live output stream.
pub trait Output: Send {
    /// Returns true if the stream is not currently pulling audio.
    fn is_suspended(&self) -> bool;

    /// Starts or restarts the stream.
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Stops the stream and releases the device. Closing twice is a no-op.
    fn close(&mut self);
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets the configured device. Names starting with "mock" return a mock device;
/// no name at all selects the host's default output.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let sample_rate = config.sample_rate();
    match config.device() {
        Some(name) if name.starts_with("mock") => Ok(Arc::new(mock::Device::with_format(
            name,
            sample_rate,
            mock::DEFAULT_CHANNELS,
        ))),
        Some(name) => Ok(Arc::new(cpal::Device::get(name)?.with_sample_rate(sample_rate))),
        None => Ok(Arc::new(
            cpal::Device::default_output()?.with_sample_rate(sample_rate),
        )),
    }
}

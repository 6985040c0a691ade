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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::info;

use super::{AudioError, Mixer, Output};

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_CHANNELS: u16 = 2;

struct Shared {
    /// The mixer of the currently open output, if any.
    mixer: Mutex<Option<Arc<Mixer>>>,
    start_suspended: AtomicBool,
    /// Remaining opens that should fail.
    open_failures: AtomicUsize,
    /// Remaining resumes that should fail.
    resume_failures: AtomicUsize,
    open_count: AtomicUsize,
}

/// A mock device. Nothing reaches a sound card: audio is pulled on demand with
/// [`Device::render`], which makes the clock fully deterministic.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    channels: u16,
    shared: Arc<Shared>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device::with_format(name, DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)
    }

    /// Creates a mock device with an explicit format.
    pub fn with_format(name: &str, sample_rate: u32, channels: u16) -> Device {
        Device {
            name: name.to_string(),
            sample_rate,
            channels,
            shared: Arc::new(Shared {
                mixer: Mutex::new(None),
                start_suspended: AtomicBool::new(false),
                open_failures: AtomicUsize::new(0),
                resume_failures: AtomicUsize::new(0),
                open_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Outputs opened from now on start suspended, as a browser context does before
    /// a user gesture.
    pub fn start_suspended(&self, suspended: bool) {
        self.shared.start_suspended.store(suspended, Ordering::Relaxed);
    }

    /// Makes the next `count` opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.shared.open_failures.store(count, Ordering::Relaxed);
    }

    /// Makes the next `count` resumes fail.
    pub fn fail_next_resumes(&self, count: usize) {
        self.shared.resume_failures.store(count, Ordering::Relaxed);
    }

    /// How many outputs have been opened successfully.
    pub fn open_count(&self) -> usize {
        self.shared.open_count.load(Ordering::Relaxed)
    }

    /// Returns true if an output is currently open.
    pub fn is_open(&self) -> bool {
        self.shared.mixer.lock().is_some()
    }

    /// Pulls `frames` interleaved frames from the open output. Returns silence if
    /// nothing is open.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mixer = self.shared.mixer.lock().clone();
        match mixer {
            Some(mixer) => mixer.process_frames(frames),
            None => vec![0.0; frames * self.channels as usize],
        }
    }
}

fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
}

impl super::Device for Device {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn open(&self, mixer: Arc<Mixer>) -> Result<Box<dyn Output>, AudioError> {
        if take_failure(&self.shared.open_failures) {
            return Err(AudioError::Mock(format!("{} refused to open", self.name)));
        }

        *self.shared.mixer.lock() = Some(mixer);
        self.shared.open_count.fetch_add(1, Ordering::Relaxed);
        let suspended = self.shared.start_suspended.load(Ordering::Relaxed);
        info!(device = self.name, suspended, "Opened mock output.");

        Ok(Box::new(MockOutput {
            device: self.clone(),
            suspended,
            closed: false,
        }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

struct MockOutput {
    device: Device,
    suspended: bool,
    closed: bool,
}

impl Output for MockOutput {
    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Mock("output is closed".to_string()));
        }
        if take_failure(&self.device.shared.resume_failures) {
            return Err(AudioError::Mock(format!(
                "{} refused to resume",
                self.device.name
            )));
        }
        self.suspended = false;
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.suspended = true;
        *self.device.shared.mixer.lock() = None;
    }
}

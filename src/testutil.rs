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
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::engine::Instrument;
use crate::playsync::CancelHandle;

/// Audio test utilities for validating rendered output
pub mod audio_test_utils {
    /// Calculate RMS (Root Mean Square) of a signal
    pub fn calculate_rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
        (sum_squares / samples.len() as f32).sqrt()
    }

    /// Largest absolute sample value.
    pub fn calculate_peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let mut tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(10);
    let max_tick = Duration::from_millis(100);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }

        thread::sleep(tick);
        tick = std::cmp::min(tick * 2, max_tick);
    }
}

/// An instrument that records what it was asked to play.
#[derive(Default)]
pub struct RecordingInstrument {
    triggers: Mutex<Vec<(f32, Duration)>>,
    schedules: Mutex<Vec<CancelHandle>>,
}

impl RecordingInstrument {
    pub fn new() -> RecordingInstrument {
        RecordingInstrument::default()
    }

    pub fn triggers(&self) -> Vec<(f32, Duration)> {
        self.triggers.lock().clone()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.lock().len()
    }

    pub fn schedules(&self) -> Vec<CancelHandle> {
        self.schedules.lock().clone()
    }
}

impl Instrument for RecordingInstrument {
    fn trigger(&self, frequency: f32, duration: Duration) {
        self.triggers.lock().push((frequency, duration));
    }

    fn adopt_schedule(&self, handle: CancelHandle) {
        self.schedules.lock().push(handle);
    }
}

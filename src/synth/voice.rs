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

//! A single struck note and the registry that owns every note still sounding.
//!
//! Voices are fire-and-forget: once triggered, a voice renders its own attack and
//! decay and is reclaimed by the registry when it has finished. Retriggering a note
//! that is still decaying starts a second, independent voice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use super::automation::Automation;
use super::filter::{Lowpass, DEFAULT_Q};
use super::oscillator::{detune, Oscillator, Waveform};

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// The oscillator layers: shape and detune in cents.
const LAYERS: [(Waveform, f32); 3] = [
    (Waveform::Triangle, 0.0),
    (Waveform::Sine, -5.0),
    (Waveform::Sawtooth, 5.0),
];

/// Peak level reached at the end of the attack.
pub const PEAK_GAIN: f32 = 0.6;
/// Level the decay approaches at the end of the note.
pub const FLOOR_GAIN: f32 = 0.01;
/// Attack ramp length.
pub const ATTACK: Duration = Duration::from_millis(20);
/// Filter cutoff at the strike.
pub const CUTOFF_START_HZ: f32 = 3000.0;
/// Filter cutoff once the sweep completes.
pub const CUTOFF_END_HZ: f32 = 500.0;
/// Fraction of the note duration the cutoff sweep takes.
pub const CUTOFF_SWEEP_FRACTION: f32 = 0.7;
/// How long after the oscillators stop the voice is kept before it is reclaimed.
pub const RECLAIM_MARGIN: Duration = Duration::from_millis(100);

/// Filter coefficients are refreshed from the cutoff curve this often.
const CONTROL_INTERVAL: u64 = 32;

fn to_samples(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * sample_rate as f64).round() as u64
}

/// One sounding note.
pub struct Voice {
    /// Unique ID for this voice.
    id: u64,
    frequency: f32,
    sample_rate: f32,
    /// Sample clock position at which the oscillators start.
    start_sample: u64,
    /// Sample clock position at which the oscillators stop.
    stop_sample: u64,
    /// Sample clock position after which the voice may be reclaimed.
    reclaim_sample: u64,
    oscillators: [Oscillator; 3],
    filter: Lowpass,
    cutoff: Automation,
    gain: Automation,
}

impl Voice {
    /// Creates a voice that starts sounding at `start_sample` on the mixer's clock and
    /// stops `duration` later. Every parameter curve is fixed here.
    pub fn new(frequency: f32, duration: Duration, sample_rate: u32, start_sample: u64) -> Voice {
        let seconds = duration.as_secs_f32();
        let rate = sample_rate as f32;
        let oscillators = LAYERS
            .map(|(waveform, cents)| Oscillator::new(waveform, detune(frequency, cents), rate));
        let cutoff = Automation::new(CUTOFF_START_HZ)
            .exponential_ramp_to(CUTOFF_END_HZ, seconds * CUTOFF_SWEEP_FRACTION);
        let gain = Automation::new(0.0)
            .linear_ramp_to(PEAK_GAIN, ATTACK.as_secs_f32())
            .exponential_ramp_to(FLOOR_GAIN, seconds);
        let stop_sample = start_sample.saturating_add(to_samples(duration, sample_rate));

        Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst),
            frequency,
            sample_rate: rate,
            start_sample,
            stop_sample,
            reclaim_sample: stop_sample.saturating_add(to_samples(RECLAIM_MARGIN, sample_rate)),
            oscillators,
            filter: Lowpass::new(rate, CUTOFF_START_HZ, DEFAULT_Q),
            cutoff,
            gain,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn start_sample(&self) -> u64 {
        self.start_sample
    }

    pub fn stop_sample(&self) -> u64 {
        self.stop_sample
    }

    /// The envelope level `seconds` after the strike.
    pub fn gain_at(&self, seconds: f32) -> f32 {
        self.gain.value_at(seconds)
    }

    /// The filter cutoff `seconds` after the strike.
    pub fn cutoff_at(&self, seconds: f32) -> f32 {
        self.cutoff.value_at(seconds)
    }

    /// Delays a voice whose start has already been rendered past, so its attack
    /// begins at `block_start`. The duration is unchanged.
    pub fn start_no_earlier_than(&mut self, block_start: u64) {
        if self.start_sample >= block_start {
            return;
        }
        let shift = block_start - self.start_sample;
        self.start_sample = block_start;
        self.stop_sample = self.stop_sample.saturating_add(shift);
        self.reclaim_sample = self.reclaim_sample.saturating_add(shift);
    }

    /// Returns true once the voice has stopped and its reclaim margin has passed.
    pub fn is_finished(&self, current_sample: u64) -> bool {
        current_sample >= self.reclaim_sample
    }

    /// Adds this voice's output into a mono block whose first sample is at `block_start`
    /// on the mixer's clock.
    pub fn render_into(&mut self, output: &mut [f32], block_start: u64) {
        for (offset, out) in output.iter_mut().enumerate() {
            let position = block_start + offset as u64;
            if position < self.start_sample {
                continue;
            }
            if position >= self.stop_sample {
                break;
            }

            let elapsed = position - self.start_sample;
            let seconds = elapsed as f32 / self.sample_rate;
            if elapsed % CONTROL_INTERVAL == 0 {
                self.filter.set_cutoff(self.cutoff.value_at(seconds));
            }

            let layered: f32 = self.oscillators.iter_mut().map(|o| o.next_sample()).sum();
            *out += self.filter.process(layered) * self.gain.value_at(seconds);
        }
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("frequency", &self.frequency)
            .field("start_sample", &self.start_sample)
            .field("stop_sample", &self.stop_sample)
            .finish()
    }
}

/// Owns every live voice. Voices leave the registry either when they finish on their
/// own or when the whole registry is cleared at shutdown; there is no per-voice stop.
#[derive(Default)]
pub struct VoiceRegistry {
    voices: Vec<Voice>,
}

impl VoiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { voices: Vec::new() }
    }

    /// Adds a new voice. Existing voices for the same frequency are left alone.
    pub fn add_voice(&mut self, voice: Voice) {
        debug!(
            voice = voice.id,
            frequency = voice.frequency,
            active = self.voices.len() + 1,
            "Voice added"
        );
        self.voices.push(voice);
    }

    /// Renders every live voice into a mono block.
    pub fn render_into(&mut self, output: &mut [f32], block_start: u64) {
        for voice in self.voices.iter_mut() {
            voice.render_into(output, block_start);
        }
    }

    /// Drops every voice that has finished by `current_sample`.
    /// Returns the number of voices reclaimed.
    pub fn reclaim_finished(&mut self, current_sample: u64) -> usize {
        let before = self.voices.len();
        self.voices.retain(|voice| {
            let finished = voice.is_finished(current_sample);
            if finished {
                debug!(voice = voice.id, frequency = voice.frequency, "Voice reclaimed");
            }
            !finished
        });
        before - self.voices.len()
    }

    /// Returns the current number of active voices.
    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Clears all voices.
    /// Returns the number of voices dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.voices.len();
        self.voices.clear();
        count
    }
}

impl std::fmt::Debug for VoiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceRegistry")
            .field("active_voices", &self.voices.len())
            .finish()
    }
}

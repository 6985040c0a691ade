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

//! PolyBLEP oscillators.

use std::f32::consts::TAU;

/// Oscillator wave shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
}

/// Scales a frequency by a detune amount in cents.
pub fn detune(frequency: f32, cents: f32) -> f32 {
    frequency * 2f32.powf(cents / 1200.0)
}

/// Polynomial band-limited step residual for a discontinuity at phase 0.
fn poly_blep(phase: f32, increment: f32) -> f32 {
    if phase < increment {
        let t = phase / increment;
        t + t - t * t - 1.0
    } else if phase > 1.0 - increment {
        let t = (phase - 1.0) / increment;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

/// A single oscillator running at a fixed frequency.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    /// Normalized phase in [0, 1).
    phase: f32,
    /// Phase advance per sample.
    increment: f32,
    /// Leaky integrator state for the triangle.
    integrator: f32,
}

impl Oscillator {
    /// Creates an oscillator. Frequencies at or above Nyquist are clamped just below it.
    pub fn new(waveform: Waveform, frequency: f32, sample_rate: f32) -> Oscillator {
        let increment = (frequency / sample_rate).clamp(0.0, 0.49);
        Oscillator {
            waveform,
            phase: 0.0,
            increment,
            // The integrated square starts at its trough so the triangle is centered.
            integrator: -1.0,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Produces the next sample in [-1, 1] (the triangle may overshoot slightly).
    pub fn next_sample(&mut self) -> f32 {
        let phase = self.phase;
        let increment = self.increment;

        let value = match self.waveform {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Sawtooth => 2.0 * phase - 1.0 - poly_blep(phase, increment),
            Waveform::Triangle => {
                let mut square = if phase < 0.5 { 1.0 } else { -1.0 };
                square += poly_blep(phase, increment);
                square -= poly_blep((phase + 0.5) % 1.0, increment);
                // A square integrated over half a period at 4x the increment spans 2.
                self.integrator =
                    4.0 * increment * square + (1.0 - 0.5 * increment) * self.integrator;
                self.integrator
            }
        };

        self.phase += increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        value
    }
}

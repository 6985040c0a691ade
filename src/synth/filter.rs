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
use std::f32::consts::{FRAC_1_SQRT_2, TAU};

/// Butterworth resonance.
pub const DEFAULT_Q: f32 = FRAC_1_SQRT_2;

/// A second-order lowpass in transposed direct form II.
#[derive(Debug, Clone)]
pub struct Lowpass {
    sample_rate: f32,
    q: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Lowpass {
    pub fn new(sample_rate: f32, cutoff: f32, q: f32) -> Lowpass {
        let mut filter = Lowpass {
            sample_rate,
            q,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        };
        filter.set_cutoff(cutoff);
        filter
    }

    /// Recomputes the coefficients for a new cutoff, keeping the filter state.
    pub fn set_cutoff(&mut self, cutoff: f32) {
        let cutoff = cutoff.clamp(10.0, self.sample_rate * 0.49);
        let w0 = TAU * cutoff / self.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * self.q);

        let a0 = 1.0 + alpha;
        let b1 = 1.0 - cos_w0;
        self.b0 = b1 / 2.0 / a0;
        self.b1 = b1 / a0;
        self.b2 = self.b0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

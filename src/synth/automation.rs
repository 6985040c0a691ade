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

//! Parameter curves scheduled at trigger time and evaluated by the renderer.
//!
//! An [`Automation`] starts at an initial value and moves through ramp events, each
//! ending at a time (in seconds from the voice start) with a target value. A ramp
//! starts where the previous event ended. After the last event the value holds.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Curve {
    Step,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ramp {
    end_time: f32,
    target: f32,
    curve: Curve,
}

/// A piecewise parameter curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Automation {
    initial: f32,
    ramps: Vec<Ramp>,
}

impl Automation {
    /// Creates an automation holding `initial` from time zero.
    pub fn new(initial: f32) -> Automation {
        Automation {
            initial,
            ramps: Vec::new(),
        }
    }

    /// Jumps to `value` at `time`, holding the previous value until then.
    pub fn set_value_at(self, value: f32, time: f32) -> Automation {
        self.push(value, time, Curve::Step)
    }

    /// Ramps linearly to `target`, arriving at `end_time`.
    pub fn linear_ramp_to(self, target: f32, end_time: f32) -> Automation {
        self.push(target, end_time, Curve::Linear)
    }

    /// Ramps exponentially to `target`, arriving at `end_time`. Both ends of an
    /// exponential ramp must be positive; otherwise the previous value holds until
    /// `end_time` and then jumps.
    pub fn exponential_ramp_to(self, target: f32, end_time: f32) -> Automation {
        self.push(target, end_time, Curve::Exponential)
    }

    fn push(mut self, target: f32, end_time: f32, curve: Curve) -> Automation {
        // Events arrive in time order; a ramp ending earlier than its predecessor is
        // clamped to zero length.
        let end_time = end_time.max(self.last_time());
        self.ramps.push(Ramp {
            end_time,
            target,
            curve,
        });
        self
    }

    fn last_time(&self) -> f32 {
        self.ramps.last().map_or(0.0, |ramp| ramp.end_time)
    }

    /// The value after every ramp has completed.
    pub fn final_value(&self) -> f32 {
        self.ramps.last().map_or(self.initial, |ramp| ramp.target)
    }

    /// Evaluates the curve at `time` seconds.
    pub fn value_at(&self, time: f32) -> f32 {
        let mut start_time = 0.0;
        let mut start_value = self.initial;

        for ramp in &self.ramps {
            if time < ramp.end_time {
                let span = ramp.end_time - start_time;
                if span <= 0.0 || time < start_time || ramp.curve == Curve::Step {
                    return start_value;
                }
                let progress = (time - start_time) / span;
                return match ramp.curve {
                    Curve::Step => start_value,
                    Curve::Linear => start_value + (ramp.target - start_value) * progress,
                    Curve::Exponential => {
                        if start_value <= 0.0 || ramp.target <= 0.0 {
                            start_value
                        } else {
                            start_value * (ramp.target / start_value).powf(progress)
                        }
                    }
                };
            }
            start_time = ramp.end_time;
            start_value = ramp.target;
        }

        start_value
    }
}

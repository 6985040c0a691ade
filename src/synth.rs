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

//! The piano voice.
//!
//! This module provides:
//! - Parameter automation (steps plus linear and exponential ramps scheduled up front)
//! - Band-limited oscillators
//! - A lowpass biquad with a swept cutoff
//! - The layered voice that combines them, and the registry that owns live voices

pub mod automation;
pub mod filter;
pub mod oscillator;
pub mod voice;

pub use voice::{Voice, VoiceRegistry};

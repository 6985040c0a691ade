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

//! An air piano. Hand landmarks are classified into key presses, which strike
//! layered synth voices mixed onto an output device. A sequencer plays songs
//! through the same voices.

pub mod audio;
pub mod config;
pub mod engine;
pub mod gesture;
pub mod keys;
pub mod landmarks;
pub mod playsync;
pub mod render;
pub mod sequencer;
pub mod songs;
pub mod synth;
pub mod tracking;

#[cfg(test)]
mod testutil;

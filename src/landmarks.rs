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

//! Hand landmark frames as delivered by the tracking provider.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of joints in a complete hand skeleton.
pub const JOINT_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP: usize = 16;
pub const PINKY_TIP: usize = 20;

/// A 3D point in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Point3 {
        Point3 { x, y, z }
    }

    /// The vector from `self` to `other`.
    pub fn to(&self, other: &Point3) -> Point3 {
        Point3::new(other.x - self.x, other.y - self.y, other.z - self.z)
    }

    pub fn dot(&self, other: &Point3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }
}

/// The handedness label the tracker attaches to a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl FromStr for Handedness {
    type Err = String;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label {
            "Left" => Ok(Handedness::Left),
            "Right" => Ok(Handedness::Right),
            other => Err(format!("unrecognized handedness label '{}'", other)),
        }
    }
}

/// One hand detected in one tracking cycle. Hands carry no identity between cycles.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HandFrame {
    /// The raw label from the tracker, normally "Left" or "Right".
    pub handedness: String,
    /// Joints in skeleton order. A short list means the trailing joints are missing.
    pub joints: Vec<Point3>,
    /// Detection confidence in [0, 1].
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl HandFrame {
    pub fn new(handedness: &str, joints: Vec<Point3>, confidence: f32) -> HandFrame {
        HandFrame {
            handedness: handedness.to_string(),
            joints,
            confidence,
        }
    }

    /// The parsed handedness, or None if the label isn't recognized.
    pub fn handedness(&self) -> Option<Handedness> {
        self.handedness.parse().ok()
    }

    /// The joint at the given index, if present.
    pub fn joint(&self, index: usize) -> Option<Point3> {
        self.joints.get(index).copied()
    }
}

/// Builds a flat, fully extended hand: every finger is a straight line pointing up
/// from the wrist. Useful as a neutral pose in tests and simulations.
pub fn open_hand(handedness: &str, origin_x: f32) -> HandFrame {
    let mut joints = vec![Point3::new(origin_x, 0.9, 0.0)];
    for finger in 0..5 {
        let x = origin_x - 0.08 + finger as f32 * 0.04;
        for segment in 1..=4 {
            joints.push(Point3::new(x, 0.8 - segment as f32 * 0.05, 0.0));
        }
    }
    HandFrame::new(handedness, joints, 1.0)
}

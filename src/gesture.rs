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

//! Fingertip joint-angle classification.
//!
//! Every cycle the hooked set is recomputed from scratch: a key is hooked if and only
//! if its finger's DIP angle in the current frame is below [`HOOK_THRESHOLD_DEGREES`].
//! The only state carried between cycles is the previous hooked set, used to report
//! note-on edges and, when explicitly configured, a release hysteresis band.

use tracing::{trace, warn};

use crate::keys::{KeySet, KEY_COUNT};
use crate::landmarks::{
    HandFrame, Handedness, Point3, INDEX_TIP, MIDDLE_TIP, RING_TIP, THUMB_TIP,
};

/// A finger is hooked when its angle is strictly below this.
pub const HOOK_THRESHOLD_DEGREES: f32 = 160.0;

/// The angle reported when any joint of the triad is missing.
pub const STRAIGHT_DEGREES: f32 = 180.0;

/// (tip joint, key index) pairs for the performer's left hand. The camera image is
/// mirrored, so the left hand plays the visually-left keys from the ring finger inward.
const LEFT_FINGERS: [(usize, usize); 4] =
    [(RING_TIP, 0), (MIDDLE_TIP, 1), (INDEX_TIP, 2), (THUMB_TIP, 3)];

/// (tip joint, key index) pairs for the performer's right hand.
const RIGHT_FINGERS: [(usize, usize); 4] =
    [(THUMB_TIP, 4), (INDEX_TIP, 5), (MIDDLE_TIP, 6), (RING_TIP, 7)];

/// Returns the finger map for the given hand.
pub fn finger_map(handedness: Handedness) -> &'static [(usize, usize); 4] {
    match handedness {
        Handedness::Left => &LEFT_FINGERS,
        Handedness::Right => &RIGHT_FINGERS,
    }
}

/// The angle at `b` formed by `a` and `c`, in degrees within [0, 180].
pub fn joint_angle(a: Option<Point3>, b: Option<Point3>, c: Option<Point3>) -> f32 {
    let (Some(a), Some(b), Some(c)) = (a, b, c) else {
        return STRAIGHT_DEGREES;
    };
    let v1 = b.to(&a);
    let v2 = b.to(&c);
    let mut magnitude = v1.length() * v2.length();
    if magnitude == 0.0 {
        magnitude = 1.0;
    }
    let cosine = (v1.dot(&v2) / magnitude).clamp(-1.0, 1.0);
    let degrees = cosine.acos().to_degrees();
    if degrees.is_nan() {
        STRAIGHT_DEGREES
    } else {
        degrees
    }
}

/// Applies the press threshold.
pub fn is_hooked(angle: f32) -> bool {
    angle < HOOK_THRESHOLD_DEGREES
}

/// The DIP angle of the finger ending at `tip`.
fn finger_angle(hand: &HandFrame, tip: usize) -> f32 {
    joint_angle(hand.joint(tip - 2), hand.joint(tip - 1), hand.joint(tip))
}

/// The screen area cursor positions are reported in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Feedback position for a key whose fingertip was seen this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    /// The key the finger controls.
    pub key: usize,
    /// Horizontal screen position, mirrored to match the mirrored camera image.
    pub x: f32,
    pub y: f32,
    /// The measured DIP angle in degrees.
    pub angle: f32,
    pub hooked: bool,
}

/// The result of one classification cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Keys hooked this cycle.
    pub hooked: KeySet,
    /// Keys hooked this cycle that weren't hooked in the previous one.
    pub pressed: KeySet,
    /// Keys hooked in the previous cycle that no longer are.
    pub released: KeySet,
    /// Fingertip positions, ordered by key.
    pub cursors: Vec<Cursor>,
}

/// Turns hand frames into hooked keys.
#[derive(Debug, Clone)]
pub struct Classifier {
    viewport: Viewport,
    /// When set, a key hooked last cycle stays hooked while its angle is below this.
    release_threshold: Option<f32>,
    previous: KeySet,
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::new(Viewport::default())
    }
}

impl Classifier {
    /// Creates a classifier with the stateless threshold behavior.
    pub fn new(viewport: Viewport) -> Classifier {
        Classifier {
            viewport,
            release_threshold: None,
            previous: KeySet::new(),
        }
    }

    /// Enables a release band: keys already hooked are released only once their
    /// angle reaches `release_threshold`. Thresholds at or below the press
    /// threshold would have no effect and are rejected.
    pub fn with_release_threshold(mut self, release_threshold: Option<f32>) -> Classifier {
        self.release_threshold = match release_threshold {
            Some(threshold) if threshold > HOOK_THRESHOLD_DEGREES => Some(threshold),
            Some(threshold) => {
                warn!(
                    threshold,
                    press_threshold = HOOK_THRESHOLD_DEGREES,
                    "Release threshold must exceed the press threshold, ignoring"
                );
                None
            }
            None => None,
        };
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The hooked set from the last cycle.
    pub fn hooked(&self) -> KeySet {
        self.previous
    }

    /// Classifies one tracking cycle's hands.
    pub fn classify(&mut self, hands: &[HandFrame]) -> Classification {
        let mut hooked = KeySet::new();
        let mut cursors: [Option<Cursor>; KEY_COUNT] = [None; KEY_COUNT];

        for hand in hands {
            let Some(handedness) = hand.handedness() else {
                trace!(label = %hand.handedness, "Ignoring hand with unknown handedness");
                continue;
            };

            for &(tip, key) in finger_map(handedness) {
                let angle = finger_angle(hand, tip);
                let held = self
                    .release_threshold
                    .is_some_and(|release| self.previous.contains(key) && angle < release);
                let key_hooked = is_hooked(angle) || held;
                if key_hooked {
                    hooked.insert(key);
                }

                if let Some(tip) = hand.joint(tip) {
                    cursors[key] = Some(Cursor {
                        key,
                        x: (1.0 - tip.x) * self.viewport.width,
                        y: tip.y * self.viewport.height,
                        angle,
                        hooked: key_hooked,
                    });
                }
            }
        }

        let classification = Classification {
            hooked,
            pressed: hooked.difference(&self.previous),
            released: self.previous.difference(&hooked),
            cursors: cursors.into_iter().flatten().collect(),
        };
        self.previous = hooked;
        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{open_hand, JOINT_COUNT};

    /// Bends the finger ending at `tip` so its DIP joint forms a right angle.
    fn bend_right_angle(hand: &mut HandFrame, tip: usize) {
        let dip = hand.joints[tip - 1];
        let pip = hand.joints[tip - 2];
        let length = dip.to(&pip).length();
        hand.joints[tip] = Point3::new(dip.x + length, dip.y, dip.z);
    }

    #[test]
    fn test_angle_range_and_symmetry() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.2, -0.3),
            Point3::new(0.4, 0.9, 0.1),
            Point3::new(-0.5, 0.5, 0.5),
        ];
        for a in points {
            for b in points {
                for c in points {
                    let angle = joint_angle(Some(a), Some(b), Some(c));
                    assert!((0.0..=180.0).contains(&angle), "angle {} out of range", angle);
                    let swapped = joint_angle(Some(c), Some(b), Some(a));
                    assert!((angle - swapped).abs() < 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_known_angles() {
        let b = Point3::new(0.0, 0.0, 0.0);
        let straight = joint_angle(
            Some(Point3::new(-1.0, 0.0, 0.0)),
            Some(b),
            Some(Point3::new(1.0, 0.0, 0.0)),
        );
        assert!((straight - 180.0).abs() < 1e-3);

        let right = joint_angle(
            Some(Point3::new(0.0, 1.0, 0.0)),
            Some(b),
            Some(Point3::new(0.0, 0.0, 2.0)),
        );
        assert!((right - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_missing_joint_is_straight() {
        let p = Some(Point3::new(0.1, 0.2, 0.3));
        assert_eq!(joint_angle(None, p, p), STRAIGHT_DEGREES);
        assert_eq!(joint_angle(p, None, p), STRAIGHT_DEGREES);
        assert_eq!(joint_angle(p, p, None), STRAIGHT_DEGREES);
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(!is_hooked(160.0));
        assert!(is_hooked(159.999));
        assert!(!is_hooked(180.0));
    }

    #[test]
    fn test_right_index_plays_a4() {
        let mut hand = open_hand("Right", 0.3);
        bend_right_angle(&mut hand, INDEX_TIP);

        let mut classifier = Classifier::default();
        let result = classifier.classify(&[hand]);
        assert_eq!(result.hooked.iter().collect::<Vec<_>>(), vec![5]);
        assert_eq!(result.pressed.iter().collect::<Vec<_>>(), vec![5]);

        let cursor = result.cursors.iter().find(|c| c.key == 5).unwrap();
        assert!(cursor.hooked);
        assert!((cursor.angle - 90.0).abs() < 1e-2);
    }

    #[test]
    fn test_left_hand_mapping() {
        let mut classifier = Classifier::default();
        for (tip, key) in LEFT_FINGERS {
            let mut hand = open_hand("Left", 0.7);
            bend_right_angle(&mut hand, tip);
            let result = classifier.classify(&[hand]);
            assert_eq!(result.hooked.iter().collect::<Vec<_>>(), vec![key]);
        }
    }

    #[test]
    fn test_both_hands_union() {
        let mut left = open_hand("Left", 0.7);
        let mut right = open_hand("Right", 0.3);
        bend_right_angle(&mut left, THUMB_TIP);
        bend_right_angle(&mut right, RING_TIP);

        let result = Classifier::default().classify(&[left, right]);
        assert_eq!(result.hooked.iter().collect::<Vec<_>>(), vec![3, 7]);
        assert_eq!(result.cursors.len(), KEY_COUNT);
    }

    #[test]
    fn test_unknown_handedness_ignored() {
        let mut hand = open_hand("Unknown", 0.5);
        bend_right_angle(&mut hand, INDEX_TIP);
        let result = Classifier::default().classify(&[hand]);
        assert!(result.hooked.is_empty());
        assert!(result.cursors.is_empty());
    }

    #[test]
    fn test_zero_hands_clears_state() {
        let mut hand = open_hand("Right", 0.3);
        bend_right_angle(&mut hand, INDEX_TIP);

        let mut classifier = Classifier::default();
        assert!(!classifier.classify(&[hand]).hooked.is_empty());

        let result = classifier.classify(&[]);
        assert!(result.hooked.is_empty());
        assert!(result.cursors.is_empty());
        assert_eq!(result.released.iter().collect::<Vec<_>>(), vec![5]);
        assert!(classifier.hooked().is_empty());
    }

    #[test]
    fn test_held_key_only_pressed_once() {
        let mut hand = open_hand("Right", 0.3);
        bend_right_angle(&mut hand, MIDDLE_TIP);

        let mut classifier = Classifier::default();
        assert_eq!(classifier.classify(&[hand.clone()]).pressed.len(), 1);

        let second = classifier.classify(&[hand]);
        assert_eq!(second.hooked.iter().collect::<Vec<_>>(), vec![6]);
        assert!(second.pressed.is_empty());
    }

    #[test]
    fn test_truncated_hand_degrades_per_finger() {
        let mut hand = open_hand("Right", 0.3);
        bend_right_angle(&mut hand, INDEX_TIP);
        // Drop everything past the index fingertip.
        hand.joints.truncate(INDEX_TIP + 1);
        assert!(hand.joints.len() < JOINT_COUNT);

        let result = Classifier::default().classify(&[hand]);
        assert_eq!(result.hooked.iter().collect::<Vec<_>>(), vec![5]);
        // Only the thumb and index tips are present.
        assert_eq!(
            result.cursors.iter().map(|c| c.key).collect::<Vec<_>>(),
            vec![4, 5]
        );
    }

    #[test]
    fn test_cursor_is_mirrored() {
        let hand = open_hand("Right", 0.25);
        let tip = hand.joint(THUMB_TIP).unwrap();
        let result = Classifier::new(Viewport {
            width: 100.0,
            height: 50.0,
        })
        .classify(&[hand]);

        let cursor = result.cursors.iter().find(|c| c.key == 4).unwrap();
        assert!((cursor.x - (1.0 - tip.x) * 100.0).abs() < 1e-4);
        assert!((cursor.y - tip.y * 50.0).abs() < 1e-4);
        assert!(!cursor.hooked);
    }

    /// A hand whose index DIP angle is exactly `degrees`.
    fn index_at(degrees: f32) -> HandFrame {
        let mut hand = open_hand("Right", 0.3);
        let dip = hand.joints[INDEX_TIP - 1];
        let length = 0.05;
        // The PIP sits straight below the DIP; rotate the tip away from it.
        let theta = (180.0 - degrees).to_radians();
        hand.joints[INDEX_TIP] = Point3::new(
            dip.x + length * theta.sin(),
            dip.y - length * theta.cos(),
            dip.z,
        );
        hand
    }

    #[test]
    fn test_release_band() {
        let mut classifier = Classifier::default().with_release_threshold(Some(170.0));

        assert!(classifier.classify(&[index_at(150.0)]).hooked.contains(5));
        // Above the press threshold but inside the band: still held.
        assert!(classifier.classify(&[index_at(165.0)]).hooked.contains(5));
        // Past the band: released.
        assert!(!classifier.classify(&[index_at(175.0)]).hooked.contains(5));
        // Coming back into the band from released doesn't press.
        assert!(!classifier.classify(&[index_at(165.0)]).hooked.contains(5));
    }

    #[test]
    fn test_without_release_band_is_stateless() {
        let mut classifier = Classifier::default();
        assert!(classifier.classify(&[index_at(150.0)]).hooked.contains(5));
        assert!(!classifier.classify(&[index_at(165.0)]).hooked.contains(5));
    }

    #[test]
    fn test_release_threshold_below_press_is_ignored() {
        let mut classifier = Classifier::default().with_release_threshold(Some(150.0));
        assert!(classifier.classify(&[index_at(155.0)]).hooked.contains(5));
        assert!(!classifier.classify(&[index_at(165.0)]).hooked.contains(5));
    }
}

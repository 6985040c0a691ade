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

//! The fixed key layout. Order is the spatial contract: index 0 is the leftmost key.

use std::fmt;

/// Which hand plays a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

/// Which finger plays a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
}

/// The hand and finger bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    pub hand: Hand,
    pub finger: Finger,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hand = match self.hand {
            Hand::Left => "L",
            Hand::Right => "R",
        };
        let finger = match self.finger {
            Finger::Thumb => "Thumb",
            Finger::Index => "Idx",
            Finger::Middle => "Mid",
            Finger::Ring => "Ring",
        };
        write!(f, "{}-{}", hand, finger)
    }
}

/// A playable key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Key {
    /// The note name, e.g. "C4".
    pub note: &'static str,
    /// The frequency in Hz.
    pub frequency: f32,
    /// The finger that plays this key.
    pub role: Role,
}

const fn key(note: &'static str, frequency: f32, hand: Hand, finger: Finger) -> Key {
    Key {
        note,
        frequency,
        role: Role { hand, finger },
    }
}

/// Number of keys on the keyboard.
pub const KEY_COUNT: usize = 8;

/// The keys, left to right.
pub const KEYS: [Key; KEY_COUNT] = [
    key("C4", 261.63, Hand::Left, Finger::Ring),
    key("D4", 293.66, Hand::Left, Finger::Middle),
    key("E4", 329.63, Hand::Left, Finger::Index),
    key("F4", 349.23, Hand::Left, Finger::Thumb),
    key("G4", 392.00, Hand::Right, Finger::Thumb),
    key("A4", 440.00, Hand::Right, Finger::Index),
    key("B4", 493.88, Hand::Right, Finger::Middle),
    key("C5", 523.25, Hand::Right, Finger::Ring),
];

/// Looks up a key by its note name.
pub fn key_by_note(note: &str) -> Option<(usize, &'static Key)> {
    KEYS.iter().enumerate().find(|(_, key)| key.note == note)
}

/// A set of key indices, stored as a bitmask over the key table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeySet(u8);

impl KeySet {
    /// Creates an empty set.
    pub const fn new() -> KeySet {
        KeySet(0)
    }

    /// Inserts a key index. Indices outside the key table are ignored.
    pub fn insert(&mut self, index: usize) {
        if index < KEY_COUNT {
            self.0 |= 1 << index;
        }
    }

    /// Returns true if the key index is in the set.
    pub fn contains(&self, index: usize) -> bool {
        index < KEY_COUNT && self.0 & (1 << index) != 0
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Keys in this set that are not in `other`.
    pub fn difference(&self, other: &KeySet) -> KeySet {
        KeySet(self.0 & !other.0)
    }

    /// Iterates over the key indices in left-to-right order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..KEY_COUNT).filter(move |index| self.contains(*index))
    }

    /// Iterates over the keys in left-to-right order.
    pub fn keys(&self) -> impl Iterator<Item = &'static Key> + '_ {
        self.iter().map(|index| &KEYS[index])
    }
}

impl FromIterator<usize> for KeySet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = KeySet::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

impl fmt::Display for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let notes: Vec<&str> = self.keys().map(|key| key.note).collect();
        write!(f, "[{}]", notes.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_order() {
        let notes: Vec<&str> = KEYS.iter().map(|key| key.note).collect();
        assert_eq!(notes, vec!["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"]);

        // Frequencies rise left to right.
        for pair in KEYS.windows(2) {
            assert!(pair[0].frequency < pair[1].frequency);
        }
    }

    #[test]
    fn test_role_labels() {
        let labels: Vec<String> = KEYS.iter().map(|key| key.role.to_string()).collect();
        assert_eq!(
            labels,
            vec!["L-Ring", "L-Mid", "L-Idx", "L-Thumb", "R-Thumb", "R-Idx", "R-Mid", "R-Ring"]
        );
    }

    #[test]
    fn test_key_by_note() {
        let (index, key) = key_by_note("A4").expect("A4 should exist");
        assert_eq!(index, 5);
        assert_eq!(key.frequency, 440.0);
        assert!(key_by_note("C#4").is_none());
    }

    #[test]
    fn test_key_set() {
        let mut set = KeySet::new();
        assert!(set.is_empty());

        set.insert(5);
        set.insert(0);
        set.insert(5);
        set.insert(42);
        assert_eq!(set.len(), 2);
        assert!(set.contains(0));
        assert!(set.contains(5));
        assert!(!set.contains(42));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 5]);
        assert_eq!(set.to_string(), "[C4, A4]");

        let previous: KeySet = [0, 1].into_iter().collect();
        assert_eq!(set.difference(&previous).iter().collect::<Vec<_>>(), vec![5]);
    }
}

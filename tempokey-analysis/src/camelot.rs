//! Camelot wheel notation for harmonic mixing
//!
//! Maps musical keys to Camelot notation (1A-12B).

use crate::pitch::{MusicalKey, Scale};
use std::fmt;

/// Camelot wheel notation (1A-12B)
///
/// - Numbers 1-12 follow the circle of fifths
/// - 'A' suffix = minor keys
/// - 'B' suffix = major keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CamelotKey {
    /// Position on the wheel (1-12)
    pub number: u8,
    /// true = B (major), false = A (minor)
    pub is_major: bool,
}

impl CamelotKey {
    /// Create a new Camelot key
    pub fn new(number: u8, is_major: bool) -> Option<Self> {
        if (1..=12).contains(&number) {
            Some(Self { number, is_major })
        } else {
            None
        }
    }

    /// Convert from musical key to Camelot notation
    ///
    /// C major sits at 8B; each step of a fifth moves one position clockwise.
    /// Relative major/minor share the same number.
    pub fn from_musical_key(key: MusicalKey) -> Self {
        let major_root = match key.scale() {
            Scale::Major => key.tonic(),
            Scale::Minor => key.relative().tonic(),
        };
        let number = (7 * major_root.index() as u32 + 7) % 12 + 1;

        Self {
            number: number as u8,
            is_major: key.is_major(),
        }
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, if self.is_major { 'B' } else { 'A' })
    }
}

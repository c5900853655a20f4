//! Pitch classes, scales and musical keys

use std::fmt;

/// Sharp spellings for the 12 pitch classes, index 0 = C
const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the 12 pitch classes (0-11, where 0=C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    /// Create a pitch class, wrapping values above 11
    pub fn new(pc: u8) -> Self {
        Self(pc % 12)
    }

    /// Pitch class index (0-11)
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Sharp spelling, e.g. `"A#"`
    pub fn name(&self) -> &'static str {
        PITCH_NAMES[self.0 as usize]
    }

    /// Transpose upwards by a number of semitones
    pub fn transpose(&self, semitones: u8) -> Self {
        Self::new(self.0 + semitones % 12)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Major or minor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scale {
    Major,
    Minor,
}

impl Scale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Musical key (24 possible: 12 major + 12 minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicalKey {
    tonic: PitchClass,
    scale: Scale,
}

impl MusicalKey {
    pub fn new(tonic: PitchClass, scale: Scale) -> Self {
        Self { tonic, scale }
    }

    /// Get major key from pitch class (0-11)
    pub fn major_from_pitch_class(pc: u8) -> Self {
        Self::new(PitchClass::new(pc), Scale::Major)
    }

    /// Get minor key from pitch class (0-11)
    pub fn minor_from_pitch_class(pc: u8) -> Self {
        Self::new(PitchClass::new(pc), Scale::Minor)
    }

    pub fn tonic(&self) -> PitchClass {
        self.tonic
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn is_major(&self) -> bool {
        self.scale == Scale::Major
    }

    /// The relative major/minor sharing this key's signature
    pub fn relative(&self) -> Self {
        match self.scale {
            Scale::Major => Self::new(self.tonic.transpose(9), Scale::Minor),
            Scale::Minor => Self::new(self.tonic.transpose(3), Scale::Major),
        }
    }
}

impl fmt::Display for MusicalKey {
    /// Short notation: `C`, `F#m`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scale {
            Scale::Major => write!(f, "{}", self.tonic),
            Scale::Minor => write!(f, "{}m", self.tonic),
        }
    }
}

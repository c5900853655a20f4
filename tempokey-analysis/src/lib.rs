//! Audio analysis module for tempokey
//!
//! Provides musical key detection, tempo estimation with beat grid
//! alignment, and key notation (pitch names, Camelot wheel).

mod camelot;
mod key;
mod pitch;
mod tempo;

pub use camelot::CamelotKey;
pub use key::{DetectedKey, KeyAnalyzer, KeyProfile};
pub use pitch::{MusicalKey, PitchClass, Scale};
pub use tempo::{BeatGrid, TempoAnalyzer, TempoEstimate, TempoRange};

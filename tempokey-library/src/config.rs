//! Extraction settings
//!
//! The analysis window is fixed (see `segment`); only the analyzers'
//! parameters live here.

use tempokey_analysis::{KeyProfile, TempoRange};
use thiserror::Error;

/// Errors from an invalid configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid tempo range {min_bpm}-{max_bpm} BPM")]
    TempoRange { min_bpm: f32, max_bpm: f32 },
}

/// Analyzer settings for an extraction run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExtractConfig {
    /// Profile set used for key correlation
    pub key_profile: KeyProfile,
    /// BPM search range for tempo estimation
    pub tempo_range: TempoRange,
}

impl ExtractConfig {
    /// Check that the tempo range is finite, positive and non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let TempoRange { min_bpm, max_bpm } = self.tempo_range;
        let valid = min_bpm.is_finite() && max_bpm.is_finite() && min_bpm > 0.0 && min_bpm < max_bpm;

        if valid {
            Ok(())
        } else {
            Err(ConfigError::TempoRange { min_bpm, max_bpm })
        }
    }
}

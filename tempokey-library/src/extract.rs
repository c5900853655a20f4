//! Key and tempo extraction pipeline: load, slice, analyze

use std::path::Path;

use tempokey_analysis::{DetectedKey, KeyAnalyzer, TempoAnalyzer, TempoEstimate};
use thiserror::Error;

use crate::config::{ConfigError, ExtractConfig};
use crate::loader::{LoadError, MonoLoader};
use crate::report::TempoKey;
use crate::segment::{analysis_segment, ANALYSIS_SAMPLE_RATE};

/// Errors that can occur during extraction
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to load audio: {0}")]
    Load(#[from] LoadError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Expected {expected} Hz audio, got {actual} Hz")]
    SampleRate { expected: u32, actual: u32 },
    #[error("Track is too short for the analysis window ({duration_secs:.1}s)")]
    SegmentEmpty { duration_secs: f64 },
    #[error("Could not detect a key in {segment_secs:.1}s of audio")]
    NoKey { segment_secs: f32 },
    #[error("Could not estimate a tempo from {segment_secs:.1}s of audio")]
    NoTempo { segment_secs: f32 },
}

/// Analysis results for one track's window
#[derive(Debug, Clone)]
pub struct Extraction {
    pub key: DetectedKey,
    pub tempo: TempoEstimate,
    /// Length of the analyzed window in seconds
    pub segment_secs: f32,
}

/// Runs the analyzers over the fixed window of a track
pub struct Extractor {
    config: ExtractConfig,
    loader: MonoLoader,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            config: ExtractConfig::default(),
            loader: MonoLoader::new(),
        }
    }
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Result<Self, ExtractError> {
        config.validate()?;
        Ok(Self {
            config,
            loader: MonoLoader::new(),
        })
    }

    /// Decode a file and analyze its window
    pub fn extract_file(&self, path: &Path) -> Result<Extraction, ExtractError> {
        let track = self.loader.load(path)?;
        self.extract_samples(&track.samples, track.sample_rate)
    }

    /// Analyze the window of an already-decoded mono buffer at 44.1kHz
    pub fn extract_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Extraction, ExtractError> {
        if sample_rate != ANALYSIS_SAMPLE_RATE {
            return Err(ExtractError::SampleRate {
                expected: ANALYSIS_SAMPLE_RATE,
                actual: sample_rate,
            });
        }

        let segment = analysis_segment(samples, sample_rate);
        if segment.is_empty() {
            return Err(ExtractError::SegmentEmpty {
                duration_secs: samples.len() as f64 / sample_rate as f64,
            });
        }
        let segment_secs = segment.len() as f32 / sample_rate as f32;

        tracing::debug!(segment_secs, "analyzing window");

        let key = KeyAnalyzer::with_profile(sample_rate, self.config.key_profile)
            .analyze(segment)
            .ok_or(ExtractError::NoKey { segment_secs })?;

        let tempo = TempoAnalyzer::with_range(sample_rate, self.config.tempo_range)
            .analyze(segment)
            .ok_or(ExtractError::NoTempo { segment_secs })?;

        Ok(Extraction {
            key,
            tempo,
            segment_secs,
        })
    }
}

/// Extract the key and rounded BPM of a file with the default settings
pub fn extract_tempo_and_key(path: &Path) -> Result<TempoKey, ExtractError> {
    let extraction = Extractor::default().extract_file(path)?;
    Ok(TempoKey::from(&extraction))
}

//! Track loading and key/tempo extraction for tempokey

mod config;
mod extract;
mod loader;
mod report;
mod segment;

pub use config::{ConfigError, ExtractConfig};
pub use extract::{extract_tempo_and_key, ExtractError, Extraction, Extractor};
pub use loader::{LoadError, MonoLoader, MonoTrack};
pub use report::{round_bpm, to_json_line, DetailedReport, TempoKey};
pub use segment::{
    analysis_segment, segment_bounds, ANALYSIS_SAMPLE_RATE, SEGMENT_DURATION_SECS,
    SEGMENT_START_SECS,
};

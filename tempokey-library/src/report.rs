//! JSON output shapes

use serde::{Deserialize, Serialize};
use tempokey_analysis::CamelotKey;

use crate::extract::Extraction;

/// The two-field result: tonic name and whole-number tempo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoKey {
    /// Tonic with sharp spelling, e.g. `"A#"`
    pub key: String,
    pub bpm: i64,
}

impl From<&Extraction> for TempoKey {
    fn from(extraction: &Extraction) -> Self {
        Self {
            key: extraction.key.key.tonic().to_string(),
            bpm: round_bpm(extraction.tempo.bpm),
        }
    }
}

/// Everything the analyzers produced for the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedReport {
    pub key: String,
    pub bpm: i64,
    /// `"major"` or `"minor"`
    pub scale: String,
    /// Profile correlation of the detected key
    pub strength: f32,
    /// Camelot wheel position, e.g. `"8B"`
    pub camelot: String,
    pub bpm_exact: f32,
    pub bpm_confidence: f32,
    /// Beat positions in seconds from the start of the window
    pub beats: Vec<f32>,
}

impl From<&Extraction> for DetailedReport {
    fn from(extraction: &Extraction) -> Self {
        let TempoKey { key, bpm } = TempoKey::from(extraction);
        let detected = extraction.key.key;

        Self {
            key,
            bpm,
            scale: detected.scale().to_string(),
            strength: extraction.key.strength,
            camelot: CamelotKey::from_musical_key(detected).to_string(),
            bpm_exact: extraction.tempo.bpm,
            bpm_confidence: extraction.tempo.confidence,
            beats: extraction.tempo.grid.beat_times(extraction.segment_secs),
        }
    }
}

/// Round to the nearest whole BPM, ties to even (120.5 -> 120, 121.5 -> 122)
pub fn round_bpm(bpm: f32) -> i64 {
    bpm.round_ties_even() as i64
}

/// Serialize a report as one compact JSON line
pub fn to_json_line<T: Serialize>(report: &T) -> serde_json::Result<String> {
    serde_json::to_string(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempokey_analysis::{BeatGrid, DetectedKey, MusicalKey, TempoEstimate};

    fn extraction() -> Extraction {
        Extraction {
            key: DetectedKey {
                key: MusicalKey::minor_from_pitch_class(10),
                strength: 0.82,
            },
            tempo: TempoEstimate {
                bpm: 127.6,
                confidence: 0.5,
                grid: BeatGrid::new(127.6, 0.1),
            },
            segment_secs: 2.0,
        }
    }

    #[test]
    fn test_round_bpm_ties_to_even() {
        assert_eq!(round_bpm(120.5), 120);
        assert_eq!(round_bpm(121.5), 122);
        assert_eq!(round_bpm(127.6), 128);
        assert_eq!(round_bpm(99.4), 99);
    }

    #[test]
    fn test_tempo_key_json_shape() {
        let report = TempoKey::from(&extraction());
        assert_eq!(
            to_json_line(&report).unwrap(),
            r#"{"key":"A#","bpm":128}"#
        );
    }

    #[test]
    fn test_tempo_key_parses_back() {
        let parsed: TempoKey = serde_json::from_str(r#"{"key": "C", "bpm": 124}"#).unwrap();
        assert_eq!(
            parsed,
            TempoKey {
                key: "C".to_string(),
                bpm: 124
            }
        );
    }

    #[test]
    fn test_detailed_report() {
        let report = DetailedReport::from(&extraction());
        assert_eq!(report.key, "A#");
        assert_eq!(report.scale, "minor");
        assert_eq!(report.camelot, "3A");
        assert_eq!(report.bpm, 128);
        // 0.1s plus multiples of 60/127.6 inside 2 seconds
        assert_eq!(report.beats.len(), 5);
    }
}

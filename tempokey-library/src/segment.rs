//! The fixed analysis window
//!
//! Key and tempo are estimated from seconds 10-30 of a track, which skips
//! most intros while staying short enough to analyze quickly.

use std::ops::Range;

/// Sample rate every track is decoded to before analysis
pub const ANALYSIS_SAMPLE_RATE: u32 = 44100;

/// Offset of the analysis window from the start of the track
pub const SEGMENT_START_SECS: usize = 10;

/// Length of the analysis window
pub const SEGMENT_DURATION_SECS: usize = 20;

/// Sample range of the analysis window at `sample_rate`
///
/// 441,000..1,323,000 at 44.1kHz.
pub fn segment_bounds(sample_rate: u32) -> Range<usize> {
    let start = SEGMENT_START_SECS * sample_rate as usize;
    start..start + SEGMENT_DURATION_SECS * sample_rate as usize
}

/// Slice the analysis window out of a mono buffer
///
/// Both bounds clamp to the buffer: a track shorter than 30 seconds yields
/// a shorter window, one shorter than 10 seconds an empty one.
pub fn analysis_segment(samples: &[f32], sample_rate: u32) -> &[f32] {
    let bounds = segment_bounds(sample_rate);
    let end = bounds.end.min(samples.len());
    let start = bounds.start.min(end);
    &samples[start..end]
}

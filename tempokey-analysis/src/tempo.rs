//! Tempo estimation and beat grid alignment
//!
//! BPM comes from autocorrelation of a spectral flux onset envelope; the
//! beat grid is phase-aligned to the strongest onset peaks.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Minimum audio length the analyzer accepts
const MIN_DURATION_SECS: usize = 4;

/// Minimum number of onset envelope frames needed for autocorrelation
const MIN_ONSET_FRAMES: usize = 100;

/// Beats checked when scoring a candidate first beat
const ALIGNMENT_BEATS: usize = 16;

/// Inclusive BPM search range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoRange {
    pub min_bpm: f32,
    pub max_bpm: f32,
}

impl Default for TempoRange {
    fn default() -> Self {
        Self {
            min_bpm: 60.0,
            max_bpm: 200.0,
        }
    }
}

impl TempoRange {
    pub fn contains(&self, bpm: f32) -> bool {
        (self.min_bpm..=self.max_bpm).contains(&bpm)
    }
}

/// A constant-tempo beat grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatGrid {
    /// BPM of the grid
    pub bpm: f32,
    /// Position of the first beat in seconds
    pub first_beat_secs: f32,
}

impl BeatGrid {
    pub fn new(bpm: f32, first_beat_secs: f32) -> Self {
        Self {
            bpm,
            first_beat_secs,
        }
    }

    /// Seconds per beat
    pub fn beat_period(&self) -> f32 {
        60.0 / self.bpm
    }

    /// Beat positions in seconds from the first beat up to `duration_secs`
    pub fn beat_times(&self, duration_secs: f32) -> Vec<f32> {
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Vec::new();
        }

        let period = self.beat_period();
        (0..)
            .map(|n| self.first_beat_secs + n as f32 * period)
            .take_while(|&t| t < duration_secs)
            .collect()
    }
}

/// Result of tempo analysis
#[derive(Debug, Clone, PartialEq)]
pub struct TempoEstimate {
    /// Estimated tempo in beats per minute
    pub bpm: f32,
    /// Autocorrelation strength at the chosen period (0.0 - 1.0)
    pub confidence: f32,
    /// Beat grid aligned to the detected onsets
    pub grid: BeatGrid,
}

/// Analyzer estimating tempo from mono audio using spectral flux onset detection
pub struct TempoAnalyzer {
    sample_rate: u32,
    hop_size: usize,
    fft_size: usize,
    range: TempoRange,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
}

impl TempoAnalyzer {
    /// Create a tempo analyzer searching the default 60-200 BPM range
    pub fn new(sample_rate: u32) -> Self {
        Self::with_range(sample_rate, TempoRange::default())
    }

    /// Create a tempo analyzer searching a specific BPM range
    pub fn with_range(sample_rate: u32, range: TempoRange) -> Self {
        let fft_size = 2048;
        let hop_size = 512; // ~11.6ms at 44.1kHz - good for transient detection
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
            .collect();

        Self {
            sample_rate,
            hop_size,
            fft_size,
            range,
            fft,
            window,
        }
    }

    /// Onset envelope frames per second
    fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop_size as f32
    }

    /// Analyze mono audio samples and estimate the tempo
    ///
    /// Returns None for less than four seconds of audio or when the onset
    /// envelope is flat (silence, sustained tones without transients).
    pub fn analyze(&self, samples: &[f32]) -> Option<TempoEstimate> {
        if samples.len() < self.sample_rate as usize * MIN_DURATION_SECS {
            return None;
        }

        let onset_function = self.compute_onset_function(samples);
        if onset_function.len() < MIN_ONSET_FRAMES || onset_function.iter().all(|&v| v <= 0.0) {
            return None;
        }

        let onsets = self.find_onset_peaks(&onset_function);
        let (bpm, confidence) = self.estimate_bpm_autocorrelation(&onset_function)?;
        let first_beat_secs = self.find_first_beat(&onsets, bpm);

        tracing::debug!(
            bpm,
            confidence,
            first_beat_secs,
            onsets = onsets.len(),
            "tempo estimate"
        );

        Some(TempoEstimate {
            bpm,
            confidence,
            grid: BeatGrid::new(bpm, first_beat_secs),
        })
    }

    /// Compute spectral flux onset detection function, normalized to peak 1.0
    ///
    /// Only increases in magnitude count; decreases don't indicate onsets.
    fn compute_onset_function(&self, samples: &[f32]) -> Vec<f32> {
        let bins = self.fft_size / 2;
        let mut onset_fn = Vec::with_capacity(samples.len() / self.hop_size);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_size];
        let mut spectrum = vec![0.0f32; bins];
        let mut prev_spectrum: Option<Vec<f32>> = None;

        let mut frame_start = 0;
        while frame_start + self.fft_size <= samples.len() {
            let frame = &samples[frame_start..frame_start + self.fft_size];
            for ((slot, s), w) in buffer.iter_mut().zip(frame).zip(&self.window) {
                *slot = Complex::new(s * w, 0.0);
            }

            self.fft.process(&mut buffer);

            for (mag, c) in spectrum.iter_mut().zip(&buffer[..bins]) {
                *mag = c.norm();
            }

            match prev_spectrum.as_mut() {
                Some(prev) => {
                    let flux: f32 = spectrum
                        .iter()
                        .zip(prev.iter())
                        .map(|(curr, prev)| (curr - prev).max(0.0))
                        .sum();
                    onset_fn.push(flux);
                    prev.copy_from_slice(&spectrum);
                }
                None => prev_spectrum = Some(spectrum.clone()),
            }

            frame_start += self.hop_size;
        }

        let max = onset_fn.iter().cloned().fold(0.0f32, f32::max);
        if max > 0.0 {
            for v in &mut onset_fn {
                *v /= max;
            }
        }

        onset_fn
    }

    /// Find peaks in the onset detection function
    ///
    /// Adaptive threshold of mean + 0.5 * std_dev, peaks at least 50ms apart.
    fn find_onset_peaks(&self, onset_fn: &[f32]) -> Vec<usize> {
        let mean: f32 = onset_fn.iter().sum::<f32>() / onset_fn.len() as f32;
        let variance: f32 =
            onset_fn.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / onset_fn.len() as f32;
        let threshold = (mean + 0.5 * variance.sqrt()).max(0.1);

        let min_distance = ((self.frame_rate() * 0.05) as usize).max(1);

        let mut peaks = Vec::new();
        let mut last_peak: Option<usize> = None;

        for i in 1..onset_fn.len().saturating_sub(1) {
            let far_enough = last_peak.map_or(true, |last| i - last >= min_distance);
            if onset_fn[i] > threshold
                && onset_fn[i] > onset_fn[i - 1]
                && onset_fn[i] >= onset_fn[i + 1]
                && far_enough
            {
                peaks.push(i);
                last_peak = Some(i);
            }
        }

        peaks
    }

    /// Normalized correlation of the envelope with itself at `lag`
    fn correlation_at_lag(&self, onset_fn: &[f32], lag: usize) -> f32 {
        if lag == 0 || lag >= onset_fn.len() / 2 {
            return 0.0;
        }

        let mut correlation: f32 = 0.0;
        let mut norm_a: f32 = 0.0;
        let mut norm_b: f32 = 0.0;

        for (a, b) in onset_fn.iter().zip(&onset_fn[lag..]) {
            correlation += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let norm = (norm_a * norm_b).sqrt();
        if norm > 0.0 {
            correlation / norm
        } else {
            0.0
        }
    }

    /// Estimate BPM using autocorrelation of the onset function
    ///
    /// The lag with highest correlation is the beat period; a parabola
    /// through its neighbours refines it below one frame.
    fn estimate_bpm_autocorrelation(&self, onset_fn: &[f32]) -> Option<(f32, f32)> {
        let frames_per_second = self.frame_rate();
        let min_lag = ((frames_per_second * 60.0 / self.range.max_bpm) as usize).max(1);
        let max_lag = (frames_per_second * 60.0 / self.range.min_bpm).ceil() as usize;
        let max_lag = max_lag.min(onset_fn.len() / 2 - 1);

        if min_lag >= max_lag {
            return None;
        }

        let correlations: Vec<f32> = (min_lag..=max_lag)
            .map(|lag| self.correlation_at_lag(onset_fn, lag))
            .collect();

        let (best_idx, best_correlation) = correlations
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, c)| if c > best.1 { (i, c) } else { best });

        if best_correlation <= 0.0 {
            return None;
        }

        let best_lag = (min_lag + best_idx) as f32
            + parabolic_offset(
                self.correlation_at_lag(onset_fn, min_lag + best_idx - 1),
                best_correlation,
                self.correlation_at_lag(onset_fn, min_lag + best_idx + 1),
            );

        let raw_bpm = 60.0 * frames_per_second / best_lag;
        let bpm = self.disambiguate_octave(onset_fn, raw_bpm, frames_per_second);

        Some((bpm, best_correlation.clamp(0.0, 1.0)))
    }

    /// Disambiguate between octave-related BPM values (e.g., 77 vs 154)
    ///
    /// For dance/electronic music the higher tempo is usually correct when
    /// the doubled period correlates nearly as well.
    fn disambiguate_octave(&self, onset_fn: &[f32], raw_bpm: f32, frames_per_second: f32) -> f32 {
        let lag_for = |bpm: f32| (frames_per_second * 60.0 / bpm).round() as usize;

        if raw_bpm < 65.0 && self.range.contains(raw_bpm * 2.0) {
            return raw_bpm * 2.0;
        }

        if raw_bpm > 185.0 && self.range.contains(raw_bpm / 2.0) {
            return raw_bpm / 2.0;
        }

        if (65.0..=95.0).contains(&raw_bpm) {
            let doubled_bpm = raw_bpm * 2.0;
            let original_corr = self.correlation_at_lag(onset_fn, lag_for(raw_bpm));
            let doubled_corr = self.correlation_at_lag(onset_fn, lag_for(doubled_bpm));

            let doubled_is_reasonable =
                (120.0..=180.0).contains(&doubled_bpm) && self.range.contains(doubled_bpm);
            let correlation_ratio = doubled_corr / original_corr.max(0.001);

            if doubled_is_reasonable && correlation_ratio > 0.7 {
                return doubled_bpm;
            }
        }

        // Only halve 170-185 when the half-tempo period is clearly stronger
        if (170.0..=185.0).contains(&raw_bpm) {
            let halved_bpm = raw_bpm / 2.0;
            let original_corr = self.correlation_at_lag(onset_fn, lag_for(raw_bpm));
            let halved_corr = self.correlation_at_lag(onset_fn, lag_for(halved_bpm));

            if self.range.contains(halved_bpm) && halved_corr > original_corr * 1.2 {
                return halved_bpm;
            }
        }

        raw_bpm
    }

    /// Find the first beat by aligning a beat grid to the strongest onsets
    ///
    /// Each of the first 32 onsets is scored by how many of the following
    /// beats land on a detected onset, earlier beats weighing more.
    fn find_first_beat(&self, onsets: &[usize], bpm: f32) -> f32 {
        let Some(&first) = onsets.first() else {
            return 0.0;
        };

        let frames_per_second = self.frame_rate();
        let beat_interval = frames_per_second * 60.0 / bpm;
        if beat_interval < 1.0 {
            return 0.0;
        }
        let tolerance = (beat_interval / 6.0).round() as usize;

        let mut best_onset = first;
        let mut best_score = 0.0f32;

        for &onset in onsets.iter().take(32) {
            let score: f32 = (0..ALIGNMENT_BEATS)
                .filter(|&beat_num| {
                    let expected = (onset as f32 + beat_num as f32 * beat_interval).round() as usize;
                    onsets.iter().any(|&actual| actual.abs_diff(expected) <= tolerance)
                })
                .map(|beat_num| 1.0 / (beat_num as f32 + 1.0))
                .sum();

            if score > best_score {
                best_score = score;
                best_onset = onset;
            }
        }

        // Flux index i measures the change into frame i + 1; report the frame centre
        ((best_onset + 1) * self.hop_size + self.fft_size / 2) as f32 / self.sample_rate as f32
    }
}

/// Vertex offset (-0.5 - 0.5) of the parabola through three equally spaced points
fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if denom >= 0.0 {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decaying 1kHz blips on every beat
    fn click_track(bpm: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds) as usize;
        let period = 60.0 / bpm;
        let click_len = (sample_rate as f32 * 0.03) as usize;
        let mut samples = vec![0.0f32; len];

        let mut beat = 0.0f32;
        while beat < seconds {
            let start = (beat * sample_rate as f32) as usize;
            for i in 0..click_len {
                if let Some(s) = samples.get_mut(start + i) {
                    let t = i as f32 / sample_rate as f32;
                    *s = 0.8 * (-t * 150.0).exp() * (2.0 * PI * 1000.0 * t).sin();
                }
            }
            beat += period;
        }

        samples
    }

    #[test]
    fn test_beat_grid_period() {
        assert!((BeatGrid::new(120.0, 0.0).beat_period() - 0.5).abs() < 1e-6);
        assert!((BeatGrid::new(128.0, 0.3).beat_period() - 0.46875).abs() < 1e-6);
    }

    #[test]
    fn test_beat_times_start_at_offset() {
        let beats = BeatGrid::new(120.0, 0.5).beat_times(1.6);
        assert_eq!(beats.len(), 3);
        assert!((beats[0] - 0.5).abs() < 1e-6);
        assert!((beats[2] - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_beat_times() {
        let grid = BeatGrid::new(120.0, 0.25);
        let beats = grid.beat_times(2.0);
        assert_eq!(beats.len(), 4);
        assert!((beats[3] - 1.75).abs() < 1e-5);

        assert!(BeatGrid::new(0.0, 0.0).beat_times(10.0).is_empty());
    }

    #[test]
    fn test_tempo_range_contains() {
        let range = TempoRange::default();
        assert!(range.contains(60.0));
        assert!(range.contains(200.0));
        assert!(!range.contains(201.0));
    }

    #[test]
    fn test_parabolic_offset() {
        assert_eq!(parabolic_offset(1.0, 2.0, 1.0), 0.0);
        assert!(parabolic_offset(1.0, 2.0, 1.5) > 0.0);
        assert!(parabolic_offset(1.5, 2.0, 1.0) < 0.0);
        // Not a maximum
        assert_eq!(parabolic_offset(2.0, 1.0, 2.0), 0.0);
    }

    #[test]
    fn test_analyze_insufficient_audio() {
        let analyzer = TempoAnalyzer::new(44100);
        assert!(analyzer.analyze(&vec![0.0; 44100]).is_none());
    }

    #[test]
    fn test_analyze_silence() {
        let analyzer = TempoAnalyzer::new(44100);
        assert!(analyzer.analyze(&vec![0.0; 44100 * 6]).is_none());
    }

    #[test]
    fn test_detect_120_bpm_clicks() {
        let analyzer = TempoAnalyzer::new(44100);
        let samples = click_track(120.0, 44100, 20.0);

        let estimate = analyzer.analyze(&samples).expect("tempo");
        assert!(
            (estimate.bpm - 120.0).abs() < 2.0,
            "expected ~120 BPM, got {}",
            estimate.bpm
        );
        assert!(estimate.confidence > 0.0 && estimate.confidence <= 1.0);
    }

    #[test]
    fn test_detect_128_bpm_clicks() {
        let analyzer = TempoAnalyzer::new(44100);
        let samples = click_track(128.0, 44100, 20.0);

        let estimate = analyzer.analyze(&samples).expect("tempo");
        assert!(
            (estimate.bpm - 128.0).abs() < 2.0,
            "expected ~128 BPM, got {}",
            estimate.bpm
        );
    }

    #[test]
    fn test_first_beat_follows_click_offset() {
        let analyzer = TempoAnalyzer::new(44100);
        let mut samples = vec![0.0f32; 44100 / 4];
        samples.extend(click_track(120.0, 44100, 12.0));

        let estimate = analyzer.analyze(&samples).expect("tempo");
        // Within one beat period of the range start, near a click
        let phase = (estimate.grid.first_beat_secs - 0.25).rem_euclid(0.5) / 0.5;
        assert!(
            phase < 0.15 || phase > 0.85,
            "first beat {} is off the click grid",
            estimate.grid.first_beat_secs
        );
    }
}

//! Key detection using chromagram analysis
//!
//! Implements key-finding via chromagram correlation:
//! 1. Compute chromagram (12-bin pitch class distribution) via STFT
//! 2. Correlate with rotated major/minor key profiles
//! 3. Return the best matching key with its correlation strength

use crate::pitch::MusicalKey;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Detected key with strength score
#[derive(Debug, Clone, Copy)]
pub struct DetectedKey {
    /// The detected musical key
    pub key: MusicalKey,
    /// Pearson correlation with the winning profile (-1.0 - 1.0)
    pub strength: f32,
}

/// Tonal profile set used for key correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyProfile {
    /// Sha'ath (2011), tuned for electronic/dance music (from libKeyFinder)
    #[default]
    Shaath,
    /// Krumhansl-Kessler (1982) probe-tone ratings
    Krumhansl,
}

impl KeyProfile {
    /// Major profile, index 0 = tonic
    pub fn major(&self) -> &'static [f32; 12] {
        match self {
            KeyProfile::Shaath => &SHAATH_MAJOR,
            KeyProfile::Krumhansl => &KRUMHANSL_MAJOR,
        }
    }

    /// Minor profile, index 0 = tonic
    pub fn minor(&self) -> &'static [f32; 12] {
        match self {
            KeyProfile::Shaath => &SHAATH_MINOR,
            KeyProfile::Krumhansl => &KRUMHANSL_MINOR,
        }
    }
}

//                       I    m2   M2   m3   M3   P4   TT   P5   m6   M6   m7   M7
const SHAATH_MAJOR: [f32; 12] = [6.6, 2.0, 3.5, 2.3, 4.6, 4.0, 2.5, 5.2, 2.4, 3.7, 2.3, 3.4];
const SHAATH_MINOR: [f32; 12] = [6.5, 2.8, 3.5, 5.4, 2.7, 3.5, 2.5, 5.2, 4.0, 2.7, 4.3, 3.2];
const KRUMHANSL_MAJOR: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const KRUMHANSL_MINOR: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Reference frequency for A4 (440 Hz)
const A4_FREQ: f32 = 440.0;

/// Minimum audio length the analyzer accepts
const MIN_DURATION_SECS: usize = 2;

/// Key analyzer using chromagram-based detection on mono audio
pub struct KeyAnalyzer {
    sample_rate: u32,
    fft_size: usize,
    hop_size: usize,
    profile: KeyProfile,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    /// Pre-computed bin-to-pitch-class mapping
    bin_to_pitch_class: Vec<Option<u8>>,
    /// Pre-computed bin weights (harmonic emphasis and octave decay)
    bin_weights: Vec<f32>,
    /// Reused per frame
    fft_buffer: Vec<Complex<f32>>,
}

impl KeyAnalyzer {
    /// Create a new key analyzer with the default profile
    ///
    /// Uses a 16384-sample FFT (~2.7Hz bins at 44.1kHz) so neighbouring
    /// semitones stay in separate bins down to A1.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_profile(sample_rate, KeyProfile::default())
    }

    /// Create a key analyzer correlating against a specific profile set
    pub fn with_profile(sample_rate: u32, profile: KeyProfile) -> Self {
        let fft_size = 16384;
        let hop_size = 8192;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
            .collect();

        let (bin_to_pitch_class, bin_weights) =
            Self::compute_pitch_class_mapping(fft_size, sample_rate);

        Self {
            sample_rate,
            fft_size,
            hop_size,
            profile,
            fft,
            window,
            bin_to_pitch_class,
            bin_weights,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Map FFT bins to their closest pitch class (0-11, where 0=C)
    ///
    /// Weights combine detune (1.0 on an exact pitch, 0.0 half a semitone
    /// off) with ~6dB/octave decay above 500Hz.
    fn compute_pitch_class_mapping(
        fft_size: usize,
        sample_rate: u32,
    ) -> (Vec<Option<u8>>, Vec<f32>) {
        let nyquist = sample_rate as f32 / 2.0;
        let bin_freq = |bin: usize| -> f32 { bin as f32 * sample_rate as f32 / fft_size as f32 };

        let mut mapping = Vec::with_capacity(fft_size / 2);
        let mut weights = Vec::with_capacity(fft_size / 2);

        // A1 up to roughly B7
        let min_freq = 55.0;
        let max_freq = 4000.0;

        for bin in 0..fft_size / 2 {
            let freq = bin_freq(bin);

            if freq < min_freq || freq > max_freq || freq >= nyquist {
                mapping.push(None);
                weights.push(0.0);
                continue;
            }

            let midi_note = 12.0 * (freq / A4_FREQ).log2() + 69.0;
            let exact_note = midi_note.round();
            let pitch_class = ((exact_note as i32 % 12 + 12) % 12) as u8;

            let detune = (midi_note - exact_note).abs();
            let harmonic_weight = 1.0 - detune.min(0.5) * 2.0;
            let octave_decay = (500.0 / freq.max(500.0)).sqrt();

            mapping.push(Some(pitch_class));
            weights.push(harmonic_weight.max(0.0) * octave_decay);
        }

        (mapping, weights)
    }

    /// Analyze mono audio samples and detect the musical key
    ///
    /// Returns None for less than two seconds of audio or when the
    /// chromagram carries no energy (silence, content outside 55Hz-4kHz).
    pub fn analyze(&mut self, samples: &[f32]) -> Option<DetectedKey> {
        if samples.len() < self.sample_rate as usize * MIN_DURATION_SECS {
            return None;
        }

        let chromagram = self.compute_chromagram(samples)?;
        let (key, strength) = self.match_key_profile(&chromagram);

        tracing::debug!(%key, strength, "key profile match");

        Some(DetectedKey { key, strength })
    }

    /// Compute the chromagram normalized to unit sum
    fn compute_chromagram(&mut self, samples: &[f32]) -> Option<[f32; 12]> {
        let mut chroma = [0.0f32; 12];
        let mut frame_count = 0usize;

        let mut pos = 0;
        while pos + self.fft_size <= samples.len() {
            let frame_chroma = self.analyze_frame(pos, samples);
            for (acc, v) in chroma.iter_mut().zip(frame_chroma) {
                *acc += v;
            }
            frame_count += 1;
            pos += self.hop_size;
        }

        let sum: f32 = chroma.iter().sum();
        if frame_count == 0 || !sum.is_finite() || sum <= 0.0 {
            return None;
        }

        // Unit sum also removes the per-frame averaging factor
        for v in &mut chroma {
            *v /= sum;
        }

        Some(chroma)
    }

    /// Chromagram contribution of the frame starting at `pos`
    fn analyze_frame(&mut self, pos: usize, samples: &[f32]) -> [f32; 12] {
        let frame = &samples[pos..pos + self.fft_size];
        for ((slot, s), w) in self.fft_buffer.iter_mut().zip(frame).zip(&self.window) {
            *slot = Complex::new(s * w, 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        let mut chroma = [0.0f32; 12];
        for (bin, complex) in self.fft_buffer[..self.fft_size / 2].iter().enumerate() {
            if let Some(pitch_class) = self.bin_to_pitch_class[bin] {
                // Squared magnitude: only relative energies matter
                chroma[pitch_class as usize] += complex.norm_sqr() * self.bin_weights[bin];
            }
        }

        chroma
    }

    /// Match the chromagram against all 24 key profiles
    fn match_key_profile(&self, chroma: &[f32; 12]) -> (MusicalKey, f32) {
        let mut best_key = MusicalKey::major_from_pitch_class(0);
        let mut best_correlation = f32::MIN;

        for root in 0..12u8 {
            let rotated = rotate_chroma(chroma, root);

            let major_corr = correlate(&rotated, self.profile.major());
            if major_corr > best_correlation {
                best_correlation = major_corr;
                best_key = MusicalKey::major_from_pitch_class(root);
            }

            let minor_corr = correlate(&rotated, self.profile.minor());
            if minor_corr > best_correlation {
                best_correlation = minor_corr;
                best_key = MusicalKey::minor_from_pitch_class(root);
            }
        }

        (best_key, best_correlation.clamp(-1.0, 1.0))
    }
}

/// Rotate chromagram so that the given pitch class becomes index 0
fn rotate_chroma(chroma: &[f32; 12], root: u8) -> [f32; 12] {
    let mut rotated = [0.0f32; 12];
    for (i, slot) in rotated.iter_mut().enumerate() {
        *slot = chroma[(i + root as usize) % 12];
    }
    rotated
}

/// Pearson correlation coefficient between two 12-element vectors
fn correlate(a: &[f32; 12], b: &[f32; 12]) -> f32 {
    let mean_a: f32 = a.iter().sum::<f32>() / 12.0;
    let mean_b: f32 = b.iter().sum::<f32>() / 12.0;

    let mut numerator = 0.0f32;
    let mut denom_a = 0.0f32;
    let mut denom_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        numerator += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    let denom = (denom_a * denom_b).sqrt();
    if denom > 0.0 {
        numerator / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(freqs: &[f32], sample_rate: u32, seconds: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds) as usize;
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() / freqs.len() as f32
            })
            .collect()
    }

    #[test]
    fn test_analyzer_creation() {
        let analyzer = KeyAnalyzer::new(44100);
        assert_eq!(analyzer.sample_rate, 44100);
        assert_eq!(analyzer.fft_size, 16384);
        assert_eq!(analyzer.profile, KeyProfile::Shaath);
    }

    #[test]
    fn test_pitch_class_mapping() {
        let analyzer = KeyAnalyzer::new(44100);
        assert!(analyzer.bin_to_pitch_class.iter().any(|pc| pc.is_some()));
        // DC and sub-bass bins are excluded
        assert_eq!(analyzer.bin_to_pitch_class[0], None);
        assert_eq!(analyzer.bin_weights[0], 0.0);
    }

    #[test]
    fn test_rotate_chroma() {
        let chroma = [
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
        ];

        assert_eq!(rotate_chroma(&chroma, 0), chroma);

        let rotated = rotate_chroma(&chroma, 1);
        assert_eq!(rotated[0], 2.0);
        assert_eq!(rotated[11], 1.0);
    }

    #[test]
    fn test_correlate_perfect_and_inverse() {
        let a = [
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
        ];
        let mut b = a;
        b.reverse();

        assert!((correlate(&a, &a) - 1.0).abs() < 0.001);
        assert!(correlate(&a, &b) < 0.0);
    }

    #[test]
    fn test_correlate_flat_vector() {
        let flat = [1.0; 12];
        assert_eq!(correlate(&flat, KeyProfile::Shaath.major()), 0.0);
    }

    #[test]
    fn test_analyze_insufficient_audio() {
        let mut analyzer = KeyAnalyzer::new(44100);
        assert!(analyzer.analyze(&vec![0.1f32; 1000]).is_none());
    }

    #[test]
    fn test_analyze_silence() {
        let mut analyzer = KeyAnalyzer::new(44100);
        assert!(analyzer.analyze(&vec![0.0f32; 44100 * 3]).is_none());
    }

    #[test]
    fn test_profile_matches_its_own_template() {
        let analyzer = KeyAnalyzer::new(44100);
        // D minor: the minor template rotated so its tonic lands on D
        let template = KeyProfile::Shaath.minor();
        let mut chroma = [0.0f32; 12];
        for (i, v) in template.iter().enumerate() {
            chroma[(i + 2) % 12] = *v;
        }

        let (key, strength) = analyzer.match_key_profile(&chroma);
        assert_eq!(key, MusicalKey::minor_from_pitch_class(2));
        assert!((strength - 1.0).abs() < 0.001);
    }

    fn assert_detects(freqs: &[f32], expected: MusicalKey) {
        let sample_rate = 44100;
        let mut analyzer = KeyAnalyzer::new(sample_rate);
        let samples = chord(freqs, sample_rate, 6.0);

        let detected = analyzer.analyze(&samples).expect("key");
        assert_eq!(
            detected.key, expected,
            "expected {} {}, got {} {} (strength {})",
            expected.tonic(),
            expected.scale(),
            detected.key.tonic(),
            detected.key.scale(),
            detected.strength
        );
    }

    #[test]
    fn test_detect_c_major_triad() {
        // C4 + E4 + G4
        assert_detects(&[261.63, 329.63, 392.00], MusicalKey::major_from_pitch_class(0));
    }

    #[test]
    fn test_detect_a_minor_triad() {
        // A3 + C4 + E4
        assert_detects(&[220.00, 261.63, 329.63], MusicalKey::minor_from_pitch_class(9));
    }

    #[test]
    fn test_detect_low_g_major_triad() {
        // G3 + B3 + D4: neighbouring semitones sit only ~11Hz apart here
        assert_detects(&[196.00, 246.94, 293.66], MusicalKey::major_from_pitch_class(7));
    }

    #[test]
    fn test_detect_low_d_minor_triad() {
        // D3 + F3 + A3
        assert_detects(&[146.83, 174.61, 220.00], MusicalKey::minor_from_pitch_class(2));
    }

    #[test]
    fn test_bins_resolve_semitones_at_a1() {
        let analyzer = KeyAnalyzer::new(44100);
        let bin_width = 44100.0 / analyzer.fft_size as f32;
        // A1 (55Hz) to A#1 is ~3.3Hz
        assert!(bin_width < 55.0 * (2f32.powf(1.0 / 12.0) - 1.0));
    }

    #[test]
    fn test_krumhansl_profile_matches_its_own_template() {
        let analyzer = KeyAnalyzer::with_profile(44100, KeyProfile::Krumhansl);
        // F# major
        let mut chroma = [0.0f32; 12];
        for (i, v) in KeyProfile::Krumhansl.major().iter().enumerate() {
            chroma[(i + 6) % 12] = *v;
        }

        let (key, strength) = analyzer.match_key_profile(&chroma);
        assert_eq!(key, MusicalKey::major_from_pitch_class(6));
        assert!((strength - 1.0).abs() < 0.001);
    }
}

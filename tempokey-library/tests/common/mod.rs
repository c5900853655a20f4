//! Synthetic WAV fixtures

use std::f32::consts::PI;
use std::io::BufWriter;

use tempfile::NamedTempFile;

/// C4 + E4 + G4
pub const C_MAJOR_TRIAD: [f32; 3] = [261.63, 329.63, 392.00];

/// A sustained chord with a decaying 1kHz click on every beat
pub fn chord_with_clicks(chord: &[f32], bpm: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let len = (sample_rate as f32 * seconds) as usize;
    let beat_samples = 60.0 / bpm * sample_rate as f32;

    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let tone: f32 = chord.iter().map(|f| 0.1 * (2.0 * PI * f * t).sin()).sum();

            let since_beat = (i as f32 % beat_samples) / sample_rate as f32;
            let click = if since_beat < 0.03 {
                0.6 * (-since_beat * 150.0).exp() * (2.0 * PI * 1000.0 * since_beat).sin()
            } else {
                0.0
            };

            tone + click
        })
        .collect()
}

/// Write mono samples as 16-bit PCM, duplicating them across `channels`
pub fn write_wav(samples: &[f32], sample_rate: u32, channels: u16) -> NamedTempFile {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let temp_file = tempfile::Builder::new()
        .prefix("tempokey_")
        .suffix(".wav")
        .tempfile()
        .expect("create temp wav");

    let mut writer = hound::WavWriter::new(
        BufWriter::new(temp_file.reopen().expect("reopen temp wav")),
        spec,
    )
    .expect("wav writer");

    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        for _ in 0..channels {
            writer.write_sample(value).expect("write sample");
        }
    }
    writer.finalize().expect("finalize wav");

    temp_file
}

//! Audio file loading and decoding to a mono buffer

use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::segment::ANALYSIS_SAMPLE_RATE;

/// Errors that can occur during track loading
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error("File contains no audio samples")]
    Empty,
}

/// A decoded track downmixed to one channel
#[derive(Debug, Clone)]
pub struct MonoTrack {
    /// Mono samples (f32, normalized to -1.0 to 1.0)
    pub samples: Vec<f32>,
    /// Sample rate of `samples` in Hz
    pub sample_rate: u32,
    /// Sample rate of the file before resampling
    pub source_sample_rate: u32,
    /// Channel count of the file before downmixing
    pub source_channels: u16,
    /// Duration in seconds
    pub duration_secs: f64,
}

/// Audio file loader producing mono audio at a fixed rate
pub struct MonoLoader {
    target_sample_rate: u32,
}

impl Default for MonoLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoLoader {
    /// Create a new loader targeting the 44.1kHz analysis rate
    pub fn new() -> Self {
        Self::with_sample_rate(ANALYSIS_SAMPLE_RATE)
    }

    /// Create a new loader with specific sample rate
    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Load, decode and downmix an audio file
    pub fn load(&self, path: &Path) -> Result<MonoTrack, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut source_sample_rate = codec_params.sample_rate.unwrap_or(ANALYSIS_SAMPLE_RATE);
        let mut source_channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        tracing::debug!(
            path = %path.display(),
            source_sample_rate,
            source_channels,
            "decoding track"
        );

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(e) => {
                    end_of_stream(e, !samples.is_empty())?;
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    tracing::warn!(msg, "skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            source_sample_rate = spec.rate;
            source_channels = spec.channels.count() as u16;

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            downmix_into(&mut samples, sample_buf.samples(), source_channels as usize);
        }

        if samples.is_empty() {
            return Err(LoadError::Empty);
        }

        let duration_secs = samples.len() as f64 / source_sample_rate as f64;

        let (samples, sample_rate) = if source_sample_rate != self.target_sample_rate {
            (
                self.resample(&samples, source_sample_rate)?,
                self.target_sample_rate,
            )
        } else {
            (samples, source_sample_rate)
        };

        tracing::debug!(
            frames = samples.len(),
            sample_rate,
            duration_secs,
            "decoded track"
        );

        Ok(MonoTrack {
            samples,
            sample_rate,
            source_sample_rate,
            source_channels,
            duration_secs,
        })
    }

    /// Resample mono audio to the target sample rate
    fn resample(&self, samples: &[f32], source_rate: u32) -> Result<Vec<f32>, LoadError> {
        use rubato::{FftFixedInOut, Resampler};

        let mut resampler = FftFixedInOut::<f32>::new(
            source_rate as usize,
            self.target_sample_rate as usize,
            1024,
            1,
        )
        .map_err(|e| LoadError::Resample(e.to_string()))?;

        let expected_frames =
            (samples.len() as u64 * self.target_sample_rate as u64 / source_rate as u64) as usize;
        let delay = resampler.output_delay();
        let needed = delay + expected_frames;
        let mut output: Vec<f32> = Vec::with_capacity(needed + 1024);

        let chunk_size = resampler.input_frames_next();
        let mut chunks = samples.chunks_exact(chunk_size);

        for chunk in chunks.by_ref() {
            let resampled = resampler
                .process(&[chunk], None)
                .map_err(|e| LoadError::Resample(e.to_string()))?;
            output.extend(resampled.into_iter().flatten());
        }

        // Pad the tail with zeros
        let remainder = chunks.remainder();
        if !remainder.is_empty() {
            let mut padded = remainder.to_vec();
            padded.resize(chunk_size, 0.0);

            let resampled = resampler
                .process(&[padded], None)
                .map_err(|e| LoadError::Resample(e.to_string()))?;
            output.extend(resampled.into_iter().flatten());
        }

        // Flush the filter so the last `delay` frames come out too
        let silence = vec![0.0f32; chunk_size];
        while output.len() < needed {
            let resampled = resampler
                .process(&[silence.as_slice()], None)
                .map_err(|e| LoadError::Resample(e.to_string()))?;
            output.extend(resampled.into_iter().flatten());
        }

        // Output frame n lines up with input time n / target rate
        output.drain(..delay);
        output.truncate(expected_frames);

        Ok(output)
    }
}

/// Classify a `next_packet` error: end of stream is `Ok`
///
/// Any other error after audio has been decoded keeps what was read so far.
fn end_of_stream(err: SymphoniaError, have_samples: bool) -> Result<(), LoadError> {
    match err {
        SymphoniaError::IoError(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
        SymphoniaError::ResetRequired => Ok(()),
        e if have_samples => {
            tracing::warn!(error = %e, "stopping at unreadable packet");
            Ok(())
        }
        e => Err(LoadError::Decode(e.to_string())),
    }
}

/// Average interleaved frames into mono samples
fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

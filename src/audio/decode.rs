//! Decoding recording bytes into sample buffers.
//!
//! WAV data is read with `hound` so that 16-bit material written by
//! [`crate::audio::wav::encode_wav`] decodes back to the exact values it was
//! quantized from. Compressed formats go through `rodio`'s decoder.
//! Everything is resampled to the target rate with linear interpolation.

use crate::audio::buffer::SampleBuffer;
use crate::error::DecodeError;
use hound::{SampleFormat, WavReader};
use rodio::{Decoder, Source};
use std::io::Cursor;

/// Decodes `bytes` and resamples the result to `target_rate`.
///
/// # Errors
///
/// Returns [`DecodeError`] for unsupported or corrupt data. Nothing is
/// partially returned.
pub fn decode(bytes: &[u8], target_rate: u32) -> Result<SampleBuffer, DecodeError> {
    let buffer = if is_wav(bytes) {
        decode_wav(bytes)?
    } else {
        decode_compressed(bytes)?
    };

    if buffer.sample_rate() == target_rate {
        return Ok(buffer);
    }
    tracing::debug!(
        from = buffer.sample_rate(),
        to = target_rate,
        "resampling decoded audio"
    );
    Ok(resample(&buffer, target_rate))
}

fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channel_count = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            // Asymmetric scale mirrors the encoder: negative values span
            // 2^(n-1), non-negative values 2^(n-1) - 1.
            let negative_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            let positive_scale = negative_scale - 1.0;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        if v < 0 {
                            v as f32 / negative_scale
                        } else {
                            v as f32 / positive_scale
                        }
                    })
                })
                .collect::<Result<_, _>>()?
        }
    };

    Ok(SampleBuffer::from_interleaved(
        spec.sample_rate,
        channel_count,
        &samples,
    ))
}

fn decode_compressed(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let decoder = Decoder::new(Cursor::new(bytes.to_vec())).map_err(|e| DecodeError::Unsupported {
        reason: e.to_string(),
    })?;
    let channel_count = decoder.channels() as usize;
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();
    Ok(SampleBuffer::from_interleaved(
        sample_rate,
        channel_count,
        &samples,
    ))
}

/// Resamples every channel of `buffer` to `target_rate`.
pub fn resample(buffer: &SampleBuffer, target_rate: u32) -> SampleBuffer {
    let ratio = target_rate as f64 / buffer.sample_rate() as f64;
    let channels = buffer
        .channels()
        .iter()
        .map(|channel| resample_linear(channel, ratio))
        .collect();
    SampleBuffer::new(target_rate, channels)
}

/// Linear interpolation resampling.
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).round() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

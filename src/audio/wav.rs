//! Canonical 16-bit PCM WAV encoding.
//!
//! The layout is fixed: a 44-byte header (`RIFF`, `fmt ` with a 16-byte PCM
//! chunk, `data`) followed by interleaved little-endian `i16` samples. No
//! extensible format chunk is emitted regardless of channel count.

use crate::audio::buffer::SampleBuffer;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

/// Size of the canonical header in bytes.
pub const WAV_HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: u16 = 2;
const PCM_FORMAT: u16 = 1;

/// Converts a float sample to 16-bit PCM.
///
/// The sample is clamped to `[-1, 1]`, scaled by 32768 when negative and
/// 32767 otherwise, then truncated toward zero.
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encodes `buffer` as a WAV byte stream.
pub fn encode_wav(buffer: &SampleBuffer) -> Vec<u8> {
    let channel_count = buffer.channel_count() as u16;
    let block_align = channel_count * BYTES_PER_SAMPLE;
    let data_size = buffer.frames() * block_align as usize;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_size);

    // Writing into a Vec cannot fail.
    let _ = write_wav(&mut out, buffer);
    out
}

/// Writes `buffer` as WAV to any writer.
pub fn write_wav<W: Write>(out: &mut W, buffer: &SampleBuffer) -> io::Result<()> {
    let channel_count = buffer.channel_count() as u16;
    let sample_rate = buffer.sample_rate();
    let block_align = channel_count * BYTES_PER_SAMPLE;
    let byte_rate = sample_rate * block_align as u32;
    let data_size = (buffer.frames() * block_align as usize) as u32;
    let total_size = WAV_HEADER_LEN as u32 + data_size;

    out.write_all(b"RIFF")?;
    out.write_u32::<LittleEndian>(total_size - 8)?;
    out.write_all(b"WAVE")?;
    out.write_all(b"fmt ")?;
    out.write_u32::<LittleEndian>(16)?;
    out.write_u16::<LittleEndian>(PCM_FORMAT)?;
    out.write_u16::<LittleEndian>(channel_count)?;
    out.write_u32::<LittleEndian>(sample_rate)?;
    out.write_u32::<LittleEndian>(byte_rate)?;
    out.write_u16::<LittleEndian>(block_align)?;
    out.write_u16::<LittleEndian>(BYTES_PER_SAMPLE * 8)?;
    out.write_all(b"data")?;
    out.write_u32::<LittleEndian>(data_size)?;

    for frame in 0..buffer.frames() {
        for channel in buffer.channels() {
            out.write_i16::<LittleEndian>(quantize(channel[frame]))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    #[test]
    fn test_quantize_scaling() {
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(2.5), 32767);
        assert_eq!(quantize(-7.0), -32768);
        // Truncation, not rounding.
        assert_eq!(quantize(0.5), 16383);
        assert_eq!(quantize(-0.5), -16384);
    }

    #[test]
    fn test_one_second_mono_length() {
        let buffer = SampleBuffer::silent(44100, 1, 44100);
        let bytes = encode_wav(&buffer);
        assert_eq!(bytes.len(), 88244);
    }

    #[test]
    fn test_header_fields() {
        let buffer = SampleBuffer::silent(48000, 2, 10);
        let bytes = encode_wav(&buffer);

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(LittleEndian::read_u32(&bytes[4..8]), bytes.len() as u32 - 8);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(LittleEndian::read_u32(&bytes[16..20]), 16);
        assert_eq!(LittleEndian::read_u16(&bytes[20..22]), 1);
        assert_eq!(LittleEndian::read_u16(&bytes[22..24]), 2);
        assert_eq!(LittleEndian::read_u32(&bytes[24..28]), 48000);
        assert_eq!(LittleEndian::read_u32(&bytes[28..32]), 48000 * 4);
        assert_eq!(LittleEndian::read_u16(&bytes[32..34]), 4);
        assert_eq!(LittleEndian::read_u16(&bytes[34..36]), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(LittleEndian::read_u32(&bytes[40..44]), 40);
    }

    #[test]
    fn test_samples_are_interleaved() {
        let buffer = SampleBuffer::new(8000, vec![vec![1.0, 0.0], vec![-1.0, 0.5]]);
        let bytes = encode_wav(&buffer);
        let body = &bytes[WAV_HEADER_LEN..];
        let samples: Vec<i16> = body.chunks(2).map(LittleEndian::read_i16).collect();
        assert_eq!(samples, vec![32767, -32768, 0, 16383]);
    }

    #[test]
    fn test_hound_reads_our_output() {
        let buffer = SampleBuffer::new(22050, vec![vec![0.25; 100]]);
        let bytes = encode_wav(&buffer);
        let reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 22050);
        assert_eq!(reader.len(), 100);
    }
}

//! Decoded sample buffers.

/// A block of decoded audio, stored de-interleaved as `f32` in `[-1, 1]`.
///
/// Buffers are immutable once built: editing operations produce a new buffer
/// rather than touching the samples of an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// Creates a buffer from per-channel sample vectors.
    ///
    /// Channels shorter than the longest one are padded with silence so that
    /// every channel has the same frame count. A buffer always has at least
    /// one channel.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        if channels.is_empty() {
            channels.push(Vec::new());
        }
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(frames, 0.0);
        }
        Self {
            sample_rate: sample_rate.max(1),
            channels,
        }
    }

    /// Creates a silent buffer.
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        Self::new(sample_rate, vec![vec![0.0; frames]; channel_count.max(1)])
    }

    /// Builds a buffer from interleaved samples.
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Returns the samples of one channel.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Converts a time in seconds to the nearest frame index, clamped to the
    /// buffer length.
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        frame.min(self.frames())
    }

    /// Copies frames `[start, end)` of every channel into a new buffer.
    ///
    /// Out-of-range bounds are clamped; `start >= end` gives an empty buffer.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.frames());
        let start = start.min(end);
        let channels = self
            .channels
            .iter()
            .map(|channel| channel[start..end].to_vec())
            .collect();
        Self::new(self.sample_rate, channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let buffer = SampleBuffer::silent(44100, 2, 88200);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 88200);
        assert_eq!(buffer.duration(), 2.0);
    }

    #[test]
    fn test_ragged_channels_are_padded() {
        let buffer = SampleBuffer::new(10, vec![vec![1.0, 1.0, 1.0], vec![0.5]]);
        assert_eq!(buffer.channel(1), &[0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_from_interleaved() {
        let buffer = SampleBuffer::from_interleaved(8000, 2, &[0.1, -0.1, 0.2, -0.2, 0.3]);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.channel(0), &[0.1, 0.2]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2]);
    }

    #[test]
    fn test_slice_clamps() {
        let buffer = SampleBuffer::new(4, vec![vec![0.0, 1.0, 2.0, 3.0]]);
        assert_eq!(buffer.slice(1, 3).channel(0), &[1.0, 2.0]);
        assert_eq!(buffer.slice(3, 100).channel(0), &[3.0]);
        assert!(buffer.slice(3, 1).is_empty());
    }

    #[test]
    fn test_frame_at_rounds() {
        let buffer = SampleBuffer::silent(10, 1, 30);
        assert_eq!(buffer.frame_at(1.04), 10);
        assert_eq!(buffer.frame_at(1.06), 11);
        assert_eq!(buffer.frame_at(99.0), 30);
        assert_eq!(buffer.frame_at(-1.0), 0);
    }
}

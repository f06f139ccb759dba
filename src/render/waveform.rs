//! Waveform view of the main buffer.
//!
//! The surface is `logical × pixel_ratio` pixels; everything is laid out in
//! logical units and scaled on the way down.

use crate::audio::buffer::SampleBuffer;
use crate::audio::store::Selection;
use crate::render::canvas::{rgb, rgba, Canvas};

const WAVE_COLOR: u32 = rgb(0x3B82F6);
const SELECTION_HEX: u32 = 0x3B82F6;
const SELECTION_ALPHA: f32 = 0.2;
const PLAYHEAD_COLOR: u32 = rgb(0xEF4444);
const PLAYHEAD_WIDTH: f32 = 2.0;

/// Peak amplitude per column.
///
/// Each of the `columns` output values is the largest `|sample|` in that
/// column's share of `samples`. Columns past the end of the data are zero.
pub fn envelope(samples: &[f32], columns: usize) -> Vec<f32> {
    if columns == 0 {
        return Vec::new();
    }
    let per_column = (samples.len() / columns).max(1);
    (0..columns)
        .map(|column| {
            let start = (column * per_column).min(samples.len());
            let end = (start + per_column).min(samples.len());
            samples[start..end]
                .iter()
                .fold(0.0f32, |peak, s| peak.max(s.abs()))
        })
        .collect()
}

/// Maps a logical x coordinate to a time in seconds.
pub fn time_at(x: f32, logical_width: f32, duration: f64) -> f64 {
    if logical_width <= 0.0 {
        return 0.0;
    }
    (x.clamp(0.0, logical_width) / logical_width) as f64 * duration
}

/// What the waveform shows.
#[derive(Debug, Clone, Copy)]
pub struct WaveformView<'a> {
    pub buffer: &'a SampleBuffer,
    pub selection: Option<Selection>,
    pub playhead: f64,
}

/// Renders [`WaveformView`]s onto a high-density surface.
#[derive(Debug, Clone)]
pub struct WaveformRenderer {
    canvas: Canvas,
    pixel_ratio: usize,
}

impl WaveformRenderer {
    pub fn new(pixel_ratio: usize) -> Self {
        Self {
            canvas: Canvas::new(0, 0),
            pixel_ratio: pixel_ratio.max(1),
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn pixel_ratio(&self) -> usize {
        self.pixel_ratio
    }

    /// Draws `view` at `width × height` logical pixels.
    pub fn render(&mut self, view: WaveformView<'_>, width: usize, height: usize) {
        let ratio = self.pixel_ratio as f32;
        self.canvas
            .resize(width * self.pixel_ratio, height * self.pixel_ratio);
        self.canvas.clear();
        if width == 0 || height == 0 {
            return;
        }

        let samples = if view.buffer.channel_count() > 0 {
            view.buffer.channel(0)
        } else {
            &[]
        };
        let mid = height as f32 / 2.0;
        for (column, peak) in envelope(samples, width).into_iter().enumerate() {
            let bar = (peak * mid).max(1.0 / ratio);
            self.canvas.fill_rect(
                column as f32 * ratio,
                (mid - bar / 2.0) * ratio,
                ratio,
                bar * ratio,
                WAVE_COLOR,
            );
        }

        let duration = view.buffer.duration();
        if duration <= 0.0 {
            return;
        }
        let x_of = |t: f64| (t / duration) as f32 * width as f32 * ratio;

        if let Some(selection) = view.selection {
            let start = x_of(selection.start);
            let end = x_of(selection.end);
            self.canvas.fill_rect(
                start,
                0.0,
                end - start,
                height as f32 * ratio,
                rgba(SELECTION_HEX, SELECTION_ALPHA),
            );
        }

        if view.playhead > 0.0 {
            let x = x_of(view.playhead);
            self.canvas.draw_line(
                (x, 0.0),
                (x, height as f32 * ratio),
                PLAYHEAD_WIDTH * ratio,
                PLAYHEAD_COLOR,
            );
        }
    }
}

//! Software rendering of the skeleton overlay and the waveform.

pub mod canvas;
pub mod skeleton;
pub mod waveform;

pub use canvas::Canvas;
pub use skeleton::SkeletonRenderer;
pub use waveform::{WaveformRenderer, WaveformView};

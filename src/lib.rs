//! vibevirtuoso - Gesture-driven instruments and a layered audio editor.
//!
//! This library provides the gesture pipeline, the audio editor core and
//! the terminal front end shared by the `vibevirtuoso` binary.

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod gesture;
pub mod render;
pub mod ui;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use app::{App, FocusedPanel, ViewMode};
pub use audio::{BufferStore, PlaybackEngine, SampleBuffer};
pub use config::Config;
pub use gesture::{Debouncer, GestureEvent, GesturePipeline};

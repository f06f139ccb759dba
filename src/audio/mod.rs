//! The layered audio editor.
//!
//! Recordings are fetched from a [`source::RecordingSource`], decoded into
//! [`buffer::SampleBuffer`]s and held by the [`store::BufferStore`]. The
//! [`playback::PlaybackEngine`] plays the main buffer and its layers in sync,
//! and [`edit`] trims and exports the result as WAV.

pub mod buffer;
pub mod decode;
pub mod edit;
pub mod playback;
pub mod source;
pub mod store;
pub mod wav;

pub use buffer::SampleBuffer;
pub use playback::{PlaybackEngine, RodioOutput};
pub use store::{BufferStore, ClickModifier, Selection};

//! Error types for the gesture pipeline and the audio editor.
//!
//! Each subsystem has its own enum. Real-time paths (transport, rendering)
//! log and drop their errors; user-requested actions (load, trim, export)
//! surface them as status messages.

use thiserror::Error;

/// Errors reading or writing the landmark transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message has no \"type\" field")]
    MissingTag,

    #[error("unrecognised message type: {tag}")]
    UnknownTag { tag: String },

    #[error("transport is not connected")]
    NotConnected,

    #[error("outbound queue is full ({pending} bytes pending)")]
    Congested { pending: usize },
}

/// Errors delivering a sound trigger to the synthesizer.
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("sound trigger queue is full")]
    QueueFull,

    #[error("sound trigger worker has shut down")]
    Disconnected,

    #[error("synthesizer request failed: {reason}")]
    Request { reason: String },
}

/// Errors from backend control requests (recording, instrument launch).
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("backend request failed: {reason}")]
    Request { reason: String },

    #[error("backend returned HTTP {status}")]
    Http { status: u16 },

    #[error("backend refused: {message}")]
    Rejected { message: String },

    #[error("backend control worker has shut down")]
    Disconnected,
}

/// Errors fetching recording bytes.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("recording not found: {name}")]
    NotFound { name: String },

    #[error("backend returned HTTP {status} for {name}")]
    Http { name: String, status: u16 },

    #[error("network error fetching {name}: {reason}")]
    Network { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors decoding recording bytes into samples.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported or corrupt audio: {reason}")]
    Unsupported { reason: String },

    #[error("invalid WAV data: {0}")]
    Wav(#[from] hound::Error),
}

/// Errors from the buffer store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("no layer at index {index} ({len} layers loaded)")]
    LayerIndex { index: usize, len: usize },
}

/// Errors from edit operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditError {
    #[error("Please select a region to trim")]
    NoSelection,

    #[error("No audio loaded")]
    NoBuffer,
}

/// Errors from the playback engine and its audio output.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The voice had already finished or been stopped. Callers treat this as
    /// a satisfied stop, not a failure.
    #[error("voice already stopped")]
    AlreadyStopped,

    #[error("No audio loaded")]
    NoBuffer,

    #[error("audio output error: {reason}")]
    Output { reason: String },
}

/// Errors exporting the main buffer.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No audio to export")]
    NoBuffer,

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

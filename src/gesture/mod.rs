//! The gesture-event pipeline.
//!
//! Landmark frames arrive from the detection service over a
//! [`transport::LandmarkTransport`]. The [`pipeline::GesturePipeline`]
//! debounces the gestures they carry into [`debounce::GestureEvent`]s, fires
//! a [`trigger::SoundTrigger`] for each, and keeps the latest hand pose ready
//! for the skeleton renderer. [`backend::BackendControl`] drives the
//! backend's recording and instrument-launch endpoints.

pub mod backend;
pub mod debounce;
pub mod message;
pub mod pipeline;
pub mod transport;
pub mod trigger;

pub use backend::{BackendClient, BackendControl, ControlOutcome, ControlRequest};
pub use debounce::{Clock, Debouncer, GestureEvent, SystemClock};
pub use message::{InboundMessage, LandmarkFrame, OutboundMessage};
pub use pipeline::{ConnectionStatus, GesturePipeline};

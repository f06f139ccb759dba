//! The gesture pipeline.
//!
//! Owns everything between the landmark transport and the screen: it feeds
//! outbound video frames at a fixed cadence, debounces inbound gestures into
//! sound triggers, and keeps a single pending skeleton draw that the
//! animation tick consumes. A burst of frames between two ticks collapses to
//! the newest one.

use crate::config::Config;
use crate::gesture::debounce::{Clock, Debouncer, GestureEvent, SystemClock};
use crate::gesture::message::{InboundMessage, LandmarkFrame, OutboundMessage};
use crate::gesture::transport::{FrameCadence, FrameSource, LandmarkTransport};
use crate::gesture::trigger::SoundTrigger;
use crate::render::skeleton::{fits_surface, SkeletonRenderer};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How often a keep-alive ping is sent while attached.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// State of the landmark transport as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub triggers: u64,
    pub failed_triggers: u64,
    pub draws: u64,
    /// Pending draws replaced by a newer frame before they ran.
    pub cancelled_draws: u64,
    /// Frames whose reported image size was out of range and were not drawn.
    pub dropped_frames: u64,
}

/// Gesture pipeline; see the module docs.
pub struct GesturePipeline<C: Clock = SystemClock> {
    debouncer: Debouncer,
    trigger: Box<dyn SoundTrigger>,
    clock: C,
    renderer: SkeletonRenderer,
    transport: Option<Box<dyn LandmarkTransport>>,
    frames: Option<Box<dyn FrameSource>>,
    frame_cadence: FrameCadence,
    keepalive: FrameCadence,
    pending_draw: Option<LandmarkFrame>,
    instrument: String,
    status: ConnectionStatus,
    last_event: Option<GestureEvent>,
    stats: PipelineStats,
}

impl<C: Clock> GesturePipeline<C> {
    pub fn new(config: &Config, trigger: Box<dyn SoundTrigger>, clock: C) -> Self {
        Self {
            debouncer: Debouncer::new(config.debounce_window()),
            trigger,
            clock,
            renderer: SkeletonRenderer::new(),
            transport: None,
            frames: None,
            frame_cadence: FrameCadence::new(config.frame_interval()),
            keepalive: FrameCadence::new(KEEPALIVE_INTERVAL),
            pending_draw: None,
            instrument: config.instrument.clone(),
            status: ConnectionStatus::Disconnected,
            last_event: None,
            stats: PipelineStats::default(),
        }
    }

    /// Connects the pipeline to a transport and an optional video feed.
    ///
    /// Any previous attachment is detached first.
    pub fn attach(
        &mut self,
        transport: Box<dyn LandmarkTransport>,
        frames: Option<Box<dyn FrameSource>>,
    ) {
        self.detach();
        self.status = if transport.is_connected() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        self.transport = Some(transport);
        self.frames = frames;
        self.frame_cadence.reset();
        self.keepalive.reset();
        tracing::info!(status = self.status.label(), "gesture pipeline attached");
    }

    /// Releases the transport and video feed and cancels any pending draw.
    pub fn detach(&mut self) {
        self.pending_draw = None;
        self.frames = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            tracing::info!("gesture pipeline detached");
        }
        self.renderer.clear();
        self.status = ConnectionStatus::Disconnected;
    }

    pub fn is_attached(&self) -> bool {
        self.transport.is_some()
    }

    /// Services the transport once: sends a video frame or keep-alive if one
    /// is due, then handles every message that has arrived.
    ///
    /// Returns the gestures accepted during this call, in arrival order.
    pub fn pump(&mut self) -> Vec<GestureEvent> {
        let now = self.clock.now();
        let Some(transport) = self.transport.as_mut() else {
            return Vec::new();
        };

        let mut outbound = Vec::new();
        if self.frame_cadence.due(now) {
            if let Some(jpeg) = self.frames.as_mut().and_then(|f| f.next_frame()) {
                outbound.push(OutboundMessage::video_frame(
                    &jpeg,
                    &self.instrument,
                    unix_millis(),
                ));
            }
        }
        if self.keepalive.due(now) {
            outbound.push(OutboundMessage::Ping);
        }

        let mut failed = false;
        for message in &outbound {
            match transport.send(message) {
                Ok(()) => {
                    if matches!(message, OutboundMessage::VideoFrame { .. }) {
                        self.stats.frames_sent += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to send to landmark transport");
                    failed = true;
                    break;
                }
            }
        }

        let inbound = if failed {
            Vec::new()
        } else {
            transport.poll().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "landmark transport read failed");
                failed = true;
                Vec::new()
            })
        };
        let connected = transport.is_connected();

        self.status = match (failed, connected) {
            (true, _) => ConnectionStatus::Error,
            (false, true) => ConnectionStatus::Connected,
            (false, false) => ConnectionStatus::Disconnected,
        };

        inbound
            .into_iter()
            .filter_map(|message| self.handle(message))
            .collect()
    }

    /// Handles one inbound message.
    ///
    /// A detected gesture is offered to the debouncer and, if accepted,
    /// triggered. Independently, any landmarks replace the pending draw.
    pub fn handle(&mut self, message: InboundMessage) -> Option<GestureEvent> {
        match message {
            InboundMessage::GestureDetected(frame) => {
                self.stats.frames_received += 1;
                let event = self.offer(&frame);
                if !fits_surface(&frame) {
                    self.stats.dropped_frames += 1;
                    tracing::debug!(
                        width = frame.image_width,
                        height = frame.image_height,
                        "dropping frame with out-of-range image size"
                    );
                } else if frame.has_landmarks() {
                    self.schedule_draw(frame);
                }
                event
            }
            InboundMessage::InstrumentChanged { instrument, .. } => {
                tracing::info!(%instrument, "instrument confirmed by detector");
                self.instrument = instrument;
                None
            }
            InboundMessage::Pong { .. } => {
                tracing::trace!("pong");
                None
            }
        }
    }

    fn offer(&mut self, frame: &LandmarkFrame) -> Option<GestureEvent> {
        let gesture = frame.gesture.as_deref().filter(|g| !g.is_empty())?;
        let instrument = if frame.instrument.is_empty() {
            self.instrument.as_str()
        } else {
            frame.instrument.as_str()
        };

        let event = self.debouncer.offer(gesture, instrument, self.clock.now())?;
        self.stats.triggers += 1;
        tracing::debug!(gesture = %event.gesture, instrument = %event.instrument, "gesture accepted");
        if let Err(e) = self.trigger.play(&event.gesture, &event.instrument) {
            self.stats.failed_triggers += 1;
            tracing::warn!(error = %e, gesture = %event.gesture, "sound trigger failed");
        }
        self.last_event = Some(event.clone());
        Some(event)
    }

    /// Makes `frame` the pending draw, cancelling any that has not run.
    pub fn schedule_draw(&mut self, frame: LandmarkFrame) {
        if self.pending_draw.replace(frame).is_some() {
            self.stats.cancelled_draws += 1;
        }
    }

    pub fn pending_draw(&self) -> Option<&LandmarkFrame> {
        self.pending_draw.as_ref()
    }

    /// Animation tick: renders the pending draw, if any.
    ///
    /// Returns true if the skeleton surface changed.
    pub fn tick(&mut self) -> bool {
        match self.pending_draw.take() {
            Some(frame) => {
                self.renderer.render(&frame);
                self.stats.draws += 1;
                true
            }
            None => false,
        }
    }

    /// Switches instrument and tells the detector about it.
    pub fn set_instrument(&mut self, instrument: &str) {
        self.instrument = instrument.to_string();
        if let Some(transport) = self.transport.as_mut() {
            let message = OutboundMessage::InstrumentChange {
                instrument: instrument.to_string(),
            };
            if let Err(e) = transport.send(&message) {
                tracing::warn!(error = %e, "failed to announce instrument change");
                self.status = ConnectionStatus::Error;
            }
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn last_event(&self) -> Option<&GestureEvent> {
        self.last_event.as_ref()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn renderer(&self) -> &SkeletonRenderer {
        &self.renderer
    }
}

impl<C: Clock> Drop for GesturePipeline<C> {
    fn drop(&mut self) {
        self.detach();
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

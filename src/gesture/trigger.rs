//! Sound triggers: asking the synthesizer to play an accepted gesture.

use crate::error::TriggerError;
use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Requests waiting for the HTTP worker. Older ones are not worth playing
/// late, so the queue is kept short.
const QUEUE_CAPACITY: usize = 16;

/// How long dropping a trigger waits for an in-flight request.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Something that turns a (gesture, instrument) pair into sound.
///
/// Implementations must return promptly; the gesture pipeline calls this
/// from its frame loop.
pub trait SoundTrigger {
    fn play(&self, gesture: &str, instrument: &str) -> Result<(), TriggerError>;
}

#[derive(Debug, Clone, Serialize)]
struct PlayRequest {
    gesture: String,
    instrument: String,
}

/// Posts play requests to `{backend}/play` from a worker thread.
///
/// Dropping the trigger abandons queued requests. A request already in
/// flight gets [`SHUTDOWN_GRACE`] to finish before the worker is detached.
pub struct HttpSoundTrigger {
    requests: Option<Sender<PlayRequest>>,
    closing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl HttpSoundTrigger {
    /// Starts the worker for the backend at `base_url`.
    pub fn spawn(base_url: &str) -> Result<Self, TriggerError> {
        let url = format!("{}/play", base_url.trim_end_matches('/'));
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| TriggerError::Request {
                reason: e.to_string(),
            })?;
        let (tx, rx) = bounded::<PlayRequest>(QUEUE_CAPACITY);
        let closing = Arc::new(AtomicBool::new(false));
        let worker_closing = Arc::clone(&closing);

        let worker = std::thread::Builder::new()
            .name("sound-trigger".into())
            .spawn(move || {
                for request in rx {
                    if worker_closing.load(Ordering::Relaxed) {
                        break;
                    }
                    match client.post(&url).json(&request).send() {
                        Ok(response) if response.status().is_success() => {
                            tracing::debug!(gesture = %request.gesture, "sound triggered");
                        }
                        Ok(response) => tracing::warn!(
                            status = response.status().as_u16(),
                            gesture = %request.gesture,
                            "synthesizer rejected play request"
                        ),
                        Err(e) => tracing::warn!(error = %e, "play request failed"),
                    }
                }
            })
            .map_err(|e| TriggerError::Request {
                reason: e.to_string(),
            })?;

        Ok(Self {
            requests: Some(tx),
            closing,
            worker: Some(worker),
        })
    }
}

impl SoundTrigger for HttpSoundTrigger {
    fn play(&self, gesture: &str, instrument: &str) -> Result<(), TriggerError> {
        let tx = self.requests.as_ref().ok_or(TriggerError::Disconnected)?;
        tx.try_send(PlayRequest {
            gesture: gesture.to_string(),
            instrument: instrument.to_string(),
        })
        .map_err(|e| match e {
            TrySendError::Full(_) => TriggerError::QueueFull,
            TrySendError::Disconnected(_) => TriggerError::Disconnected,
        })
    }
}

impl Drop for HttpSoundTrigger {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::Relaxed);
        self.requests.take();
        let Some(worker) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while !worker.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        if worker.is_finished() {
            let _ = worker.join();
        } else {
            tracing::debug!("sound trigger request still in flight, detaching worker");
        }
    }
}

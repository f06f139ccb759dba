//! Backend control: recording sessions and instrument launches.
//!
//! The synthesizer backend records what it plays and keeps one gesture
//! window per instrument. [`BackendClient`] speaks its HTTP endpoints;
//! [`BackendControl`] runs the client on a worker thread so the UI loop
//! never waits on the network.

use crate::error::ControlError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::thread::JoinHandle;
use std::time::Duration;

/// Value of `status` in a successful launch response.
const LAUNCH_STARTED: &str = "started";

#[derive(Serialize)]
struct StartRecording<'a> {
    instrument: &'a str,
}

#[derive(Deserialize)]
struct StopRecording {
    filename: String,
}

#[derive(Deserialize)]
struct LaunchResponse {
    status: String,
    #[serde(default)]
    instrument: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Blocking client for the backend's control endpoints.
pub struct BackendClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, ControlError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(request_error)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ControlError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| ControlError::Request {
            reason: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|()| ControlError::Request {
                reason: format!("{} cannot be a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Starts recording what the synthesizer plays for `instrument`.
    pub fn start_recording(&self, instrument: &str) -> Result<(), ControlError> {
        let url = self.endpoint(&["recording", "start"])?;
        let response = self
            .client
            .post(url)
            .json(&StartRecording { instrument })
            .send()
            .map_err(request_error)?;
        check_status(&response)?;
        Ok(())
    }

    /// Stops the current recording and returns the saved file's name.
    pub fn stop_recording(&self) -> Result<String, ControlError> {
        let url = self.endpoint(&["recording", "stop"])?;
        let response = self.client.post(url).send().map_err(request_error)?;
        check_status(&response)?;
        let stopped: StopRecording = response.json().map_err(request_error)?;
        Ok(stopped.filename)
    }

    /// Asks the backend to bring up the gesture window for `instrument`.
    ///
    /// Returns the display name the backend reports, falling back to the id.
    pub fn launch_instrument(&self, instrument: &str) -> Result<String, ControlError> {
        let url = self.endpoint(&["launch-instrument", instrument])?;
        let response = self.client.get(url).send().map_err(request_error)?;
        check_status(&response)?;
        let launched: LaunchResponse = response.json().map_err(request_error)?;
        if launched.status != LAUNCH_STARTED {
            return Err(ControlError::Rejected {
                message: launched.message.unwrap_or(launched.status),
            });
        }
        Ok(launched.instrument.unwrap_or_else(|| instrument.to_string()))
    }
}

fn request_error(e: reqwest::Error) -> ControlError {
    ControlError::Request {
        reason: e.to_string(),
    }
}

fn check_status(response: &reqwest::blocking::Response) -> Result<(), ControlError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ControlError::Http {
            status: status.as_u16(),
        })
    }
}

/// A control action for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    StartRecording { instrument: String },
    StopRecording,
    LaunchInstrument { instrument: String },
}

impl ControlRequest {
    fn label(&self) -> &'static str {
        match self {
            ControlRequest::StartRecording { .. } => "start recording",
            ControlRequest::StopRecording => "stop recording",
            ControlRequest::LaunchInstrument { .. } => "launch instrument",
        }
    }
}

/// The result of one [`ControlRequest`].
#[derive(Debug)]
pub enum ControlOutcome {
    RecordingStarted { instrument: String },
    RecordingSaved { filename: String },
    InstrumentLaunched { instrument: String },
    Failed {
        action: &'static str,
        error: ControlError,
    },
}

/// Runs [`BackendClient`] calls on a worker thread.
pub struct BackendControl {
    requests: Option<Sender<ControlRequest>>,
    outcomes: Receiver<ControlOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl BackendControl {
    pub fn spawn(client: BackendClient) -> Result<Self, ControlError> {
        let (request_tx, request_rx) = unbounded::<ControlRequest>();
        let (outcome_tx, outcome_rx) = unbounded();

        let worker = std::thread::Builder::new()
            .name("backend-control".into())
            .spawn(move || {
                for request in request_rx {
                    let outcome = perform(&client, request);
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| ControlError::Request {
                reason: e.to_string(),
            })?;

        Ok(Self {
            requests: Some(request_tx),
            outcomes: outcome_rx,
            worker: Some(worker),
        })
    }

    /// Queues a request.
    pub fn request(&self, request: ControlRequest) -> Result<(), ControlError> {
        let tx = self.requests.as_ref().ok_or(ControlError::Disconnected)?;
        tx.send(request).map_err(|_| ControlError::Disconnected)
    }

    /// Returns a finished outcome, if any.
    pub fn try_recv(&self) -> Option<ControlOutcome> {
        self.outcomes.try_recv().ok()
    }

    /// Waits for the next outcome.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ControlOutcome> {
        self.outcomes.recv_timeout(timeout).ok()
    }
}

impl Drop for BackendControl {
    fn drop(&mut self) {
        // Detached, not joined: a call in flight can take the full client
        // timeout. The worker exits once that call returns.
        self.requests.take();
        self.worker.take();
    }
}

fn perform(client: &BackendClient, request: ControlRequest) -> ControlOutcome {
    let action = request.label();
    let result = match request {
        ControlRequest::StartRecording { instrument } => client
            .start_recording(&instrument)
            .map(|()| ControlOutcome::RecordingStarted { instrument }),
        ControlRequest::StopRecording => client
            .stop_recording()
            .map(|filename| ControlOutcome::RecordingSaved { filename }),
        ControlRequest::LaunchInstrument { instrument } => client
            .launch_instrument(&instrument)
            .map(|instrument| ControlOutcome::InstrumentLaunched { instrument }),
    };
    result.unwrap_or_else(|error| {
        tracing::warn!(action, error = %error, "backend control request failed");
        ControlOutcome::Failed { action, error }
    })
}

//! Runtime configuration.
//!
//! Every tuning constant of the gesture pipeline and the editor lives here so
//! it can be overridden from a JSON file or the command line. Missing fields
//! fall back to the defaults below.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Repeated identical gestures are throttled to one trigger per this window.
pub const DEFAULT_DEBOUNCE_MS: u64 = 800;

/// Video frames are sent to the landmark transport at 8 Hz.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 125;

/// Sample rate every recording is decoded to.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Volume given to a freshly added layer and to the main buffer.
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Length of the exponential fade-in applied when a voice starts.
pub const DEFAULT_RAMP_MS: u64 = 10;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Debounce window for identical gestures, in milliseconds.
    pub debounce_ms: u64,
    /// Interval between outbound video frames, in milliseconds.
    pub frame_interval_ms: u64,
    /// Target sample rate for decoded recordings.
    pub sample_rate: u32,
    /// Volume of newly added layers (0.0-1.0).
    pub layer_volume: f32,
    /// Volume of the main buffer (0.0-1.0).
    pub master_volume: f32,
    /// Fade-in length for every scheduled voice, in milliseconds.
    pub ramp_ms: u64,
    /// Base URL of the synthesizer / recording backend.
    pub backend_url: String,
    /// `host:port` of the landmark transport socket.
    pub transport_addr: String,
    /// Serve recordings from this directory instead of the backend.
    pub recordings_dir: Option<PathBuf>,
    /// Where exported WAV files are written.
    pub download_dir: PathBuf,
    /// Directory of JPEG stills cycled as the outbound video feed.
    pub frames_dir: Option<PathBuf>,
    /// Device pixel ratio used by the waveform renderer.
    pub pixel_ratio: u32,
    /// Instrument selected at startup.
    pub instrument: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            layer_volume: DEFAULT_VOLUME,
            master_volume: DEFAULT_VOLUME,
            ramp_ms: DEFAULT_RAMP_MS,
            backend_url: "http://localhost:8000".to_string(),
            transport_addr: "127.0.0.1:8765".to_string(),
            recordings_dir: None,
            download_dir: PathBuf::from("."),
            frames_dir: None,
            pixel_ratio: 2,
            instrument: "piano".to_string(),
        }
    }
}

impl Config {
    /// Loads a configuration file, filling unspecified fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::from_json(&text)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
    }

    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        Ok(config.normalized())
    }

    /// Clamps out-of-range values into their legal ranges.
    pub fn normalized(mut self) -> Self {
        self.layer_volume = self.layer_volume.clamp(0.0, 1.0);
        self.master_volume = self.master_volume.clamp(0.0, 1.0);
        self.pixel_ratio = self.pixel_ratio.max(1);
        self.sample_rate = self.sample_rate.max(1);
        self
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn ramp(&self) -> Duration {
        Duration::from_millis(self.ramp_ms)
    }
}

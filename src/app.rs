//! Application state and event handling.
//!
//! This module defines the application state that coordinates the gesture
//! pipeline, the buffer store, playback, and the terminal interface.

use crate::audio::edit::{self, DownloadDir};
use crate::audio::playback::{AudioOutput, PlaybackEngine};
use crate::audio::source::{RecordingInfo, RecordingSource};
use crate::audio::store::{BufferStore, ClickModifier, Loader};
use crate::config::Config;
use crate::gesture::backend::{BackendControl, ControlOutcome, ControlRequest};
use crate::gesture::message::next_instrument;
use crate::gesture::transport::{FrameSource, StillFrames, TcpTransport};
use crate::gesture::GesturePipeline;
use crate::render::waveform::{time_at, WaveformRenderer, WaveformView};
use ratatui::layout::Rect;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a status message stays visible.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Volume change per key press.
pub const VOLUME_STEP: f32 = 0.05;

/// The active screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Connection status, instrument and the hand skeleton.
    Gesture,
    /// Recordings, layers and the waveform.
    #[default]
    Editor,
}

/// Which editor panel receives list navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusedPanel {
    #[default]
    Recordings,
    Layers,
}

impl FocusedPanel {
    pub fn next(self) -> Self {
        match self {
            FocusedPanel::Recordings => FocusedPanel::Layers,
            FocusedPanel::Layers => FocusedPanel::Recordings,
        }
    }
}

/// Receives every successful export's bytes and filename.
pub type ExportNotifier = Box<dyn FnMut(&[u8], &str)>;

/// Layout regions for mouse hit testing.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegions {
    pub recordings: Rect,
    pub layers: Rect,
    /// Inner area of the waveform panel, one logical pixel per column.
    pub waveform: Rect,
}

/// Main application state.
pub struct App<O: AudioOutput> {
    pub config: Config,
    pub view_mode: ViewMode,
    pub focused_panel: FocusedPanel,
    pub store: BufferStore,
    pub playback: PlaybackEngine<O>,
    loader: Loader,
    source: Arc<dyn RecordingSource>,
    pub recordings: Vec<RecordingInfo>,
    pub selected_recording: usize,
    pub selected_layer: usize,
    /// Loads requested but not yet finished.
    pub pending_loads: usize,
    pub waveform: WaveformRenderer,
    waveform_size: (usize, usize),
    pub pipeline: Option<GesturePipeline>,
    control: Option<BackendControl>,
    /// True while the backend is recording.
    pub recording: bool,
    export_notifier: Option<ExportNotifier>,
    pub status_message: Option<(String, Instant)>,
    pub layout: LayoutRegions,
    pub show_help: bool,
}

impl<O: AudioOutput> App<O> {
    /// Creates the application.
    ///
    /// # Arguments
    ///
    /// * `config` - Runtime configuration
    /// * `source` - Where recordings are fetched from
    /// * `output` - Audio output used for playback
    pub fn new(config: Config, source: Arc<dyn RecordingSource>, output: O) -> Self {
        let loader = Loader::spawn(Arc::clone(&source), config.sample_rate);
        Self {
            store: BufferStore::from_config(&config),
            playback: PlaybackEngine::new(output, config.ramp()),
            waveform: WaveformRenderer::new(config.pixel_ratio as usize),
            loader,
            source,
            config,
            view_mode: ViewMode::Editor,
            focused_panel: FocusedPanel::Recordings,
            recordings: Vec::new(),
            selected_recording: 0,
            selected_layer: 0,
            pending_loads: 0,
            waveform_size: (0, 0),
            pipeline: None,
            control: None,
            recording: false,
            export_notifier: None,
            status_message: None,
            layout: LayoutRegions::default(),
            show_help: false,
        }
    }

    /// Installs a gesture pipeline and switches to its view.
    pub fn with_pipeline(mut self, pipeline: GesturePipeline) -> Self {
        self.pipeline = Some(pipeline);
        self.view_mode = ViewMode::Gesture;
        self
    }

    /// Installs the backend control worker used for recording and
    /// instrument launches.
    pub fn with_control(mut self, control: BackendControl) -> Self {
        self.control = Some(control);
        self
    }

    pub fn set_export_notifier(&mut self, notifier: ExportNotifier) {
        self.export_notifier = Some(notifier);
    }

    /// Sets a status message to display temporarily.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }

    pub fn update_layout(&mut self, layout: LayoutRegions) {
        self.layout = layout;
    }

    /// Switches between the gesture and editor views.
    ///
    /// The gesture view is only available when a pipeline is installed.
    pub fn toggle_view(&mut self) {
        self.view_mode = match self.view_mode {
            ViewMode::Editor if self.pipeline.is_some() => ViewMode::Gesture,
            _ => ViewMode::Editor,
        };
    }

    // ==================== Recordings ====================

    /// Reloads the recording list from the source.
    pub fn refresh_recordings(&mut self) {
        match self.source.list() {
            Ok(list) => {
                let count = list.len();
                self.recordings = list;
                self.selected_recording = self.selected_recording.min(count.saturating_sub(1));
                self.set_status(format!("{count} recordings"));
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to list recordings");
                self.set_status(format!("Failed to list recordings: {e}"));
            }
        }
    }

    pub fn selected_recording_name(&self) -> Option<&str> {
        self.recordings
            .get(self.selected_recording)
            .map(|r| r.filename.as_str())
    }

    /// Queues a load of `name` as the main buffer or as a layer.
    pub fn request_load(&mut self, name: &str, as_layer: bool) {
        if self.loader.request(name, as_layer) {
            self.pending_loads += 1;
            self.set_status(format!("Loading {name}..."));
        } else {
            self.set_status("Recording loader is not running");
        }
    }

    /// Loads the highlighted recording.
    pub fn load_selected(&mut self, as_layer: bool) {
        match self.selected_recording_name().map(str::to_string) {
            Some(name) => self.request_load(&name, as_layer),
            None => self.set_status("No recording selected"),
        }
    }

    /// Applies finished background loads.
    pub fn poll_loads(&mut self) {
        while let Some(outcome) = self.loader.try_recv() {
            self.pending_loads = self.pending_loads.saturating_sub(1);
            let name = outcome.name.clone();
            let as_layer = outcome.as_layer;
            if !as_layer && outcome.result.is_ok() {
                self.playback.stop();
            }
            match self.store.apply(outcome) {
                Ok(()) if as_layer => self.set_status(format!("Added layer {name}")),
                Ok(()) => self.set_status(format!(
                    "Loaded {name} ({:.2}s)",
                    self.store.duration()
                )),
                Err(e) => self.set_status(format!("Failed to load recording: {e}")),
            }
        }
        self.selected_layer = self
            .selected_layer
            .min(self.store.layers().len().saturating_sub(1));
    }

    // ==================== Transport ====================

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Starts playback from the playhead, or stops it if running.
    pub fn toggle_playback(&mut self, now: Instant) {
        if self.playback.stop() {
            return;
        }
        match self.playback.play(&self.store, self.store.playhead(), now) {
            Ok(true) => {}
            Ok(false) => self.set_status("Nothing to play"),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    /// Stops playback and rewinds to the start.
    pub fn rewind(&mut self) {
        self.playback.stop();
        self.store.reset_position();
    }

    /// Advances the playhead and reaps finished sessions.
    pub fn update_playback(&mut self, now: Instant) {
        if self.playback.poll_completion() {
            tracing::debug!("playback finished");
            return;
        }
        if let Some(position) = self.playback.tick(now) {
            self.store.set_playhead(position);
        }
    }

    /// Handles a click at terminal column `x` inside the waveform panel.
    pub fn click_waveform(&mut self, x: u16, modifier: ClickModifier) {
        let area = self.layout.waveform;
        if area.width == 0 || x < area.x || x >= area.x + area.width {
            return;
        }
        let time = time_at(
            (x - area.x) as f32 + 0.5,
            area.width as f32,
            self.store.duration(),
        );
        self.store.click(time, modifier);
    }

    // ==================== Editing ====================

    pub fn trim(&mut self) {
        self.playback.stop();
        match edit::trim(&mut self.store) {
            Ok(()) => self.set_status(format!("Trimmed to {:.2}s", self.store.duration())),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    pub fn export(&mut self) {
        let mut sink = DownloadDir::new(&self.config.download_dir);
        match edit::export(&self.store, &mut sink, self.export_notifier.as_mut()) {
            Ok(file) => self.set_status(format!("Exported {}", file.path.display())),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    pub fn toggle_selected_mute(&mut self) {
        match self.store.toggle_muted(self.selected_layer) {
            Ok(true) => self.set_status(format!("Layer {} muted", self.selected_layer + 1)),
            Ok(false) => self.set_status(format!("Layer {} unmuted", self.selected_layer + 1)),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    pub fn remove_selected_layer(&mut self) {
        match self.store.remove_layer(self.selected_layer) {
            Ok(layer) => {
                self.set_status(format!("Removed layer {}", layer.name));
                self.selected_layer = self
                    .selected_layer
                    .min(self.store.layers().len().saturating_sub(1));
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    /// Nudges the selected layer's volume, or the master volume when the
    /// recordings panel has focus.
    pub fn adjust_volume(&mut self, delta: f32) {
        match self.focused_panel {
            FocusedPanel::Layers => {
                let index = self.selected_layer;
                let Some(current) = self.store.layers().get(index).map(|l| l.volume) else {
                    return;
                };
                if let Err(e) = self.store.set_volume(index, current + delta) {
                    self.set_status(e.to_string());
                }
            }
            FocusedPanel::Recordings => {
                let volume = self.store.master_volume() + delta;
                self.store.set_master_volume(volume);
            }
        }
    }

    pub fn move_selection(&mut self, down: bool) {
        let (index, len) = match self.focused_panel {
            FocusedPanel::Recordings => (&mut self.selected_recording, self.recordings.len()),
            FocusedPanel::Layers => (&mut self.selected_layer, self.store.layers().len()),
        };
        if len == 0 {
            return;
        }
        *index = if down {
            (*index + 1).min(len - 1)
        } else {
            index.saturating_sub(1)
        };
    }

    // ==================== Gesture ====================

    /// The instrument gestures currently play.
    pub fn instrument(&self) -> &str {
        self.pipeline
            .as_ref()
            .map_or(self.config.instrument.as_str(), |p| p.instrument())
    }

    /// Steps to the next instrument and asks the backend to launch it.
    pub fn cycle_instrument(&mut self) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        let next = next_instrument(pipeline.instrument());
        pipeline.set_instrument(next);
        self.set_status(format!("Instrument: {next}"));
        self.send_control(ControlRequest::LaunchInstrument {
            instrument: next.to_string(),
        });
    }

    /// Starts a backend recording for the current instrument, or stops the
    /// one in progress.
    pub fn toggle_recording(&mut self) {
        let request = if self.recording {
            ControlRequest::StopRecording
        } else {
            ControlRequest::StartRecording {
                instrument: self.instrument().to_string(),
            }
        };
        self.send_control(request);
    }

    fn send_control(&mut self, request: ControlRequest) {
        let Some(control) = self.control.as_ref() else {
            self.set_status("Backend control is not available");
            return;
        };
        if let Err(e) = control.request(request) {
            tracing::warn!(error = %e, "backend control unavailable");
            self.set_status(e.to_string());
        }
    }

    /// Applies finished backend control requests.
    pub fn poll_control(&mut self) {
        while let Some(outcome) = self.control.as_ref().and_then(BackendControl::try_recv) {
            match outcome {
                ControlOutcome::RecordingStarted { instrument } => {
                    self.recording = true;
                    self.set_status(format!("Recording {instrument}..."));
                }
                ControlOutcome::RecordingSaved { filename } => {
                    self.recording = false;
                    tracing::info!(%filename, "recording saved");
                    self.refresh_recordings();
                    self.set_status(format!("Recording saved: {filename}"));
                }
                ControlOutcome::InstrumentLaunched { instrument } => {
                    self.set_status(format!("{instrument} launched"));
                }
                ControlOutcome::Failed { action, error } => {
                    self.set_status(format!("Failed to {action}: {error}"));
                }
            }
        }
    }

    /// Connects the gesture pipeline to the configured landmark transport.
    pub fn connect_gesture(&mut self) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        let addr = self.config.transport_addr.clone();
        let transport = match TcpTransport::connect(addr.as_str()) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!(addr = %addr, error = %e, "landmark transport unavailable");
                self.set_status(format!("Could not connect to {addr}: {e}"));
                return;
            }
        };
        let frames = self.config.frames_dir.as_ref().and_then(|dir| {
            match StillFrames::from_dir(dir) {
                Ok(frames) if !frames.is_empty() => Some(Box::new(frames) as Box<dyn FrameSource>),
                Ok(_) => {
                    tracing::warn!(dir = %dir.display(), "no JPEG frames found");
                    None
                }
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "failed to read frames");
                    None
                }
            }
        });
        pipeline.attach(Box::new(transport), frames);
        self.set_status(format!("Connected to {addr}"));
    }

    /// Services the gesture pipeline and runs its animation tick.
    pub fn update_gesture(&mut self) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            for event in pipeline.pump() {
                tracing::info!(gesture = %event.gesture, instrument = %event.instrument, "trigger");
            }
            pipeline.tick();
        }
    }

    // ==================== Rendering support ====================

    /// Redraws the waveform surface if anything it shows has changed.
    ///
    /// # Arguments
    ///
    /// * `width` - Logical width in pixels
    /// * `height` - Logical height in pixels
    pub fn refresh_waveform(&mut self, width: usize, height: usize) {
        let dirty = self.store.take_waveform_dirty();
        let resized = self.waveform_size != (width, height);
        if !(dirty || resized || self.playback.is_playing()) {
            return;
        }
        self.waveform_size = (width, height);
        if let Some(buffer) = self.store.main() {
            self.waveform.render(
                WaveformView {
                    buffer,
                    selection: self.store.selection(),
                    playhead: self.store.playhead(),
                },
                width,
                height,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::SampleBuffer;
    use crate::audio::playback::{Clip, Voice};
    use crate::audio::store::Selection;
    use crate::audio::wav::encode_wav;
    use crate::error::{PlaybackError, SourceError};
    use crate::gesture::backend::BackendClient;
    use crate::testing::serve_each;
    use std::cell::RefCell;
    use std::net::TcpListener;
    use std::rc::Rc;
    use tempfile::tempdir;

    struct Silent;

    struct SilentVoice;

    impl Voice for SilentVoice {
        fn stop(&mut self) -> Result<(), PlaybackError> {
            Ok(())
        }
    }

    impl AudioOutput for Silent {
        fn start(&mut self, _clip: Clip) -> Result<Box<dyn Voice>, PlaybackError> {
            Ok(Box::new(SilentVoice))
        }
    }

    struct OneRecording;

    impl RecordingSource for OneRecording {
        fn fetch(&self, name: &str) -> Result<Vec<u8>, SourceError> {
            if name == "take.wav" {
                Ok(encode_wav(&SampleBuffer::new(
                    44100,
                    vec![vec![0.5; 44100 * 2]],
                )))
            } else {
                Err(SourceError::NotFound {
                    name: name.to_string(),
                })
            }
        }

        fn list(&self) -> Result<Vec<RecordingInfo>, SourceError> {
            Ok(vec![RecordingInfo {
                filename: "take.wav".into(),
                size: 0,
            }])
        }
    }

    fn app() -> App<Silent> {
        App::new(Config::default(), Arc::new(OneRecording), Silent)
    }

    fn wait_for(app: &mut App<Silent>, done: impl Fn(&App<Silent>) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(app) && Instant::now() < deadline {
            app.poll_control();
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(done(app), "condition not reached before the deadline");
    }

    fn wait_for_loads(app: &mut App<Silent>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.pending_loads > 0 && Instant::now() < deadline {
            app.poll_loads();
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_load_play_trim_export() {
        let dir = tempdir().unwrap();
        let mut app = app();
        app.config.download_dir = dir.path().to_path_buf();

        app.refresh_recordings();
        app.load_selected(false);
        app.load_selected(true);
        wait_for_loads(&mut app);
        assert_eq!(app.store.main_name(), Some("take.wav"));
        assert_eq!(app.store.layers().len(), 1);

        let start = Instant::now();
        app.toggle_playback(start);
        assert!(app.is_playing());
        assert_eq!(app.playback.session().unwrap().voice_count(), 2);
        app.update_playback(start + Duration::from_millis(500));
        assert!((app.store.playhead() - 0.5).abs() < 1e-9);
        app.toggle_playback(start);
        assert!(!app.is_playing());

        app.store.set_selection(Some(Selection::new(0.5, 1.5)));
        app.trim();
        assert!((app.store.duration() - 1.0).abs() < 1e-9);

        app.export();
        assert!(dir.path().join("edited_take.wav.wav").exists());
    }

    #[test]
    fn test_export_notifies_with_written_bytes() {
        let dir = tempdir().unwrap();
        let mut app = app();
        app.config.download_dir = dir.path().to_path_buf();
        app.store
            .install("take.wav", SampleBuffer::silent(8000, 1, 800), false);

        let delivered: Rc<RefCell<Vec<(String, Vec<u8>)>>> = Rc::default();
        let sink = Rc::clone(&delivered);
        app.set_export_notifier(Box::new(move |bytes: &[u8], filename: &str| {
            sink.borrow_mut().push((filename.to_string(), bytes.to_vec()))
        }));
        app.export();

        let delivered = delivered.borrow();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "edited_take.wav.wav");
        let written = std::fs::read(dir.path().join("edited_take.wav.wav")).unwrap();
        assert_eq!(delivered[0].1, written);
    }

    #[test]
    fn test_recording_toggle_and_save() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = serve_each(
            listener,
            vec![
                ("200 OK", r#"{"status":"recording"}"#),
                ("200 OK", r#"{"filename":"take_7.wav"}"#),
            ],
        );

        let client = BackendClient::new(&format!("http://{addr}")).unwrap();
        let mut app = app().with_control(BackendControl::spawn(client).unwrap());

        app.toggle_recording();
        wait_for(&mut app, |app| app.recording);
        app.toggle_recording();
        wait_for(&mut app, |app| !app.recording);

        let requests = server.join().unwrap();
        let (first, second) = (&requests[0], &requests[1]);
        assert_eq!(first.request_line(), "POST /recording/start HTTP/1.1");
        assert!(first.body.contains("\"piano\""));
        assert_eq!(second.request_line(), "POST /recording/stop HTTP/1.1");
        assert_eq!(
            app.status_message.as_ref().map(|(m, _)| m.as_str()),
            Some("Recording saved: take_7.wav")
        );
    }

    #[test]
    fn test_recording_without_backend_reports_status() {
        let mut app = app();
        app.toggle_recording();
        assert!(!app.recording);
        assert_eq!(
            app.status_message.as_ref().map(|(m, _)| m.as_str()),
            Some("Backend control is not available")
        );
    }

    #[test]
    fn test_failed_load_reports_status() {
        let mut app = app();
        app.request_load("missing.wav", false);
        wait_for_loads(&mut app);
        let (message, _) = app.status_message.clone().unwrap();
        assert!(message.starts_with("Failed to load recording"));
        assert!(app.store.main().is_none());
    }

    #[test]
    fn test_trim_without_selection_reports_status() {
        let mut app = app();
        app.trim();
        assert_eq!(
            app.status_message.as_ref().map(|(m, _)| m.as_str()),
            Some("Please select a region to trim")
        );
    }

    #[test]
    fn test_click_maps_columns_to_time() {
        let mut app = app();
        app.store
            .install("main", SampleBuffer::silent(100, 1, 1000), false);
        app.layout.waveform = Rect::new(10, 5, 100, 4);

        app.click_waveform(59, ClickModifier::None);
        assert!((app.store.playhead() - 4.95).abs() < 1e-6);

        app.click_waveform(20, ClickModifier::Select);
        app.click_waveform(30, ClickModifier::Extend);
        let selection = app.store.selection().unwrap();
        assert!((selection.start - 1.05).abs() < 1e-6);
        assert!((selection.end - 2.05).abs() < 1e-6);

        // Outside the panel nothing changes.
        app.click_waveform(3, ClickModifier::None);
        assert!(app.store.selection().is_some());
    }

    #[test]
    fn test_volume_keys_follow_focus() {
        let mut app = app();
        app.store
            .install("layer", SampleBuffer::silent(100, 1, 10), true);

        app.adjust_volume(0.5);
        assert_eq!(app.store.master_volume(), 1.0);

        app.focused_panel = FocusedPanel::Layers;
        app.adjust_volume(-VOLUME_STEP);
        assert!((app.store.layers()[0].volume - 0.75).abs() < 1e-6);
    }
}

//! The buffer store: the main buffer, its layers, the selection and the
//! playhead.
//!
//! The store is the only owner of this state. Loads and trims replace the
//! main buffer wholesale; layers are an insertion-ordered list whose identity
//! is list position. Buffers are handed out as `Arc`s so a playback session
//! can read them from the audio thread without copying, but nothing outside
//! the store ever mutates them.

use crate::audio::buffer::SampleBuffer;
use crate::audio::decode::decode;
use crate::audio::source::RecordingSource;
use crate::config::{Config, DEFAULT_SAMPLE_RATE, DEFAULT_VOLUME};
use crate::error::StoreError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A selected time range in seconds. Always `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub start: f64,
    pub end: f64,
}

impl Selection {
    /// Creates a selection from two bounds in either order.
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Returns the selection grown to include `time`.
    pub fn extended_to(&self, time: f64) -> Self {
        Self {
            start: self.start.min(time),
            end: self.end.max(time),
        }
    }
}

/// A recording played alongside the main buffer.
#[derive(Debug, Clone)]
pub struct AudioLayer {
    /// Source recording name.
    pub name: String,
    pub buffer: Arc<SampleBuffer>,
    /// Gain applied during playback (0.0-1.0).
    pub volume: f32,
    pub muted: bool,
}

/// How a click on the waveform should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClickModifier {
    /// Move the playhead and drop the selection.
    #[default]
    None,
    /// Start a new selection at the click.
    Select,
    /// Grow the current selection to the click.
    Extend,
}

/// Owner of all editor audio state.
#[derive(Debug)]
pub struct BufferStore {
    main: Option<Arc<SampleBuffer>>,
    main_name: Option<String>,
    layers: Vec<AudioLayer>,
    selection: Option<Selection>,
    playhead: f64,
    master_volume: f32,
    layer_volume: f32,
    sample_rate: u32,
    waveform_dirty: bool,
}

impl Default for BufferStore {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_VOLUME, DEFAULT_VOLUME)
    }
}

impl BufferStore {
    /// Creates an empty store.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Rate every recording is decoded to
    /// * `master_volume` - Gain of the main buffer
    /// * `layer_volume` - Initial gain of newly added layers
    pub fn new(sample_rate: u32, master_volume: f32, layer_volume: f32) -> Self {
        Self {
            main: None,
            main_name: None,
            layers: Vec::new(),
            selection: None,
            playhead: 0.0,
            master_volume: master_volume.clamp(0.0, 1.0),
            layer_volume: layer_volume.clamp(0.0, 1.0),
            sample_rate,
            waveform_dirty: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sample_rate, config.master_volume, config.layer_volume)
    }

    /// Fetches and decodes a recording, then installs it.
    ///
    /// On any failure the store is left exactly as it was.
    ///
    /// # Arguments
    ///
    /// * `source` - Where to fetch the bytes from
    /// * `name` - Recording identifier
    /// * `as_layer` - Append as a layer instead of replacing the main buffer
    pub fn load(
        &mut self,
        source: &dyn RecordingSource,
        name: &str,
        as_layer: bool,
    ) -> Result<(), StoreError> {
        let buffer = fetch_and_decode(source, name, self.sample_rate)?;
        self.install(name, buffer, as_layer);
        Ok(())
    }

    /// Applies the result of a background load.
    pub fn apply(&mut self, outcome: LoadOutcome) -> Result<(), StoreError> {
        let buffer = outcome.result?;
        self.install(&outcome.name, buffer, outcome.as_layer);
        Ok(())
    }

    /// Installs an already decoded buffer.
    pub fn install(&mut self, name: &str, buffer: SampleBuffer, as_layer: bool) {
        if as_layer {
            tracing::info!(name, duration = buffer.duration(), "added layer");
            self.layers.push(AudioLayer {
                name: name.to_string(),
                buffer: Arc::new(buffer),
                volume: self.layer_volume,
                muted: false,
            });
        } else {
            tracing::info!(name, duration = buffer.duration(), "loaded main buffer");
            self.main_name = Some(name.to_string());
            self.replace_main(buffer);
        }
    }

    /// Replaces the main buffer, resetting the playhead and selection.
    pub fn replace_main(&mut self, buffer: SampleBuffer) {
        self.main = Some(Arc::new(buffer));
        self.playhead = 0.0;
        self.selection = None;
        self.waveform_dirty = true;
    }

    pub fn main(&self) -> Option<&Arc<SampleBuffer>> {
        self.main.as_ref()
    }

    /// Name of the recording loaded as the main buffer.
    pub fn main_name(&self) -> Option<&str> {
        self.main_name.as_deref()
    }

    /// Duration of the main buffer in seconds, or zero when nothing is loaded.
    pub fn duration(&self) -> f64 {
        self.main.as_ref().map(|b| b.duration()).unwrap_or(0.0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn layers(&self) -> &[AudioLayer] {
        &self.layers
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Sets the selection, clamping both bounds to the buffer duration.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        let duration = self.duration();
        self.selection = selection.map(|s| {
            Selection::new(s.start.clamp(0.0, duration), s.end.clamp(0.0, duration))
        });
        self.waveform_dirty = true;
    }

    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    /// Moves the playhead, clamped to `[0, duration]`.
    pub fn set_playhead(&mut self, seconds: f64) {
        self.playhead = seconds.clamp(0.0, self.duration());
        self.waveform_dirty = true;
    }

    /// Clears the selection and rewinds the playhead.
    pub fn reset_position(&mut self) {
        self.playhead = 0.0;
        self.selection = None;
        self.waveform_dirty = true;
    }

    /// Handles a click on the waveform at `time` seconds.
    pub fn click(&mut self, time: f64, modifier: ClickModifier) {
        let time = time.clamp(0.0, self.duration());
        match (modifier, self.selection) {
            (ClickModifier::Extend, Some(current)) => {
                self.selection = Some(current.extended_to(time));
            }
            (ClickModifier::Extend, None) | (ClickModifier::Select, _) => {
                self.selection = Some(Selection::new(time, time));
            }
            (ClickModifier::None, _) => {
                self.playhead = time;
                self.selection = None;
            }
        }
        self.waveform_dirty = true;
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    fn layer_mut(&mut self, index: usize) -> Result<&mut AudioLayer, StoreError> {
        let len = self.layers.len();
        self.layers
            .get_mut(index)
            .ok_or(StoreError::LayerIndex { index, len })
    }

    /// Removes the layer at `index`.
    pub fn remove_layer(&mut self, index: usize) -> Result<AudioLayer, StoreError> {
        if index >= self.layers.len() {
            return Err(StoreError::LayerIndex {
                index,
                len: self.layers.len(),
            });
        }
        Ok(self.layers.remove(index))
    }

    pub fn set_muted(&mut self, index: usize, muted: bool) -> Result<(), StoreError> {
        self.layer_mut(index)?.muted = muted;
        Ok(())
    }

    /// Flips the mute flag and returns the new value.
    pub fn toggle_muted(&mut self, index: usize) -> Result<bool, StoreError> {
        let layer = self.layer_mut(index)?;
        layer.muted = !layer.muted;
        Ok(layer.muted)
    }

    /// Sets a layer's volume, clamped to `[0, 1]`.
    pub fn set_volume(&mut self, index: usize, volume: f32) -> Result<(), StoreError> {
        self.layer_mut(index)?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    /// Returns true once after any change that affects the waveform view.
    pub fn take_waveform_dirty(&mut self) -> bool {
        std::mem::take(&mut self.waveform_dirty)
    }
}

/// Fetches `name` from `source` and decodes it at `sample_rate`.
pub fn fetch_and_decode(
    source: &dyn RecordingSource,
    name: &str,
    sample_rate: u32,
) -> Result<SampleBuffer, StoreError> {
    let bytes = source.fetch(name)?;
    Ok(decode(&bytes, sample_rate)?)
}

/// A finished background load.
#[derive(Debug)]
pub struct LoadOutcome {
    pub name: String,
    pub as_layer: bool,
    pub result: Result<SampleBuffer, StoreError>,
}

struct LoadRequest {
    name: String,
    as_layer: bool,
}

/// Fetches and decodes recordings on a worker thread.
///
/// Finished buffers come back as [`LoadOutcome`]s and are applied to the
/// store by the UI thread, so the store itself never crosses threads.
pub struct Loader {
    requests: Option<Sender<LoadRequest>>,
    outcomes: Receiver<LoadOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl Loader {
    /// Starts the worker.
    pub fn spawn(source: Arc<dyn RecordingSource>, sample_rate: u32) -> Self {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (outcome_tx, outcome_rx) = unbounded();

        let worker = std::thread::Builder::new()
            .name("recording-loader".into())
            .spawn(move || {
                for request in request_rx {
                    let result = fetch_and_decode(source.as_ref(), &request.name, sample_rate);
                    if let Err(e) = &result {
                        tracing::warn!(name = %request.name, error = %e, "load failed");
                    }
                    let outcome = LoadOutcome {
                        name: request.name,
                        as_layer: request.as_layer,
                        result,
                    };
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| tracing::error!(error = %e, "failed to start loader thread"))
            .ok();

        Self {
            requests: Some(request_tx),
            outcomes: outcome_rx,
            worker,
        }
    }

    /// Queues a load. Returns false if the worker is gone.
    pub fn request(&self, name: impl Into<String>, as_layer: bool) -> bool {
        match (&self.requests, &self.worker) {
            (Some(tx), Some(_)) => tx
                .send(LoadRequest {
                    name: name.into(),
                    as_layer,
                })
                .is_ok(),
            _ => false,
        }
    }

    /// Returns the next finished load, if any.
    pub fn try_recv(&self) -> Option<LoadOutcome> {
        self.outcomes.try_recv().ok()
    }

    /// Blocks until the next finished load arrives.
    pub fn recv(&self) -> Option<LoadOutcome> {
        self.outcomes.recv().ok()
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::RecordingInfo;
    use crate::audio::wav::encode_wav;
    use crate::error::SourceError;
    use approx::assert_abs_diff_eq;
    use std::collections::HashMap;

    /// In-memory recording source.
    struct MemorySource(HashMap<String, Vec<u8>>);

    impl MemorySource {
        fn with(entries: &[(&str, Vec<u8>)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            )
        }
    }

    impl RecordingSource for MemorySource {
        fn fetch(&self, name: &str) -> Result<Vec<u8>, SourceError> {
            self.0.get(name).cloned().ok_or(SourceError::NotFound {
                name: name.to_string(),
            })
        }

        fn list(&self) -> Result<Vec<RecordingInfo>, SourceError> {
            Ok(Vec::new())
        }
    }

    fn tone_wav(seconds: f64) -> Vec<u8> {
        let frames = (seconds * 44100.0) as usize;
        encode_wav(&SampleBuffer::new(44100, vec![vec![0.25; frames]]))
    }

    #[test]
    fn test_load_main_resets_position() {
        let source = MemorySource::with(&[("a.wav", tone_wav(3.0)), ("b.wav", tone_wav(1.0))]);
        let mut store = BufferStore::default();

        store.load(&source, "a.wav", false).unwrap();
        store.set_playhead(2.0);
        store.set_selection(Some(Selection::new(1.0, 2.0)));

        store.load(&source, "b.wav", false).unwrap();
        assert_eq!(store.main_name(), Some("b.wav"));
        assert_abs_diff_eq!(store.duration(), 1.0, epsilon = 1e-6);
        assert_eq!(store.playhead(), 0.0);
        assert!(store.selection().is_none());
        assert!(store.take_waveform_dirty());
        assert!(!store.take_waveform_dirty());
    }

    #[test]
    fn test_load_layer_defaults() {
        let source = MemorySource::with(&[("a.wav", tone_wav(1.0))]);
        let mut store = BufferStore::default();
        store.load(&source, "a.wav", true).unwrap();

        assert!(store.main().is_none());
        let layer = &store.layers()[0];
        assert_eq!(layer.name, "a.wav");
        assert_eq!(layer.volume, 0.8);
        assert!(!layer.muted);
    }

    #[test]
    fn test_failed_load_preserves_state() {
        let source = MemorySource::with(&[
            ("good.wav", tone_wav(2.0)),
            ("bad.wav", b"RIFF\x00\x00\x00\x00WAVEjunk".to_vec()),
        ]);
        let mut store = BufferStore::default();
        store.load(&source, "good.wav", false).unwrap();
        store.set_playhead(1.5);

        assert!(matches!(
            store.load(&source, "bad.wav", false),
            Err(StoreError::Decode(_))
        ));
        assert!(matches!(
            store.load(&source, "missing.wav", true),
            Err(StoreError::Source(SourceError::NotFound { .. }))
        ));
        assert_eq!(store.main_name(), Some("good.wav"));
        assert_eq!(store.playhead(), 1.5);
        assert!(store.layers().is_empty());
    }

    #[test]
    fn test_layer_operations() {
        let mut store = BufferStore::default();
        store.install("one", SampleBuffer::silent(44100, 1, 10), true);
        store.install("two", SampleBuffer::silent(44100, 1, 10), true);

        store.set_volume(0, 1.7).unwrap();
        assert_eq!(store.layers()[0].volume, 1.0);
        store.set_muted(1, true).unwrap();
        assert!(store.layers()[1].muted);
        assert!(!store.toggle_muted(1).unwrap());

        assert!(matches!(
            store.set_volume(5, 0.5),
            Err(StoreError::LayerIndex { index: 5, len: 2 })
        ));

        let removed = store.remove_layer(0).unwrap();
        assert_eq!(removed.name, "one");
        assert_eq!(store.layers()[0].name, "two");
        assert!(store.remove_layer(1).is_err());
    }

    #[test]
    fn test_click_semantics() {
        let mut store = BufferStore::default();
        store.install("main", SampleBuffer::silent(10, 1, 100), false);

        store.click(4.0, ClickModifier::Select);
        assert_eq!(store.selection(), Some(Selection::new(4.0, 4.0)));

        store.click(2.0, ClickModifier::Extend);
        store.click(7.0, ClickModifier::Extend);
        assert_eq!(store.selection(), Some(Selection::new(2.0, 7.0)));

        store.click(5.0, ClickModifier::Extend);
        assert_eq!(store.selection(), Some(Selection::new(2.0, 7.0)));

        store.click(3.0, ClickModifier::None);
        assert_eq!(store.playhead(), 3.0);
        assert!(store.selection().is_none());

        store.click(50.0, ClickModifier::Extend);
        assert_eq!(store.selection(), Some(Selection::new(10.0, 10.0)));
    }

    #[test]
    fn test_selection_is_normalized_and_clamped() {
        let mut store = BufferStore::default();
        store.install("main", SampleBuffer::silent(10, 1, 30), false);
        store.set_selection(Some(Selection { start: 5.0, end: -1.0 }));
        assert_eq!(store.selection(), Some(Selection::new(0.0, 3.0)));
    }

    #[test]
    fn test_loader_round_trip() {
        let source: Arc<dyn RecordingSource> =
            Arc::new(MemorySource::with(&[("a.wav", tone_wav(0.5))]));
        let loader = Loader::spawn(source, 44100);
        let mut store = BufferStore::default();

        assert!(loader.request("a.wav", false));
        assert!(loader.request("missing.wav", true));

        let first = loader.recv().unwrap();
        store.apply(first).unwrap();
        let second = loader.recv().unwrap();
        assert!(store.apply(second).is_err());

        assert_eq!(store.main_name(), Some("a.wav"));
        assert!(store.layers().is_empty());
    }
}

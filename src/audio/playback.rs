//! Layered playback.
//!
//! A play action builds one [`PlaybackSession`]: a voice for the main buffer
//! plus one per unmuted layer, all covering the same time window and each
//! faded in with a short exponential ramp. Only one session exists at a
//! time; starting a new one tears the previous one down first.
//!
//! The engine is driven from the UI loop. The playhead is recomputed from
//! wall-clock time on every [`PlaybackEngine::tick`], while completion of the
//! main voice arrives asynchronously from the audio thread and is picked up
//! by [`PlaybackEngine::poll_completion`].

use crate::audio::buffer::SampleBuffer;
use crate::audio::store::{BufferStore, Selection};
use crate::error::PlaybackError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Gain every voice starts from before ramping up.
pub const RAMP_FLOOR: f32 = 0.01;

/// One contiguous range of a buffer scheduled at a fixed gain.
pub struct Clip {
    buffer: Arc<SampleBuffer>,
    start_frame: usize,
    frame_count: usize,
    gain: f32,
    ramp: Duration,
    on_end: Option<(Sender<u64>, u64)>,
}

impl Clip {
    /// Creates a clip covering `duration` seconds from `offset`, clamped so it
    /// never reads past the end of `buffer`.
    pub fn new(
        buffer: Arc<SampleBuffer>,
        offset: f64,
        duration: f64,
        gain: f32,
        ramp: Duration,
    ) -> Self {
        let start_frame = buffer.frame_at(offset);
        let frame_count = (duration.max(0.0) * buffer.sample_rate() as f64).round() as usize;
        Self::frames(buffer, start_frame, frame_count, gain, ramp)
    }

    /// Creates a clip from frame positions, clamped to the buffer.
    pub fn frames(
        buffer: Arc<SampleBuffer>,
        start_frame: usize,
        frame_count: usize,
        gain: f32,
        ramp: Duration,
    ) -> Self {
        let start_frame = start_frame.min(buffer.frames());
        let frame_count = frame_count.min(buffer.frames() - start_frame);
        Self {
            buffer,
            start_frame,
            frame_count,
            gain,
            ramp,
            on_end: None,
        }
    }

    /// Asks for `session` to be sent on `tx` when the clip plays out.
    pub fn with_completion(mut self, tx: Sender<u64>, session: u64) -> Self {
        self.on_end = Some((tx, session));
        self
    }

    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / self.buffer.sample_rate() as f64
    }

    /// Signals completion, at most once.
    pub fn notify_end(&mut self) {
        if let Some((tx, session)) = self.on_end.take() {
            let _ = tx.send(session);
        }
    }
}

/// Iterates a [`Clip`] as interleaved, gain-ramped samples.
///
/// This is both the real-time source handed to rodio and the offline
/// renderer used by export.
pub struct ClipSource {
    clip: Clip,
    frame: usize,
    channel: usize,
    ramp_frames: usize,
}

impl ClipSource {
    pub fn new(clip: Clip) -> Self {
        let ramp_frames =
            (clip.ramp.as_secs_f64() * clip.buffer.sample_rate() as f64).round() as usize;
        Self {
            clip,
            frame: 0,
            channel: 0,
            ramp_frames,
        }
    }

    /// Gain applied at the given frame of the clip.
    fn gain_at(&self, frame: usize) -> f32 {
        let target = self.clip.gain;
        if target <= 0.0 {
            return 0.0;
        }
        if frame >= self.ramp_frames {
            return target;
        }
        let progress = frame as f32 / self.ramp_frames as f32;
        RAMP_FLOOR * (target / RAMP_FLOOR).powf(progress)
    }
}

impl Iterator for ClipSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.frame >= self.clip.frame_count {
            self.clip.notify_end();
            return None;
        }

        let index = self.clip.start_frame + self.frame;
        let sample = self.clip.buffer.channel(self.channel)[index] * self.gain_at(self.frame);

        self.channel += 1;
        if self.channel == self.clip.buffer.channel_count() {
            self.channel = 0;
            self.frame += 1;
        }

        Some(sample)
    }
}

impl Source for ClipSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.clip.buffer.channel_count() as u16
    }

    fn sample_rate(&self) -> u32 {
        self.clip.buffer.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(self.clip.duration()))
    }
}

/// A sounding clip that can be stopped.
pub trait Voice {
    /// Stops and disconnects the voice.
    ///
    /// Returns [`PlaybackError::AlreadyStopped`] if it had already finished.
    fn stop(&mut self) -> Result<(), PlaybackError>;
}

/// Something that can start clips sounding.
pub trait AudioOutput {
    fn start(&mut self, clip: Clip) -> Result<Box<dyn Voice>, PlaybackError>;
}

/// Audio output through the default device, one rodio sink per voice.
pub struct RodioOutput {
    /// Must be kept alive for the handle to work.
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioOutput {
    /// Opens the default output device.
    pub fn open_default() -> Result<Self, PlaybackError> {
        let (stream, handle) = OutputStream::try_default().map_err(|e| PlaybackError::Output {
            reason: e.to_string(),
        })?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

impl AudioOutput for RodioOutput {
    fn start(&mut self, clip: Clip) -> Result<Box<dyn Voice>, PlaybackError> {
        let sink = Sink::try_new(&self.handle).map_err(|e| PlaybackError::Output {
            reason: e.to_string(),
        })?;
        sink.append(ClipSource::new(clip));
        Ok(Box::new(SinkVoice { sink: Some(sink) }))
    }
}

struct SinkVoice {
    sink: Option<Sink>,
}

impl Voice for SinkVoice {
    fn stop(&mut self) -> Result<(), PlaybackError> {
        let sink = self.sink.take().ok_or(PlaybackError::AlreadyStopped)?;
        let finished = sink.empty();
        sink.stop();
        if finished {
            Err(PlaybackError::AlreadyStopped)
        } else {
            Ok(())
        }
    }
}

/// The time range a session plays, in seconds of the main buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayWindow {
    pub start: f64,
    pub duration: f64,
}

impl PlayWindow {
    /// Resolves the window for a play action.
    ///
    /// The selection wins if there is one; otherwise play runs from `from` to
    /// the end. Returns `None` when nothing would sound.
    pub fn resolve(selection: Option<Selection>, from: f64, buffer_duration: f64) -> Option<Self> {
        let (start, requested) = match selection {
            Some(s) => (s.start, s.duration()),
            None => (from.max(0.0), buffer_duration - from.max(0.0)),
        };
        let duration = requested.min(buffer_duration - start);
        (duration > 0.0).then_some(Self { start, duration })
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// The voices of one play action.
pub struct PlaybackSession {
    id: u64,
    voices: Vec<Box<dyn Voice>>,
    window: PlayWindow,
    started_at: Instant,
}

impl PlaybackSession {
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn window(&self) -> PlayWindow {
        self.window
    }

    /// Playhead position at `now`, and whether the window is exhausted.
    fn position(&self, now: Instant) -> (f64, bool) {
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let done = elapsed >= self.window.duration;
        (self.window.start + elapsed.min(self.window.duration), done)
    }

    /// Stops every voice. Voices that already finished count as stopped.
    fn teardown(self) {
        for mut voice in self.voices {
            match voice.stop() {
                Ok(()) | Err(PlaybackError::AlreadyStopped) => {}
                Err(e) => tracing::warn!(error = %e, "failed to stop voice"),
            }
        }
    }
}

/// Schedules and tracks playback sessions.
pub struct PlaybackEngine<O: AudioOutput> {
    output: O,
    session: Option<PlaybackSession>,
    ramp: Duration,
    next_session: u64,
    completions_tx: Sender<u64>,
    completions_rx: Receiver<u64>,
}

impl<O: AudioOutput> PlaybackEngine<O> {
    /// Creates an engine that fades every voice in over `ramp`.
    pub fn new(output: O, ramp: Duration) -> Self {
        let (completions_tx, completions_rx) = unbounded();
        Self {
            output,
            session: None,
            ramp,
            next_session: 0,
            completions_tx,
            completions_rx,
        }
    }

    /// Starts playback of the main buffer and every unmuted layer.
    ///
    /// Any running session is stopped first. Returns `Ok(false)` when the
    /// effective window is empty, in which case nothing is scheduled.
    ///
    /// # Arguments
    ///
    /// * `store` - Source of the buffers, selection and volumes
    /// * `from` - Start time when there is no selection
    /// * `now` - Wall-clock time the session starts at
    pub fn play(
        &mut self,
        store: &BufferStore,
        from: f64,
        now: Instant,
    ) -> Result<bool, PlaybackError> {
        self.stop();

        let main = store.main().ok_or(PlaybackError::NoBuffer)?;
        let Some(window) = PlayWindow::resolve(store.selection(), from, main.duration()) else {
            tracing::debug!(from, "nothing to play in window");
            return Ok(false);
        };

        let id = self.next_session;
        self.next_session += 1;

        let main_clip = Clip::new(
            Arc::clone(main),
            window.start,
            window.duration,
            store.master_volume(),
            self.ramp,
        )
        .with_completion(self.completions_tx.clone(), id);
        let mut voices = vec![self.output.start(main_clip)?];

        for (index, layer) in store.layers().iter().enumerate() {
            if layer.muted {
                continue;
            }
            let layer_duration = layer.buffer.duration();
            let duration = window.duration.min(layer_duration - window.start);
            if duration <= 0.0 {
                continue;
            }
            let clip = Clip::new(
                Arc::clone(&layer.buffer),
                window.start.min(layer_duration),
                duration,
                layer.volume,
                self.ramp,
            );
            match self.output.start(clip) {
                Ok(voice) => voices.push(voice),
                Err(e) => tracing::warn!(layer = index, error = %e, "failed to start layer"),
            }
        }

        tracing::debug!(
            start = window.start,
            duration = window.duration,
            voices = voices.len(),
            "playback started"
        );
        self.session = Some(PlaybackSession {
            id,
            voices,
            window,
            started_at: now,
        });
        Ok(true)
    }

    /// Stops the current session, if any. Returns whether one was running.
    pub fn stop(&mut self) -> bool {
        // Completions from older sessions are stale once we stop.
        while self.completions_rx.try_recv().is_ok() {}
        match self.session.take() {
            Some(session) => {
                session.teardown();
                true
            }
            None => false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Recomputes the playhead for `now`.
    ///
    /// Returns the new position while a session is running. When the window
    /// is exhausted the session is torn down and its final position returned.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        let (position, done) = self.session.as_ref()?.position(now);
        if done {
            self.stop();
        }
        Some(position)
    }

    /// Handles completion notices from the audio thread.
    ///
    /// Returns true if the current session's main voice finished, in which
    /// case the session has been torn down.
    pub fn poll_completion(&mut self) -> bool {
        let Some(current) = self.session.as_ref().map(|s| s.id) else {
            return false;
        };
        let finished = self.completions_rx.try_iter().any(|id| id == current);
        if finished {
            self.stop();
        }
        finished
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

impl<O: AudioOutput> Drop for PlaybackEngine<O> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct MockState {
        clips: Vec<Clip>,
        stopped: Vec<bool>,
    }

    /// Records started clips instead of sounding them.
    #[derive(Default, Clone)]
    struct MockOutput(Rc<RefCell<MockState>>);

    struct MockVoice {
        index: usize,
        state: Rc<RefCell<MockState>>,
    }

    impl Voice for MockVoice {
        fn stop(&mut self) -> Result<(), PlaybackError> {
            let mut state = self.state.borrow_mut();
            if state.stopped[self.index] {
                return Err(PlaybackError::AlreadyStopped);
            }
            state.stopped[self.index] = true;
            Ok(())
        }
    }

    impl AudioOutput for MockOutput {
        fn start(&mut self, clip: Clip) -> Result<Box<dyn Voice>, PlaybackError> {
            let mut state = self.0.borrow_mut();
            state.clips.push(clip);
            state.stopped.push(false);
            Ok(Box::new(MockVoice {
                index: state.clips.len() - 1,
                state: Rc::clone(&self.0),
            }))
        }
    }

    impl MockOutput {
        fn clip_frames(&self) -> Vec<(usize, usize)> {
            self.0
                .borrow()
                .clips
                .iter()
                .map(|c| (c.start_frame(), c.frame_count()))
                .collect()
        }

        /// Simulates a voice playing out on its own.
        fn finish(&self, index: usize) {
            let mut state = self.0.borrow_mut();
            state.stopped[index] = true;
            state.clips[index].notify_end();
        }
    }

    const RATE: u32 = 1000;

    fn store_with(main_secs: f64, layers: &[f64]) -> BufferStore {
        let mut store = BufferStore::new(RATE, 0.8, 0.8);
        let frames = |s: f64| (s * RATE as f64) as usize;
        store.install("main", SampleBuffer::silent(RATE, 1, frames(main_secs)), false);
        for (i, &secs) in layers.iter().enumerate() {
            store.install(
                &format!("layer{i}"),
                SampleBuffer::silent(RATE, 1, frames(secs)),
                true,
            );
        }
        store
    }

    fn engine() -> (PlaybackEngine<MockOutput>, MockOutput) {
        let output = MockOutput::default();
        (
            PlaybackEngine::new(output.clone(), Duration::from_millis(10)),
            output,
        )
    }

    #[test]
    fn test_muted_layers_are_not_scheduled() {
        let mut store = store_with(3.0, &[3.0, 3.0]);
        store.set_muted(1, true).unwrap();
        let (mut engine, output) = engine();

        assert!(engine.play(&store, 0.0, Instant::now()).unwrap());
        assert_eq!(engine.session().unwrap().voice_count(), 2);
        assert_eq!(output.clip_frames().len(), 2);
    }

    #[test]
    fn test_stop_twice_is_idempotent() {
        let store = store_with(1.0, &[1.0]);
        let (mut engine, output) = engine();
        engine.play(&store, 0.0, Instant::now()).unwrap();

        assert!(engine.stop());
        assert!(!engine.stop());
        assert!(!engine.is_playing());
        assert!(output.0.borrow().stopped.iter().all(|&s| s));
    }

    #[test]
    fn test_stop_tolerates_finished_voices() {
        let store = store_with(1.0, &[1.0]);
        let (mut engine, output) = engine();
        engine.play(&store, 0.0, Instant::now()).unwrap();

        output.finish(1);
        assert!(engine.stop());
        assert!(engine.session().is_none());
    }

    #[test]
    fn test_play_replaces_previous_session() {
        let store = store_with(2.0, &[]);
        let (mut engine, output) = engine();
        engine.play(&store, 0.0, Instant::now()).unwrap();
        engine.play(&store, 1.0, Instant::now()).unwrap();

        let state = output.0.borrow();
        assert_eq!(state.stopped, vec![true, false]);
        assert_eq!(engine.session().unwrap().voice_count(), 1);
    }

    #[test]
    fn test_empty_window_is_a_no_op() {
        let store = store_with(2.0, &[2.0]);
        let (mut engine, output) = engine();

        assert!(!engine.play(&store, 2.0, Instant::now()).unwrap());
        assert!(!engine.play(&store, 5.0, Instant::now()).unwrap());
        assert!(!engine.is_playing());
        assert!(output.clip_frames().is_empty());
    }

    #[test]
    fn test_play_without_buffer_is_an_error() {
        let store = BufferStore::default();
        let (mut engine, _) = engine();
        assert!(matches!(
            engine.play(&store, 0.0, Instant::now()),
            Err(PlaybackError::NoBuffer)
        ));
    }

    #[test]
    fn test_selection_window_and_short_layers() {
        // Main 3s; layer 0 ends inside the window, layer 1 ends before it.
        let mut store = store_with(3.0, &[1.5, 0.5]);
        store.set_selection(Some(Selection::new(1.0, 2.0)));
        let (mut engine, output) = engine();

        engine.play(&store, 0.0, Instant::now()).unwrap();
        assert_eq!(
            engine.session().unwrap().window(),
            PlayWindow {
                start: 1.0,
                duration: 1.0
            }
        );
        assert_eq!(output.clip_frames(), vec![(1000, 1000), (1000, 500)]);
    }

    #[test]
    fn test_tick_advances_and_finishes() {
        let store = store_with(1.0, &[]);
        let (mut engine, _) = engine();
        let start = Instant::now();
        engine.play(&store, 0.25, start).unwrap();

        let pos = engine.tick(start + Duration::from_millis(500)).unwrap();
        assert_abs_diff_eq!(pos, 0.75, epsilon = 1e-9);
        assert!(engine.is_playing());

        let pos = engine.tick(start + Duration::from_millis(900)).unwrap();
        assert_abs_diff_eq!(pos, 1.0, epsilon = 1e-9);
        assert!(!engine.is_playing());
        assert!(engine.tick(start + Duration::from_secs(2)).is_none());
    }

    #[test]
    fn test_completion_tears_down_session() {
        let store = store_with(1.0, &[1.0]);
        let (mut engine, output) = engine();
        engine.play(&store, 0.0, Instant::now()).unwrap();
        assert!(!engine.poll_completion());

        output.finish(0);
        assert!(engine.poll_completion());
        assert!(!engine.is_playing());
        assert!(output.0.borrow().stopped.iter().all(|&s| s));
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let store = store_with(1.0, &[]);
        let (mut engine, output) = engine();
        engine.play(&store, 0.0, Instant::now()).unwrap();
        engine.play(&store, 0.0, Instant::now()).unwrap();

        output.finish(0);
        assert!(!engine.poll_completion());
        assert!(engine.is_playing());
    }

    #[test]
    fn test_clip_source_ramps_then_holds() {
        let buffer = Arc::new(SampleBuffer::new(1000, vec![vec![1.0; 50]]));
        let clip = Clip::frames(buffer, 0, 50, 0.5, Duration::from_millis(10));
        let samples: Vec<f32> = ClipSource::new(clip).collect();

        assert_eq!(samples.len(), 50);
        assert_abs_diff_eq!(samples[0], RAMP_FLOOR);
        assert!(samples[..10].windows(2).all(|w| w[1] > w[0]));
        assert!(samples[10..].iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_clip_source_interleaves_and_notifies_once() {
        let buffer = Arc::new(SampleBuffer::new(
            100,
            vec![vec![0.1, 0.2, 0.3], vec![-0.1, -0.2, -0.3]],
        ));
        let (tx, rx) = unbounded();
        let clip = Clip::frames(buffer, 1, 10, 1.0, Duration::ZERO).with_completion(tx, 7);
        let mut source = ClipSource::new(clip);

        let samples: Vec<f32> = source.by_ref().collect();
        assert_eq!(samples, vec![0.2, -0.2, 0.3, -0.3]);
        assert_eq!(source.next(), None);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_window_resolution() {
        assert_eq!(
            PlayWindow::resolve(None, 1.0, 3.0),
            Some(PlayWindow {
                start: 1.0,
                duration: 2.0
            })
        );
        assert_eq!(PlayWindow::resolve(Some(Selection::new(1.0, 1.0)), 0.0, 3.0), None);
        assert_eq!(PlayWindow::resolve(None, 3.0, 3.0), None);
    }
}

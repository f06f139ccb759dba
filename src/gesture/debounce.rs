//! Leading-edge debounce of gesture candidates.
//!
//! The detector reports the current gesture on every frame, many times a
//! second. A candidate is accepted when it differs from the last accepted
//! one (gesture or instrument) or when the debounce window has passed since
//! that accept. Suppressed candidates leave the state untouched, so a held
//! gesture re-triggers once per window rather than being pushed back forever.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// An accepted gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureEvent {
    pub gesture: String,
    pub instrument: String,
    pub timestamp: Instant,
}

/// What the debouncer remembers about the last accept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebounceState {
    pub last_gesture: Option<String>,
    pub last_instrument: Option<String>,
    pub last_timestamp: Option<Instant>,
}

impl DebounceState {
    fn accepts(&self, gesture: &str, instrument: &str, now: Instant, window: Duration) -> bool {
        let Some(last) = self.last_timestamp else {
            return true;
        };
        self.last_gesture.as_deref() != Some(gesture)
            || self.last_instrument.as_deref() != Some(instrument)
            || now.saturating_duration_since(last) > window
    }
}

/// Turns a stream of candidates into discrete events.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::default(),
        }
    }

    /// Offers a candidate observed at `now`.
    ///
    /// Returns the event if it was accepted. State only changes on accept.
    pub fn offer(&mut self, gesture: &str, instrument: &str, now: Instant) -> Option<GestureEvent> {
        if !self.state.accepts(gesture, instrument, now, self.window) {
            tracing::trace!(gesture, instrument, "gesture suppressed");
            return None;
        }

        self.state = DebounceState {
            last_gesture: Some(gesture.to_string()),
            last_instrument: Some(instrument.to_string()),
            last_timestamp: Some(now),
        };
        Some(GestureEvent {
            gesture: gesture.to_string(),
            instrument: instrument.to_string(),
            timestamp: now,
        })
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Forgets the last accept.
    pub fn reset(&mut self) {
        self.state = DebounceState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_repeat_within_window_is_suppressed() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(800));

        let accepted: Vec<_> = [0, 300, 900]
            .into_iter()
            .filter_map(|t| debouncer.offer("A", "piano", t0 + ms(t)))
            .map(|e| e.timestamp - t0)
            .collect();

        assert_eq!(accepted, vec![ms(0), ms(900)]);
    }

    #[test]
    fn test_changed_gesture_passes_immediately() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(800));
        assert!(debouncer.offer("A", "piano", t0).is_some());
        assert!(debouncer.offer("B", "piano", t0 + ms(100)).is_some());
    }

    #[test]
    fn test_changed_instrument_passes_immediately() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(800));
        assert!(debouncer.offer("A", "piano", t0).is_some());
        assert!(debouncer.offer("A", "drums", t0 + ms(1)).is_some());
        assert!(debouncer.offer("A", "drums", t0 + ms(2)).is_none());
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(800));
        debouncer.offer("A", "piano", t0);
        assert!(debouncer.offer("A", "piano", t0 + ms(800)).is_none());
        assert!(debouncer.offer("A", "piano", t0 + ms(801)).is_some());
    }

    #[test]
    fn test_suppression_does_not_extend_window() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(800));
        debouncer.offer("A", "piano", t0);
        for t in (100..800).step_by(100) {
            assert!(debouncer.offer("A", "piano", t0 + ms(t)).is_none());
        }
        assert_eq!(debouncer.state().last_timestamp, Some(t0));
        assert!(debouncer.offer("A", "piano", t0 + ms(850)).is_some());
    }

    #[test]
    fn test_manual_clock_and_reset() {
        let clock = ManualClock::new(Instant::now());
        let mut debouncer = Debouncer::new(ms(800));
        assert!(debouncer.offer("A", "piano", clock.now()).is_some());
        clock.advance(ms(10));
        assert!(debouncer.offer("A", "piano", clock.now()).is_none());
        debouncer.reset();
        assert!(debouncer.offer("A", "piano", clock.now()).is_some());
    }
}

//! Rate-limited key dispatch
//!
//! The firmware only reports transitions, so held keys are re-affirmed on the
//! host: the first press of a key is forwarded at once, then a background
//! repeater re-emits every held key at most once per `rate_limit` until it is
//! released. Releases are always forwarded immediately.
//!
//! All three paths (press, release, repeater tick) run under one lock. The
//! repeater task exists only while at least one key is held.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::event::{CoordKey, KeyEvent, KeyEventSink};

/// Default re-emit interval for held keys
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(50);

/// Shortest repeater tick
const MIN_TICK: Duration = Duration::from_millis(1);

struct DispatchState {
    pressed: HashSet<CoordKey>,
    last_sent: HashMap<CoordKey, Instant>,
    repeater: Option<JoinHandle<()>>,
    /// Bumped on every repeater stop; a task from an older epoch exits
    epoch: u64,
}

struct Shared {
    state: Mutex<DispatchState>,
    sink: Arc<dyn KeyEventSink>,
    rate_limit: Duration,
}

impl Shared {
    fn tick(&self) -> Duration {
        (self.rate_limit / 10).max(MIN_TICK)
    }
}

/// Deduplicates key presses and re-emits held keys at a bounded rate
pub struct KeyDispatcher {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl KeyDispatcher {
    /// Create a dispatcher whose repeater runs on `runtime`
    ///
    /// # Arguments
    /// * `runtime` - Runtime the repeater task is spawned on
    /// * `rate_limit` - Minimum interval between two emits of a held key
    /// * `sink` - Receives every forwarded event, with the lock held
    pub fn new(runtime: Handle, rate_limit: Duration, sink: Arc<dyn KeyEventSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DispatchState {
                    pressed: HashSet::new(),
                    last_sent: HashMap::new(),
                    repeater: None,
                    epoch: 0,
                }),
                sink,
                rate_limit,
            }),
            runtime,
        }
    }

    pub fn rate_limit(&self) -> Duration {
        self.shared.rate_limit
    }

    /// Register a press. Presses of an already held key are ignored.
    pub fn handle_key_press(&self, coord: CoordKey) {
        let mut state = self.shared.state.lock();
        if !state.pressed.insert(coord) {
            trace!("{} already held", coord);
            return;
        }
        state.last_sent.insert(coord, Instant::now());
        self.shared.sink.on_key_event(KeyEvent::press(coord));

        let running = state
            .repeater
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if !running {
            let epoch = state.epoch;
            debug!("Starting repeater (epoch {})", epoch);
            let shared = Arc::clone(&self.shared);
            state.repeater = Some(self.runtime.spawn(repeat_held_keys(shared, epoch)));
        }
    }

    /// Register a release. Forwarded immediately, never rate limited.
    pub fn handle_key_release(&self, coord: CoordKey) {
        let mut state = self.shared.state.lock();
        state.pressed.remove(&coord);
        state.last_sent.remove(&coord);
        self.shared.sink.on_key_event(KeyEvent::release(coord));

        if state.pressed.is_empty() {
            stop_repeater(&mut state);
        }
    }

    /// Keys currently held, in coordinate order
    pub fn pressed_keys(&self) -> Vec<CoordKey> {
        let state = self.shared.state.lock();
        let mut keys: Vec<_> = state.pressed.iter().copied().collect();
        keys.sort();
        keys
    }

    /// Whether a repeater task is alive
    pub fn is_repeating(&self) -> bool {
        self.shared
            .state
            .lock()
            .repeater
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop the repeater and forget all held keys without emitting releases
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        state.pressed.clear();
        state.last_sent.clear();
        stop_repeater(&mut state);
    }
}

impl Drop for KeyDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stop_repeater(state: &mut DispatchState) {
    if let Some(task) = state.repeater.take() {
        task.abort();
        state.epoch = state.epoch.wrapping_add(1);
        debug!("Repeater stopped");
    }
}

async fn repeat_held_keys(shared: Arc<Shared>, epoch: u64) {
    let mut ticker = tokio::time::interval(shared.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let mut state = shared.state.lock();
        if state.epoch != epoch || state.pressed.is_empty() {
            break;
        }

        let mut held = Vec::new();
        if held.try_reserve(state.pressed.len()).is_err() {
            warn!("Skipping repeat tick: snapshot allocation failed");
            continue;
        }
        held.extend(state.pressed.iter().copied());

        let now = Instant::now();
        for coord in held {
            let due = match state.last_sent.get(&coord) {
                Some(last) => now.duration_since(*last) >= shared.rate_limit,
                None => true,
            };
            if due {
                shared.sink.on_key_event(KeyEvent::repeat(coord));
                state.last_sent.insert(coord, now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Instant, KeyEvent)>>);

    impl KeyEventSink for Recorder {
        fn on_key_event(&self, event: KeyEvent) {
            self.0.lock().push((Instant::now(), event));
        }
    }

    impl Recorder {
        fn events(&self) -> Vec<KeyEvent> {
            self.0.lock().iter().map(|(_, e)| *e).collect()
        }

        fn repeats(&self) -> usize {
            self.events().iter().filter(|e| e.repeat).count()
        }
    }

    fn setup(rate_ms: u64) -> (KeyDispatcher, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = KeyDispatcher::new(
            Handle::current(),
            Duration::from_millis(rate_ms),
            recorder.clone(),
        );
        (dispatcher, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_emits_immediately() {
        let (dispatcher, rec) = setup(50);
        let key = CoordKey::matrix(1, 2);
        dispatcher.handle_key_press(key);
        assert_eq!(rec.events(), vec![KeyEvent::press(key)]);
        assert!(dispatcher.is_repeating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_key_repeats_once_per_interval() {
        let (dispatcher, rec) = setup(50);
        let key = CoordKey::matrix(0, 0);
        dispatcher.handle_key_press(key);
        tokio::time::sleep(Duration::from_millis(149)).await;
        dispatcher.handle_key_release(key);

        assert_eq!(rec.repeats(), 2);
        let stamps: Vec<Instant> = rec
            .0
            .lock()
            .iter()
            .filter(|(_, e)| e.repeat)
            .map(|(t, _)| *t)
            .collect();
        assert!(stamps[1].duration_since(stamps[0]) >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_press_ignored() {
        let (dispatcher, rec) = setup(50);
        let key = CoordKey::matrix(2, 3);
        dispatcher.handle_key_press(key);
        dispatcher.handle_key_press(key);
        dispatcher.handle_key_press(key);
        assert_eq!(rec.events().len(), 1);
        assert_eq!(dispatcher.pressed_keys(), vec![key]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_is_immediate() {
        let (dispatcher, rec) = setup(1_000);
        let key = CoordKey::matrix(4, 4);
        dispatcher.handle_key_press(key);
        let pressed_at = Instant::now();
        dispatcher.handle_key_release(key);

        let events = rec.0.lock().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].1, KeyEvent::release(key));
        assert_eq!(events[1].0, pressed_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_release_stops_repeater() {
        let (dispatcher, rec) = setup(20);
        let a = CoordKey::matrix(0, 1);
        let b = CoordKey::encoder(2);
        dispatcher.handle_key_press(a);
        dispatcher.handle_key_press(b);
        dispatcher.handle_key_release(a);
        assert!(dispatcher.is_repeating());
        dispatcher.handle_key_release(b);
        assert!(!dispatcher.is_repeating());

        let before = rec.events().len();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rec.events().len(), before);

        // Releasing again is harmless
        dispatcher.handle_key_release(b);
        assert!(!dispatcher.is_repeating());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeater_restarts_after_stop() {
        let (dispatcher, rec) = setup(20);
        let key = CoordKey::matrix(3, 3);
        dispatcher.handle_key_press(key);
        dispatcher.handle_key_release(key);
        dispatcher.handle_key_press(key);
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(rec.repeats(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_repeat_independently() {
        let (dispatcher, rec) = setup(50);
        let a = CoordKey::matrix(0, 0);
        let b = CoordKey::matrix(0, 1);
        dispatcher.handle_key_press(a);
        tokio::time::sleep(Duration::from_millis(30)).await;
        dispatcher.handle_key_press(b);
        tokio::time::sleep(Duration::from_millis(30)).await;

        // a is due at 50ms, b not until 80ms
        let repeats: Vec<_> = rec.events().into_iter().filter(|e| e.repeat).collect();
        assert_eq!(repeats, vec![KeyEvent::repeat(a)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_silent() {
        let (dispatcher, rec) = setup(50);
        dispatcher.handle_key_press(CoordKey::matrix(1, 1));
        dispatcher.shutdown();
        assert!(!dispatcher.is_repeating());
        assert!(dispatcher.pressed_keys().is_empty());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rec.events().len(), 1);
    }
}

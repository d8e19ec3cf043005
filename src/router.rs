//! Coordinate to key translation
//!
//! The router sits behind the dispatcher. It resolves coordinates through the
//! active profile's layer, watches initial presses for the profile
//! combination and forwards resolved keys to the emitter.
//!
//! A key is released with the code it was pressed with, even if the active
//! profile or the Fn layer changed while it was held. Releases of keys the
//! router never pressed are not forwarded.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::emulator::{KeyAction, KeyEmitter};
use crate::event::{CoordKey, KeyEvent, KeyEventSink};
use crate::keycodes::KeyCode;
use crate::keymap::Keymap;
use crate::profile::ProfileDetector;

struct RouterState<E> {
    keymap: Keymap,
    active_profile: u8,
    /// Fn key held on the board
    fn_layer: bool,
    detector: ProfileDetector,
    /// Key each held coordinate resolved to at press time
    held: HashMap<CoordKey, KeyCode>,
    emitter: E,
    emit_errors: u64,
}

impl<E: KeyEmitter> RouterState<E> {
    fn emit(&mut self, key: KeyCode, action: KeyAction) {
        if let Err(e) = self.emitter.emit(key, action) {
            self.emit_errors += 1;
            warn!("Failed to emit {:?} {}: {}", action, key, e);
        }
    }

    fn switch_profile(&mut self, profile: u8) -> bool {
        if !self.keymap.has_profile(profile) {
            warn!(
                "Profile {} has no layer in the keymap, staying on {}",
                profile, self.active_profile
            );
            return false;
        }
        if profile != self.active_profile {
            info!("Switching profile {} -> {}", self.active_profile, profile);
            self.active_profile = profile;
        }
        true
    }

    fn press(&mut self, coord: CoordKey) {
        let Some(key) = self
            .keymap
            .resolve_layered(self.active_profile, coord, self.fn_layer)
        else {
            debug!("{} is unmapped in profile {}", coord, self.active_profile);
            return;
        };
        self.held.insert(coord, key);

        if let Some(profile) = self.detector.on_key_press(key, Instant::now()) {
            self.switch_profile(profile);
        }
        self.emit(key, KeyAction::Press);
    }

    fn repeat(&mut self, coord: CoordKey) {
        if let Some(key) = self.held.get(&coord).copied() {
            self.emit(key, KeyAction::Repeat);
        }
    }

    fn release(&mut self, coord: CoordKey) {
        let Some(key) = self.held.remove(&coord) else {
            if let Some(key) = self.keymap.resolve(self.active_profile, coord) {
                self.detector.on_key_release(key);
            }
            trace!("Release of {} without a press", coord);
            return;
        };
        self.detector.on_key_release(key);
        self.emit(key, KeyAction::Release);
    }
}

/// Routes dispatched events through the keymap to an emitter
pub struct KeyRouter<E> {
    state: Mutex<RouterState<E>>,
}

impl<E: KeyEmitter> KeyRouter<E> {
    /// # Arguments
    /// * `keymap` - Layers to resolve coordinates with
    /// * `detector` - Profile combination watcher
    /// * `emitter` - Receives resolved keys
    /// * `initial_profile` - Active profile; falls back to the base layer if undefined
    pub fn new(keymap: Keymap, detector: ProfileDetector, emitter: E, initial_profile: u8) -> Self {
        let active_profile = if keymap.has_profile(initial_profile) {
            initial_profile
        } else {
            warn!(
                "Profile {} has no layer, starting on profile {}",
                initial_profile,
                crate::keymap::BASE_PROFILE
            );
            crate::keymap::BASE_PROFILE
        };
        Self {
            state: Mutex::new(RouterState {
                keymap,
                active_profile,
                fn_layer: false,
                detector,
                held: HashMap::new(),
                emitter,
                emit_errors: 0,
            }),
        }
    }

    pub fn active_profile(&self) -> u8 {
        self.state.lock().active_profile
    }

    /// Switch profile directly. Returns false if the keymap has no such layer.
    pub fn set_active_profile(&self, profile: u8) -> bool {
        self.state.lock().switch_profile(profile)
    }

    /// Fn layer change reported by the board. Affects keys pressed from now on.
    pub fn set_fn_layer(&self, active: bool) {
        let mut state = self.state.lock();
        if state.fn_layer != active {
            debug!("Fn layer {}", if active { "on" } else { "off" });
            state.fn_layer = active;
        }
    }

    pub fn fn_layer_active(&self) -> bool {
        self.state.lock().fn_layer
    }

    /// Held coordinates with the key they were pressed as
    pub fn held_keys(&self) -> Vec<(CoordKey, KeyCode)> {
        let state = self.state.lock();
        let mut held: Vec<_> = state.held.iter().map(|(c, k)| (*c, *k)).collect();
        held.sort();
        held
    }

    /// Emitter failures so far
    pub fn emit_errors(&self) -> u64 {
        self.state.lock().emit_errors
    }

    /// Release every held key and drop the Fn layer, e.g. on shutdown or
    /// link loss
    pub fn release_all(&self) {
        let mut state = self.state.lock();
        state.fn_layer = false;
        let held: Vec<_> = state.held.drain().collect();
        for (coord, key) in held {
            debug!("Releasing {} ({})", key, coord);
            state.detector.on_key_release(key);
            state.emit(key, KeyAction::Release);
        }
        state.detector.clear_pressed();
    }

    /// Run a closure with the emitter
    pub fn with_emitter<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        f(&mut self.state.lock().emitter)
    }
}

impl<E: KeyEmitter> KeyEventSink for KeyRouter<E> {
    fn on_key_event(&self, event: KeyEvent) {
        let mut state = self.state.lock();
        match (event.pressed, event.repeat) {
            (true, false) => state.press(event.coord),
            (true, true) => state.repeat(event.coord),
            (false, _) => state.release(event.coord),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::EmitError;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Vec<(KeyCode, KeyAction)>);

    impl KeyEmitter for Recorder {
        fn emit(&mut self, key: KeyCode, action: KeyAction) -> Result<(), EmitError> {
            self.0.push((key, action));
            Ok(())
        }
    }

    const KEYMAP: &str = r#"
        [dimension]
        rows = 2
        columns = 3

        [matrix]
        encoder = ["VolumeDown", "VolumeUp", "Mute"]
        base = [["ControlLeft", "ShiftLeft", "2"], ["A", "B", "None"]]
        layer2 = [["ControlLeft", "ShiftLeft", "2"], ["X", "Y", "Z"]]
        fn = [["None", "None", "F2"], ["Home", "None", "None"]]
    "#;

    fn router() -> KeyRouter<Recorder> {
        let keymap = Keymap::from_toml_str(KEYMAP).unwrap();
        let detector = ProfileDetector::with_combination(
            Duration::from_millis(100),
            [KeyCode::ControlLeft, KeyCode::ShiftLeft, KeyCode::Digit2],
        );
        KeyRouter::new(keymap, detector, Recorder::default(), 1)
    }

    fn emitted(router: &KeyRouter<Recorder>) -> Vec<(KeyCode, KeyAction)> {
        router.with_emitter(|r| r.0.clone())
    }

    #[test]
    fn test_resolves_through_active_layer() {
        let router = router();
        let a = CoordKey::matrix(1, 0);
        router.on_key_event(KeyEvent::press(a));
        router.on_key_event(KeyEvent::repeat(a));
        router.on_key_event(KeyEvent::release(a));
        assert_eq!(
            emitted(&router),
            vec![
                (KeyCode::A, KeyAction::Press),
                (KeyCode::A, KeyAction::Repeat),
                (KeyCode::A, KeyAction::Release),
            ]
        );
    }

    #[test]
    fn test_unmapped_key_is_dropped() {
        let router = router();
        let c = CoordKey::matrix(1, 2);
        router.on_key_event(KeyEvent::press(c));
        router.on_key_event(KeyEvent::repeat(c));
        router.on_key_event(KeyEvent::release(c));
        assert!(emitted(&router).is_empty());
    }

    #[test]
    fn test_encoder_uses_encoder_table() {
        let router = router();
        router.on_key_event(KeyEvent::press(CoordKey::encoder(1)));
        router.on_key_event(KeyEvent::release(CoordKey::encoder(1)));
        assert_eq!(
            emitted(&router),
            vec![
                (KeyCode::VolumeUp, KeyAction::Press),
                (KeyCode::VolumeUp, KeyAction::Release),
            ]
        );
    }

    #[test]
    fn test_combination_switches_profile() {
        let router = router();
        for col in 0..3 {
            router.on_key_event(KeyEvent::press(CoordKey::matrix(0, col)));
        }
        assert_eq!(router.active_profile(), 2);

        for col in 0..3 {
            router.on_key_event(KeyEvent::release(CoordKey::matrix(0, col)));
        }
        router.on_key_event(KeyEvent::press(CoordKey::matrix(1, 0)));
        assert_eq!(emitted(&router).last(), Some(&(KeyCode::X, KeyAction::Press)));
    }

    #[test]
    fn test_release_uses_key_from_press_time() {
        let router = router();
        let key = CoordKey::matrix(1, 1);
        router.on_key_event(KeyEvent::press(key));
        assert!(router.set_active_profile(2));
        router.on_key_event(KeyEvent::repeat(key));
        router.on_key_event(KeyEvent::release(key));

        let events = emitted(&router);
        assert_eq!(events[1], (KeyCode::B, KeyAction::Repeat));
        assert_eq!(events[2], (KeyCode::B, KeyAction::Release));
    }

    #[test]
    fn test_fn_layer_applies_to_new_presses() {
        let router = router();
        let a = CoordKey::matrix(1, 0);
        let b = CoordKey::matrix(1, 1);

        router.on_key_event(KeyEvent::press(a));
        router.set_fn_layer(true);
        assert!(router.fn_layer_active());
        // Unmapped in the fn layer
        router.on_key_event(KeyEvent::press(b));
        router.on_key_event(KeyEvent::release(a));
        router.on_key_event(KeyEvent::press(a));
        router.set_fn_layer(false);
        router.on_key_event(KeyEvent::release(a));
        router.on_key_event(KeyEvent::release(b));

        assert_eq!(
            emitted(&router),
            vec![
                (KeyCode::A, KeyAction::Press),
                (KeyCode::B, KeyAction::Press),
                (KeyCode::A, KeyAction::Release),
                (KeyCode::Home, KeyAction::Press),
                (KeyCode::Home, KeyAction::Release),
                (KeyCode::B, KeyAction::Release),
            ]
        );
    }

    #[test]
    fn test_release_without_press_is_dropped() {
        let router = router();
        router.on_key_event(KeyEvent::release(CoordKey::matrix(1, 0)));
        assert!(emitted(&router).is_empty());

        router.on_key_event(KeyEvent::press(CoordKey::matrix(1, 1)));
        router.release_all();
        router.on_key_event(KeyEvent::release(CoordKey::matrix(1, 1)));
        assert_eq!(
            emitted(&router),
            vec![(KeyCode::B, KeyAction::Press), (KeyCode::B, KeyAction::Release)]
        );
    }

    #[test]
    fn test_undefined_profile_is_refused() {
        let router = router();
        assert!(!router.set_active_profile(7));
        assert_eq!(router.active_profile(), 1);

        let keymap = Keymap::from_toml_str(KEYMAP).unwrap();
        let router = KeyRouter::new(keymap, ProfileDetector::default(), Recorder::default(), 9);
        assert_eq!(router.active_profile(), 1);
    }

    #[test]
    fn test_release_all() {
        let router = router();
        router.on_key_event(KeyEvent::press(CoordKey::matrix(1, 0)));
        router.on_key_event(KeyEvent::press(CoordKey::encoder(2)));
        assert_eq!(router.held_keys().len(), 2);

        router.release_all();
        assert!(router.held_keys().is_empty());
        let releases: Vec<_> = emitted(&router)
            .into_iter()
            .filter(|(_, a)| *a == KeyAction::Release)
            .map(|(k, _)| k)
            .collect();
        assert_eq!(releases.len(), 2);
        assert!(releases.contains(&KeyCode::A));
        assert!(releases.contains(&KeyCode::Mute));
    }
}

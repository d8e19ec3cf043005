//! Profile switching by key combination
//!
//! A profile switch is requested by holding every key of a configured
//! combination at once. One member of the combination is a digit key; its
//! value is the profile selected. Switches are themselves rate limited so a
//! combination held through a bounce cannot fire twice.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::keycodes::KeyCode;

/// Default minimum interval between profile switches
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(100);

/// Watches key presses for the profile combination
#[derive(Debug, Clone)]
pub struct ProfileDetector {
    combination: BTreeSet<KeyCode>,
    /// Relevant keys currently held, with their press time
    pressed: HashMap<KeyCode, Instant>,
    last_switch: Option<Instant>,
    rate_limit: Duration,
}

impl ProfileDetector {
    pub fn new(rate_limit: Duration) -> Self {
        Self {
            combination: BTreeSet::new(),
            pressed: HashMap::new(),
            last_switch: None,
            rate_limit,
        }
    }

    /// Detector preloaded with a combination
    pub fn with_combination(
        rate_limit: Duration,
        keys: impl IntoIterator<Item = KeyCode>,
    ) -> Self {
        let mut detector = Self::new(rate_limit);
        for key in keys {
            detector.add_modifier(key);
        }
        detector
    }

    /// Add a key to the combination. Returns false if it was already a member.
    pub fn add_modifier(&mut self, key: KeyCode) -> bool {
        self.combination.insert(key)
    }

    /// Remove a key from the combination. Returns false if it was not a member.
    pub fn remove_modifier(&mut self, key: KeyCode) -> bool {
        self.combination.remove(&key)
    }

    /// Members of the combination in key code order
    pub fn modifiers(&self) -> Vec<KeyCode> {
        self.combination.iter().copied().collect()
    }

    pub fn rate_limit(&self) -> Duration {
        self.rate_limit
    }

    /// Profile the combination selects, if it has a digit member.
    ///
    /// With several digit members the lowest one wins.
    pub fn target_profile(&self) -> Option<u8> {
        self.combination.iter().find_map(|k| k.digit())
    }

    /// Feed an initial key press (never a repeat).
    ///
    /// # Arguments
    /// * `key` - The key code the press resolved to
    /// * `now` - Press time
    ///
    /// # Returns
    /// The selected profile when this press completes the combination.
    pub fn on_key_press(&mut self, key: KeyCode, now: Instant) -> Option<u8> {
        if !self.combination.contains(&key) && key.digit().is_none() {
            return None;
        }
        if self.pressed.contains_key(&key) {
            return None;
        }
        self.pressed.insert(key, now);

        let mut held = 0;
        let mut earliest = now;
        for member in &self.combination {
            if let Some(t) = self.pressed.get(member) {
                held += 1;
                earliest = earliest.min(*t);
            }
        }
        if held != self.combination.len() {
            return None;
        }
        let profile = self.target_profile()?;

        if now.duration_since(earliest) > self.rate_limit {
            debug!(
                "Profile combination completed too slowly ({:?})",
                now.duration_since(earliest)
            );
            return None;
        }
        if let Some(last) = self.last_switch {
            if now.duration_since(last) <= self.rate_limit {
                debug!("Profile switch suppressed by rate limit");
                return None;
            }
        }

        self.last_switch = Some(now);
        info!("Profile combination detected: profile {}", profile);
        Some(profile)
    }

    /// Feed a key release
    pub fn on_key_release(&mut self, key: KeyCode) {
        self.pressed.remove(&key);
    }

    /// Forget held keys, e.g. after the link dropped
    pub fn clear_pressed(&mut self) {
        self.pressed.clear();
    }
}

impl Default for ProfileDetector {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT)
    }
}

//! Per-key bounce rejection
//!
//! The column alarm already waits out contact chatter on a column line. This
//! table adds a second guard per key: a press that follows the key's last
//! accepted transition within the threshold is treated as bounce and
//! dropped. A dropped press leaves the key released, so its eventual release
//! is never reported either and press/release pairs stay balanced.

/// Last accepted transition of one key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceEntry {
    last_transition_us: Option<u64>,
}

impl DebounceEntry {
    /// Whether a press at `now_us` is far enough from the last transition
    pub fn accepts_press(&self, now_us: u64, threshold_us: u64) -> bool {
        match self.last_transition_us {
            None => true,
            Some(last) => now_us.saturating_sub(last) > threshold_us,
        }
    }

    pub fn record(&mut self, now_us: u64) {
        self.last_transition_us = Some(now_us);
    }

    pub fn last_transition_us(&self) -> Option<u64> {
        self.last_transition_us
    }
}

/// Debounce entries for a `ROWS x COLS` matrix
#[derive(Debug, Clone)]
pub struct DebounceTable<const ROWS: usize, const COLS: usize> {
    entries: [[DebounceEntry; COLS]; ROWS],
    threshold_us: u64,
}

impl<const ROWS: usize, const COLS: usize> DebounceTable<ROWS, COLS> {
    pub fn new(threshold_us: u64) -> Self {
        Self {
            entries: [[DebounceEntry::default(); COLS]; ROWS],
            threshold_us,
        }
    }

    /// Accept or reject a press; accepted presses are recorded
    pub fn try_press(&mut self, row: usize, col: usize, now_us: u64) -> bool {
        let entry = &mut self.entries[row][col];
        if entry.accepts_press(now_us, self.threshold_us) {
            entry.record(now_us);
            true
        } else {
            false
        }
    }

    /// Releases are always accepted
    pub fn release(&mut self, row: usize, col: usize, now_us: u64) {
        self.entries[row][col].record(now_us);
    }

    pub fn entry(&self, row: usize, col: usize) -> DebounceEntry {
        self.entries[row][col]
    }
}

//! One-shot debounce alarms
//!
//! Every debounced line owns at most one pending alarm. An edge on the line
//! cancels the pending alarm and schedules a fresh one, so the line is only
//! sampled once it has been quiet for the whole debounce window.

use std::collections::HashMap;

/// Identifies the line an alarm belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlarmId {
    Column(u8),
    EncoderClk,
    EncoderButton,
}

/// Hardware timer capability: one-shot alarms keyed by [`AlarmId`]
pub trait AlarmScheduler {
    /// Schedule `id` to fire at `deadline_us`, replacing any pending alarm
    /// with the same id
    fn schedule(&mut self, id: AlarmId, deadline_us: u64);

    /// Cancel the pending alarm for `id`. Returns whether one was pending.
    fn cancel(&mut self, id: AlarmId) -> bool;

    /// Cancel then schedule
    fn reschedule(&mut self, id: AlarmId, deadline_us: u64) {
        self.cancel(id);
        self.schedule(id, deadline_us);
    }
}

/// Software alarm table driven by a microsecond clock.
///
/// Stands in for the hardware alarm pool: the owner calls
/// [`DeadlineAlarms::take_due`] from its main loop and dispatches whatever
/// fired.
#[derive(Debug, Default)]
pub struct DeadlineAlarms {
    pending: HashMap<AlarmId, u64>,
}

impl DeadlineAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, id: AlarmId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.values().min().copied()
    }

    /// Remove and return every alarm due at `now_us`, earliest first
    pub fn take_due(&mut self, now_us: u64) -> Vec<AlarmId> {
        let mut due: Vec<(u64, AlarmId)> = self
            .pending
            .iter()
            .filter(|(_, &deadline)| deadline <= now_us)
            .map(|(&id, &deadline)| (deadline, id))
            .collect();
        due.sort();
        for (_, id) in &due {
            self.pending.remove(id);
        }
        due.into_iter().map(|(_, id)| id).collect()
    }
}

impl AlarmScheduler for DeadlineAlarms {
    fn schedule(&mut self, id: AlarmId, deadline_us: u64) {
        self.pending.insert(id, deadline_us);
    }

    fn cancel(&mut self, id: AlarmId) -> bool {
        self.pending.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reschedule_replaces_pending() {
        let mut alarms = DeadlineAlarms::new();
        alarms.reschedule(AlarmId::Column(3), 100);
        alarms.reschedule(AlarmId::Column(3), 250);
        assert!(alarms.take_due(200).is_empty());
        assert_eq!(alarms.take_due(250), vec![AlarmId::Column(3)]);
        assert!(!alarms.is_pending(AlarmId::Column(3)));
    }

    #[test]
    fn test_due_in_deadline_order() {
        let mut alarms = DeadlineAlarms::new();
        alarms.schedule(AlarmId::EncoderButton, 30);
        alarms.schedule(AlarmId::Column(0), 10);
        alarms.schedule(AlarmId::EncoderClk, 20);
        assert_eq!(alarms.next_deadline(), Some(10));
        assert_eq!(
            alarms.take_due(30),
            vec![AlarmId::Column(0), AlarmId::EncoderClk, AlarmId::EncoderButton]
        );
    }

    #[test]
    fn test_cancel_reports_pending() {
        let mut alarms = DeadlineAlarms::new();
        assert!(!alarms.cancel(AlarmId::EncoderClk));
        alarms.schedule(AlarmId::EncoderClk, 5);
        assert!(alarms.cancel(AlarmId::EncoderClk));
        assert!(alarms.take_due(100).is_empty());
    }
}

//! Interrupt-driven key matrix scanner
//!
//! Idle state: every row is driven high, so closing any switch pulls its
//! column high and raises an edge interrupt. The scanner never samples on
//! the edge itself:
//!
//! ```text
//! IDLE --edge--> DEBOUNCE_PENDING --alarm--> sample column --> IDLE
//!                   ^        |
//!                   +-edge---+   (cancel + reschedule)
//! ```
//!
//! When the alarm fires the column is sampled once. If it reads asserted the
//! rows are driven one at a time to find which switches are closed; any
//! pressed key on the column whose row no longer reads asserted is released.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use orione_transport::KeyTransition;
use tracing::{debug, trace};

use crate::alarm::{AlarmId, AlarmScheduler};
use crate::debounce::DebounceTable;
use crate::error::{pin_err, MatrixError};
use crate::{layout, timing};

/// Output of one column evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    /// A regular key changed state
    Key(KeyTransition),
    /// The Fn key changed the active-layer flag
    FnLayer(bool),
}

/// Debounce state of one column line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnState {
    #[default]
    Idle,
    DebouncePending,
}

/// Scanner tuning
#[derive(Debug, Clone, Copy)]
pub struct ScannerConfig {
    /// Quiet time a column needs before it is sampled
    pub debounce_us: u64,
    /// Minimum time between a key's last transition and a new press
    pub press_threshold_us: u64,
    /// Settle time after driving a row before reading the column
    pub row_settle_us: u32,
    /// Position of the Fn key, if the board has one
    pub fn_key: Option<(u8, u8)>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            debounce_us: timing::MATRIX_DEBOUNCE_TIME_US,
            press_threshold_us: timing::DEBOUNCE_THRESHOLD_US,
            row_settle_us: timing::ROW_SETTLE_US,
            fn_key: Some((layout::FN_KEY_ROW, layout::FN_KEY_COL)),
        }
    }
}

/// Key matrix scanner for `ROWS` driven rows and `COLS` sensed columns
pub struct MatrixScanner<I, O, D, const ROWS: usize, const COLS: usize> {
    columns: [I; COLS],
    rows: [O; ROWS],
    delay: D,
    config: ScannerConfig,
    column_state: [ColumnState; COLS],
    pressed: [[bool; COLS]; ROWS],
    debounce: DebounceTable<ROWS, COLS>,
    fn_layer: bool,
    evaluations: u64,
}

impl<I, O, D, const ROWS: usize, const COLS: usize> MatrixScanner<I, O, D, ROWS, COLS>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    /// Create a scanner and drive all rows to the idle (high) level
    pub fn new(
        columns: [I; COLS],
        rows: [O; ROWS],
        delay: D,
        config: ScannerConfig,
    ) -> Result<Self, MatrixError> {
        let mut scanner = Self {
            columns,
            rows,
            delay,
            config,
            column_state: [ColumnState::Idle; COLS],
            pressed: [[false; COLS]; ROWS],
            debounce: DebounceTable::new(config.press_threshold_us),
            fn_layer: false,
            evaluations: 0,
        };
        scanner.drive_all_rows(true)?;
        Ok(scanner)
    }

    pub fn column_state(&self, col: u8) -> Option<ColumnState> {
        self.column_state.get(col as usize).copied()
    }

    pub fn is_pressed(&self, row: u8, col: u8) -> bool {
        self.pressed
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .copied()
            .unwrap_or(false)
    }

    /// Whether the Fn layer is active (Fn key held)
    pub fn fn_layer_active(&self) -> bool {
        self.fn_layer
    }

    /// Number of column samples taken so far
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Edge interrupt on a column line: restart its debounce window
    pub fn on_column_edge<A: AlarmScheduler>(
        &mut self,
        col: u8,
        now_us: u64,
        alarms: &mut A,
    ) -> Result<(), MatrixError> {
        let state = self
            .column_state
            .get_mut(col as usize)
            .ok_or(MatrixError::ColumnOutOfRange(col))?;
        alarms.reschedule(AlarmId::Column(col), now_us + self.config.debounce_us);
        if *state == ColumnState::DebouncePending {
            trace!("Column {} bounced, debounce restarted", col);
        }
        *state = ColumnState::DebouncePending;
        Ok(())
    }

    /// Debounce alarm fired for `col`: sample it and report transitions
    pub fn on_alarm(&mut self, col: u8, now_us: u64) -> Result<Vec<ScanEvent>, MatrixError> {
        let c = col as usize;
        let state = self
            .column_state
            .get_mut(c)
            .ok_or(MatrixError::ColumnOutOfRange(col))?;
        if *state != ColumnState::DebouncePending {
            return Ok(Vec::new());
        }
        *state = ColumnState::Idle;
        self.evaluations += 1;

        let asserted = self.columns[c].is_high().map_err(pin_err)?;
        let closed = if asserted {
            self.scan_rows(c)?
        } else {
            [false; ROWS]
        };

        let mut events = Vec::new();
        for (r, &is_closed) in closed.iter().enumerate() {
            let was_pressed = self.pressed[r][c];
            if is_closed && !was_pressed {
                if !self.debounce.try_press(r, c, now_us) {
                    debug!("Rejected bounce on ({}, {})", r, col);
                    continue;
                }
                self.pressed[r][c] = true;
                events.push(self.transition(r as u8, col, true));
            } else if !is_closed && was_pressed {
                self.debounce.release(r, c, now_us);
                self.pressed[r][c] = false;
                events.push(self.transition(r as u8, col, false));
            }
        }
        Ok(events)
    }

    fn transition(&mut self, row: u8, col: u8, pressed: bool) -> ScanEvent {
        if self.config.fn_key == Some((row, col)) {
            self.fn_layer = pressed;
            debug!("Fn layer {}", if pressed { "on" } else { "off" });
            ScanEvent::FnLayer(pressed)
        } else {
            ScanEvent::Key(KeyTransition::key(row, col, pressed))
        }
    }

    /// Drive each row high in turn and read `col`.
    ///
    /// Rows are returned to the idle level afterwards.
    fn scan_rows(&mut self, col: usize) -> Result<[bool; ROWS], MatrixError> {
        let mut closed = [false; ROWS];
        self.drive_all_rows(false)?;
        for r in 0..ROWS {
            self.rows[r].set_high().map_err(pin_err)?;
            self.delay.delay_us(self.config.row_settle_us);
            closed[r] = self.columns[col].is_high().map_err(pin_err)?;
            self.rows[r].set_low().map_err(pin_err)?;
        }
        self.drive_all_rows(true)?;
        Ok(closed)
    }

    fn drive_all_rows(&mut self, high: bool) -> Result<(), MatrixError> {
        for row in self.rows.iter_mut() {
            if high {
                row.set_high().map_err(pin_err)?;
            } else {
                row.set_low().map_err(pin_err)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::DeadlineAlarms;
    use crate::sim::{SimBoard, SimColumn, SimDelay, SimRow};

    type TestScanner = MatrixScanner<SimColumn, SimRow, SimDelay, 6, 17>;

    fn setup() -> (SimBoard, TestScanner, DeadlineAlarms) {
        let board = SimBoard::new(6, 17);
        let scanner = MatrixScanner::new(
            board.columns(),
            board.rows(),
            SimDelay,
            ScannerConfig::default(),
        )
        .unwrap();
        (board, scanner, DeadlineAlarms::new())
    }

    fn fire(scanner: &mut TestScanner, alarms: &mut DeadlineAlarms, now: u64) -> Vec<ScanEvent> {
        let mut out = Vec::new();
        for id in alarms.take_due(now) {
            if let AlarmId::Column(col) = id {
                out.extend(scanner.on_alarm(col, now).unwrap());
            }
        }
        out
    }

    #[test]
    fn test_press_and_release() {
        let (board, mut scanner, mut alarms) = setup();
        board.set_switch(2, 5, true);
        scanner.on_column_edge(5, 0, &mut alarms).unwrap();
        assert_eq!(scanner.column_state(5), Some(ColumnState::DebouncePending));
        assert_eq!(
            fire(&mut scanner, &mut alarms, 5_000),
            vec![ScanEvent::Key(KeyTransition::key(2, 5, true))]
        );
        assert_eq!(scanner.column_state(5), Some(ColumnState::Idle));

        board.set_switch(2, 5, false);
        scanner.on_column_edge(5, 100_000, &mut alarms).unwrap();
        assert_eq!(
            fire(&mut scanner, &mut alarms, 105_000),
            vec![ScanEvent::Key(KeyTransition::key(2, 5, false))]
        );
    }

    #[test]
    fn test_two_edges_inside_window_evaluate_once() {
        let (board, mut scanner, mut alarms) = setup();
        board.set_switch(1, 3, true);
        scanner.on_column_edge(3, 0, &mut alarms).unwrap();
        scanner.on_column_edge(3, 2_000, &mut alarms).unwrap();
        assert!(fire(&mut scanner, &mut alarms, 5_000).is_empty());
        let events = fire(&mut scanner, &mut alarms, 7_000);
        assert_eq!(events.len(), 1);
        assert_eq!(scanner.evaluations(), 1);
    }

    #[test]
    fn test_bounce_settling_open_reports_nothing() {
        let (board, mut scanner, mut alarms) = setup();
        board.set_switch(0, 0, true);
        scanner.on_column_edge(0, 0, &mut alarms).unwrap();
        board.set_switch(0, 0, false);
        scanner.on_column_edge(0, 1_000, &mut alarms).unwrap();
        assert!(fire(&mut scanner, &mut alarms, 6_000).is_empty());
        assert!(!scanner.is_pressed(0, 0));
    }

    #[test]
    fn test_fn_key_toggles_layer() {
        let (board, mut scanner, mut alarms) = setup();
        board.set_switch(4, 9, true);
        scanner.on_column_edge(9, 0, &mut alarms).unwrap();
        assert_eq!(
            fire(&mut scanner, &mut alarms, 5_000),
            vec![ScanEvent::FnLayer(true)]
        );
        assert!(scanner.fn_layer_active());

        board.set_switch(4, 9, false);
        scanner.on_column_edge(9, 50_000, &mut alarms).unwrap();
        assert_eq!(
            fire(&mut scanner, &mut alarms, 55_000),
            vec![ScanEvent::FnLayer(false)]
        );
        assert!(!scanner.fn_layer_active());
    }

    #[test]
    fn test_fast_repress_rejected_and_pair_kept() {
        let (board, mut scanner, mut alarms) = setup();
        board.set_switch(3, 7, true);
        scanner.on_column_edge(7, 0, &mut alarms).unwrap();
        assert_eq!(fire(&mut scanner, &mut alarms, 5_000).len(), 1);

        board.set_switch(3, 7, false);
        scanner.on_column_edge(7, 6_000, &mut alarms).unwrap();
        assert_eq!(fire(&mut scanner, &mut alarms, 11_000).len(), 1);

        // Re-press 10ms after the release: bounce
        board.set_switch(3, 7, true);
        scanner.on_column_edge(7, 16_000, &mut alarms).unwrap();
        assert!(fire(&mut scanner, &mut alarms, 21_000).is_empty());

        // Its release produces nothing either
        board.set_switch(3, 7, false);
        scanner.on_column_edge(7, 40_000, &mut alarms).unwrap();
        assert!(fire(&mut scanner, &mut alarms, 45_000).is_empty());
    }

    #[test]
    fn test_two_keys_same_column() {
        let (board, mut scanner, mut alarms) = setup();
        board.set_switch(0, 2, true);
        scanner.on_column_edge(2, 0, &mut alarms).unwrap();
        fire(&mut scanner, &mut alarms, 5_000);

        board.set_switch(5, 2, true);
        scanner.on_column_edge(2, 30_000, &mut alarms).unwrap();
        assert_eq!(
            fire(&mut scanner, &mut alarms, 35_000),
            vec![ScanEvent::Key(KeyTransition::key(5, 2, true))]
        );

        board.set_switch(0, 2, false);
        scanner.on_column_edge(2, 60_000, &mut alarms).unwrap();
        assert_eq!(
            fire(&mut scanner, &mut alarms, 65_000),
            vec![ScanEvent::Key(KeyTransition::key(0, 2, false))]
        );
        assert!(scanner.is_pressed(5, 2));
    }

    #[test]
    fn test_out_of_range_column() {
        let (_board, mut scanner, mut alarms) = setup();
        assert!(matches!(
            scanner.on_column_edge(17, 0, &mut alarms),
            Err(MatrixError::ColumnOutOfRange(17))
        ));
    }
}

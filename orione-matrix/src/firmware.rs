//! Board main loop
//!
//! Ties the scanner, the encoder and the alarm table to the uplink. Edge
//! interrupts call [`Firmware::on_edge`]; the main loop calls
//! [`Firmware::poll`] with the current time, which runs every due alarm and
//! sends the resulting transitions.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use orione_transport::ByteTransport;
use tracing::warn;

use crate::alarm::{AlarmId, DeadlineAlarms};
use crate::encoder::RotaryEncoder;
use crate::error::MatrixError;
use crate::scanner::MatrixScanner;
use crate::uplink::Uplink;

/// Source of an edge interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioEdge {
    Column(u8),
    EncoderClk,
    EncoderButton,
}

/// One keyboard half
pub struct Firmware<I, O, D, P, T, const ROWS: usize, const COLS: usize> {
    scanner: MatrixScanner<I, O, D, ROWS, COLS>,
    encoder: Option<RotaryEncoder<P>>,
    alarms: DeadlineAlarms,
    uplink: Uplink<T>,
}

impl<I, O, D, P, T, const ROWS: usize, const COLS: usize> Firmware<I, O, D, P, T, ROWS, COLS>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
    P: InputPin,
    T: ByteTransport,
{
    pub fn new(
        scanner: MatrixScanner<I, O, D, ROWS, COLS>,
        encoder: Option<RotaryEncoder<P>>,
        uplink: Uplink<T>,
    ) -> Self {
        Self {
            scanner,
            encoder,
            alarms: DeadlineAlarms::new(),
            uplink,
        }
    }

    pub fn scanner(&self) -> &MatrixScanner<I, O, D, ROWS, COLS> {
        &self.scanner
    }

    pub fn uplink(&self) -> &Uplink<T> {
        &self.uplink
    }

    /// Earliest time `poll` has work to do. Transitions still waiting for
    /// the link make it due immediately.
    pub fn next_deadline(&self) -> Option<u64> {
        if self.uplink.pending() > 0 {
            return Some(0);
        }
        self.alarms.next_deadline()
    }

    /// Edge interrupt handler
    pub fn on_edge(&mut self, edge: GpioEdge, now_us: u64) -> Result<(), MatrixError> {
        match edge {
            GpioEdge::Column(col) => self.scanner.on_column_edge(col, now_us, &mut self.alarms),
            GpioEdge::EncoderClk => {
                if let Some(enc) = self.encoder.as_mut() {
                    enc.on_clk_edge(now_us, &mut self.alarms);
                }
                Ok(())
            }
            GpioEdge::EncoderButton => {
                if let Some(enc) = self.encoder.as_mut() {
                    enc.on_button_edge(now_us, &mut self.alarms);
                }
                Ok(())
            }
        }
    }

    /// Run every due alarm, then send what they produced along with
    /// anything an earlier poll could not send. Returns messages sent.
    ///
    /// A failing alarm or link does not stop the other alarms; the first
    /// error is returned after all of them ran. Unsent transitions stay
    /// queued for the next poll.
    pub fn poll(&mut self, now_us: u64) -> Result<usize, MatrixError> {
        let mut first_err = None;
        for id in self.alarms.take_due(now_us) {
            if let Err(e) = self.run_alarm(id, now_us) {
                warn!("Alarm {:?} failed: {}", id, e);
                first_err.get_or_insert(e);
            }
        }
        let sent = self.uplink.flush();
        match first_err {
            Some(e) => Err(e),
            None => sent,
        }
    }

    fn run_alarm(&mut self, id: AlarmId, now_us: u64) -> Result<(), MatrixError> {
        match id {
            AlarmId::Column(col) => {
                for event in self.scanner.on_alarm(col, now_us)? {
                    self.uplink.enqueue_event(event);
                }
            }
            AlarmId::EncoderClk => {
                if let Some(enc) = self.encoder.as_mut() {
                    if let Some(rotation) = enc.on_clk_alarm()? {
                        for t in rotation.as_tap() {
                            self.uplink.enqueue(t);
                        }
                    }
                }
            }
            AlarmId::EncoderButton => {
                if let Some(enc) = self.encoder.as_mut() {
                    if let Some(t) = enc.on_button_alarm()? {
                        self.uplink.enqueue(t);
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether the Fn key is currently held
    pub fn fn_layer_active(&self) -> bool {
        self.scanner.fn_layer_active()
    }
}

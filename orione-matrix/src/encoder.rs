//! Rotary encoder with push button
//!
//! CLK and SW are debounced the same way as matrix columns: an edge restarts
//! the line's alarm and the line is read when the alarm fires. Rotation is
//! decoded on the falling edge of CLK; DT high at that moment means
//! clockwise. The button is active low.
//!
//! Encoder activity is reported as encoder key transitions using the
//! control indices in [`crate::encoder_control`].

use embedded_hal::digital::InputPin;
use orione_transport::KeyTransition;
use tracing::debug;

use crate::alarm::{AlarmId, AlarmScheduler};
use crate::encoder_control;
use crate::error::{pin_err, MatrixError};
use crate::timing;

/// Rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

impl Rotation {
    /// Encoder control index reported for this direction
    pub fn control(self) -> u8 {
        match self {
            Rotation::Clockwise => encoder_control::CW,
            Rotation::CounterClockwise => encoder_control::CCW,
        }
    }

    /// One detent reported as a tap: press then release of the control
    pub fn as_tap(self) -> [KeyTransition; 2] {
        [
            KeyTransition::encoder(self.control(), true),
            KeyTransition::encoder(self.control(), false),
        ]
    }
}

/// Rotary encoder on three input lines
pub struct RotaryEncoder<P> {
    clk: P,
    dt: P,
    sw: P,
    last_clk_high: bool,
    button_pressed: bool,
    clk_debounce_us: u64,
    button_debounce_us: u64,
}

impl<P: InputPin> RotaryEncoder<P> {
    pub fn new(clk: P, dt: P, sw: P) -> Self {
        Self {
            clk,
            dt,
            sw,
            // Pulled up at rest
            last_clk_high: true,
            button_pressed: false,
            clk_debounce_us: timing::ENCODER_DEBOUNCE_US,
            button_debounce_us: timing::BUTTON_DEBOUNCE_US,
        }
    }

    pub fn button_pressed(&self) -> bool {
        self.button_pressed
    }

    pub fn on_clk_edge<A: AlarmScheduler>(&mut self, now_us: u64, alarms: &mut A) {
        alarms.reschedule(AlarmId::EncoderClk, now_us + self.clk_debounce_us);
    }

    pub fn on_button_edge<A: AlarmScheduler>(&mut self, now_us: u64, alarms: &mut A) {
        alarms.reschedule(AlarmId::EncoderButton, now_us + self.button_debounce_us);
    }

    /// CLK settled: decode a detent if CLK fell since the last sample
    pub fn on_clk_alarm(&mut self) -> Result<Option<Rotation>, MatrixError> {
        let clk_high = self.clk.is_high().map_err(pin_err)?;
        let fell = self.last_clk_high && !clk_high;
        self.last_clk_high = clk_high;
        if !fell {
            return Ok(None);
        }
        let rotation = if self.dt.is_high().map_err(pin_err)? {
            Rotation::Clockwise
        } else {
            Rotation::CounterClockwise
        };
        debug!("Encoder {:?}", rotation);
        Ok(Some(rotation))
    }

    /// SW settled: report a button transition if its level changed
    pub fn on_button_alarm(&mut self) -> Result<Option<KeyTransition>, MatrixError> {
        let pressed = self.sw.is_low().map_err(pin_err)?;
        if pressed == self.button_pressed {
            return Ok(None);
        }
        self.button_pressed = pressed;
        Ok(Some(KeyTransition::encoder(
            encoder_control::BUTTON,
            pressed,
        )))
    }
}

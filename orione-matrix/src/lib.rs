//! Debounced key matrix and rotary encoder scanning
//!
//! Board-independent firmware logic for one Orione keyboard half, written
//! against `embedded-hal` pin traits so it runs both on the board and on the
//! host under test:
//!
//! - [`MatrixScanner`]: edge-triggered column debounce and row scan
//! - [`RotaryEncoder`]: CLK/DT rotation and push button
//! - [`DeadlineAlarms`]: one-shot alarm table behind [`AlarmScheduler`]
//! - [`Uplink`] / [`Firmware`]: encode transitions onto the serial link

pub mod alarm;
pub mod debounce;
pub mod encoder;
pub mod error;
pub mod firmware;
pub mod scanner;
pub mod sim;
pub mod uplink;

pub use alarm::{AlarmId, AlarmScheduler, DeadlineAlarms};
pub use debounce::{DebounceEntry, DebounceTable};
pub use encoder::{RotaryEncoder, Rotation};
pub use error::MatrixError;
pub use firmware::{Firmware, GpioEdge};
pub use scanner::{ColumnState, MatrixScanner, ScanEvent, ScannerConfig};
pub use uplink::Uplink;

/// Debounce and settle times (microseconds)
pub mod timing {
    /// Quiet time a column line needs before it is sampled
    pub const MATRIX_DEBOUNCE_TIME_US: u64 = 5_000;
    /// Minimum gap between a key's last transition and a new press
    pub const DEBOUNCE_THRESHOLD_US: u64 = 20_000;
    /// Row settle time before reading a column during a scan
    pub const ROW_SETTLE_US: u32 = 10;
    pub const ENCODER_DEBOUNCE_US: u64 = 1_000;
    pub const BUTTON_DEBOUNCE_US: u64 = 50_000;
}

/// Matrix geometry of the supported boards
pub mod layout {
    /// Left half (MSP432)
    pub const MSP432_ROWS: usize = 6;
    pub const MSP432_COLS: usize = 17;

    /// Right half (RP2040)
    pub const PICO_ROWS: usize = 5;
    pub const PICO_COLS: usize = 14;

    pub const FN_KEY_ROW: u8 = 4;
    pub const FN_KEY_COL: u8 = 9;
}

/// Encoder control indices carried in the X fragment of encoder messages
pub mod encoder_control {
    /// Counter-clockwise detent (volume down)
    pub const CCW: u8 = 0;
    /// Clockwise detent (volume up)
    pub const CW: u8 = 1;
    /// Push button (mute)
    pub const BUTTON: u8 = 2;
    pub const COUNT: usize = 3;
}

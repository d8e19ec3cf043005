//! Protocol constants and the decoder step cursor
//!
//! One key transition travels as three fragments, each a `(tag, data)` byte
//! pair, in fixed order:
//!
//! ```text
//! [X tag][row] [Y tag][col] [INFO tag][info]
//! ```
//!
//! There is no length prefix, delimiter or checksum. The receiver knows where
//! it is in a message purely from how many bytes it has consumed, which is
//! what [`CommStep`] tracks.

use crate::error::ProtocolError;

/// Fragment type tags (first byte of every fragment)
pub mod tag {
    pub const X: u8 = 0x00;
    pub const Y: u8 = 0x01;
    pub const INFO: u8 = 0x02;

    /// Get tag name for logging
    pub fn name(tag: u8) -> &'static str {
        match tag {
            X => "X",
            Y => "Y",
            INFO => "INFO",
            _ => "UNKNOWN",
        }
    }
}

/// Bits of the INFO fragment payload
pub mod info {
    /// Set on press, clear on release
    pub const PRESSED: u8 = 0x01;
    /// Set when x names an encoder control instead of a matrix column
    pub const ENCODER: u8 = 0x02;
    /// Set on Fn layer messages: x and y are zero and PRESSED tells whether
    /// the layer is now active
    pub const FN_LAYER: u8 = 0x04;
    /// Bits with a defined meaning; the rest are sent as zero and ignored
    pub const MASK: u8 = PRESSED | ENCODER | FN_LAYER;
}

/// Link timing and budgets
pub mod timing {
    /// Transport polls allowed while assembling a single fragment
    pub const MAX_WAIT_CYCLES: u32 = 50_000;
    /// Busy polls of the transmitter before a byte write is abandoned
    pub const UART_MAX_ATTEMPTS: u32 = 1_000;
    /// Baud rate used by both keyboard halves
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    /// Read timeout of the host serial port in milliseconds
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
}

/// Bytes in one encoded message
pub const MESSAGE_LEN: usize = 6;

/// Decoder position within one message.
///
/// The cursor names the step of the byte most recently consumed, so after
/// reading the X tag the cursor is `XType`, after its data byte `XData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum CommStep {
    #[default]
    Init = 0,
    XType = 1,
    XData = 2,
    YType = 3,
    YData = 4,
    InfoType = 5,
    InfoData = 6,
}

impl CommStep {
    /// All steps in wire order
    pub const ALL: [CommStep; 7] = [
        CommStep::Init,
        CommStep::XType,
        CommStep::XData,
        CommStep::YType,
        CommStep::YData,
        CommStep::InfoType,
        CommStep::InfoData,
    ];

    /// The step reached after consuming one more byte
    pub fn next(self) -> Result<CommStep, ProtocolError> {
        Self::from_u8(self as u8 + 1).ok_or(ProtocolError::StepOverflow)
    }

    pub fn from_u8(value: u8) -> Option<CommStep> {
        Self::ALL.get(value as usize).copied()
    }

    /// Tag a type byte must carry when consumed at this step
    pub fn expected_tag(self) -> Option<u8> {
        match self {
            CommStep::XType => Some(tag::X),
            CommStep::YType => Some(tag::Y),
            CommStep::InfoType => Some(tag::INFO),
            _ => None,
        }
    }

    /// Whether this step carries a type byte
    pub fn is_type_step(self) -> bool {
        self.expected_tag().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order() {
        let mut step = CommStep::Init;
        for expected in &CommStep::ALL[1..] {
            step = step.next().unwrap();
            assert_eq!(step, *expected);
        }
        assert!(matches!(step.next(), Err(ProtocolError::StepOverflow)));
    }

    #[test]
    fn test_type_steps_carry_tags() {
        assert_eq!(CommStep::XType.expected_tag(), Some(tag::X));
        assert_eq!(CommStep::YType.expected_tag(), Some(tag::Y));
        assert_eq!(CommStep::InfoType.expected_tag(), Some(tag::INFO));
        assert!(!CommStep::XData.is_type_step());
        assert!(!CommStep::Init.is_type_step());
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(tag::name(tag::INFO), "INFO");
        assert_eq!(tag::name(0x7F), "UNKNOWN");
    }
}

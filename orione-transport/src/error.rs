//! Transport and protocol error types

use thiserror::Error;

use crate::protocol::CommStep;

/// Errors that can occur during byte transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serial port not found: {0}")]
    PortNotFound(String),

    #[error("Serial port disconnected")]
    Disconnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("Serial error: {0}")]
    Serial(String),

    #[error("Serial permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "serial")]
impl From<serialport::Error> for TransportError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => TransportError::PortNotFound(e.description),
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                TransportError::PermissionDenied(e.description)
            }
            serialport::ErrorKind::Io(std::io::ErrorKind::TimedOut) => TransportError::Timeout,
            _ => TransportError::Serial(e.description),
        }
    }
}

/// Errors raised while assembling or sending a fragment message.
///
/// Every variant is recoverable: the host loop treats any of them as
/// "no message this cycle", resets the decoder and keeps reading.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// `receive_message` was entered with the cursor away from INIT
    #[error("Decoder not at INIT (cursor at {0:?})")]
    NotAtInit(CommStep),

    /// A byte arrived while the cursor was outside the expected fragment window
    #[error("Step mismatch: expected {expected:?} or its data step, cursor at {actual:?}")]
    StepMismatch { expected: CommStep, actual: CommStep },

    /// A type byte did not name the fragment kind expected at this step
    #[error("Unexpected fragment tag 0x{tag:02X} at {step:?}")]
    UnexpectedTag { tag: u8, step: CommStep },

    /// The cursor was advanced past INFO_DATA
    #[error("Cursor advanced past the last step")]
    StepOverflow,

    /// The poll budget ran out before a fragment completed
    #[error("Poll budget of {budget} cycles exhausted at {step:?}")]
    BudgetExhausted { budget: u32, step: CommStep },

    /// The transmitter stayed busy for the whole write budget
    #[error("Transmitter busy")]
    TxBusy,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// Whether this failure came from the link rather than from the byte stream
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            ProtocolError::Transport(TransportError::Disconnected)
                | ProtocolError::Transport(TransportError::PortNotFound(_))
                | ProtocolError::Transport(TransportError::PermissionDenied(_))
                | ProtocolError::Transport(TransportError::Io(_))
        )
    }
}

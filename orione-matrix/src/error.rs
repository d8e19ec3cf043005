//! Scanner error types

use embedded_hal::digital::ErrorKind;
use orione_transport::ProtocolError;
use thiserror::Error;

/// Errors raised by the matrix scanner, encoder or uplink
#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("GPIO error: {0:?}")]
    Pin(ErrorKind),

    #[error("Column {0} out of range")]
    ColumnOutOfRange(u8),

    #[error("Uplink failed: {0}")]
    Uplink(#[from] ProtocolError),
}

/// Map any embedded-hal pin error into [`MatrixError::Pin`]
pub(crate) fn pin_err<E: embedded_hal::digital::Error>(e: E) -> MatrixError {
    MatrixError::Pin(e.kind())
}

//! Byte transport and fragment codec for the Orione split keyboard
//!
//! The keyboard halves talk to the host over a plain serial link. Every key
//! transition is sent as a six-byte message of three `(tag, data)`
//! fragments; see [`protocol`] for the layout. This crate provides:
//!
//! - [`ByteTransport`], the byte-level link both ends are written against
//! - [`SerialTransport`], the host backend over a USB-UART bridge
//! - [`LoopbackTransport`], an in-memory link for tests and simulation
//! - [`encode_message`] / [`send_message`] for the firmware side
//! - [`MessageDecoder`] for the host side

pub mod codec;
pub mod error;
pub mod loopback;
pub mod protocol;
pub mod types;

#[cfg(feature = "serial")]
mod serial;

pub use codec::{encode_message, send_message, DecoderStats, MessageDecoder};
pub use error::{ProtocolError, TransportError};
pub use loopback::LoopbackTransport;
pub use protocol::CommStep;
pub use types::{Fragment, FragmentKind, KeyTransition, Message};

#[cfg(feature = "serial")]
pub use serial::{list_ports, PortSummary, SerialSettings, SerialTransport};

/// Byte-level full-duplex link.
///
/// Reads never block for longer than the backend's own timeout. A read that
/// finds nothing yet returns `Ok(None)` and is simply polled again by the
/// decoder (each poll counts against its cycle budget); a timeout or link
/// error aborts the fragment in progress.
pub trait ByteTransport: Send {
    /// Read one byte if one is available
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;

    /// Write one byte
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError>;

    /// Whether the transmitter can accept a byte right now
    fn tx_ready(&mut self) -> bool {
        true
    }

    /// Human readable link name for logging
    fn describe(&self) -> String {
        "byte transport".to_string()
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        (**self).write_byte(byte)
    }

    fn tx_ready(&mut self) -> bool {
        (**self).tx_ready()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

//! In-memory transport
//!
//! Two ends share a pair of byte queues. Used by the firmware simulator and
//! by tests that need to inject exact byte sequences into the decoder.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::ByteTransport;

type Queue = Arc<Mutex<VecDeque<u8>>>;

/// One end of an in-memory serial link
#[derive(Clone)]
pub struct LoopbackTransport {
    rx: Queue,
    tx: Queue,
    closed: Arc<AtomicBool>,
    /// Transmitter busy flag of this end, shared with its clones
    tx_busy: Arc<AtomicBool>,
    /// Report `Timeout` instead of `Ok(None)` when the receive queue is empty
    timeout_when_empty: bool,
}

impl LoopbackTransport {
    /// Create two connected ends: bytes written to one are read from the other
    pub fn pair() -> (Self, Self) {
        let a: Queue = Arc::default();
        let b: Queue = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                rx: a.clone(),
                tx: b.clone(),
                closed: closed.clone(),
                tx_busy: Arc::default(),
                timeout_when_empty: false,
            },
            Self {
                rx: b,
                tx: a,
                closed,
                tx_busy: Arc::default(),
                timeout_when_empty: false,
            },
        )
    }

    /// A single end whose receive queue is preloaded with `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let (end, _) = Self::pair();
        end.push_bytes(bytes);
        end
    }

    /// Make reads on an empty queue fail with `Timeout`, like a serial port
    /// with a read timeout configured
    pub fn with_timeouts(mut self) -> Self {
        self.timeout_when_empty = true;
        self
    }

    /// Append bytes to this end's receive queue
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.rx.lock().extend(bytes.iter().copied());
    }

    /// Drain everything written by this end that the peer has not read
    pub fn take_written(&self) -> Vec<u8> {
        self.tx.lock().drain(..).collect()
    }

    /// Bytes waiting to be read by this end
    pub fn pending(&self) -> usize {
        self.rx.lock().len()
    }

    /// Make this end's transmitter report busy until cleared
    pub fn set_tx_busy(&self, busy: bool) {
        self.tx_busy.store(busy, Ordering::SeqCst);
    }

    /// Close the link for both ends
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl ByteTransport for LoopbackTransport {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        if let Some(byte) = self.rx.lock().pop_front() {
            return Ok(Some(byte));
        }
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Disconnected)
        } else if self.timeout_when_empty {
            Err(TransportError::Timeout)
        } else {
            Ok(None)
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        self.tx.lock().push_back(byte);
        Ok(())
    }

    fn tx_ready(&mut self) -> bool {
        !self.tx_busy.load(Ordering::SeqCst)
    }

    fn describe(&self) -> String {
        "loopback".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_carries_bytes_both_ways() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.write_byte(0x11).unwrap();
        b.write_byte(0x22).unwrap();
        assert_eq!(b.read_byte().unwrap(), Some(0x11));
        assert_eq!(a.read_byte().unwrap(), Some(0x22));
        assert_eq!(a.read_byte().unwrap(), None);
    }

    #[test]
    fn test_empty_queue_modes() {
        let mut quiet = LoopbackTransport::from_bytes(&[]);
        assert!(matches!(quiet.read_byte(), Ok(None)));

        let mut strict = LoopbackTransport::from_bytes(&[]).with_timeouts();
        assert!(matches!(strict.read_byte(), Err(TransportError::Timeout)));
    }

    #[test]
    fn test_busy_flag_shared_with_clones() {
        let (mut a, _b) = LoopbackTransport::pair();
        let handle = a.clone();
        assert!(a.tx_ready());
        handle.set_tx_busy(true);
        assert!(!a.tx_ready());
        handle.set_tx_busy(false);
        assert!(a.tx_ready());
    }

    #[test]
    fn test_close_drains_then_disconnects() {
        let (mut a, b) = LoopbackTransport::pair();
        a.push_bytes(&[7]);
        b.close();
        assert_eq!(a.read_byte().unwrap(), Some(7));
        assert!(matches!(a.read_byte(), Err(TransportError::Disconnected)));
        assert!(matches!(a.write_byte(1), Err(TransportError::Disconnected)));
    }
}

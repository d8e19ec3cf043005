//! Fragment message encoder and decoder
//!
//! ```text
//! firmware:  KeyTransition -> Message -> encode_message -> 6 bytes -> UART
//! host:      serial bytes -> MessageDecoder (CommStep cursor) -> Message
//! ```
//!
//! The decoder owns its cursor. It advances by one step for every byte it
//! consumes and a message is only accepted when each type byte lands on its
//! type step and each data byte on the step right after. Anything else
//! discards the partial message; the caller calls [`MessageDecoder::reset`]
//! and the stream realigns on the next X tag.

use tracing::{debug, trace};

use crate::error::ProtocolError;
use crate::protocol::{tag, timing, CommStep, MESSAGE_LEN};
use crate::types::{Fragment, FragmentKind, Message};
use crate::ByteTransport;

// ============================================================================
// Encode
// ============================================================================

/// Lay out a message in wire order
pub fn encode_message(msg: &Message) -> [u8; MESSAGE_LEN] {
    let [xt, xd] = msg.x.to_bytes();
    let [yt, yd] = msg.y.to_bytes();
    let [it, id] = msg.info.to_bytes();
    [xt, xd, yt, yd, it, id]
}

/// Write a message to the transport.
///
/// Each byte waits for the transmitter for at most
/// [`timing::UART_MAX_ATTEMPTS`] polls. No acknowledgement is expected.
pub fn send_message<T: ByteTransport + ?Sized>(
    transport: &mut T,
    msg: &Message,
) -> Result<(), ProtocolError> {
    for byte in encode_message(msg) {
        write_when_ready(transport, byte)?;
    }
    trace!(
        "Sent message x={} y={} info=0x{:02X}",
        msg.x.data,
        msg.y.data,
        msg.info.data
    );
    Ok(())
}

fn write_when_ready<T: ByteTransport + ?Sized>(
    transport: &mut T,
    byte: u8,
) -> Result<(), ProtocolError> {
    for _ in 0..timing::UART_MAX_ATTEMPTS {
        if transport.tx_ready() {
            transport.write_byte(byte)?;
            return Ok(());
        }
    }
    Err(ProtocolError::TxBusy)
}

// ============================================================================
// Decode
// ============================================================================

/// Counters kept by the decoder for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Messages decoded successfully
    pub messages: u64,
    /// Messages discarded because a byte landed on the wrong step or tag
    pub desyncs: u64,
    /// Fragments abandoned because the link stalled
    pub timeouts: u64,
}

/// Host-side message decoder
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    step: CommStep,
    max_wait_cycles: u32,
    stats: DecoderStats,
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDecoder {
    /// Create a decoder at INIT with the default poll budget
    pub fn new() -> Self {
        Self::with_budget(timing::MAX_WAIT_CYCLES)
    }

    /// Create a decoder with a custom per-fragment poll budget
    pub fn with_budget(max_wait_cycles: u32) -> Self {
        Self {
            step: CommStep::Init,
            max_wait_cycles,
            stats: DecoderStats::default(),
        }
    }

    /// Current cursor
    pub fn step(&self) -> CommStep {
        self.step
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Re-arm the cursor at INIT, discarding any partial message
    pub fn reset(&mut self) {
        if self.step != CommStep::Init {
            trace!("Decoder reset from {:?}", self.step);
        }
        self.step = CommStep::Init;
    }

    /// Consume one byte, advancing the cursor.
    ///
    /// Empty polls are retried until `polls` reaches the budget.
    fn consume<T: ByteTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        polls: &mut u32,
    ) -> Result<u8, ProtocolError> {
        loop {
            if *polls >= self.max_wait_cycles {
                return Err(ProtocolError::BudgetExhausted {
                    budget: self.max_wait_cycles,
                    step: self.step,
                });
            }
            *polls += 1;
            if let Some(byte) = transport.read_byte()? {
                self.step = self.step.next()?;
                return Ok(byte);
            }
        }
    }

    /// Assemble one fragment whose type byte must be consumed at `expected_step`.
    ///
    /// # Arguments
    /// * `transport` - Link to read from
    /// * `expected_step` - One of `XType`, `YType`, `InfoType`
    ///
    /// # Returns
    /// The fragment, with the cursor left on the data step
    pub fn receive_fragment<T: ByteTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        expected_step: CommStep,
    ) -> Result<Fragment, ProtocolError> {
        let expected_tag = expected_step
            .expected_tag()
            .ok_or(ProtocolError::StepMismatch {
                expected: expected_step,
                actual: self.step,
            })?;
        let data_step = expected_step.next()?;
        let mut polls = 0u32;

        let type_byte = self.consume(transport, &mut polls)?;
        if self.step != expected_step {
            return Err(ProtocolError::StepMismatch {
                expected: expected_step,
                actual: self.step,
            });
        }
        if type_byte != expected_tag {
            return Err(ProtocolError::UnexpectedTag {
                tag: type_byte,
                step: self.step,
            });
        }

        let data = self.consume(transport, &mut polls)?;
        if self.step != data_step {
            return Err(ProtocolError::StepMismatch {
                expected: expected_step,
                actual: self.step,
            });
        }

        let kind = FragmentKind::from_tag(type_byte).ok_or(ProtocolError::UnexpectedTag {
            tag: type_byte,
            step: expected_step,
        })?;
        Ok(Fragment::new(kind, data))
    }

    /// Assemble one complete message. The cursor must be at INIT.
    ///
    /// On success the cursor is back at INIT. On failure the partial message
    /// is dropped and the cursor stays where the byte stream left it.
    pub fn receive_message<T: ByteTransport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<Message, ProtocolError> {
        if self.step != CommStep::Init {
            return Err(ProtocolError::NotAtInit(self.step));
        }
        let x = self.receive_fragment(transport, CommStep::XType)?;

        self.expect_at(CommStep::XData)?;
        let y = self.receive_fragment(transport, CommStep::YType)?;

        self.expect_at(CommStep::YData)?;
        let info = self.receive_fragment(transport, CommStep::InfoType)?;

        self.step = CommStep::Init;
        Ok(Message { x, y, info })
    }

    fn expect_at(&self, step: CommStep) -> Result<(), ProtocolError> {
        if self.step == step {
            Ok(())
        } else {
            Err(ProtocolError::StepMismatch {
                expected: step,
                actual: self.step,
            })
        }
    }

    /// Try to read one message, treating stream errors as "no message".
    ///
    /// Desyncs and stalls are logged, counted and followed by a reset.
    /// Only link failures (disconnect, I/O errors) are returned as errors.
    pub fn poll_message<T: ByteTransport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<Option<Message>, ProtocolError> {
        match self.receive_message(transport) {
            Ok(msg) => {
                self.stats.messages += 1;
                Ok(Some(msg))
            }
            Err(e) if e.is_link_failure() => {
                self.reset();
                Err(e)
            }
            Err(e) => {
                match &e {
                    // Nothing consumed yet: the link is idle, not stalled
                    ProtocolError::BudgetExhausted { .. } | ProtocolError::Transport(_)
                        if self.step == CommStep::Init => {}
                    ProtocolError::BudgetExhausted { .. } | ProtocolError::Transport(_) => {
                        self.stats.timeouts += 1;
                        debug!("Link stalled mid-message at {:?}: {}", self.step, e);
                    }
                    ProtocolError::UnexpectedTag { tag: t, step } => {
                        self.stats.desyncs += 1;
                        debug!("Dropped byte 0x{:02X} ({}) at {:?}", t, tag::name(*t), step);
                    }
                    _ => {
                        self.stats.desyncs += 1;
                        debug!("Discarded partial message: {}", e);
                    }
                }
                self.reset();
                Ok(None)
            }
        }
    }
}

//! Firmware side of the serial link
//!
//! Transitions are queued before they are written. A transition leaves the
//! queue only once all six bytes went out, so a busy or failing link delays
//! messages instead of losing them.

use std::collections::VecDeque;

use orione_transport::{send_message, ByteTransport, KeyTransition, Message};
use tracing::{debug, trace};

use crate::error::MatrixError;
use crate::scanner::ScanEvent;

/// Sends key transitions to the host as fragment messages
pub struct Uplink<T> {
    transport: T,
    queue: VecDeque<KeyTransition>,
    sent: u64,
}

impl<T: ByteTransport> Uplink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            queue: VecDeque::new(),
            sent: 0,
        }
    }

    /// Add a transition behind anything still waiting
    pub fn enqueue(&mut self, transition: KeyTransition) {
        self.queue.push_back(transition);
    }

    /// Queue a scanner event. Fn key changes travel as Fn layer messages.
    pub fn enqueue_event(&mut self, event: ScanEvent) {
        let transition = match event {
            ScanEvent::Key(t) => t,
            ScanEvent::FnLayer(active) => KeyTransition::fn_layer(active),
        };
        self.enqueue(transition);
    }

    /// Write queued transitions in order.
    ///
    /// Stops at the first failure and leaves that transition and everything
    /// after it queued for the next call.
    pub fn flush(&mut self) -> Result<usize, MatrixError> {
        let mut written = 0;
        while let Some(&transition) = self.queue.front() {
            if let Err(e) = send_message(&mut self.transport, &Message::from(transition)) {
                debug!(
                    "Uplink stalled with {} transition(s) queued: {}",
                    self.queue.len(),
                    e
                );
                return Err(e.into());
            }
            self.queue.pop_front();
            self.sent += 1;
            written += 1;
            trace!("Uplink sent {:?}", transition);
        }
        Ok(written)
    }

    /// Transitions waiting for the link
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Messages sent so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

//! Host pipeline wiring
//!
//! ```text
//! ByteTransport -> MessageDecoder -> KeyDispatcher -> KeyRouter -> KeyEmitter
//! ```
//!
//! The decode loop is blocking and meant to run on its own thread
//! (`spawn_blocking`); the dispatcher's repeater runs on the tokio runtime.

use orione_transport::{ByteTransport, DecoderStats, Message, MessageDecoder, ProtocolError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

use crate::config::DriverConfig;
use crate::dispatcher::KeyDispatcher;
use crate::emulator::KeyEmitter;
use crate::event::CoordKey;
use crate::keymap::Keymap;
use crate::profile::ProfileDetector;
use crate::router::KeyRouter;

/// Dispatcher and router for one emitter
pub struct Pipeline<E> {
    dispatcher: KeyDispatcher,
    router: Arc<KeyRouter<E>>,
}

impl<E: KeyEmitter + 'static> Pipeline<E> {
    /// Build the pipeline from config
    ///
    /// # Arguments
    /// * `runtime` - Runtime for the repeater task
    /// * `config` - Rate limits, profile combination and initial profile
    /// * `keymap` - Layers to resolve keys with
    /// * `emitter` - Final stage
    pub fn new(runtime: Handle, config: &DriverConfig, keymap: Keymap, emitter: E) -> Self {
        let detector = ProfileDetector::with_combination(
            config.profile.rate_limit(),
            config.profile.modifiers.iter().copied(),
        );
        if !config.profile.modifiers.is_empty() && detector.target_profile().is_none() {
            warn!("Profile combination has no digit key and will never switch");
        }
        let router = Arc::new(KeyRouter::new(
            keymap,
            detector,
            emitter,
            config.profile.initial,
        ));
        let dispatcher =
            KeyDispatcher::new(runtime, config.dispatcher.rate_limit(), router.clone());
        Self { dispatcher, router }
    }

    pub fn dispatcher(&self) -> &KeyDispatcher {
        &self.dispatcher
    }

    pub fn router(&self) -> &KeyRouter<E> {
        &self.router
    }

    /// Feed one decoded message. Fn layer changes go straight to the router;
    /// they are not keys and never repeat.
    pub fn dispatch(&self, msg: &Message) {
        let transition = msg.transition();
        if transition.fn_layer {
            self.router.set_fn_layer(transition.pressed);
            return;
        }
        let coord = CoordKey::from(transition);
        trace!("{} {}", coord, if transition.pressed { "down" } else { "up" });
        if transition.pressed {
            self.dispatcher.handle_key_press(coord);
        } else {
            self.dispatcher.handle_key_release(coord);
        }
    }

    /// Decode and dispatch until `shutdown` is set or the link fails.
    ///
    /// Desyncs and stalls are absorbed by the decoder; only link failures are
    /// returned. Returns the decoder statistics on a clean shutdown.
    pub fn run_blocking<T: ByteTransport + ?Sized>(
        &self,
        transport: &mut T,
        decoder: &mut MessageDecoder,
        shutdown: &AtomicBool,
    ) -> Result<DecoderStats, ProtocolError> {
        info!("Reading key events from {}", transport.describe());
        while !shutdown.load(Ordering::Relaxed) {
            if let Some(msg) = decoder.poll_message(transport)? {
                self.dispatch(&msg);
            }
        }
        let stats = decoder.stats();
        debug!(
            "Decode loop stopped: {} messages, {} desyncs, {} stalls",
            stats.messages, stats.desyncs, stats.timeouts
        );
        Ok(stats)
    }

    /// Drop all held keys and release them on the emitter
    pub fn release_all(&self) {
        self.dispatcher.shutdown();
        self.router.release_all();
    }
}

// Orione split keyboard host driver - shared library
// Key dispatch, profile switching, keymaps and OS key injection

pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod emulator;
pub mod event;
pub mod keycodes;
pub mod keymap;
pub mod profile;
pub mod router;

pub use config::{ConfigError, DriverConfig};
pub use dispatcher::KeyDispatcher;
pub use driver::Pipeline;
pub use emulator::{EmitError, KeyAction, KeyEmitter, LogEmitter};
#[cfg(target_os = "linux")]
pub use emulator::UinputEmitter;
pub use event::{CoordKey, KeyEvent, KeyEventSink};
pub use keycodes::KeyCode;
pub use keymap::{Keymap, KeymapError};
pub use profile::ProfileDetector;
pub use router::KeyRouter;

// Re-export the link layer so the binary and tests need only this crate
pub use orione_transport as transport;

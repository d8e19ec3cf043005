//! OS key injection
//!
//! [`KeyEmitter`] is the last stage of the pipeline. On Linux,
//! [`UinputEmitter`] creates a virtual keyboard through uinput; [`LogEmitter`]
//! only logs and is used by `monitor` mode.

use thiserror::Error;
use tracing::info;

use crate::keycodes::KeyCode;

/// Errors from key injection
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Failed to create virtual device: {0}")]
    CreateDevice(#[source] std::io::Error),
    #[error("Failed to emit event: {0}")]
    EmitEvent(#[source] std::io::Error),
    #[error("Key injection is not supported on this platform")]
    Unsupported,
}

/// What happened to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    /// Held key re-emitted by the repeater
    Repeat,
    Release,
}

impl KeyAction {
    /// Linux input event value
    pub fn value(self) -> i32 {
        match self {
            KeyAction::Release => 0,
            KeyAction::Press => 1,
            KeyAction::Repeat => 2,
        }
    }
}

/// Sink for resolved key events
pub trait KeyEmitter: Send {
    fn emit(&mut self, key: KeyCode, action: KeyAction) -> Result<(), EmitError>;

    fn describe(&self) -> String {
        "key emitter".to_string()
    }
}

impl<E: KeyEmitter + ?Sized> KeyEmitter for Box<E> {
    fn emit(&mut self, key: KeyCode, action: KeyAction) -> Result<(), EmitError> {
        (**self).emit(key, action)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Emitter that only logs
#[derive(Debug, Default)]
pub struct LogEmitter {
    emitted: u64,
}

impl LogEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl KeyEmitter for LogEmitter {
    fn emit(&mut self, key: KeyCode, action: KeyAction) -> Result<(), EmitError> {
        self.emitted += 1;
        info!("{:<8} {}", format!("{action:?}"), key);
        Ok(())
    }

    fn describe(&self) -> String {
        "log".to_string()
    }
}

#[cfg(target_os = "linux")]
pub use uinput::{evdev_key, UinputEmitter};

#[cfg(target_os = "linux")]
mod uinput {
    use super::{EmitError, KeyAction, KeyEmitter};
    use crate::keycodes::KeyCode;
    use evdev::{
        uinput::{VirtualDevice, VirtualDeviceBuilder},
        AttributeSet, EventType, InputEvent, Key,
    };
    use tracing::{debug, info};

    /// Virtual keyboard device using evdev/uinput
    pub struct UinputEmitter {
        device: VirtualDevice,
        name: String,
    }

    impl UinputEmitter {
        /// Create the virtual keyboard
        ///
        /// # Arguments
        /// * `name` - Device name (shown in `evtest` and desktop settings)
        pub fn new(name: &str) -> Result<Self, EmitError> {
            let mut keys = AttributeSet::<Key>::new();
            for key in KeyCode::ALL {
                keys.insert(evdev_key(*key));
            }

            let device = VirtualDeviceBuilder::new()
                .map_err(EmitError::CreateDevice)?
                .name(name)
                .with_keys(&keys)
                .map_err(EmitError::CreateDevice)?
                .build()
                .map_err(EmitError::CreateDevice)?;

            info!("Created virtual keyboard \"{}\"", name);
            Ok(Self {
                device,
                name: name.to_string(),
            })
        }
    }

    impl KeyEmitter for UinputEmitter {
        fn emit(&mut self, key: KeyCode, action: KeyAction) -> Result<(), EmitError> {
            let code = evdev_key(key);
            let event = InputEvent::new_now(EventType::KEY, code.code(), action.value());
            self.device
                .emit(&[event])
                .map_err(EmitError::EmitEvent)?;
            debug!("uinput {:?} {:?}", code, action);
            Ok(())
        }

        fn describe(&self) -> String {
            format!("uinput \"{}\"", self.name)
        }
    }

    /// Linux key for a key code
    pub fn evdev_key(key: KeyCode) -> Key {
        match key {
            KeyCode::A => Key::KEY_A,
            KeyCode::B => Key::KEY_B,
            KeyCode::C => Key::KEY_C,
            KeyCode::D => Key::KEY_D,
            KeyCode::E => Key::KEY_E,
            KeyCode::F => Key::KEY_F,
            KeyCode::G => Key::KEY_G,
            KeyCode::H => Key::KEY_H,
            KeyCode::I => Key::KEY_I,
            KeyCode::J => Key::KEY_J,
            KeyCode::K => Key::KEY_K,
            KeyCode::L => Key::KEY_L,
            KeyCode::M => Key::KEY_M,
            KeyCode::N => Key::KEY_N,
            KeyCode::O => Key::KEY_O,
            KeyCode::P => Key::KEY_P,
            KeyCode::Q => Key::KEY_Q,
            KeyCode::R => Key::KEY_R,
            KeyCode::S => Key::KEY_S,
            KeyCode::T => Key::KEY_T,
            KeyCode::U => Key::KEY_U,
            KeyCode::V => Key::KEY_V,
            KeyCode::W => Key::KEY_W,
            KeyCode::X => Key::KEY_X,
            KeyCode::Y => Key::KEY_Y,
            KeyCode::Z => Key::KEY_Z,
            KeyCode::Digit0 => Key::KEY_0,
            KeyCode::Digit1 => Key::KEY_1,
            KeyCode::Digit2 => Key::KEY_2,
            KeyCode::Digit3 => Key::KEY_3,
            KeyCode::Digit4 => Key::KEY_4,
            KeyCode::Digit5 => Key::KEY_5,
            KeyCode::Digit6 => Key::KEY_6,
            KeyCode::Digit7 => Key::KEY_7,
            KeyCode::Digit8 => Key::KEY_8,
            KeyCode::Digit9 => Key::KEY_9,
            KeyCode::F1 => Key::KEY_F1,
            KeyCode::F2 => Key::KEY_F2,
            KeyCode::F3 => Key::KEY_F3,
            KeyCode::F4 => Key::KEY_F4,
            KeyCode::F5 => Key::KEY_F5,
            KeyCode::F6 => Key::KEY_F6,
            KeyCode::F7 => Key::KEY_F7,
            KeyCode::F8 => Key::KEY_F8,
            KeyCode::F9 => Key::KEY_F9,
            KeyCode::F10 => Key::KEY_F10,
            KeyCode::F11 => Key::KEY_F11,
            KeyCode::F12 => Key::KEY_F12,
            KeyCode::ShiftLeft => Key::KEY_LEFTSHIFT,
            KeyCode::ShiftRight => Key::KEY_RIGHTSHIFT,
            KeyCode::ControlLeft => Key::KEY_LEFTCTRL,
            KeyCode::ControlRight => Key::KEY_RIGHTCTRL,
            KeyCode::AltLeft => Key::KEY_LEFTALT,
            KeyCode::AltRight => Key::KEY_RIGHTALT,
            KeyCode::SuperLeft => Key::KEY_LEFTMETA,
            KeyCode::SuperRight => Key::KEY_RIGHTMETA,
            KeyCode::Escape => Key::KEY_ESC,
            KeyCode::Tab => Key::KEY_TAB,
            KeyCode::CapsLock => Key::KEY_CAPSLOCK,
            KeyCode::Enter => Key::KEY_ENTER,
            KeyCode::Backspace => Key::KEY_BACKSPACE,
            KeyCode::Insert => Key::KEY_INSERT,
            KeyCode::Delete => Key::KEY_DELETE,
            KeyCode::Home => Key::KEY_HOME,
            KeyCode::End => Key::KEY_END,
            KeyCode::PageUp => Key::KEY_PAGEUP,
            KeyCode::PageDown => Key::KEY_PAGEDOWN,
            KeyCode::Up => Key::KEY_UP,
            KeyCode::Down => Key::KEY_DOWN,
            KeyCode::Left => Key::KEY_LEFT,
            KeyCode::Right => Key::KEY_RIGHT,
            KeyCode::Space => Key::KEY_SPACE,
            KeyCode::Grave => Key::KEY_GRAVE,
            KeyCode::Minus => Key::KEY_MINUS,
            KeyCode::Equal => Key::KEY_EQUAL,
            KeyCode::LeftBracket => Key::KEY_LEFTBRACE,
            KeyCode::RightBracket => Key::KEY_RIGHTBRACE,
            KeyCode::Backslash => Key::KEY_BACKSLASH,
            KeyCode::Semicolon => Key::KEY_SEMICOLON,
            KeyCode::Apostrophe => Key::KEY_APOSTROPHE,
            KeyCode::Comma => Key::KEY_COMMA,
            KeyCode::Period => Key::KEY_DOT,
            KeyCode::Slash => Key::KEY_SLASH,
            KeyCode::Numpad0 => Key::KEY_KP0,
            KeyCode::Numpad1 => Key::KEY_KP1,
            KeyCode::Numpad2 => Key::KEY_KP2,
            KeyCode::Numpad3 => Key::KEY_KP3,
            KeyCode::Numpad4 => Key::KEY_KP4,
            KeyCode::Numpad5 => Key::KEY_KP5,
            KeyCode::Numpad6 => Key::KEY_KP6,
            KeyCode::Numpad7 => Key::KEY_KP7,
            KeyCode::Numpad8 => Key::KEY_KP8,
            KeyCode::Numpad9 => Key::KEY_KP9,
            KeyCode::NumpadDecimal => Key::KEY_KPDOT,
            KeyCode::NumpadDivide => Key::KEY_KPSLASH,
            KeyCode::NumpadMultiply => Key::KEY_KPASTERISK,
            KeyCode::NumpadSubtract => Key::KEY_KPMINUS,
            KeyCode::NumpadAdd => Key::KEY_KPPLUS,
            KeyCode::NumpadEnter => Key::KEY_KPENTER,
            KeyCode::NumpadEqual => Key::KEY_KPEQUAL,
            KeyCode::NumLock => Key::KEY_NUMLOCK,
            KeyCode::ScrollLock => Key::KEY_SCROLLLOCK,
            KeyCode::PrintScreen => Key::KEY_SYSRQ,
            KeyCode::Pause => Key::KEY_PAUSE,
            KeyCode::Mute => Key::KEY_MUTE,
            KeyCode::VolumeUp => Key::KEY_VOLUMEUP,
            KeyCode::VolumeDown => Key::KEY_VOLUMEDOWN,
            KeyCode::MediaPlayPause => Key::KEY_PLAYPAUSE,
            KeyCode::MediaStop => Key::KEY_STOPCD,
            KeyCode::MediaNext => Key::KEY_NEXTSONG,
            KeyCode::MediaPrevious => Key::KEY_PREVIOUSSONG,
            KeyCode::Menu => Key::KEY_COMPOSE,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_values() {
        assert_eq!(KeyAction::Release.value(), 0);
        assert_eq!(KeyAction::Press.value(), 1);
        assert_eq!(KeyAction::Repeat.value(), 2);
    }

    #[test]
    fn test_log_emitter_counts() {
        let mut emitter: Box<dyn KeyEmitter> = Box::new(LogEmitter::new());
        emitter.emit(KeyCode::A, KeyAction::Press).unwrap();
        emitter.emit(KeyCode::A, KeyAction::Release).unwrap();
        assert_eq!(emitter.describe(), "log");
    }
}

//! Platform-independent key codes
//!
//! The numeric value of each code is its position in the table below; keymap
//! files may refer to keys either by that number or by name.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! keycodes {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// A key independent of any OS key numbering
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        pub enum KeyCode {
            $($variant),*
        }

        impl KeyCode {
            /// Every key code in numeric order
            pub const ALL: &'static [KeyCode] = &[$(KeyCode::$variant),*];

            /// Canonical name, as written in keymap files
            pub fn name(self) -> &'static str {
                match self {
                    $(KeyCode::$variant => $name),*
                }
            }
        }
    };
}

keycodes! {
    // Alphanumeric
    A => "A", B => "B", C => "C", D => "D", E => "E", F => "F", G => "G",
    H => "H", I => "I", J => "J", K => "K", L => "L", M => "M", N => "N",
    O => "O", P => "P", Q => "Q", R => "R", S => "S", T => "T", U => "U",
    V => "V", W => "W", X => "X", Y => "Y", Z => "Z",
    Digit0 => "0", Digit1 => "1", Digit2 => "2", Digit3 => "3", Digit4 => "4",
    Digit5 => "5", Digit6 => "6", Digit7 => "7", Digit8 => "8", Digit9 => "9",
    // Function row
    F1 => "F1", F2 => "F2", F3 => "F3", F4 => "F4", F5 => "F5", F6 => "F6",
    F7 => "F7", F8 => "F8", F9 => "F9", F10 => "F10", F11 => "F11", F12 => "F12",
    // Modifiers
    ShiftLeft => "ShiftLeft",
    ShiftRight => "ShiftRight",
    ControlLeft => "ControlLeft",
    ControlRight => "ControlRight",
    AltLeft => "AltLeft",
    AltRight => "AltRight",
    SuperLeft => "SuperLeft",
    SuperRight => "SuperRight",
    // Navigation and editing
    Escape => "Escape",
    Tab => "Tab",
    CapsLock => "CapsLock",
    Enter => "Enter",
    Backspace => "Backspace",
    Insert => "Insert",
    Delete => "Delete",
    Home => "Home",
    End => "End",
    PageUp => "PageUp",
    PageDown => "PageDown",
    Up => "Up",
    Down => "Down",
    Left => "Left",
    Right => "Right",
    // Punctuation
    Space => "Space",
    Grave => "Grave",
    Minus => "Minus",
    Equal => "Equal",
    LeftBracket => "LeftBracket",
    RightBracket => "RightBracket",
    Backslash => "Backslash",
    Semicolon => "Semicolon",
    Apostrophe => "Apostrophe",
    Comma => "Comma",
    Period => "Period",
    Slash => "Slash",
    // Numpad
    Numpad0 => "Numpad0", Numpad1 => "Numpad1", Numpad2 => "Numpad2",
    Numpad3 => "Numpad3", Numpad4 => "Numpad4", Numpad5 => "Numpad5",
    Numpad6 => "Numpad6", Numpad7 => "Numpad7", Numpad8 => "Numpad8",
    Numpad9 => "Numpad9",
    NumpadDecimal => "NumpadDecimal",
    NumpadDivide => "NumpadDivide",
    NumpadMultiply => "NumpadMultiply",
    NumpadSubtract => "NumpadSubtract",
    NumpadAdd => "NumpadAdd",
    NumpadEnter => "NumpadEnter",
    NumpadEqual => "NumpadEqual",
    // Locks and system
    NumLock => "NumLock",
    ScrollLock => "ScrollLock",
    PrintScreen => "PrintScreen",
    Pause => "Pause",
    // Media
    Mute => "Mute",
    VolumeUp => "VolumeUp",
    VolumeDown => "VolumeDown",
    MediaPlayPause => "MediaPlayPause",
    MediaStop => "MediaStop",
    MediaNext => "MediaNext",
    MediaPrevious => "MediaPrevious",
    Menu => "Menu",
}

impl KeyCode {
    /// Key code with the given numeric value
    pub fn from_index(index: u8) -> Option<KeyCode> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Digit value of the top-row number keys
    pub fn digit(self) -> Option<u8> {
        match self {
            KeyCode::Digit0 => Some(0),
            KeyCode::Digit1 => Some(1),
            KeyCode::Digit2 => Some(2),
            KeyCode::Digit3 => Some(3),
            KeyCode::Digit4 => Some(4),
            KeyCode::Digit5 => Some(5),
            KeyCode::Digit6 => Some(6),
            KeyCode::Digit7 => Some(7),
            KeyCode::Digit8 => Some(8),
            KeyCode::Digit9 => Some(9),
            _ => None,
        }
    }
}

/// Short names accepted on input
fn alias(name: &str) -> Option<KeyCode> {
    let key = match name {
        "esc" => KeyCode::Escape,
        "ctrl" | "lctrl" | "control" => KeyCode::ControlLeft,
        "rctrl" => KeyCode::ControlRight,
        "shift" | "lshift" => KeyCode::ShiftLeft,
        "rshift" => KeyCode::ShiftRight,
        "alt" | "lalt" => KeyCode::AltLeft,
        "ralt" | "altgr" => KeyCode::AltRight,
        "super" | "win" | "meta" | "cmd" | "lgui" => KeyCode::SuperLeft,
        "rgui" => KeyCode::SuperRight,
        "del" => KeyCode::Delete,
        "ins" => KeyCode::Insert,
        "bksp" => KeyCode::Backspace,
        "ret" | "return" => KeyCode::Enter,
        "pgup" => KeyCode::PageUp,
        "pgdn" => KeyCode::PageDown,
        "caps" => KeyCode::CapsLock,
        "spc" => KeyCode::Space,
        "prtsc" => KeyCode::PrintScreen,
        "volup" => KeyCode::VolumeUp,
        "voldown" => KeyCode::VolumeDown,
        "app" => KeyCode::Menu,
        _ => return None,
    };
    Some(key)
}

/// Error for unknown key names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key name: \"{0}\"")]
pub struct UnknownKey(pub String);

impl FromStr for KeyCode {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(key) = KeyCode::ALL
            .iter()
            .find(|k| k.name().eq_ignore_ascii_case(trimmed))
        {
            return Ok(*key);
        }
        let lower = trimmed.to_ascii_lowercase();
        if let Some(key) = alias(&lower) {
            return Ok(key);
        }
        // "Key1" / "KEY_1" style digit and letter names
        let stripped = lower
            .strip_prefix("key_")
            .or_else(|| lower.strip_prefix("key"))
            .or_else(|| lower.strip_prefix("digit"));
        if let Some(rest) = stripped {
            if let Some(key) = KeyCode::ALL
                .iter()
                .find(|k| k.name().eq_ignore_ascii_case(rest))
            {
                return Ok(*key);
            }
        }
        Err(UnknownKey(s.to_string()))
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for KeyCode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

/// Deserialize from a name (`"ControlLeft"`, `"Ctrl"`) or a numeric index.
impl<'de> Deserialize<'de> for KeyCode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match KeyCell::deserialize(d)? {
            KeyCell(Some(key)) => Ok(key),
            KeyCell(None) => Err(serde::de::Error::custom("empty key name")),
        }
    }
}

/// A keymap cell: a key or nothing.
///
/// Accepts a key name, a numeric index, or `"None"` / `""` for an empty
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCell(pub Option<KeyCode>);

impl Serialize for KeyCell {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.0.map_or("None", KeyCode::name))
    }
}

impl<'de> Deserialize<'de> for KeyCell {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Index(i64),
            Name(String),
        }

        match Repr::deserialize(d)? {
            Repr::Index(i) => u8::try_from(i)
                .ok()
                .and_then(KeyCode::from_index)
                .map(|key| KeyCell(Some(key)))
                .ok_or_else(|| serde::de::Error::custom(format!("key index {i} out of range"))),
            Repr::Name(name) => {
                let trimmed = name.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                    return Ok(KeyCell(None));
                }
                trimmed
                    .parse::<KeyCode>()
                    .map(|key| KeyCell(Some(key)))
                    .map_err(serde::de::Error::custom)
            }
        }
    }
}

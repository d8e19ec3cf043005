//! Common types for the fragment protocol

use crate::protocol::{info, tag, CommStep};

/// Fragment kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    X,
    Y,
    Info,
}

impl FragmentKind {
    /// Wire tag for this kind
    pub fn tag(self) -> u8 {
        match self {
            FragmentKind::X => tag::X,
            FragmentKind::Y => tag::Y,
            FragmentKind::Info => tag::INFO,
        }
    }

    pub fn from_tag(value: u8) -> Option<Self> {
        match value {
            tag::X => Some(FragmentKind::X),
            tag::Y => Some(FragmentKind::Y),
            tag::INFO => Some(FragmentKind::Info),
            _ => None,
        }
    }

    /// Step at which this kind's type byte is consumed
    pub fn type_step(self) -> CommStep {
        match self {
            FragmentKind::X => CommStep::XType,
            FragmentKind::Y => CommStep::YType,
            FragmentKind::Info => CommStep::InfoType,
        }
    }
}

/// One `(tag, data)` pair, the minimal unit on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub data: u8,
}

impl Fragment {
    pub fn new(kind: FragmentKind, data: u8) -> Self {
        Self { kind, data }
    }

    /// The two bytes this fragment occupies on the wire
    pub fn to_bytes(self) -> [u8; 2] {
        [self.kind.tag(), self.data]
    }
}

/// A key transition as produced by the firmware scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyTransition {
    /// Matrix row, or encoder control index when `encoder` is set
    pub x: u8,
    /// Matrix column, zero for encoder controls
    pub y: u8,
    pub pressed: bool,
    pub encoder: bool,
    /// Fn layer change rather than a key; `pressed` is the new layer state
    pub fn_layer: bool,
}

impl KeyTransition {
    pub fn key(row: u8, col: u8, pressed: bool) -> Self {
        Self {
            x: row,
            y: col,
            pressed,
            encoder: false,
            fn_layer: false,
        }
    }

    pub fn encoder(index: u8, pressed: bool) -> Self {
        Self {
            x: index,
            y: 0,
            pressed,
            encoder: true,
            fn_layer: false,
        }
    }

    /// Fn key went down (`active`) or up
    pub fn fn_layer(active: bool) -> Self {
        Self {
            x: 0,
            y: 0,
            pressed: active,
            encoder: false,
            fn_layer: true,
        }
    }

    /// INFO payload for this transition
    pub fn info_bits(&self) -> u8 {
        let mut bits = 0;
        if self.pressed {
            bits |= info::PRESSED;
        }
        if self.fn_layer {
            bits |= info::FN_LAYER;
        } else if self.encoder {
            bits |= info::ENCODER;
        }
        bits
    }
}

/// Three fragments describing one key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Message {
    pub x: Fragment,
    pub y: Fragment,
    pub info: Fragment,
}

impl Message {
    pub fn new(x: u8, y: u8, info_bits: u8) -> Self {
        Self {
            x: Fragment::new(FragmentKind::X, x),
            y: Fragment::new(FragmentKind::Y, y),
            info: Fragment::new(FragmentKind::Info, info_bits),
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.info.data & info::PRESSED != 0
    }

    pub fn is_encoder(&self) -> bool {
        self.info.data & info::ENCODER != 0
    }

    pub fn is_fn_layer(&self) -> bool {
        self.info.data & info::FN_LAYER != 0
    }

    /// Decode the transition this message carries, ignoring reserved INFO bits.
    /// The Fn layer bit wins over the encoder bit.
    pub fn transition(&self) -> KeyTransition {
        if self.is_fn_layer() {
            return KeyTransition::fn_layer(self.is_pressed());
        }
        KeyTransition {
            x: self.x.data,
            y: self.y.data,
            pressed: self.is_pressed(),
            encoder: self.is_encoder(),
            fn_layer: false,
        }
    }
}

impl From<KeyTransition> for Message {
    fn from(t: KeyTransition) -> Self {
        Message::new(t.x, t.y, t.info_bits())
    }
}

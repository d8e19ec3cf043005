//! Key coordinates and the events passed between pipeline stages

use orione_transport::KeyTransition;
use std::fmt;
use std::str::FromStr;

/// Identity of one physical control: a matrix position or an encoder control.
///
/// Text form is `"x_y"` for matrix keys and `"enc_x"` for encoder controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoordKey {
    pub x: u8,
    pub y: u8,
    pub encoder: bool,
}

impl CoordKey {
    /// Matrix key at `(row, col)`
    pub fn matrix(row: u8, col: u8) -> Self {
        Self {
            x: row,
            y: col,
            encoder: false,
        }
    }

    /// Encoder control by index
    pub fn encoder(index: u8) -> Self {
        Self {
            x: index,
            y: 0,
            encoder: true,
        }
    }
}

impl From<KeyTransition> for CoordKey {
    fn from(t: KeyTransition) -> Self {
        if t.encoder {
            CoordKey::encoder(t.x)
        } else {
            CoordKey::matrix(t.x, t.y)
        }
    }
}

impl fmt::Display for CoordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.encoder {
            write!(f, "enc_{}", self.x)
        } else {
            write!(f, "{}_{}", self.x, self.y)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid key coordinate: \"{0}\"")]
pub struct InvalidCoord(pub String);

impl FromStr for CoordKey {
    type Err = InvalidCoord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidCoord(s.to_string());
        if let Some(idx) = s.strip_prefix("enc_") {
            return idx.parse().map(CoordKey::encoder).map_err(|_| err());
        }
        let (x, y) = s.split_once('_').ok_or_else(err)?;
        Ok(CoordKey::matrix(
            x.parse().map_err(|_| err())?,
            y.parse().map_err(|_| err())?,
        ))
    }
}

/// A dispatched key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub coord: CoordKey,
    pub pressed: bool,
    /// Re-emitted by the repeater while the key is held
    pub repeat: bool,
}

impl KeyEvent {
    pub fn press(coord: CoordKey) -> Self {
        Self {
            coord,
            pressed: true,
            repeat: false,
        }
    }

    pub fn repeat(coord: CoordKey) -> Self {
        Self {
            coord,
            pressed: true,
            repeat: true,
        }
    }

    pub fn release(coord: CoordKey) -> Self {
        Self {
            coord,
            pressed: false,
            repeat: false,
        }
    }
}

/// Consumer of dispatched key events.
///
/// Called with the dispatcher's lock held; implementations must not call
/// back into the dispatcher.
pub trait KeyEventSink: Send + Sync {
    fn on_key_event(&self, event: KeyEvent);
}

impl<F> KeyEventSink for F
where
    F: Fn(KeyEvent) + Send + Sync,
{
    fn on_key_event(&self, event: KeyEvent) {
        self(event)
    }
}

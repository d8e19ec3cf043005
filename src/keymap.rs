//! Keymap layers loaded from TOML
//!
//! A keymap file declares the matrix size and up to ten layers, one per
//! profile, plus the three encoder controls:
//!
//! ```toml
//! [dimension]
//! rows = 6
//! columns = 17
//!
//! [matrix]
//! encoder = ["VolumeDown", "VolumeUp", "Mute"]
//! base = [["Escape", "F1", ...], ...]   # profile 1
//! layer2 = [[...], ...]                  # profile 2 ... layer9, layer0
//! fn = [[...], ...]                      # while the Fn key is held
//! ```
//!
//! Layers other than `base` are optional; a profile without a layer maps
//! nothing. Cells left unmapped in the `fn` layer fall through to the
//! active profile's layer.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::event::CoordKey;
use crate::keycodes::{KeyCell, KeyCode};

/// Encoder controls in a keymap: counter-clockwise, clockwise, push
pub const ENCODER_COUNT: usize = 3;

/// Profiles 0-9
pub const PROFILE_COUNT: usize = 10;

/// Profile the `base` layer belongs to
pub const BASE_PROFILE: u8 = 1;

/// Layout shipped with the driver
pub const DEFAULT_KEYMAP: &str = include_str!("../keymaps/default.toml");

#[derive(Debug, Error)]
pub enum KeymapError {
    #[error("Cannot read keymap {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse keymap: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Keymap dimensions must be non-zero and at most 255 (got {rows}x{columns})")]
    Dimension { rows: usize, columns: usize },

    #[error("Layer {layer} has {actual} rows, expected {expected}")]
    RowCount {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("Layer {layer} row {row} has {actual} columns, expected {expected}")]
    ColumnCount {
        layer: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Encoder table has {0} entries, expected 3")]
    EncoderCount(usize),
}

#[derive(Deserialize)]
struct KeymapFile {
    dimension: Dimension,
    matrix: MatrixSection,
}

#[derive(Deserialize)]
struct Dimension {
    rows: usize,
    columns: usize,
}

type Grid = Vec<Vec<KeyCell>>;

#[derive(Deserialize)]
struct MatrixSection {
    encoder: Vec<KeyCell>,
    base: Grid,
    layer2: Option<Grid>,
    layer3: Option<Grid>,
    layer4: Option<Grid>,
    layer5: Option<Grid>,
    layer6: Option<Grid>,
    layer7: Option<Grid>,
    layer8: Option<Grid>,
    layer9: Option<Grid>,
    layer0: Option<Grid>,
    #[serde(rename = "fn")]
    fn_layer: Option<Grid>,
}

impl MatrixSection {
    /// Layers with the profile they select
    fn into_layers(self) -> Vec<(u8, &'static str, Grid)> {
        let optional = [
            (2, "layer2", self.layer2),
            (3, "layer3", self.layer3),
            (4, "layer4", self.layer4),
            (5, "layer5", self.layer5),
            (6, "layer6", self.layer6),
            (7, "layer7", self.layer7),
            (8, "layer8", self.layer8),
            (9, "layer9", self.layer9),
            (0, "layer0", self.layer0),
        ];
        std::iter::once((BASE_PROFILE, "base", self.base))
            .chain(
                optional
                    .into_iter()
                    .filter_map(|(p, name, grid)| grid.map(|g| (p, name, g))),
            )
            .collect()
    }
}

/// Key lookup table for every profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    rows: usize,
    columns: usize,
    /// Row-major cells per profile, indexed by profile number
    layers: [Option<Vec<Option<KeyCode>>>; PROFILE_COUNT],
    fn_layer: Option<Vec<Option<KeyCode>>>,
    encoder: [Option<KeyCode>; ENCODER_COUNT],
}

impl Keymap {
    /// Parse and validate a keymap
    pub fn from_toml_str(content: &str) -> Result<Self, KeymapError> {
        let file: KeymapFile = toml::from_str(content)?;
        let Dimension { rows, columns } = file.dimension;
        if rows == 0 || columns == 0 || rows > 255 || columns > 255 {
            return Err(KeymapError::Dimension { rows, columns });
        }

        if file.matrix.encoder.len() != ENCODER_COUNT {
            return Err(KeymapError::EncoderCount(file.matrix.encoder.len()));
        }
        let mut encoder = [None; ENCODER_COUNT];
        for (slot, cell) in encoder.iter_mut().zip(&file.matrix.encoder) {
            *slot = cell.0;
        }

        let mut matrix = file.matrix;
        let fn_layer = matrix
            .fn_layer
            .take()
            .map(|grid| flatten_layer("fn", grid, rows, columns))
            .transpose()?;

        let mut layers: [Option<Vec<Option<KeyCode>>>; PROFILE_COUNT] = Default::default();
        for (profile, name, grid) in matrix.into_layers() {
            layers[profile as usize] = Some(flatten_layer(name, grid, rows, columns)?);
        }

        Ok(Self {
            rows,
            columns,
            layers,
            fn_layer,
            encoder,
        })
    }

    /// Load a keymap file
    pub fn load(path: &Path) -> Result<Self, KeymapError> {
        let content = std::fs::read_to_string(path).map_err(|source| KeymapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let keymap = Self::from_toml_str(&content)?;
        debug!(
            "Loaded keymap {:?}: {}x{}, profiles {:?}",
            path,
            keymap.rows,
            keymap.columns,
            keymap.profiles()
        );
        Ok(keymap)
    }

    /// The layout shipped with the driver
    pub fn builtin() -> Result<Self, KeymapError> {
        Self::from_toml_str(DEFAULT_KEYMAP)
    }

    /// `(rows, columns)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    /// Whether the keymap defines a layer for `profile`
    pub fn has_profile(&self, profile: u8) -> bool {
        self.layers
            .get(profile as usize)
            .is_some_and(|layer| layer.is_some())
    }

    /// Profiles with a layer, in numeric order
    pub fn profiles(&self) -> Vec<u8> {
        (0..PROFILE_COUNT as u8)
            .filter(|p| self.has_profile(*p))
            .collect()
    }

    /// Key at `(row, col)` in a profile's layer
    pub fn lookup(&self, profile: u8, row: u8, col: u8) -> Option<KeyCode> {
        let (row, col) = (row as usize, col as usize);
        if row >= self.rows || col >= self.columns {
            return None;
        }
        let layer = self.layers.get(profile as usize)?.as_ref()?;
        layer[row * self.columns + col]
    }

    pub fn has_fn_layer(&self) -> bool {
        self.fn_layer.is_some()
    }

    /// Key at `(row, col)` in the `fn` layer
    pub fn lookup_fn(&self, row: u8, col: u8) -> Option<KeyCode> {
        let (row, col) = (row as usize, col as usize);
        if row >= self.rows || col >= self.columns {
            return None;
        }
        self.fn_layer.as_ref()?[row * self.columns + col]
    }

    /// Key bound to an encoder control. Encoder bindings are shared by all profiles.
    pub fn encoder(&self, index: u8) -> Option<KeyCode> {
        self.encoder.get(index as usize).copied().flatten()
    }

    /// Key a coordinate resolves to under `profile`
    pub fn resolve(&self, profile: u8, coord: CoordKey) -> Option<KeyCode> {
        if coord.encoder {
            self.encoder(coord.x)
        } else {
            self.lookup(profile, coord.x, coord.y)
        }
    }

    /// Like [`Keymap::resolve`], consulting the `fn` layer first while Fn is
    /// held. Encoder controls ignore the Fn layer.
    pub fn resolve_layered(&self, profile: u8, coord: CoordKey, fn_held: bool) -> Option<KeyCode> {
        if fn_held && !coord.encoder {
            if let Some(key) = self.lookup_fn(coord.x, coord.y) {
                return Some(key);
            }
        }
        self.resolve(profile, coord)
    }

    /// Every key any layer or the encoder can produce
    pub fn used_keys(&self) -> Vec<KeyCode> {
        let mut keys: Vec<KeyCode> = self
            .layers
            .iter()
            .chain(std::iter::once(&self.fn_layer))
            .flatten()
            .flatten()
            .chain(self.encoder.iter())
            .flatten()
            .copied()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

fn flatten_layer(
    name: &str,
    grid: Grid,
    rows: usize,
    columns: usize,
) -> Result<Vec<Option<KeyCode>>, KeymapError> {
    if grid.len() != rows {
        return Err(KeymapError::RowCount {
            layer: name.to_string(),
            expected: rows,
            actual: grid.len(),
        });
    }
    let mut cells = Vec::with_capacity(rows * columns);
    for (row, line) in grid.into_iter().enumerate() {
        if line.len() != columns {
            return Err(KeymapError::ColumnCount {
                layer: name.to_string(),
                row,
                expected: columns,
                actual: line.len(),
            });
        }
        cells.extend(line.into_iter().map(|cell| cell.0));
    }
    Ok(cells)
}

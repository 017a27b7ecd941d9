/// Error taxonomy.
///
/// Two families:
///   - `InternalError`: a broken invariant in level data or in a query the
///     caller built. Never recovered from inside the core, only surfaced.
///   - `LoadError`: anything that can go wrong turning files into a
///     registry and a level.
///
/// Expected misses (tile not found, no overlap, no contact) are plain
/// values, not errors.

use thiserror::Error;

use crate::domain::tile::Subtype;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error("probe at ({probe_x}, {probe_y}) does not touch {subtype} tile at ({tile_x}, {tile_y})")]
    ProbeNotTouching {
        subtype: Subtype,
        probe_x: i32,
        probe_y: i32,
        tile_x: u16,
        tile_y: u16,
    },

    #[error(
        "no contact rule covers probe ({probe_x}, {probe_y}) against {subtype} tile \
         at ({tile_x}, {tile_y}) sized {width}x{height}"
    )]
    Unclassified {
        subtype: Subtype,
        probe_x: i32,
        probe_y: i32,
        tile_x: u16,
        tile_y: u16,
        width: u16,
        height: u16,
    },

    #[error("augmented tree invariant broken: {0}")]
    TreeInvariant(String),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("level parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown tile type '{0}'")]
    UnknownTileType(String),

    #[error("tile type '{0}' registered twice")]
    DuplicateTileType(String),

    #[error("tile registry is full (65535 types max)")]
    RegistryFull,

    #[error("tile type '{0}' is decorative and cannot be placed in the collision layer")]
    DecorInCollisionLayer(String),

    #[error("'{name}' placed at offset ({x}, {y}) falls outside the world")]
    OutOfWorld { name: String, x: i32, y: i32 },

    #[error("no level found: {0}")]
    NoLevel(String),
}

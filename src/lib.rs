/// Pixel-stepped platformer collision core.
///
/// `domain` holds the pure rules (tiles, contact classification, motion
/// resolution); `sim` holds the stateful parts (spatial index, levels,
/// the per-tick actor controller).

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;

pub use config::{Config, MovementConfig};
pub use domain::contact::{classify, contact_test, ContactType, Probe};
pub use domain::entity::{Actor, Facing, MotionState, TickInput};
pub use domain::flags::ActorFlags;
pub use domain::physics::{resolve, MotionSignal, Resolution, ResolveInput, TileSource};
pub use domain::rect::Rect;
pub use domain::tile::{Subtype, Tile, TileRegistry, TileType, TileTypeId};
pub use error::{InternalError, LoadError};
pub use sim::event::{DeathCause, GameEvent};
pub use sim::index::SpatialIndex;
pub use sim::level::{load_level, DecorLayer, Level, LoadedLevel};
pub use sim::step::step;
pub use sim::world::WorldState;

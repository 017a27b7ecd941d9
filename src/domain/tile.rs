/// Tile registry: tile types, their sizes and collision subtypes.
/// Collision behavior is queried via `Subtype` methods, not stored as flags,
/// so the subtype semantics stay centralized here.
///
/// The registry is built once from level data and is read-only afterwards.
/// A `TileTypeId` can only be minted by `TileRegistry::register`, so every id
/// in circulation refers to a registered type of the registry that made it.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use serde::Deserialize;

use super::rect::Rect;
use crate::error::LoadError;

/// Collision rule family for a tile type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subtype {
    None,            // Decorative, never collides
    Block,           // Solid, 3 px corners, wall stick on sides
    ThinBlock,       // Jump-through platform
    ThinStep,        // Step up/down from either side
    ThinStepOnLeft,  // Step up/down on the left side only
    ThinStepOnRight, // Step up/down on the right side only
    Spikes,          // Hazard, corners are safe
    PlantSpikyA,     // Hazard unless plants are reversed
    PlantSpikyB,     // Hazard only while plants are reversed
    DarkFloor,       // Solid, block rules
}

impl Subtype {
    /// Does this subtype take part in collisions at all?
    pub fn is_collidable(self) -> bool {
        !matches!(self, Subtype::None)
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subtype::None => "none",
            Subtype::Block => "block",
            Subtype::ThinBlock => "thin block",
            Subtype::ThinStep => "thin step",
            Subtype::ThinStepOnLeft => "left thin step",
            Subtype::ThinStepOnRight => "right thin step",
            Subtype::Spikes => "spikes",
            Subtype::PlantSpikyA => "spiky plant A",
            Subtype::PlantSpikyB => "spiky plant B",
            Subtype::DarkFloor => "dark floor",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TileTypeId(u16);

impl TileTypeId {
    pub fn raw(self) -> u16 { self.0 }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TileType {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub subtype: Subtype,
}

impl TileType {
    pub fn new(name: impl Into<String>, width: u16, height: u16, subtype: Subtype) -> Self {
        TileType { name: name.into(), width, height, subtype }
    }
}

/// A placed tile. Value type: equality is by `(type_id, x, y)`.
/// Geometry needs the registry; see `TileRegistry::rect`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Tile {
    pub type_id: TileTypeId,
    pub x: u16,
    pub y: u16,
}

impl Tile {
    pub fn new(type_id: TileTypeId, x: u16, y: u16) -> Self {
        Tile { type_id, x, y }
    }

    /// Same position, different type. Used for door-style replacements.
    pub fn with_type(self, type_id: TileTypeId) -> Self {
        Tile { type_id, ..self }
    }
}

/// Catalog of tile types, indexed by `TileTypeId`.
#[derive(Clone, Debug, Default)]
pub struct TileRegistry {
    types: Vec<TileType>,
    by_name: HashMap<String, TileTypeId>,
}

impl TileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tile_type: TileType) -> Result<TileTypeId, LoadError> {
        if self.types.len() >= u16::MAX as usize {
            return Err(LoadError::RegistryFull);
        }
        if self.by_name.contains_key(&tile_type.name) {
            return Err(LoadError::DuplicateTileType(tile_type.name));
        }
        let id = TileTypeId(self.types.len() as u16);
        self.by_name.insert(tile_type.name.clone(), id);
        self.types.push(tile_type);
        Ok(id)
    }

    pub fn id_by_name(&self, name: &str) -> Option<TileTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize { self.types.len() }
    pub fn is_empty(&self) -> bool { self.types.is_empty() }

    pub fn subtype(&self, tile: &Tile) -> Subtype { self[tile.type_id].subtype }

    /// Right edge (exclusive), saturating at the world edge.
    pub fn right(&self, tile: &Tile) -> u16 {
        tile.x.saturating_add(self[tile.type_id].width)
    }

    /// Bottom edge (exclusive), saturating at the world edge.
    pub fn bottom(&self, tile: &Tile) -> u16 {
        tile.y.saturating_add(self[tile.type_id].height)
    }

    pub fn center_x(&self, tile: &Tile) -> u16 {
        tile.x.saturating_add(self[tile.type_id].width / 2)
    }

    pub fn rect(&self, tile: &Tile) -> Rect {
        let t = &self[tile.type_id];
        Rect::from_size(tile.x, tile.y, t.width, t.height)
    }

    /// Place a tile of the named type, for level loading.
    pub fn place(&self, name: &str, x: u16, y: u16) -> Result<Tile, LoadError> {
        let id = self.id_by_name(name)
            .ok_or_else(|| LoadError::UnknownTileType(name.to_string()))?;
        Ok(Tile::new(id, x, y))
    }
}

/// Ids are only minted by `register`, so indexing with one of this
/// registry's ids cannot go out of bounds. Mixing registries can.
impl Index<TileTypeId> for TileRegistry {
    type Output = TileType;

    fn index(&self, id: TileTypeId) -> &TileType {
        &self.types[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (TileRegistry, TileTypeId, TileTypeId) {
        let mut reg = TileRegistry::new();
        let ground = reg.register(TileType::new("ground", 32, 16, Subtype::Block)).unwrap();
        let step = reg.register(TileType::new("step", 22, 5, Subtype::ThinStep)).unwrap();
        (reg, ground, step)
    }

    #[test]
    fn ids_are_sequential() {
        let (reg, ground, step) = registry();
        assert_eq!(ground.raw(), 0);
        assert_eq!(step.raw(), 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_name_rejected() {
        let (mut reg, _, _) = registry();
        let err = reg.register(TileType::new("ground", 1, 1, Subtype::Block)).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateTileType(name) if name == "ground"));
    }

    #[test]
    fn derived_edges() {
        let (reg, ground, _) = registry();
        let t = Tile::new(ground, 100, 100);
        assert_eq!(reg.right(&t), 132);
        assert_eq!(reg.bottom(&t), 116);
        assert_eq!(reg.center_x(&t), 116);
        assert_eq!(reg.rect(&t), Rect::new(100, 100, 132, 116));
    }

    #[test]
    fn place_by_name() {
        let (reg, _, step) = registry();
        assert_eq!(reg.place("step", 5, 6).unwrap(), Tile::new(step, 5, 6));
        assert!(matches!(reg.place("lava", 0, 0), Err(LoadError::UnknownTileType(_))));
    }

    #[test]
    fn tile_equality_includes_type() {
        let (_, ground, step) = registry();
        let a = Tile::new(ground, 10, 10);
        assert_ne!(a, a.with_type(step));
        assert_eq!(a, Tile::new(ground, 10, 10));
    }

    #[test]
    fn only_decor_is_not_collidable() {
        assert!(!Subtype::None.is_collidable());
        assert!(Subtype::Block.is_collidable());
        assert!(Subtype::ThinStepOnLeft.is_collidable());
        assert!(Subtype::PlantSpikyB.is_collidable());
    }
}

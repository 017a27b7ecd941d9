/// Level container and level file loader.
///
/// ## Layers
///   - `blocks`:        collision tiles, in a `SpatialIndex`
///   - `behind`/`front`: decorations drawn around the actor, no physics
///   - `parallax`:      background tiles, no physics
///
/// Decoration layers are plain vectors kept sorted by `x`.
///
/// ## Sources (priority order):
///   1. Explicit path given by the caller
///   2. `levels/` directory (first `.toml` file by name)
///   3. Built-in embedded level
///
/// ## Level format (`.toml`):
///   ```toml
///   name = "Stairs"
///   origin = [32767, 32767]         # optional; offsets below are relative
///   spawn = { x = 40, floor_y = 0 }  # actor center x, floor under its feet
///
///   [[tile_types]]
///   name = "ground"
///   width = 200
///   height = 16
///   subtype = "block"
///
///   [[blocks]]
///   tile = "ground"
///   x = 0
///   y = 0
///
///   [[decor]]
///   tile = "lamp"
///   x = 10
///   y = -30
///   layer = "front"                 # behind | front | parallax
///
///   [[script]]                      # optional input replay
///   ticks = 30
///   move = "right"                  # left | right
///   jump = true
///   down = false
///   ```

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;

use crate::domain::entity::Facing;
use crate::domain::physics::TileSource;
use crate::domain::rect::Rect;
use crate::domain::tile::{Subtype, Tile, TileRegistry, TileType, TileTypeId};
use crate::error::LoadError;
use super::index::SpatialIndex;

/// World center. Levels are built around it so offsets can go negative.
pub const ORIGIN: (u16, u16) = (32767, 32767);

/// Vertical margin below the lowest tile before the actor counts as lost.
pub const FALL_OUT_MARGIN: u16 = 64;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DecorLayer {
    Behind,
    Front,
    Parallax,
}

/// Sorted-by-x tile list for layers without physics.
#[derive(Clone, Debug, Default)]
struct SortedLayer {
    tiles: Vec<Tile>,
}

impl SortedLayer {
    fn insert(&mut self, tile: Tile) {
        let at = self.tiles.partition_point(|t| t.x <= tile.x);
        self.tiles.insert(at, tile);
    }

    fn remove(&mut self, tile: &Tile) -> bool {
        match self.tiles.iter().position(|t| t == tile) {
            Some(i) => {
                self.tiles.remove(i);
                true
            }
            None => false,
        }
    }
}

pub struct Level {
    pub name: String,
    registry: Rc<TileRegistry>,
    limits: Rect,
    blocks: SpatialIndex,
    behind: SortedLayer,
    front: SortedLayer,
    parallax: SortedLayer,
}

// ══════════════════════════════════════════════════════════════
// Level container
// ══════════════════════════════════════════════════════════════

impl Level {
    pub fn new(name: impl Into<String>, registry: Rc<TileRegistry>) -> Self {
        Level {
            name: name.into(),
            blocks: SpatialIndex::new(Rc::clone(&registry)),
            registry,
            limits: Rect::default(),
            behind: SortedLayer::default(),
            front: SortedLayer::default(),
            parallax: SortedLayer::default(),
        }
    }

    pub fn registry(&self) -> &TileRegistry { &self.registry }

    pub fn blocks(&self) -> &SpatialIndex { &self.blocks }

    pub fn limits(&self) -> Rect { self.limits }
    pub fn set_limits(&mut self, limits: Rect) { self.limits = limits; }

    /// Add a collision tile. Decorative subtypes belong in a decor layer.
    pub fn add_block(&mut self, tile: Tile) -> Result<(), LoadError> {
        if !self.registry.subtype(&tile).is_collidable() {
            return Err(LoadError::DecorInCollisionLayer(self.registry[tile.type_id].name.clone()));
        }
        self.blocks.insert(tile);
        Ok(())
    }

    pub fn add_decor(&mut self, layer: DecorLayer, tile: Tile) {
        self.layer_mut(layer).insert(tile);
    }

    /// Swap a collision tile for another type at the same position
    /// (doors, breakable floors). Returns false if `old` is not present.
    pub fn replace_block(&mut self, old: &Tile, new_type: TileTypeId) -> bool {
        if !self.blocks.remove(old) { return false; }
        self.blocks.insert(old.with_type(new_type));
        log::debug!("block at ({}, {}) replaced", old.x, old.y);
        true
    }

    /// Replace the `target` behind-decoration nearest to `(x, y)` (Manhattan
    /// distance) with `new_type`. Returns the replaced tile, if any.
    pub fn replace_nearest_behind_decor(
        &mut self,
        x: u16,
        y: u16,
        target: TileTypeId,
        new_type: TileTypeId,
    ) -> Option<Tile> {
        let dist = |t: &Tile| (x as i32 - t.x as i32).abs() + (y as i32 - t.y as i32).abs();
        let nearest = self.behind.tiles.iter()
            .filter(|t| t.type_id == target)
            .min_by_key(|t| dist(*t))
            .copied()?;
        self.behind.remove(&nearest);
        self.behind.insert(nearest.with_type(new_type));
        Some(nearest)
    }

    /// Visit decorations with `right > min_x` and `x < max_x_exclusive`.
    pub fn for_each_decor_in_x_range<F>(&self, layer: DecorLayer, min_x: u16, max_x_exclusive: u16, mut visit: F)
    where
        F: FnMut(Tile) -> ControlFlow<()>,
    {
        let tiles = &self.layer(layer).tiles;
        let end = tiles.partition_point(|t| t.x < max_x_exclusive);
        for t in &tiles[..end] {
            if self.registry.right(t) <= min_x { continue; }
            if visit(*t).is_break() { return; }
        }
    }

    pub fn decor_count(&self, layer: DecorLayer) -> usize {
        self.layer(layer).tiles.len()
    }

    /// Bounding box of every tile on every layer; empty when the level is.
    pub fn compute_area(&self) -> Rect {
        let mut area: Option<Rect> = None;
        let mut grow = |t: Tile| {
            let r = self.registry.rect(&t);
            area = Some(match area {
                Some(a) => a.union(&r),
                None => r,
            });
            ControlFlow::Continue(())
        };
        for layer in [&self.parallax, &self.behind, &self.front] {
            for t in &layer.tiles {
                let _ = grow(*t);
            }
        }
        self.blocks.for_each(&mut grow);
        area.unwrap_or_default()
    }

    /// Rebalance the collision index after bulk loading.
    pub fn stabilize(&mut self) {
        self.blocks.rebuild_balanced();
    }

    /// Is `y` (frame top) below the level's fall-out line?
    pub fn is_below_world(&self, y: f64) -> bool {
        if self.limits.is_empty() { return false; }
        y > self.limits.max_y as f64 + FALL_OUT_MARGIN as f64
    }

    fn layer(&self, layer: DecorLayer) -> &SortedLayer {
        match layer {
            DecorLayer::Behind => &self.behind,
            DecorLayer::Front => &self.front,
            DecorLayer::Parallax => &self.parallax,
        }
    }

    fn layer_mut(&mut self, layer: DecorLayer) -> &mut SortedLayer {
        match layer {
            DecorLayer::Behind => &mut self.behind,
            DecorLayer::Front => &mut self.front,
            DecorLayer::Parallax => &mut self.parallax,
        }
    }
}

impl TileSource for Level {
    fn registry(&self) -> &TileRegistry { &self.registry }

    fn for_each_tile_in_range(&self, min_x: u16, max_x: u16, visit: &mut dyn FnMut(Tile) -> ControlFlow<()>) {
        self.blocks.for_each_in_x_range(min_x, max_x.saturating_add(1), visit);
    }
}

// ══════════════════════════════════════════════════════════════
// Level files
// ══════════════════════════════════════════════════════════════

#[derive(Deserialize, Debug)]
pub struct LevelDef {
    #[serde(default = "default_level_name")]
    pub name: String,
    #[serde(default = "default_origin")]
    pub origin: [u16; 2],
    #[serde(default)]
    pub spawn: SpawnDef,
    #[serde(default)]
    pub tile_types: Vec<TileTypeDef>,
    #[serde(default)]
    pub blocks: Vec<PlacementDef>,
    #[serde(default)]
    pub decor: Vec<DecorDef>,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct SpawnDef {
    pub x: i32,
    pub floor_y: i32,
}

#[derive(Deserialize, Debug)]
pub struct TileTypeDef {
    pub name: String,
    pub width: u16,
    pub height: u16,
    pub subtype: Subtype,
}

#[derive(Deserialize, Debug)]
pub struct PlacementDef {
    pub tile: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LayerDef {
    Behind,
    Front,
    Parallax,
}

#[derive(Deserialize, Debug)]
pub struct DecorDef {
    pub tile: String,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_layer")]
    pub layer: LayerDef,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveDef {
    Left,
    Right,
}

/// One segment of a replayed input script.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStep {
    pub ticks: u32,
    #[serde(default, rename = "move")]
    pub movement: Option<MoveDef>,
    #[serde(default)]
    pub jump: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub plants_reversed: bool,
}

impl ScriptStep {
    pub fn facing(&self) -> Option<Facing> {
        self.movement.map(|m| match m {
            MoveDef::Left => Facing::Left,
            MoveDef::Right => Facing::Right,
        })
    }
}

fn default_level_name() -> String { "Untitled".into() }
fn default_origin() -> [u16; 2] { [ORIGIN.0, ORIGIN.1] }
fn default_layer() -> LayerDef { LayerDef::Behind }

/// A level ready to simulate.
pub struct LoadedLevel {
    pub level: Level,
    /// Actor spawn: frame center x and floor y, in world pixels.
    pub spawn: (u16, u16),
    pub script: Vec<ScriptStep>,
}

pub fn parse_level(text: &str) -> Result<LevelDef, LoadError> {
    Ok(toml::from_str::<LevelDef>(text)?)
}

/// Build registry and level from a parsed definition.
pub fn build_level(def: LevelDef) -> Result<LoadedLevel, LoadError> {
    let mut registry = TileRegistry::new();
    for t in &def.tile_types {
        registry.register(TileType::new(t.name.clone(), t.width, t.height, t.subtype))?;
    }
    let registry = Rc::new(registry);
    let origin = (def.origin[0], def.origin[1]);

    let mut level = Level::new(def.name.clone(), Rc::clone(&registry));
    for b in &def.blocks {
        let (x, y) = place(origin, &b.tile, b.x, b.y)?;
        level.add_block(registry.place(&b.tile, x, y)?)?;
    }
    for d in &def.decor {
        let (x, y) = place(origin, &d.tile, d.x, d.y)?;
        let layer = match d.layer {
            LayerDef::Behind => DecorLayer::Behind,
            LayerDef::Front => DecorLayer::Front,
            LayerDef::Parallax => DecorLayer::Parallax,
        };
        level.add_decor(layer, registry.place(&d.tile, x, y)?);
    }
    level.stabilize();
    let area = level.compute_area();
    level.set_limits(area);

    let spawn = place(origin, "spawn", def.spawn.x, def.spawn.floor_y)?;

    log::info!(
        "level '{}': {} tile types, {} blocks (height {}), {} decorations, area {}x{}",
        level.name,
        registry.len(),
        level.blocks().len(),
        level.blocks().height(),
        level.decor_count(DecorLayer::Behind) + level.decor_count(DecorLayer::Front)
            + level.decor_count(DecorLayer::Parallax),
        area.width(),
        area.height(),
    );

    Ok(LoadedLevel { level, spawn, script: def.script })
}

fn place(origin: (u16, u16), name: &str, dx: i32, dy: i32) -> Result<(u16, u16), LoadError> {
    let x = origin.0 as i32 + dx;
    let y = origin.1 as i32 + dy;
    match (u16::try_from(x), u16::try_from(y)) {
        (Ok(x), Ok(y)) => Ok((x, y)),
        _ => Err(LoadError::OutOfWorld { name: name.to_string(), x: dx, y: dy }),
    }
}

/// Read and build a level file.
pub fn load_level_file(path: &Path) -> Result<LoadedLevel, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    build_level(parse_level(&text)?)
}

/// Load `path` if given, else the first level in `levels_dir`, else the
/// embedded level.
pub fn load_level(path: Option<&Path>, levels_dir: &Path) -> Result<LoadedLevel, LoadError> {
    if let Some(p) = path {
        return load_level_file(p);
    }
    if let Some(p) = first_level_in(levels_dir) {
        match load_level_file(&p) {
            Ok(level) => return Ok(level),
            Err(e) => log::warn!("skipping {}: {e}", p.display()),
        }
    }
    log::info!("using embedded level");
    build_level(parse_level(EMBEDDED_LEVEL)?)
}

fn first_level_in(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |e| e == "toml"))
        .collect();
    files.sort();
    files.into_iter().next()
}

// ══════════════════════════════════════════════════════════════
// Embedded level
// ══════════════════════════════════════════════════════════════

/// Floor, two stair steps up to a landing, a wall on the left, spikes
/// past the end of the floor.
pub const EMBEDDED_LEVEL: &str = r#"
name = "Proving Ground"
spawn = { x = 40, floor_y = 0 }

[[tile_types]]
name = "floor"
width = 256
height = 16
subtype = "block"

[[tile_types]]
name = "stair"
width = 22
height = 5
subtype = "thin_step"

[[tile_types]]
name = "landing"
width = 96
height = 5
subtype = "thin_step_on_left"

[[tile_types]]
name = "wall"
width = 16
height = 160
subtype = "block"

[[tile_types]]
name = "spikes"
width = 48
height = 8
subtype = "spikes"

[[tile_types]]
name = "lamp"
width = 8
height = 24
subtype = "none"

[[blocks]]
tile = "floor"
x = 0
y = 0

[[blocks]]
tile = "stair"
x = 120
y = -7

[[blocks]]
tile = "stair"
x = 141
y = -14

[[blocks]]
tile = "landing"
x = 162
y = -21

[[blocks]]
tile = "wall"
x = -16
y = -144

[[blocks]]
tile = "spikes"
x = 300
y = 0

[[decor]]
tile = "lamp"
x = 60
y = -24
layer = "behind"

[[script]]
ticks = 20

[[script]]
ticks = 90
move = "right"

[[script]]
ticks = 40
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_level() -> (Level, TileTypeId, TileTypeId, TileTypeId) {
        let mut reg = TileRegistry::new();
        let ground = reg.register(TileType::new("ground", 32, 16, Subtype::Block)).unwrap();
        let door = reg.register(TileType::new("door", 16, 48, Subtype::Block)).unwrap();
        let lamp = reg.register(TileType::new("lamp", 8, 24, Subtype::None)).unwrap();
        let level = Level::new("test", Rc::new(reg));
        (level, ground, door, lamp)
    }

    // ── Container ──

    #[test]
    fn decorative_tiles_rejected_from_blocks() {
        let (mut level, _, _, lamp) = simple_level();
        let err = level.add_block(Tile::new(lamp, 0, 0)).unwrap_err();
        assert!(matches!(err, LoadError::DecorInCollisionLayer(name) if name == "lamp"));
    }

    #[test]
    fn range_query_is_inclusive_of_max() {
        let (mut level, ground, _, _) = simple_level();
        level.add_block(Tile::new(ground, 100, 100)).unwrap();
        let mut n = 0;
        level.for_each_tile_in_range(50, 100, &mut |_| {
            n += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(n, 1);
    }

    #[test]
    fn replace_block_swaps_type_in_place() {
        let (mut level, ground, door, _) = simple_level();
        let t = Tile::new(door, 200, 52);
        level.add_block(t).unwrap();
        assert!(level.replace_block(&t, ground));
        assert!(level.blocks().contains(&Tile::new(ground, 200, 52)));
        assert!(!level.replace_block(&t, ground));
        assert_eq!(level.blocks().len(), 1);
    }

    #[test]
    fn nearest_decor_is_replaced() {
        let (mut level, ground, _, lamp) = simple_level();
        level.add_decor(DecorLayer::Behind, Tile::new(lamp, 10, 10));
        level.add_decor(DecorLayer::Behind, Tile::new(lamp, 100, 10));
        let replaced = level.replace_nearest_behind_decor(90, 0, lamp, ground);
        assert_eq!(replaced, Some(Tile::new(lamp, 100, 10)));
        let mut seen = vec![];
        level.for_each_decor_in_x_range(DecorLayer::Behind, 0, 1000, |t| {
            seen.push(t);
            ControlFlow::Continue(())
        });
        assert_eq!(seen, vec![Tile::new(lamp, 10, 10), Tile::new(ground, 100, 10)]);
        assert_eq!(level.replace_nearest_behind_decor(0, 0, ground, ground).map(|t| t.x), Some(100));
    }

    #[test]
    fn area_spans_all_layers() {
        let (mut level, ground, _, lamp) = simple_level();
        assert!(level.compute_area().is_empty());
        level.add_block(Tile::new(ground, 100, 100)).unwrap();
        level.add_decor(DecorLayer::Parallax, Tile::new(lamp, 50, 200));
        assert_eq!(level.compute_area(), Rect::new(50, 100, 132, 224));
    }

    #[test]
    fn decor_range_skips_tiles_ending_before_min() {
        let (mut level, _, _, lamp) = simple_level();
        level.add_decor(DecorLayer::Front, Tile::new(lamp, 0, 0));
        level.add_decor(DecorLayer::Front, Tile::new(lamp, 20, 0));
        level.add_decor(DecorLayer::Front, Tile::new(lamp, 40, 0));
        let mut xs = vec![];
        level.for_each_decor_in_x_range(DecorLayer::Front, 8, 40, |t| {
            xs.push(t.x);
            ControlFlow::Continue(())
        });
        assert_eq!(xs, vec![20]);
    }

    // ── Files ──

    #[test]
    fn embedded_level_builds() {
        let loaded = build_level(parse_level(EMBEDDED_LEVEL).unwrap()).unwrap();
        assert_eq!(loaded.level.name, "Proving Ground");
        assert_eq!(loaded.level.blocks().len(), 6);
        assert_eq!(loaded.level.decor_count(DecorLayer::Behind), 1);
        assert_eq!(loaded.spawn, (32767 + 40, 32767));
        assert_eq!(loaded.script.len(), 3);
        assert_eq!(loaded.script[1].facing(), Some(Facing::Right));
        loaded.level.blocks().validate().unwrap();
    }

    #[test]
    fn unknown_tile_name_fails() {
        let text = r#"
            [[blocks]]
            tile = "nope"
            x = 0
            y = 0
        "#;
        let err = build_level(parse_level(text).unwrap()).err().unwrap();
        assert!(matches!(err, LoadError::UnknownTileType(name) if name == "nope"));
    }

    #[test]
    fn offsets_outside_world_fail() {
        let text = r#"
            origin = [10, 10]
            [[tile_types]]
            name = "a"
            width = 4
            height = 4
            subtype = "block"
            [[blocks]]
            tile = "a"
            x = -20
            y = 0
        "#;
        let err = build_level(parse_level(text).unwrap()).err().unwrap();
        assert!(matches!(err, LoadError::OutOfWorld { x: -20, .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_level_file(Path::new("/nonexistent/level.toml")).err().unwrap();
        assert!(matches!(err, LoadError::Io { ref path, .. } if path.contains("nonexistent")));
    }

    #[test]
    fn falls_back_to_embedded_level() {
        let loaded = load_level(None, Path::new("/nonexistent-levels-dir")).unwrap();
        assert_eq!(loaded.level.name, "Proving Ground");
    }
}

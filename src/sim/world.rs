/// WorldState: everything one running simulation needs.
///
/// The level owns the tile registry (shared with its index) and every
/// tile layer. The actor is the single moving entity. `tick` counts
/// calls to `step` since the last (re)start.

use crate::config::MovementConfig;
use crate::domain::entity::Actor;
use crate::domain::tile::TileRegistry;
use super::level::{Level, LoadedLevel, ScriptStep};

pub struct WorldState {
    pub level: Level,
    pub actor: Actor,
    pub movement: MovementConfig,
    /// Frame center x and floor y the actor (re)spawns on.
    pub spawn: (u16, u16),
    pub tick: u64,
}

impl WorldState {
    pub fn new(level: Level, spawn: (u16, u16), movement: MovementConfig) -> Self {
        WorldState {
            level,
            actor: Actor::standing_at(spawn.0, spawn.1),
            movement,
            spawn,
            tick: 0,
        }
    }

    /// Split a loaded level into a world and its input script.
    pub fn from_loaded(loaded: LoadedLevel, movement: MovementConfig) -> (Self, Vec<ScriptStep>) {
        let LoadedLevel { level, spawn, script } = loaded;
        (WorldState::new(level, spawn, movement), script)
    }

    pub fn registry(&self) -> &TileRegistry { self.level.registry() }

    /// Respawn the actor. Level edits (replaced blocks) are kept.
    pub fn restart(&mut self) {
        log::info!("restart '{}' after {} ticks", self.level.name, self.tick);
        self.actor = Actor::standing_at(self.spawn.0, self.spawn.1);
        self.tick = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::MotionState;
    use crate::sim::level::{build_level, parse_level, EMBEDDED_LEVEL};

    fn embedded_world() -> (WorldState, Vec<ScriptStep>) {
        let loaded = build_level(parse_level(EMBEDDED_LEVEL).unwrap()).unwrap();
        WorldState::from_loaded(loaded, MovementConfig::default())
    }

    #[test]
    fn actor_spawns_standing_on_spawn_point() {
        let (world, script) = embedded_world();
        let (cx, floor) = world.spawn;
        assert_eq!(world.actor.x, cx as f64 - 8.0);
        assert_eq!(world.actor.y, floor as f64 - 48.0);
        assert_eq!(world.actor.state, MotionState::Idle);
        assert!(!script.is_empty());
        assert_eq!(world.registry().len(), 6);
    }

    #[test]
    fn restart_resets_actor_and_tick() {
        let (mut world, _) = embedded_world();
        world.actor.x += 50.0;
        world.actor.ticks_dead = 3;
        world.tick = 99;
        world.restart();
        assert!(!world.actor.is_dead());
        assert_eq!(world.actor.x, world.spawn.0 as f64 - 8.0);
        assert_eq!(world.tick, 0);
    }
}

/// Events emitted during a simulation step.
/// Presentation layers (sound, animation, camera) consume these.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeathCause {
    Hazard,
    OffWorld,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum GameEvent {
    Jumped { x: f64, y: f64 },
    WingJumped { x: f64, y: f64 },
    Landed { x: f64, y: f64 },
    Slipped { x: f64, y: f64 },
    Stepped { up: bool },
    WallStuck { facing_left: bool },
    WallReleased,
    HeadBump,
    Died { cause: DeathCause },
}

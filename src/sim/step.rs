/// The step function: advances the world by one tick.
///
/// Processing order:
///   1. Death counter (dead actors only age)
///   2. Misc. counters, wall-stick away-jump bookkeeping
///   3. Pending stair smoothing (consumes the whole tick)
///   4. Horizontal input → target x
///   5. Jump (buffered, lenient, wing jump, wall jump)
///   6. Letting go of a wall
///   7. Gravity / jump rise → target y
///   8. Collision resolution toward the target
///   9. Off-world check
///
/// Steps 4–7 only compute the target position and the motion state; the
/// resolver owns the actual movement and every contact side effect.

use crate::config::MovementConfig;
use crate::domain::entity::{Actor, Facing, MotionState, TickInput};
use crate::domain::physics::{self, MotionSignal, ResolveInput};
use crate::error::InternalError;
use super::event::{DeathCause, GameEvent};
use super::world::WorldState;

/// Peak vertical speed of the jump and fall curves, in px/tick.
const PEAK_AIR_SPEED: f64 = 3.9;
/// Rise speed is reduced by this much on the first jump tick...
const RAISE_REDUCTION: f64 = 1.2;
/// ...fading out linearly over this many ticks.
const RAISE_REDUCTION_TICKS: u32 = 6;
const RAISE_EXPONENT: f64 = 1.02;
const FALL_EXPONENT: f64 = 1.22;
/// Fall speed stops growing after this many jump lengths.
const FALL_CAP_JUMPS: f64 = 1.5;
/// Released jumps keep rising this many more ticks.
const RELEASE_RISE_TICKS: u32 = 2;

/// `since_jump_trigger` after a jump, so the buffer can't fire it again.
const TRIGGER_CONSUMED: u32 = u32::MAX / 2;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, input: TickInput) -> Result<Vec<GameEvent>, InternalError> {
    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;

    let actor = &mut world.actor;
    let m = &world.movement;

    // death doesn't become undone
    if actor.is_dead() {
        actor.ticks_dead = actor.ticks_dead.saturating_add(1);
        return Ok(events);
    }

    actor.state_ticks = actor.state_ticks.saturating_add(1);
    actor.since_jump_trigger = actor.since_jump_trigger.saturating_add(1);
    actor.since_no_contact_fall = actor.since_no_contact_fall.saturating_add(1);
    update_away_jump(actor);

    if let Some((dx, dy)) = actor.smoothing.advance() {
        actor.x += dx;
        actor.y += dy;
        if input.jump_triggered { actor.since_jump_trigger = 0; }
        return Ok(events);
    }

    let mut new_x = actor.x;
    let mut new_y = actor.y;

    resolve_horizontal(actor, m, input, &mut new_x);
    if let Some(ev) = resolve_jump(actor, m, input) { events.push(ev); }

    if actor.state == MotionState::WallStick && input.down_triggered {
        release_wall(actor, &mut new_x);
        events.push(GameEvent::WallReleased);
    }

    if resolve_gravity(actor, m, input, &mut new_x, &mut new_y) {
        events.push(GameEvent::WallReleased);
    }

    let resolve_input = ResolveInput {
        down_pressed: input.down_held,
        plants_reversed: input.plants_reversed,
    };
    let res = physics::resolve(&world.level, &mut world.actor, new_x, new_y, resolve_input)?;
    if let Some(ev) = signal_event(res.signal, &world.actor) { events.push(ev); }

    if !world.actor.is_dead() && world.level.is_below_world(world.actor.y) {
        log::debug!("actor left the world at ({:.1}, {:.1})", world.actor.x, world.actor.y);
        world.actor.ticks_dead = 1;
        events.push(GameEvent::Died { cause: DeathCause::OffWorld });
    }

    Ok(events)
}

fn signal_event(signal: MotionSignal, actor: &Actor) -> Option<GameEvent> {
    let (x, y) = (actor.x, actor.y);
    match signal {
        MotionSignal::Continue => None,
        MotionSignal::Landed => Some(GameEvent::Landed { x, y }),
        MotionSignal::Slipped => Some(GameEvent::Slipped { x, y }),
        MotionSignal::HeadBump => Some(GameEvent::HeadBump),
        MotionSignal::WallStuck => Some(GameEvent::WallStuck {
            facing_left: actor.facing == Facing::Left,
        }),
        MotionSignal::Stepped { up } => Some(GameEvent::Stepped { up }),
        MotionSignal::Died => Some(GameEvent::Died { cause: DeathCause::Hazard }),
    }
}

// ══════════════════════════════════════════════════════════════
// Horizontal movement
// ══════════════════════════════════════════════════════════════

fn resolve_horizontal(actor: &mut Actor, m: &MovementConfig, input: TickInput, new_x: &mut f64) {
    let dir = match input.horizontal {
        Some(d) => d,
        None => {
            if actor.state.can_stop_ground_move() { actor.set_state(MotionState::Idle); }
            return;
        }
    };
    if !allows_horizontal(actor) { return; }

    if actor.state == MotionState::Idle { actor.set_state(MotionState::Moving); }
    *new_x += dir.sign() * horizontal_speed(actor, m);
    actor.facing = dir;
}

fn allows_horizontal(actor: &Actor) -> bool {
    if actor.wall_stick_away_left > 0 { return false; }
    matches!(
        actor.state,
        MotionState::Falling | MotionState::Idle | MotionState::Moving
            | MotionState::WingJump | MotionState::Jumping
    )
}

fn horizontal_speed(actor: &Actor, m: &MovementConfig) -> f64 {
    match actor.state {
        MotionState::Moving if !actor.skip_run_intro && actor.state_ticks < m.run_intro_ticks => {
            m.run_intro_speed
        }
        MotionState::Jumping => m.jump_speed,
        MotionState::WingJump => m.wing_jump_speed,
        _ => m.walk_speed,
    }
}

// ══════════════════════════════════════════════════════════════
// Jumping
// ══════════════════════════════════════════════════════════════

fn resolve_jump(actor: &mut Actor, m: &MovementConfig, input: TickInput) -> Option<GameEvent> {
    let mut jumping = input.jump_triggered;
    if !jumping && actor.since_jump_trigger < m.jump_buffer_ticks {
        jumping = true;
    } else if jumping {
        actor.since_jump_trigger = 0;
    }
    if !jumping || !allows_jump(actor, m) { return None; }

    actor.since_jump_trigger = TRIGGER_CONSUMED;
    actor.spent_wall_stick = false;
    actor.wall_stick_away_left = 0;
    actor.jump_ticks_goal = m.jump_ticks;

    // a late press after walking off an edge is still a ground jump
    if actor.state == MotionState::Falling && lenient_jump(actor, m) {
        actor.state = MotionState::Moving;
    }

    let (x, y) = (actor.x, actor.y);
    match actor.state {
        MotionState::Jumping | MotionState::Falling => {
            actor.set_state(MotionState::WingJump);
            actor.jump_ticks_goal = m.wing_jump_ticks();
            actor.spent_wing_jump = true;
            log::debug!("wing jump at ({x:.1}, {y:.1})");
            Some(GameEvent::WingJumped { x, y })
        }
        MotionState::WallStick => {
            actor.set_state(MotionState::Jumping);
            actor.wall_stick_away_left = m.wall_stick_away_ticks;
            actor.facing = actor.facing.flip();
            Some(GameEvent::Jumped { x, y })
        }
        _ => {
            actor.set_state(MotionState::Jumping);
            Some(GameEvent::Jumped { x, y })
        }
    }
}

fn allows_jump(actor: &Actor, m: &MovementConfig) -> bool {
    match actor.state {
        MotionState::Idle | MotionState::Moving | MotionState::WallStick => true,
        MotionState::Falling | MotionState::Jumping => {
            lenient_jump(actor, m)
                || (!actor.spent_wing_jump && actor.since_no_contact_fall > m.wing_jump_cooldown_ticks)
        }
        _ => false,
    }
}

fn lenient_jump(actor: &Actor, m: &MovementConfig) -> bool {
    actor.since_no_contact_fall < m.lenient_jump_ticks
}

/// Vertical speed while rising. Releasing the jump button cuts a
/// full-length jump short.
fn raise_speed(actor: &mut Actor, m: &MovementConfig, jump_held: bool) -> f64 {
    if actor.state_ticks >= actor.jump_ticks_goal { return 0.0; }
    if !jump_held {
        let full = if actor.state == MotionState::WingJump { m.wing_jump_ticks() } else { m.jump_ticks };
        if actor.jump_ticks_goal == full {
            actor.jump_ticks_goal = actor.jump_ticks_goal.min(actor.state_ticks + RELEASE_RISE_TICKS);
        }
    }

    let ticks = actor.state_ticks;
    let t = 1.0 - ticks as f64 / actor.jump_ticks_goal as f64;
    let reduction = RAISE_REDUCTION
        - ticks.min(RAISE_REDUCTION_TICKS) as f64 * (RAISE_REDUCTION / RAISE_REDUCTION_TICKS as f64);
    (PEAK_AIR_SPEED - reduction) * t.powf(RAISE_EXPONENT)
}

fn fall_speed(actor: &Actor, m: &MovementConfig) -> f64 {
    let jump = m.jump_ticks as f64;
    let t = (actor.state_ticks as f64).min(jump * FALL_CAP_JUMPS) / jump;
    PEAK_AIR_SPEED * t.powf(FALL_EXPONENT)
}

// ══════════════════════════════════════════════════════════════
// Walls and gravity
// ══════════════════════════════════════════════════════════════

/// The away push after a wall jump only survives falling and jumping.
fn update_away_jump(actor: &mut Actor) {
    if actor.wall_stick_away_left == 0 { return; }
    if actor.state == MotionState::Falling {
        actor.wall_stick_away_left -= 1;
    } else if actor.state != MotionState::Jumping {
        actor.wall_stick_away_left = 0;
    }
}

/// Drop off the wall, one pixel away from it.
fn release_wall(actor: &mut Actor, new_x: &mut f64) {
    actor.set_state(MotionState::Falling);
    actor.x -= actor.facing.sign();
    *new_x = actor.x;
}

fn push_away(actor: &mut Actor, m: &MovementConfig, new_x: &mut f64) {
    if actor.wall_stick_away_left == 0 { return; }
    actor.wall_stick_away_left -= 1;
    *new_x += actor.facing.sign() * horizontal_speed(actor, m);
}

/// Apply gravity or jump rise to the target. Returns true when a wall
/// stick ran out and the actor dropped off.
fn resolve_gravity(
    actor: &mut Actor,
    m: &MovementConfig,
    input: TickInput,
    new_x: &mut f64,
    new_y: &mut f64,
) -> bool {
    match actor.state {
        MotionState::Falling => {
            *new_y += fall_speed(actor, m);
            push_away(actor, m, new_x);
        }
        MotionState::WallStick => {
            if actor.state_ticks < m.wall_stick_hold_ticks {
                // hold still
            } else if actor.state_ticks < m.wall_stick_slide_ticks {
                *new_y += m.wall_stick_slide_speed;
            } else {
                release_wall(actor, new_x);
                return true;
            }
        }
        MotionState::Jumping | MotionState::WingJump => {
            let speed = raise_speed(actor, m, input.jump_held);
            *new_y -= speed;
            if speed == 0.0 { actor.set_state(MotionState::Falling); }
            push_away(actor, m, new_x);
        }
        _ => {}
    }
    false
}

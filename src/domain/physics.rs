/// Motion resolver: pixel-stepped collision resolution.
///
/// ## Algorithm
///
/// Given the actor's current sub-pixel position and this tick's target:
///
///   1. Flags are rebuilt from the displacement signs and input bits.
///   2. Candidate tiles are fetched once, for the horizontal span covering
///      both the current and the target probe, plus one touching pixel and
///      the 2 px a stair step can shift the probe.
///   3. `reached` starts at the current pixel position. Each iteration
///      classifies every candidate at `reached` and applies the contact's
///      side effect. An axis is "limited" once it reaches its target or a
///      contact blocks it.
///   4. Until both axes are limited, each free axis advances one pixel
///      toward its target and the pass repeats.
///   5. The final position is committed with grid snapping on the axes
///      that did not move.
///
/// ## Contact side effects
///
///   Ground        → reset spent jumps, land if falling (stop y)
///   SlipIntoFall  → nudge 1 px off the edge (stop x), unless floaty
///   Tight*        → reset spent jumps, stand in tight pose (stop y)
///   WallStick     → cling (stop both), or degrade to SideBlock
///   Clonk         → head bump: start falling (stop y)
///   SideBlock     → stop x, drop inertia toward the wall
///   StepUp/Down   → shift 1-2 px horz and 3 px vert, smooth the rest
///   Death         → stop everything
///
/// Later contacts in the same pass may override earlier ones.

use std::ops::ControlFlow;

use super::contact::{contact_test, ContactType, Probe, PROBE_WIDTH, STEP_HEIGHT};
use super::entity::{
    Actor, Facing, MotionState, Pose, StepSmoothing, FRAME_WIDTH, PROBE_OFFSET_X, PROBE_OFFSET_Y,
};
use super::flags::ActorFlags;
use super::tile::{Tile, TileRegistry};
use crate::error::InternalError;

/// Falling longer than this turns a wall stick into a plain side block.
pub const WALL_STICK_MAX_FALL_TICKS: u32 = 30;

/// Part of a stair step's rise applied immediately; the rest is smoothed.
pub const STEP_IMMEDIATE_RISE: i32 = STEP_HEIGHT - 4;

/// Horizontal shift applied by a step up / step down contact.
const STEP_UP_SHIFT: i32 = 1;
const STEP_DOWN_SHIFT: i32 = 2;
const STEP_MAX_SHIFT: i32 = STEP_DOWN_SHIFT;

// ══════════════════════════════════════════════════════════════
// Collaborator interface
// ══════════════════════════════════════════════════════════════

/// Anything that can hand the resolver the collision tiles in a column span.
pub trait TileSource {
    fn registry(&self) -> &TileRegistry;

    /// Visit every collision tile with `right > min_x` and `x <= max_x`.
    fn for_each_tile_in_range(&self, min_x: u16, max_x: u16, visit: &mut dyn FnMut(Tile) -> ControlFlow<()>);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveInput {
    pub down_pressed: bool,
    pub plants_reversed: bool,
}

/// Summary of what happened during one resolution.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MotionSignal {
    Continue,
    Landed,
    Slipped,
    HeadBump,
    WallStuck,
    Stepped { up: bool },
    Died,
}

#[derive(Clone, Copy, Debug)]
pub struct Resolution {
    pub signal: MotionSignal,
    pub flags: ActorFlags,
    /// Classification passes run (one per visited pixel position).
    pub iterations: u32,
    /// Single-pixel advances made on either axis.
    pub advances: u32,
    pub x_limit_reached: bool,
    pub y_limit_reached: bool,
}

// ══════════════════════════════════════════════════════════════
// Entry point
// ══════════════════════════════════════════════════════════════

/// Move `actor` toward `(target_x, target_y)` against the tiles of `tiles`.
///
/// Mutates the actor's position, motion state and jump bookkeeping.
/// Classifier invariant violations are returned unchanged.
pub fn resolve<S: TileSource + ?Sized>(
    tiles: &S,
    actor: &mut Actor,
    target_x: f64,
    target_y: f64,
    input: ResolveInput,
) -> Result<Resolution, InternalError> {
    let flags = ActorFlags::from_motion(
        target_x - actor.x,
        target_y - actor.y,
        actor.facing,
        input.down_pressed,
        input.plants_reversed,
    );

    let candidates = collect_candidates(tiles, actor.x, target_x);
    let (px, py) = actor.pixel_pos();

    let mut pass = Pass {
        registry: tiles.registry(),
        actor,
        flags,
        reached_x: px,
        reached_y: py,
        new_x: target_x,
        new_y: target_y,
        x_limit: px == target_x as i32,
        y_limit: py == target_y as i32,
        report: Report::default(),
    };

    let mut iterations = 0u32;
    let mut advances = 0u32;
    loop {
        iterations += 1;
        let floor = pass.run(&candidates)?;
        if pass.report.died { break; }

        if pass.actor.state.can_slip_into_fall() && floor == ContactType::None {
            pass.actor.since_no_contact_fall = 1;
            pass.actor.set_state(MotionState::Falling);
            pass.report.lost_floor = true;
        }

        if pass.x_limit && pass.y_limit { break; }
        if !pass.x_limit {
            let goal = pass.new_x as i32;
            pass.reached_x = next_towards(pass.reached_x, goal);
            pass.x_limit = pass.reached_x == goal;
            advances += 1;
        }
        if !pass.y_limit {
            let goal = pass.new_y as i32;
            pass.reached_y = next_towards(pass.reached_y, goal);
            pass.y_limit = pass.reached_y == goal;
            advances += 1;
        }
    }

    pass.commit();

    let signal = pass.report.signal();
    if signal != MotionSignal::Continue {
        log::debug!(
            "resolve -> {:?} at ({:.2}, {:.2}), state {:?}",
            signal, pass.actor.x, pass.actor.y, pass.actor.state
        );
    }

    Ok(Resolution {
        signal,
        flags: pass.flags,
        iterations,
        advances,
        x_limit_reached: pass.x_limit,
        y_limit_reached: pass.y_limit,
    })
}

/// Column span that can matter for a move from `x` to `new_x`: the probe's
/// horizontal extent at both ends, widened by one pixel for touching tiles
/// and by the largest stair shift on either side.
pub fn query_range(x: f64, new_x: f64) -> (u16, u16) {
    let (a, b) = (x as i32, new_x as i32);
    let (lo, hi) = (a.min(b), a.max(b));
    let min = lo + PROBE_OFFSET_X - 1 - STEP_MAX_SHIFT;
    let max = hi + FRAME_WIDTH - 2 + STEP_MAX_SHIFT;
    (clamp_u16(min), clamp_u16(max))
}

fn collect_candidates<S: TileSource + ?Sized>(tiles: &S, x: f64, new_x: f64) -> Vec<Tile> {
    let (min, max) = query_range(x, new_x);
    let mut out = Vec::new();
    tiles.for_each_tile_in_range(min, max, &mut |t| {
        out.push(t);
        ControlFlow::Continue(())
    });
    out
}

fn clamp_u16(v: i32) -> u16 {
    v.clamp(0, u16::MAX as i32) as u16
}

fn next_towards(from: i32, to: i32) -> i32 {
    from + (to - from).signum()
}

// ══════════════════════════════════════════════════════════════
// Per-resolution state
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default)]
struct Report {
    landed: bool,
    slipped: bool,
    lost_floor: bool,
    head_bump: bool,
    wall_stuck: bool,
    stepped: Option<bool>,
    died: bool,
}

impl Report {
    fn signal(&self) -> MotionSignal {
        if self.died { return MotionSignal::Died; }
        if let Some(up) = self.stepped { return MotionSignal::Stepped { up }; }
        if self.wall_stuck { return MotionSignal::WallStuck; }
        if self.landed { return MotionSignal::Landed; }
        if self.head_bump { return MotionSignal::HeadBump; }
        if self.slipped || self.lost_floor { return MotionSignal::Slipped; }
        MotionSignal::Continue
    }
}

struct Pass<'a> {
    registry: &'a TileRegistry,
    actor: &'a mut Actor,
    flags: ActorFlags,
    reached_x: i32,
    reached_y: i32,
    new_x: f64,
    new_y: f64,
    x_limit: bool,
    y_limit: bool,
    report: Report,
}

impl Pass<'_> {
    fn probe(&self) -> Probe {
        Probe::new(self.reached_x + PROBE_OFFSET_X, self.reached_y + PROBE_OFFSET_Y)
    }

    /// One classification pass at the current `reached` position.
    /// Returns the floor contact seen (`None` if no footing).
    fn run(&mut self, candidates: &[Tile]) -> Result<ContactType, InternalError> {
        let mut floor = ContactType::None;
        for tile in candidates {
            // side effects can move `reached`, so the probe is rebuilt per tile
            let contact = contact_test(self.registry, self.probe(), tile, self.flags)?;
            if contact == ContactType::None { continue; }
            log::trace!(
                "contact {} with {} at ({}, {}), probe ({}, {})",
                contact, self.registry.subtype(tile), tile.x, tile.y,
                self.reached_x + PROBE_OFFSET_X, self.reached_y + PROBE_OFFSET_Y
            );
            if self.apply(contact, tile, &mut floor).is_break() { break; }
        }
        Ok(floor)
    }

    /// Wall sticks are once per airborne period and not after long falls.
    fn effective(&self, contact: ContactType) -> ContactType {
        if contact != ContactType::WallStick { return contact; }
        let fell_too_long = self.actor.state == MotionState::Falling
            && self.actor.state_ticks > WALL_STICK_MAX_FALL_TICKS;
        if self.actor.spent_wall_stick || fell_too_long {
            ContactType::SideBlock
        } else {
            contact
        }
    }

    fn apply(&mut self, contact: ContactType, tile: &Tile, floor: &mut ContactType) -> ControlFlow<()> {
        let floaty = self.actor.state.is_floaty();
        match self.effective(contact) {
            ContactType::None => {}
            ContactType::Ground => {
                self.actor.reset_spent();
                *floor = ContactType::Ground;
                if self.actor.state == MotionState::Falling {
                    if self.actor.x != self.new_x {
                        self.actor.set_state(MotionState::Moving);
                        self.actor.skip_run_intro = true;
                    } else {
                        self.actor.set_state(MotionState::Idle);
                    }
                    self.y_limit = true;
                    self.flags.remove(ActorFlags::INERTIA_DOWN);
                    self.report.landed = true;
                }
            }
            ContactType::SlipIntoFall => {
                if !floaty {
                    let shift = if self.falls_to_right(tile) { 1 } else { -1 };
                    self.reached_x += shift;
                    self.new_x += shift as f64;
                    self.x_limit = true;
                    // a falling actor brushing an edge is not a new slip
                    if self.actor.state != MotionState::Falling { self.report.slipped = true; }
                }
            }
            c @ (ContactType::TightFront1
            | ContactType::TightFront2
            | ContactType::TightBack1
            | ContactType::TightBack2) => {
                self.actor.reset_spent();
                *floor = c;
                if !floaty {
                    self.y_limit = true;
                    let pose = Pose::from_contact(c).unwrap_or_default();
                    if self.actor.pose != pose {
                        if self.actor.state == MotionState::Falling { self.report.landed = true; }
                        self.actor.set_state_with_pose(MotionState::Idle, pose);
                    }
                }
            }
            ContactType::WallStick => {
                self.actor.spent_wing_jump = false;
                self.actor.spent_wall_stick = true;
                self.actor.set_state(MotionState::WallStick);
                self.flags.remove(ActorFlags::ALL_INERTIA);
                self.x_limit = true;
                self.y_limit = true;
                self.report.wall_stuck = true;
            }
            ContactType::Clonk => {
                if self.actor.state != MotionState::Falling {
                    self.flags.remove(ActorFlags::INERTIA_UP);
                    self.y_limit = true;
                    self.actor.set_state(MotionState::Falling);
                    self.report.head_bump = true;
                }
            }
            ContactType::SideBlock => {
                self.x_limit = true;
                if (tile.x as i32) < self.reached_x {
                    self.flags.remove(ActorFlags::INERTIA_LEFT);
                } else {
                    self.flags.remove(ActorFlags::INERTIA_RIGHT);
                }
            }
            c @ (ContactType::StepUp | ContactType::StepDown) => {
                *floor = c;
                let up = c == ContactType::StepUp;

                // going down stairs from a partial pixel would double the speed
                if !up && self.actor.pixel_pos().0 != self.reached_x {
                    self.x_limit = true;
                    self.y_limit = true;
                    return ControlFlow::Break(());
                }

                let mut to_right = up;
                if self.falls_to_right(tile) { to_right = !to_right; }
                let shift = if up { STEP_UP_SHIFT } else { STEP_DOWN_SHIFT };
                let dx = if to_right { shift } else { -shift };
                let dy = if up { -STEP_IMMEDIATE_RISE } else { STEP_IMMEDIATE_RISE };

                self.actor.smoothing = StepSmoothing::start(to_right, up);
                self.reached_x += dx;
                self.new_x += dx as f64;
                self.reached_y += dy;
                self.new_y += dy as f64;

                if self.actor.state != MotionState::Moving {
                    self.actor.set_state(MotionState::Moving);
                    self.actor.skip_run_intro = true;
                }
                self.x_limit = true;
                self.y_limit = true;
                self.report.stepped = Some(up);
            }
            ContactType::Death => {
                self.actor.reset_spent();
                self.actor.ticks_dead = 1;
                self.x_limit = true;
                self.y_limit = true;
                self.report.died = true;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Probe center at or right of the tile center.
    fn falls_to_right(&self, tile: &Tile) -> bool {
        let probe_center = self.reached_x + PROBE_OFFSET_X + PROBE_WIDTH / 2;
        probe_center >= self.registry.center_x(tile) as i32
    }

    /// Write the resolved position back, snapping unmoved axes to the grid.
    fn commit(&mut self) {
        let actor = &mut *self.actor;
        if actor.x == self.new_x {
            actor.x = if actor.facing == Facing::Right { actor.x.ceil() } else { actor.x.floor() };
        } else if self.new_x as i32 == self.reached_x {
            actor.x = self.new_x;
        } else if self.reached_x != actor.x as i32 {
            actor.x = self.reached_x as f64;
        }

        if actor.y == self.new_y {
            actor.y = actor.y.floor();
        } else if self.new_y as i32 == self.reached_y {
            actor.y = self.new_y;
        } else if self.reached_y != actor.y as i32 {
            actor.y = self.reached_y as f64;
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

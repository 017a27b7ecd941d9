/// Contact classifier, truth-table driven.
///
/// Pure functions: (probe, tile, subtype, flags) → `ContactType`.
/// These decide "what kind of contact is this" without applying it;
/// the motion resolver owns every side effect.
///
/// The probe is the actor's 11×43 collision box, top-left at `(hx, hy)`.
/// The tile box is `(bx, by, bw, bh)`. All arithmetic is done in i32.
///
/// ## Solid block (`Block`, `DarkFloor`, safe part of `Spikes`)
/// ┌──────────────────────────────────────────┬──────────────────────────┐
/// │ Condition (priority order)                │ Contact                  │
/// ├──────────────────────────────────────────┼──────────────────────────┤
/// │ probe not touching horizontally           │ error (precondition)     │
/// │ hx == bx+bw, facing right                 │ None (back of platform)  │
/// │ hx == bx+bw, rows 17..39 inside tile      │ WallStick                │
/// │ hx == bx+bw                               │ SideBlock                │
/// │ hx+hw == bx  (mirror of the three above)  │ None / WallStick / Side  │
/// │ hy == by+bh                               │ Clonk                    │
/// │ hy+hh > by                                │ SlipIntoFall             │
/// │ bx <= hx <= bx+bw-hw                      │ Ground                   │
/// │ overhang 1..=2 / 3..=4 / >= 5             │ Tight*1 / Tight*2 / Slip │
/// └──────────────────────────────────────────┴──────────────────────────┘
///
/// ## Thin platform (`ThinBlock`)
/// ┌──────────────────────────────────────────┬──────────────────────────┐
/// │ actor moving up                           │ None (pass through)      │
/// │ hy+hh != by                               │ None                     │
/// │ bx <= hx <= bx+bw-hw                      │ Ground                   │
/// │ overhang 2..=3 / 4..=5 / >= 6             │ Tight*1 / Tight*2 / Slip │
/// │ otherwise                                 │ Ground                   │
/// └──────────────────────────────────────────┴──────────────────────────┘
///
/// ## Thin step (`ThinStep`, `ThinStepOnLeft`, `ThinStepOnRight`)
/// ┌──────────────────────────────────────────┬──────────────────────────┐
/// │ not rising, bottom <= by+4, probe         │ SlipIntoFall             │
/// │   overlaps less than 7 px on allowed side │                          │
/// │ bottom == by+7, down not pressed,         │ StepUp                   │
/// │   probe edge 4 px into the tile           │                          │
/// │ bottom == by, probe edge 4 px past tile   │ StepDown                 │
/// │ bottom == by (side variants: tight band   │ Ground / Tight* / Slip   │
/// │   on the non-step side)                   │                          │
/// │ otherwise                                 │ None                     │
/// └──────────────────────────────────────────┴──────────────────────────┘
///
/// "Front" vs "back" for tight spots: the overhang is on the side the
/// actor faces → Front, on the opposite side → Back.

use std::fmt;

use super::flags::ActorFlags;
use super::rect::Rect;
use super::tile::{Subtype, Tile, TileRegistry};
use crate::error::InternalError;

/// Collision probe size.
pub const PROBE_WIDTH: i32 = 11;
pub const PROBE_HEIGHT: i32 = 43;

/// Rows of the probe that must lie inside a wall for a wall stick.
pub const WALL_STICK_TOP: i32 = 17;
pub const WALL_STICK_BOTTOM: i32 = 39;

/// Step geometry: a step rises 7 px and is taken 4 px into its edge.
pub const STEP_HEIGHT: i32 = 7;
pub const STEP_EDGE_OFFSET: i32 = 4;
/// Steps slip the actor off when it stands on less than this many pixels.
pub const STEP_MIN_FOOTING: i32 = 7;
/// Only slip off step edges while the probe is at most this deep into the step.
pub const STEP_SLIP_DEPTH: i32 = 4;

/// Spikes leave this many pixels on each side harmless.
pub const SPIKE_CORNER: i32 = 3;

/// Overhang thresholds past the normal landing band.
#[derive(Clone, Copy, Debug)]
struct TightBand {
    tight1_from: i32,
    tight2_from: i32,
    slip_from: i32,
}

const BLOCK_BAND: TightBand = TightBand { tight1_from: 1, tight2_from: 3, slip_from: 5 };
const THIN_BAND: TightBand = TightBand { tight1_from: 2, tight2_from: 4, slip_from: 6 };

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ContactType {
    None,
    Ground,
    SlipIntoFall,
    TightFront1,
    TightFront2,
    TightBack1,
    TightBack2,
    WallStick,
    Clonk,
    SideBlock,
    StepUp,
    StepDown,
    Death,
}

impl ContactType {
    /// Contacts that count as footing for the "no floor → fall" check.
    pub fn is_floor(self) -> bool {
        matches!(
            self,
            ContactType::Ground
                | ContactType::TightFront1
                | ContactType::TightFront2
                | ContactType::TightBack1
                | ContactType::TightBack2
                | ContactType::StepUp
                | ContactType::StepDown
        )
    }
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Top-left corner of the collision probe, in world pixels.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Probe {
    pub x: i32,
    pub y: i32,
}

impl Probe {
    pub fn new(x: i32, y: i32) -> Self {
        Probe { x, y }
    }

    pub fn right(&self) -> i32 { self.x + PROBE_WIDTH }
    pub fn bottom(&self) -> i32 { self.y + PROBE_HEIGHT }
}

/// Tile box in i32 space.
#[derive(Clone, Copy, Debug)]
struct TileBox {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl TileBox {
    fn from_rect(r: &Rect) -> Self {
        TileBox {
            x: r.min_x as i32,
            y: r.min_y as i32,
            w: r.width() as i32,
            h: r.height() as i32,
        }
    }

    fn right(&self) -> i32 { self.x + self.w }
    fn bottom(&self) -> i32 { self.y + self.h }
    fn center_x(&self) -> i32 { self.x + self.w / 2 }
}

// ══════════════════════════════════════════════════════════════
// Public entry points
// ══════════════════════════════════════════════════════════════

/// Touch test + classification. Probes that neither touch nor overlap the
/// tile yield `ContactType::None` without consulting the subtype rules.
pub fn contact_test(
    registry: &TileRegistry,
    probe: Probe,
    tile: &Tile,
    flags: ActorFlags,
) -> Result<ContactType, InternalError> {
    let b = TileBox::from_rect(&registry.rect(tile));
    if b.right() < probe.x { return Ok(ContactType::None); }
    if b.bottom() < probe.y { return Ok(ContactType::None); }
    if probe.right() < b.x { return Ok(ContactType::None); }
    if probe.bottom() < b.y { return Ok(ContactType::None); }

    classify(registry, probe, tile, flags)
}

/// Classify a probe that is already known to touch or overlap `tile`.
pub fn classify(
    registry: &TileRegistry,
    probe: Probe,
    tile: &Tile,
    flags: ActorFlags,
) -> Result<ContactType, InternalError> {
    classify_rect(registry.subtype(tile), probe, &registry.rect(tile), flags)
}

/// Same as `classify`, for callers that carry the tile geometry themselves.
pub fn classify_rect(
    subtype: Subtype,
    probe: Probe,
    tile_rect: &Rect,
    flags: ActorFlags,
) -> Result<ContactType, InternalError> {
    let b = TileBox::from_rect(tile_rect);
    match subtype {
        Subtype::None => Ok(ContactType::None),
        Subtype::Block | Subtype::DarkFloor => solid_block(subtype, probe, b, flags),
        Subtype::ThinBlock => Ok(thin_block(probe, b, flags)),
        Subtype::ThinStep => Ok(thin_step(probe, b, flags, true, true)),
        Subtype::ThinStepOnLeft => Ok(thin_step(probe, b, flags, true, false)),
        Subtype::ThinStepOnRight => Ok(thin_step(probe, b, flags, false, true)),
        Subtype::Spikes => spikes(probe, b, flags),
        Subtype::PlantSpikyA => Ok(spiky_plant(probe, b, !flags.plants_reversed())),
        Subtype::PlantSpikyB => Ok(spiky_plant(probe, b, flags.plants_reversed())),
    }
}

// ══════════════════════════════════════════════════════════════
// Subtype rules
// ══════════════════════════════════════════════════════════════

fn solid_block(subtype: Subtype, p: Probe, b: TileBox, flags: ActorFlags) -> Result<ContactType, InternalError> {
    if p.x > b.right() || p.right() < b.x {
        return Err(InternalError::ProbeNotTouching {
            subtype,
            probe_x: p.x,
            probe_y: p.y,
            tile_x: b.x as u16,
            tile_y: b.y as u16,
        });
    }

    // side contacts (symmetrical)
    if p.x == b.right() {
        if flags.is_right_oriented() { return Ok(ContactType::None); }
        return Ok(side_contact(p, b));
    }
    if p.right() == b.x {
        if flags.is_left_oriented() { return Ok(ContactType::None); }
        return Ok(side_contact(p, b));
    }

    if p.y == b.bottom() { return Ok(ContactType::Clonk); }
    if p.bottom() > b.y { return Ok(ContactType::SlipIntoFall); }

    if in_landing_band(p, b) { return Ok(ContactType::Ground); }
    match tight_contact(p, b, flags, BLOCK_BAND) {
        Some(contact) => Ok(contact),
        None => Err(InternalError::Unclassified {
            subtype,
            probe_x: p.x,
            probe_y: p.y,
            tile_x: b.x as u16,
            tile_y: b.y as u16,
            width: b.w as u16,
            height: b.h as u16,
        }),
    }
}

fn side_contact(p: Probe, b: TileBox) -> ContactType {
    if p.y + WALL_STICK_TOP >= b.y && p.y + WALL_STICK_BOTTOM <= b.bottom() {
        ContactType::WallStick
    } else {
        ContactType::SideBlock
    }
}

fn thin_block(p: Probe, b: TileBox, flags: ActorFlags) -> ContactType {
    if flags.has_up_inertia() { return ContactType::None; }
    if p.bottom() != b.y { return ContactType::None; }
    if in_landing_band(p, b) { return ContactType::Ground; }
    tight_contact(p, b, flags, THIN_BAND).unwrap_or(ContactType::Ground)
}

/// `step_left` / `step_right`: which sides of the tile behave as stairs.
/// The other side gets thin-platform edge behavior.
fn thin_step(p: Probe, b: TileBox, flags: ActorFlags, step_left: bool, step_right: bool) -> ContactType {
    let both = step_left && step_right;

    // side slipping
    if !flags.has_up_inertia() && p.bottom() <= b.y + STEP_SLIP_DEPTH {
        if step_left && p.right() < b.x + STEP_MIN_FOOTING { return ContactType::SlipIntoFall; }
        if step_right && p.x + STEP_MIN_FOOTING > b.right() { return ContactType::SlipIntoFall; }
    }

    // step up: approaching the left edge moving right, or the right edge moving left
    if p.bottom() == b.y + STEP_HEIGHT && !flags.down_pressed() {
        if step_right && flags.has_left_inertia() && p.x + STEP_EDGE_OFFSET == b.right() {
            return ContactType::StepUp;
        }
        if step_left && flags.has_right_inertia() && p.right() == b.x + STEP_EDGE_OFFSET {
            return ContactType::StepUp;
        }
    }

    if p.bottom() != b.y { return ContactType::None; }

    // step down: leaving over the step edge
    if step_left && flags.has_left_inertia() && p.x + STEP_EDGE_OFFSET == b.x {
        return ContactType::StepDown;
    }
    if step_right && flags.has_right_inertia() && p.right() == b.right() + STEP_EDGE_OFFSET {
        return ContactType::StepDown;
    }

    if both {
        return if flags.has_up_inertia() { ContactType::None } else { ContactType::Ground };
    }

    if in_landing_band(p, b) { return ContactType::Ground; }
    let right_side = p.x + PROBE_WIDTH / 2 >= b.center_x();
    // the step side was already handled above
    if right_side == step_right { return ContactType::Ground; }
    tight_contact(p, b, flags, THIN_BAND).unwrap_or(ContactType::Ground)
}

fn spikes(p: Probe, b: TileBox, flags: ActorFlags) -> Result<ContactType, InternalError> {
    let spiked = p.x < b.right() - SPIKE_CORNER && p.right() > b.x + SPIKE_CORNER;
    if spiked && p.bottom() >= b.y && p.y < b.bottom() {
        return Ok(ContactType::Death);
    }
    solid_block(Subtype::Spikes, p, b, flags)
}

fn spiky_plant(p: Probe, b: TileBox, lethal: bool) -> ContactType {
    let overlapping = p.x < b.right() && b.x < p.right() && p.y < b.bottom() && b.y < p.bottom();
    if lethal && overlapping { ContactType::Death } else { ContactType::None }
}

// ══════════════════════════════════════════════════════════════
// Shared helpers
// ══════════════════════════════════════════════════════════════

/// Probe fully on top of the tile, horizontally.
fn in_landing_band(p: Probe, b: TileBox) -> bool {
    p.x >= b.x && p.x <= b.right() - PROBE_WIDTH
}

/// Tight spot classification by overhang past the landing band.
/// `None` when the probe is not past the band by at least `tight1_from`.
fn tight_contact(p: Probe, b: TileBox, flags: ActorFlags, band: TightBand) -> Option<ContactType> {
    let left_limit = b.x;
    let right_limit = b.right() - PROBE_WIDTH;
    let right_side = p.x + PROBE_WIDTH / 2 >= b.center_x();

    let (overhang, front) = if right_side {
        (p.x - right_limit, flags.is_right_oriented())
    } else {
        (left_limit - p.x, flags.is_left_oriented())
    };

    if overhang >= band.slip_from { return Some(ContactType::SlipIntoFall); }
    if overhang >= band.tight2_from {
        return Some(if front { ContactType::TightFront2 } else { ContactType::TightBack2 });
    }
    if overhang >= band.tight1_from {
        return Some(if front { ContactType::TightFront1 } else { ContactType::TightBack1 });
    }
    None
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

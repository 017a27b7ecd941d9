/// The moving actor: position, motion state machine, and the per-tick
/// input the controller consumes.
///
/// Position `(x, y)` is the top-left of the 17×51 sprite frame in world
/// pixels, kept sub-pixel. The collision probe sits at `(x+3, y+5)`.

use super::contact::ContactType;

pub const FRAME_WIDTH: i32 = 17;
pub const FRAME_HEIGHT: i32 = 51;
pub const PROBE_OFFSET_X: i32 = 3;
pub const PROBE_OFFSET_Y: i32 = 5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    pub fn sign(self) -> f64 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    pub fn flip(self) -> Facing {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

/// Actor state machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MotionState {
    Falling,
    Idle,
    Moving,
    StairUp,
    StairDown,
    Jumping,
    WingJump,  // second jump, once per airborne period
    WallStick,
}

impl MotionState {
    /// States where ledge slips and tight-spot poses are ignored.
    pub fn is_floaty(self) -> bool {
        matches!(self, MotionState::Jumping | MotionState::WingJump)
    }

    /// States that drop into `Falling` when no floor contact is found.
    pub fn can_slip_into_fall(self) -> bool {
        matches!(self, MotionState::Idle | MotionState::Moving)
    }

    /// Ground states that go back to `Idle` when horizontal input stops.
    pub fn can_stop_ground_move(self) -> bool {
        matches!(self, MotionState::Moving | MotionState::StairUp | MotionState::StairDown)
    }
}

/// Standing pose on a tight spot. `Normal` everywhere else.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Pose {
    #[default]
    Normal,
    TightFront1,
    TightFront2,
    TightBack1,
    TightBack2,
}

impl Pose {
    pub fn from_contact(contact: ContactType) -> Option<Pose> {
        match contact {
            ContactType::TightFront1 => Some(Pose::TightFront1),
            ContactType::TightFront2 => Some(Pose::TightFront2),
            ContactType::TightBack1 => Some(Pose::TightBack1),
            ContactType::TightBack2 => Some(Pose::TightBack2),
            _ => None,
        }
    }
}

/// Deferred position change after a stair step, so the 7 px rise is
/// spread over several ticks instead of a single jump.
///
/// `horz` counts remaining ±1 px horizontal moves; `vert` is positive
/// for remaining 2 px rises and negative for remaining 2 px drops.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct StepSmoothing {
    pub horz: i8,
    pub vert: i8,
}

/// Ticks of smoothing each stair step leaves behind.
pub const STEP_SMOOTHING_TICKS: i8 = 2;

impl StepSmoothing {
    pub fn start(to_right: bool, up: bool) -> Self {
        let n = STEP_SMOOTHING_TICKS;
        StepSmoothing {
            horz: if to_right { n } else { -n },
            vert: if up { n } else { -n },
        }
    }

    pub fn is_active(&self) -> bool { self.horz != 0 }

    /// Consume one tick of smoothing, returning the pixel delta to apply.
    pub fn advance(&mut self) -> Option<(f64, f64)> {
        if self.horz == 0 { return None; }

        let dx = if self.horz > 0 {
            self.horz -= 1;
            1.0
        } else {
            self.horz += 1;
            -1.0
        };
        let dy = if self.vert > 0 {
            self.vert -= 1;
            -2.0
        } else if self.vert < 0 {
            self.vert += 1;
            2.0
        } else {
            0.0
        };
        Some((dx, dy))
    }
}

/// Input for one tick, already polled and edge-detected by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickInput {
    pub horizontal: Option<Facing>,
    pub jump_triggered: bool,
    pub jump_held: bool,
    pub down_held: bool,
    pub down_triggered: bool,
    pub plants_reversed: bool,
}

#[derive(Clone, Debug)]
pub struct Actor {
    pub x: f64,
    pub y: f64,
    pub facing: Facing,
    pub state: MotionState,
    pub state_ticks: u32,
    pub pose: Pose,
    /// Set when entering `Moving` mid-stride (landing, stair step):
    /// no slow run intro.
    pub skip_run_intro: bool,

    pub spent_wing_jump: bool,
    pub spent_wall_stick: bool,
    pub jump_ticks_goal: u32,
    pub since_jump_trigger: u32,
    pub since_no_contact_fall: u32,
    pub wall_stick_away_left: u16,

    pub smoothing: StepSmoothing,
    pub ticks_dead: u8,
}

impl Actor {
    pub fn new(x: f64, y: f64) -> Self {
        Actor {
            x, y,
            facing: Facing::Right,
            state: MotionState::Idle,
            state_ticks: 0,
            pose: Pose::Normal,
            skip_run_intro: false,
            spent_wing_jump: false,
            spent_wall_stick: false,
            jump_ticks_goal: 0,
            since_jump_trigger: u32::MAX / 2,
            since_no_contact_fall: 0,
            wall_stick_away_left: 0,
            smoothing: StepSmoothing::default(),
            ticks_dead: 0,
        }
    }

    /// Place the actor standing on `floor_y`, horizontally centered on `center_x`.
    pub fn standing_at(center_x: u16, floor_y: u16) -> Self {
        let x = center_x as f64 - (FRAME_WIDTH / 2) as f64;
        let y = floor_y as f64 - (FRAME_HEIGHT - 3) as f64;
        Actor::new(x, y)
    }

    pub fn set_state(&mut self, state: MotionState) {
        self.set_state_with_pose(state, Pose::Normal);
    }

    pub fn set_state_with_pose(&mut self, state: MotionState, pose: Pose) {
        if state != self.state {
            log::debug!("actor state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.state_ticks = 0;
        self.pose = pose;
        self.skip_run_intro = false;
    }

    pub fn is_dead(&self) -> bool { self.ticks_dead > 0 }

    /// Integer pixel position of the sprite frame.
    pub fn pixel_pos(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }

    pub fn reset_spent(&mut self) {
        self.spent_wing_jump = false;
        self.spent_wall_stick = false;
    }
}

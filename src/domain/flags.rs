/// Actor motion/environment flags consumed by the contact classifier.
///
/// Rebuilt from scratch at the start of every resolution step. The only
/// partial mutation allowed afterwards is the resolver clearing a single
/// inertia bit when a contact blocks that direction.

use super::entity::Facing;

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct ActorFlags: u8 {
        const INERTIA_UP      = 0b1000_0000;
        const INERTIA_DOWN    = 0b0100_0000;
        const INERTIA_LEFT    = 0b0010_0000;
        const INERTIA_RIGHT   = 0b0001_0000;

        const DOWN_PRESSED    = 0b0000_1000; // disambiguates step up vs step through
        const LEFT_ORIENTED   = 0b0000_0100;
        const PLANTS_REVERSED = 0b0000_0010;
    }
}

impl ActorFlags {
    pub const ALL_INERTIA: ActorFlags = ActorFlags::INERTIA_UP
        .union(ActorFlags::INERTIA_DOWN)
        .union(ActorFlags::INERTIA_LEFT)
        .union(ActorFlags::INERTIA_RIGHT);

    /// Build flags from the displacement of this step plus input state.
    /// At most one of up/down and one of left/right can be set.
    pub fn from_motion(dx: f64, dy: f64, facing: Facing, down_pressed: bool, plants_reversed: bool) -> Self {
        let mut flags = ActorFlags::empty();
        if dx > 0.0 { flags |= ActorFlags::INERTIA_RIGHT; }
        if dx < 0.0 { flags |= ActorFlags::INERTIA_LEFT; }
        if dy > 0.0 { flags |= ActorFlags::INERTIA_DOWN; }
        if dy < 0.0 { flags |= ActorFlags::INERTIA_UP; }
        if down_pressed { flags |= ActorFlags::DOWN_PRESSED; }
        if plants_reversed { flags |= ActorFlags::PLANTS_REVERSED; }
        if facing == Facing::Left { flags |= ActorFlags::LEFT_ORIENTED; }
        flags
    }

    pub fn has_up_inertia(self) -> bool { self.contains(ActorFlags::INERTIA_UP) }
    pub fn has_down_inertia(self) -> bool { self.contains(ActorFlags::INERTIA_DOWN) }
    pub fn has_left_inertia(self) -> bool { self.contains(ActorFlags::INERTIA_LEFT) }
    pub fn has_right_inertia(self) -> bool { self.contains(ActorFlags::INERTIA_RIGHT) }

    pub fn is_left_oriented(self) -> bool { self.contains(ActorFlags::LEFT_ORIENTED) }
    pub fn is_right_oriented(self) -> bool { !self.is_left_oriented() }

    pub fn down_pressed(self) -> bool { self.contains(ActorFlags::DOWN_PRESSED) }
    pub fn plants_reversed(self) -> bool { self.contains(ActorFlags::PLANTS_REVERSED) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inertia_from_displacement_signs() {
        let f = ActorFlags::from_motion(1.5, -0.2, Facing::Right, false, false);
        assert!(f.has_right_inertia());
        assert!(f.has_up_inertia());
        assert!(!f.has_left_inertia());
        assert!(!f.has_down_inertia());
        assert!(f.is_right_oriented());
    }

    #[test]
    fn stationary_has_no_inertia() {
        let f = ActorFlags::from_motion(0.0, 0.0, Facing::Left, true, true);
        assert!(!f.intersects(ActorFlags::ALL_INERTIA));
        assert!(f.is_left_oriented());
        assert!(f.down_pressed());
        assert!(f.plants_reversed());
    }

    #[test]
    fn clearing_all_inertia_keeps_input_bits() {
        let mut f = ActorFlags::from_motion(-1.0, 2.0, Facing::Left, true, false);
        f.remove(ActorFlags::ALL_INERTIA);
        assert_eq!(f, ActorFlags::DOWN_PRESSED | ActorFlags::LEFT_ORIENTED);
    }
}

/// Axis-aligned u16 rectangles, half-open on both axes.
///
/// World coordinates live in u16 space with levels built around the
/// center (32767, 32767), so arithmetic near the edges saturates instead
/// of wrapping.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Rect {
    pub min_x: u16,
    pub min_y: u16,
    pub max_x: u16,
    pub max_y: u16,
}

impl Rect {
    /// Coordinates are taken as given, swapped corners are not normalized.
    pub const fn new(min_x: u16, min_y: u16, max_x: u16, max_y: u16) -> Self {
        Rect { min_x, min_y, max_x, max_y }
    }

    pub fn from_size(x: u16, y: u16, width: u16, height: u16) -> Self {
        Rect::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    pub fn width(&self) -> u16 { self.max_x.saturating_sub(self.min_x) }
    pub fn height(&self) -> u16 { self.max_y.saturating_sub(self.min_y) }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    /// Strict overlap: each rectangle's min is below the other's max on both axes.
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min_x < other.max_x && other.min_x < self.max_x
            && self.min_y < other.max_y && other.min_y < self.max_y
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }
}

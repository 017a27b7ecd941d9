/// Spatial index over placed tiles: an AVL tree keyed by tile left edge,
/// each node caching the maximum right edge of its subtree.
///
/// ## Invariants (checked by `validate`)
///
///   - in-order traversal is non-decreasing in `x`
///   - `max_right_x` = max(own right, left.max_right_x, right.max_right_x)
///   - `height` = 1 + max(child heights), leaf = 0, empty = -1
///   - balance factor (right height - left height) stays in [-1, 1]
///
/// ## Pruning
///
/// Every query that needs `tile.right > min_x` skips a whole subtree when
/// `min_x >= subtree.max_right_x`, and skips the right subtree when its
/// upper bound is at or below the node's own `x` (right children never
/// start before their parent).
///
/// Geometry (right, bottom) is cached per node at insert time, so the
/// registry is only consulted when a tile enters the tree.

use std::ops::ControlFlow;
use std::rc::Rc;

use crate::domain::rect::Rect;
use crate::domain::tile::{Tile, TileRegistry};
use crate::error::InternalError;

type Link = Option<Box<Node>>;

#[derive(Debug)]
struct Node {
    tile: Tile,
    right_x: u16,
    bottom: u16,
    max_right_x: u16,
    height: i16,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(tile: Tile, registry: &TileRegistry) -> Box<Node> {
        let right_x = registry.right(&tile);
        Box::new(Node {
            tile,
            right_x,
            bottom: registry.bottom(&tile),
            max_right_x: right_x,
            height: 0,
            left: None,
            right: None,
        })
    }

    fn rect(&self) -> Rect {
        Rect::new(self.tile.x, self.tile.y, self.right_x, self.bottom)
    }

    fn refresh(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
        self.max_right_x = self.right_x
            .max(max_right(&self.left))
            .max(max_right(&self.right));
    }

    fn balance(&self) -> i16 {
        height(&self.right) - height(&self.left)
    }
}

fn height(link: &Link) -> i16 {
    link.as_ref().map_or(-1, |n| n.height)
}

fn max_right(link: &Link) -> u16 {
    link.as_ref().map_or(0, |n| n.max_right_x)
}

pub struct SpatialIndex {
    root: Link,
    registry: Rc<TileRegistry>,
    len: usize,
}

impl SpatialIndex {
    pub fn new(registry: Rc<TileRegistry>) -> Self {
        SpatialIndex { root: None, registry, len: 0 }
    }

    pub fn registry(&self) -> &TileRegistry { &self.registry }

    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.root.is_none() }

    /// Tree height: -1 when empty, 0 for a single node.
    pub fn height(&self) -> i16 { height(&self.root) }

    // ── Mutation ──

    pub fn insert(&mut self, tile: Tile) {
        let node = Node::leaf(tile, &self.registry);
        self.root = Some(insert_node(self.root.take(), node));
        self.len += 1;
    }

    /// Remove one tile equal to `tile`. Returns false if none is stored.
    pub fn remove(&mut self, tile: &Tile) -> bool {
        let (root, removed) = remove_from(self.root.take(), tile);
        self.root = root;
        if removed { self.len -= 1; }
        removed
    }

    /// Detach both subtrees of the root and reinsert their nodes one by one.
    /// Used after bulk loads; insert/remove already keep the tree balanced.
    pub fn rebuild_balanced(&mut self) {
        let mut root = match self.root.take() {
            Some(r) => r,
            None => return,
        };
        let mut detached = Vec::with_capacity(self.len.saturating_sub(1));
        collect_preorder(root.left.take(), &mut detached);
        collect_preorder(root.right.take(), &mut detached);
        root.refresh();

        let mut rebuilt = root;
        for node in detached {
            rebuilt = insert_node(Some(rebuilt), node);
        }
        self.root = Some(rebuilt);
        log::debug!("spatial index rebuilt: {} tiles, height {}", self.len, self.height());
    }

    // ── Queries ──

    pub fn contains(&self, tile: &Tile) -> bool {
        contains_in(&self.root, tile)
    }

    /// Any one stored tile whose rectangle overlaps `probe`'s, including
    /// `probe` itself if it is stored.
    pub fn find_one_overlap(&self, probe: &Tile) -> Option<Tile> {
        let rect = self.registry.rect(probe);
        let mut hit = None;
        let _ = visit_overlaps(&self.root, &rect, None, &mut |t| {
            hit = Some(t);
            ControlFlow::Break(())
        });
        hit
    }

    /// Visit every stored tile overlapping `probe`, except tiles equal to
    /// `probe` itself. Stops early when `visit` breaks.
    pub fn for_each_overlap<F>(&self, probe: &Tile, mut visit: F)
    where
        F: FnMut(Tile) -> ControlFlow<()>,
    {
        let rect = self.registry.rect(probe);
        let _ = visit_overlaps(&self.root, &rect, Some(*probe), &mut visit);
    }

    /// Visit every tile with `right > min_x` and `x < max_x_exclusive`.
    pub fn for_each_in_x_range<F>(&self, min_x: u16, max_x_exclusive: u16, mut visit: F)
    where
        F: FnMut(Tile) -> ControlFlow<()>,
    {
        let _ = visit_in_x_range(&self.root, min_x, max_x_exclusive, &mut visit);
    }

    /// In-order traversal (ascending `x`).
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(Tile) -> ControlFlow<()>,
    {
        let _ = visit_in_order(&self.root, &mut visit);
    }

    pub fn tiles(&self) -> Vec<Tile> {
        let mut out = Vec::with_capacity(self.len);
        self.for_each(|t| {
            out.push(t);
            ControlFlow::Continue(())
        });
        out
    }

    /// Check every structural invariant. Meant for tests and debug tooling.
    pub fn validate(&self) -> Result<(), InternalError> {
        let mut count = 0usize;
        let mut last_x: Option<u16> = None;
        validate_node(&self.root, &self.registry, &mut count, &mut last_x)?;
        if count != self.len {
            return Err(InternalError::TreeInvariant(format!(
                "len is {} but tree holds {} nodes", self.len, count
            )));
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════
// Rotations and rebalancing
// ══════════════════════════════════════════════════════════════

fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = match node.right.take() {
        Some(p) => p,
        None => return node,
    };
    node.right = pivot.left.take();
    node.refresh();
    pivot.left = Some(node);
    pivot.refresh();
    pivot
}

fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = match node.left.take() {
        Some(p) => p,
        None => return node,
    };
    node.left = pivot.right.take();
    node.refresh();
    pivot.right = Some(node);
    pivot.refresh();
    pivot
}

/// Refresh cached fields, then apply a single or double rotation if the
/// node is out of balance.
fn rebalance(mut node: Box<Node>) -> Box<Node> {
    node.refresh();
    let bf = node.balance();
    if bf < -1 {
        if let Some(left) = node.left.take() {
            node.left = Some(if left.balance() > 0 { rotate_left(left) } else { left });
        }
        return rotate_right(node);
    }
    if bf > 1 {
        if let Some(right) = node.right.take() {
            node.right = Some(if right.balance() < 0 { rotate_right(right) } else { right });
        }
        return rotate_left(node);
    }
    node
}

// ══════════════════════════════════════════════════════════════
// Insert / remove
// ══════════════════════════════════════════════════════════════

/// Equal keys go left.
fn insert_node(link: Link, node: Box<Node>) -> Box<Node> {
    match link {
        None => node,
        Some(mut cur) => {
            if node.tile.x <= cur.tile.x {
                cur.left = Some(insert_node(cur.left.take(), node));
            } else {
                cur.right = Some(insert_node(cur.right.take(), node));
            }
            rebalance(cur)
        }
    }
}

/// Rotations can move equal keys to either side, so ties search both.
fn remove_from(link: Link, tile: &Tile) -> (Link, bool) {
    let mut cur = match link {
        Some(n) => n,
        None => return (None, false),
    };
    if cur.tile == *tile {
        return (remove_node(cur), true);
    }

    let mut removed = false;
    if tile.x <= cur.tile.x {
        let (left, r) = remove_from(cur.left.take(), tile);
        cur.left = left;
        removed = r;
    }
    if !removed && tile.x >= cur.tile.x {
        let (right, r) = remove_from(cur.right.take(), tile);
        cur.right = right;
        removed = r;
    }

    if removed { (Some(rebalance(cur)), true) } else { (Some(cur), false) }
}

fn remove_node(mut node: Box<Node>) -> Link {
    match (node.left.take(), node.right.take()) {
        (None, None) => None,
        (Some(l), None) => Some(l),
        (None, Some(r)) => Some(r),
        (Some(l), Some(r)) => {
            // splice in the in-order successor
            let (rest, mut successor) = take_min(r);
            successor.left = Some(l);
            successor.right = rest;
            Some(rebalance(successor))
        }
    }
}

/// Detach the leftmost node. Returns (remaining subtree, detached node).
fn take_min(mut node: Box<Node>) -> (Link, Box<Node>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn contains_in(link: &Link, tile: &Tile) -> bool {
    let node = match link {
        Some(n) => n,
        None => return false,
    };
    if node.tile == *tile { return true; }
    (tile.x <= node.tile.x && contains_in(&node.left, tile))
        || (tile.x >= node.tile.x && contains_in(&node.right, tile))
}

fn collect_preorder(link: Link, out: &mut Vec<Box<Node>>) {
    if let Some(mut node) = link {
        let left = node.left.take();
        let right = node.right.take();
        node.height = 0;
        node.max_right_x = node.right_x;
        out.push(node);
        collect_preorder(left, out);
        collect_preorder(right, out);
    }
}

// ══════════════════════════════════════════════════════════════
// Traversals
// ══════════════════════════════════════════════════════════════

fn visit_overlaps(
    link: &Link,
    probe: &Rect,
    exclude: Option<Tile>,
    visit: &mut dyn FnMut(Tile) -> ControlFlow<()>,
) -> ControlFlow<()> {
    let node = match link {
        Some(n) => n,
        None => return ControlFlow::Continue(()),
    };
    if probe.min_x >= node.max_right_x { return ControlFlow::Continue(()); }

    if visit_overlaps(&node.left, probe, exclude, visit).is_break() {
        return ControlFlow::Break(());
    }
    if node.rect().overlaps(probe) && exclude != Some(node.tile) && visit(node.tile).is_break() {
        return ControlFlow::Break(());
    }
    if probe.max_x > node.tile.x {
        return visit_overlaps(&node.right, probe, exclude, visit);
    }
    ControlFlow::Continue(())
}

fn visit_in_x_range(
    link: &Link,
    min_x: u16,
    max_x_exclusive: u16,
    visit: &mut dyn FnMut(Tile) -> ControlFlow<()>,
) -> ControlFlow<()> {
    let node = match link {
        Some(n) => n,
        None => return ControlFlow::Continue(()),
    };
    if min_x >= node.max_right_x { return ControlFlow::Continue(()); }

    if visit_in_x_range(&node.left, min_x, max_x_exclusive, visit).is_break() {
        return ControlFlow::Break(());
    }
    if max_x_exclusive > node.tile.x {
        if node.right_x > min_x && visit(node.tile).is_break() {
            return ControlFlow::Break(());
        }
        return visit_in_x_range(&node.right, min_x, max_x_exclusive, visit);
    }
    ControlFlow::Continue(())
}

fn visit_in_order(link: &Link, visit: &mut dyn FnMut(Tile) -> ControlFlow<()>) -> ControlFlow<()> {
    let node = match link {
        Some(n) => n,
        None => return ControlFlow::Continue(()),
    };
    if visit_in_order(&node.left, visit).is_break() { return ControlFlow::Break(()); }
    if visit(node.tile).is_break() { return ControlFlow::Break(()); }
    visit_in_order(&node.right, visit)
}

fn validate_node(
    link: &Link,
    registry: &TileRegistry,
    count: &mut usize,
    last_x: &mut Option<u16>,
) -> Result<(), InternalError> {
    let node = match link {
        Some(n) => n,
        None => return Ok(()),
    };
    let broken = |what: String| Err(InternalError::TreeInvariant(what));

    validate_node(&node.left, registry, count, last_x)?;

    *count += 1;
    let t = node.tile;
    if let Some(prev) = *last_x {
        if t.x < prev {
            return broken(format!("in-order x went from {} down to {}", prev, t.x));
        }
    }
    *last_x = Some(t.x);

    if node.right_x != registry.right(&t) || node.bottom != registry.bottom(&t) {
        return broken(format!("stale cached geometry for tile at ({}, {})", t.x, t.y));
    }
    let expected_height = 1 + height(&node.left).max(height(&node.right));
    if node.height != expected_height {
        return broken(format!(
            "height {} at ({}, {}), expected {}", node.height, t.x, t.y, expected_height
        ));
    }
    let expected_max = node.right_x.max(max_right(&node.left)).max(max_right(&node.right));
    if node.max_right_x != expected_max {
        return broken(format!(
            "max_right_x {} at ({}, {}), expected {}", node.max_right_x, t.x, t.y, expected_max
        ));
    }
    let bf = node.balance();
    if !(-1..=1).contains(&bf) {
        return broken(format!("balance factor {} at ({}, {})", bf, t.x, t.y));
    }

    validate_node(&node.right, registry, count, last_x)
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::{Subtype, TileType, TileTypeId};
    use proptest::prelude::*;

    fn registry() -> (Rc<TileRegistry>, Vec<TileTypeId>) {
        let mut reg = TileRegistry::new();
        let ids = vec![
            reg.register(TileType::new("small", 8, 8, Subtype::Block)).unwrap(),
            reg.register(TileType::new("ground", 32, 16, Subtype::Block)).unwrap(),
            reg.register(TileType::new("wide", 120, 6, Subtype::ThinBlock)).unwrap(),
            reg.register(TileType::new("step", 22, 5, Subtype::ThinStep)).unwrap(),
        ];
        (Rc::new(reg), ids)
    }

    fn collect_range(index: &SpatialIndex, min_x: u16, max_x: u16) -> Vec<Tile> {
        let mut out = vec![];
        index.for_each_in_x_range(min_x, max_x, |t| {
            out.push(t);
            ControlFlow::Continue(())
        });
        out
    }

    fn sorted(v: Vec<Tile>) -> Vec<(u16, u16, u16)> {
        let mut keys: Vec<_> = v.into_iter().map(|t| (t.x, t.y, t.type_id.raw())).collect();
        keys.sort_unstable();
        keys
    }

    // ── Basic operations ──

    #[test]
    fn empty_index() {
        let (reg, ids) = registry();
        let index = SpatialIndex::new(reg);
        assert_eq!(index.height(), -1);
        assert!(index.is_empty());
        assert_eq!(index.find_one_overlap(&Tile::new(ids[0], 0, 0)), None);
        assert!(index.validate().is_ok());
    }

    #[test]
    fn ascending_inserts_stay_balanced() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        for i in 0..1000u16 {
            index.insert(Tile::new(ids[0], i * 8, 0));
        }
        index.validate().unwrap();
        assert_eq!(index.len(), 1000);
        // AVL bound: h < 1.44 log2(n + 2)
        assert!(index.height() <= 14, "height {}", index.height());
    }

    #[test]
    fn remove_missing_is_noop() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        index.insert(Tile::new(ids[0], 10, 10));
        assert!(!index.remove(&Tile::new(ids[0], 10, 11)));
        assert!(!index.remove(&Tile::new(ids[1], 10, 10)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_with_two_children() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        for x in [50u16, 20, 80, 10, 30, 70, 90] {
            index.insert(Tile::new(ids[0], x, 0));
        }
        assert!(index.remove(&Tile::new(ids[0], 50, 0)));
        index.validate().unwrap();
        let xs: Vec<u16> = index.tiles().iter().map(|t| t.x).collect();
        assert_eq!(xs, vec![10, 20, 30, 70, 80, 90]);
    }

    #[test]
    fn duplicate_keys_survive_rotations() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        for y in 0..40u16 {
            index.insert(Tile::new(ids[0], 100, y * 8));
        }
        index.validate().unwrap();
        for y in (0..40u16).rev() {
            assert!(index.remove(&Tile::new(ids[0], 100, y * 8)), "y = {}", y * 8);
            index.validate().unwrap();
        }
        assert!(index.is_empty());
    }

    #[test]
    fn replace_is_remove_then_insert() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        let door = Tile::new(ids[1], 200, 100);
        index.insert(door);
        assert!(index.remove(&door));
        index.insert(door.with_type(ids[3]));
        assert!(index.contains(&door.with_type(ids[3])));
        assert!(!index.contains(&door));
    }

    // ── Queries ──

    #[test]
    fn x_range_uses_right_edge() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        let wide = Tile::new(ids[2], 0, 0); // right = 120
        let far = Tile::new(ids[0], 500, 0);
        index.insert(wide);
        index.insert(far);
        assert_eq!(collect_range(&index, 100, 110), vec![wide]);
        assert_eq!(collect_range(&index, 120, 499), vec![]);
        assert_eq!(collect_range(&index, 120, 501), vec![far]);
    }

    #[test]
    fn overlap_excludes_self_but_find_one_does_not() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        let a = Tile::new(ids[1], 100, 100);
        let b = Tile::new(ids[0], 120, 110);
        index.insert(a);
        index.insert(b);

        let mut seen = vec![];
        index.for_each_overlap(&a, |t| {
            seen.push(t);
            ControlFlow::Continue(())
        });
        assert_eq!(seen, vec![b]);
        assert!(index.find_one_overlap(&a).is_some());
    }

    #[test]
    fn touching_tiles_do_not_overlap() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        index.insert(Tile::new(ids[0], 100, 100));
        assert_eq!(index.find_one_overlap(&Tile::new(ids[0], 108, 100)), None);
        assert_eq!(index.find_one_overlap(&Tile::new(ids[0], 100, 108)), None);
        assert!(index.find_one_overlap(&Tile::new(ids[0], 107, 107)).is_some());
    }

    #[test]
    fn early_stop() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        for i in 0..10u16 {
            index.insert(Tile::new(ids[0], i * 4, 0));
        }
        let mut n = 0;
        index.for_each_in_x_range(0, 1000, |_| {
            n += 1;
            if n == 3 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
        });
        assert_eq!(n, 3);
    }

    #[test]
    fn rebuild_keeps_contents() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        for i in 0..200u16 {
            index.insert(Tile::new(ids[(i % 4) as usize], (i * 37) % 900, i));
        }
        let before = sorted(index.tiles());
        index.rebuild_balanced();
        index.validate().unwrap();
        assert_eq!(sorted(index.tiles()), before);
    }

    #[test]
    fn validate_reports_stale_len() {
        let (reg, ids) = registry();
        let mut index = SpatialIndex::new(reg);
        index.insert(Tile::new(ids[0], 1, 1));
        index.len = 3;
        assert!(matches!(index.validate(), Err(InternalError::TreeInvariant(_))));
    }

    // ── Properties ──

    #[derive(Clone, Debug)]
    enum Op {
        Insert(usize, u16, u16),
        Remove(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0usize..4, 0u16..600, 0u16..200).prop_map(|(k, x, y)| Op::Insert(k, x, y)),
            1 => (0usize..64).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_under_random_ops(ops in prop::collection::vec(op_strategy(), 0..120)) {
            let (reg, ids) = registry();
            let mut index = SpatialIndex::new(reg);
            let mut model: Vec<Tile> = vec![];

            for op in ops {
                match op {
                    Op::Insert(k, x, y) => {
                        let t = Tile::new(ids[k], x, y);
                        index.insert(t);
                        model.push(t);
                    }
                    Op::Remove(i) => {
                        if model.is_empty() { continue; }
                        let t = model.remove(i % model.len());
                        prop_assert!(index.remove(&t));
                    }
                }
                prop_assert!(index.validate().is_ok(), "{:?}", index.validate());
            }
            prop_assert_eq!(sorted(index.tiles()), sorted(model));
        }

        #[test]
        fn insert_then_remove_round_trips(
            seed in prop::collection::vec((0usize..4, 0u16..600, 0u16..200), 0..60),
            extra in (0usize..4, 0u16..600, 0u16..200),
        ) {
            let (reg, ids) = registry();
            let mut index = SpatialIndex::new(reg);
            for (k, x, y) in seed {
                index.insert(Tile::new(ids[k], x, y));
            }
            let before = sorted(index.tiles());
            let t = Tile::new(ids[extra.0], extra.1, extra.2);
            index.insert(t);
            prop_assert!(index.remove(&t));
            prop_assert_eq!(sorted(index.tiles()), before);
        }

        #[test]
        fn queries_match_brute_force(
            placed in prop::collection::vec((0usize..4, 0u16..600, 0u16..200), 0..80),
            probe in (0usize..4, 0u16..650, 0u16..220),
            range in (0u16..700, 0u16..700),
        ) {
            let (reg, ids) = registry();
            let mut index = SpatialIndex::new(reg.clone());
            let tiles: Vec<Tile> = placed.iter().map(|&(k, x, y)| Tile::new(ids[k], x, y)).collect();
            for t in &tiles {
                index.insert(*t);
            }

            let p = Tile::new(ids[probe.0], probe.1, probe.2);
            let p_rect = reg.rect(&p);
            let expected: Vec<Tile> = tiles.iter().copied()
                .filter(|t| *t != p && reg.rect(t).overlaps(&p_rect))
                .collect();
            let mut got = vec![];
            index.for_each_overlap(&p, |t| {
                got.push(t);
                ControlFlow::Continue(())
            });
            prop_assert_eq!(sorted(got), sorted(expected));

            let any_overlap = tiles.iter().any(|t| reg.rect(t).overlaps(&p_rect));
            prop_assert_eq!(index.find_one_overlap(&p).is_some(), any_overlap);

            let (lo, hi) = (range.0.min(range.1), range.0.max(range.1));
            let expected: Vec<Tile> = tiles.iter().copied()
                .filter(|t| reg.right(t) > lo && t.x < hi)
                .collect();
            prop_assert_eq!(sorted(collect_range(&index, lo, hi)), sorted(expected));
        }
    }
}

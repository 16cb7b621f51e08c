// src/bsp/superblock.rs
//! Quadtree-style spatial index over the segments still waiting to be
//! partitioned. Blocks halve along their longer axis; a segment lives in the
//! deepest block that wholly contains it. Each block keeps subtree totals of
//! real and mini segments so the partition search can account for a whole
//! block at once.

use crate::bsp::bsp_util::BoundingBox;
use crate::bsp::model::{Geometry, SegId, SegLocation};
use crate::bsp::{BLOCK_SIZE, SUPERBLOCK_LEAF_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BlockId(pub usize);

#[derive(Debug, Clone)]
pub(crate) struct SuperBlock {
    pub bounds: BoundingBox,
    pub parent: Option<BlockId>,
    pub children: [Option<BlockId>; 2],
    pub segs: Vec<SegId>,
    /// Line-backed segments in this block and all sub-blocks.
    pub real_count: usize,
    /// Mini segments in this block and all sub-blocks.
    pub mini_count: usize,
}

impl SuperBlock {
    fn new(bounds: BoundingBox, parent: Option<BlockId>) -> Self {
        SuperBlock { bounds, parent, children: [None, None], segs: Vec::new(), real_count: 0, mini_count: 0 }
    }

    pub fn is_leaf(&self) -> bool {
        self.bounds.width() <= SUPERBLOCK_LEAF_SIZE && self.bounds.height() <= SUPERBLOCK_LEAF_SIZE
    }

    pub fn total(&self) -> usize {
        self.real_count + self.mini_count
    }
}

/// Arena of superblocks. Several independent block trees can be alive at
/// once (one per pending subset during the build).
#[derive(Debug, Default)]
pub(crate) struct SuperBlockSet {
    blocks: Vec<SuperBlock>,
    free: Vec<BlockId>,
}

/// Grid-aligned bounds covering `map`, with each extent a power-of-two
/// number of blocks.
pub(crate) fn root_bounds(map: &BoundingBox) -> BoundingBox {
    let block = BLOCK_SIZE as f64;
    let x1 = (map.min_x / block).floor() * block;
    let y1 = (map.min_y / block).floor() * block;
    let span = |lo: f64, hi: f64| -> f64 {
        let blocks = (((hi - lo) / block).ceil() as u64).max(1);
        blocks.next_power_of_two() as f64 * block
    };
    BoundingBox::new(x1, y1, x1 + span(x1, map.max_x), y1 + span(y1, map.max_y))
}

impl SuperBlockSet {
    pub fn new() -> Self {
        SuperBlockSet::default()
    }

    fn alloc(&mut self, bounds: BoundingBox, parent: Option<BlockId>) -> BlockId {
        let block = SuperBlock::new(bounds, parent);
        match self.free.pop() {
            Some(id) => {
                self.blocks[id.0] = block;
                id
            }
            None => {
                self.blocks.push(block);
                BlockId(self.blocks.len() - 1)
            }
        }
    }

    /// Starts a new, empty block tree.
    pub fn new_root(&mut self, bounds: BoundingBox) -> BlockId {
        self.alloc(bounds, None)
    }

    pub fn block(&self, id: BlockId) -> &SuperBlock {
        &self.blocks[id.0]
    }

    pub fn is_empty(&self, id: BlockId) -> bool {
        self.blocks[id.0].total() == 0
    }

    /// Files `seg` under `block`, descending into (and creating) sub-blocks
    /// while the segment fits wholly in one half.
    pub fn push(&mut self, block: BlockId, seg: SegId, geo: &mut Geometry) {
        let (start, end, mini) = {
            let s = geo.segment(seg);
            (s.start, s.end, s.is_mini())
        };

        // Ancestors above the entry block also count the segment.
        let mut up = self.blocks[block.0].parent;
        while let Some(id) = up {
            self.bump(id, mini, true);
            up = self.blocks[id.0].parent;
        }

        let mut cur = block;
        loop {
            self.bump(cur, mini, true);
            let b = &self.blocks[cur.0];
            if b.is_leaf() {
                break;
            }

            let bounds = b.bounds;
            let split_x = bounds.width() >= bounds.height();
            let (p1, p2) = if split_x {
                let mid = (bounds.min_x + bounds.max_x) / 2.0;
                (start.x >= mid, end.x >= mid)
            } else {
                let mid = (bounds.min_y + bounds.max_y) / 2.0;
                (start.y >= mid, end.y >= mid)
            };
            let child = match (p1, p2) {
                (true, true) => 1,
                (false, false) => 0,
                _ => break,
            };

            cur = match b.children[child] {
                Some(id) => id,
                None => {
                    let half = half_bounds(&bounds, split_x, child);
                    let id = self.alloc(half, Some(cur));
                    self.blocks[cur.0].children[child] = Some(id);
                    id
                }
            };
        }

        self.blocks[cur.0].segs.push(seg);
        geo.segments[seg.0].location = SegLocation::Block(cur);
    }

    fn bump(&mut self, id: BlockId, mini: bool, up: bool) {
        let b = &mut self.blocks[id.0];
        let count = if mini { &mut b.mini_count } else { &mut b.real_count };
        if up {
            *count += 1;
        } else {
            *count = count.saturating_sub(1);
        }
    }

    /// Removes one segment from the tree rooted at `root`: the most recently
    /// added segment of the first non-empty block in pre-order.
    pub fn pop(&mut self, root: BlockId, geo: &mut Geometry) -> Option<SegId> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let b = &self.blocks[id.0];
            if b.total() == 0 {
                continue;
            }
            if !b.segs.is_empty() {
                let seg = self.blocks[id.0].segs.pop()?;
                let mini = geo.segment(seg).is_mini();
                let mut up = Some(id);
                while let Some(cur) = up {
                    self.bump(cur, mini, false);
                    up = self.blocks[cur.0].parent;
                }
                geo.segments[seg.0].location = SegLocation::Unassigned;
                return Some(seg);
            }
            for child in b.children.iter().rev().flatten() {
                stack.push(*child);
            }
        }
        None
    }

    /// Drains every segment of the tree rooted at `root`.
    pub fn collect_all(&mut self, root: BlockId, geo: &mut Geometry) -> Vec<SegId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let b = &mut self.blocks[id.0];
            b.real_count = 0;
            b.mini_count = 0;
            out.append(&mut b.segs);
            for child in b.children.iter().rev().flatten() {
                stack.push(*child);
            }
        }
        for seg in &out {
            geo.segments[seg.0].location = SegLocation::Unassigned;
        }
        // Ancestors no longer hold these either.
        let mut up = self.blocks[root.0].parent;
        while let Some(id) = up {
            for seg in &out {
                let mini = geo.segment(*seg).is_mini();
                self.bump(id, mini, false);
            }
            up = self.blocks[id.0].parent;
        }
        out
    }

    /// Segment ids of the tree rooted at `root`, without removing them.
    pub fn segments(&self, root: BlockId) -> Vec<SegId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let b = &self.blocks[id.0];
            out.extend_from_slice(&b.segs);
            for child in b.children.iter().rev().flatten() {
                stack.push(*child);
            }
        }
        out
    }

    /// Bounds of all segment endpoints in the tree rooted at `root`.
    pub fn find_segment_bounds(&self, root: BlockId, geo: &Geometry) -> BoundingBox {
        geo.segment_bounds(self.segments(root))
    }

    /// Returns the tree rooted at `root` to the free list.
    pub fn free(&mut self, root: BlockId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let b = &mut self.blocks[id.0];
            b.segs.clear();
            b.real_count = 0;
            b.mini_count = 0;
            for child in b.children.iter_mut() {
                if let Some(c) = child.take() {
                    stack.push(c);
                }
            }
            self.free.push(id);
        }
    }
}

fn half_bounds(bounds: &BoundingBox, split_x: bool, child: usize) -> BoundingBox {
    if split_x {
        let mid = (bounds.min_x + bounds.max_x) / 2.0;
        if child == 0 {
            BoundingBox::new(bounds.min_x, bounds.min_y, mid, bounds.max_y)
        } else {
            BoundingBox::new(mid, bounds.min_y, bounds.max_x, bounds.max_y)
        }
    } else {
        let mid = (bounds.min_y + bounds.max_y) / 2.0;
        if child == 0 {
            BoundingBox::new(bounds.min_x, bounds.min_y, bounds.max_x, mid)
        } else {
            BoundingBox::new(bounds.min_x, mid, bounds.max_x, bounds.max_y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::bsp_util::Point2D;
    use crate::bsp::model::{LineId, SideKind};

    fn seg(geo: &mut Geometry, x1: f64, y1: f64, x2: f64, y2: f64, real: bool) -> SegId {
        let a = geo.add_vertex(Point2D::new(x1, y1), false);
        let b = geo.add_vertex(Point2D::new(x2, y2), false);
        let line = if real { Some(LineId(0)) } else { None };
        geo.add_segment(a, b, line, SideKind::Front, None)
    }

    #[test]
    fn test_root_bounds_are_aligned() {
        let bounds = root_bounds(&BoundingBox::new(-10.0, 5.0, 300.0, 100.0));
        assert_eq!(bounds, BoundingBox::new(-128.0, 0.0, 384.0, 128.0));
    }

    #[test]
    fn test_push_descends_and_counts() {
        let mut geo = Geometry::default();
        let mut set = SuperBlockSet::new();
        let root = set.new_root(BoundingBox::new(0.0, 0.0, 1024.0, 1024.0));

        let small = seg(&mut geo, 10.0, 10.0, 20.0, 20.0, true);
        let straddle = seg(&mut geo, 500.0, 10.0, 600.0, 10.0, false);
        set.push(root, small, &mut geo);
        set.push(root, straddle, &mut geo);

        assert_eq!(set.block(root).real_count, 1);
        assert_eq!(set.block(root).mini_count, 1);
        // The straddling segment stays at the root.
        assert_eq!(set.block(root).segs, vec![straddle]);
        match geo.segment(small).location {
            SegLocation::Block(id) => {
                assert_ne!(id, root);
                assert!(set.block(id).is_leaf());
                assert_eq!(set.block(id).segs, vec![small]);
            }
            other => panic!("unexpected location {:?}", other),
        }
    }

    #[test]
    fn test_pop_is_preorder_lifo() {
        let mut geo = Geometry::default();
        let mut set = SuperBlockSet::new();
        let root = set.new_root(BoundingBox::new(0.0, 0.0, 1024.0, 1024.0));
        let deep = seg(&mut geo, 10.0, 10.0, 20.0, 20.0, true);
        let first = seg(&mut geo, 500.0, 10.0, 600.0, 10.0, true);
        let second = seg(&mut geo, 500.0, 20.0, 600.0, 20.0, true);
        for s in [deep, first, second] {
            set.push(root, s, &mut geo);
        }

        assert_eq!(set.pop(root, &mut geo), Some(second));
        assert_eq!(set.pop(root, &mut geo), Some(first));
        assert_eq!(set.pop(root, &mut geo), Some(deep));
        assert_eq!(set.pop(root, &mut geo), None);
        assert!(set.is_empty(root));
        assert_eq!(geo.segment(deep).location, SegLocation::Unassigned);
    }

    #[test]
    fn test_push_into_sub_block_updates_ancestors() {
        let mut geo = Geometry::default();
        let mut set = SuperBlockSet::new();
        let root = set.new_root(BoundingBox::new(0.0, 0.0, 1024.0, 1024.0));
        let a = seg(&mut geo, 10.0, 10.0, 20.0, 20.0, true);
        set.push(root, a, &mut geo);
        let SegLocation::Block(leaf_block) = geo.segment(a).location else {
            panic!("segment not filed");
        };

        let b = seg(&mut geo, 30.0, 30.0, 40.0, 40.0, false);
        set.push(leaf_block, b, &mut geo);
        assert_eq!(set.block(root).real_count, 1);
        assert_eq!(set.block(root).mini_count, 1);

        let all = set.collect_all(root, &mut geo);
        assert_eq!(all.len(), 2);
        assert!(set.is_empty(root));
    }

    #[test]
    fn test_free_recycles_blocks() {
        let mut geo = Geometry::default();
        let mut set = SuperBlockSet::new();
        let root = set.new_root(BoundingBox::new(0.0, 0.0, 1024.0, 1024.0));
        let a = seg(&mut geo, 10.0, 10.0, 20.0, 20.0, true);
        set.push(root, a, &mut geo);
        let bounds = set.find_segment_bounds(root, &geo);
        assert_eq!(bounds, BoundingBox::new(10.0, 10.0, 20.0, 20.0));

        set.collect_all(root, &mut geo);
        let allocated = set.blocks.len();
        set.free(root);
        let again = set.new_root(BoundingBox::new(0.0, 0.0, 256.0, 256.0));
        assert!(again.0 < allocated);
        assert_eq!(set.blocks.len(), allocated);
    }
}

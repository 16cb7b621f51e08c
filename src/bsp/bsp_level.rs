// src/bsp/bsp_level.rs

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::bsp::bsp_leaf::SideSegments;
use crate::bsp::bsp_node::{Leaf, LeafId, MapElement, NodeId, PartitionNode, ReleasedElement, TreeElement};
use crate::bsp::bsp_util::{Partition, Point2D};
use crate::bsp::diagnostics::BuildReport;
use crate::bsp::error::BuildError;
use crate::bsp::model::{Geometry, Line, LineId, LineSide, SectorId, SegId, SegLocation, Segment, SideKind, Vertex, VertexId};
use crate::bsp::partition_cost::choose_partition;
use crate::bsp::superblock::{root_bounds, BlockId, SuperBlockSet};
use crate::bsp::window_effect::detect_window_effects;
use crate::config::BspConfig;
use crate::document::{Document, Side};

/// One node build over a document's current level.
///
/// The session owns every vertex, segment, leaf and node it creates until
/// they are handed out with [`BspLevel::release`].
pub struct BspLevel {
    doc: Arc<Document>,
    config: BspConfig,
    pub(crate) geo: Geometry,
    pub(crate) blocks: SuperBlockSet,
    pub(crate) leaves: Vec<Option<Leaf>>,
    nodes: Vec<Option<PartitionNode>>,
    pub(crate) side_segments: HashMap<(LineId, SideKind), SideSegments>,
    pub(crate) report: BuildReport,
    root: Option<TreeElement>,
    epoch: u32,
    built: bool,
}

impl BspLevel {
    pub fn new(doc: Arc<Document>, config: BspConfig) -> Self {
        BspLevel {
            doc,
            config,
            geo: Geometry::default(),
            blocks: SuperBlockSet::new(),
            leaves: Vec::new(),
            nodes: Vec::new(),
            side_segments: HashMap::new(),
            report: BuildReport::default(),
            root: None,
            epoch: 0,
            built: false,
        }
    }

    /// Builds the tree. Map problems that can be worked around are logged
    /// and collected in [`BspLevel::report`]; anything else aborts the build.
    pub fn build(&mut self) -> Result<(), BuildError> {
        let root_block = self.prepare()?;

        let root = self.build_subtree(root_block)?;
        self.blocks.free(root_block);
        self.root = root;
        if self.root.is_none() {
            return Err(BuildError::EmptyTree);
        }

        self.finish_leaves()?;

        info!(
            "Built nodes: {} nodes, {} leafs, {} segments, {} vertices",
            self.num_nodes(),
            self.num_leafs(),
            self.num_segments(),
            self.num_vertices()
        );
        if !self.report.is_clean() {
            warn!(
                "Build finished with problems: {} unclosed sectors, {} sector mismatches, {} unclosed leafs, {} migrant segments",
                self.report.unclosed_sectors.len(),
                self.report.sector_mismatches.len(),
                self.report.unclosed_leafs.len(),
                self.report.migrant_segments.len()
            );
        }
        Ok(())
    }

    /// Imports the map, creates the initial segments and files them in a
    /// fresh block tree, whose root is returned.
    pub(crate) fn prepare(&mut self) -> Result<BlockId, BuildError> {
        if self.built {
            return Err(BuildError::AlreadyBuilt);
        }
        self.built = true;
        self.config.validate()?;

        self.import_map()?;
        let windows = detect_window_effects(&mut self.geo, &mut self.report);
        self.create_edge_tips();
        let segs = self.create_initial_segments();
        info!(
            "Building nodes for {} lines ({} segments, {} windows, split cost factor {})",
            self.geo.lines.len(),
            segs.len(),
            windows,
            self.config.split_cost_factor
        );

        if segs.is_empty() {
            warn!("Warning: No usable lines, nothing to build");
            return Err(BuildError::EmptyTree);
        }

        let map_bounds = self.geo.segment_bounds(segs.iter().copied());
        let root = self.blocks.new_root(root_bounds(&map_bounds));
        for seg in segs {
            self.blocks.push(root, seg, &mut self.geo);
        }
        Ok(root)
    }

    fn import_map(&mut self) -> Result<(), BuildError> {
        let num_vertices = {
            let vertices = self.doc.vertices();
            let vertices = vertices.read();
            for v in vertices.iter() {
                let (x, y) = v.coords();
                self.geo.add_vertex(Point2D::new(x, y), false);
            }
            vertices.len()
        };

        let num_sidedefs = self.doc.sidedefs().read().len();
        let linedefs = self.doc.linedefs();
        let linedefs = linedefs.read();
        for (index, ld) in linedefs.iter().enumerate() {
            if ld.start >= num_vertices || ld.end >= num_vertices {
                return Err(BuildError::InvalidMapData(format!(
                    "line #{} references missing vertex ({} or {})",
                    index, ld.start, ld.end
                )));
            }

            let side = |present: bool, sidedef: i32, which: Side| -> Result<Option<LineSide>, BuildError> {
                if !present {
                    return Ok(None);
                }
                if sidedef as usize >= num_sidedefs {
                    return Err(BuildError::InvalidMapData(format!(
                        "line #{} references missing sidedef {}",
                        index, sidedef
                    )));
                }
                let sector = self.doc.sector_of_side(ld, which).map(SectorId);
                Ok(Some(LineSide { sidedef: sidedef as usize, sector }))
            };
            let front = side(ld.has_right(), ld.right, Side::Right)?;
            let back = side(ld.has_left(), ld.left, Side::Left)?;

            let self_ref = self.doc.is_self_ref(ld);
            let zero_length = self.doc.is_zero_length(ld);
            if zero_length {
                debug!("Skipping zero-length line #{}", index);
            }

            self.geo.lines.push(Line {
                id: LineId(index),
                from: VertexId(ld.start),
                to: VertexId(ld.end),
                front,
                back,
                self_ref,
                zero_length,
                window_sector: None,
                valid_epoch: 0,
            });
        }
        Ok(())
    }

    /// Records the edge tips of every line at both of its vertices.
    fn create_edge_tips(&mut self) {
        for i in 0..self.geo.lines.len() {
            let line = &self.geo.lines[i];
            if line.zero_length {
                continue;
            }
            let (from, to) = (line.from, line.to);
            let front = line.sector(SideKind::Front);
            let back = line.sector(SideKind::Back);
            let (Some(a), Some(b)) = (self.geo.vertex_pos(from), self.geo.vertex_pos(to)) else {
                continue;
            };
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            self.geo.tips[from.0].add(dx, dy, back, front);
            self.geo.tips[to.0].add(-dx, -dy, front, back);
        }
    }

    fn create_initial_segments(&mut self) -> Vec<SegId> {
        let mut segs = Vec::with_capacity(self.geo.lines.len() * 2);
        for i in 0..self.geo.lines.len() {
            let line = self.geo.lines[i].clone();
            if line.zero_length {
                continue;
            }

            let front = line.front.map(|side| {
                self.geo.add_segment(line.from, line.to, Some(line.id), SideKind::Front, side.sector)
            });
            let back = match (line.back, line.window_sector) {
                (Some(side), _) => Some(side.sector),
                (None, Some(window)) => Some(Some(window)),
                (None, None) => None,
            }
            .map(|sector| self.geo.add_segment(line.to, line.from, Some(line.id), SideKind::Back, sector));

            if let (Some(f), Some(b)) = (front, back) {
                self.geo.link_twins(f, b);
            }
            segs.extend(front);
            segs.extend(back);
        }
        segs
    }

    /// Builds the subtree for the set at `block`. `None` means the set was
    /// empty and nothing was built.
    fn build_subtree(&mut self, block: BlockId) -> Result<Option<TreeElement>, BuildError> {
        self.epoch = self.epoch.wrapping_add(1);
        let choice = choose_partition(&mut self.geo, &self.blocks, block, self.config.split_cost_factor, self.epoch);

        let Some((part_seg, _)) = choice else {
            return Ok(self.make_leaf(block));
        };

        let part = {
            let seg = self.geo.segment(part_seg);
            Partition::through(seg.start, seg.end)
        };
        let bounds = self.blocks.block(block).bounds;
        let right = self.blocks.new_root(bounds);
        let left = self.blocks.new_root(bounds);

        self.divide_segments(part_seg, &part, block, right, left)?;

        let right_bounds = self.blocks.find_segment_bounds(right, &self.geo);
        let left_bounds = self.blocks.find_segment_bounds(left, &self.geo);

        let right_child = self.build_subtree(right)?;
        let left_child = self.build_subtree(left)?;
        self.blocks.free(right);
        self.blocks.free(left);

        Ok(match (right_child, left_child) {
            (Some(right), Some(left)) => {
                let id = NodeId(self.nodes.len());
                self.nodes.push(Some(PartitionNode { id, partition: part, right_bounds, left_bounds, right, left }));
                Some(TreeElement::Node(id))
            }
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        })
    }

    fn make_leaf(&mut self, block: BlockId) -> Option<TreeElement> {
        let segs = self.blocks.collect_all(block, &mut self.geo);
        if segs.is_empty() {
            return None;
        }
        let id = LeafId(self.leaves.len());
        for seg in &segs {
            self.geo.segments[seg.0].location = SegLocation::Leaf(id);
        }
        debug!("New {} with {} segments", id, segs.len());
        self.leaves.push(Some(Leaf::new(id, segs)));
        Some(TreeElement::Leaf(id))
    }

    // --- Accessors ---

    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    pub fn config(&self) -> &BspConfig {
        &self.config
    }

    pub fn root(&self) -> Option<TreeElement> {
        self.root
    }

    pub fn leaf(&self, id: LeafId) -> Option<&Leaf> {
        self.leaves.get(id.0).and_then(|l| l.as_ref())
    }

    pub fn node(&self, id: NodeId) -> Option<&PartitionNode> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    pub fn segment(&self, id: SegId) -> Option<&Segment> {
        self.geo.segments.get(id.0)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.geo.lines.get(id.0)
    }

    /// Vertex by its 1-based creation index.
    pub fn vertex_at(&self, index: usize) -> Option<&Vertex> {
        self.geo.vertices.get(index.checked_sub(1)?)?.as_ref()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_leafs(&self) -> usize {
        self.leaves.len()
    }

    pub fn num_segments(&self) -> usize {
        self.geo.segments.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.geo.vertices.len()
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Outermost segments of a linedef side, if the side made it into a leaf.
    pub fn side_segments(&self, line: LineId, side: SideKind) -> Option<SideSegments> {
        self.side_segments.get(&(line, side)).copied()
    }

    /// The ring of `leaf`, following `next` links from its first segment.
    pub fn ring(&self, leaf: LeafId) -> Vec<SegId> {
        let Some(first) = self.leaf(leaf).and_then(|l| l.first_segment()) else {
            return Vec::new();
        };
        let mut out = vec![first];
        let mut cur = first;
        while let Some(next) = self.geo.segments[cur.0].next {
            if next == first || out.len() > self.geo.segments.len() {
                break;
            }
            out.push(next);
            cur = next;
        }
        out
    }

    /// Sector of the leaf containing `point`, walking down from the root.
    pub fn sector_at(&self, point: Point2D) -> Option<SectorId> {
        let mut cur = self.root?;
        loop {
            match cur {
                TreeElement::Leaf(id) => return self.leaf(id)?.sector,
                TreeElement::Node(id) => {
                    let node = self.node(id)?;
                    cur = node.child(node.partition.classify_point(&point) >= 0.0);
                }
            }
        }
    }

    /// Hands `element` over to the caller. Releasing something the session
    /// no longer owns is reported and otherwise ignored.
    pub fn release(&mut self, element: MapElement) -> Option<ReleasedElement> {
        let released = match element {
            MapElement::Leaf(id) => self.leaves.get_mut(id.0).and_then(Option::take).map(ReleasedElement::Leaf),
            MapElement::Node(id) => self.nodes.get_mut(id.0).and_then(Option::take).map(ReleasedElement::Node),
            MapElement::Vertex(id) => self.geo.vertices.get_mut(id.0).and_then(Option::take).map(ReleasedElement::Vertex),
        };
        if released.is_none() {
            warn!("Warning: Release of {:?} which is not owned by this build", element);
            self.report.not_owned_releases += 1;
        }
        released
    }
}

impl Drop for BspLevel {
    fn drop(&mut self) {
        debug!(
            "Destroying build session ({} leafs, {} nodes, {} vertices not released)",
            self.leaves.iter().flatten().count(),
            self.nodes.iter().flatten().count(),
            self.geo.vertices.iter().flatten().count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::bsp_util::BoundingBox;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Map builder sharing vertices by position.
    struct Sketch {
        doc: Document,
        verts: HashMap<(i32, i32), usize>,
    }

    impl Sketch {
        fn new() -> Self {
            Sketch { doc: Document::new(), verts: HashMap::new() }
        }

        fn sector(&mut self) -> usize {
            self.doc.add_sector(0, 128)
        }

        fn vertex(&mut self, x: i32, y: i32) -> usize {
            if let Some(&v) = self.verts.get(&(x, y)) {
                return v;
            }
            let v = self.doc.add_vertex(x, y);
            self.verts.insert((x, y), v);
            v
        }

        fn line(&mut self, a: (i32, i32), b: (i32, i32), front: Option<usize>, back: Option<usize>) -> usize {
            let a = self.vertex(a.0, a.1);
            let b = self.vertex(b.0, b.1);
            self.doc.add_linedef(a, b, front, back)
        }

        /// Closed room, walls facing inwards.
        fn room(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, sector: usize) {
            self.line((x1, y1), (x1, y2), Some(sector), None);
            self.line((x1, y2), (x2, y2), Some(sector), None);
            self.line((x2, y2), (x2, y1), Some(sector), None);
            self.line((x2, y1), (x1, y1), Some(sector), None);
        }

        /// Solid block inside a room, walls facing outwards.
        fn pillar(&mut self, points: &[(i32, i32)], sector: usize) {
            for i in 0..points.len() {
                self.line(points[i], points[(i + 1) % points.len()], Some(sector), None);
            }
        }

        fn level(self, factor: u32) -> BspLevel {
            BspLevel::new(Arc::new(self.doc), BspConfig::with_split_cost_factor(factor))
        }
    }

    fn assert_valid_tree(level: &BspLevel) {
        let mut filed = 0;
        for i in 0..level.num_leafs() {
            let leaf = level.leaf(LeafId(i)).unwrap();
            let ring = level.ring(leaf.id);
            assert_eq!(ring.len(), leaf.len(), "ring of {} is not closed", leaf.id);
            assert!(leaf.sector.is_some());

            let mut cur = leaf.first_segment().unwrap();
            for _ in 0..ring.len() {
                let seg = level.segment(cur).unwrap();
                let next = level.segment(seg.next.unwrap()).unwrap();
                assert_eq!(seg.end, next.start, "gap after {} in {}", seg.id, leaf.id);
                assert_eq!(next.prev, Some(seg.id));
                cur = next.id;
            }
            assert_eq!(cur, leaf.first_segment().unwrap());
            filed += leaf.len();
        }
        assert_eq!(filed, level.num_segments());

        for id in 0..level.num_segments() {
            let seg = level.segment(SegId(id)).unwrap();
            if let Some(twin) = seg.twin {
                let twin = level.segment(twin).unwrap();
                assert_eq!(twin.twin, Some(seg.id));
                assert_eq!(twin.start, seg.end);
                assert_eq!(twin.end, seg.start);
            }
        }
    }

    #[test]
    fn test_single_room_is_one_leaf() {
        init_logger();
        let mut map = Sketch::new();
        let a = map.sector();
        map.room(0, 0, 64, 64, a);
        let mut level = map.level(7);

        level.build().unwrap();
        assert_eq!(level.num_leafs(), 1);
        assert_eq!(level.num_nodes(), 0);
        assert_eq!(level.root(), Some(TreeElement::Leaf(LeafId(0))));
        assert_eq!(level.leaf(LeafId(0)).unwrap().sector, Some(SectorId(a)));
        assert_eq!(level.leaf(LeafId(0)).unwrap().bounds, BoundingBox::new(0.0, 0.0, 64.0, 64.0));
        assert!(level.report().is_clean());
        assert_valid_tree(&level);
    }

    #[test]
    fn test_diagonal_splits_room_once() {
        init_logger();
        let mut map = Sketch::new();
        let upper = map.sector();
        let lower = map.sector();
        map.line((0, 0), (0, 64), Some(upper), None);
        map.line((0, 64), (64, 64), Some(upper), None);
        map.line((64, 64), (64, 0), Some(lower), None);
        map.line((64, 0), (0, 0), Some(lower), None);
        let diagonal = map.line((0, 0), (64, 64), Some(lower), Some(upper));
        let mut level = map.level(7);

        level.build().unwrap();
        assert_eq!(level.num_nodes(), 1);
        assert_eq!(level.num_leafs(), 2);
        let sectors: Vec<_> = (0..2).map(|i| level.leaf(LeafId(i)).unwrap().sector).collect();
        assert!(sectors.contains(&Some(SectorId(upper))));
        assert!(sectors.contains(&Some(SectorId(lower))));

        let TreeElement::Node(root) = level.root().unwrap() else {
            panic!("root should be a node");
        };
        let node = level.node(root).unwrap();
        assert_approx_eq!(node.partition.dx, 64.0);
        assert_approx_eq!(node.partition.dy, 64.0);
        assert!(level.side_segments(LineId(diagonal), SideKind::Front).is_some());
        assert!(level.side_segments(LineId(diagonal), SideKind::Back).is_some());
        assert_eq!(level.sector_at(Point2D::new(48.0, 8.0)), Some(SectorId(lower)));
        assert_eq!(level.sector_at(Point2D::new(8.0, 48.0)), Some(SectorId(upper)));
        assert_valid_tree(&level);
    }

    #[test]
    fn test_pillar_room_splits_walls() {
        init_logger();
        let mut map = Sketch::new();
        let room = map.sector();
        map.room(0, 0, 256, 256, room);
        map.pillar(&[(128, 64), (192, 128), (128, 192), (64, 128)], room);
        let mut level = map.level(7);

        level.build().unwrap();
        assert!(level.num_leafs() > 1);
        assert!(level.num_vertices() > 8, "expected split vertices");
        assert!(level.vertex_at(level.num_vertices()).unwrap().synthetic);
        assert!(!level.vertex_at(1).unwrap().synthetic);
        assert!(level.vertex_at(0).is_none());
        for i in 0..level.num_leafs() {
            assert_eq!(level.leaf(LeafId(i)).unwrap().sector, Some(SectorId(room)));
        }
        assert!(level.report().migrant_segments.is_empty());
        assert!(level.report().unclosed_leafs.is_empty());
        assert_valid_tree(&level);
    }

    #[test]
    fn test_random_grids_build_valid_trees() {
        init_logger();
        const SIZE: usize = 6;
        const CELL: i32 = 64;

        for seed in 0..12u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            // None is solid space.
            let mut cells = [[None; SIZE]; SIZE];
            let mut map = Sketch::new();
            let sectors: Vec<usize> = (0..3).map(|_| map.sector()).collect();
            for (i, row) in cells.iter_mut().enumerate() {
                for (j, cell) in row.iter_mut().enumerate() {
                    if (i, j) == (0, 0) || rng.random_range(0..4) > 0 {
                        *cell = Some(sectors[rng.random_range(0..sectors.len())]);
                    }
                }
            }
            let at = |i: isize, j: isize| -> Option<usize> {
                if i < 0 || j < 0 || i >= SIZE as isize || j >= SIZE as isize {
                    None
                } else {
                    cells[i as usize][j as usize]
                }
            };

            // Lines run so that the front faces the sector passed first.
            for i in 0..=SIZE as isize {
                for j in 0..=SIZE as isize {
                    let (x, y) = (i as i32 * CELL, j as i32 * CELL);
                    if j < SIZE as isize {
                        // Vertical edge at x between (i-1, j) and (i, j).
                        let (west, east) = (at(i - 1, j), at(i, j));
                        match (west, east) {
                            (Some(w), Some(e)) if w != e => {
                                map.line((x, y), (x, y + CELL), Some(e), Some(w));
                            }
                            (None, Some(e)) => {
                                map.line((x, y), (x, y + CELL), Some(e), None);
                            }
                            (Some(w), None) => {
                                map.line((x, y + CELL), (x, y), Some(w), None);
                            }
                            _ => {}
                        }
                    }
                    if i < SIZE as isize {
                        let (south, north) = (at(i, j - 1), at(i, j));
                        // Horizontal edge at y between (i, j-1) and (i, j).
                        match (south, north) {
                            (Some(s), Some(n)) if s != n => {
                                map.line((x, y), (x + CELL, y), Some(s), Some(n));
                            }
                            (Some(s), None) => {
                                map.line((x, y), (x + CELL, y), Some(s), None);
                            }
                            (None, Some(n)) => {
                                map.line((x + CELL, y), (x, y), Some(n), None);
                            }
                            _ => {}
                        }
                    }
                }
            }

            let mut level = map.level(7);
            level.build().unwrap_or_else(|e| panic!("seed {}: {}", seed, e));
            assert!(level.num_leafs() >= 1);
            assert!(level.report().window_effects.is_empty(), "seed {}", seed);
            assert!(level.report().unclosed_leafs.is_empty(), "seed {}", seed);
            assert_valid_tree(&level);

            for (i, row) in cells.iter().enumerate() {
                for (j, cell) in row.iter().enumerate() {
                    if let Some(sector) = cell {
                        let centre = Point2D::new((i as f64 + 0.5) * 64.0, (j as f64 + 0.5) * 64.0);
                        assert_eq!(level.sector_at(centre), Some(SectorId(*sector)), "seed {} cell {:?}", seed, (i, j));
                    }
                }
            }
        }
    }

    #[test]
    fn test_window_line_closes_sector() {
        init_logger();
        let mut map = Sketch::new();
        let south = map.sector();
        let north = map.sector();
        map.line((0, 0), (0, 128), Some(south), None);
        map.line((256, 128), (256, 0), Some(south), None);
        map.line((256, 0), (0, 0), Some(south), None);
        map.line((0, 128), (0, 256), Some(north), None);
        map.line((0, 256), (256, 256), Some(north), None);
        map.line((256, 256), (256, 128), Some(north), None);
        map.line((0, 128), (64, 128), Some(south), Some(north));
        let window = LineId(map.line((64, 128), (256, 128), Some(south), None));
        let mut level = map.level(7);

        level.build().unwrap();
        assert_eq!(level.line(window).unwrap().window_sector, Some(SectorId(north)));
        assert_eq!(level.report().window_effects, vec![(window, SectorId(north))]);
        assert!(level.side_segments(window, SideKind::Back).is_some());
        assert_eq!(level.sector_at(Point2D::new(160.0, 200.0)), Some(SectorId(north)));
        assert_eq!(level.sector_at(Point2D::new(160.0, 60.0)), Some(SectorId(south)));
        assert_valid_tree(&level);
    }

    #[test]
    fn test_unclosed_sector_is_reported_at_gap() {
        init_logger();
        let mut map = Sketch::new();
        let open = map.sector();
        let closed = map.sector();
        // Room missing its east wall, with a pillar.
        map.line((0, 0), (0, 128), Some(open), None);
        map.line((0, 128), (128, 128), Some(open), None);
        map.line((128, 0), (0, 0), Some(open), None);
        map.pillar(&[(32, 32), (64, 32), (64, 64), (32, 64)], open);
        let pillar_top = LineId(5);
        map.room(192, 0, 320, 128, closed);
        let mut level = map.level(7);

        let root = level.prepare().unwrap();
        let part_seg = (0..level.num_segments())
            .map(SegId)
            .find(|s| level.segment(*s).unwrap().line == Some(pillar_top))
            .unwrap();
        let part = {
            let seg = level.segment(part_seg).unwrap();
            assert_eq!(seg.start, Point2D::new(64.0, 64.0));
            Partition::through(seg.start, seg.end)
        };
        let bounds = level.blocks.block(root).bounds;
        let right = level.blocks.new_root(bounds);
        let left = level.blocks.new_root(bounds);
        level.divide_segments(part_seg, &part, root, right, left).unwrap();

        let unclosed = &level.report().unclosed_sectors;
        assert_eq!(unclosed.len(), 1);
        assert_eq!(unclosed[0].sector, SectorId(open));
        assert_eq!(unclosed[0].at, Point2D::new(128.0, 64.0));
        // Open gaps inside the closed room and west of the pillar are
        // bridged by mini segment pairs.
        let minis: Vec<_> = level.geo.segments.iter().filter(|s| s.is_mini()).collect();
        assert_eq!(minis.len(), 4);
        assert_eq!(minis.iter().filter(|s| s.sector == Some(SectorId(closed))).count(), 2);
        assert_eq!(minis.iter().filter(|s| s.sector == Some(SectorId(open))).count(), 2);
    }

    /// A 256 x 128 room whose west half faces `west` and east half faces
    /// `east`, with no line between them.
    fn open_boundary(map: &mut Sketch, west: usize, east: usize) {
        map.line((0, 0), (0, 128), Some(west), None);
        map.line((0, 128), (128, 128), Some(west), None);
        map.line((128, 128), (256, 128), Some(east), None);
        map.line((256, 128), (256, 0), Some(east), None);
        map.line((256, 0), (128, 0), Some(east), None);
        map.line((128, 0), (0, 0), Some(west), None);
    }

    #[test]
    fn test_open_boundary_reports_migrants() {
        init_logger();
        let mut map = Sketch::new();
        let west = map.sector();
        let east = map.sector();
        open_boundary(&mut map, west, east);
        let mut level = map.level(7);

        level.build().unwrap();
        assert_eq!(level.num_leafs(), 1);
        // The ring starts with the south-east wall, which decides the sector.
        let leaf = level.leaf(LeafId(0)).unwrap();
        assert_eq!(leaf.sector, Some(SectorId(east)));

        let migrants = &level.report().migrant_segments;
        assert_eq!(migrants.len(), 3);
        for m in migrants {
            assert_eq!(m.leaf, LeafId(0));
            assert_eq!(m.segment_sector, Some(SectorId(west)));
            assert_eq!(m.leaf_sector, Some(SectorId(east)));
            assert_eq!(level.segment(m.segment).unwrap().sector, Some(SectorId(west)));
        }
        assert!(!level.report().is_clean());
        assert_valid_tree(&level);
    }

    #[test]
    fn test_sector_mismatch_is_reported_at_gap() {
        init_logger();
        let mut map = Sketch::new();
        let west = map.sector();
        let east = map.sector();
        open_boundary(&mut map, west, east);
        map.pillar(&[(32, 32), (64, 32), (64, 64), (32, 64)], west);
        let pillar_top = LineId(8);
        let mut level = map.level(7);

        let root = level.prepare().unwrap();
        let part_seg = (0..level.num_segments())
            .map(SegId)
            .find(|s| level.segment(*s).unwrap().line == Some(pillar_top))
            .unwrap();
        let part = {
            let seg = level.segment(part_seg).unwrap();
            assert_eq!(seg.start, Point2D::new(64.0, 64.0));
            Partition::through(seg.start, seg.end)
        };
        let bounds = level.blocks.block(root).bounds;
        let right = level.blocks.new_root(bounds);
        let left = level.blocks.new_root(bounds);
        level.divide_segments(part_seg, &part, root, right, left).unwrap();

        let report = level.report();
        assert!(report.unclosed_sectors.is_empty());
        assert_eq!(report.sector_mismatches.len(), 1);
        let mismatch = report.sector_mismatches[0];
        assert_eq!((mismatch.first, mismatch.second), (SectorId(east), SectorId(west)));
        assert_eq!(mismatch.at, Point2D::new(160.0, 64.0));

        // The mismatched gap takes the first sector.
        let minis: Vec<_> = level.geo.segments.iter().filter(|s| s.is_mini()).collect();
        assert_eq!(minis.len(), 4);
        assert_eq!(minis.iter().filter(|s| s.sector == Some(SectorId(east))).count(), 2);
        assert_eq!(minis.iter().filter(|s| s.sector == Some(SectorId(west))).count(), 2);
    }

    #[test]
    fn test_partition_along_outer_wall_leaves_empty_subset() {
        let mut map = Sketch::new();
        let a = map.sector();
        map.room(0, 0, 64, 64, a);
        let mut level = map.level(7);

        let root = level.prepare().unwrap();
        let west_wall = SegId(0);
        let part = {
            let seg = level.segment(west_wall).unwrap();
            Partition::through(seg.start, seg.end)
        };
        let bounds = level.blocks.block(root).bounds;
        let right = level.blocks.new_root(bounds);
        let left = level.blocks.new_root(bounds);
        let result = level.divide_segments(west_wall, &part, root, right, left);
        assert!(matches!(
            result,
            Err(BuildError::EmptySubset { side: "left", partition }) if partition == west_wall
        ));
    }

    #[test]
    fn test_import_flags_lines() {
        let mut map = Sketch::new();
        let a = map.sector();
        map.room(-32, -32, 96, 96, a);
        let inner = map.line((0, 0), (64, 64), Some(a), Some(a));
        let v = map.vertex(16, 48);
        let dot = map.doc.add_linedef(v, v, Some(a), None);
        let mut level = map.level(7);

        level.prepare().unwrap();
        assert_eq!(level.vertex_at(1).unwrap().pos, Point2D::new(-32.0, -32.0));
        let inner = level.line(LineId(inner)).unwrap();
        assert!(inner.self_ref && !inner.zero_length && inner.is_two_sided());
        let dot = level.line(LineId(dot)).unwrap();
        assert!(dot.zero_length && !dot.self_ref && dot.is_one_sided());
        assert!(!level.line(LineId(0)).unwrap().self_ref);
        // Zero-length lines get no segments.
        assert!((0..level.num_segments()).all(|s| level.segment(SegId(s)).unwrap().line != Some(LineId(dot.id.0))));
    }

    #[test]
    fn test_cost_factor_never_trades_for_more_splits() {
        init_logger();
        let mut map = Sketch::new();
        let room = map.sector();
        map.room(0, 0, 512, 512, room);
        map.pillar(&[(64, 64), (128, 64), (128, 128), (64, 128)], room);
        map.pillar(&[(320, 64), (448, 64), (448, 192), (320, 192)], room);
        map.pillar(&[(192, 320), (256, 320), (256, 448), (192, 448)], room);
        let mut level = map.level(1);
        let root = level.prepare().unwrap();

        let mut last_splits = usize::MAX;
        for factor in 1..=16u32 {
            let (_, cost) = choose_partition(&mut level.geo, &level.blocks, root, factor, factor).unwrap();
            assert_eq!(cost.near_miss, 0);
            assert!(cost.splits <= last_splits, "factor {} chose {} splits after {}", factor, cost.splits, last_splits);
            last_splits = cost.splits;
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        init_logger();
        let sketch = || {
            let mut map = Sketch::new();
            let room = map.sector();
            map.room(0, 0, 256, 256, room);
            map.pillar(&[(128, 64), (192, 128), (128, 192), (64, 128)], room);
            map.level(7)
        };
        let mut first = sketch();
        let mut second = sketch();
        first.build().unwrap();
        second.build().unwrap();

        assert_eq!(first.num_leafs(), second.num_leafs());
        assert_eq!(first.num_segments(), second.num_segments());
        for i in 0..first.num_leafs() {
            let a: Vec<_> = first.ring(LeafId(i)).iter().map(|s| first.segment(*s).unwrap().start).collect();
            let b: Vec<_> = second.ring(LeafId(i)).iter().map(|s| second.segment(*s).unwrap().start).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_release_twice_is_reported() {
        init_logger();
        let mut map = Sketch::new();
        let a = map.sector();
        map.room(0, 0, 64, 64, a);
        let mut level = map.level(7);
        level.build().unwrap();

        let leaf = level.release(MapElement::Leaf(LeafId(0)));
        assert!(matches!(leaf, Some(ReleasedElement::Leaf(ref l)) if l.sector == Some(SectorId(a))));
        assert!(level.leaf(LeafId(0)).is_none());
        assert!(level.release(MapElement::Leaf(LeafId(0))).is_none());
        assert_eq!(level.report().not_owned_releases, 1);

        assert!(matches!(level.release(MapElement::Vertex(VertexId(0))), Some(ReleasedElement::Vertex(_))));
        assert!(level.vertex_at(1).is_none());
        assert!(level.release(MapElement::Node(NodeId(0))).is_none());
        assert_eq!(level.report().not_owned_releases, 2);
        // Counts are running totals.
        assert_eq!(level.num_leafs(), 1);
    }

    #[test]
    fn test_zero_length_lines_build_nothing() {
        init_logger();
        let mut map = Sketch::new();
        let a = map.sector();
        let v = map.vertex(16, 16);
        map.doc.add_linedef(v, v, Some(a), None);
        map.doc.add_linedef(v, v, Some(a), Some(a));
        let mut level = map.level(7);

        assert!(matches!(level.build(), Err(BuildError::EmptyTree)));
        assert_eq!(level.num_leafs(), 0);
        assert!(level.root().is_none());
    }

    #[test]
    fn test_second_build_is_rejected() {
        let mut map = Sketch::new();
        let a = map.sector();
        map.room(0, 0, 64, 64, a);
        let mut level = map.level(7);
        level.build().unwrap();
        assert!(matches!(level.build(), Err(BuildError::AlreadyBuilt)));
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let mut map = Sketch::new();
        let a = map.sector();
        map.room(0, 0, 64, 64, a);
        map.doc.add_linedef(0, 99, Some(a), None);
        let mut level = map.level(7);
        assert!(matches!(level.build(), Err(BuildError::InvalidMapData(_))));

        let mut map = Sketch::new();
        let a = map.sector();
        map.room(0, 0, 64, 64, a);
        let mut level = map.level(0);
        assert!(matches!(level.build(), Err(BuildError::InvalidConfig(_))));
    }
}

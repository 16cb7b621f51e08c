// src/bsp/divider.rs
// Splits a segment set along a partition and closes the gaps along the
// partition line with mini segments.

use log::debug;

use crate::bsp::bsp_level::BspLevel;
use crate::bsp::bsp_util::{Partition, Point2D};
use crate::bsp::error::BuildError;
use crate::bsp::model::{Geometry, LineId, SectorId, SegId, SegLocation, SideKind, VertexId};
use crate::bsp::superblock::BlockId;
use crate::bsp::{LineRelationship, DIST_EPSILON};

/// A vertex lying on the partition line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Intercept {
    pub vertex: VertexId,
    /// Distance along the partition from its origin.
    pub para: f64,
    pub self_ref: bool,
    /// Sector open just before the vertex, looking back along the partition.
    pub before: Option<SectorId>,
    /// Sector open just after the vertex, looking along the partition.
    pub after: Option<SectorId>,
}

/// Intercepts of one division, kept sorted by `para`.
#[derive(Debug, Default)]
pub(crate) struct InterceptList {
    items: Vec<Intercept>,
}

impl InterceptList {
    pub fn iter(&self) -> impl Iterator<Item = &Intercept> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Adds `vertex` unless it is already present. Equal distances keep
    /// insertion order.
    pub fn add(&mut self, geo: &Geometry, vertex: VertexId, part: &Partition, self_ref: bool) -> Result<(), BuildError> {
        if self.items.iter().any(|i| i.vertex == vertex) {
            return Ok(());
        }
        let tips = geo.tips.get(vertex.0).filter(|t| !t.is_empty()).ok_or(BuildError::MissingEdgeTips(vertex))?;
        let pos = geo.vertex_pos(vertex).ok_or(BuildError::MissingEdgeTips(vertex))?;

        let cut = Intercept {
            vertex,
            para: part.para_dist(&pos),
            self_ref,
            before: tips.open_sector_at(-part.dx, -part.dy),
            after: tips.open_sector_at(part.dx, part.dy),
        };
        let at = self.items.iter().position(|i| i.para > cut.para).unwrap_or(self.items.len());
        self.items.insert(at, cut);
        Ok(())
    }

    /// Folds intercepts closer than `DIST_EPSILON` into the earlier one.
    pub fn merge_close(&mut self) {
        let mut i = 0;
        while i + 1 < self.items.len() {
            if self.items[i + 1].para - self.items[i].para > DIST_EPSILON {
                i += 1;
                continue;
            }
            let next = self.items.remove(i + 1);
            let cur = &mut self.items[i];
            if cur.self_ref && !next.self_ref {
                if cur.before.is_some() && next.before.is_some() {
                    cur.before = next.before;
                }
                if cur.after.is_some() && next.after.is_some() {
                    cur.after = next.after;
                }
                cur.self_ref = false;
            }
            if cur.before.is_none() {
                cur.before = next.before;
            }
            if cur.after.is_none() {
                cur.after = next.after;
            }
        }
    }
}

impl BspLevel {
    /// Empties the set at `src` into `right` and `left`, splitting crossing
    /// segments, then adds mini segments along the partition.
    pub(crate) fn divide_segments(
        &mut self,
        part_seg: SegId,
        part: &Partition,
        src: BlockId,
        right: BlockId,
        left: BlockId,
    ) -> Result<(), BuildError> {
        let part_line = self.geo.segment(part_seg).line;
        let mut cuts = InterceptList::default();

        while let Some(seg) = self.blocks.pop(src, &mut self.geo) {
            self.divide_one(seg, part, part_line, right, left, &mut cuts)?;
        }

        if self.blocks.is_empty(right) {
            return Err(BuildError::EmptySubset { side: "right", partition: part_seg });
        }
        if self.blocks.is_empty(left) {
            return Err(BuildError::EmptySubset { side: "left", partition: part_seg });
        }

        self.add_minisegs(part, &mut cuts, right, left);
        Ok(())
    }

    fn divide_one(
        &mut self,
        seg: SegId,
        part: &Partition,
        part_line: Option<LineId>,
        right: BlockId,
        left: BlockId,
        cuts: &mut InterceptList,
    ) -> Result<(), BuildError> {
        let (start, end, from, to, line, dot) = {
            let s = self.geo.segment(seg);
            (s.start, s.end, s.from, s.to, s.line, s.dx() * part.dx + s.dy() * part.dy)
        };
        let self_ref = self.geo.is_self_ref(seg);

        let (rel, a, b) = if part_line.is_some() && line == part_line {
            (LineRelationship::Collinear, 0.0, 0.0)
        } else {
            part.relationship(&start, &end)
        };

        match rel {
            LineRelationship::Collinear => {
                cuts.add(&self.geo, from, part, self_ref)?;
                cuts.add(&self.geo, to, part, self_ref)?;
                let target = if dot < 0.0 { left } else { right };
                self.blocks.push(target, seg, &mut self.geo);
            }
            LineRelationship::Right | LineRelationship::RightIntercept => {
                if a < DIST_EPSILON {
                    cuts.add(&self.geo, from, part, self_ref)?;
                } else if b < DIST_EPSILON {
                    cuts.add(&self.geo, to, part, self_ref)?;
                }
                self.blocks.push(right, seg, &mut self.geo);
            }
            LineRelationship::Left | LineRelationship::LeftIntercept => {
                if a > -DIST_EPSILON {
                    cuts.add(&self.geo, from, part, self_ref)?;
                } else if b > -DIST_EPSILON {
                    cuts.add(&self.geo, to, part, self_ref)?;
                }
                self.blocks.push(left, seg, &mut self.geo);
            }
            LineRelationship::Intersects => {
                let point = part.intersect(&start, &end, a, b);
                let new_seg = self.split_segment(seg, point)?;
                let vertex = self.geo.segment(seg).to;
                cuts.add(&self.geo, vertex, part, self_ref)?;
                if a < 0.0 {
                    self.blocks.push(left, seg, &mut self.geo);
                    self.blocks.push(right, new_seg, &mut self.geo);
                } else {
                    self.blocks.push(right, seg, &mut self.geo);
                    self.blocks.push(left, new_seg, &mut self.geo);
                }
            }
        }
        Ok(())
    }

    /// Splits `seg` (and its twin) at `point`. The new twin half joins
    /// whatever set or leaf currently holds the twin.
    fn split_segment(&mut self, seg: SegId, point: Point2D) -> Result<SegId, BuildError> {
        let twin_home = match self.geo.segment(seg).twin {
            None => None,
            Some(twin) => match self.geo.segment(twin).location {
                SegLocation::Unassigned => return Err(BuildError::OrphanSegment(twin)),
                location => Some(location),
            },
        };

        let (new_seg, new_twin) = self.geo.split_segment(seg, point);
        debug!("Split {} at ({:.3}, {:.3}) giving {}", seg, point.x, point.y, new_seg);

        if let (Some(half), Some(home)) = (new_twin, twin_home) {
            match home {
                SegLocation::Block(block) => self.blocks.push(block, half, &mut self.geo),
                SegLocation::Leaf(leaf_id) => {
                    if let Some(leaf) = self.leaves.get_mut(leaf_id.0).and_then(|l| l.as_mut()) {
                        leaf.segments.push(half);
                    }
                    self.geo.segments[half.0].location = SegLocation::Leaf(leaf_id);
                }
                SegLocation::Unassigned => {}
            }
        }
        Ok(new_seg)
    }

    /// Walks adjacent intercepts and bridges every open gap with a pair of
    /// mini segments.
    fn add_minisegs(&mut self, part: &Partition, cuts: &mut InterceptList, right: BlockId, left: BlockId) {
        cuts.merge_close();

        let items: Vec<Intercept> = cuts.iter().cloned().collect();
        for pair in items.windows(2) {
            let (cur, next) = (&pair[0], &pair[1]);
            let midpoint = || {
                let a = self.geo.vertex_pos(cur.vertex).unwrap_or_default();
                let b = self.geo.vertex_pos(next.vertex).unwrap_or_default();
                a.midpoint(&b)
            };

            let sector = match (cur.after, next.before) {
                (None, None) => continue,
                (Some(open), None) => {
                    if !cur.self_ref {
                        let at = midpoint();
                        self.report.unclosed_sector(open, at);
                    }
                    continue;
                }
                (None, Some(open)) => {
                    if !next.self_ref {
                        let at = midpoint();
                        self.report.unclosed_sector(open, at);
                    }
                    continue;
                }
                (Some(after), Some(before)) if after != before => {
                    if !cur.self_ref && !next.self_ref {
                        let at = midpoint();
                        self.report.sector_mismatch(after, before, at);
                    }
                    if cur.self_ref && !next.self_ref {
                        before
                    } else {
                        after
                    }
                }
                (Some(after), Some(_)) => after,
            };

            let seg = self.geo.add_segment(cur.vertex, next.vertex, None, SideKind::Front, Some(sector));
            let buddy = self.geo.add_segment(next.vertex, cur.vertex, None, SideKind::Front, Some(sector));
            self.geo.link_twins(seg, buddy);
            self.blocks.push(right, seg, &mut self.geo);
            self.blocks.push(left, buddy, &mut self.geo);
        }
        debug!("Partition along ({}, {}) had {} intercepts", part.dx, part.dy, cuts.len());
    }
}

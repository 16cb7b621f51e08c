// src/bsp/bsp_leaf.rs
// Leaf finishing: winding the segment ring and resolving the sector.

use crate::bsp::bsp_level::BspLevel;
use crate::bsp::bsp_node::LeafId;
use crate::bsp::bsp_util::{compute_angle, Point2D};
use crate::bsp::diagnostics::MigrantSegment;
use crate::bsp::error::BuildError;
use crate::bsp::model::{Geometry, LineId, SectorId, SegId, SideKind};
use crate::bsp::ANG_EPSILON;

/// The outermost segments of one linedef side, found in the first leaf the
/// side appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideSegments {
    pub leftmost: SegId,
    pub rightmost: SegId,
}

/// Orders `segs` clockwise around the mean of their endpoints: descending
/// angle of each start point, ties keep their order.
pub(crate) fn clockwise_order(geo: &Geometry, segs: &mut [SegId]) {
    if segs.is_empty() {
        return;
    }
    let mut sum = Point2D::default();
    for id in segs.iter() {
        let seg = geo.segment(*id);
        sum.x += seg.start.x + seg.end.x;
        sum.y += seg.start.y + seg.end.y;
    }
    let total = (segs.len() * 2) as f64;
    let mid = Point2D::new(sum.x / total, sum.y / total);

    let mut keyed: Vec<(f64, SegId)> = segs
        .iter()
        .map(|id| {
            let start = geo.segment(*id).start;
            (compute_angle(start.x - mid.x, start.y - mid.y), *id)
        })
        .collect();

    // Gnome sort: a comparator with a tolerance is not a total order.
    let mut i = 0;
    while i + 1 < keyed.len() {
        if keyed[i].0 + ANG_EPSILON < keyed[i + 1].0 {
            keyed.swap(i, i + 1);
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }

    for (slot, (_, id)) in segs.iter_mut().zip(keyed) {
        *slot = id;
    }
}

/// Picks the sector of a leaf from its ring.
fn resolve_sector(geo: &Geometry, ring: &[SegId]) -> Option<SectorId> {
    let line_backed = || ring.iter().map(|id| geo.segment(*id)).filter(|s| !s.is_mini());
    line_backed()
        .find(|s| s.sector.is_some() && !geo.is_self_ref(s.id))
        .or_else(|| line_backed().find(|s| s.sector.is_some()))
        .or_else(|| ring.iter().map(|id| geo.segment(*id)).find(|s| s.sector.is_some()))
        .and_then(|s| s.sector)
}

impl BspLevel {
    /// Winds and checks every leaf. Runs once the whole tree is built, so
    /// twin halves added to a leaf by later splits are part of its ring.
    pub(crate) fn finish_leaves(&mut self) -> Result<(), BuildError> {
        for index in 0..self.leaves.len() {
            self.finish_leaf(LeafId(index))?;
        }
        Ok(())
    }

    fn finish_leaf(&mut self, id: LeafId) -> Result<(), BuildError> {
        let Some(mut ring) = self.leaves[id.0].as_ref().map(|l| l.segments.clone()) else {
            return Ok(());
        };
        clockwise_order(&self.geo, &mut ring);

        let len = ring.len();
        for (i, seg) in ring.iter().enumerate() {
            let next = ring[(i + 1) % len];
            let prev = ring[(i + len - 1) % len];
            let s = &mut self.geo.segments[seg.0];
            s.next = Some(next);
            s.prev = Some(prev);
        }

        self.record_side_segments(&ring);

        if ring.iter().all(|s| self.geo.segment(*s).is_mini()) {
            return Err(BuildError::LeafWithoutLineSegments(id));
        }

        let sector = resolve_sector(&self.geo, &ring).ok_or(BuildError::LeafWithoutSector(id))?;

        for seg in ring.iter().map(|s| self.geo.segment(*s)) {
            if !seg.is_mini() && seg.sector != Some(sector) {
                self.report.migrant_segment(MigrantSegment {
                    segment: seg.id,
                    leaf: id,
                    segment_sector: seg.sector,
                    leaf_sector: Some(sector),
                });
            }
        }

        for (i, seg) in ring.iter().enumerate() {
            let next = ring[(i + 1) % len];
            if self.geo.segment(*seg).end != self.geo.segment(next).start {
                self.report.unclosed_leaf(id);
                break;
            }
        }

        let bounds = self.geo.segment_bounds(ring.iter().copied());

        if let Some(leaf) = self.leaves[id.0].as_mut() {
            leaf.segments = ring;
            leaf.sector = Some(sector);
            leaf.bounds = bounds;
        }
        Ok(())
    }

    /// Notes the outermost segments of each linedef side in `ring`, unless
    /// an earlier leaf already did.
    fn record_side_segments(&mut self, ring: &[SegId]) {
        let mut found: Vec<((LineId, SideKind), SideSegments, f64, f64)> = Vec::new();

        for &id in ring {
            let seg = self.geo.segment(id);
            let Some(line_id) = seg.line else { continue };
            let key = (line_id, seg.side);
            if self.side_segments.contains_key(&key) {
                continue;
            }
            let line = &self.geo.lines[line_id.0];
            let side_start = match seg.side {
                SideKind::Front => line.from,
                SideKind::Back => line.to,
            };
            let origin = self.geo.vertex_pos(side_start).unwrap_or_default();
            let start_dist = origin.distance_to(&seg.start);
            let end_dist = origin.distance_to(&seg.end);

            match found.iter_mut().find(|(k, ..)| *k == key) {
                Some((_, sides, least, most)) => {
                    if start_dist < *least {
                        *least = start_dist;
                        sides.leftmost = id;
                    }
                    if end_dist > *most {
                        *most = end_dist;
                        sides.rightmost = id;
                    }
                }
                None => found.push((key, SideSegments { leftmost: id, rightmost: id }, start_dist, end_dist)),
            }
        }

        for (key, sides, ..) in found {
            self.side_segments.insert(key, sides);
        }
    }
}

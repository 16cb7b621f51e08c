// src/bsp/window_effect.rs
//! Detection of one-sided "window" lines.
//!
//! A one-sided line whose vertex has an odd number of one-sided owners
//! usually sits in a gap of a sector boundary, with open space behind it.
//! Rays cast from the middle of such a line find the sectors in front of
//! and behind it; when the front agrees with the line's own sector, the
//! sector behind becomes the line's window sector.

use log::debug;

use crate::bsp::bsp_util::{Partition, Point2D};
use crate::bsp::diagnostics::BuildReport;
use crate::bsp::model::{Geometry, Line, LineId, SectorId, SideKind};
use crate::bsp::DIST_EPSILON;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct OwnerCount {
    one_sided: u32,
    two_sided: u32,
}

fn owner_counts(geo: &Geometry) -> Vec<OwnerCount> {
    let mut counts = vec![OwnerCount::default(); geo.vertices.len()];
    for line in geo.lines.iter().filter(|l| !l.zero_length) {
        for v in [line.from, line.to] {
            if let Some(count) = counts.get_mut(v.0) {
                if line.is_two_sided() {
                    count.two_sided += 1;
                } else {
                    count.one_sided += 1;
                }
            }
        }
    }
    counts
}

/// Nearest line hit on one side of the probed line.
#[derive(Debug, Clone, Copy)]
struct Hit {
    dist: f64,
    sector: Option<SectorId>,
}

fn endpoints(geo: &Geometry, line: &Line) -> Option<(Point2D, Point2D)> {
    Some((geo.vertex_pos(line.from)?, geo.vertex_pos(line.to)?))
}

/// Casts axis-aligned rays from the middle of `probe` and returns the
/// window sector, if the line looks like a window.
fn test_window_effect(geo: &Geometry, probe: &Line) -> Option<SectorId> {
    let (start, end) = endpoints(geo, probe)?;
    let mid = start.midpoint(&end);
    let own = Partition::through(start, end);
    let cast_horiz = own.dx.abs() < own.dy.abs();

    let mut front: Option<Hit> = None;
    let mut back: Option<Hit> = None;

    for other in &geo.lines {
        if other.id == probe.id || other.zero_length {
            continue;
        }
        let Some((a, b)) = endpoints(geo, other) else { continue };
        let dx2 = b.x - a.x;
        let dy2 = b.y - a.y;

        let hit = if cast_horiz {
            if dy2.abs() < DIST_EPSILON
                || a.y.max(b.y) < mid.y - DIST_EPSILON
                || a.y.min(b.y) > mid.y + DIST_EPSILON
            {
                continue;
            }
            Point2D::new(a.x + (mid.y - a.y) * dx2 / dy2, mid.y)
        } else {
            if dx2.abs() < DIST_EPSILON
                || a.x.max(b.x) < mid.x - DIST_EPSILON
                || a.x.min(b.x) > mid.x + DIST_EPSILON
            {
                continue;
            }
            Point2D::new(mid.x, a.y + (mid.x - a.x) * dy2 / dx2)
        };

        let dist = hit.distance_to(&mid);
        if dist < DIST_EPSILON {
            continue;
        }

        // The ray origin sees whichever side of the hit line it lies on.
        let facing = if Partition::through(a, b).classify_point(&mid) > 0.0 {
            other.sector(SideKind::Front)
        } else {
            other.back.and_then(|s| s.sector)
        };

        let slot = if own.classify_point(&hit) > 0.0 { &mut front } else { &mut back };
        if slot.map_or(true, |h| dist < h.dist) {
            *slot = Some(Hit { dist, sector: facing });
        }
    }

    let front_sector = front?.sector?;
    let back_sector = back?.sector?;
    if probe.sector(SideKind::Front) == Some(front_sector) {
        Some(back_sector)
    } else {
        None
    }
}

/// Probes every suspicious one-sided line and records window sectors on the
/// lines. Returns the number of windows found.
pub(crate) fn detect_window_effects(geo: &mut Geometry, report: &mut BuildReport) -> usize {
    let counts = owner_counts(geo);
    let suspicious = |v: usize| {
        counts.get(v).is_some_and(|c| c.one_sided % 2 == 1 && c.one_sided + c.two_sided > 1)
    };

    let mut found: Vec<(LineId, SectorId)> = Vec::new();
    for line in &geo.lines {
        if line.zero_length || line.back.is_some() || line.front.is_none() {
            continue;
        }
        if !suspicious(line.from.0) && !suspicious(line.to.0) {
            continue;
        }
        debug!("Probing {} for window effect", line.id);
        if let Some(sector) = test_window_effect(geo, line) {
            found.push((line.id, sector));
        }
    }

    for (line, sector) in &found {
        geo.lines[line.0].window_sector = Some(*sector);
        report.window_effect(*line, *sector);
    }
    found.len()
}

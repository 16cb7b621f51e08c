// src/bsp/diagnostics.rs
//! Recoverable map problems found during a build. Each offending sector,
//! leaf or segment is recorded (and logged) once.

use std::collections::HashSet;

use log::warn;

use crate::bsp::bsp_node::LeafId;
use crate::bsp::bsp_util::Point2D;
use crate::bsp::model::{LineId, SectorId, SegId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnclosedSector {
    pub sector: SectorId,
    /// Midpoint of the gap on the partition where the sector leaked.
    pub at: Point2D,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorMismatch {
    pub first: SectorId,
    pub second: SectorId,
    pub at: Point2D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrantSegment {
    pub segment: SegId,
    pub leaf: LeafId,
    pub segment_sector: Option<SectorId>,
    pub leaf_sector: Option<SectorId>,
}

#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    /// One-sided lines given a back sector by ray casting.
    pub window_effects: Vec<(LineId, SectorId)>,
    pub unclosed_sectors: Vec<UnclosedSector>,
    pub sector_mismatches: Vec<SectorMismatch>,
    pub unclosed_leafs: Vec<LeafId>,
    pub migrant_segments: Vec<MigrantSegment>,
    /// Calls to `release` for elements the session no longer owned.
    pub not_owned_releases: usize,

    seen_sectors: HashSet<SectorId>,
    seen_mismatches: HashSet<(SectorId, SectorId)>,
    seen_leafs: HashSet<LeafId>,
    seen_segments: HashSet<SegId>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.unclosed_sectors.is_empty()
            && self.sector_mismatches.is_empty()
            && self.unclosed_leafs.is_empty()
            && self.migrant_segments.is_empty()
    }

    pub(crate) fn window_effect(&mut self, line: LineId, sector: SectorId) {
        warn!("Warning: {} seems to be a one-sided window facing {}", line, sector);
        self.window_effects.push((line, sector));
    }

    pub(crate) fn unclosed_sector(&mut self, sector: SectorId, at: Point2D) {
        if self.seen_sectors.insert(sector) {
            warn!("Warning: Unclosed {} near ({:.1}, {:.1})", sector, at.x, at.y);
            self.unclosed_sectors.push(UnclosedSector { sector, at });
        }
    }

    pub(crate) fn sector_mismatch(&mut self, first: SectorId, second: SectorId, at: Point2D) {
        if self.seen_mismatches.insert((first, second)) {
            warn!("Warning: Sector mismatch ({} vs {}) near ({:.1}, {:.1})", first, second, at.x, at.y);
            self.sector_mismatches.push(SectorMismatch { first, second, at });
        }
    }

    pub(crate) fn unclosed_leaf(&mut self, leaf: LeafId) {
        if self.seen_leafs.insert(leaf) {
            warn!("Warning: Unclosed {}", leaf);
            self.unclosed_leafs.push(leaf);
        }
    }

    pub(crate) fn migrant_segment(&mut self, migrant: MigrantSegment) {
        if self.seen_segments.insert(migrant.segment) {
            warn!(
                "Warning: {} in {} faces {:?} but the leaf is {:?}",
                migrant.segment, migrant.leaf, migrant.segment_sector, migrant.leaf_sector
            );
            self.migrant_segments.push(migrant);
        }
    }
}

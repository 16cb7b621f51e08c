// src/bsp/edge_tips.rs
// Per-vertex record of the edges leaving it, used to tell which sector is
// open in a given direction.

use crate::bsp::bsp_util::compute_angle;
use crate::bsp::model::SectorId;
use crate::bsp::ANG_EPSILON;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EdgeTip {
    /// Direction of the edge leaving the vertex, in degrees.
    pub angle: f64,
    /// Sector on the left looking outward along the edge.
    pub left: Option<SectorId>,
    /// Sector on the right looking outward along the edge.
    pub right: Option<SectorId>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EdgeTips {
    tips: Vec<EdgeTip>,
}

impl EdgeTips {
    /// Records an edge leaving the vertex towards (`dx`, `dy`). Tips stay
    /// sorted by ascending angle.
    pub fn add(&mut self, dx: f64, dy: f64, left: Option<SectorId>, right: Option<SectorId>) {
        let angle = compute_angle(dx, dy);
        let pos = self.tips.iter().position(|t| t.angle > angle + ANG_EPSILON).unwrap_or(self.tips.len());
        self.tips.insert(pos, EdgeTip { angle, left, right });
    }

    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tips.len()
    }

    /// Sector open in direction (`dx`, `dy`), or `None` when the direction
    /// runs along an edge or into the void.
    pub fn open_sector_at(&self, dx: f64, dy: f64) -> Option<SectorId> {
        let angle = compute_angle(dx, dy);

        for tip in &self.tips {
            let diff = (tip.angle - angle).abs();
            if diff < ANG_EPSILON || diff > 360.0 - ANG_EPSILON {
                return None;
            }
        }

        match self.tips.iter().find(|t| angle + ANG_EPSILON < t.angle) {
            Some(tip) => tip.right,
            None => self.tips.last().and_then(|t| t.left),
        }
    }
}

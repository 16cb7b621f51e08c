// src/bsp/partition_cost.rs
// Partition candidate evaluation and selection.

use log::debug;

use crate::bsp::bsp_util::Partition;
use crate::bsp::model::{Geometry, LineId, SegId};
use crate::bsp::superblock::{BlockId, SuperBlockSet};
use crate::bsp::{DIST_EPSILON, SHORT_SEGMENT_EPSILON};

/// Running totals for one candidate partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionCost {
    pub total: i64,
    pub splits: usize,
    /// Splits that leave a piece shorter than the short-segment epsilon.
    pub iffy: usize,
    pub near_miss: usize,
    pub real_left: usize,
    pub real_right: usize,
    pub mini_left: usize,
    pub mini_right: usize,
}

impl PartitionCost {
    fn surcharge(&mut self, factor: i64, q: f64) {
        self.total += (100.0 * factor as f64 * (q * q - 1.0)) as i64;
    }

    fn count(&mut self, mini: bool, right: bool) {
        match (mini, right) {
            (false, true) => self.real_right += 1,
            (false, false) => self.real_left += 1,
            (true, true) => self.mini_right += 1,
            (true, false) => self.mini_left += 1,
        }
    }

    /// Near-miss penalty for a segment lying wholly on one side, with its
    /// endpoint distances measured towards that side.
    fn near_miss(&mut self, factor: i64, a: f64, b: f64) {
        let s = SHORT_SEGMENT_EPSILON;
        if (a >= s && b >= s) || (a <= DIST_EPSILON && b >= s) || (b <= DIST_EPSILON && a >= s) {
            return;
        }
        self.near_miss += 1;
        let q = if a <= DIST_EPSILON || b <= DIST_EPSILON { s / a.max(b) } else { s / a.min(b) };
        self.surcharge(factor, q);
    }
}

/// Accumulates the cost of `part` over the block tree at `block`. Returns
/// `false` once the running total exceeds `best`.
fn eval_block(
    geo: &Geometry,
    blocks: &SuperBlockSet,
    block: BlockId,
    part: &Partition,
    part_line: Option<LineId>,
    factor: i64,
    best: i64,
    cost: &mut PartitionCost,
) -> bool {
    let b = blocks.block(block);
    match part.box_on_side(&b.bounds) {
        1 => {
            cost.real_right += b.real_count;
            cost.mini_right += b.mini_count;
            return true;
        }
        -1 => {
            cost.real_left += b.real_count;
            cost.mini_left += b.mini_count;
            return true;
        }
        _ => {}
    }

    for &id in &b.segs {
        if cost.total > best {
            return false;
        }
        let seg = geo.segment(id);
        let mini = seg.is_mini();

        let (a, b_dist) = if part_line.is_some() && seg.line == part_line {
            (0.0, 0.0)
        } else {
            (part.perp_dist(&seg.start), part.perp_dist(&seg.end))
        };

        if a.abs() <= DIST_EPSILON && b_dist.abs() <= DIST_EPSILON {
            let dot = seg.dx() * part.dx + seg.dy() * part.dy;
            cost.count(mini, dot >= 0.0);
            continue;
        }

        if a > -DIST_EPSILON && b_dist > -DIST_EPSILON {
            cost.count(mini, true);
            cost.near_miss(factor, a, b_dist);
            continue;
        }

        if a < DIST_EPSILON && b_dist < DIST_EPSILON {
            cost.count(mini, false);
            cost.near_miss(factor, -a, -b_dist);
            continue;
        }

        cost.splits += 1;
        cost.total += 100 * factor;
        if a.abs() < SHORT_SEGMENT_EPSILON || b_dist.abs() < SHORT_SEGMENT_EPSILON {
            cost.iffy += 1;
            cost.surcharge(factor, SHORT_SEGMENT_EPSILON / a.abs().min(b_dist.abs()));
        }
    }

    for child in b.children.iter().flatten() {
        if !eval_block(geo, blocks, *child, part, part_line, factor, best, cost) {
            return false;
        }
    }
    true
}

/// Full cost of splitting the set at `root` along `candidate`, or `None`
/// when the candidate is disqualified or already worse than `best`.
pub(crate) fn evaluate_partition(
    geo: &Geometry,
    blocks: &SuperBlockSet,
    root: BlockId,
    candidate: SegId,
    split_cost_factor: u32,
    best: i64,
) -> Option<PartitionCost> {
    let seg = geo.segment(candidate);
    let part = Partition::through(seg.start, seg.end);
    let factor = i64::from(split_cost_factor);
    let mut cost = PartitionCost::default();

    if !eval_block(geo, blocks, root, &part, seg.line, factor, best, &mut cost) {
        return None;
    }
    if cost.real_left == 0 || cost.real_right == 0 {
        return None;
    }

    cost.total += 100 * (cost.real_left as i64 - cost.real_right as i64).abs();
    cost.total += 50 * (cost.mini_left as i64 - cost.mini_right as i64).abs();
    if !part.is_axis_aligned() {
        cost.total += 25;
    }
    Some(cost)
}

/// Line-backed segments in pre-order, each source line once. Lines are
/// stamped with `epoch` as they are taken.
fn candidates(geo: &mut Geometry, blocks: &SuperBlockSet, root: BlockId, epoch: u32) -> Vec<SegId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let b = blocks.block(id);
        for &seg_id in &b.segs {
            let seg = geo.segment(seg_id);
            let Some(line) = seg.line else { continue };
            if seg.length <= 0.0 {
                continue;
            }
            let line = &mut geo.lines[line.0];
            if line.valid_epoch == epoch {
                continue;
            }
            line.valid_epoch = epoch;
            out.push(seg_id);
        }
        for child in b.children.iter().rev().flatten() {
            stack.push(*child);
        }
    }
    out
}

/// Picks the cheapest partition for the set at `root`, or `None` when no
/// candidate splits it (the set is convex).
pub(crate) fn choose_partition(
    geo: &mut Geometry,
    blocks: &SuperBlockSet,
    root: BlockId,
    split_cost_factor: u32,
    epoch: u32,
) -> Option<(SegId, PartitionCost)> {
    let mut best: Option<(SegId, PartitionCost)> = None;
    let mut best_total = i64::MAX;

    for candidate in candidates(geo, blocks, root, epoch) {
        let Some(cost) = evaluate_partition(geo, blocks, root, candidate, split_cost_factor, best_total) else {
            continue;
        };
        if cost.total < best_total {
            best_total = cost.total;
            best = Some((candidate, cost));
        }
    }

    if let Some((seg, cost)) = &best {
        debug!(
            "Partition {} cost {} (splits {}, iffy {}, near {}, right {}/{}, left {}/{})",
            seg, cost.total, cost.splits, cost.iffy, cost.near_miss,
            cost.real_right, cost.mini_right, cost.real_left, cost.mini_left
        );
    }
    best
}

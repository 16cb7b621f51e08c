// src/bsp/mod.rs
//! Node builder: partitions a map's linedefs into a BSP tree of convex
//! subsectors ("leafs").
//!
//! The entry point is [`BspLevel`]: create one per map, call
//! [`BspLevel::build`], then walk the tree from [`BspLevel::root`].

pub mod bsp_level;
pub mod bsp_node;
mod bsp_leaf;
pub mod bsp_util;
pub mod diagnostics;
mod divider;
mod edge_tips;
pub mod error;
pub mod model;
mod partition_cost;
mod superblock;
mod window_effect;

pub use bsp_level::BspLevel;
pub use bsp_node::{Leaf, LeafId, MapElement, NodeId, PartitionNode, ReleasedElement, TreeElement};
pub use bsp_util::{BoundingBox, Partition, Point2D};
pub use diagnostics::BuildReport;
pub use error::BuildError;
pub use model::{Line, LineId, SectorId, SegId, Segment, SideKind, Vertex, VertexId};

/// Superblocks are aligned to multiples of this many map units.
pub const BLOCK_SIZE: i32 = 128;
/// Superblocks no larger than this on both axes are never subdivided.
pub const SUPERBLOCK_LEAF_SIZE: f64 = 256.0;
/// Distances at or below this are "on the line".
pub const DIST_EPSILON: f64 = 1.0 / 128.0;
/// Endpoints closer than this to a partition are near misses.
pub const SHORT_SEGMENT_EPSILON: f64 = 4.0;
/// Angular tolerance in degrees.
pub const ANG_EPSILON: f64 = 1.0 / 1024.0;

/// How a segment lies relative to a partition line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineRelationship {
    Collinear,
    Right,
    /// On the right, with one endpoint on the line.
    RightIntercept,
    Left,
    /// On the left, with one endpoint on the line.
    LeftIntercept,
    Intersects,
}

impl LineRelationship {
    /// Classifies a segment from the signed perpendicular distances of its
    /// endpoints (positive = right).
    pub fn from_distances(from_dist: f64, to_dist: f64) -> Self {
        if from_dist.abs() <= DIST_EPSILON && to_dist.abs() <= DIST_EPSILON {
            return LineRelationship::Collinear;
        }
        if from_dist > -DIST_EPSILON && to_dist > -DIST_EPSILON {
            if from_dist > DIST_EPSILON && to_dist > DIST_EPSILON {
                return LineRelationship::Right;
            }
            return LineRelationship::RightIntercept;
        }
        if from_dist < DIST_EPSILON && to_dist < DIST_EPSILON {
            if from_dist < -DIST_EPSILON && to_dist < -DIST_EPSILON {
                return LineRelationship::Left;
            }
            return LineRelationship::LeftIntercept;
        }
        LineRelationship::Intersects
    }
}

//! src/bsp/bsp_node.rs
//!
//! Elements of a finished tree: partition nodes and leafs (subsectors).
//! Both live in tables owned by the build session and refer to each other
//! by id.

use std::fmt;

use crate::bsp::bsp_util::{BoundingBox, Partition};
use crate::bsp::model::{SectorId, SegId, Vertex, VertexId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leaf #{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

/// A child reference inside the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeElement {
    Leaf(LeafId),
    Node(NodeId),
}

/// Anything a session owns and can hand over with `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapElement {
    Leaf(LeafId),
    Node(NodeId),
    Vertex(VertexId),
}

impl From<TreeElement> for MapElement {
    fn from(elem: TreeElement) -> Self {
        match elem {
            TreeElement::Leaf(id) => MapElement::Leaf(id),
            TreeElement::Node(id) => MapElement::Node(id),
        }
    }
}

/// An element moved out of the session.
#[derive(Debug, Clone)]
pub enum ReleasedElement {
    Leaf(Leaf),
    Node(PartitionNode),
    Vertex(Vertex),
}

/// A convex region bounded by a closed ring of segments.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub id: LeafId,
    /// Segments in ring order once the build has finished.
    pub segments: Vec<SegId>,
    pub sector: Option<SectorId>,
    pub bounds: BoundingBox,
}

impl Leaf {
    pub(crate) fn new(id: LeafId, segments: Vec<SegId>) -> Self {
        Leaf { id, segments, sector: None, bounds: BoundingBox::new_empty() }
    }

    /// First segment of the ring.
    pub fn first_segment(&self) -> Option<SegId> {
        self.segments.first().copied()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PartitionNode {
    pub id: NodeId,
    pub partition: Partition,
    pub right_bounds: BoundingBox,
    pub left_bounds: BoundingBox,
    pub right: TreeElement,
    pub left: TreeElement,
}

impl PartitionNode {
    /// Child on the given side (`true` = right / front).
    pub fn child(&self, right: bool) -> TreeElement {
        if right {
            self.right
        } else {
            self.left
        }
    }
}

// src/bsp/model.rs
//! Vertices, lines and segments owned by one build session.

use std::fmt;

use crate::bsp::bsp_node::LeafId;
use crate::bsp::bsp_util::{compute_angle, BoundingBox, Point2D};
use crate::bsp::edge_tips::EdgeTips;
use crate::bsp::superblock::BlockId;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " #{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Slot of a vertex in the session's vertex table (zero-based).
    VertexId, "vertex"
);
define_id!(
    /// Index of a linedef in the source map.
    LineId, "line"
);
define_id!(
    /// Index of a sector in the source map.
    SectorId, "sector"
);
define_id!(
    /// Slot of a segment in the session's segment table.
    SegId, "segment"
);

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// 1-based index assigned at creation, stable for the session.
    pub index: usize,
    pub pos: Point2D,
    /// Created by a split rather than read from the map.
    pub synthetic: bool,
}

/// Which side of a linedef a segment runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideKind {
    Front, // Right side of linedef
    Back,  // Left side of linedef
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSide {
    pub sidedef: usize,
    pub sector: Option<SectorId>,
}

#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    pub from: VertexId,
    pub to: VertexId,
    pub front: Option<LineSide>,
    pub back: Option<LineSide>,
    pub self_ref: bool,
    pub zero_length: bool,
    /// Sector seen through the back of a one-sided "window" line.
    pub window_sector: Option<SectorId>,
    /// Last partition round in which the line was evaluated.
    pub(crate) valid_epoch: u32,
}

impl Line {
    pub fn is_one_sided(&self) -> bool {
        self.front.is_some() && self.back.is_none()
    }

    pub fn is_two_sided(&self) -> bool {
        self.front.is_some() && self.back.is_some()
    }

    /// Sector faced by `side`; the back of a window line reports the window
    /// sector.
    pub fn sector(&self, side: SideKind) -> Option<SectorId> {
        match side {
            SideKind::Front => self.front.and_then(|s| s.sector),
            SideKind::Back => match self.back {
                Some(back) => back.sector,
                None => self.window_sector,
            },
        }
    }
}

/// Where a segment currently lives while the tree is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegLocation {
    Unassigned,
    Block(BlockId),
    Leaf(LeafId),
}

/// A directed half-edge. The sector it borders lies on its right.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: SegId,
    pub from: VertexId,
    pub to: VertexId,
    pub start: Point2D,
    pub end: Point2D,
    pub angle: f64,
    pub length: f64,
    /// Source linedef; `None` for mini segments.
    pub line: Option<LineId>,
    pub side: SideKind,
    pub sector: Option<SectorId>,
    pub twin: Option<SegId>,
    /// Ring links, set once the owning leaf is wound.
    pub next: Option<SegId>,
    pub prev: Option<SegId>,
    pub(crate) location: SegLocation,
}

impl Segment {
    pub fn is_mini(&self) -> bool {
        self.line.is_none()
    }

    pub fn dx(&self) -> f64 {
        self.end.x - self.start.x
    }

    pub fn dy(&self) -> f64 {
        self.end.y - self.start.y
    }

    fn recompute(&mut self) {
        self.angle = compute_angle(self.dx(), self.dy());
        self.length = self.dx().hypot(self.dy());
    }
}

/// The mutable geometry of a build session.
#[derive(Debug, Default)]
pub(crate) struct Geometry {
    pub vertices: Vec<Option<Vertex>>,
    pub tips: Vec<EdgeTips>,
    pub lines: Vec<Line>,
    pub segments: Vec<Segment>,
}

impl Geometry {
    pub fn add_vertex(&mut self, pos: Point2D, synthetic: bool) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(Some(Vertex { index: id.0 + 1, pos, synthetic }));
        self.tips.push(EdgeTips::default());
        id
    }

    /// Position of a vertex still owned by the session.
    pub fn vertex_pos(&self, id: VertexId) -> Option<Point2D> {
        self.vertices.get(id.0).and_then(|v| v.as_ref()).map(|v| v.pos)
    }

    pub fn add_segment(&mut self, from: VertexId, to: VertexId, line: Option<LineId>, side: SideKind, sector: Option<SectorId>) -> SegId {
        let id = SegId(self.segments.len());
        let start = self.vertex_pos(from).unwrap_or_default();
        let end = self.vertex_pos(to).unwrap_or_default();
        let mut seg = Segment {
            id,
            from,
            to,
            start,
            end,
            angle: 0.0,
            length: 0.0,
            line,
            side,
            sector,
            twin: None,
            next: None,
            prev: None,
            location: SegLocation::Unassigned,
        };
        seg.recompute();
        self.segments.push(seg);
        id
    }

    pub fn link_twins(&mut self, a: SegId, b: SegId) {
        self.segments[a.0].twin = Some(b);
        self.segments[b.0].twin = Some(a);
    }

    pub fn segment(&self, id: SegId) -> &Segment {
        &self.segments[id.0]
    }

    pub fn is_self_ref(&self, seg: SegId) -> bool {
        self.segments[seg.0].line.is_some_and(|l| self.lines[l.0].self_ref)
    }

    /// Splits `seg` at `point`. The original keeps its start and ends at the
    /// new vertex; the returned segment runs from the new vertex to the old
    /// end. A twin is split at the same vertex in the same step, and the
    /// returned twin half pairs with the returned segment, so both halves keep
    /// `twin.twin == self`.
    pub fn split_segment(&mut self, seg: SegId, point: Point2D) -> (SegId, Option<SegId>) {
        let vertex = self.add_vertex(point, true);
        let old = self.segments[seg.0].clone();

        let partner_sector = old.twin.and_then(|t| self.segments[t.0].sector);
        self.tips[vertex.0].add(-old.dx(), -old.dy(), old.sector, partner_sector);
        self.tips[vertex.0].add(old.dx(), old.dy(), partner_sector, old.sector);

        let new_seg = self.add_segment(vertex, old.to, old.line, old.side, old.sector);
        {
            let cur = &mut self.segments[seg.0];
            cur.to = vertex;
            cur.end = point;
            cur.recompute();
        }

        let new_twin = old.twin.map(|twin| {
            let twin_seg = self.segments[twin.0].clone();
            let half = self.add_segment(twin_seg.from, vertex, twin_seg.line, twin_seg.side, twin_seg.sector);
            let cur = &mut self.segments[twin.0];
            cur.from = vertex;
            cur.start = point;
            cur.recompute();
            self.link_twins(new_seg, half);
            half
        });

        (new_seg, new_twin)
    }

    /// Bounds of the given segments' endpoints.
    pub fn segment_bounds<I: IntoIterator<Item = SegId>>(&self, segs: I) -> BoundingBox {
        let mut bbox = BoundingBox::new_empty();
        for id in segs {
            let seg = &self.segments[id.0];
            bbox.expand_point(seg.start.x, seg.start.y);
            bbox.expand_point(seg.end.x, seg.end.y);
        }
        bbox
    }
}

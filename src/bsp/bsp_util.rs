// src/bsp/bsp_util.rs
// Geometry helpers shared by the node builder.

use crate::bsp::{LineRelationship, SHORT_SEGMENT_EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Angle of the vector (`dx`, `dy`) in degrees, in the range `[0, 360)`.
pub fn compute_angle(dx: f64, dy: f64) -> f64 {
    if dx == 0.0 {
        return if dy > 0.0 { 90.0 } else { 270.0 };
    }
    let angle = dy.atan2(dx).to_degrees();
    if angle < 0.0 {
        angle + 360.0
    } else {
        angle
    }
}

/// An infinite splitting line: an origin and a direction.
///
/// Distances are signed; positive values lie on the right of the
/// direction, which is the front side of a linedef in Doom maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partition {
    pub origin: Point2D,
    pub dx: f64,
    pub dy: f64,
    length: f64,
}

impl Partition {
    pub fn new(origin: Point2D, dx: f64, dy: f64) -> Self {
        Partition { origin, dx, dy, length: dx.hypot(dy) }
    }

    pub fn through(start: Point2D, end: Point2D) -> Self {
        Partition::new(start, end.x - start.x, end.y - start.y)
    }

    pub fn is_axis_aligned(&self) -> bool {
        self.dx == 0.0 || self.dy == 0.0
    }

    /// Unnormalised side test: positive on the right, negative on the left.
    pub fn classify_point(&self, point: &Point2D) -> f64 {
        (self.dy * (point.x - self.origin.x)) - (self.dx * (point.y - self.origin.y))
    }

    /// Signed perpendicular distance of `point` from the line.
    pub fn perp_dist(&self, point: &Point2D) -> f64 {
        self.classify_point(point) / self.length
    }

    /// Distance of the projection of `point` along the direction, measured
    /// from the origin.
    pub fn para_dist(&self, point: &Point2D) -> f64 {
        ((point.x - self.origin.x) * self.dx + (point.y - self.origin.y) * self.dy) / self.length
    }

    pub fn relationship(&self, start: &Point2D, end: &Point2D) -> (LineRelationship, f64, f64) {
        let from_dist = self.perp_dist(start);
        let to_dist = self.perp_dist(end);
        (LineRelationship::from_distances(from_dist, to_dist), from_dist, to_dist)
    }

    /// Which side of the line a box lies on: `1` right, `-1` left, `0` when
    /// the line passes through it. The box is grown by 1.5 short-segment
    /// epsilons so near misses inside it are never skipped.
    pub fn box_on_side(&self, bbox: &BoundingBox) -> i32 {
        let margin = SHORT_SEGMENT_EPSILON * 1.5;
        let corners = [
            Point2D::new(bbox.min_x - margin, bbox.min_y - margin),
            Point2D::new(bbox.max_x + margin, bbox.min_y - margin),
            Point2D::new(bbox.min_x - margin, bbox.max_y + margin),
            Point2D::new(bbox.max_x + margin, bbox.max_y + margin),
        ];
        let mut right = 0;
        let mut left = 0;
        for corner in &corners {
            let side = self.classify_point(corner);
            if side > 0.0 {
                right += 1;
            } else if side < 0.0 {
                left += 1;
            }
        }
        if right == corners.len() {
            1
        } else if left == corners.len() {
            -1
        } else {
            0
        }
    }

    /// Point where the segment `start`-`end` crosses the line, given the
    /// perpendicular distances of its endpoints. Axis-aligned cases snap to
    /// the coordinate that is already known exactly.
    pub fn intersect(&self, start: &Point2D, end: &Point2D, from_dist: f64, to_dist: f64) -> Point2D {
        let sdx = end.x - start.x;
        let sdy = end.y - start.y;

        // horizontal partition against vertical segment
        if self.dy == 0.0 && sdx == 0.0 {
            return Point2D::new(start.x, self.origin.y);
        }
        // vertical partition against horizontal segment
        if self.dx == 0.0 && sdy == 0.0 {
            return Point2D::new(self.origin.x, start.y);
        }

        let ds = from_dist / (from_dist - to_dist);
        let x = if sdx == 0.0 { start.x } else { start.x + sdx * ds };
        let y = if sdy == 0.0 { start.y } else { start.y + sdy * ds };
        Point2D::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox::new_empty()
    }
}

impl BoundingBox {
    pub fn new_empty() -> Self {
        BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox { min_x, min_y, max_x, max_y }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn expand_point(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
}

use serde::{Deserialize, Serialize};

/// A 2d point in map or device coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Point2d {
    /// X ordinate.
    pub x: f64,
    /// Y ordinate.
    pub y: f64,
}

impl Point2d {
    /// Creates a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_sq(&self, other: &Point2d) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point2d) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Squared distance from self to the segment `(a, b)`, together with the
    /// nearest point on the segment.
    ///
    /// Degenerate segments shorter than `epsilon` (squared length) are
    /// treated as their start point.
    pub fn distance_sq_to_segment(&self, a: &Point2d, b: &Point2d, epsilon: f64) -> (f64, Point2d) {
        let vx = b.x - a.x;
        let vy = b.y - a.y;
        let len_sq = vx * vx + vy * vy;
        if len_sq <= epsilon {
            return (self.distance_sq(a), *a);
        }

        let t = ((self.x - a.x) * vx + (self.y - a.y) * vy) / len_sq;
        let t = t.clamp(0.0, 1.0);
        let nearest = Point2d::new(a.x + t * vx, a.y + t * vy);
        (self.distance_sq(&nearest), nearest)
    }
}

/// A 3d point. The rendering pipeline ignores Z, but the codec preserves it
/// for geometries whose type code declares a Z ordinate.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Point3d {
    /// X ordinate.
    pub x: f64,
    /// Y ordinate.
    pub y: f64,
    /// Z ordinate; `0.0` for 2d geometries.
    pub z: f64,
}

impl Point3d {
    /// Creates a new point.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Projects onto the XY plane.
    pub const fn xy(&self) -> Point2d {
        Point2d::new(self.x, self.y)
    }
}

impl From<Point2d> for Point3d {
    fn from(value: Point2d) -> Self {
        Self::new(value.x, value.y, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn segment_distance_interior() {
        let p = Point2d::new(5.0, 3.0);
        let (d_sq, nearest) =
            p.distance_sq_to_segment(&Point2d::new(0.0, 0.0), &Point2d::new(10.0, 0.0), 1e-8);
        assert_abs_diff_eq!(d_sq, 9.0);
        assert_abs_diff_eq!(nearest.x, 5.0);
        assert_abs_diff_eq!(nearest.y, 0.0);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let p = Point2d::new(-3.0, 4.0);
        let (d_sq, nearest) =
            p.distance_sq_to_segment(&Point2d::new(0.0, 0.0), &Point2d::new(10.0, 0.0), 1e-8);
        assert_abs_diff_eq!(d_sq, 25.0);
        assert_abs_diff_eq!(nearest.x, 0.0);
    }

    #[test]
    fn degenerate_segment_uses_start_point() {
        let p = Point2d::new(1.0, 1.0);
        let a = Point2d::new(0.0, 0.0);
        let (d_sq, nearest) = p.distance_sq_to_segment(&a, &a, 1e-8);
        assert_abs_diff_eq!(d_sq, 2.0);
        assert_abs_diff_eq!(nearest.x, 0.0);
    }
}

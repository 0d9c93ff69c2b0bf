use serde::{Deserialize, Serialize};

use crate::{Point2d, Point3d, Rect};

/// A single ring of a polygon. The first ring is the exterior, subsequent
/// rings are holes. Following the wire format, closed rings repeat their
/// first vertex at the end.
pub type Ring = Vec<Point3d>;

/// Polygon geometry: one exterior ring plus optional interior rings.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Rings of the polygon.
    pub rings: Vec<Ring>,
}

impl Polygon {
    /// Creates a polygon from its rings.
    pub fn new(rings: Vec<Ring>) -> Self {
        Self { rings }
    }
}

/// The shape part of a [`Geometry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Single point.
    Point(Point3d),
    /// Set of points.
    MultiPoint(Vec<Point3d>),
    /// Polyline.
    LineString(Vec<Point3d>),
    /// Set of polylines.
    MultiLineString(Vec<Vec<Point3d>>),
    /// Single polygon.
    Polygon(Polygon),
    /// Set of polygons.
    MultiPolygon(Vec<Polygon>),
}

/// Feature geometry: a closed tagged union over the six supported shapes,
/// with a flag telling whether the source encoding carried Z ordinates.
///
/// Equality is exact geometric equality (coordinate-by-coordinate), which is
/// what the edit overlay uses to detect no-op geometry changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// The shape.
    pub shape: Shape,
    /// Whether vertices carry a meaningful Z ordinate.
    pub has_z: bool,
}

/// Result of a closest-vertex query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestVertex {
    /// Flat index of the vertex across all parts and rings.
    pub index: usize,
    /// The vertex position.
    pub point: Point2d,
    /// Flat index of the previous vertex in the same part, if any.
    pub before: Option<usize>,
    /// Flat index of the next vertex in the same part, if any.
    pub after: Option<usize>,
    /// Squared distance from the query point.
    pub distance_sq: f64,
}

/// Result of a closest-segment query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestSegment {
    /// The nearest point on the segment.
    pub point: Point2d,
    /// Flat index of the vertex that ends the matched segment.
    pub after: usize,
    /// Squared distance from the query point.
    pub distance_sq: f64,
}

impl Geometry {
    /// Creates a 2d geometry.
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            has_z: false,
        }
    }

    /// Creates a geometry with Z ordinates.
    pub fn with_z(shape: Shape) -> Self {
        Self { shape, has_z: true }
    }

    /// Convenience constructor for a 2d point geometry.
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(Shape::Point(Point3d::new(x, y, 0.0)))
    }

    /// Convenience constructor for a 2d polyline geometry.
    pub fn line_string(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self::new(Shape::LineString(
            points
                .into_iter()
                .map(|(x, y)| Point3d::new(x, y, 0.0))
                .collect(),
        ))
    }

    /// True if the shape is a point or multi-point.
    pub fn is_point_kind(&self) -> bool {
        matches!(self.shape, Shape::Point(_) | Shape::MultiPoint(_))
    }

    /// Contiguous vertex runs of the geometry. Each part of a multi-geometry
    /// and each polygon ring is a separate run.
    pub fn parts(&self) -> Vec<&[Point3d]> {
        match &self.shape {
            Shape::Point(p) => vec![std::slice::from_ref(p)],
            Shape::MultiPoint(points) => points.iter().map(std::slice::from_ref).collect(),
            Shape::LineString(points) => vec![points.as_slice()],
            Shape::MultiLineString(lines) => lines.iter().map(|l| l.as_slice()).collect(),
            Shape::Polygon(polygon) => polygon.rings.iter().map(|r| r.as_slice()).collect(),
            Shape::MultiPolygon(polygons) => polygons
                .iter()
                .flat_map(|p| p.rings.iter().map(|r| r.as_slice()))
                .collect(),
        }
    }

    /// Total number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.parts().iter().map(|p| p.len()).sum()
    }

    /// Vertex at the given flat index.
    pub fn vertex_at(&self, index: usize) -> Option<Point2d> {
        let mut offset = 0;
        for part in self.parts() {
            if index < offset + part.len() {
                return Some(part[index - offset].xy());
            }
            offset += part.len();
        }
        None
    }

    /// Bounding rectangle, or `None` for a geometry without vertices.
    pub fn bounding_rect(&self) -> Option<Rect> {
        let mut rect: Option<Rect> = None;
        for part in self.parts() {
            for point in part {
                match &mut rect {
                    Some(rect) => rect.extend(&point.xy()),
                    None => rect = Some(Rect::from_point(point.xy())),
                }
            }
        }
        rect
    }

    /// Finds the vertex closest to `point`, with its neighbors within the
    /// same part.
    pub fn closest_vertex(&self, point: &Point2d) -> Option<ClosestVertex> {
        let mut best: Option<ClosestVertex> = None;
        let mut offset = 0;
        for part in self.parts() {
            for (i, vertex) in part.iter().enumerate() {
                let vertex = vertex.xy();
                let distance_sq = point.distance_sq(&vertex);
                if best.map_or(true, |b| distance_sq < b.distance_sq) {
                    best = Some(ClosestVertex {
                        index: offset + i,
                        point: vertex,
                        before: (i > 0).then(|| offset + i - 1),
                        after: (i + 1 < part.len()).then(|| offset + i + 1),
                        distance_sq,
                    });
                }
            }
            offset += part.len();
        }
        best
    }

    /// Finds the point on the geometry's segments closest to `point`.
    ///
    /// Returns `None` for point geometries, which have no segments.
    /// `epsilon` is the squared-length threshold below which a segment is
    /// considered degenerate.
    pub fn closest_segment(&self, point: &Point2d, epsilon: f64) -> Option<ClosestSegment> {
        if self.is_point_kind() {
            return None;
        }

        let mut best: Option<ClosestSegment> = None;
        let mut offset = 0;
        for part in self.parts() {
            for i in 1..part.len() {
                let (distance_sq, nearest) =
                    point.distance_sq_to_segment(&part[i - 1].xy(), &part[i].xy(), epsilon);
                if best.map_or(true, |b| distance_sq < b.distance_sq) {
                    best = Some(ClosestSegment {
                        point: nearest,
                        after: offset + i,
                        distance_sq,
                    });
                }
            }
            offset += part.len();
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_polygon() -> Geometry {
        Geometry::new(Shape::Polygon(Polygon::new(vec![vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(10.0, 0.0, 0.0),
            Point3d::new(10.0, 10.0, 0.0),
            Point3d::new(0.0, 10.0, 0.0),
            Point3d::new(0.0, 0.0, 0.0),
        ]])))
    }

    #[test]
    fn bounding_rect_covers_all_parts() {
        let geom = Geometry::new(Shape::MultiLineString(vec![
            vec![Point3d::new(0.0, 0.0, 0.0), Point3d::new(5.0, 1.0, 0.0)],
            vec![Point3d::new(-3.0, 7.0, 0.0), Point3d::new(2.0, 2.0, 0.0)],
        ]));
        assert_eq!(geom.bounding_rect(), Some(Rect::new(-3.0, 0.0, 5.0, 7.0)));
    }

    #[test]
    fn closest_vertex_reports_neighbors() {
        let geom = sample_polygon();
        let closest = geom
            .closest_vertex(&Point2d::new(9.0, 9.5))
            .expect("polygon has vertices");
        assert_eq!(closest.index, 2);
        assert_eq!(closest.point, Point2d::new(10.0, 10.0));
        assert_eq!(closest.before, Some(1));
        assert_eq!(closest.after, Some(3));
    }

    #[test]
    fn closest_vertex_at_part_boundary() {
        let geom = Geometry::new(Shape::MultiLineString(vec![
            vec![Point3d::new(0.0, 0.0, 0.0), Point3d::new(1.0, 0.0, 0.0)],
            vec![Point3d::new(10.0, 0.0, 0.0), Point3d::new(11.0, 0.0, 0.0)],
        ]));
        let closest = geom
            .closest_vertex(&Point2d::new(9.9, 0.0))
            .expect("has vertices");
        // first vertex of the second part has no predecessor
        assert_eq!(closest.index, 2);
        assert_eq!(closest.before, None);
        assert_eq!(closest.after, Some(3));
    }

    #[test]
    fn closest_segment_skips_point_kinds() {
        let geom = Geometry::point(1.0, 1.0);
        assert!(geom.closest_segment(&Point2d::new(1.0, 1.0), 1e-8).is_none());
    }

    #[test]
    fn closest_segment_on_polygon_edge() {
        let geom = sample_polygon();
        let closest = geom
            .closest_segment(&Point2d::new(5.0, -1.0), 1e-8)
            .expect("polygon has segments");
        assert_eq!(closest.after, 1);
        assert_abs_diff_eq!(closest.distance_sq, 1.0);
        assert_abs_diff_eq!(closest.point.x, 5.0);
        assert_abs_diff_eq!(closest.point.y, 0.0);
    }

    #[test]
    fn exact_equality_detects_coordinate_changes() {
        let a = Geometry::line_string([(0.0, 0.0), (1.0, 1.0)]);
        let mut b = a.clone();
        assert_eq!(a, b);
        if let Shape::LineString(points) = &mut b.shape {
            points[1].x += 1e-12;
        }
        assert_ne!(a, b);
    }
}

//! Snapping to feature vertices and segments.

use meridian_types::{Geometry, Point2d};

use super::feature::FeatureId;

/// What geometry elements a snap searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapMode {
    /// Snap to vertices only.
    Vertex,
    /// Snap to segments only.
    Segment,
    /// Snap to both vertices and segments.
    VertexAndSegment,
}

/// Outcome of a snap search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapStatus {
    /// At least one match was found.
    Found,
    /// The search could not run: non-positive tolerance or a layer without
    /// geometry.
    InvalidInput,
    /// The search ran but nothing was within tolerance.
    NothingFound,
}

impl SnapStatus {
    /// Stable numeric code of the status.
    pub fn code(&self) -> u8 {
        match self {
            SnapStatus::Found => 0,
            SnapStatus::InvalidInput => 1,
            SnapStatus::NothingFound => 2,
        }
    }
}

/// A single snap match.
#[derive(Debug, Clone, PartialEq)]
pub struct SnappingResult {
    /// The feature the match belongs to.
    pub feature_id: FeatureId,
    /// The snapped position.
    pub snapped_point: Point2d,
    /// Flat index of the matched vertex. `None` for segment matches.
    pub snapped_vertex_index: Option<usize>,
    /// Flat index of the vertex before the match within its part.
    pub before_vertex: Option<usize>,
    /// Flat index of the vertex after the match within its part.
    pub after_vertex: Option<usize>,
    /// Squared distance from the query point.
    pub distance_sq: f64,
}

/// Squared-length threshold below which segments count as degenerate, for
/// geographic and projected coordinates respectively.
pub fn segment_epsilon(geographic: bool) -> f64 {
    if geographic {
        1e-12
    } else {
        1e-8
    }
}

/// Collects snap matches of one geometry into `results`.
///
/// Vertex matches carry their neighbor vertices so callers can walk the
/// geometry from the match. Segment search does not apply to point
/// geometries. `results` stays sorted by distance.
pub fn snap_to_geometry(
    feature_id: FeatureId,
    geometry: &Geometry,
    point: Point2d,
    sqr_tolerance: f64,
    mode: SnapMode,
    epsilon: f64,
    results: &mut Vec<SnappingResult>,
) {
    if matches!(mode, SnapMode::Vertex | SnapMode::VertexAndSegment) {
        if let Some(closest) = geometry.closest_vertex(&point) {
            if closest.distance_sq <= sqr_tolerance {
                insert_sorted(
                    results,
                    SnappingResult {
                        feature_id,
                        snapped_point: closest.point,
                        snapped_vertex_index: Some(closest.index),
                        before_vertex: closest.before,
                        after_vertex: closest.after,
                        distance_sq: closest.distance_sq,
                    },
                );
            }
        }
    }

    if matches!(mode, SnapMode::Segment | SnapMode::VertexAndSegment) {
        if let Some(closest) = geometry.closest_segment(&point, epsilon) {
            if closest.distance_sq <= sqr_tolerance {
                insert_sorted(
                    results,
                    SnappingResult {
                        feature_id,
                        snapped_point: closest.point,
                        snapped_vertex_index: None,
                        before_vertex: Some(closest.after - 1),
                        after_vertex: Some(closest.after),
                        distance_sq: closest.distance_sq,
                    },
                );
            }
        }
    }
}

fn insert_sorted(results: &mut Vec<SnappingResult>, result: SnappingResult) {
    let position = results
        .iter()
        .position(|r| r.distance_sq > result.distance_sq)
        .unwrap_or(results.len());
    results.insert(position, result);
}

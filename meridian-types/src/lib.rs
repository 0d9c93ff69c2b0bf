//! Geometry and coordinate primitives shared by the Meridian map engine.
//!
//! The central type is the [`Geometry`] tagged union, which covers the six
//! feature geometry kinds the engine renders and edits. All coordinates are
//! `f64`; vertices carry an optional Z ordinate that the 2d pipeline ignores
//! but the codec preserves.

mod geometry;
mod point;
mod rect;
mod size;

pub use geometry::{ClosestSegment, ClosestVertex, Geometry, Polygon, Ring, Shape};
pub use point::{Point2d, Point3d};
pub use rect::Rect;
pub use size::Size;

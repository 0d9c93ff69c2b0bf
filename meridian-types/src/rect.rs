use serde::{Deserialize, Serialize};

use crate::Point2d;

/// Axis-aligned rectangle in map or device coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Minimum X.
    pub x_min: f64,
    /// Minimum Y.
    pub y_min: f64,
    /// Maximum X.
    pub x_max: f64,
    /// Maximum Y.
    pub y_max: f64,
}

impl Rect {
    /// Creates a new rectangle. The caller must ensure `min <= max`.
    pub const fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Square rectangle centered at `center` with the given half-side.
    pub fn square_around(center: Point2d, half_side: f64) -> Self {
        Self::new(
            center.x - half_side,
            center.y - half_side,
            center.x + half_side,
            center.y + half_side,
        )
    }

    /// Rectangle around a single point.
    pub fn from_point(point: Point2d) -> Self {
        Self::new(point.x, point.y, point.x, point.y)
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Checks if the point lies inside the rectangle (borders included).
    pub fn contains_point(&self, point: &Point2d) -> bool {
        point.x >= self.x_min && point.x <= self.x_max && point.y >= self.y_min && point.y <= self.y_max
    }

    /// Checks if `other` lies fully inside self (borders included).
    pub fn contains(&self, other: &Rect) -> bool {
        other.x_min >= self.x_min
            && other.x_max <= self.x_max
            && other.y_min >= self.y_min
            && other.y_max <= self.y_max
    }

    /// Checks if the rectangles have any common point.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x_min <= other.x_max
            && self.x_max >= other.x_min
            && self.y_min <= other.y_max
            && self.y_max >= other.y_min
    }

    /// Smallest rectangle containing both self and `other`.
    pub fn merge(&self, other: &Rect) -> Self {
        Self::new(
            self.x_min.min(other.x_min),
            self.y_min.min(other.y_min),
            self.x_max.max(other.x_max),
            self.y_max.max(other.y_max),
        )
    }

    /// Extends the rectangle to include the point.
    pub fn extend(&mut self, point: &Point2d) {
        self.x_min = self.x_min.min(point.x);
        self.y_min = self.y_min.min(point.y);
        self.x_max = self.x_max.max(point.x);
        self.y_max = self.y_max.max(point.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_and_intersects() {
        let outer = Rect::new(0.0, 0.0, 10.0, 10.0);
        let inner = Rect::new(2.0, 2.0, 5.0, 5.0);
        let crossing = Rect::new(8.0, 8.0, 12.0, 12.0);
        let outside = Rect::new(11.0, 11.0, 12.0, 12.0);

        assert!(outer.contains(&inner));
        assert!(!outer.contains(&crossing));
        assert!(outer.intersects(&crossing));
        assert!(!outer.intersects(&outside));
    }

    #[test]
    fn square_around_point() {
        let rect = Rect::square_around(Point2d::new(1.0, 2.0), 3.0);
        assert_eq!(rect, Rect::new(-2.0, -1.0, 4.0, 5.0));
    }
}

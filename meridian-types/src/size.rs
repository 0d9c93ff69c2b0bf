use serde::{Deserialize, Serialize};

/// 2d size.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f64,
    height: f64,
}

impl Size {
    /// Creates a new size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Height.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Grows the height by the given amount.
    pub fn add_height(&mut self, delta: f64) {
        self.height += delta;
    }

    /// Sets the width to the maximum of the current width and `width`.
    pub fn expand_width(&mut self, width: f64) {
        self.width = self.width.max(width);
    }
}

//! Drawing surface abstraction.
//!
//! The engine draws through the [`Canvas`] trait, which exposes the small set
//! of primitives the feature renderer and the legend need. Backends bind it
//! to an actual rasterizer; tests use [`RecordingCanvas`] to inspect the
//! emitted primitives, and measuring passes use [`NullCanvas`].

use meridian_types::{Point2d, Rect, Size};
use serde::{Deserialize, Serialize};

use crate::Color;

/// Stroke style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pen {
    /// Stroke color.
    pub color: Color,
    /// Stroke width in device units.
    pub width: f64,
}

impl Pen {
    /// Creates a pen.
    pub fn new(color: Color, width: f64) -> Self {
        Self { color, width }
    }
}

/// Fill style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Brush {
    /// Fill color.
    pub color: Color,
}

impl Brush {
    /// Creates a brush.
    pub fn new(color: Color) -> Self {
        Self { color }
    }
}

/// An opaque raster image handle with its device size.
///
/// The engine only needs the size for placement; pixel data stays with the
/// backend under the given key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Backend key of the image.
    pub key: String,
    /// Size of the image in device units.
    pub size: Size,
}

/// Font descriptor. Sizes are in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    /// Font family name.
    pub family: String,
    /// Point size.
    pub size_pt: f64,
    /// Bold variant.
    #[serde(default)]
    pub bold: bool,
    /// Italic variant.
    #[serde(default)]
    pub italic: bool,
}

impl FontSpec {
    /// Creates a regular font of the given family and size.
    pub fn new(family: impl Into<String>, size_pt: f64) -> Self {
        Self {
            family: family.into(),
            size_pt,
            bold: false,
            italic: false,
        }
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        FontSpec::new("sans-serif", 12.0)
    }
}

/// Drawing surface the renderer and the legend paint into.
///
/// Coordinates are device units after all transforms. Polygons fill with the
/// even-odd rule, so interior rings become holes.
pub trait Canvas {
    /// Draws an open polyline.
    fn draw_polyline(&mut self, points: &[Point2d], pen: &Pen);

    /// Draws a polygon given its rings, filled with the even-odd rule.
    fn draw_polygon(&mut self, rings: &[Vec<Point2d>], pen: &Pen, brush: &Brush);

    /// Draws an axis-aligned rectangle.
    fn draw_rect(&mut self, rect: Rect, pen: &Pen, brush: &Brush);

    /// Draws an ellipse centered at `center`.
    fn draw_ellipse(&mut self, center: Point2d, rx: f64, ry: f64, pen: &Pen, brush: &Brush);

    /// Draws a straight line segment.
    fn draw_line(&mut self, from: Point2d, to: Point2d, pen: &Pen);

    /// Draws an image with its top-left corner at `top_left`.
    fn draw_image(&mut self, top_left: Point2d, image: &Image);

    /// Draws a single line of text with its baseline starting at `baseline`.
    fn draw_text(&mut self, baseline: Point2d, text: &str, font: &FontSpec, color: Color);

    /// Pushes the current canvas state (transform) onto a stack.
    fn save(&mut self);

    /// Pops the last saved canvas state.
    fn restore(&mut self);

    /// Translates subsequent drawing by the given offset.
    fn translate(&mut self, dx: f64, dy: f64);

    /// Scales subsequent drawing.
    fn scale(&mut self, sx: f64, sy: f64);
}

/// Canvas that discards everything. Used for measure-only passes.
#[derive(Debug, Default)]
pub struct NullCanvas;

impl Canvas for NullCanvas {
    fn draw_polyline(&mut self, _points: &[Point2d], _pen: &Pen) {}
    fn draw_polygon(&mut self, _rings: &[Vec<Point2d>], _pen: &Pen, _brush: &Brush) {}
    fn draw_rect(&mut self, _rect: Rect, _pen: &Pen, _brush: &Brush) {}
    fn draw_ellipse(&mut self, _center: Point2d, _rx: f64, _ry: f64, _pen: &Pen, _brush: &Brush) {}
    fn draw_line(&mut self, _from: Point2d, _to: Point2d, _pen: &Pen) {}
    fn draw_image(&mut self, _top_left: Point2d, _image: &Image) {}
    fn draw_text(&mut self, _baseline: Point2d, _text: &str, _font: &FontSpec, _color: Color) {}
    fn save(&mut self) {}
    fn restore(&mut self) {}
    fn translate(&mut self, _dx: f64, _dy: f64) {}
    fn scale(&mut self, _sx: f64, _sy: f64) {}
}

/// A single primitive recorded by [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Polyline primitive.
    Polyline {
        /// Vertices.
        points: Vec<Point2d>,
        /// Stroke.
        pen: Pen,
    },
    /// Polygon primitive.
    Polygon {
        /// Rings.
        rings: Vec<Vec<Point2d>>,
        /// Stroke.
        pen: Pen,
        /// Fill.
        brush: Brush,
    },
    /// Rectangle primitive.
    Rect {
        /// Bounds.
        rect: Rect,
        /// Stroke.
        pen: Pen,
        /// Fill.
        brush: Brush,
    },
    /// Ellipse primitive.
    Ellipse {
        /// Center point.
        center: Point2d,
        /// Horizontal radius.
        rx: f64,
        /// Vertical radius.
        ry: f64,
        /// Stroke.
        pen: Pen,
        /// Fill.
        brush: Brush,
    },
    /// Line segment primitive.
    Line {
        /// Start point.
        from: Point2d,
        /// End point.
        to: Point2d,
        /// Stroke.
        pen: Pen,
    },
    /// Image primitive.
    Image {
        /// Placement corner.
        top_left: Point2d,
        /// The image.
        image: Image,
    },
    /// Text primitive.
    Text {
        /// Baseline start.
        baseline: Point2d,
        /// The text.
        text: String,
        /// Font used.
        font: FontSpec,
        /// Text color.
        color: Color,
    },
    /// State save.
    Save,
    /// State restore.
    Restore,
    /// Translation.
    Translate(f64, f64),
    /// Scaling.
    Scale(f64, f64),
}

/// Canvas that records every primitive it receives.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    /// Creates an empty recording canvas.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded primitives in draw order.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Consumes the canvas and returns the recorded primitives.
    pub fn into_ops(self) -> Vec<DrawOp> {
        self.ops
    }
}

impl Canvas for RecordingCanvas {
    fn draw_polyline(&mut self, points: &[Point2d], pen: &Pen) {
        self.ops.push(DrawOp::Polyline {
            points: points.to_vec(),
            pen: *pen,
        });
    }

    fn draw_polygon(&mut self, rings: &[Vec<Point2d>], pen: &Pen, brush: &Brush) {
        self.ops.push(DrawOp::Polygon {
            rings: rings.to_vec(),
            pen: *pen,
            brush: *brush,
        });
    }

    fn draw_rect(&mut self, rect: Rect, pen: &Pen, brush: &Brush) {
        self.ops.push(DrawOp::Rect {
            rect,
            pen: *pen,
            brush: *brush,
        });
    }

    fn draw_ellipse(&mut self, center: Point2d, rx: f64, ry: f64, pen: &Pen, brush: &Brush) {
        self.ops.push(DrawOp::Ellipse {
            center,
            rx,
            ry,
            pen: *pen,
            brush: *brush,
        });
    }

    fn draw_line(&mut self, from: Point2d, to: Point2d, pen: &Pen) {
        self.ops.push(DrawOp::Line {
            from,
            to,
            pen: *pen,
        });
    }

    fn draw_image(&mut self, top_left: Point2d, image: &Image) {
        self.ops.push(DrawOp::Image {
            top_left,
            image: image.clone(),
        });
    }

    fn draw_text(&mut self, baseline: Point2d, text: &str, font: &FontSpec, color: Color) {
        self.ops.push(DrawOp::Text {
            baseline,
            text: text.to_string(),
            font: font.clone(),
            color,
        });
    }

    fn save(&mut self) {
        self.ops.push(DrawOp::Save);
    }

    fn restore(&mut self) {
        self.ops.push(DrawOp::Restore);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.ops.push(DrawOp::Translate(dx, dy));
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.ops.push(DrawOp::Scale(sx, sy));
    }
}

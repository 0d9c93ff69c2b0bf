//! Text measurement service for legend layout.
//!
//! All legend layout happens in millimeters. Backends that can shape text
//! provide exact metrics; [`ScaledFontMetrics`] is a deterministic
//! approximation good enough for layout tests and headless use.

use crate::render::FontSpec;

/// Millimeters per typographic point.
pub const MM_PER_PT: f64 = 25.4 / 72.0;

/// Measures text in millimeters.
pub trait TextMetrics {
    /// Width of a single line of text.
    fn width(&self, font: &FontSpec, text: &str) -> f64;

    /// Font ascent.
    fn ascent(&self, font: &FontSpec) -> f64;

    /// Font descent.
    fn descent(&self, font: &FontSpec) -> f64;

    /// Height of a single character, used as the line height of item
    /// labels.
    fn char_height(&self, font: &FontSpec, _c: char) -> f64 {
        self.ascent(font)
    }
}

/// Metrics derived proportionally from the font point size.
#[derive(Debug, Clone, Copy)]
pub struct ScaledFontMetrics {
    /// Average glyph width as a fraction of the point size.
    pub advance_ratio: f64,
}

impl Default for ScaledFontMetrics {
    fn default() -> Self {
        Self {
            advance_ratio: 0.55,
        }
    }
}

impl TextMetrics for ScaledFontMetrics {
    fn width(&self, font: &FontSpec, text: &str) -> f64 {
        text.chars().count() as f64 * font.size_pt * self.advance_ratio * MM_PER_PT
    }

    fn ascent(&self, font: &FontSpec) -> f64 {
        font.size_pt * 0.8 * MM_PER_PT
    }

    fn descent(&self, font: &FontSpec) -> f64 {
        font.size_pt * 0.2 * MM_PER_PT
    }
}

/// Splits `text` into lines on `wrap`. An empty wrap string means no
/// wrapping: the whole text is a single line.
pub fn split_for_wrapping<'a>(text: &'a str, wrap: &str) -> Vec<&'a str> {
    if wrap.is_empty() {
        vec![text]
    } else {
        text.split(wrap).collect()
    }
}

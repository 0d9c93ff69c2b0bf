//! Feature styling: symbols, symbol layers and the style trait.

use serde::{Deserialize, Serialize};

use super::feature::Feature;
use crate::render::{Brush, Image, Pen};
use crate::Color;

/// Which shape family a symbol is meant to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolShape {
    /// Point marker.
    Marker,
    /// Line stroke.
    Line,
    /// Polygon fill.
    Fill,
}

/// One drawing layer of a symbol.
///
/// A symbol draws its layers bottom to top. In symbol-level rendering the
/// `rendering_pass` of each layer places it into a global pass order shared
/// by all symbols of the style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolLayer {
    /// Outline stroke.
    pub pen: Pen,
    /// Fill.
    pub brush: Brush,
    /// Marker radius in device units, used for point shapes.
    pub point_radius: f64,
    /// Raster marker drawn instead of the default circle, when set.
    #[serde(default)]
    pub marker_image: Option<Image>,
    /// Global pass index for symbol-level rendering.
    #[serde(default)]
    pub rendering_pass: i32,
}

impl SymbolLayer {
    /// Creates a solid symbol layer.
    pub fn solid(color: Color) -> Self {
        Self {
            pen: Pen::new(color, 1.0),
            brush: Brush::new(color),
            point_radius: 2.0,
            marker_image: None,
            rendering_pass: 0,
        }
    }

    /// Sets the rendering pass.
    pub fn with_rendering_pass(mut self, pass: i32) -> Self {
        self.rendering_pass = pass;
        self
    }
}

/// A symbol: an ordered stack of symbol layers for one feature class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    /// Shape family the symbol draws.
    pub shape: SymbolShape,
    /// Drawing layers, bottom first.
    pub layers: Vec<SymbolLayer>,
    /// Per-class opacity. When any symbol of a style sets this, the style
    /// owns opacity and layer-wide transparency is not applied on top.
    #[serde(default)]
    pub opacity: Option<u8>,
}

impl Symbol {
    /// Creates a single-layer symbol.
    pub fn simple(shape: SymbolShape, color: Color) -> Self {
        Self {
            shape,
            layers: vec![SymbolLayer::solid(color)],
            opacity: None,
        }
    }

    /// Largest point radius over the symbol layers.
    pub fn max_point_radius(&self) -> f64 {
        self.layers
            .iter()
            .map(|layer| layer.point_radius)
            .fold(0.0, f64::max)
    }
}

/// Index of a symbol within a style's symbol list.
pub type SymbolId = usize;

/// Maps features to symbols.
///
/// A style owns a fixed list of symbols; feature classification returns an
/// index into that list, so the renderer can bucket features per symbol
/// without comparing symbol contents.
pub trait Style {
    /// All symbols of the style.
    fn symbols(&self) -> &[Symbol];

    /// Resolves the symbol for a feature, or `None` when no class matches.
    fn symbol_for_feature(&self, feature: &Feature) -> Option<SymbolId>;

    /// Names of the attributes classification reads.
    fn used_attributes(&self) -> Vec<String>;

    /// Whether rendering must follow global symbol levels.
    fn uses_symbol_levels(&self) -> bool;

    /// Whether the style defines per-class opacity. When true, layer-wide
    /// transparency is not applied on top of symbol colors.
    fn owns_opacity(&self) -> bool {
        self.symbols().iter().any(|symbol| symbol.opacity.is_some())
    }
}

/// Style drawing every feature with the same symbol.
#[derive(Debug, Clone)]
pub struct SingleSymbolStyle {
    symbols: [Symbol; 1],
    use_levels: bool,
}

impl SingleSymbolStyle {
    /// Creates the style.
    pub fn new(symbol: Symbol, use_levels: bool) -> Self {
        Self {
            symbols: [symbol],
            use_levels,
        }
    }
}

impl Style for SingleSymbolStyle {
    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn symbol_for_feature(&self, _feature: &Feature) -> Option<SymbolId> {
        Some(0)
    }

    fn used_attributes(&self) -> Vec<String> {
        vec![]
    }

    fn uses_symbol_levels(&self) -> bool {
        self.use_levels
    }
}

/// Style mapping an attribute value to a symbol per category.
///
/// A feature whose attribute value matches no category resolves to no
/// symbol and is skipped by the renderer.
#[derive(Debug, Clone)]
pub struct CategorizedStyle {
    attribute: String,
    attribute_index: usize,
    categories: Vec<super::feature::Value>,
    symbols: Vec<Symbol>,
    use_levels: bool,
}

impl CategorizedStyle {
    /// Creates the style. `attribute_index` is the schema index of the
    /// classification attribute named `attribute`.
    pub fn new(
        attribute: impl Into<String>,
        attribute_index: usize,
        categories: Vec<(super::feature::Value, Symbol)>,
        use_levels: bool,
    ) -> Self {
        let (categories, symbols) = categories.into_iter().unzip();
        Self {
            attribute: attribute.into(),
            attribute_index,
            categories,
            symbols,
            use_levels,
        }
    }
}

impl Style for CategorizedStyle {
    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn symbol_for_feature(&self, feature: &Feature) -> Option<SymbolId> {
        let value = feature.attributes.get(self.attribute_index)?;
        self.categories.iter().position(|category| category == value)
    }

    fn used_attributes(&self) -> Vec<String> {
        vec![self.attribute.clone()]
    }

    fn uses_symbol_levels(&self) -> bool {
        self.use_levels
    }
}

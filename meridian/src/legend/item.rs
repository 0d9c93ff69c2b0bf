//! Legend item tree.

use crate::layer::Symbol;
use crate::Color;

/// A node of the legend tree.
///
/// The node set is closed: groups nest groups and layers, layers hold symbol
/// entries, and nothing else appears in a legend.
#[derive(Debug, Clone, PartialEq)]
pub enum LegendNode {
    /// A titled group of layers or nested groups.
    Group {
        /// Group title.
        title: String,
        /// Child nodes.
        children: Vec<LegendNode>,
    },
    /// A map layer with its symbol entries.
    Layer {
        /// Layer title. An empty title hides the title row.
        title: String,
        /// Layer-wide opacity applied to classic symbol swatches.
        transparency: u8,
        /// Symbol entries of the layer.
        items: Vec<SymbolItem>,
    },
}

impl LegendNode {
    /// Creates a group node.
    pub fn group(title: impl Into<String>, children: Vec<LegendNode>) -> Self {
        LegendNode::Group {
            title: title.into(),
            children,
        }
    }

    /// Creates an opaque layer node.
    pub fn layer(title: impl Into<String>, items: Vec<SymbolItem>) -> Self {
        LegendNode::Layer {
            title: title.into(),
            transparency: 255,
            items,
        }
    }
}

/// A symbol entry within a layer node.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolItem {
    /// Classic symbol swatch: fixed-size preview, honors layer transparency.
    Vector {
        /// Class label.
        label: String,
        /// Symbol to preview.
        symbol: Symbol,
    },
    /// New-generation symbol swatch: marker previews use the real marker
    /// size, which may exceed the standard swatch box.
    VectorV2 {
        /// Class label.
        label: String,
        /// Symbol to preview.
        symbol: Symbol,
    },
    /// Flat color swatch of a raster class.
    Raster {
        /// Class label.
        label: String,
        /// Swatch color.
        color: Color,
    },
}

impl SymbolItem {
    /// The entry label.
    pub fn label(&self) -> &str {
        match self {
            SymbolItem::Vector { label, .. }
            | SymbolItem::VectorV2 { label, .. }
            | SymbolItem::Raster { label, .. } => label,
        }
    }
}

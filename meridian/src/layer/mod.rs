//! Vector feature layers: data model, sources, editing, styling, rendering
//! and snapping.

mod cache;
mod feature;
mod overlay;
mod render;
mod snap;
mod source;
mod style;
mod vector_layer;

pub use cache::GeometryCache;
pub use feature::{is_uncommitted, Feature, FeatureId, Field, Value};
pub use overlay::EditOverlay;
pub use render::{
    draw_vertex_marker, FeatureRenderer, NoopMonitor, RenderContext, RenderMonitor,
};
pub use snap::{segment_epsilon, snap_to_geometry, SnapMode, SnapStatus, SnappingResult};
pub use source::{Capabilities, FeatureQuery, FeatureSource, MemorySource, SourceError};
pub use style::{
    CategorizedStyle, SingleSymbolStyle, Style, Symbol, SymbolId, SymbolLayer, SymbolShape,
};
pub use vector_layer::VectorLayer;

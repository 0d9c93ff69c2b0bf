//! Meridian is a vector GIS engine: feature layers with editable sources,
//! styled rendering, snapping and legend composition.
//!
//! # Main components
//!
//! Everything revolves around the [`VectorLayer`](layer::VectorLayer):
//!
//! * a [`FeatureSource`](layer::FeatureSource) provides features and
//!   declares its editing [`Capabilities`](layer::Capabilities),
//! * an [`EditOverlay`](layer::EditOverlay) buffers uncommitted edits on
//!   top of the source until they are committed or rolled back,
//! * a [`Style`](layer::Style) classifies features into symbols, and the
//!   [`FeatureRenderer`](layer::FeatureRenderer) draws them onto a
//!   [`Canvas`](render::Canvas) through a
//!   [`CoordinateTransformer`](transform::CoordinateTransformer),
//! * [`snap_to_geometry`](layer::snap_to_geometry) finds the closest
//!   vertex or segment within a search tolerance.
//!
//! The [`legend`] module composes a printable legend from the layer tree,
//! packing entries into columns.
//!
//! Geometries travel between sources and layers in well-known binary form;
//! the codec lives in the `meridian-wkb` crate and the geometry model in
//! `meridian-types`.

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

pub mod clip;
mod color;
pub mod config;
pub mod error;
pub mod layer;
pub mod legend;
pub mod render;
pub mod transform;

pub use color::Color;
pub use config::{RenderConfig, VertexMarkerStyle};
pub use error::MeridianError;
pub use layer::VectorLayer;
pub use legend::{Legend, LegendConfig};

// Reexport meridian_types
pub use meridian_types;

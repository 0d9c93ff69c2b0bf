//! Feature and attribute model.

use std::fmt::{Display, Formatter};

use meridian_types::Geometry;
use serde::{Deserialize, Serialize};

/// Feature identifier.
///
/// Committed features have non-negative ids assigned by the source. Features
/// added during an edit session get temporary negative ids until commit.
pub type FeatureId = i64;

/// Whether the id belongs to a feature not yet committed to the source.
pub fn is_uncommitted(id: FeatureId) -> bool {
    id < 0
}

/// Attribute value.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// String value.
    String(String),
    /// Floating point value.
    Double(f64),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "<null>"),
            Value::String(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// A field of the attribute schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name, unique within a schema.
    pub name: String,
}

impl Field {
    /// Creates a field.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A vector feature: id, optional geometry and attribute values positioned
/// by the schema field order.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identifier of the feature.
    pub id: FeatureId,
    /// Geometry, if the feature has one.
    pub geometry: Option<Geometry>,
    /// Attribute values, one per schema field.
    pub attributes: Vec<Value>,
}

impl Feature {
    /// Creates a feature without geometry or attributes.
    pub fn new(id: FeatureId) -> Self {
        Self {
            id,
            geometry: None,
            attributes: vec![],
        }
    }

    /// Sets the geometry.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Sets the attribute values.
    pub fn with_attributes(mut self, attributes: Vec<Value>) -> Self {
        self.attributes = attributes;
        self
    }
}

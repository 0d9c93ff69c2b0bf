//! Feature source abstraction and the in-memory implementation.

use ahash::HashMap;
use meridian_types::{Geometry, Rect};
use thiserror::Error;

use super::feature::{Feature, FeatureId, Field, Value};

/// What a feature source can do beyond reading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// New features can be added.
    pub add_features: bool,
    /// Features can be deleted.
    pub delete_features: bool,
    /// Feature geometries can be changed.
    pub change_geometries: bool,
    /// Attribute values can be changed.
    pub change_attribute_values: bool,
    /// Fields can be added to the schema.
    pub add_attributes: bool,
    /// Fields can be removed from the schema.
    pub delete_attributes: bool,
}

impl Capabilities {
    /// A fully editable source.
    pub const ALL: Capabilities = Capabilities {
        add_features: true,
        delete_features: true,
        change_geometries: true,
        change_attribute_values: true,
        add_attributes: true,
        delete_attributes: true,
    };

    /// A read-only source.
    pub const NONE: Capabilities = Capabilities {
        add_features: false,
        delete_features: false,
        change_geometries: false,
        change_attribute_values: false,
        add_attributes: false,
        delete_attributes: false,
    };

    /// Whether any editing capability is present.
    pub fn any_editing(&self) -> bool {
        self.add_features
            || self.delete_features
            || self.change_geometries
            || self.change_attribute_values
            || self.add_attributes
            || self.delete_attributes
    }
}

/// Spatial and attribute filter for feature retrieval.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeatureQuery {
    /// Only return features whose geometry bounding box intersects the rect.
    pub rect: Option<Rect>,
    /// When set, only these attribute indices are fetched; the rest are
    /// returned as [`Value::Null`].
    pub attribute_subset: Option<Vec<usize>>,
    /// Whether geometries are fetched at all.
    pub with_geometry: bool,
}

impl FeatureQuery {
    /// A query returning every feature with geometry and all attributes.
    pub fn all() -> Self {
        Self {
            rect: None,
            attribute_subset: None,
            with_geometry: true,
        }
    }

    /// Restricts the query to the given rect.
    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    /// Restricts the fetched attributes to the given schema indices.
    pub fn with_attribute_subset(mut self, subset: Vec<usize>) -> Self {
        self.attribute_subset = Some(subset);
        self
    }
}

/// Errors reported by feature source operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The referenced feature does not exist in the source.
    #[error("feature {0} no longer exists in the source")]
    FeatureNotFound(FeatureId),

    /// The referenced field does not exist in the schema.
    #[error("field index {0} is out of the schema bounds")]
    FieldNotFound(usize),

    /// A field with this name already exists.
    #[error("field '{0}' already exists")]
    DuplicateField(String),

    /// The operation is not covered by the source capabilities.
    #[error("operation is not supported by the source")]
    Unsupported,
}

/// A provider of vector features.
///
/// Read access goes through [`features`](FeatureSource::features) and
/// [`feature_by_id`](FeatureSource::feature_by_id). Mutations are batched:
/// the edit overlay forwards its accumulated changes kind by kind on commit.
pub trait FeatureSource {
    /// Editing capabilities of the source.
    fn capabilities(&self) -> Capabilities;

    /// The attribute schema.
    fn schema(&self) -> &[Field];

    /// Whether features of this source carry geometry.
    fn has_geometry(&self) -> bool;

    /// Bounding rectangle of all features, if any have geometry.
    fn extent(&self) -> Option<Rect>;

    /// Number of features in the source.
    fn feature_count(&self) -> usize;

    /// Returns features matching the query.
    fn features(&self, query: &FeatureQuery) -> Vec<Feature>;

    /// Returns the feature with the given id, or `None`.
    fn feature_by_id(&self, id: FeatureId) -> Option<Feature>;

    /// Adds a batch of features, returning their assigned ids in order.
    fn add_features(&mut self, features: Vec<Feature>) -> Result<Vec<FeatureId>, SourceError>;

    /// Deletes a batch of features.
    fn delete_features(&mut self, ids: &[FeatureId]) -> Result<(), SourceError>;

    /// Replaces geometries of existing features.
    fn change_geometries(
        &mut self,
        changes: &HashMap<FeatureId, Geometry>,
    ) -> Result<(), SourceError>;

    /// Changes attribute values of existing features. Inner maps are keyed
    /// by field index.
    fn change_attribute_values(
        &mut self,
        changes: &HashMap<FeatureId, HashMap<usize, Value>>,
    ) -> Result<(), SourceError>;

    /// Appends a field to the schema.
    fn add_attribute(&mut self, field: Field) -> Result<(), SourceError>;

    /// Removes the field at the given schema index.
    fn delete_attribute(&mut self, index: usize) -> Result<(), SourceError>;
}

/// Internal feature record of [`MemorySource`]. Geometries are stored in
/// their binary form and decoded on retrieval.
#[derive(Debug, Clone)]
struct StoredFeature {
    id: FeatureId,
    wkb: Option<Vec<u8>>,
    attributes: Vec<Value>,
}

/// An editable in-memory feature source.
///
/// Geometries are kept in the engine's binary encoding, mirroring how disk
/// and network providers store them, so retrieval exercises the same decode
/// path.
#[derive(Debug, Default)]
pub struct MemorySource {
    schema: Vec<Field>,
    features: Vec<StoredFeature>,
    next_id: FeatureId,
}

impl MemorySource {
    /// Creates an empty source with the given schema.
    pub fn new(schema: Vec<Field>) -> Self {
        Self {
            schema,
            features: vec![],
            next_id: 0,
        }
    }

    fn decode(&self, stored: &StoredFeature, query: &FeatureQuery) -> Feature {
        let geometry = if query.with_geometry {
            stored.wkb.as_deref().and_then(|wkb| {
                match meridian_wkb::decode_geometry(wkb) {
                    Ok((geometry, _)) => Some(geometry),
                    Err(err) => {
                        log::error!("skipping corrupt geometry of feature {}: {err}", stored.id);
                        None
                    }
                }
            })
        } else {
            None
        };

        let attributes = match &query.attribute_subset {
            Some(subset) => stored
                .attributes
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    if subset.contains(&i) {
                        value.clone()
                    } else {
                        Value::Null
                    }
                })
                .collect(),
            None => stored.attributes.clone(),
        };

        Feature {
            id: stored.id,
            geometry,
            attributes,
        }
    }

    fn matches_rect(&self, stored: &StoredFeature, rect: &Rect) -> bool {
        let Some(wkb) = stored.wkb.as_deref() else {
            return false;
        };
        match meridian_wkb::decode_geometry(wkb) {
            Ok((geometry, _)) => geometry
                .bounding_rect()
                .is_some_and(|bounds| bounds.intersects(rect)),
            Err(_) => false,
        }
    }

    fn position(&self, id: FeatureId) -> Option<usize> {
        self.features.iter().position(|f| f.id == id)
    }
}

impl FeatureSource for MemorySource {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn schema(&self) -> &[Field] {
        &self.schema
    }

    fn has_geometry(&self) -> bool {
        true
    }

    fn extent(&self) -> Option<Rect> {
        let mut extent: Option<Rect> = None;
        for stored in &self.features {
            let Some(wkb) = stored.wkb.as_deref() else {
                continue;
            };
            let Ok((geometry, _)) = meridian_wkb::decode_geometry(wkb) else {
                continue;
            };
            if let Some(bounds) = geometry.bounding_rect() {
                extent = Some(match extent {
                    Some(extent) => extent.merge(&bounds),
                    None => bounds,
                });
            }
        }
        extent
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn features(&self, query: &FeatureQuery) -> Vec<Feature> {
        self.features
            .iter()
            .filter(|stored| match &query.rect {
                Some(rect) => self.matches_rect(stored, rect),
                None => true,
            })
            .map(|stored| self.decode(stored, query))
            .collect()
    }

    fn feature_by_id(&self, id: FeatureId) -> Option<Feature> {
        self.position(id)
            .map(|i| self.decode(&self.features[i], &FeatureQuery::all()))
    }

    fn add_features(&mut self, features: Vec<Feature>) -> Result<Vec<FeatureId>, SourceError> {
        let mut ids = Vec::with_capacity(features.len());
        for feature in features {
            let id = self.next_id;
            self.next_id += 1;
            self.features.push(StoredFeature {
                id,
                wkb: feature
                    .geometry
                    .as_ref()
                    .map(meridian_wkb::encode_geometry),
                attributes: feature.attributes,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    fn delete_features(&mut self, ids: &[FeatureId]) -> Result<(), SourceError> {
        for id in ids {
            let position = self.position(*id).ok_or(SourceError::FeatureNotFound(*id))?;
            self.features.remove(position);
        }
        Ok(())
    }

    fn change_geometries(
        &mut self,
        changes: &HashMap<FeatureId, Geometry>,
    ) -> Result<(), SourceError> {
        for (id, geometry) in changes {
            let position = self.position(*id).ok_or(SourceError::FeatureNotFound(*id))?;
            self.features[position].wkb = Some(meridian_wkb::encode_geometry(geometry));
        }
        Ok(())
    }

    fn change_attribute_values(
        &mut self,
        changes: &HashMap<FeatureId, HashMap<usize, Value>>,
    ) -> Result<(), SourceError> {
        for (id, values) in changes {
            let position = self.position(*id).ok_or(SourceError::FeatureNotFound(*id))?;
            for (index, value) in values {
                if *index >= self.schema.len() {
                    return Err(SourceError::FieldNotFound(*index));
                }
                self.features[position].attributes[*index] = value.clone();
            }
        }
        Ok(())
    }

    fn add_attribute(&mut self, field: Field) -> Result<(), SourceError> {
        if self.schema.iter().any(|f| f.name == field.name) {
            return Err(SourceError::DuplicateField(field.name));
        }
        self.schema.push(field);
        for stored in &mut self.features {
            stored.attributes.push(Value::Null);
        }
        Ok(())
    }

    fn delete_attribute(&mut self, index: usize) -> Result<(), SourceError> {
        if index >= self.schema.len() {
            return Err(SourceError::FieldNotFound(index));
        }
        self.schema.remove(index);
        for stored in &mut self.features {
            if index < stored.attributes.len() {
                stored.attributes.remove(index);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use meridian_types::Geometry;

    use super::*;

    fn source_with_points(points: &[(f64, f64)]) -> MemorySource {
        let mut source = MemorySource::new(vec![Field::new("name")]);
        let features = points
            .iter()
            .map(|(x, y)| {
                Feature::new(0)
                    .with_geometry(Geometry::point(*x, *y))
                    .with_attributes(vec![Value::String(format!("{x}:{y}"))])
            })
            .collect();
        source.add_features(features).expect("memory add succeeds");
        source
    }

    #[test]
    fn assigns_sequential_non_negative_ids() {
        let source = source_with_points(&[(0.0, 0.0), (1.0, 1.0)]);
        let ids: Vec<_> = source
            .features(&FeatureQuery::all())
            .iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn geometry_survives_codec_round_trip() {
        let source = source_with_points(&[(3.5, -2.25)]);
        let feature = source.feature_by_id(0).expect("feature exists");
        assert_eq!(feature.geometry, Some(Geometry::point(3.5, -2.25)));
    }

    #[test]
    fn rect_query_filters_by_bounding_box() {
        let source = source_with_points(&[(0.0, 0.0), (100.0, 100.0)]);
        let features =
            source.features(&FeatureQuery::all().with_rect(Rect::new(-1.0, -1.0, 1.0, 1.0)));
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, 0);
    }

    #[test]
    fn attribute_subset_masks_other_fields() {
        let mut source = MemorySource::new(vec![Field::new("a"), Field::new("b")]);
        source
            .add_features(vec![Feature::new(0)
                .with_attributes(vec![Value::Int(1), Value::Int(2)])])
            .expect("memory add succeeds");
        let features = source.features(&FeatureQuery::all().with_attribute_subset(vec![1]));
        assert_eq!(features[0].attributes, vec![Value::Null, Value::Int(2)]);
    }

    #[test]
    fn deleting_missing_feature_fails() {
        let mut source = source_with_points(&[(0.0, 0.0)]);
        assert_eq!(
            source.delete_features(&[42]),
            Err(SourceError::FeatureNotFound(42))
        );
    }

    #[test]
    fn schema_changes_keep_attributes_aligned() {
        let mut source = MemorySource::new(vec![Field::new("a"), Field::new("b")]);
        source
            .add_features(vec![Feature::new(0)
                .with_attributes(vec![Value::Int(1), Value::Int(2)])])
            .expect("memory add succeeds");

        source
            .add_attribute(Field::new("c"))
            .expect("field is new");
        source.delete_attribute(0).expect("field exists");

        assert_eq!(
            source.schema(),
            &[Field::new("b"), Field::new("c")]
        );
        let feature = source.feature_by_id(0).expect("feature exists");
        assert_eq!(feature.attributes, vec![Value::Int(2), Value::Null]);
    }
}

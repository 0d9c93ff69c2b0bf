//! Uncommitted edit overlay.
//!
//! While a layer is in editing mode, all changes accumulate here instead of
//! touching the source. The overlay tracks added features (under temporary
//! negative ids), deleted ids, changed geometries and attribute values, and
//! schema evolution. Commit forwards the accumulated changes to the source
//! kind by kind; rollback simply discards the overlay.

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use meridian_types::Geometry;

use super::feature::{is_uncommitted, Feature, FeatureId, Field, Value};
use super::source::FeatureSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldOrigin {
    /// Field exists in the source schema at the given index.
    Provider(usize),
    /// Field was added during this edit session.
    Overlay,
}

/// Edit session state of a vector layer.
#[derive(Debug)]
pub struct EditOverlay {
    fields: Vec<(Field, FieldOrigin)>,
    deleted_fields: Vec<usize>,
    added: Vec<Feature>,
    deleted: HashSet<FeatureId>,
    changed_geometries: HashMap<FeatureId, Geometry>,
    changed_attributes: HashMap<FeatureId, HashMap<usize, Value>>,
    next_id: FeatureId,
}

impl EditOverlay {
    /// Creates an empty overlay over the given source schema.
    pub fn new(schema: &[Field]) -> Self {
        Self {
            fields: schema
                .iter()
                .enumerate()
                .map(|(i, field)| (field.clone(), FieldOrigin::Provider(i)))
                .collect(),
            deleted_fields: vec![],
            added: vec![],
            deleted: HashSet::new(),
            changed_geometries: HashMap::new(),
            changed_attributes: HashMap::new(),
            next_id: -1,
        }
    }

    /// The working schema: source fields minus deletions plus additions.
    pub fn fields(&self) -> Vec<Field> {
        self.fields.iter().map(|(field, _)| field.clone()).collect()
    }

    /// Whether the overlay holds any change.
    pub fn is_modified(&self) -> bool {
        !self.added.is_empty()
            || !self.deleted.is_empty()
            || !self.changed_geometries.is_empty()
            || !self.changed_attributes.is_empty()
            || !self.deleted_fields.is_empty()
            || self
                .fields
                .iter()
                .any(|(_, origin)| *origin == FieldOrigin::Overlay)
    }

    /// Features added during the session, in insertion order.
    pub fn added(&self) -> &[Feature] {
        &self.added
    }

    /// Ids of features marked for deletion. Never contains ids of features
    /// added in the same session: deleting those removes them from the added
    /// list instead.
    pub fn deleted(&self) -> &HashSet<FeatureId> {
        &self.deleted
    }

    /// Pending geometry replacements for committed features.
    pub fn changed_geometries(&self) -> &HashMap<FeatureId, Geometry> {
        &self.changed_geometries
    }

    /// Count of features the layer would have after commit, relative to the
    /// given source count.
    pub fn pending_count(&self, source_count: usize) -> usize {
        (source_count + self.added.len()).saturating_sub(self.deleted.len())
    }

    /// Adds a feature under a fresh temporary negative id. Attribute values
    /// are padded with nulls to the working schema width.
    pub fn add_feature(&mut self, mut feature: Feature) -> FeatureId {
        feature.id = self.next_id;
        self.next_id -= 1;
        feature.attributes.resize(self.fields.len(), Value::Null);
        let id = feature.id;
        self.added.push(feature);
        id
    }

    /// Marks a feature for deletion.
    ///
    /// Deleting a feature added in this session removes it from the overlay
    /// together with any pending changes to it.
    pub fn delete_feature(&mut self, id: FeatureId) -> bool {
        if is_uncommitted(id) {
            let Some(position) = self.added.iter().position(|f| f.id == id) else {
                return false;
            };
            self.added.remove(position);
            self.changed_geometries.remove(&id);
            self.changed_attributes.remove(&id);
        } else {
            self.deleted.insert(id);
        }
        true
    }

    /// Records a geometry change.
    ///
    /// `current` is the present effective geometry of the feature; when the
    /// new geometry equals it exactly, no change is recorded.
    pub fn change_geometry(
        &mut self,
        id: FeatureId,
        geometry: Geometry,
        current: Option<&Geometry>,
    ) -> bool {
        if current == Some(&geometry) {
            return true;
        }
        if is_uncommitted(id) {
            let Some(feature) = self.added.iter_mut().find(|f| f.id == id) else {
                return false;
            };
            feature.geometry = Some(geometry);
        } else {
            self.changed_geometries.insert(id, geometry);
        }
        true
    }

    /// Records an attribute value change. `field` indexes the working
    /// schema.
    pub fn change_attribute_value(&mut self, id: FeatureId, field: usize, value: Value) -> bool {
        if field >= self.fields.len() {
            return false;
        }
        if is_uncommitted(id) {
            let Some(feature) = self.added.iter_mut().find(|f| f.id == id) else {
                return false;
            };
            feature.attributes[field] = value;
        } else {
            self.changed_attributes
                .entry(id)
                .or_default()
                .insert(field, value);
        }
        true
    }

    /// Appends a field to the working schema. Fails on an empty or duplicate
    /// name.
    pub fn add_attribute(&mut self, field: Field) -> bool {
        if field.name.is_empty() || self.fields.iter().any(|(f, _)| f.name == field.name) {
            return false;
        }
        self.fields.push((field, FieldOrigin::Overlay));
        for feature in &mut self.added {
            feature.attributes.push(Value::Null);
        }
        true
    }

    /// Removes the field at the given working schema index, remapping every
    /// pending attribute change at a higher index down by one.
    pub fn delete_attribute(&mut self, index: usize) -> bool {
        if index >= self.fields.len() {
            return false;
        }
        let (_, origin) = self.fields.remove(index);
        if let FieldOrigin::Provider(provider_index) = origin {
            self.deleted_fields.push(provider_index);
        }

        for feature in &mut self.added {
            feature.attributes.remove(index);
        }
        for values in self.changed_attributes.values_mut() {
            let remapped = values
                .drain()
                .filter(|(field, _)| *field != index)
                .map(|(field, value)| {
                    if field > index {
                        (field - 1, value)
                    } else {
                        (field, value)
                    }
                })
                .collect();
            *values = remapped;
        }
        true
    }

    /// Applies pending changes to a feature fetched from the source:
    /// geometry replacement, schema remapping and attribute value changes.
    pub fn apply_to_feature(&self, feature: &mut Feature) {
        if let Some(geometry) = self.changed_geometries.get(&feature.id) {
            feature.geometry = Some(geometry.clone());
        }

        let mut attributes = Vec::with_capacity(self.fields.len());
        for (_, origin) in &self.fields {
            attributes.push(match origin {
                FieldOrigin::Provider(index) => feature
                    .attributes
                    .get(*index)
                    .cloned()
                    .unwrap_or(Value::Null),
                FieldOrigin::Overlay => Value::Null,
            });
        }
        if let Some(values) = self.changed_attributes.get(&feature.id) {
            for (field, value) in values {
                if *field < attributes.len() {
                    attributes[*field] = value.clone();
                }
            }
        }
        feature.attributes = attributes;
    }

    /// Forwards the accumulated changes to the source.
    ///
    /// Change kinds are applied in dependency order: schema deletions, schema
    /// additions, attribute values, added features, deleted features,
    /// geometry changes. A failing kind is reported and skipped, independent
    /// kinds are still attempted. Returns the collected error messages;
    /// empty means full success. The overlay is left untouched, so a failed
    /// commit loses nothing.
    pub fn commit(&self, source: &mut dyn FeatureSource) -> Vec<String> {
        let mut errors = vec![];
        let capabilities = source.capabilities();

        if !self.deleted_fields.is_empty() {
            if capabilities.delete_attributes {
                // descending order keeps the remaining indices stable
                let mut indices = self.deleted_fields.clone();
                indices.sort_unstable_by(|a, b| b.cmp(a));
                for index in indices {
                    if let Err(err) = source.delete_attribute(index) {
                        errors.push(format!("could not delete field: {err}"));
                        break;
                    }
                }
            } else {
                errors.push("source does not support deleting fields".to_string());
            }
        }

        let added_fields: Vec<_> = self
            .fields
            .iter()
            .filter(|(_, origin)| *origin == FieldOrigin::Overlay)
            .map(|(field, _)| field.clone())
            .collect();
        if !added_fields.is_empty() {
            if capabilities.add_attributes {
                for field in added_fields {
                    if let Err(err) = source.add_attribute(field) {
                        errors.push(format!("could not add field: {err}"));
                        break;
                    }
                }
            } else {
                errors.push("source does not support adding fields".to_string());
            }
        }

        if !self.changed_attributes.is_empty() {
            if capabilities.change_attribute_values {
                if let Err(err) = source.change_attribute_values(&self.changed_attributes) {
                    errors.push(format!("could not change attribute values: {err}"));
                }
            } else {
                errors.push("source does not support changing attribute values".to_string());
            }
        }

        if !self.added.is_empty() {
            if capabilities.add_features {
                if let Err(err) = source.add_features(self.added.clone()) {
                    errors.push(format!("could not add features: {err}"));
                }
            } else {
                errors.push("source does not support adding features".to_string());
            }
        }

        if !self.deleted.is_empty() {
            if capabilities.delete_features {
                let ids: Vec<_> = self.deleted.iter().copied().collect();
                if let Err(err) = source.delete_features(&ids) {
                    errors.push(format!("could not delete features: {err}"));
                }
            } else {
                errors.push("source does not support deleting features".to_string());
            }
        }

        if !self.changed_geometries.is_empty() {
            if capabilities.change_geometries {
                if let Err(err) = source.change_geometries(&self.changed_geometries) {
                    errors.push(format!("could not change geometries: {err}"));
                }
            } else {
                errors.push("source does not support changing geometries".to_string());
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::super::source::MemorySource;
    use super::*;

    fn overlay() -> EditOverlay {
        EditOverlay::new(&[Field::new("a"), Field::new("b")])
    }

    #[test]
    fn added_features_get_descending_negative_ids() {
        let mut overlay = overlay();
        let first = overlay.add_feature(Feature::new(0));
        let second = overlay.add_feature(Feature::new(0));
        assert_eq!(first, -1);
        assert_eq!(second, -2);
    }

    #[test]
    fn deleting_added_feature_removes_it_from_overlay() {
        let mut overlay = overlay();
        let id = overlay.add_feature(Feature::new(0));
        assert!(overlay.delete_feature(id));
        assert!(overlay.added().is_empty());
        assert!(overlay.deleted().is_empty());
        assert!(!overlay.is_modified());
    }

    #[test]
    fn noop_geometry_change_is_skipped() {
        let mut overlay = overlay();
        let geometry = Geometry::point(1.0, 2.0);
        assert!(overlay.change_geometry(7, geometry.clone(), Some(&geometry)));
        assert!(overlay.changed_geometries().is_empty());

        let moved = Geometry::point(1.0, 2.000001);
        assert!(overlay.change_geometry(7, moved, Some(&geometry)));
        assert_eq!(overlay.changed_geometries().len(), 1);
    }

    #[test]
    fn deleting_field_remaps_pending_attribute_changes() {
        let mut overlay = overlay();
        overlay.change_attribute_value(5, 0, Value::Int(10));
        overlay.change_attribute_value(5, 1, Value::Int(20));

        assert!(overlay.delete_attribute(0));

        let mut feature = Feature::new(5).with_attributes(vec![Value::Int(1), Value::Int(2)]);
        overlay.apply_to_feature(&mut feature);
        // field "a" and its pending change are gone, "b" keeps its change
        assert_eq!(feature.attributes, vec![Value::Int(20)]);
    }

    #[test]
    fn added_field_appears_as_null_until_changed() {
        let mut overlay = overlay();
        assert!(overlay.add_attribute(Field::new("c")));
        assert!(!overlay.add_attribute(Field::new("c")));

        let mut feature = Feature::new(3).with_attributes(vec![Value::Int(1), Value::Int(2)]);
        overlay.apply_to_feature(&mut feature);
        assert_eq!(
            feature.attributes,
            vec![Value::Int(1), Value::Int(2), Value::Null]
        );

        overlay.change_attribute_value(3, 2, Value::Bool(true));
        let mut feature = Feature::new(3).with_attributes(vec![Value::Int(1), Value::Int(2)]);
        overlay.apply_to_feature(&mut feature);
        assert_eq!(feature.attributes[2], Value::Bool(true));
    }

    #[test]
    fn commit_forwards_all_change_kinds() {
        let mut source = MemorySource::new(vec![Field::new("a"), Field::new("b")]);
        source
            .add_features(vec![Feature::new(0)
                .with_geometry(Geometry::point(0.0, 0.0))
                .with_attributes(vec![Value::Int(1), Value::Int(2)])])
            .expect("memory add succeeds");

        let mut overlay = EditOverlay::new(source.schema());
        overlay.add_feature(
            Feature::new(0)
                .with_geometry(Geometry::point(5.0, 5.0))
                .with_attributes(vec![Value::Int(3), Value::Int(4)]),
        );
        overlay.change_geometry(0, Geometry::point(9.0, 9.0), None);
        overlay.change_attribute_value(0, 1, Value::Int(42));

        let errors = overlay.commit(&mut source);
        assert!(errors.is_empty(), "unexpected commit errors: {errors:?}");

        assert_eq!(source.feature_count(), 2);
        let feature = source.feature_by_id(0).expect("feature exists");
        assert_eq!(feature.geometry, Some(Geometry::point(9.0, 9.0)));
        assert_eq!(feature.attributes[1], Value::Int(42));
        let added = source.feature_by_id(1).expect("committed added feature");
        assert_eq!(added.geometry, Some(Geometry::point(5.0, 5.0)));
    }

    #[test]
    fn commit_error_in_one_kind_does_not_block_others() {
        let mut source = MemorySource::new(vec![Field::new("a")]);
        source
            .add_features(vec![
                Feature::new(0).with_attributes(vec![Value::Int(1)])
            ])
            .expect("memory add succeeds");

        let mut overlay = EditOverlay::new(source.schema());
        // references a feature the source never had
        overlay.change_attribute_value(99, 0, Value::Int(5));
        overlay.add_feature(Feature::new(0).with_attributes(vec![Value::Int(7)]));

        let errors = overlay.commit(&mut source);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("no longer exists"));
        // the independent add still went through
        assert_eq!(source.feature_count(), 2);
    }
}

//! The vector layer facade.
//!
//! A [`VectorLayer`] owns its feature source, style, selection, optional
//! edit overlay and the render-time geometry cache, and exposes the editing,
//! querying, snapping and rendering operations over them.

use ahash::{HashSet, HashSetExt};
use meridian_types::{Geometry, Point2d, Rect};

use super::cache::GeometryCache;
use super::feature::{is_uncommitted, Feature, FeatureId, Field, Value};
use super::overlay::EditOverlay;
use super::render::{FeatureRenderer, RenderContext};
use super::snap::{self, SnapMode, SnapStatus, SnappingResult};
use super::source::{FeatureQuery, FeatureSource};
use super::style::Style;
use crate::error::MeridianError;

/// An editable, styled vector feature layer.
pub struct VectorLayer {
    source: Box<dyn FeatureSource>,
    style: Box<dyn Style>,
    overlay: Option<EditOverlay>,
    cache: GeometryCache,
    selection: HashSet<FeatureId>,
    transparency: u8,
    read_only: bool,
    geographic_crs: bool,
    commit_errors: Vec<String>,
}

impl VectorLayer {
    /// Creates a layer over the given source and style.
    pub fn new(source: Box<dyn FeatureSource>, style: Box<dyn Style>) -> Self {
        Self {
            source,
            style,
            overlay: None,
            cache: GeometryCache::new(),
            selection: HashSet::new(),
            transparency: 255,
            read_only: false,
            geographic_crs: false,
            commit_errors: vec![],
        }
    }

    /// Marks the layer CRS as geographic, which loosens the snapping
    /// segment epsilon.
    pub fn with_geographic_crs(mut self, geographic: bool) -> Self {
        self.geographic_crs = geographic;
        self
    }

    /// Layer-wide opacity, 255 being fully opaque.
    pub fn transparency(&self) -> u8 {
        self.transparency
    }

    /// Sets layer-wide opacity.
    pub fn set_transparency(&mut self, transparency: u8) {
        self.transparency = transparency;
    }

    /// The layer style.
    pub fn style(&self) -> &dyn Style {
        &*self.style
    }

    /// Replaces the layer style.
    pub fn set_style(&mut self, style: Box<dyn Style>) {
        self.style = style;
    }

    /// Whether an edit session is open.
    pub fn is_editable(&self) -> bool {
        self.overlay.is_some()
    }

    /// Whether the open edit session holds any change.
    pub fn is_modified(&self) -> bool {
        self.overlay.as_ref().is_some_and(EditOverlay::is_modified)
    }

    /// Marks the layer read-only. Fails while an edit session is open.
    pub fn set_read_only(&mut self, read_only: bool) -> bool {
        if read_only && self.overlay.is_some() {
            return false;
        }
        self.read_only = read_only;
        true
    }

    /// The working attribute schema, including uncommitted schema changes.
    pub fn fields(&self) -> Vec<Field> {
        match &self.overlay {
            Some(overlay) => overlay.fields(),
            None => self.source.schema().to_vec(),
        }
    }

    /// Number of features the layer would have after commit.
    pub fn pending_feature_count(&self) -> usize {
        let source_count = self.source.feature_count();
        match &self.overlay {
            Some(overlay) => overlay.pending_count(source_count),
            None => source_count,
        }
    }

    /// Opens an edit session.
    ///
    /// Fails when the layer is read-only, a session is already open, or the
    /// source has no editing capability.
    pub fn start_editing(&mut self) -> bool {
        if self.read_only || self.overlay.is_some() || !self.source.capabilities().any_editing() {
            return false;
        }
        self.overlay = Some(EditOverlay::new(self.source.schema()));
        true
    }

    /// Forwards the accumulated edits to the source.
    ///
    /// On success the edit session closes. On failure the overlay is kept
    /// so no edit is lost; the reasons are available from
    /// [`commit_errors`](VectorLayer::commit_errors).
    pub fn commit_changes(&mut self) -> bool {
        let Some(overlay) = &self.overlay else {
            self.commit_errors = vec!["layer is not in editing mode".to_string()];
            return false;
        };

        self.commit_errors = overlay.commit(&mut *self.source);
        if !self.commit_errors.is_empty() {
            log::warn!(
                "commit failed with {} error(s), edits are kept",
                self.commit_errors.len()
            );
            return false;
        }

        self.overlay = None;
        self.selection.retain(|id| !is_uncommitted(*id));
        self.cache.invalidate();
        true
    }

    /// Error messages of the last commit attempt.
    pub fn commit_errors(&self) -> &[String] {
        &self.commit_errors
    }

    /// Discards all accumulated edits and closes the edit session.
    pub fn rollback(&mut self) -> bool {
        if self.overlay.take().is_none() {
            return false;
        }
        self.selection.retain(|id| !is_uncommitted(*id));
        self.cache.invalidate();
        true
    }

    /// Adds a feature to the edit session, returning its temporary id.
    pub fn add_feature(&mut self, feature: Feature) -> Option<FeatureId> {
        if !self.source.capabilities().add_features {
            return None;
        }
        let overlay = self.overlay.as_mut()?;
        let id = overlay.add_feature(feature);
        self.cache.invalidate();
        Some(id)
    }

    /// Marks a feature for deletion and removes it from the selection.
    pub fn delete_feature(&mut self, id: FeatureId) -> bool {
        if !self.source.capabilities().delete_features {
            return false;
        }
        let Some(overlay) = self.overlay.as_mut() else {
            return false;
        };
        if !overlay.delete_feature(id) {
            return false;
        }
        self.selection.remove(&id);
        self.cache.invalidate();
        true
    }

    /// Records a geometry change for the feature.
    pub fn change_geometry(&mut self, id: FeatureId, geometry: Geometry) -> bool {
        if self.overlay.is_none() || !self.source.capabilities().change_geometries {
            return false;
        }
        let current = self.feature_by_id(id).and_then(|f| f.geometry);
        let Some(overlay) = self.overlay.as_mut() else {
            return false;
        };
        if !overlay.change_geometry(id, geometry, current.as_ref()) {
            return false;
        }
        self.cache.invalidate();
        true
    }

    /// Records an attribute value change for the feature.
    pub fn change_attribute_value(&mut self, id: FeatureId, field: usize, value: Value) -> bool {
        if !self.source.capabilities().change_attribute_values {
            return false;
        }
        let Some(overlay) = self.overlay.as_mut() else {
            return false;
        };
        overlay.change_attribute_value(id, field, value)
    }

    /// Appends a field to the working schema.
    pub fn add_attribute(&mut self, field: Field) -> bool {
        if !self.source.capabilities().add_attributes {
            return false;
        }
        let Some(overlay) = self.overlay.as_mut() else {
            return false;
        };
        overlay.add_attribute(field)
    }

    /// Removes the field at the given working schema index.
    pub fn delete_attribute(&mut self, index: usize) -> bool {
        if !self.source.capabilities().delete_attributes {
            return false;
        }
        let Some(overlay) = self.overlay.as_mut() else {
            return false;
        };
        overlay.delete_attribute(index)
    }

    /// Returns the effective features matching the query: the source result
    /// with uncommitted deletions filtered out, pending changes applied and
    /// added features appended.
    pub fn features(&self, query: &FeatureQuery) -> Vec<Feature> {
        let Some(overlay) = &self.overlay else {
            return self.source.features(query);
        };

        // attribute subsets are schema-index based and unstable under
        // pending schema changes, so edit sessions fetch everything
        let mut source_query = query.clone();
        source_query.attribute_subset = None;

        let mut result: Vec<_> = self
            .source
            .features(&source_query)
            .into_iter()
            .filter(|feature| !overlay.deleted().contains(&feature.id))
            .map(|mut feature| {
                overlay.apply_to_feature(&mut feature);
                feature
            })
            .collect();

        for feature in overlay.added() {
            if let Some(rect) = &query.rect {
                let intersects = feature
                    .geometry
                    .as_ref()
                    .and_then(Geometry::bounding_rect)
                    .is_some_and(|bounds| bounds.intersects(rect));
                if !intersects {
                    continue;
                }
            }
            let mut feature = feature.clone();
            if !query.with_geometry {
                feature.geometry = None;
            }
            result.push(feature);
        }

        result
    }

    /// Returns the effective feature with the given id.
    pub fn feature_by_id(&self, id: FeatureId) -> Option<Feature> {
        match &self.overlay {
            Some(overlay) => {
                if is_uncommitted(id) {
                    return overlay.added().iter().find(|f| f.id == id).cloned();
                }
                if overlay.deleted().contains(&id) {
                    return None;
                }
                let mut feature = self.source.feature_by_id(id)?;
                overlay.apply_to_feature(&mut feature);
                Some(feature)
            }
            None => self.source.feature_by_id(id),
        }
    }

    /// Replaces an existing feature's geometry and attributes wholesale.
    pub fn update_feature(&mut self, feature: Feature) -> bool {
        let mut updated = true;
        if let Some(geometry) = feature.geometry.clone() {
            updated &= self.change_geometry(feature.id, geometry);
        }
        for (index, value) in feature.attributes.iter().enumerate() {
            updated &= self.change_attribute_value(feature.id, index, value.clone());
        }
        updated
    }

    /// Adds a feature to the selection.
    pub fn select(&mut self, id: FeatureId) {
        self.selection.insert(id);
    }

    /// Removes a feature from the selection.
    pub fn deselect(&mut self, id: FeatureId) {
        self.selection.remove(&id);
    }

    /// Replaces the selection.
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = FeatureId>) {
        self.selection = ids.into_iter().collect();
    }

    /// Clears the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Currently selected feature ids.
    pub fn selected_ids(&self) -> &HashSet<FeatureId> {
        &self.selection
    }

    /// Renders the effective features within `extent`.
    ///
    /// While an edit session is open the pass also refills the snapping
    /// geometry cache for the rendered extent.
    pub fn render(&mut self, extent: Rect, ctx: &mut RenderContext) -> Result<(), MeridianError> {
        let features = self.features(&FeatureQuery::all().with_rect(extent));
        let editing = self.overlay.is_some();

        let cache = if editing {
            self.cache.begin(extent);
            Some(&mut self.cache)
        } else {
            None
        };

        let renderer = FeatureRenderer::new(&*self.style, &self.selection)
            .with_editing(editing)
            .with_transparency(self.transparency);
        renderer.render(features, ctx, cache)
    }

    /// Snaps to the nearest vertex within `tolerance`, in layer units.
    pub fn snap_point(&self, point: Point2d, tolerance: f64) -> Option<Point2d> {
        let (status, results) = self.snap_with_context(point, tolerance, SnapMode::Vertex);
        match status {
            SnapStatus::Found => results.first().map(|r| r.snapped_point),
            _ => None,
        }
    }

    /// Searches vertices and segments within `tolerance` of `point`.
    ///
    /// Returns the search status and the matches sorted by distance. Uses
    /// the render-time geometry cache when it covers the search window and
    /// falls back to a source query otherwise.
    pub fn snap_with_context(
        &self,
        point: Point2d,
        tolerance: f64,
        mode: SnapMode,
    ) -> (SnapStatus, Vec<SnappingResult>) {
        if tolerance <= 0.0 || !self.source.has_geometry() {
            return (SnapStatus::InvalidInput, vec![]);
        }

        let search_rect = Rect::square_around(point, tolerance);
        let sqr_tolerance = tolerance * tolerance;
        let epsilon = snap::segment_epsilon(self.geographic_crs);
        let mut results = vec![];

        if self.cache.covers(&search_rect) {
            for (id, geometry) in self.cache.geometries() {
                let in_window = geometry
                    .bounding_rect()
                    .is_some_and(|bounds| bounds.intersects(&search_rect));
                if !in_window {
                    continue;
                }
                snap::snap_to_geometry(
                    id,
                    geometry,
                    point,
                    sqr_tolerance,
                    mode,
                    epsilon,
                    &mut results,
                );
            }
        } else {
            for feature in self.features(&FeatureQuery::all().with_rect(search_rect)) {
                let Some(geometry) = &feature.geometry else {
                    continue;
                };
                snap::snap_to_geometry(
                    feature.id,
                    geometry,
                    point,
                    sqr_tolerance,
                    mode,
                    epsilon,
                    &mut results,
                );
            }
        }

        if results.is_empty() {
            (SnapStatus::NothingFound, results)
        } else {
            (SnapStatus::Found, results)
        }
    }
}

//! Per-render geometry cache used by snapping.

use ahash::HashMap;
use meridian_types::{Geometry, Rect};

use super::feature::FeatureId;

/// Map-coordinate geometries collected during the last render pass, scoped
/// to the extent that was rendered.
///
/// Snapping reuses the cache when its search window lies inside the cached
/// extent and falls back to a fresh source query otherwise. Any edit
/// invalidates the cache wholesale.
#[derive(Debug, Default)]
pub struct GeometryCache {
    geometries: HashMap<FeatureId, Geometry>,
    extent: Option<Rect>,
}

impl GeometryCache {
    /// Creates an empty, invalid cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all cached geometries and the cached extent.
    pub fn invalidate(&mut self) {
        self.geometries.clear();
        self.extent = None;
    }

    /// Starts caching for a new render extent, dropping previous content.
    pub fn begin(&mut self, extent: Rect) {
        self.geometries.clear();
        self.extent = Some(extent);
    }

    /// Stores a geometry rendered in the current pass.
    pub fn insert(&mut self, id: FeatureId, geometry: Geometry) {
        if self.extent.is_some() {
            self.geometries.insert(id, geometry);
        }
    }

    /// Whether the cache is valid and its extent fully covers `rect`.
    pub fn covers(&self, rect: &Rect) -> bool {
        self.extent.as_ref().is_some_and(|extent| extent.contains(rect))
    }

    /// Cached geometries.
    pub fn geometries(&self) -> impl Iterator<Item = (FeatureId, &Geometry)> {
        self.geometries.iter().map(|(id, geometry)| (*id, geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_requires_full_containment() {
        let mut cache = GeometryCache::new();
        assert!(!cache.covers(&Rect::new(0.0, 0.0, 1.0, 1.0)));

        cache.begin(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(cache.covers(&Rect::new(1.0, 1.0, 2.0, 2.0)));
        assert!(!cache.covers(&Rect::new(5.0, 5.0, 15.0, 15.0)));
    }

    #[test]
    fn invalidate_drops_everything() {
        let mut cache = GeometryCache::new();
        cache.begin(Rect::new(0.0, 0.0, 10.0, 10.0));
        cache.insert(1, Geometry::point(1.0, 1.0));
        assert_eq!(cache.geometries().count(), 1);

        cache.invalidate();
        assert_eq!(cache.geometries().count(), 0);
        assert!(!cache.covers(&Rect::new(1.0, 1.0, 2.0, 2.0)));
    }
}

//! Feature rendering paths.
//!
//! Every path moves geometry through the same pipeline: CRS reprojection,
//! map-to-pixel transform, device range clipping, canvas primitives. The
//! paths differ in draw order:
//!
//! * in-order rendering draws each feature completely before the next one;
//! * symbol-level rendering buckets features per symbol first and replays
//!   the buckets layer by layer in the global pass order;
//! * the single-symbol path draws everything with one symbol and is kept
//!   for callers that bypass styling.

use ahash::HashSet;
use meridian_types::{Geometry, Point2d, Shape};

use super::cache::GeometryCache;
use super::feature::{Feature, FeatureId};
use super::style::{Style, Symbol, SymbolLayer};
use crate::config::{RenderConfig, VertexMarkerStyle};
use crate::error::MeridianError;
use crate::render::{Brush, Canvas, Pen};
use crate::transform::{CoordinateTransformer, TransformError};
use crate::{clip, Color};

/// Cooperative cancellation hook.
///
/// The renderer calls [`checkpoint`](RenderMonitor::checkpoint) every
/// configured number of features. Returning `false` stops the render pass at
/// the next feature boundary; partial output stays on the canvas.
pub trait RenderMonitor {
    /// Reports progress. Returns whether rendering should continue.
    fn checkpoint(&mut self, features_drawn: usize) -> bool;
}

/// Monitor that never cancels.
#[derive(Debug, Default)]
pub struct NoopMonitor;

impl RenderMonitor for NoopMonitor {
    fn checkpoint(&mut self, _features_drawn: usize) -> bool {
        true
    }
}

/// Everything a render pass draws into and through.
pub struct RenderContext<'a> {
    /// Target drawing surface.
    pub canvas: &'a mut dyn Canvas,
    /// Coordinate pipeline for this pass.
    pub transformer: &'a CoordinateTransformer,
    /// Rendering options.
    pub config: &'a RenderConfig,
    /// Cancellation hook.
    pub monitor: &'a mut dyn RenderMonitor,
}

/// Draws styled features of one layer.
pub struct FeatureRenderer<'a> {
    style: &'a dyn Style,
    selection: &'a HashSet<FeatureId>,
    editing: bool,
    transparency: u8,
}

impl<'a> FeatureRenderer<'a> {
    /// Creates a renderer for the given style.
    pub fn new(style: &'a dyn Style, selection: &'a HashSet<FeatureId>) -> Self {
        Self {
            style,
            selection,
            editing: false,
            transparency: 255,
        }
    }

    /// Enables editing decorations (vertex markers, geometry caching).
    pub fn with_editing(mut self, editing: bool) -> Self {
        self.editing = editing;
        self
    }

    /// Sets layer-wide opacity, 255 being fully opaque. Ignored when the
    /// style owns per-class opacity.
    pub fn with_transparency(mut self, transparency: u8) -> Self {
        self.transparency = transparency;
        self
    }

    /// Renders the features, choosing the path from the style.
    ///
    /// A feature that fails coordinate transformation is logged and skipped;
    /// the rest of the pass continues.
    pub fn render(
        &self,
        features: Vec<Feature>,
        ctx: &mut RenderContext,
        mut cache: Option<&mut GeometryCache>,
    ) -> Result<(), MeridianError> {
        if self.style.uses_symbol_levels() {
            self.render_levels(features, ctx, cache.as_deref_mut())
        } else {
            self.render_in_order(features, ctx, cache.as_deref_mut())
        }
    }

    fn render_in_order(
        &self,
        features: Vec<Feature>,
        ctx: &mut RenderContext,
        mut cache: Option<&mut GeometryCache>,
    ) -> Result<(), MeridianError> {
        let mut drawn = 0;
        for feature in features {
            if !self.checkpoint(drawn, ctx) {
                break;
            }

            let Some(symbol_id) = self.style.symbol_for_feature(&feature) else {
                continue;
            };
            let symbol = &self.style.symbols()[symbol_id];
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            if let Some(cache) = cache.as_deref_mut() {
                cache.insert(feature.id, geometry.clone());
            }

            let selected = self.selection.contains(&feature.id);
            let mut failed = false;
            for layer in &symbol.layers {
                if let Err(err) = self.draw_symbol_layer(geometry, symbol, layer, selected, ctx) {
                    log::warn!("skipping feature {}: {err}", feature.id);
                    failed = true;
                    break;
                }
            }
            if !failed {
                self.draw_markers_if_editing(geometry, selected, ctx);
            }
            drawn += 1;
        }
        Ok(())
    }

    fn render_levels(
        &self,
        features: Vec<Feature>,
        ctx: &mut RenderContext,
        mut cache: Option<&mut GeometryCache>,
    ) -> Result<(), MeridianError> {
        let symbols = self.style.symbols();
        let mut buckets: Vec<Vec<Feature>> = symbols.iter().map(|_| vec![]).collect();

        for feature in features {
            // a feature with no matching class is silently not rendered
            let Some(symbol_id) = self.style.symbol_for_feature(&feature) else {
                continue;
            };
            if feature.geometry.is_none() {
                continue;
            }
            if let (Some(cache), Some(geometry)) = (cache.as_deref_mut(), &feature.geometry) {
                cache.insert(feature.id, geometry.clone());
            }
            buckets[symbol_id].push(feature);
        }

        // flatten the per-symbol layer stacks into the global pass order
        let mut levels: std::collections::BTreeMap<i32, Vec<(usize, usize)>> = Default::default();
        for (symbol_id, symbol) in symbols.iter().enumerate() {
            for (layer_index, layer) in symbol.layers.iter().enumerate() {
                levels
                    .entry(layer.rendering_pass)
                    .or_default()
                    .push((symbol_id, layer_index));
            }
        }

        let mut drawn = 0;
        'levels: for items in levels.values() {
            for (symbol_id, layer_index) in items {
                let symbol = &symbols[*symbol_id];
                let layer = &symbol.layers[*layer_index];
                for feature in &buckets[*symbol_id] {
                    if !self.checkpoint(drawn, ctx) {
                        break 'levels;
                    }
                    let Some(geometry) = &feature.geometry else {
                        continue;
                    };
                    let selected = self.selection.contains(&feature.id);
                    if let Err(err) =
                        self.draw_symbol_layer(geometry, symbol, layer, selected, ctx)
                    {
                        log::warn!("skipping feature {}: {err}", feature.id);
                        continue;
                    }
                    // markers accompany every pass so they stay on top
                    self.draw_markers_if_editing(geometry, selected, ctx);
                    drawn += 1;
                }
            }
        }
        Ok(())
    }

    /// Draws all features with one explicit symbol, ignoring the style.
    ///
    /// Unlike the styled paths this one aborts the whole pass on the first
    /// coordinate transformation failure.
    pub fn render_single_symbol(
        &self,
        features: Vec<Feature>,
        symbol: &Symbol,
        ctx: &mut RenderContext,
    ) -> Result<(), MeridianError> {
        let mut drawn = 0;
        for feature in features {
            if !self.checkpoint(drawn, ctx) {
                break;
            }
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            let selected = self.selection.contains(&feature.id);
            for layer in &symbol.layers {
                self.draw_symbol_layer(geometry, symbol, layer, selected, ctx)?;
            }
            self.draw_markers_if_editing(geometry, selected, ctx);
            drawn += 1;
        }
        Ok(())
    }

    fn checkpoint(&self, drawn: usize, ctx: &mut RenderContext) -> bool {
        let interval = ctx.config.checkpoint_interval;
        if interval > 0 && drawn > 0 && drawn % interval == 0 && !ctx.monitor.checkpoint(drawn) {
            log::debug!("rendering cancelled after {drawn} features");
            return false;
        }
        true
    }

    fn effective_alpha(&self, symbol: &Symbol) -> u8 {
        if self.style.owns_opacity() {
            symbol.opacity.unwrap_or(255)
        } else {
            self.transparency
        }
    }

    fn draw_symbol_layer(
        &self,
        geometry: &Geometry,
        symbol: &Symbol,
        layer: &SymbolLayer,
        selected: bool,
        ctx: &mut RenderContext,
    ) -> Result<(), TransformError> {
        let alpha = self.effective_alpha(symbol);
        let pen_color = self.paint_color(layer.pen.color, selected, ctx);
        let pen = Pen::new(
            pen_color.with_alpha(scale_alpha(pen_color.a(), alpha)),
            layer.pen.width,
        );
        let brush_color = self.paint_color(layer.brush.color, selected, ctx);
        let brush = Brush::new(brush_color.with_alpha(scale_alpha(brush_color.a(), alpha)));

        match &geometry.shape {
            Shape::Point(point) => {
                self.draw_point(point.xy(), layer, &pen, &brush, ctx)?;
            }
            Shape::MultiPoint(points) => {
                for point in points {
                    self.draw_point(point.xy(), layer, &pen, &brush, ctx)?;
                }
            }
            Shape::LineString(points) => {
                self.draw_polyline(points, &pen, ctx)?;
            }
            Shape::MultiLineString(lines) => {
                for line in lines {
                    self.draw_polyline(line, &pen, ctx)?;
                }
            }
            Shape::Polygon(polygon) => {
                self.draw_polygon(polygon, &pen, &brush, ctx)?;
            }
            Shape::MultiPolygon(polygons) => {
                for polygon in polygons {
                    self.draw_polygon(polygon, &pen, &brush, ctx)?;
                }
            }
        }
        Ok(())
    }

    fn paint_color(&self, base: Color, selected: bool, ctx: &RenderContext) -> Color {
        if selected {
            ctx.config.selection_color
        } else {
            base
        }
    }

    fn draw_point(
        &self,
        point: Point2d,
        layer: &SymbolLayer,
        pen: &Pen,
        brush: &Brush,
        ctx: &mut RenderContext,
    ) -> Result<(), TransformError> {
        let (mut x, mut y) = (point.x, point.y);
        ctx.transformer.transform(&mut x, &mut y)?;
        if !clip::within_safe_range(&[x], &[y]) {
            return Ok(());
        }
        match &layer.marker_image {
            Some(image) => {
                let top_left = Point2d::new(
                    x - image.size.width() / 2.0,
                    y - image.size.height() / 2.0,
                );
                ctx.canvas.draw_image(top_left, image);
            }
            None => {
                ctx.canvas
                    .draw_ellipse(Point2d::new(x, y), layer.point_radius, layer.point_radius, pen, brush);
            }
        }
        Ok(())
    }

    fn draw_polyline(
        &self,
        points: &[meridian_types::Point3d],
        pen: &Pen,
        ctx: &mut RenderContext,
    ) -> Result<(), TransformError> {
        let (mut xs, mut ys) = transform_run(points, ctx.transformer)?;
        clip::trim_polyline(&mut xs, &mut ys);
        if xs.len() < 2 {
            return Ok(());
        }
        let device: Vec<_> = xs
            .iter()
            .zip(ys.iter())
            .map(|(x, y)| Point2d::new(*x, *y))
            .collect();
        ctx.canvas.draw_polyline(&device, pen);
        Ok(())
    }

    fn draw_polygon(
        &self,
        polygon: &meridian_types::Polygon,
        pen: &Pen,
        brush: &Brush,
        ctx: &mut RenderContext,
    ) -> Result<(), TransformError> {
        let mut rings = Vec::with_capacity(polygon.rings.len());
        for ring in &polygon.rings {
            let (mut xs, mut ys) = transform_run(ring, ctx.transformer)?;
            clip::trim_ring(&mut xs, &mut ys);
            if xs.len() < 3 {
                continue;
            }
            rings.push(
                xs.iter()
                    .zip(ys.iter())
                    .map(|(x, y)| Point2d::new(*x, *y))
                    .collect::<Vec<_>>(),
            );
        }
        if !rings.is_empty() {
            ctx.canvas.draw_polygon(&rings, pen, brush);
        }
        Ok(())
    }

    fn draw_markers_if_editing(&self, geometry: &Geometry, selected: bool, ctx: &mut RenderContext) {
        if !self.editing {
            return;
        }
        if ctx.config.marker_only_for_selection && !selected {
            return;
        }
        if ctx.config.vertex_marker_style == VertexMarkerStyle::None {
            return;
        }

        for part in geometry.parts() {
            let Ok((xs, ys)) = transform_run(part, ctx.transformer) else {
                continue;
            };
            for (x, y) in xs.iter().zip(ys.iter()) {
                if !clip::within_safe_range(&[*x], &[*y]) {
                    continue;
                }
                draw_vertex_marker(
                    ctx.canvas,
                    Point2d::new(*x, *y),
                    ctx.config.vertex_marker_style,
                    ctx.config.vertex_marker_size,
                );
            }
        }
    }
}

fn transform_run(
    points: &[meridian_types::Point3d],
    transformer: &CoordinateTransformer,
) -> Result<(Vec<f64>, Vec<f64>), TransformError> {
    let mut xs: Vec<_> = points.iter().map(|p| p.x).collect();
    let mut ys: Vec<_> = points.iter().map(|p| p.y).collect();
    let mut zs: Vec<_> = points.iter().map(|p| p.z).collect();
    transformer.transform_arrays(&mut xs, &mut ys, &mut zs)?;
    Ok((xs, ys))
}

fn scale_alpha(base: u8, factor: u8) -> u8 {
    ((base as u16 * factor as u16) / 255) as u8
}

/// Draws a single vertex marker centered at `center`.
pub fn draw_vertex_marker(
    canvas: &mut dyn Canvas,
    center: Point2d,
    style: VertexMarkerStyle,
    size: f64,
) {
    match style {
        VertexMarkerStyle::SemiTransparentCircle => {
            canvas.draw_ellipse(
                center,
                size,
                size,
                &Pen::new(Color::rgba(50, 100, 120, 200), 1.0),
                &Brush::new(Color::rgba(200, 200, 210, 120)),
            );
        }
        VertexMarkerStyle::Cross => {
            let pen = Pen::new(Color::RED, 1.0);
            canvas.draw_line(
                Point2d::new(center.x - size, center.y),
                Point2d::new(center.x + size, center.y),
                &pen,
            );
            canvas.draw_line(
                Point2d::new(center.x, center.y - size),
                Point2d::new(center.x, center.y + size),
                &pen,
            );
        }
        VertexMarkerStyle::None => {}
    }
}

#[cfg(test)]
mod tests {
    use ahash::{HashSet, HashSetExt};
    use meridian_types::Geometry;

    use super::super::style::{SingleSymbolStyle, Symbol, SymbolLayer, SymbolShape};
    use super::*;
    use crate::render::{DrawOp, RecordingCanvas};
    use crate::transform::{CrsTransform, MapToPixel};

    fn identity_transformer() -> CoordinateTransformer {
        CoordinateTransformer::new(MapToPixel::new(1.0, 0.0, 0.0))
    }

    fn point_feature(id: FeatureId, x: f64, y: f64) -> Feature {
        Feature::new(id).with_geometry(Geometry::point(x, y))
    }

    struct CancelAfter(usize);

    impl RenderMonitor for CancelAfter {
        fn checkpoint(&mut self, features_drawn: usize) -> bool {
            features_drawn < self.0
        }
    }

    struct FailEverything;

    impl CrsTransform for FailEverything {
        fn transform_in_place(
            &self,
            x: &mut f64,
            y: &mut f64,
            _z: &mut f64,
        ) -> Result<(), TransformError> {
            Err(TransformError { x: *x, y: *y })
        }
    }

    fn run_render(
        features: Vec<Feature>,
        style: &dyn Style,
        transformer: &CoordinateTransformer,
        config: &RenderConfig,
    ) -> Vec<DrawOp> {
        let mut canvas = RecordingCanvas::new();
        let mut monitor = NoopMonitor;
        let selection = HashSet::new();
        let mut ctx = RenderContext {
            canvas: &mut canvas,
            transformer,
            config,
            monitor: &mut monitor,
        };
        FeatureRenderer::new(style, &selection)
            .render(features, &mut ctx, None)
            .expect("styled render does not fail");
        canvas.into_ops()
    }

    #[test]
    fn in_order_path_draws_each_feature_completely() {
        let mut symbol = Symbol::simple(SymbolShape::Marker, Color::RED);
        symbol.layers.push(SymbolLayer::solid(Color::BLUE));
        let style = SingleSymbolStyle::new(symbol, false);

        let ops = run_render(
            vec![point_feature(0, 0.0, 0.0), point_feature(1, 1.0, -1.0)],
            &style,
            &identity_transformer(),
            &RenderConfig::default(),
        );

        // two layers per feature, features in order
        assert_eq!(ops.len(), 4);
        let colors: Vec<_> = ops
            .iter()
            .map(|op| match op {
                DrawOp::Ellipse { brush, .. } => brush.color,
                other => panic!("unexpected op: {other:?}"),
            })
            .collect();
        assert_eq!(
            colors,
            vec![Color::RED, Color::BLUE, Color::RED, Color::BLUE]
        );
    }

    #[test]
    fn level_path_orders_by_rendering_pass() {
        let mut symbol = Symbol::simple(SymbolShape::Marker, Color::RED);
        symbol.layers[0].rendering_pass = 1;
        symbol
            .layers
            .push(SymbolLayer::solid(Color::BLUE).with_rendering_pass(0));
        let style = SingleSymbolStyle::new(symbol, true);

        let ops = run_render(
            vec![point_feature(0, 0.0, 0.0), point_feature(1, 1.0, -1.0)],
            &style,
            &identity_transformer(),
            &RenderConfig::default(),
        );

        // pass 0 draws the blue layer for both features, then pass 1 the red
        let colors: Vec<_> = ops
            .iter()
            .map(|op| match op {
                DrawOp::Ellipse { brush, .. } => brush.color,
                other => panic!("unexpected op: {other:?}"),
            })
            .collect();
        assert_eq!(
            colors,
            vec![Color::BLUE, Color::BLUE, Color::RED, Color::RED]
        );
    }

    #[test]
    fn transform_failure_skips_feature_in_styled_path() {
        let transformer = CoordinateTransformer::with_crs(
            MapToPixel::new(1.0, 0.0, 0.0),
            Box::new(FailEverything),
        );
        let style = SingleSymbolStyle::new(Symbol::simple(SymbolShape::Marker, Color::RED), false);
        let ops = run_render(
            vec![point_feature(0, 0.0, 0.0)],
            &style,
            &transformer,
            &RenderConfig::default(),
        );
        assert!(ops.is_empty());
    }

    #[test]
    fn transform_failure_aborts_single_symbol_path() {
        let transformer = CoordinateTransformer::with_crs(
            MapToPixel::new(1.0, 0.0, 0.0),
            Box::new(FailEverything),
        );
        let style = SingleSymbolStyle::new(Symbol::simple(SymbolShape::Marker, Color::RED), false);
        let symbol = Symbol::simple(SymbolShape::Marker, Color::RED);

        let mut canvas = RecordingCanvas::new();
        let mut monitor = NoopMonitor;
        let selection = HashSet::new();
        let config = RenderConfig::default();
        let mut ctx = RenderContext {
            canvas: &mut canvas,
            transformer: &transformer,
            config: &config,
            monitor: &mut monitor,
        };
        let result = FeatureRenderer::new(&style, &selection).render_single_symbol(
            vec![point_feature(0, 0.0, 0.0)],
            &symbol,
            &mut ctx,
        );
        assert!(matches!(result, Err(MeridianError::Transform(_))));
    }

    #[test]
    fn monitor_cancels_at_checkpoint() {
        let style = SingleSymbolStyle::new(Symbol::simple(SymbolShape::Marker, Color::RED), false);
        let features: Vec<_> = (0..10).map(|i| point_feature(i, i as f64, 0.0)).collect();

        let mut canvas = RecordingCanvas::new();
        let mut monitor = CancelAfter(4);
        let selection = HashSet::new();
        let config = RenderConfig {
            checkpoint_interval: 2,
            ..RenderConfig::default()
        };
        let transformer = identity_transformer();
        let mut ctx = RenderContext {
            canvas: &mut canvas,
            transformer: &transformer,
            config: &config,
            monitor: &mut monitor,
        };
        FeatureRenderer::new(&style, &selection)
            .render(features, &mut ctx, None)
            .expect("styled render does not fail");
        assert_eq!(canvas.ops().len(), 4);
    }

    #[test]
    fn editing_draws_vertex_markers_on_top() {
        let style = SingleSymbolStyle::new(Symbol::simple(SymbolShape::Line, Color::BLACK), false);
        let feature =
            Feature::new(0).with_geometry(Geometry::line_string([(0.0, 0.0), (5.0, 5.0)]));

        let mut canvas = RecordingCanvas::new();
        let mut monitor = NoopMonitor;
        let selection = HashSet::new();
        let config = RenderConfig::default();
        let transformer = identity_transformer();
        let mut ctx = RenderContext {
            canvas: &mut canvas,
            transformer: &transformer,
            config: &config,
            monitor: &mut monitor,
        };
        FeatureRenderer::new(&style, &selection)
            .with_editing(true)
            .render(vec![feature], &mut ctx, None)
            .expect("styled render does not fail");

        let ops = canvas.ops();
        assert!(matches!(ops[0], DrawOp::Polyline { .. }));
        // cross markers: two line segments per vertex
        let lines = ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Line { .. }))
            .count();
        assert_eq!(lines, 4);
    }

    #[test]
    fn layer_transparency_scales_symbol_alpha() {
        let style = SingleSymbolStyle::new(Symbol::simple(SymbolShape::Marker, Color::RED), false);
        let mut canvas = RecordingCanvas::new();
        let mut monitor = NoopMonitor;
        let selection = HashSet::new();
        let config = RenderConfig::default();
        let transformer = identity_transformer();
        let mut ctx = RenderContext {
            canvas: &mut canvas,
            transformer: &transformer,
            config: &config,
            monitor: &mut monitor,
        };
        FeatureRenderer::new(&style, &selection)
            .with_transparency(127)
            .render(vec![point_feature(0, 0.0, 0.0)], &mut ctx, None)
            .expect("styled render does not fail");

        match &canvas.ops()[0] {
            DrawOp::Ellipse { brush, .. } => assert_eq!(brush.color.a(), 127),
            other => panic!("unexpected op: {other:?}"),
        }
    }

    #[test]
    fn style_opacity_overrides_layer_transparency() {
        let mut symbol = Symbol::simple(SymbolShape::Marker, Color::RED);
        symbol.opacity = Some(200);
        let style = SingleSymbolStyle::new(symbol, false);

        let mut canvas = RecordingCanvas::new();
        let mut monitor = NoopMonitor;
        let selection = HashSet::new();
        let config = RenderConfig::default();
        let transformer = identity_transformer();
        let mut ctx = RenderContext {
            canvas: &mut canvas,
            transformer: &transformer,
            config: &config,
            monitor: &mut monitor,
        };
        FeatureRenderer::new(&style, &selection)
            .with_transparency(10)
            .render(vec![point_feature(0, 0.0, 0.0)], &mut ctx, None)
            .expect("styled render does not fail");

        match &canvas.ops()[0] {
            DrawOp::Ellipse { brush, .. } => assert_eq!(brush.color.a(), 200),
            other => panic!("unexpected op: {other:?}"),
        }
    }
}

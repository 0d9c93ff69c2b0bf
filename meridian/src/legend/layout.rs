//! Legend layout: atoms, nucleons and column packing.
//!
//! A nucleon is one indivisible legend row (a group title, a layer title or
//! a symbol entry with its label). An atom is a run of nucleons that must
//! stay in the same column. Atoms are rebuilt from the item tree on every
//! layout pass and assigned to columns by a greedy height-balancing
//! heuristic.

use ahash::{HashMap, HashMapExt};
use meridian_types::{Point2d, Rect, Size};

use super::item::{LegendNode, SymbolItem};
use super::measure::{split_for_wrapping, TextMetrics};
use super::LegendConfig;
use crate::layer::Symbol;
use crate::render::{Brush, Canvas, Pen};
use crate::Color;

#[derive(Debug, Clone)]
pub(crate) enum NucleonContent {
    GroupTitle {
        title: String,
    },
    LayerTitle {
        title: String,
    },
    Symbol {
        item: SymbolItem,
        /// Identifies the owning layer for label alignment.
        layer_key: usize,
        transparency: u8,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Nucleon {
    pub content: NucleonContent,
    pub symbol_size: Size,
    pub label_size: Size,
    pub label_x_offset: f64,
    pub size: Size,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Atom {
    pub nucleons: Vec<Nucleon>,
    pub size: Size,
    pub column: usize,
}

/// Vertical space required above an atom, determined by its first nucleon.
pub(crate) fn space_above_atom(config: &LegendConfig, atom: &Atom) -> f64 {
    match atom.nucleons.first().map(|n| &n.content) {
        Some(NucleonContent::GroupTitle { .. }) => config.group_space,
        Some(NucleonContent::LayerTitle { .. }) => config.layer_space,
        // classic vector swatches historically get no extra space
        Some(NucleonContent::Symbol { item, .. }) => match item {
            SymbolItem::Vector { .. } => 0.0,
            SymbolItem::VectorV2 { .. } | SymbolItem::Raster { .. } => config.symbol_space,
        },
        None => 0.0,
    }
}

/// Builds the atom list from the item tree.
///
/// A group title is prepended to the first atom of the group content, so it
/// can never end a column. With `split_layer` every symbol entry after the
/// first may start a new atom; otherwise a layer is one indivisible atom.
pub(crate) fn create_atom_list(
    config: &LegendConfig,
    metrics: &dyn TextMetrics,
    nodes: &[LegendNode],
    split_layer: bool,
    next_layer_key: &mut usize,
) -> Vec<Atom> {
    let mut atoms = vec![];

    for node in nodes {
        match node {
            LegendNode::Group { title, children } => {
                let mut group_atoms =
                    create_atom_list(config, metrics, children, split_layer, next_layer_key);

                let nucleon = Nucleon {
                    content: NucleonContent::GroupTitle {
                        title: title.clone(),
                    },
                    symbol_size: Size::default(),
                    label_size: Size::default(),
                    label_x_offset: 0.0,
                    size: measure_title(metrics, config, title, &config.group_font),
                };

                if let Some(first) = group_atoms.first_mut() {
                    // reserve the internal space between the group title and
                    // the content it now shares the atom with
                    first.size.add_height(space_above_atom(config, first));
                    first.size.add_height(nucleon.size.height());
                    first.size.expand_width(nucleon.size.width());
                    first.nucleons.insert(0, nucleon);
                } else {
                    group_atoms.push(Atom {
                        size: nucleon.size,
                        nucleons: vec![nucleon],
                        column: 0,
                    });
                }
                atoms.append(&mut group_atoms);
            }
            LegendNode::Layer {
                title,
                transparency,
                items,
            } => {
                let layer_key = *next_layer_key;
                *next_layer_key += 1;

                let title_size = if title.is_empty() {
                    Size::default()
                } else {
                    measure_title(metrics, config, title, &config.layer_font)
                };
                let mut atom = Atom {
                    size: title_size,
                    nucleons: vec![Nucleon {
                        content: NucleonContent::LayerTitle {
                            title: title.clone(),
                        },
                        symbol_size: Size::default(),
                        label_size: Size::default(),
                        label_x_offset: 0.0,
                        size: title_size,
                    }],
                    column: 0,
                };

                let mut layer_atoms = vec![];
                for (j, item) in items.iter().enumerate() {
                    let nucleon = symbol_item_nucleon(
                        config,
                        metrics,
                        item,
                        layer_key,
                        *transparency,
                        None,
                        Point2d::default(),
                        0.0,
                    );

                    if !split_layer || j == 0 {
                        atom.size.expand_width(nucleon.size.width());
                        atom.size.add_height(config.symbol_space);
                        atom.size.add_height(nucleon.size.height());
                        atom.nucleons.push(nucleon);
                    } else {
                        layer_atoms.push(Atom {
                            size: nucleon.size,
                            nucleons: vec![nucleon],
                            column: 0,
                        });
                    }
                }
                atoms.push(atom);
                atoms.append(&mut layer_atoms);
            }
        }
    }

    atoms
}

/// Assigns atoms to columns, minimizing the tallest column with a greedy
/// heuristic, then aligns symbol labels per layer and column.
pub(crate) fn set_columns(config: &LegendConfig, atoms: &mut [Atom]) {
    if config.column_count == 0 {
        return;
    }

    let mut total_height = 0.0;
    let mut max_atom_height: f64 = 0.0;
    for (i, atom) in atoms.iter().enumerate() {
        if i > 0 {
            total_height += space_above_atom(config, atom);
        }
        total_height += atom.size.height();
        max_atom_height = max_atom_height.max(atom.size.height());
    }

    // Exact balancing is a bin packing problem; the greedy split below keeps
    // the running column close to the average of what remains.
    let mut current_column = 0usize;
    let mut current_column_atom_count = 0usize;
    let mut current_column_height = 0.0;
    let mut max_column_height: f64 = 0.0;
    let mut closed_columns_height = 0.0;
    let mut first = true;
    for atom in atoms.iter_mut() {
        let mut current_height = current_column_height;
        if !first {
            current_height += space_above_atom(config, atom);
        }
        current_height += atom.size.height();

        let avg_column_height =
            (total_height - closed_columns_height) / (config.column_count - current_column) as f64;
        if current_height - avg_column_height > atom.size.height() / 2.0
            && current_column_atom_count > 0
            && current_height > max_atom_height
            && current_height > max_column_height
            && current_column < config.column_count - 1
        {
            current_column += 1;
            current_column_atom_count = 0;
            closed_columns_height += current_column_height;
            current_column_height = atom.size.height();
        } else {
            current_column_height = current_height;
        }
        atom.column = current_column;
        current_column_atom_count += 1;
        max_column_height = max_column_height.max(current_column_height);

        first = false;
    }

    // Align symbol labels to the widest symbol of the same layer and column.
    let mut max_symbol_width: HashMap<(usize, usize), f64> = HashMap::new();
    for atom in atoms.iter() {
        for nucleon in &atom.nucleons {
            if let NucleonContent::Symbol { layer_key, .. } = &nucleon.content {
                let entry = max_symbol_width.entry((*layer_key, atom.column)).or_default();
                *entry = entry.max(nucleon.symbol_size.width());
            }
        }
    }
    for atom in atoms.iter_mut() {
        let column = atom.column;
        for nucleon in &mut atom.nucleons {
            if let NucleonContent::Symbol { layer_key, .. } = &nucleon.content {
                let width = max_symbol_width
                    .get(&(*layer_key, column))
                    .copied()
                    .unwrap_or(0.0);
                nucleon.label_x_offset = width + config.icon_label_space;
                nucleon.size = Size::new(
                    width + config.icon_label_space + nucleon.label_size.width(),
                    nucleon.size.height(),
                );
            }
        }
    }
}

/// Draws one atom at `point`, advancing vertically per nucleon.
pub(crate) fn draw_atom(
    config: &LegendConfig,
    metrics: &dyn TextMetrics,
    canvas: &mut dyn Canvas,
    atom: &Atom,
    point: Point2d,
) {
    let mut point = point;
    let mut first = true;
    for nucleon in &atom.nucleons {
        match &nucleon.content {
            NucleonContent::GroupTitle { title } => {
                if !first {
                    point.y += config.group_space;
                }
                draw_wrapped_title(
                    config,
                    metrics,
                    Some(canvas),
                    title,
                    &config.group_font,
                    point,
                );
            }
            NucleonContent::LayerTitle { title } => {
                if !first {
                    point.y += config.layer_space;
                }
                if !title.is_empty() {
                    draw_wrapped_title(
                        config,
                        metrics,
                        Some(canvas),
                        title,
                        &config.layer_font,
                        point,
                    );
                }
            }
            NucleonContent::Symbol {
                item,
                layer_key,
                transparency,
            } => {
                if !first {
                    point.y += config.symbol_space;
                }
                symbol_item_nucleon(
                    config,
                    metrics,
                    item,
                    *layer_key,
                    *transparency,
                    Some(canvas),
                    point,
                    nucleon.label_x_offset,
                );
            }
        }
        point.y += nucleon.size.height();
        first = false;
    }
}

/// Measures a wrapped title without drawing it.
pub(crate) fn measure_title(
    metrics: &dyn TextMetrics,
    config: &LegendConfig,
    text: &str,
    font: &crate::render::FontSpec,
) -> Size {
    draw_wrapped_title(config, metrics, None, text, font, Point2d::default())
}

/// Draws a multi-line title with ascent baselines, returning its size.
fn draw_wrapped_title(
    config: &LegendConfig,
    metrics: &dyn TextMetrics,
    mut canvas: Option<&mut dyn Canvas>,
    text: &str,
    font: &crate::render::FontSpec,
    point: Point2d,
) -> Size {
    let lines = split_for_wrapping(text, &config.wrap_char);
    let mut size = Size::default();
    let mut y = point.y;
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            y += config.line_spacing;
        }
        y += metrics.ascent(font);
        if let Some(canvas) = canvas.as_deref_mut() {
            canvas.draw_text(Point2d::new(point.x, y), line, font, config.font_color);
        }
        size.expand_width(metrics.width(font, line));
    }
    size.add_height(y - point.y);
    size
}

/// Measures a symbol entry and, when a canvas is given, draws it.
///
/// Mirrors the layout rules for symbol rows: the swatch is vertically
/// centered against a single label line, a multi-line label runs under the
/// swatch, and the label starts at `label_x_offset` from the row origin.
#[allow(clippy::too_many_arguments)]
pub(crate) fn symbol_item_nucleon(
    config: &LegendConfig,
    metrics: &dyn TextMetrics,
    item: &SymbolItem,
    layer_key: usize,
    transparency: u8,
    mut canvas: Option<&mut dyn Canvas>,
    point: Point2d,
    label_x_offset: f64,
) -> Nucleon {
    let text_height = metrics.char_height(&config.item_font, '0');
    let item_height = config.symbol_height.max(text_height);
    let swatch_y = point.y + (item_height - config.symbol_height) / 2.0;

    let symbol_size = match item {
        SymbolItem::Vector { symbol, .. } => draw_classic_swatch(
            config,
            canvas.as_deref_mut(),
            symbol,
            Point2d::new(point.x, swatch_y),
            transparency,
        ),
        SymbolItem::VectorV2 { symbol, .. } => draw_preview_swatch(
            config,
            canvas.as_deref_mut(),
            symbol,
            Point2d::new(point.x, swatch_y),
        ),
        SymbolItem::Raster { color, .. } => {
            if let Some(canvas) = canvas.as_deref_mut() {
                canvas.draw_rect(
                    Rect::new(
                        point.x,
                        swatch_y,
                        point.x + config.symbol_width,
                        swatch_y + config.symbol_height,
                    ),
                    &Pen::new(config.font_color, 0.3),
                    &Brush::new(*color),
                );
            }
            Size::new(config.symbol_width, config.symbol_height)
        }
    };

    let lines = split_for_wrapping(item.label(), &config.wrap_char);
    let mut label_size = Size::new(
        0.0,
        lines.len() as f64 * text_height + (lines.len() - 1) as f64 * config.line_spacing,
    );

    let mut label_y = if label_size.height() < symbol_size.height() {
        point.y + symbol_size.height() / 2.0 + text_height / 2.0
    } else {
        point.y + text_height
    };
    for line in &lines {
        if let Some(canvas) = canvas.as_deref_mut() {
            canvas.draw_text(
                Point2d::new(point.x + label_x_offset, label_y),
                line,
                &config.item_font,
                config.font_color,
            );
        }
        label_size.expand_width(metrics.width(&config.item_font, line));
        label_y += config.line_spacing + text_height;
    }

    let size = Size::new(
        symbol_size.width() + label_x_offset + label_size.width(),
        symbol_size.height().max(label_size.height()),
    );
    Nucleon {
        content: NucleonContent::Symbol {
            item: item.clone(),
            layer_key,
            transparency,
        },
        symbol_size,
        label_size,
        label_x_offset,
        size,
    }
}

/// Classic swatch: fixed standard box, layer transparency applied.
fn draw_classic_swatch(
    config: &LegendConfig,
    mut canvas: Option<&mut (dyn Canvas + '_)>,
    symbol: &Symbol,
    point: Point2d,
    transparency: u8,
) -> Size {
    use crate::layer::SymbolShape;

    match symbol.shape {
        SymbolShape::Marker => {
            let size = 2.0 * symbol.max_point_radius();
            if let Some(canvas) = canvas.as_deref_mut() {
                let center = Point2d::new(point.x + size / 2.0, point.y + size / 2.0);
                for layer in &symbol.layers {
                    match &layer.marker_image {
                        Some(image) => canvas.draw_image(point, image),
                        None => canvas.draw_ellipse(
                            center,
                            layer.point_radius,
                            layer.point_radius,
                            &fade_pen(&layer.pen, transparency),
                            &fade_brush(&layer.brush, transparency),
                        ),
                    }
                }
            }
            Size::new(
                size.max(config.symbol_width),
                size.max(config.symbol_height),
            )
        }
        SymbolShape::Line => {
            if let Some(canvas) = canvas.as_deref_mut() {
                let y = point.y + config.symbol_height / 2.0;
                for layer in &symbol.layers {
                    canvas.draw_line(
                        Point2d::new(point.x, y),
                        Point2d::new(point.x + config.symbol_width, y),
                        &fade_pen(&layer.pen, transparency),
                    );
                }
            }
            Size::new(config.symbol_width, config.symbol_height)
        }
        SymbolShape::Fill => {
            if let Some(canvas) = canvas.as_deref_mut() {
                for layer in &symbol.layers {
                    canvas.draw_rect(
                        Rect::new(
                            point.x,
                            point.y,
                            point.x + config.symbol_width,
                            point.y + config.symbol_height,
                        ),
                        &fade_pen(&layer.pen, transparency),
                        &fade_brush(&layer.brush, transparency),
                    );
                }
            }
            Size::new(config.symbol_width, config.symbol_height)
        }
    }
}

/// New-generation swatch: marker previews keep their real size, small ones
/// are centered within the standard box.
fn draw_preview_swatch(
    config: &LegendConfig,
    mut canvas: Option<&mut (dyn Canvas + '_)>,
    symbol: &Symbol,
    point: Point2d,
) -> Size {
    use crate::layer::SymbolShape;

    if symbol.shape != SymbolShape::Marker {
        return draw_classic_swatch(config, canvas, symbol, point, 255);
    }

    let size = 2.0 * symbol.max_point_radius();
    let width_offset = (config.symbol_width - size).max(0.0) / 2.0;
    let height_offset = (config.symbol_height - size).max(0.0) / 2.0;

    if let Some(canvas) = canvas.as_deref_mut() {
        canvas.save();
        canvas.translate(point.x + width_offset, point.y + height_offset);
        let center = Point2d::new(size / 2.0, size / 2.0);
        for layer in &symbol.layers {
            match &layer.marker_image {
                Some(image) => canvas.draw_image(Point2d::default(), image),
                None => canvas.draw_ellipse(
                    center,
                    layer.point_radius,
                    layer.point_radius,
                    &layer.pen,
                    &layer.brush,
                ),
            }
        }
        canvas.restore();
    }

    Size::new(
        size + 2.0 * width_offset,
        size + 2.0 * height_offset,
    )
}

fn fade_pen(pen: &Pen, transparency: u8) -> Pen {
    Pen::new(fade(pen.color, transparency), pen.width)
}

fn fade_brush(brush: &Brush, transparency: u8) -> Brush {
    Brush::new(fade(brush.color, transparency))
}

fn fade(color: Color, transparency: u8) -> Color {
    color.with_alpha(((color.a() as u16 * transparency as u16) / 255) as u8)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::super::measure::ScaledFontMetrics;
    use super::*;
    use crate::layer::SymbolShape;

    fn zero_space_config() -> LegendConfig {
        LegendConfig {
            group_space: 0.0,
            layer_space: 0.0,
            symbol_space: 0.0,
            ..LegendConfig::default()
        }
    }

    fn title_atom(height: f64) -> Atom {
        let size = Size::new(10.0, height);
        Atom {
            nucleons: vec![Nucleon {
                content: NucleonContent::LayerTitle {
                    title: "layer".to_string(),
                },
                symbol_size: Size::default(),
                label_size: Size::default(),
                label_x_offset: 0.0,
                size,
            }],
            size,
            column: 0,
        }
    }

    fn fill_item(label: &str, color: Color) -> SymbolItem {
        SymbolItem::Vector {
            label: label.to_string(),
            symbol: Symbol::simple(SymbolShape::Fill, color),
        }
    }

    #[test]
    fn tall_atom_goes_to_its_own_column() {
        let config = LegendConfig {
            column_count: 2,
            ..zero_space_config()
        };
        let mut atoms = vec![title_atom(10.0), title_atom(10.0), title_atom(30.0)];
        set_columns(&config, &mut atoms);
        let columns: Vec<_> = atoms.iter().map(|a| a.column).collect();
        assert_eq!(columns, vec![0, 0, 1]);
    }

    #[test]
    fn single_column_keeps_everything_together() {
        let config = zero_space_config();
        let mut atoms = vec![title_atom(10.0), title_atom(10.0), title_atom(30.0)];
        set_columns(&config, &mut atoms);
        assert!(atoms.iter().all(|a| a.column == 0));
    }

    #[test]
    fn column_count_never_exceeds_limit() {
        let config = LegendConfig {
            column_count: 2,
            ..zero_space_config()
        };
        let mut atoms: Vec<_> = (0..7).map(|_| title_atom(10.0)).collect();
        set_columns(&config, &mut atoms);
        assert!(atoms.iter().all(|a| a.column < 2));
        // columns are consecutive and start at zero
        let mut last = 0;
        for atom in &atoms {
            assert!(atom.column == last || atom.column == last + 1);
            last = atom.column;
        }
    }

    #[test]
    fn group_title_is_prepended_to_first_child_atom() {
        let config = LegendConfig::default();
        let metrics = ScaledFontMetrics::default();
        let nodes = vec![LegendNode::group(
            "base",
            vec![LegendNode::layer("water", vec![fill_item("lake", Color::BLUE)])],
        )];

        let mut key = 0;
        let atoms = create_atom_list(&config, &metrics, &nodes, false, &mut key);

        assert_eq!(atoms.len(), 1);
        assert!(matches!(
            atoms[0].nucleons[0].content,
            NucleonContent::GroupTitle { .. }
        ));
        assert!(matches!(
            atoms[0].nucleons[1].content,
            NucleonContent::LayerTitle { .. }
        ));

        // the atom accounts for the group title and the space under it
        let group_title_height = measure_title(&metrics, &config, "base", &config.group_font).height();
        let layer_atoms = create_atom_list(
            &config,
            &metrics,
            &[nodes_layer_only()],
            false,
            &mut 0,
        );
        assert_abs_diff_eq!(
            atoms[0].size.height(),
            group_title_height + config.layer_space + layer_atoms[0].size.height(),
        );
    }

    fn nodes_layer_only() -> LegendNode {
        LegendNode::layer("water", vec![fill_item("lake", Color::BLUE)])
    }

    #[test]
    fn split_layer_breaks_symbols_into_atoms() {
        let config = LegendConfig::default();
        let metrics = ScaledFontMetrics::default();
        let nodes = vec![LegendNode::layer(
            "roads",
            vec![
                fill_item("major", Color::RED),
                fill_item("minor", Color::GRAY),
                fill_item("paths", Color::GREEN),
            ],
        )];

        let mut key = 0;
        let atoms = create_atom_list(&config, &metrics, &nodes, true, &mut key);
        // title + first symbol stay together, the rest split off
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].nucleons.len(), 2);
        assert_eq!(atoms[1].nucleons.len(), 1);

        let joined = create_atom_list(&config, &metrics, &nodes, false, &mut 0);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].nucleons.len(), 4);
    }

    #[test]
    fn labels_align_to_widest_symbol_of_layer_and_column() {
        let config = LegendConfig::default();
        let metrics = ScaledFontMetrics::default();

        let narrow = Symbol {
            shape: SymbolShape::Marker,
            layers: vec![crate::layer::SymbolLayer {
                point_radius: 1.0,
                ..crate::layer::SymbolLayer::solid(Color::RED)
            }],
            opacity: None,
        };
        let wide = Symbol {
            shape: SymbolShape::Marker,
            layers: vec![crate::layer::SymbolLayer {
                point_radius: 6.0,
                ..crate::layer::SymbolLayer::solid(Color::BLUE)
            }],
            opacity: None,
        };
        let nodes = vec![LegendNode::layer(
            "points",
            vec![
                SymbolItem::VectorV2 {
                    label: "small".to_string(),
                    symbol: narrow,
                },
                SymbolItem::VectorV2 {
                    label: "large".to_string(),
                    symbol: wide,
                },
            ],
        )];

        let mut key = 0;
        let mut atoms = create_atom_list(&config, &metrics, &nodes, false, &mut key);
        set_columns(&config, &mut atoms);

        let offsets: Vec<f64> = atoms[0]
            .nucleons
            .iter()
            .filter_map(|n| match n.content {
                NucleonContent::Symbol { .. } => Some(n.label_x_offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets.len(), 2);
        assert_abs_diff_eq!(offsets[0], offsets[1]);
        // widest symbol is the 6 mm radius marker: 12 mm + icon label space
        assert_abs_diff_eq!(offsets[0], 12.0 + config.icon_label_space);
    }

    #[test]
    fn space_above_atom_depends_on_first_nucleon() {
        let config = LegendConfig::default();
        let metrics = ScaledFontMetrics::default();

        let group = create_atom_list(
            &config,
            &metrics,
            &[LegendNode::group("g", vec![])],
            false,
            &mut 0,
        );
        assert_abs_diff_eq!(space_above_atom(&config, &group[0]), config.group_space);

        let layer = create_atom_list(&config, &metrics, &[nodes_layer_only()], false, &mut 0);
        assert_abs_diff_eq!(space_above_atom(&config, &layer[0]), config.layer_space);
    }
}

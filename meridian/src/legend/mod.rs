//! Map legend: item tree, text measurement, atom/column layout and the
//! legend component itself.

mod item;
mod layout;
mod measure;

pub use item::{LegendNode, SymbolItem};
pub use measure::{split_for_wrapping, ScaledFontMetrics, TextMetrics, MM_PER_PT};


use meridian_types::{Point2d, Size};
use serde::{Deserialize, Serialize};

use self::layout::{create_atom_list, draw_atom, set_columns, space_above_atom};
use crate::render::{Canvas, FontSpec, NullCanvas};
use crate::Color;

/// Legend appearance and layout options.
///
/// Field names are stable serialization attributes; all values default to
/// the classic composer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegendConfig {
    /// Legend title. Empty hides the title block.
    pub title: String,
    /// Number of columns to lay atoms into.
    pub column_count: usize,
    /// Whether symbol entries of one layer may split across atoms.
    pub split_layer: bool,
    /// Whether all columns take the width of the widest one.
    pub equal_column_width: bool,
    /// Title font.
    pub title_font: FontSpec,
    /// Group title font.
    pub group_font: FontSpec,
    /// Layer title font.
    pub layer_font: FontSpec,
    /// Symbol label font.
    pub item_font: FontSpec,
    /// Margin between the legend content and its frame, in mm.
    pub box_space: f64,
    /// Horizontal space between columns, in mm.
    pub column_space: f64,
    /// Vertical space above a group title, in mm.
    pub group_space: f64,
    /// Vertical space above a layer title, in mm.
    pub layer_space: f64,
    /// Vertical space between symbol entries, in mm.
    pub symbol_space: f64,
    /// Horizontal space between a swatch and its label, in mm.
    pub icon_label_space: f64,
    /// Standard swatch width, in mm.
    pub symbol_width: f64,
    /// Standard swatch height, in mm.
    pub symbol_height: f64,
    /// String that splits labels into lines. Empty disables wrapping.
    pub wrap_char: String,
    /// Vertical space between wrapped lines, in mm.
    pub line_spacing: f64,
    /// Text color.
    pub font_color: Color,
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self {
            title: "Legend".to_string(),
            column_count: 1,
            split_layer: false,
            equal_column_width: false,
            title_font: FontSpec::new("sans-serif", 16.0),
            group_font: FontSpec::new("sans-serif", 14.0),
            layer_font: FontSpec::new("sans-serif", 12.0),
            item_font: FontSpec::new("sans-serif", 12.0),
            box_space: 2.0,
            column_space: 2.0,
            group_space: 2.0,
            layer_space: 2.0,
            symbol_space: 2.0,
            icon_label_space: 2.0,
            symbol_width: 7.0,
            symbol_height: 4.0,
            wrap_char: String::new(),
            line_spacing: 1.5,
            font_color: Color::BLACK,
        }
    }
}

/// A map legend over an item tree.
///
/// The legend re-measures itself after every configuration or content
/// change, so [`size`](Legend::size) is always current.
pub struct Legend {
    config: LegendConfig,
    nodes: Vec<LegendNode>,
    metrics: Box<dyn TextMetrics>,
    size: Size,
}

impl Legend {
    /// Creates an empty legend with default configuration.
    pub fn new(metrics: Box<dyn TextMetrics>) -> Self {
        let mut legend = Self {
            config: LegendConfig::default(),
            nodes: vec![],
            metrics,
            size: Size::default(),
        };
        legend.adjust_box_size();
        legend
    }

    /// Creates a legend with the given configuration.
    pub fn with_config(metrics: Box<dyn TextMetrics>, config: LegendConfig) -> Self {
        let mut legend = Self {
            config,
            nodes: vec![],
            metrics,
            size: Size::default(),
        };
        legend.adjust_box_size();
        legend
    }

    /// Current configuration.
    pub fn config(&self) -> &LegendConfig {
        &self.config
    }

    /// Replaces the configuration.
    pub fn set_config(&mut self, config: LegendConfig) {
        self.config = config;
        self.config.column_count = self.config.column_count.max(1);
        self.adjust_box_size();
    }

    /// Replaces the item tree.
    pub fn set_nodes(&mut self, nodes: Vec<LegendNode>) {
        self.nodes = nodes;
        self.adjust_box_size();
    }

    /// The item tree.
    pub fn nodes(&self) -> &[LegendNode] {
        &self.nodes
    }

    /// Sets the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.config.title = title.into();
        self.adjust_box_size();
    }

    /// Sets the column count, at least one.
    pub fn set_column_count(&mut self, count: usize) {
        self.config.column_count = count.max(1);
        self.adjust_box_size();
    }

    /// Allows or forbids splitting layers across atoms.
    pub fn set_split_layer(&mut self, split: bool) {
        self.config.split_layer = split;
        self.adjust_box_size();
    }

    /// Sets whether all columns share the widest column's width.
    pub fn set_equal_column_width(&mut self, equal: bool) {
        self.config.equal_column_width = equal;
        self.adjust_box_size();
    }

    /// Sets the label wrap string.
    pub fn set_wrap_char(&mut self, wrap: impl Into<String>) {
        self.config.wrap_char = wrap.into();
        self.adjust_box_size();
    }

    /// Size of the legend after the last layout pass.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Re-measures the legend with a discarding canvas.
    pub fn adjust_box_size(&mut self) {
        self.size = self.paint(&mut NullCanvas);
    }

    /// Paints the legend into `canvas` and returns the painted size.
    ///
    /// Layout is recomputed from scratch: atoms are rebuilt, packed into
    /// columns and drawn with a per-column vertical cursor. The title is
    /// drawn last, centered over multiple columns when it fits and
    /// left-aligned otherwise.
    pub fn paint(&self, canvas: &mut dyn Canvas) -> Size {
        let config = &self.config;
        let metrics = &*self.metrics;

        let mut layer_key = 0;
        let mut atoms =
            create_atom_list(config, metrics, &self.nodes, config.split_layer, &mut layer_key);
        set_columns(config, &mut atoms);

        let mut max_column_width = 0.0f64;
        if config.equal_column_width {
            for atom in &atoms {
                max_column_width = max_column_width.max(atom.size.width());
            }
        }

        let title_size = self.title_size();
        // group space doubles as the gap between the title and the columns
        let column_top = config.box_space + title_size.height() + config.group_space;

        let mut point = Point2d::new(config.box_space, column_top);
        let mut first_in_column = true;
        let mut column_max_height = 0.0f64;
        let mut column_width = 0.0f64;
        let mut column = 0;
        for atom in &atoms {
            if atom.column > column {
                let advance = if config.equal_column_width {
                    max_column_width
                } else {
                    column_width
                };
                point.x += config.column_space + advance;
                point.y = column_top;
                column_width = 0.0;
                column = atom.column;
                first_in_column = true;
            }
            if !first_in_column {
                point.y += space_above_atom(config, atom);
            }

            draw_atom(config, metrics, canvas, atom, point);
            column_width = column_width.max(atom.size.width());

            point.y += atom.size.height();
            column_max_height = column_max_height.max(point.y - column_top);

            first_in_column = false;
        }
        point.x += column_width + config.box_space;

        let mut size = Size::new(point.x, column_top + column_max_height + config.box_space);

        if !config.title.is_empty() {
            // center over multiple columns while the title fits, otherwise
            // align left and grow the legend to the title
            let centered = config.column_count > 1
                && title_size.width() + 2.0 * config.box_space < size.width();
            if !centered {
                size = Size::new(
                    size.width().max(title_size.width() + 2.0 * config.box_space),
                    size.height(),
                );
            }
            self.draw_title(canvas, size.width(), centered);
        }

        size
    }

    fn title_size(&self) -> Size {
        if self.config.title.is_empty() {
            return Size::default();
        }
        let font = &self.config.title_font;
        let lines = split_for_wrapping(&self.config.title, &self.config.wrap_char);
        let mut size = Size::default();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                size.add_height(self.config.line_spacing);
            }
            // a bit of slack so the last word is never clipped
            size.expand_width(self.metrics.width(font, line) + 1.0);
            size.add_height(self.metrics.ascent(font) + self.metrics.descent(font));
        }
        size
    }

    fn draw_title(&self, canvas: &mut dyn Canvas, total_width: f64, centered: bool) {
        let config = &self.config;
        let font = &config.title_font;
        let lines = split_for_wrapping(&config.title, &config.wrap_char);
        let mut y = config.box_space;
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                y += config.line_spacing;
            }
            let width = self.metrics.width(font, line);
            let x = if centered {
                (total_width - width) / 2.0
            } else {
                config.box_space
            };
            canvas.draw_text(
                Point2d::new(x, y + self.metrics.ascent(font)),
                line,
                font,
                config.font_color,
            );
            y += self.metrics.ascent(font) + self.metrics.descent(font);
        }
    }
}

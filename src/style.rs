//! Style resolver – maps inline CSS and a small set of utility classes to a
//! flat [`ComputedStyle`] consumed by the layout measurer and the PDF
//! backend.

use std::collections::BTreeMap;

use crate::dom::{DomNode, ElementNode, Tag};
use crate::pagination::PAGE_BREAK_CLASS;

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub gap: f32,
    pub grid_columns: usize,

    pub width: Dimension,
    pub height: Dimension,

    // Spacing (px)
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,

    pub border_width: f32,
    pub border_color: Color,

    // Typography
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_family: String,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub underline: bool,

    pub background_color: Color,

    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            gap: 0.0,
            grid_columns: 0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            padding_top: 0.0,
            padding_right: 0.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            border_width: 0.0,
            border_color: Color::BLACK,
            font_size: 16.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            font_family: "Helvetica".to_string(),
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.4,
            underline: false,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Grid,
    Inline,
    InlineBlock,
    ListItem,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against the containing block width.
    pub fn resolve(self, parent: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Px(v) => Some(v),
            Dimension::Percent(p) => Some(parent * p / 100.0),
        }
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Hex or one of the common CSS color keywords.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "black" => Some(Self::BLACK),
            "white" => Some(Self::WHITE),
            "transparent" => Some(Self::TRANSPARENT),
            "red" => Some(Self::rgb(1.0, 0.0, 0.0)),
            "gray" | "grey" => Some(Self::rgb(0.5, 0.5, 0.5)),
            other => Self::from_hex(other),
        }
    }
}

/// Utility colour palette for `text-*`, `bg-*` and `border-*` classes.
const PALETTE: &[(&str, &str)] = &[
    ("white", "#ffffff"),
    ("black", "#000000"),
    ("gray-100", "#f3f4f6"),
    ("gray-200", "#e5e7eb"),
    ("gray-300", "#d1d5db"),
    ("gray-500", "#6b7280"),
    ("gray-700", "#374151"),
    ("gray-900", "#111827"),
    ("red-500", "#ef4444"),
    ("blue-500", "#3b82f6"),
    ("green-500", "#22c55e"),
    ("yellow-500", "#eab308"),
];

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting text properties from its parent.
pub fn resolve_style(element: &ElementNode, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = ComputedStyle::default();

    if let Some(p) = parent {
        style.font_size = p.font_size;
        style.font_weight = p.font_weight;
        style.font_style = p.font_style;
        style.font_family = p.font_family.clone();
        style.color = p.color;
        style.text_align = p.text_align;
        style.line_height = p.line_height;
    }

    apply_tag_defaults(&mut style, &element.tag);

    for class in element.classes() {
        apply_utility_class(&mut style, class);
    }

    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline);
    }

    style
}

fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    match tag {
        Tag::H1 | Tag::H2 | Tag::H3 => {
            let (size, top, bottom) = match tag {
                Tag::H1 => (32.0, 16.0, 12.0),
                Tag::H2 => (24.0, 14.0, 10.0),
                _ => (20.0, 12.0, 8.0),
            };
            s.font_size = size;
            s.font_weight = FontWeight::Bold;
            s.margin_top = top;
            s.margin_bottom = bottom;
        }
        Tag::P => s.margin_bottom = 10.0,
        Tag::Ul | Tag::Ol => {
            s.margin_bottom = 10.0;
            s.padding_left = 24.0;
        }
        Tag::Li => {
            s.display = Display::ListItem;
            s.margin_bottom = 4.0;
        }
        Tag::Table => {
            s.display = Display::Grid;
            s.border_width = 1.0;
        }
        Tag::Tr => s.display = Display::TableRow,
        Tag::Td | Tag::Th => {
            s.display = Display::TableCell;
            s.padding_top = 4.0;
            s.padding_right = 8.0;
            s.padding_bottom = 4.0;
            s.padding_left = 8.0;
            s.border_width = 1.0;
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
                s.background_color = Color::rgb(0.93, 0.93, 0.93);
            }
        }
        Tag::Span => s.display = Display::Inline,
        Tag::Img | Tag::Button => s.display = Display::InlineBlock,
        Tag::Head | Tag::Iframe => s.display = Display::None,
        Tag::Div | Tag::Section | Tag::Body | Tag::Html | Tag::Unknown(_) => {}
    }
}

fn apply_utility_class(s: &mut ComputedStyle, class: &str) {
    match class {
        PAGE_BREAK_CLASS => s.page_break_before = true,

        "flex" => s.display = Display::Flex,
        "grid" => s.display = Display::Grid,
        "block" => s.display = Display::Block,
        "inline" => s.display = Display::Inline,
        "inline-block" => s.display = Display::InlineBlock,
        "hidden" => s.display = Display::None,

        "flex-row" => s.flex_direction = FlexDirection::Row,
        "flex-col" => s.flex_direction = FlexDirection::Column,
        "flex-1" => {
            s.flex_grow = 1.0;
            s.flex_shrink = 1.0;
        }

        "font-bold" => s.font_weight = FontWeight::Bold,
        "font-normal" => s.font_weight = FontWeight::Normal,
        "italic" => s.font_style = FontStyle::Italic,
        "underline" => s.underline = true,

        "text-left" => s.text_align = TextAlign::Left,
        "text-center" => s.text_align = TextAlign::Center,
        "text-right" => s.text_align = TextAlign::Right,

        "text-xs" => s.font_size = 12.0,
        "text-sm" => s.font_size = 14.0,
        "text-base" => s.font_size = 16.0,
        "text-lg" => s.font_size = 18.0,
        "text-xl" => s.font_size = 20.0,
        "text-2xl" => s.font_size = 24.0,
        "text-3xl" => s.font_size = 30.0,

        "w-full" => s.width = Dimension::Percent(100.0),
        "w-1/2" => s.width = Dimension::Percent(50.0),

        "break-before" => s.page_break_before = true,
        "break-after" => s.page_break_after = true,
        "break-inside-avoid" => s.page_break_inside_avoid = true,

        _ => {
            apply_spacing_class(s, class);
            apply_color_class(s, class);
            apply_sizing_class(s, class);
        }
    }
}

/// `p-4`, `mt-2`, `mx-1` … with Tailwind's 4px unit.
fn apply_spacing_class(s: &mut ComputedStyle, class: &str) {
    let Some((prefix, value)) = class.rsplit_once('-') else {
        return;
    };
    let Ok(units) = value.parse::<f32>() else {
        return;
    };
    let v = units * 4.0;
    let (target_margin, sides) = match prefix {
        "p" => (false, "trbl"),
        "px" => (false, "rl"),
        "py" => (false, "tb"),
        "pt" => (false, "t"),
        "pr" => (false, "r"),
        "pb" => (false, "b"),
        "pl" => (false, "l"),
        "m" => (true, "trbl"),
        "mx" => (true, "rl"),
        "my" => (true, "tb"),
        "mt" => (true, "t"),
        "mr" => (true, "r"),
        "mb" => (true, "b"),
        "ml" => (true, "l"),
        "gap" => {
            s.gap = v;
            return;
        }
        _ => return,
    };
    for side in sides.chars() {
        let slot = match (target_margin, side) {
            (true, 't') => &mut s.margin_top,
            (true, 'r') => &mut s.margin_right,
            (true, 'b') => &mut s.margin_bottom,
            (true, _) => &mut s.margin_left,
            (false, 't') => &mut s.padding_top,
            (false, 'r') => &mut s.padding_right,
            (false, 'b') => &mut s.padding_bottom,
            (false, _) => &mut s.padding_left,
        };
        *slot = v;
    }
}

fn apply_color_class(s: &mut ComputedStyle, class: &str) {
    let lookup = |name: &str| {
        PALETTE
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, hex)| Color::from_hex(hex))
    };
    if let Some(c) = class.strip_prefix("text-").and_then(lookup) {
        s.color = c;
    } else if let Some(c) = class.strip_prefix("bg-").and_then(lookup) {
        s.background_color = c;
    } else if let Some(c) = class.strip_prefix("border-").and_then(lookup) {
        s.border_color = c;
    }
}

fn apply_sizing_class(s: &mut ComputedStyle, class: &str) {
    if let Some(n) = class.strip_prefix("grid-cols-").and_then(|r| r.parse().ok()) {
        s.grid_columns = n;
    } else if let Some(v) = class.strip_prefix("w-").and_then(|r| r.parse::<f32>().ok()) {
        s.width = Dimension::Px(v * 4.0);
    } else if let Some(v) = class.strip_prefix("h-").and_then(|r| r.parse::<f32>().ok()) {
        s.height = Dimension::Px(v * 4.0);
    }
}

// ---------------------------------------------------------------------------
// Inline style parsing (limited subset)
// ---------------------------------------------------------------------------

pub fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in style_str.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        apply_css_property(s, prop.trim(), val.trim());
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    let breaks = val == "always" || val == "page";
    match prop {
        "display" => {
            s.display = match val {
                "flex" => Display::Flex,
                "grid" => Display::Grid,
                "block" => Display::Block,
                "inline" => Display::Inline,
                "inline-block" => Display::InlineBlock,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = match val {
                "column" => FlexDirection::Column,
                _ => FlexDirection::Row,
            }
        }
        "font-size" => set_px(&mut s.font_size, val),
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-style" => {
            s.font_style = if val == "italic" {
                FontStyle::Italic
            } else {
                FontStyle::Normal
            }
        }
        "text-decoration" => s.underline = val.contains("underline"),
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "width" => s.width = parse_dimension(val),
        "height" => s.height = parse_dimension(val),
        "margin" => apply_box_shorthand(
            val,
            [
                &mut s.margin_top,
                &mut s.margin_right,
                &mut s.margin_bottom,
                &mut s.margin_left,
            ],
        ),
        "margin-top" => set_px(&mut s.margin_top, val),
        "margin-right" => set_px(&mut s.margin_right, val),
        "margin-bottom" => set_px(&mut s.margin_bottom, val),
        "margin-left" => set_px(&mut s.margin_left, val),
        "padding" => apply_box_shorthand(
            val,
            [
                &mut s.padding_top,
                &mut s.padding_right,
                &mut s.padding_bottom,
                &mut s.padding_left,
            ],
        ),
        "padding-top" => set_px(&mut s.padding_top, val),
        "padding-right" => set_px(&mut s.padding_right, val),
        "padding-bottom" => set_px(&mut s.padding_bottom, val),
        "padding-left" => set_px(&mut s.padding_left, val),
        "border-width" => set_px(&mut s.border_width, val),
        "border" => {
            for part in val.split_whitespace() {
                if let Some(px) = parse_px(part) {
                    s.border_width = px;
                } else if let Some(c) = Color::parse(part) {
                    s.border_color = c;
                }
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_color = c;
            }
        }
        "line-height" => {
            if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(px) = parse_px(val) {
                s.line_height = px / s.font_size;
            }
        }
        "gap" => set_px(&mut s.gap, val),
        "break-before" | "page-break-before" => s.page_break_before = breaks,
        "break-after" | "page-break-after" => s.page_break_after = breaks,
        "page-break-inside" | "break-inside" => s.page_break_inside_avoid = val == "avoid",
        _ => {}
    }
}

fn set_px(slot: &mut f32, val: &str) {
    if let Some(px) = parse_px(val) {
        *slot = px;
    }
}

/// Parse a CSS length in px (or unitless); `pt` is converted at 96 dpi.
pub fn parse_px(s: &str) -> Option<f32> {
    let s = s.trim();
    if let Some(pt) = s.strip_suffix("pt") {
        return pt.trim().parse::<f32>().ok().map(|v| v * 96.0 / 72.0);
    }
    s.trim_end_matches("px").trim().parse().ok()
}

fn parse_dimension(s: &str) -> Dimension {
    let s = s.trim();
    if s == "auto" {
        Dimension::Auto
    } else if let Some(p) = s.strip_suffix('%') {
        p.parse().map(Dimension::Percent).unwrap_or(Dimension::Auto)
    } else {
        parse_px(s).map(Dimension::Px).unwrap_or(Dimension::Auto)
    }
}

/// CSS box shorthand with 1–4 values in top/right/bottom/left order.
fn apply_box_shorthand(val: &str, [top, right, bottom, left]: [&mut f32; 4]) {
    let parts: Vec<f32> = val.split_whitespace().filter_map(parse_px).collect();
    let (t, r, b, l) = match parts[..] {
        [a] => (a, a, a, a),
        [v, h] => (v, h, v, h),
        [t, h, b] => (t, h, b, h),
        [t, r, b, l] => (t, r, b, l),
        _ => return,
    };
    *top = t;
    *right = r;
    *bottom = b;
    *left = l;
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        attrs: BTreeMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

/// Build a styled tree from a DOM tree, resolving styles top-down.
pub fn build_styled_tree(
    nodes: &[DomNode],
    parent_style: Option<&ComputedStyle>,
) -> Vec<StyledNode> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) => result.push(build_styled_element(e, parent_style)),
            DomNode::Text(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                // Text runs inherit typography only; box properties stay on
                // the enclosing element.
                let inherited = parent_style.cloned().unwrap_or_default();
                let style = ComputedStyle {
                    display: Display::Inline,
                    font_size: inherited.font_size,
                    font_weight: inherited.font_weight,
                    font_style: inherited.font_style,
                    font_family: inherited.font_family,
                    color: inherited.color,
                    text_align: inherited.text_align,
                    line_height: inherited.line_height,
                    underline: inherited.underline,
                    ..ComputedStyle::default()
                };
                result.push(StyledNode::Text {
                    text: text.clone(),
                    style,
                });
            }
        }
    }
    result
}

/// Style a single element and its subtree.
pub fn build_styled_element(e: &ElementNode, parent_style: Option<&ComputedStyle>) -> StyledNode {
    let style = resolve_style(e, parent_style);
    let children = build_styled_tree(&e.children, Some(&style));
    StyledNode::Element {
        tag: e.tag.clone(),
        style,
        children,
        attrs: e.attributes.clone(),
    }
}

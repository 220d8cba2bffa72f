//! Layout engine – uses Taffy to compute block/flex/grid layout from a
//! styled DOM tree.
//!
//! Two consumers: [`crate::measure::TaffyMeasure`] asks for the rendered
//! height of a single content child, and the PDF backend asks for the
//! positioned box tree of the whole content root.

use std::collections::HashMap;

use taffy::prelude::*;

use crate::dom::Tag;
use crate::fonts::{wrap_text, FontKey, FontManager};
use crate::style::{self, ComputedStyle, StyledNode};

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxContent {
    None,
    /// Pre-wrapped lines with their measured widths.
    Text { lines: Vec<String>, widths: Vec<f32> },
    Image { src: String },
    ListItem { marker: String },
}

fn taffy_err(e: taffy::TaffyError) -> String {
    format!("layout error: {e}")
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    styles: HashMap<NodeId, ComputedStyle>,
    content: HashMap<NodeId, BoxContent>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            styles: HashMap::new(),
            content: HashMap::new(),
        }
    }

    fn collect_inline_text(node: &StyledNode) -> String {
        match node {
            StyledNode::Text { text, .. } => text.clone(),
            StyledNode::Element { children, .. } => {
                children.iter().map(Self::collect_inline_text).collect()
            }
        }
    }

    fn all_inline(children: &[StyledNode]) -> bool {
        children.iter().all(|c| match c {
            StyledNode::Text { .. } => true,
            StyledNode::Element {
                tag,
                style,
                children,
                ..
            } => {
                *tag != Tag::Img
                    && style.display == style::Display::Inline
                    && Self::all_inline(children)
            }
        })
    }

    fn build_node(
        &mut self,
        node: &StyledNode,
        width: f32,
        inline_parent: bool,
    ) -> Result<NodeId, String> {
        match node {
            StyledNode::Text { text, style } => self.build_text(text, style, width, inline_parent),
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => {
                let src = attrs.get("src").map(String::as_str);
                self.build_element(tag, style, children, src, width)
            }
        }
    }

    fn build_text(
        &mut self,
        text: &str,
        style: &ComputedStyle,
        width: f32,
        inline_parent: bool,
    ) -> Result<NodeId, String> {
        let key = FontKey::new(
            &style.font_family,
            style.font_weight == style::FontWeight::Bold,
            style.font_style == style::FontStyle::Italic,
        );
        let normalised = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let lines = wrap_text(&normalised, style.font_size, &key, width, self.fonts);
        let widths: Vec<f32> = lines
            .iter()
            .map(|l| self.fonts.measure_text_width(l, style.font_size, &key))
            .collect();
        let line_height = self.fonts.line_height_px(style.font_size, style.line_height);
        let text_width = widths.iter().copied().fold(0.0f32, f32::max);

        let taffy_style = Style {
            size: Size {
                width: if inline_parent {
                    Dimension::Length(text_width)
                } else {
                    Dimension::Percent(1.0)
                },
                height: Dimension::Length(lines.len() as f32 * line_height),
            },
            flex_shrink: 0.0,
            ..Default::default()
        };
        let node = self.taffy.new_leaf(taffy_style).map_err(taffy_err)?;
        self.styles.insert(node, style.clone());
        self.content
            .insert(node, BoxContent::Text { lines, widths });
        Ok(node)
    }

    fn build_element(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        src: Option<&str>,
        parent_width: f32,
    ) -> Result<NodeId, String> {
        let own_width = style.width.resolve(parent_width).unwrap_or(parent_width)
            - style.margin_left
            - style.margin_right;
        let inner_width = (own_width
            - style.padding_left
            - style.padding_right
            - 2.0 * style.border_width)
            .max(1.0);

        let mut style = style.clone();
        if *tag == Tag::Img {
            if let Some(resolved) = resolve_image_size(src.unwrap_or(""), &style, parent_width) {
                style = resolved;
            }
        }

        let mut child_nodes = Vec::new();
        let paragraph_like = matches!(
            tag,
            Tag::P | Tag::H1 | Tag::H2 | Tag::H3 | Tag::Li | Tag::Td | Tag::Th | Tag::Button
        ) || style.display == style::Display::Block;

        if paragraph_like && !children.is_empty() && Self::all_inline(children) {
            // Inline runs inside a block flow as one wrapped text box.
            let combined: String = children.iter().map(Self::collect_inline_text).collect();
            if !combined.trim().is_empty() {
                child_nodes.push(self.build_text(&combined, &style, inner_width, false)?);
            }
        } else {
            let row = matches!(
                style.display,
                style::Display::Inline | style::Display::TableRow
            ) || (style.display == style::Display::Flex
                && style.flex_direction == style::FlexDirection::Row);
            let element_count = children
                .iter()
                .filter(|c| matches!(c, StyledNode::Element { .. }))
                .count()
                .max(1);
            let child_width = if row && style.display != style::Display::Inline {
                let gaps = style.gap * element_count.saturating_sub(1) as f32;
                ((inner_width - gaps) / element_count as f32).max(1.0)
            } else if style.display == style::Display::Grid && style.grid_columns > 1 {
                (inner_width / style.grid_columns as f32).max(1.0)
            } else {
                inner_width
            };

            let mut list_counter = 0u32;
            for child in children {
                let id = self.build_node(child, child_width, style.display == style::Display::Inline)?;
                if let StyledNode::Element { tag: Tag::Li, .. } = child {
                    list_counter += 1;
                    let marker = if *tag == Tag::Ol {
                        format!("{list_counter}. ")
                    } else {
                        "\u{2022} ".to_string()
                    };
                    self.content.insert(id, BoxContent::ListItem { marker });
                }
                child_nodes.push(id);
            }
        }

        let taffy_style = to_taffy_style(&style, tag);
        let node = self
            .taffy
            .new_with_children(taffy_style, &child_nodes)
            .map_err(taffy_err)?;
        if *tag == Tag::Img {
            let src = src.unwrap_or_default().to_string();
            self.content.insert(node, BoxContent::Image { src });
        }
        self.styles.insert(node, style);
        Ok(node)
    }

    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, String> {
        let layout = self.taffy.layout(node).map_err(taffy_err)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;
        let children = self
            .taffy
            .children(node)
            .map_err(taffy_err)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style: self.styles.get(&node).cloned().unwrap_or_default(),
            content: self
                .content
                .get(&node)
                .cloned()
                .unwrap_or(BoxContent::None),
            children,
        })
    }

    /// Wrap `children` in a fixed-width column root and run layout.
    fn layout_root(&mut self, children: &[NodeId], width: f32) -> Result<NodeId, String> {
        let root_style = Style {
            display: Display::Flex,
            flex_direction: FlexDirection::Column,
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Auto,
            },
            ..Default::default()
        };
        let root = self
            .taffy
            .new_with_children(root_style, children)
            .map_err(taffy_err)?;
        self.taffy
            .compute_layout(
                root,
                Size {
                    width: AvailableSpace::Definite(width),
                    height: AvailableSpace::MaxContent,
                },
            )
            .map_err(taffy_err)?;
        Ok(root)
    }
}

fn lpa(v: f32) -> LengthPercentageAuto {
    LengthPercentageAuto::Length(v)
}

fn lp(v: f32) -> LengthPercentage {
    LengthPercentage::Length(v)
}

fn to_dimension(d: style::Dimension) -> Dimension {
    match d {
        style::Dimension::Auto => Dimension::Auto,
        style::Dimension::Px(v) => Dimension::Length(v),
        style::Dimension::Percent(v) => Dimension::Percent(v / 100.0),
    }
}

fn to_taffy_style(s: &ComputedStyle, tag: &Tag) -> Style {
    let mut ts = Style {
        size: Size {
            width: to_dimension(s.width),
            height: to_dimension(s.height),
        },
        min_size: Size {
            width: Dimension::Length(0.0),
            height: Dimension::Auto,
        },
        margin: Rect {
            top: lpa(s.margin_top),
            right: lpa(s.margin_right),
            bottom: lpa(s.margin_bottom),
            left: lpa(s.margin_left),
        },
        padding: Rect {
            top: lp(s.padding_top),
            right: lp(s.padding_right),
            bottom: lp(s.padding_bottom),
            left: lp(s.padding_left),
        },
        border: Rect {
            top: lp(s.border_width),
            right: lp(s.border_width),
            bottom: lp(s.border_width),
            left: lp(s.border_width),
        },
        gap: Size {
            width: lp(s.gap),
            height: lp(s.gap),
        },
        flex_grow: s.flex_grow,
        flex_shrink: s.flex_shrink,
        ..Default::default()
    };

    // Table cells share the row equally; rows stretch to the table width.
    match tag {
        Tag::Td | Tag::Th => {
            ts.display = Display::Flex;
            ts.flex_direction = FlexDirection::Column;
            ts.flex_grow = 1.0;
            ts.flex_basis = Dimension::Length(0.0);
            return ts;
        }
        Tag::Tr => {
            ts.display = Display::Flex;
            ts.flex_direction = FlexDirection::Row;
            ts.align_items = Some(AlignItems::Stretch);
            return ts;
        }
        Tag::Table => {
            ts.display = Display::Flex;
            ts.flex_direction = FlexDirection::Column;
            return ts;
        }
        _ => {}
    }

    match s.display {
        style::Display::Flex => {
            ts.display = Display::Flex;
            ts.flex_direction = match s.flex_direction {
                style::FlexDirection::Row => FlexDirection::Row,
                style::FlexDirection::Column => FlexDirection::Column,
            };
        }
        style::Display::Grid => {
            ts.display = Display::Grid;
            ts.grid_template_columns =
                vec![TrackSizingFunction::from_flex(1.0); s.grid_columns.max(1)];
        }
        style::Display::Inline => {
            ts.display = Display::Flex;
            ts.flex_direction = FlexDirection::Row;
            ts.flex_wrap = FlexWrap::Wrap;
        }
        style::Display::None => ts.display = Display::None,
        style::Display::Block
        | style::Display::InlineBlock
        | style::Display::ListItem
        | style::Display::TableRow
        | style::Display::TableCell => {
            ts.display = Display::Flex;
            ts.flex_direction = FlexDirection::Column;
        }
    }
    ts
}

/// Replace `Auto` image dimensions with the intrinsic size of a data-URI
/// image (1 px = 1 pt), keeping the aspect ratio when one side is known.
fn resolve_image_size(
    src: &str,
    style: &ComputedStyle,
    parent_width: f32,
) -> Option<ComputedStyle> {
    let known_w = style.width.resolve(parent_width);
    let known_h = match style.height {
        style::Dimension::Px(v) => Some(v),
        _ => None,
    };
    if known_w.is_some() && known_h.is_some() {
        return None;
    }
    let bytes = crate::pdf::decode_data_uri(src).ok()?;
    let img = ::image::load_from_memory(&bytes).ok()?;
    let (px_w, px_h) = (img.width() as f32, img.height() as f32);
    if px_w == 0.0 || px_h == 0.0 {
        return None;
    }
    let aspect = px_w / px_h;
    let mut s = style.clone();
    let (w, h) = match (known_w, known_h) {
        (Some(w), None) => (w, w / aspect),
        (None, Some(h)) => (h * aspect, h),
        _ => (px_w, px_h),
    };
    s.width = style::Dimension::Px(w.max(1.0));
    s.height = style::Dimension::Px(h.max(1.0));
    Some(s)
}

/// Lay out top-level styled nodes in a column of `content_width`, returning
/// positioned boxes whose x coordinates start at `origin_x`.
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    content_width: f32,
    origin_x: f32,
    fonts: &FontManager,
) -> Result<Vec<PositionedBox>, String> {
    let mut builder = LayoutBuilder::new(fonts);
    let ids = styled_nodes
        .iter()
        .map(|n| builder.build_node(n, content_width, false))
        .collect::<Result<Vec<_>, _>>()?;
    let root = builder.layout_root(&ids, content_width)?;
    Ok(builder.extract(root, origin_x, 0.0)?.children)
}

/// Rendered height (border box, margins excluded) of one styled element laid
/// out in a container of `available_width`.
pub fn measure_height(
    node: &StyledNode,
    available_width: f32,
    fonts: &FontManager,
) -> Result<f32, String> {
    let mut builder = LayoutBuilder::new(fonts);
    let id = builder.build_node(node, available_width, false)?;
    builder.layout_root(&[id], available_width)?;
    let layout = builder.taffy.layout(id).map_err(taffy_err)?;
    Ok(layout.size.height)
}

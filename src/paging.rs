//! Page splitting for the built-in exporter – distributes laid-out boxes over
//! PDF pages.
//!
//! Handles:
//! - Page-break markers and `break-before` / `break-after` hints
//! - Overflow onto the next page
//! - Table row splitting across pages

use crate::fonts::FontManager;
use crate::layout::{BoxContent, PositionedBox};
use crate::page_plan::*;
use crate::style::{self, ComputedStyle};

/// Page margins in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Margins {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

impl Margins {
    pub fn uniform(v: f32) -> Self {
        Self {
            top: v,
            left: v,
            bottom: v,
            right: v,
        }
    }
}

/// Physical page and the mapping from layout px to PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub margins: Margins,
    /// Points per layout px.
    pub scale: f32,
}

impl PageGeometry {
    /// Fit content laid out at `content_width_px` to the printable width.
    pub fn fit(page_width_pt: f32, page_height_pt: f32, margins: Margins, content_width_px: f32) -> Self {
        let printable = (page_width_pt - margins.left - margins.right).max(1.0);
        Self {
            page_width_pt,
            page_height_pt,
            margins,
            scale: printable / content_width_px.max(1.0),
        }
    }

    /// Printable page height expressed in layout px.
    pub fn content_height_px(&self) -> f32 {
        ((self.page_height_pt - self.margins.top - self.margins.bottom) / self.scale).max(1.0)
    }
}

/// Expand pure containers taller than a page so their children can move to
/// later pages individually.
fn flatten_for_pagination(boxes: &[PositionedBox], content_height: f32) -> Vec<&PositionedBox> {
    let mut result = Vec::new();
    for pbox in boxes {
        if pbox.height > content_height
            && pbox.content == BoxContent::None
            && !pbox.children.is_empty()
            && !pbox.style.page_break_inside_avoid
        {
            result.extend(flatten_for_pagination(&pbox.children, content_height));
        } else {
            result.push(pbox);
        }
    }
    result
}

struct PageBuilder<'a> {
    plan: PagePlan,
    current: PlannedPage,
    /// Layout y at which the current page starts.
    page_start_y: f32,
    geometry: &'a PageGeometry,
    fonts: &'a FontManager,
}

impl<'a> PageBuilder<'a> {
    fn break_page(&mut self, next_start_y: f32) {
        let index = self.plan.pages.len() + 1;
        let done = std::mem::replace(
            &mut self.current,
            PlannedPage {
                page_index: index,
                boxes: Vec::new(),
            },
        );
        self.plan.pages.push(done);
        self.page_start_y = next_start_y;
    }

    fn place(&mut self, pbox: &PositionedBox) {
        let y_on_page = (pbox.y - self.page_start_y).max(0.0);
        let placed = build_placed_box(pbox, y_on_page, self.geometry, self.fonts);
        self.current.boxes.push(placed);
    }

    fn finish(mut self) -> PagePlan {
        if !self.current.boxes.is_empty() || self.plan.pages.is_empty() {
            self.plan.pages.push(self.current);
        }
        self.plan
    }
}

/// Distribute positioned boxes over pages.
pub fn paginate_boxes(
    boxes: &[PositionedBox],
    geometry: &PageGeometry,
    fonts: &FontManager,
    title: &str,
) -> PagePlan {
    let content_height = geometry.content_height_px();
    let mut builder = PageBuilder {
        plan: PagePlan::new(title, geometry.page_width_pt, geometry.page_height_pt),
        current: PlannedPage {
            page_index: 0,
            boxes: Vec::new(),
        },
        page_start_y: 0.0,
        geometry,
        fonts,
    };

    for pbox in flatten_for_pagination(boxes, content_height) {
        if pbox.style.page_break_before && !builder.current.boxes.is_empty() {
            builder.break_page(pbox.y);
        }

        let bottom = pbox.y - builder.page_start_y + pbox.height;
        if bottom > content_height + 0.5 && !builder.current.boxes.is_empty() {
            if is_table(pbox) && !pbox.style.page_break_inside_avoid {
                split_rows(&mut builder, pbox, content_height);
                continue;
            }
            builder.break_page(pbox.y);
        }

        builder.place(pbox);

        if pbox.style.page_break_after {
            builder.break_page(pbox.y + pbox.height);
        }
    }

    let plan = builder.finish();
    log::debug!("content split into {} page(s)", plan.pages.len());
    plan
}

fn is_table(pbox: &PositionedBox) -> bool {
    pbox.style.display == style::Display::Grid && !pbox.children.is_empty()
}

fn split_rows(builder: &mut PageBuilder<'_>, table: &PositionedBox, content_height: f32) {
    for row in &table.children {
        let bottom = row.y - builder.page_start_y + row.height;
        if bottom > content_height + 0.5 && !builder.current.boxes.is_empty() {
            builder.break_page(row.y);
        }
        builder.place(row);
    }
}

fn rgba(c: &style::Color) -> [f32; 4] {
    [c.r, c.g, c.b, c.a]
}

fn text_content(style: &ComputedStyle, fonts: &FontManager, scale: f32) -> TextContent {
    TextContent {
        lines: Vec::new(),
        font_size: style.font_size * scale,
        bold: style.font_weight == style::FontWeight::Bold,
        italic: style.font_style == style::FontStyle::Italic,
        color: rgba(&style.color),
        line_height: fonts.line_height_px(style.font_size, style.line_height) * scale,
        underline: style.underline,
        list_marker: None,
    }
}

/// Convert a layout box (and subtree) to page coordinates in points.
fn build_placed_box(
    pbox: &PositionedBox,
    y_on_page: f32,
    geometry: &PageGeometry,
    fonts: &FontManager,
) -> PlacedBox {
    let s = geometry.scale;
    let mut placed = PlacedBox::new(
        geometry.margins.left + pbox.x * s,
        geometry.margins.top + y_on_page * s,
        pbox.width * s,
        pbox.height * s,
    );

    match &pbox.content {
        BoxContent::Text { lines, widths } => {
            let align = match pbox.style.text_align {
                style::TextAlign::Left => 0.0,
                style::TextAlign::Center => 0.5,
                style::TextAlign::Right => 1.0,
            };
            let mut text = text_content(&pbox.style, fonts, s);
            text.lines = lines
                .iter()
                .zip(widths)
                .enumerate()
                .map(|(i, (line, w))| TextLine {
                    text: line.clone(),
                    x_offset: ((pbox.width - w) * align).max(0.0) * s,
                    y_offset: i as f32 * text.line_height,
                    width: w * s,
                })
                .collect();
            placed.text = Some(text);
        }
        other => {
            if !pbox.style.background_color.is_transparent() {
                placed.background_color = Some(rgba(&pbox.style.background_color));
            }
            if pbox.style.border_width > 0.5 {
                placed.border = Some(BorderStyle {
                    width: pbox.style.border_width * s,
                    color: rgba(&pbox.style.border_color),
                });
            }
            match other {
                BoxContent::Image { src } => {
                    placed.image = Some(ImageContent {
                        src: src.clone(),
                        width: placed.width,
                        height: placed.height,
                    });
                }
                BoxContent::ListItem { marker } => {
                    let mut text = text_content(&pbox.style, fonts, s);
                    text.list_marker = Some(marker.clone());
                    placed.text = Some(text);
                }
                _ => {}
            }
        }
    }

    for child in &pbox.children {
        let child_y = y_on_page + (child.y - pbox.y);
        placed
            .children
            .push(build_placed_box(child, child_y, geometry, fonts));
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::layout::compute_layout;
    use crate::style::build_styled_tree;

    fn plan_for(html: &str) -> PagePlan {
        let styled = build_styled_tree(&parse_html(html), None);
        let fonts = FontManager::default();
        let boxes = compute_layout(&styled, 800.0, 0.0, &fonts).expect("layout");
        let geometry = PageGeometry::fit(595.28, 841.89, Margins::default(), 800.0);
        paginate_boxes(&boxes, &geometry, &fonts, "test")
    }

    #[test]
    fn short_content_is_one_page() {
        assert_eq!(plan_for("<p>Short text</p>").pages.len(), 1);
    }

    #[test]
    fn overflow_creates_pages() {
        let html: String = (0..80)
            .map(|i| format!("<p>Paragraph {i} with enough words to occupy a line</p>"))
            .collect();
        assert!(plan_for(&html).pages.len() > 1);
    }

    #[test]
    fn page_break_marker_forces_a_new_page() {
        let plan = plan_for(
            r#"<p>first</p><div class="html2pdf__page-break"></div><p>second</p>"#,
        );
        assert_eq!(plan.pages.len(), 2);
        // The second page starts at the top margin.
        let first_box = &plan.pages[1].boxes[0];
        assert!(first_box.y < 1.0, "y = {}", first_box.y);
    }

    #[test]
    fn leading_marker_does_not_produce_a_blank_page() {
        let plan = plan_for(r#"<div class="html2pdf__page-break"></div><p>only</p>"#);
        assert_eq!(plan.pages.len(), 1);
    }

    #[test]
    fn content_is_scaled_to_page_width() {
        let plan = plan_for(r#"<div style="height: 100px"></div>"#);
        let b = &plan.pages[0].boxes[0];
        assert!((b.width - 595.28).abs() < 0.5, "width = {}", b.width);
        assert!((b.height - 100.0 * 595.28 / 800.0).abs() < 0.5);
    }
}

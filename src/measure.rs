//! Layout measurement – the capability the pagination engine uses to ask
//! "how tall is this element, and what are its vertical margins?".
//!
//! The engine never touches a layout engine directly; it is handed a
//! [`LayoutMeasure`] and the content width to lay children out at.
//! [`TaffyMeasure`] is the real implementation, and any
//! `Fn(&ElementNode) -> ElementMetrics` closure works as a width-independent
//! test double.

use crate::dom::ElementNode;
use crate::fonts::FontManager;
use crate::layout::measure_height;
use crate::style::{build_styled_element, parse_px, StyledNode};

/// Content width used when `pdfContentWidth` is not a px length.
pub const DEFAULT_CONTENT_WIDTH_PX: f32 = 800.0;

/// Vertical metrics of one rendered element, in px.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementMetrics {
    /// Rendered height, margins excluded.
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl ElementMetrics {
    pub fn new(height: f32, margin_top: f32, margin_bottom: f32) -> Self {
        Self {
            height,
            margin_top,
            margin_bottom,
        }
    }

    /// Rendered height plus top and bottom margins.
    pub fn effective_height(&self) -> f32 {
        self.height + self.margin_top + self.margin_bottom
    }
}

pub trait LayoutMeasure {
    /// Metrics of `element` rendered inside a container `content_width` px wide.
    fn measure(&self, element: &ElementNode, content_width: f32) -> ElementMetrics;
}

impl<F> LayoutMeasure for F
where
    F: Fn(&ElementNode) -> ElementMetrics,
{
    fn measure(&self, element: &ElementNode, _content_width: f32) -> ElementMetrics {
        self(element)
    }
}

/// Measures elements by styling them and running them through Taffy.
#[derive(Default)]
pub struct TaffyMeasure {
    fonts: FontManager,
}

impl TaffyMeasure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fonts(mut self, fonts: FontManager) -> Self {
        self.fonts = fonts;
        self
    }
}

impl LayoutMeasure for TaffyMeasure {
    fn measure(&self, element: &ElementNode, content_width: f32) -> ElementMetrics {
        let styled = build_styled_element(element, None);
        let StyledNode::Element { style, .. } = &styled else {
            return ElementMetrics::default();
        };
        // Computed margins come back as px strings that get integer-parsed,
        // so fractional margins truncate.
        let margin_top = style.margin_top.trunc();
        let margin_bottom = style.margin_bottom.trunc();
        let height = match measure_height(&styled, content_width, &self.fonts) {
            Ok(h) => h.round(),
            Err(e) => {
                log::warn!("could not measure <{}>: {e}", element.tag.name());
                0.0
            }
        };
        ElementMetrics::new(height, margin_top, margin_bottom)
    }
}

/// Content width in px for a `pdfContentWidth` value. Anything that is not a
/// px length falls back to [`DEFAULT_CONTENT_WIDTH_PX`].
pub fn content_width_px(width: &str) -> f32 {
    parse_css_width(width).unwrap_or_else(|| {
        log::warn!(
            "content width {width:?} is not a px length; measuring at {DEFAULT_CONTENT_WIDTH_PX}px"
        );
        DEFAULT_CONTENT_WIDTH_PX
    })
}

/// Parse a px (or unitless) CSS width.
pub fn parse_css_width(width: &str) -> Option<f32> {
    let w = width.trim();
    if w.ends_with('%') || w.ends_with("em") || w.ends_with("vw") {
        return None;
    }
    parse_px(w).filter(|v| *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_fragment, Tag};

    #[test]
    fn closures_are_measures() {
        let m = |_: &ElementNode| ElementMetrics::new(10.0, 1.0, 2.0);
        let e = ElementNode::new(Tag::Div);
        assert_eq!(m.measure(&e, 300.0).effective_height(), 13.0);
    }

    #[test]
    fn taffy_measure_reads_height_and_margins() {
        let root = parse_fragment(r#"<div style="height: 200px; margin: 10.7px 0 5px 0"></div>"#);
        let child = root.element_children().next().expect("child");
        let metrics = TaffyMeasure::new().measure(child, 800.0);
        assert_eq!(metrics.height, 200.0);
        assert_eq!(metrics.margin_top, 10.0);
        assert_eq!(metrics.margin_bottom, 5.0);
        assert_eq!(metrics.effective_height(), 215.0);
    }

    #[test]
    fn css_width_parsing() {
        assert_eq!(parse_css_width("800px"), Some(800.0));
        assert_eq!(parse_css_width(" 612 "), Some(612.0));
        assert_eq!(parse_css_width("100%"), None);
        assert_eq!(parse_css_width("auto"), None);
        assert_eq!(content_width_px("50vw"), 800.0);
        assert_eq!(content_width_px("200px"), 200.0);
    }

    #[test]
    fn narrower_width_wraps_text_taller() {
        let root = parse_fragment(&format!("<p>{}</p>", "lorem ipsum dolor sit amet ".repeat(20)));
        let p = root.element_children().next().expect("p");
        let measure = TaffyMeasure::new();
        let wide = measure.measure(p, 800.0).height;
        let narrow = measure.measure(p, 200.0).height;
        assert!(narrow > wide, "{narrow} <= {wide}");
    }
}

//! Page plan – the frozen structure between layout and PDF rendering. It
//! encodes exactly what goes on each page, in PDF points with a top-left
//! origin.

use serde::{Deserialize, Serialize};

/// A complete document ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePlan {
    #[serde(default = "PagePlan::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PlannedPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedPage {
    pub page_index: usize,
    pub boxes: Vec<PlacedBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,

    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,

    pub children: Vec<PlacedBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: [f32; 4],
    pub line_height: f32,
    pub underline: bool,
    /// Bullet or number drawn in the left gutter (e.g. "• " or "1. ").
    pub list_marker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the box (alignment).
    pub x_offset: f32,
    /// Y offset from the top of the box.
    pub y_offset: f32,
    pub width: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl PagePlan {
    pub fn new(title: &str, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.to_string(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "pdf-pager output".to_string()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }
}

impl PlacedBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
            image: None,
            children: Vec::new(),
        }
    }

    /// Visit this box and all of its descendants, depth first.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a PlacedBox)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}

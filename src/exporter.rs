//! Conversion backends.
//!
//! [`Exporter`] is the seam between the export driver and whatever turns a
//! content tree into PDF bytes. [`ForgeExporter`] is the built-in backend:
//! it styles the tree, lays it out with Taffy, splits it into pages (every
//! page-break marker starts a new one) and writes the result with
//! `printpdf`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::dom::ElementNode;
use crate::error::{Error, Result};
use crate::fonts::FontManager;
use crate::layout::compute_layout;
use crate::measure::DEFAULT_CONTENT_WIDTH_PX;
use crate::options::ResolvedOptions;
use crate::page_plan::PagePlan;
use crate::paging::{paginate_boxes, Margins, PageGeometry};
use crate::pdf::render_pdf;
use crate::style::{build_styled_element, build_styled_tree, Dimension, StyledNode};

/// Converts a content tree into a PDF document and persists it.
pub trait Exporter: Send + Sync + 'static {
    /// Render `content` with `options` into PDF bytes.
    fn render(
        &self,
        content: &ElementNode,
        options: &ResolvedOptions,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Persist a rendered document, returning where it went.
    fn save(
        &self,
        pdf: &[u8],
        options: &ResolvedOptions,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Page sizes in points, portrait.
const PAGE_FORMATS: &[(&str, [f32; 2])] = &[
    ("a0", [2383.94, 3370.39]),
    ("a1", [1683.78, 2383.94]),
    ("a2", [1190.55, 1683.78]),
    ("a3", [841.89, 1190.55]),
    ("a4", [595.28, 841.89]),
    ("a5", [419.53, 595.28]),
    ("a6", [297.64, 419.53]),
    ("b5", [498.90, 708.66]),
    ("letter", [612.0, 792.0]),
    ("legal", [612.0, 1008.0]),
    ("tabloid", [792.0, 1224.0]),
];

/// Points per document unit.
fn unit_to_pt(unit: &str) -> Result<f32> {
    Ok(match unit {
        "pt" => 1.0,
        "mm" => 72.0 / 25.4,
        "cm" => 72.0 / 2.54,
        "in" => 72.0,
        "px" => 72.0 / 96.0,
        other => return Err(Error::config(format!("unsupported unit {other:?}"))),
    })
}

/// Physical page settings read from exporter options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width_pt: f32,
    pub height_pt: f32,
    pub margins: Margins,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            width_pt: 595.28,
            height_pt: 841.89,
            margins: Margins::default(),
        }
    }
}

impl PageSetup {
    /// Read `jsPDF.{unit,format,orientation}` and `margin` from an
    /// html2pdf-shaped options object. Missing fields take html2pdf's
    /// defaults (mm, a4, portrait, no margin).
    pub fn from_options(options: &Value) -> Result<Self> {
        let doc = options.get("jsPDF");
        let field = |name: &str| doc.and_then(|d| d.get(name));

        let unit = field("unit").and_then(Value::as_str).unwrap_or("mm");
        let k = unit_to_pt(unit)?;

        let [mut w, mut h] = match field("format") {
            None | Some(Value::Null) => PAGE_FORMATS[4].1,
            Some(Value::String(name)) => {
                let name = name.to_ascii_lowercase();
                PAGE_FORMATS
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, size)| *size)
                    .ok_or_else(|| Error::config(format!("unknown page format {name:?}")))?
            }
            Some(Value::Array(dims)) => match dims.as_slice() {
                [w, h] => [number(w)? * k, number(h)? * k],
                _ => return Err(Error::config("custom page format must be [width, height]")),
            },
            Some(other) => return Err(Error::config(format!("invalid page format {other}"))),
        };

        let orientation = field("orientation").and_then(Value::as_str).unwrap_or("portrait");
        let landscape = match orientation {
            "portrait" | "p" => false,
            "landscape" | "l" => true,
            other => return Err(Error::config(format!("invalid orientation {other:?}"))),
        };
        if landscape == (w < h) {
            std::mem::swap(&mut w, &mut h);
        }

        let margins = match options.get("margin") {
            None | Some(Value::Null) => Margins::default(),
            Some(Value::Array(m)) => {
                let m = m.iter().map(number).collect::<Result<Vec<_>>>()?;
                match m.as_slice() {
                    [v] => Margins::uniform(v * k),
                    [v, hz] => Margins {
                        top: v * k,
                        left: hz * k,
                        bottom: v * k,
                        right: hz * k,
                    },
                    [t, l, b, r] => Margins {
                        top: t * k,
                        left: l * k,
                        bottom: b * k,
                        right: r * k,
                    },
                    _ => return Err(Error::config("margin must have 1, 2 or 4 values")),
                }
            }
            Some(v) => Margins::uniform(number(v)? * k),
        };

        Ok(Self {
            width_pt: w,
            height_pt: h,
            margins,
        })
    }
}

fn number(v: &Value) -> Result<f32> {
    v.as_f64()
        .map(|n| n as f32)
        .ok_or_else(|| Error::config(format!("expected a number, got {v}")))
}

/// Built-in exporter producing vector PDFs and writing them into a
/// directory.
#[derive(Clone)]
pub struct ForgeExporter {
    output_dir: PathBuf,
    fonts: Arc<FontManager>,
}

impl ForgeExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            fonts: Arc::new(FontManager::default()),
        }
    }

    pub fn with_fonts(mut self, fonts: FontManager) -> Self {
        self.fonts = Arc::new(fonts);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Exporter for ForgeExporter {
    async fn render(&self, content: &ElementNode, options: &ResolvedOptions) -> Result<Vec<u8>> {
        let value = options.to_value();
        if let Some(scale) = value.pointer("/html2canvas/scale") {
            log::debug!("rasterisation scale {scale} has no effect on vector output");
        }
        if let Some(quality) = value.pointer("/image/quality") {
            log::debug!("image quality {quality} has no effect on vector output");
        }
        let setup = PageSetup::from_options(&value)?;
        let title = options.filename();
        let content = content.clone();
        let fonts = Arc::clone(&self.fonts);

        tokio::task::spawn_blocking(move || {
            let plan = plan_document(&content, &setup, &fonts, &title)?;
            render_pdf(&plan).map_err(Error::Render)
        })
        .await?
    }

    async fn save(&self, pdf: &[u8], options: &ResolvedOptions) -> Result<PathBuf> {
        let filename = options.filename();
        let name = Path::new(&filename)
            .file_name()
            .map(Path::new)
            .unwrap_or(Path::new("file.pdf"));
        let path = self.output_dir.join(name);
        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::write(&path, pdf).await?;
        log::info!("saved {} ({} bytes)", path.display(), pdf.len());
        Ok(path)
    }
}

/// Lay out `content` and split it into pages.
///
/// The tree is laid out at the width of its root element (the content
/// wrapper), then scaled to the printable page width.
pub fn plan_document(
    content: &ElementNode,
    setup: &PageSetup,
    fonts: &FontManager,
    title: &str,
) -> Result<PagePlan> {
    let root = build_styled_element(content, None);
    let width = match root.style().width {
        Dimension::Px(px) if px > 0.0 => px,
        _ => DEFAULT_CONTENT_WIDTH_PX,
    };
    let children = match &root {
        StyledNode::Element { style, .. } => build_styled_tree(&content.children, Some(style)),
        StyledNode::Text { .. } => Vec::new(),
    };
    let boxes = compute_layout(&children, width, 0.0, fonts).map_err(Error::Render)?;
    let geometry = PageGeometry::fit(setup.width_pt, setup.height_pt, setup.margins, width);
    log::debug!(
        "laid out {} top-level box(es) at {width}px, {:.3}pt/px",
        boxes.len(),
        geometry.scale
    );
    Ok(paginate_boxes(&boxes, &geometry, fonts, title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_fragment;
    use serde_json::json;

    #[test]
    fn defaults_are_a4_portrait_without_margin() {
        let setup = PageSetup::from_options(&json!({})).expect("setup");
        assert_eq!(setup, PageSetup::default());
    }

    #[test]
    fn inches_letter_landscape() {
        let setup = PageSetup::from_options(&json!({
            "margin": [0.5, 1],
            "jsPDF": {"unit": "in", "format": "letter", "orientation": "landscape"}
        }))
        .expect("setup");
        assert_eq!((setup.width_pt, setup.height_pt), (792.0, 612.0));
        assert_eq!(setup.margins.top, 36.0);
        assert_eq!(setup.margins.left, 72.0);
    }

    #[test]
    fn custom_format_uses_the_unit() {
        let setup = PageSetup::from_options(&json!({
            "jsPDF": {"unit": "pt", "format": [300, 200]}
        }))
        .expect("setup");
        // Portrait puts the short side horizontally.
        assert_eq!((setup.width_pt, setup.height_pt), (200.0, 300.0));
    }

    #[test]
    fn unknown_format_is_a_config_error() {
        let err = PageSetup::from_options(&json!({"jsPDF": {"format": "a9"}})).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn markers_split_pages() {
        let content = parse_fragment(
            r#"<p>one</p><div class="html2pdf__page-break"></div><p>two</p>
               <div class="html2pdf__page-break"></div><p>three</p>"#,
        );
        let plan = plan_document(&content, &PageSetup::default(), &FontManager::default(), "t")
            .expect("plan");
        assert_eq!(plan.pages.len(), 3);
    }
}

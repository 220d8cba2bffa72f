//! Export options resolution.
//!
//! Options follow the html2pdf shape (`margin`, `filename`, `image`,
//! `enableLinks`, `html2canvas`, `jsPDF`) so a raw override written for that
//! shape passes through untouched.

use serde::{Deserialize, Serialize};

use crate::config::{Config, Orientation, PageFormat};

/// Raster image settings for each rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOptions {
    #[serde(rename = "type")]
    pub kind: String,
    pub quality: f32,
}

/// Rasteriser settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasOptions {
    pub scale: f32,
    #[serde(rename = "useCORS")]
    pub use_cors: bool,
}

/// Output document settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOptions {
    pub unit: String,
    pub format: PageFormat,
    pub orientation: Orientation,
}

/// Options derived from a [`Config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub margin: f32,
    pub filename: String,
    pub image: ImageOptions,
    pub enable_links: bool,
    pub html2canvas: CanvasOptions,
    #[serde(rename = "jsPDF")]
    pub js_pdf: DocumentOptions,
}

/// What the exporter receives: the caller's raw override, verbatim, or the
/// options derived from configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedOptions {
    Raw(serde_json::Value),
    Derived(ExportOptions),
}

impl ResolvedOptions {
    /// JSON view of the options, as the exporter would see them.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            ResolvedOptions::Raw(v) => v.clone(),
            ResolvedOptions::Derived(o) => serde_json::to_value(o).unwrap_or_default(),
        }
    }

    /// Output file name; html2pdf falls back to `file.pdf`.
    pub fn filename(&self) -> String {
        match self {
            ResolvedOptions::Derived(o) => o.filename.clone(),
            ResolvedOptions::Raw(v) => v
                .get("filename")
                .and_then(|f| f.as_str())
                .unwrap_or("file.pdf")
                .to_string(),
        }
    }
}

/// Resolve the options for one export.
pub fn resolve_options(config: &Config) -> ResolvedOptions {
    if let Some(raw) = &config.html_to_pdf_options {
        if !raw.is_null() {
            return ResolvedOptions::Raw(raw.clone());
        }
    }
    ResolvedOptions::Derived(ExportOptions {
        margin: 0.0,
        filename: format!("{}.pdf", config.filename),
        image: ImageOptions {
            kind: "jpeg".to_string(),
            quality: 0.98,
        },
        enable_links: false,
        html2canvas: CanvasOptions {
            scale: config.pdf_quality,
            use_cors: true,
        },
        js_pdf: DocumentOptions {
            unit: "in".to_string(),
            format: config.pdf_format.clone(),
            orientation: config.pdf_orientation,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derived_options_have_the_html2pdf_shape() {
        let config = Config {
            filename: "invoice".into(),
            pdf_quality: 3.0,
            pdf_format: "letter".into(),
            pdf_orientation: Orientation::Landscape,
            ..Config::default()
        };
        let value = resolve_options(&config).to_value();
        assert_eq!(
            value,
            json!({
                "margin": 0.0,
                "filename": "invoice.pdf",
                "image": {"type": "jpeg", "quality": 0.98f32},
                "enableLinks": false,
                "html2canvas": {"scale": 3.0, "useCORS": true},
                "jsPDF": {"unit": "in", "format": "letter", "orientation": "landscape"}
            })
        );
    }

    #[test]
    fn raw_override_is_returned_verbatim() {
        let config = Config {
            filename: "ignored".into(),
            pdf_quality: 9.0,
            html_to_pdf_options: Some(json!({"custom": 1})),
            ..Config::default()
        };
        let resolved = resolve_options(&config);
        assert_eq!(resolved, ResolvedOptions::Raw(json!({"custom": 1})));
        assert_eq!(resolved.to_value(), json!({"custom": 1}));
        assert_eq!(resolved.filename(), "file.pdf");
    }

    #[test]
    fn null_override_falls_back_to_derived() {
        let config = Config {
            html_to_pdf_options: Some(serde_json::Value::Null),
            ..Config::default()
        };
        assert!(matches!(resolve_options(&config), ResolvedOptions::Derived(_)));
    }
}

//! Component configuration – the declarative props the embedding caller
//! supplies, with the same camelCase names a JSON props object would use.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Page size handed to the exporter: a named format or `[width, height]` in
/// the export unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageFormat {
    Named(String),
    Custom([f32; 2]),
}

impl Default for PageFormat {
    fn default() -> Self {
        PageFormat::Named("a4".to_string())
    }
}

impl From<&str> for PageFormat {
    fn from(name: &str) -> Self {
        PageFormat::Named(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    #[serde(alias = "p")]
    Portrait,
    #[serde(alias = "l")]
    Landscape,
}

/// Immutable-per-render component configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub show_layout: bool,
    pub float_layout: bool,
    pub enable_download: bool,
    pub preview_modal: bool,
    /// Page height threshold in px. Required unless `manual_pagination`.
    pub paginate_elements_by_height: Option<f32>,
    /// File name without the `.pdf` extension.
    pub filename: String,
    /// Rasterisation scale.
    pub pdf_quality: f32,
    pub pdf_format: PageFormat,
    pub pdf_orientation: Orientation,
    /// CSS length of the content wrapper.
    pub pdf_content_width: String,
    /// Raw exporter options; when set they replace every derived option.
    pub html_to_pdf_options: Option<serde_json::Value>,
    pub manual_pagination: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            show_layout: false,
            float_layout: true,
            enable_download: true,
            preview_modal: false,
            paginate_elements_by_height: None,
            filename: default_filename(),
            pdf_quality: 2.0,
            pdf_format: PageFormat::default(),
            pdf_orientation: Orientation::Portrait,
            pdf_content_width: "800px".to_string(),
            html_to_pdf_options: None,
            manual_pagination: false,
        }
    }
}

/// Current epoch time in milliseconds, as a string.
fn default_filename() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// Non-fatal caller misconfiguration reported by [`Config::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    MissingPaginationThreshold,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingPaginationThreshold => f.write_str(
                "paginate-elements-by-height is required if manual-pagination is false",
            ),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Check the configuration, logging each diagnostic at error level.
    ///
    /// Only the pagination threshold is checked; format and orientation are
    /// handed to the exporter as-is.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if !self.manual_pagination && self.paginate_elements_by_height.is_none() {
            diagnostics.push(Diagnostic::MissingPaginationThreshold);
        }
        for d in &diagnostics {
            log::error!("Error: {d}");
        }
        diagnostics
    }
}

/// What changed between two configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigChange {
    pub changed: bool,
    pub threshold_changed: bool,
}

impl ConfigChange {
    pub fn between(old: &Config, new: &Config) -> Self {
        Self {
            changed: old != new,
            threshold_changed: old.paginate_elements_by_height != new.paginate_elements_by_height,
        }
    }
}

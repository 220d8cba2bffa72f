//! # pdf-pager – height-based page slicing and PDF export for HTML content
//!
//! An [`Html2Pdf`] component holds caller-supplied HTML content and a
//! [`Config`]. On [`Html2Pdf::generate_pdf`] it:
//!
//! 1. **Paginates** – inserts page-break markers between the content's
//!    top-level elements by accumulated height ([`pagination`], measured
//!    through [`measure`])
//! 2. **Resolves options** – html2pdf-shaped export options or a raw
//!    override ([`options`])
//! 3. **Exports** – hands the content to an [`Exporter`] ([`exporter`])
//! 4. **Delivers** – shows a preview and/or saves the file, then reports the
//!    bytes back through `blob:` URLs ([`blob`], [`preview`])
//!
//! The built-in [`ForgeExporter`] renders the content itself: parse
//! ([`dom`]), style ([`style`]), lay out with Taffy ([`layout`]), split into
//! pages ([`paging`], [`page_plan`]) and write PDF with printpdf ([`pdf`]).

pub mod blob;
pub mod component;
pub mod config;
pub mod dom;
pub mod error;
pub mod exporter;
pub mod fonts;
pub mod layout;
pub mod markup;
pub mod measure;
pub mod options;
pub mod page_plan;
pub mod pagination;
pub mod paging;
pub mod pdf;
pub mod preview;
pub mod registry;
pub mod style;

// Re-exports for convenience
pub use blob::{Blob, BlobHandle, BlobStore};
pub use component::{
    BeforeDownload, ComponentListener, GenerationPhase, GenerationReport, Html2Pdf,
    Html2PdfBuilder,
};
pub use config::{Config, Diagnostic, Orientation, PageFormat};
pub use error::{Error, Result};
pub use exporter::{Exporter, ForgeExporter, PageSetup};
pub use measure::{ElementMetrics, LayoutMeasure, TaffyMeasure};
pub use options::{resolve_options, ExportOptions, ResolvedOptions};
pub use pagination::{PaginationReport, Paginator, SkipReason, PAGE_BREAK_CLASS};
pub use preview::Preview;
pub use registry::{Registry, COMPONENT_NAME};

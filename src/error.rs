//! Error types for the export driver and its backends.

use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`crate::Html2Pdf`] and the exporters it drives.
#[derive(Error, Debug)]
pub enum Error {
    /// `generate_pdf` was called while another generation was running.
    #[error("a PDF generation is already in flight")]
    GenerationInFlight,

    /// The conversion backend failed to produce a document.
    #[error("PDF rendering failed: {0}")]
    Render(String),

    /// A `blob:` URL was fetched after it had been revoked (or never issued).
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// Invalid component configuration or export options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No component factory is registered under the requested name.
    #[error("no component registered as '{0}'")]
    NotRegistered(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking render task panicked or was cancelled.
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn render(message: impl Into<String>) -> Self {
        Error::Render(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

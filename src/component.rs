//! The export driver: configuration, content, pagination state, progress and
//! preview for one component instance.
//!
//! A generation runs these checkpoints, notifying the listener at each:
//!
//! 1. `start_pagination`, progress 0
//! 2. progress 25, pagination pass (skipped with manual pagination)
//! 3. `has_paginated`, progress 70
//! 4. options resolved, `before_download` may rewrite options and content
//! 5. exporter renders the content wrapper
//! 6. preview enabled: the document is shown through a `blob:` URL
//! 7. download enabled: the exporter saves it, a transient URL is issued
//! 8. the document is fetched back from its URL, `has_downloaded`
//! 9. progress 100
//!
//! Only one generation runs at a time; overlapping calls are rejected.

use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::blob::{Blob, BlobStore};
use crate::config::{Config, ConfigChange, Diagnostic};
use crate::dom::{parse_fragment, ElementNode};
use crate::error::{Error, Result};
use crate::exporter::Exporter;
use crate::markup::{content_wrapper, render_markup};
use crate::measure::{content_width_px, LayoutMeasure, TaffyMeasure};
use crate::options::{resolve_options, ResolvedOptions};
use crate::pagination::{PaginationReport, Paginator};
use crate::preview::Preview;

/// Where the component is in its generation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationPhase {
    #[default]
    Idle,
    Generating,
    /// The last generation failed with this message.
    Failed(String),
}

/// Last-chance hook payload, delivered right before conversion.
pub struct BeforeDownload<'a> {
    /// The conversion backend, for callers that know its concrete type.
    pub exporter: &'a (dyn Any + Send + Sync),
    pub options: &'a mut ResolvedOptions,
    /// The content wrapper about to be converted. Edits are kept.
    pub content: &'a mut ElementNode,
}

/// Component notifications. Every method defaults to a no-op.
pub trait ComponentListener: Send + Sync {
    fn on_progress(&self, _progress: u8) {}
    fn on_start_pagination(&self) {}
    fn on_has_paginated(&self) {}
    fn on_before_download(&self, _event: &mut BeforeDownload<'_>) {}
    fn on_has_downloaded(&self, _pdf: &Blob) {}
}

struct SilentListener;

impl ComponentListener for SilentListener {}

/// What one successful generation did.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub pagination: PaginationReport,
    /// Set when the exporter saved the document.
    pub saved_to: Option<PathBuf>,
    /// The document as fetched back from its `blob:` URL.
    pub pdf: Option<Blob>,
}

struct State {
    config: Config,
    diagnostics: Vec<Diagnostic>,
    content: ElementNode,
    paginator: Paginator,
    progress: u8,
    phase: GenerationPhase,
    preview: Preview,
}

/// Clears the in-flight flag when a generation ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::GenerationInFlight)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// HTML-to-PDF component driving an [`Exporter`].
pub struct Html2Pdf<E, M = TaffyMeasure> {
    exporter: E,
    measure: M,
    listener: Arc<dyn ComponentListener>,
    blobs: BlobStore,
    in_flight: AtomicBool,
    state: Mutex<State>,
}

/// Builder for [`Html2Pdf`].
pub struct Html2PdfBuilder<E, M> {
    exporter: E,
    measure: M,
    config: Config,
    listener: Arc<dyn ComponentListener>,
    blobs: BlobStore,
}

impl<E: Exporter, M: LayoutMeasure> Html2PdfBuilder<E, M> {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ComponentListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Share a blob store with the host (defaults to a private one).
    pub fn blob_store(mut self, blobs: BlobStore) -> Self {
        self.blobs = blobs;
        self
    }

    /// Build the component; the configuration is validated immediately.
    pub fn build(self) -> Html2Pdf<E, M> {
        let diagnostics = self.config.validate();
        Html2Pdf {
            exporter: self.exporter,
            measure: self.measure,
            listener: self.listener,
            blobs: self.blobs,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(State {
                config: self.config,
                diagnostics,
                content: parse_fragment(""),
                paginator: Paginator::new(),
                progress: 0,
                phase: GenerationPhase::Idle,
                preview: Preview::Hidden,
            }),
        }
    }
}

impl<E: Exporter> Html2Pdf<E, TaffyMeasure> {
    /// Component measuring its content with Taffy.
    pub fn new(exporter: E, config: Config) -> Self {
        Self::builder(exporter, TaffyMeasure::new()).config(config).build()
    }
}

impl<E: Exporter, M: LayoutMeasure> Html2Pdf<E, M> {
    pub fn builder(exporter: E, measure: M) -> Html2PdfBuilder<E, M> {
        Html2PdfBuilder {
            exporter,
            measure,
            config: Config::default(),
            listener: Arc::new(SilentListener),
            blobs: BlobStore::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_progress(&self, progress: u8) {
        self.state().progress = progress;
        self.listener.on_progress(progress);
    }

    // ---- configuration and content -------------------------------------

    /// Replace the configuration. It is revalidated when anything changed,
    /// and a new pagination threshold drops every existing marker.
    pub fn set_config(&self, config: Config) {
        let mut guard = self.state();
        let state = &mut *guard;
        let change = ConfigChange::between(&state.config, &config);
        state.config = config;
        if change.threshold_changed {
            let removed = state.paginator.reset(&mut state.content);
            log::debug!("pagination threshold changed; removed {removed} marker(s)");
        }
        if change.changed {
            state.diagnostics = state.config.validate();
        }
    }

    /// Replace the content with the children of `root`.
    pub fn set_content(&self, root: ElementNode) {
        let mut state = self.state();
        state.content = root;
        state.paginator = Paginator::new();
    }

    pub fn set_content_html(&self, html: &str) {
        self.set_content(parse_fragment(html));
    }

    // ---- accessors ------------------------------------------------------

    pub fn config(&self) -> Config {
        self.state().config.clone()
    }

    /// Diagnostics from the most recent validation.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state().diagnostics.clone()
    }

    pub fn content(&self) -> ElementNode {
        self.state().content.clone()
    }

    pub fn progress(&self) -> u8 {
        self.state().progress
    }

    pub fn phase(&self) -> GenerationPhase {
        self.state().phase.clone()
    }

    pub fn is_paginated(&self) -> bool {
        self.state().paginator.is_paginated()
    }

    pub fn is_preview_visible(&self) -> bool {
        self.state().preview.is_visible()
    }

    /// URL of the document shown in the preview, if any.
    pub fn preview_url(&self) -> Option<String> {
        self.state().preview.url().map(str::to_string)
    }

    pub fn exporter(&self) -> &E {
        &self.exporter
    }

    pub fn blob_store(&self) -> &BlobStore {
        &self.blobs
    }

    /// Current component tree.
    pub fn markup(&self) -> ElementNode {
        let state = self.state();
        render_markup(&state.config, &state.content, &state.preview)
    }

    pub fn render_html(&self) -> String {
        self.markup().to_html()
    }

    // ---- actions --------------------------------------------------------

    /// Hide the preview and release its document. Returns whether a preview
    /// was shown.
    pub fn close_preview(&self) -> bool {
        self.state().preview.close()
    }

    /// Paginate, convert and deliver the content.
    ///
    /// Fails with [`Error::GenerationInFlight`] while another call runs.
    /// Other failures leave the phase [`GenerationPhase::Failed`] with
    /// progress at the last checkpoint reached.
    pub async fn generate_pdf(&self) -> Result<GenerationReport> {
        let _in_flight = InFlight::acquire(&self.in_flight)?;
        self.state().phase = GenerationPhase::Generating;

        let result = self.run_generation().await;
        let phase = match &result {
            Ok(_) => GenerationPhase::Idle,
            Err(e) => {
                log::error!("PDF generation failed: {e}");
                GenerationPhase::Failed(e.to_string())
            }
        };
        self.state().phase = phase;
        result
    }

    async fn run_generation(&self) -> Result<GenerationReport> {
        self.listener.on_start_pagination();
        self.set_progress(0);

        self.set_progress(25);
        let pagination = self.paginate();
        self.listener.on_has_paginated();
        self.set_progress(70);

        let (config, mut options, mut content) = {
            let state = self.state();
            (
                state.config.clone(),
                resolve_options(&state.config),
                content_wrapper(&state.config, &state.content),
            )
        };
        let before = content.clone();
        self.listener.on_before_download(&mut BeforeDownload {
            exporter: &self.exporter,
            options: &mut options,
            content: &mut content,
        });
        if content != before {
            self.state().content.children = content.children.clone();
        }

        let pdf = Blob::pdf(self.exporter.render(&content, &options).await?);
        log::debug!("exporter produced {} bytes", pdf.len());

        let mut fetch_url = None;
        if config.preview_modal {
            let handle = self.blobs.create(pdf.clone());
            fetch_url = Some(handle.url().to_string());
            self.state().preview.show(handle);
        }

        let mut saved_to = None;
        let mut download = None;
        if config.enable_download {
            saved_to = Some(self.exporter.save(&pdf.bytes, &options).await?);
            let handle = self.blobs.create(pdf);
            fetch_url = Some(handle.url().to_string());
            download = Some(handle);
        }

        let fetched = match fetch_url {
            Some(url) => {
                let blob = self.blobs.fetch(&url)?;
                self.listener.on_has_downloaded(&blob);
                Some(blob)
            }
            None => None,
        };
        // The transient download URL is revoked once read back.
        drop(download);

        self.set_progress(100);
        Ok(GenerationReport {
            pagination,
            saved_to,
            pdf: fetched,
        })
    }

    fn paginate(&self) -> PaginationReport {
        let mut guard = self.state();
        let state = &mut *guard;
        state.paginator.paginate(
            &mut state.content,
            state.config.paginate_elements_by_height,
            content_width_px(&state.config.pdf_content_width),
            state.config.manual_pagination,
            &self.measure,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::ElementMetrics;
    use crate::pagination::PAGE_BREAK_CLASS;

    struct NullExporter;

    impl Exporter for NullExporter {
        async fn render(&self, _: &ElementNode, _: &ResolvedOptions) -> Result<Vec<u8>> {
            Ok(b"%PDF-1.7".to_vec())
        }

        async fn save(&self, _: &[u8], _: &ResolvedOptions) -> Result<PathBuf> {
            Ok(PathBuf::from("null.pdf"))
        }
    }

    fn fixed(_: &ElementNode) -> ElementMetrics {
        ElementMetrics::new(200.0, 0.0, 0.0)
    }

    fn component(config: Config) -> Html2Pdf<NullExporter, fn(&ElementNode) -> ElementMetrics> {
        let c = Html2Pdf::builder(NullExporter, fixed as fn(&ElementNode) -> ElementMetrics)
            .config(config)
            .build();
        c.set_content_html("<div>a</div><div>b</div><div>c</div>");
        c
    }

    fn with_threshold(t: f32) -> Config {
        Config {
            paginate_elements_by_height: Some(t),
            ..Config::default()
        }
    }

    #[test]
    fn missing_threshold_is_diagnosed_at_build() {
        let c = component(Config::default());
        assert_eq!(c.diagnostics(), vec![Diagnostic::MissingPaginationThreshold]);
        c.set_config(with_threshold(500.0));
        assert!(c.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn threshold_change_removes_markers() {
        let c = component(with_threshold(500.0));
        c.generate_pdf().await.expect("generate");
        assert_eq!(c.content().count_class(PAGE_BREAK_CLASS), 1);
        assert!(c.is_paginated());

        c.set_config(with_threshold(1000.0));
        assert_eq!(c.content().count_class(PAGE_BREAK_CLASS), 0);
        assert!(!c.is_paginated());
    }

    #[tokio::test]
    async fn new_content_is_paginated_again() {
        let c = component(with_threshold(300.0));
        c.generate_pdf().await.expect("first");
        c.set_content_html("<div>x</div><div>y</div>");
        let report = c.generate_pdf().await.expect("second");
        assert_eq!(report.pagination.inserted, 1);
    }

    #[tokio::test]
    async fn finishes_idle_with_full_progress() {
        let c = component(with_threshold(500.0));
        let report = c.generate_pdf().await.expect("generate");
        assert_eq!(c.progress(), 100);
        assert_eq!(c.phase(), GenerationPhase::Idle);
        assert_eq!(report.saved_to, Some(PathBuf::from("null.pdf")));
        // Download only: the transient URL is already gone.
        assert_eq!(c.blob_store().live_count(), 0);
        assert!(!c.is_preview_visible());
    }

    /// Children are 160 000 px² of content: 200px tall at 800px wide.
    struct AreaMeasure;

    impl LayoutMeasure for AreaMeasure {
        fn measure(&self, _: &ElementNode, content_width: f32) -> ElementMetrics {
            ElementMetrics::new(160_000.0 / content_width, 0.0, 0.0)
        }
    }

    fn marker_positions(root: &ElementNode) -> Vec<usize> {
        root.element_children()
            .enumerate()
            .filter(|(_, e)| e.has_class(PAGE_BREAK_CLASS))
            .map(|(i, _)| i)
            .collect()
    }

    #[tokio::test]
    async fn content_width_change_remeasures_children() {
        let c = Html2Pdf::builder(NullExporter, AreaMeasure)
            .config(with_threshold(500.0))
            .build();
        c.set_content_html("<div>a</div><div>b</div><div>c</div><div>d</div>");

        c.generate_pdf().await.expect("800px");
        assert_eq!(marker_positions(&c.content()), vec![2]);

        // 400px tall at 400px wide: one child per page.
        c.set_config(Config {
            pdf_content_width: "400px".into(),
            ..with_threshold(500.0)
        });
        let report = c.generate_pdf().await.expect("400px");
        assert_eq!(report.pagination.removed, 1);
        assert_eq!(marker_positions(&c.content()), vec![1, 3, 5]);
    }

    #[test]
    fn in_flight_flag_rejects_a_second_holder() {
        let flag = AtomicBool::new(false);
        let first = InFlight::acquire(&flag).expect("first");
        assert!(matches!(InFlight::acquire(&flag), Err(Error::GenerationInFlight)));
        drop(first);
        assert!(InFlight::acquire(&flag).is_ok());
    }
}

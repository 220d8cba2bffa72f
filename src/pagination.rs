//! Pagination engine – slices the content root into print pages by inserting
//! page-break marker elements between its direct children.
//!
//! One linear pass over the children accumulates their effective heights.
//! When the next child's rendered height would reach the threshold, an empty
//! marker `<div class="html2pdf__page-break">` is inserted before it and the
//! running height restarts with that child. The exporter turns every marker
//! into a new PDF page.
//!
//! The guard compares `running + raw height` while the accumulator adds the
//! *effective* (margin-inclusive) height, so a child whose margins alone
//! would overflow still lands on the current page.

use crate::dom::{DomNode, ElementNode, Tag};
use crate::measure::LayoutMeasure;

/// Class carried by page-break markers, and only by them.
pub const PAGE_BREAK_CLASS: &str = "html2pdf__page-break";

/// A fresh, empty page-break marker.
pub fn page_break_marker() -> ElementNode {
    ElementNode::new(Tag::Div).with_class(PAGE_BREAK_CLASS)
}

/// Why a pagination request did not run a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The caller places markers themselves.
    ManualPagination,
    /// Markers from a previous pass with the same threshold are still in place.
    AlreadyPaginated,
    /// Automatic pagination without a threshold never breaks.
    MissingThreshold,
}

/// Outcome of [`Paginator::paginate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationReport {
    /// Markers inserted by this call.
    pub inserted: usize,
    /// Markers removed because the threshold changed.
    pub removed: usize,
    pub skipped: Option<SkipReason>,
}

/// Tracks whether the content root already carries markers from a pass,
/// and for which threshold and content width.
#[derive(Debug, Clone, Default)]
pub struct Paginator {
    already_paginated: bool,
    threshold: Option<f32>,
    content_width: Option<f32>,
}

impl Paginator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paginated(&self) -> bool {
        self.already_paginated
    }

    /// Threshold of the last completed pass.
    pub fn threshold(&self) -> Option<f32> {
        self.threshold
    }

    /// Run one pagination request against `root`, measuring children laid
    /// out at `content_width` px.
    pub fn paginate<M: LayoutMeasure + ?Sized>(
        &mut self,
        root: &mut ElementNode,
        threshold: Option<f32>,
        content_width: f32,
        manual: bool,
        measure: &M,
    ) -> PaginationReport {
        let mut report = PaginationReport::default();
        if manual {
            report.skipped = Some(SkipReason::ManualPagination);
            return report;
        }
        let Some(threshold) = threshold else {
            report.skipped = Some(SkipReason::MissingThreshold);
            return report;
        };

        if self.already_paginated {
            if self.threshold == Some(threshold) && self.content_width == Some(content_width) {
                report.skipped = Some(SkipReason::AlreadyPaginated);
                return report;
            }
            log::debug!(
                "pagination changed from {:?}px at width {:?} to {threshold}px at width {content_width}; resetting",
                self.threshold,
                self.content_width
            );
            report.removed = self.reset(root);
        }

        report.inserted = insert_page_breaks(root, threshold, content_width, measure);
        self.already_paginated = true;
        self.threshold = Some(threshold);
        self.content_width = Some(content_width);
        log::debug!(
            "paginated content at {threshold}px: {} marker(s) inserted",
            report.inserted
        );
        report
    }

    /// Remove every marker under `root` and forget the previous pass.
    ///
    /// Returns the number of markers removed; with none present this only
    /// clears the flag.
    pub fn reset(&mut self, root: &mut ElementNode) -> usize {
        self.already_paginated = false;
        self.threshold = None;
        self.content_width = None;
        root.remove_class_elements(PAGE_BREAK_CLASS)
    }
}

/// Single pagination pass over the direct element children of `root`.
///
/// Existing markers reset the running height. Returns the number of markers
/// inserted.
pub fn insert_page_breaks<M: LayoutMeasure + ?Sized>(
    root: &mut ElementNode,
    threshold: f32,
    content_width: f32,
    measure: &M,
) -> usize {
    let mut running = 0.0f32;
    let mut inserted = 0;
    let mut index = 0;

    while index < root.children.len() {
        let metrics = match &root.children[index] {
            DomNode::Element(el) if el.has_class(PAGE_BREAK_CLASS) => {
                running = 0.0;
                None
            }
            DomNode::Element(el) => Some(measure.measure(el, content_width)),
            DomNode::Text(_) => None,
        };
        if let Some(metrics) = metrics {
            if running + metrics.height < threshold {
                running += metrics.effective_height();
            } else {
                root.insert_before(index, DomNode::Element(page_break_marker()));
                index += 1;
                inserted += 1;
                running = metrics.effective_height();
            }
        }
        index += 1;
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_fragment;
    use crate::measure::ElementMetrics;

    const WIDTH: f32 = 800.0;

    /// Reads `data-h` / `data-m` (top and bottom margin) attributes.
    fn attr_measure(e: &ElementNode) -> ElementMetrics {
        let num = |k: &str| {
            e.attributes
                .get(k)
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.0)
        };
        ElementMetrics::new(num("data-h"), num("data-m"), num("data-m"))
    }

    fn blocks(heights: &[(u32, u32)]) -> ElementNode {
        let html: String = heights
            .iter()
            .map(|(h, m)| format!(r#"<div data-h="{h}" data-m="{m}"></div>"#))
            .collect();
        parse_fragment(&html)
    }

    fn marker_positions(root: &ElementNode) -> Vec<usize> {
        root.element_children()
            .enumerate()
            .filter(|(_, e)| e.has_class(PAGE_BREAK_CLASS))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn three_equal_children_break_before_the_third() {
        let mut root = blocks(&[(200, 0), (200, 0), (200, 0)]);
        let inserted = insert_page_breaks(&mut root, 500.0, WIDTH, &attr_measure);
        assert_eq!(inserted, 1);
        assert_eq!(marker_positions(&root), vec![2]);
    }

    #[test]
    fn exact_fit_breaks() {
        let mut root = blocks(&[(250, 0), (250, 0)]);
        insert_page_breaks(&mut root, 500.0, WIDTH, &attr_measure);
        assert_eq!(marker_positions(&root), vec![1]);
    }

    #[test]
    fn guard_uses_raw_height_not_margins() {
        // 300 + 150 < 500 passes the guard even though margins push the
        // effective total to 300 + 250.
        let mut root = blocks(&[(300, 0), (150, 50), (10, 0)]);
        insert_page_breaks(&mut root, 500.0, WIDTH, &attr_measure);
        assert_eq!(marker_positions(&root), vec![2]);
    }

    #[test]
    fn oversized_first_child_gets_a_leading_marker() {
        let mut root = blocks(&[(600, 0), (100, 0)]);
        insert_page_breaks(&mut root, 500.0, WIDTH, &attr_measure);
        assert_eq!(marker_positions(&root), vec![0, 2]);
    }

    #[test]
    fn existing_marker_restarts_the_page() {
        let mut root = parse_fragment(
            r#"<div data-h="400"></div><div class="html2pdf__page-break"></div><div data-h="400"></div>"#,
        );
        let inserted = insert_page_breaks(&mut root, 500.0, WIDTH, &attr_measure);
        assert_eq!(inserted, 0);
    }

    #[test]
    fn void_elements_keep_blocks_at_the_top_level() {
        let mut root = parse_fragment(
            r#"<div data-h="200">a<br>b</div><div data-h="200">c<hr></div><div data-h="200">d</div>"#,
        );
        insert_page_breaks(&mut root, 500.0, WIDTH, &attr_measure);
        assert_eq!(root.element_children().count(), 4);
        assert_eq!(marker_positions(&root), vec![2]);
    }

    #[test]
    fn text_nodes_are_ignored() {
        let mut root = parse_fragment(r#"<div data-h="400"></div>loose text<div data-h="400"></div>"#);
        insert_page_breaks(&mut root, 500.0, WIDTH, &attr_measure);
        assert_eq!(root.children.len(), 4);
        assert!(matches!(root.children[1], DomNode::Text(_)));
        assert!(root.children[2]
            .as_element()
            .is_some_and(|e| e.has_class(PAGE_BREAK_CLASS)));
    }

    #[test]
    fn second_request_is_skipped() {
        let mut root = blocks(&[(300, 0), (300, 0), (300, 0)]);
        let mut p = Paginator::new();
        let first = p.paginate(&mut root, Some(500.0), WIDTH, false, &attr_measure);
        let snapshot = root.clone();
        let second = p.paginate(&mut root, Some(500.0), WIDTH, false, &attr_measure);
        assert_eq!(first.inserted, 2);
        assert_eq!(second.skipped, Some(SkipReason::AlreadyPaginated));
        assert_eq!(root, snapshot);
    }

    #[test]
    fn threshold_change_resets_before_repaginating() {
        let mut root = blocks(&[(300, 0), (300, 0), (300, 0)]);
        let mut p = Paginator::new();
        p.paginate(&mut root, Some(500.0), WIDTH, false, &attr_measure);
        assert_eq!(root.count_class(PAGE_BREAK_CLASS), 2);

        let report = p.paginate(&mut root, Some(700.0), WIDTH, false, &attr_measure);
        assert_eq!(report.removed, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(marker_positions(&root), vec![2]);
        assert_eq!(p.threshold(), Some(700.0));
    }

    #[test]
    fn manual_mode_never_touches_markers() {
        let mut root = parse_fragment(
            r#"<div data-h="900"></div><div class="html2pdf__page-break"></div><div data-h="900"></div>"#,
        );
        let before = root.clone();
        let mut p = Paginator::new();
        let report = p.paginate(&mut root, Some(100.0), WIDTH, true, &attr_measure);
        assert_eq!(report.skipped, Some(SkipReason::ManualPagination));
        assert_eq!(root, before);
        assert!(!p.is_paginated());
    }

    #[test]
    fn missing_threshold_inserts_nothing() {
        let mut root = blocks(&[(900, 0), (900, 0)]);
        let mut p = Paginator::new();
        let report = p.paginate(&mut root, None, WIDTH, false, &attr_measure);
        assert_eq!(report.skipped, Some(SkipReason::MissingThreshold));
        assert_eq!(root.count_class(PAGE_BREAK_CLASS), 0);
    }

    #[test]
    fn reset_without_markers_is_a_no_op() {
        let mut root = blocks(&[(10, 0)]);
        let before = root.clone();
        assert_eq!(Paginator::new().reset(&mut root), 0);
        assert_eq!(root, before);
    }

    #[test]
    fn pages_stay_under_threshold() {
        // Deterministic pseudo-random heights and margins.
        let mut seed = 0x2545_f491u32;
        let mut next = |m: u32| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed % m
        };
        for _ in 0..50 {
            let threshold = 200 + next(800);
            let heights: Vec<(u32, u32)> = (0..30).map(|_| (next(300), next(20))).collect();
            let mut root = blocks(&heights);
            insert_page_breaks(&mut root, threshold as f32, WIDTH, &attr_measure);

            let mut runs: Vec<Vec<ElementMetrics>> = vec![Vec::new()];
            for e in root.element_children() {
                if e.has_class(PAGE_BREAK_CLASS) {
                    runs.push(Vec::new());
                } else if let Some(run) = runs.last_mut() {
                    run.push(attr_measure(e));
                }
            }
            for run in runs.iter().filter(|r| r.len() > 1) {
                let before_last: f32 = run[..run.len() - 1]
                    .iter()
                    .map(ElementMetrics::effective_height)
                    .sum();
                let last = run[run.len() - 1];
                assert!(
                    before_last + last.height < threshold as f32,
                    "page overflowed: {run:?} at {threshold}"
                );
            }
        }
    }
}

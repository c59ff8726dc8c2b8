//! Viewing session: dirty tracking, lazy re-layout, and navigation.
//!
//! [`DocView`] owns the current page list and the user-visible position.
//! Configuration changes only mark the state dirty; the next read operation
//! triggers `render_if_dirty`, which re-runs layout and then re-resolves the
//! saved logical position so the reading position follows content, not page
//! numbers.
//!
//! Not safe for concurrent use: every method runs to completion on the
//! calling thread and the session performs no internal locking. Callers
//! sharing a view across threads must serialize access externally.

use std::sync::Arc;

use pageflow::{
    Document, FontFace, FontProvider, FontRequest, MetricFace, OutlineItem, PositionAddress,
    PositionToken,
};

use crate::coords::{ViewGeometry, ViewMode, COLUMN_GUTTER_PX};
use crate::geom::{Margins, Point, Rect};
use crate::layout::{LayoutEngine, LayoutOptions, LayoutParams, LayoutResult};
use crate::navigator;
use crate::page_list::{PageKind, PageRounding};
use crate::ranges::{PageLink, RangeOverlay, RangeSet};

/// Smallest accepted viewport edge.
pub const MIN_VIEWPORT_PX: i32 = 80;
/// Largest accepted viewport edge.
pub const MAX_VIEWPORT_PX: i32 = 5000;

/// Position sentinel: derive this axis from the other one.
const UNSET: i32 = -1;

/// Reflowable-document viewing session.
pub struct DocView {
    pub(crate) doc: Arc<Document>,
    font_provider: Arc<dyn FontProvider>,
    engine: LayoutEngine,

    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) margins: Margins,
    pub(crate) columns: u32,
    pub(crate) font_req: FontRequest,
    pub(crate) interline_percent: u32,
    pub(crate) show_cover: bool,
    pub(crate) cover_reserve: i32,
    pub(crate) mode: ViewMode,

    pub(crate) layout: LayoutResult,
    is_rendered: bool,
    position_is_set: bool,
    pub(crate) current_page: i32,
    pub(crate) current_offset: i32,
    saved_position: PositionAddress,
    pub(crate) ranges: RangeSet,
    outline: Vec<OutlineItem>,
    layout_runs: u64,
}

impl DocView {
    /// Session over `doc` resolving fonts through `font_provider`.
    pub fn new(doc: Document, font_provider: Arc<dyn FontProvider>) -> Self {
        let font_req = FontRequest::regular(16);
        let outline = doc.build_outline();
        let placeholder: Arc<dyn FontFace> = Arc::new(MetricFace::new("", font_req.size));
        Self {
            doc: Arc::new(doc),
            font_provider,
            engine: LayoutEngine::new(LayoutOptions::default()),
            width: 480,
            height: 800,
            margins: Margins::uniform(16),
            columns: 1,
            font_req,
            interline_percent: 100,
            show_cover: true,
            cover_reserve: 0,
            mode: ViewMode::Pages,
            layout: LayoutResult::empty(placeholder),
            is_rendered: false,
            position_is_set: false,
            current_page: UNSET,
            current_offset: UNSET,
            saved_position: PositionAddress::NULL,
            ranges: RangeSet::new(),
            outline,
            layout_runs: 0,
        }
    }

    /// Replace the document; previous addresses become meaningless.
    pub fn set_document(&mut self, doc: Document) {
        self.outline = doc.build_outline();
        self.doc = Arc::new(doc);
        self.saved_position = PositionAddress::NULL;
        self.ranges = RangeSet::new();
        self.current_page = UNSET;
        self.current_offset = UNSET;
        self.mark_dirty();
    }

    /// Document currently loaded.
    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    fn mark_dirty(&mut self) {
        self.is_rendered = false;
    }

    /// Whether a re-layout is pending.
    pub fn is_dirty(&self) -> bool {
        !self.is_rendered
    }

    /// Number of layout invocations so far (diagnostics).
    pub fn layout_runs(&self) -> u64 {
        self.layout_runs
    }

    // --- configuration -----------------------------------------------------

    /// Resize the viewport; edges clamp into `[80, 5000]`.
    ///
    /// A resize to the current size is a no-op and does not invalidate the
    /// layout.
    pub fn resize(&mut self, width: i32, height: i32) {
        let width = width.clamp(MIN_VIEWPORT_PX, MAX_VIEWPORT_PX);
        let height = height.clamp(MIN_VIEWPORT_PX, MAX_VIEWPORT_PX);
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.mark_dirty();
    }

    /// Viewport width.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Viewport height.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Set page margins.
    pub fn set_margins(&mut self, margins: Margins) {
        if margins == self.margins {
            return;
        }
        self.margins = margins;
        self.mark_dirty();
    }

    /// Configure the column count (1 or 2); the effective count also
    /// depends on the viewport shape.
    pub fn set_columns(&mut self, columns: u32) {
        let columns = columns.clamp(1, 2);
        if columns == self.columns {
            return;
        }
        self.columns = columns;
        self.mark_dirty();
    }

    /// Set the font configuration.
    pub fn set_font(&mut self, font_req: FontRequest) {
        if font_req == self.font_req {
            return;
        }
        self.font_req = font_req;
        self.mark_dirty();
    }

    /// Set interline spacing in percent (100 = font native).
    pub fn set_interline_percent(&mut self, percent: u32) {
        let percent = percent.max(1);
        if percent == self.interline_percent {
            return;
        }
        self.interline_percent = percent;
        self.mark_dirty();
    }

    /// Configure cover page emission and its reserved height.
    pub fn set_cover(&mut self, show_cover: bool, cover_reserve: i32) {
        if show_cover == self.show_cover && cover_reserve == self.cover_reserve {
            return;
        }
        self.show_cover = show_cover;
        self.cover_reserve = cover_reserve.max(0);
        self.mark_dirty();
    }

    /// Switch between scroll and paged presentation.
    ///
    /// The layout itself is mode-independent; only the saved position needs
    /// re-resolution into the other axis.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        self.position_is_set = false;
    }

    /// Current presentation mode.
    pub fn view_mode(&self) -> ViewMode {
        self.mode
    }

    /// Effective column count under the current viewport shape.
    pub fn columns(&self) -> u32 {
        self.geometry_unrendered().effective_columns()
    }

    // --- dirty/render orchestration ----------------------------------------

    fn content_size(&self) -> (i32, i32) {
        let content = Rect::new(0, 0, self.width, self.height).inset(
            self.margins.left,
            self.margins.top,
            self.margins.right,
            self.margins.bottom,
        );
        let columns = self.geometry_unrendered().effective_columns();
        let width = if columns == 2 {
            ((content.width - COLUMN_GUTTER_PX) / 2).max(1)
        } else {
            content.width.max(1)
        };
        (width, content.height.max(1))
    }

    /// Re-run layout if any configuration changed since the last run.
    ///
    /// Idempotent: a second call without intervening invalidation is a
    /// no-op. When the font cannot be resolved the view degrades to an
    /// empty page list but still counts as rendered.
    pub fn render_if_dirty(&mut self) {
        if self.is_rendered {
            return;
        }
        let (content_w, content_h) = self.content_size();
        let Some(font) = self.font_provider.get_font(&self.font_req) else {
            log::warn!(
                "no font for request size={} weight={}; rendering degraded empty layout",
                self.font_req.size,
                self.font_req.weight
            );
            let placeholder: Arc<dyn FontFace> =
                Arc::new(MetricFace::new("", self.font_req.size));
            self.layout = LayoutResult::empty(placeholder);
            self.is_rendered = true;
            self.position_is_set = false;
            self.ranges.update_rects(&self.doc, &self.layout);
            return;
        };
        let params = LayoutParams {
            width: content_w,
            height: content_h,
            show_cover: self.show_cover,
            cover_reserve: self.cover_reserve.min(content_h),
            font,
            interline_percent: self.interline_percent,
        };
        let doc = Arc::clone(&self.doc);
        // Replace-then-publish: the previous layout stays intact until the
        // new one is fully built.
        let next = self.engine.layout(&doc, &params);
        self.layout = next;
        self.layout_runs += 1;
        self.is_rendered = true;
        self.position_is_set = false;
        self.ranges.update_rects(&doc, &self.layout);
        navigator::update_outline_pages(&mut self.outline, &doc, &self.layout);
    }

    /// Resolve the saved logical position into the current axis.
    ///
    /// Single-entry position resolution: navigation methods never call this
    /// from inside their own bodies; they write the position and set the
    /// flag themselves, so a later call here cannot clobber a value a
    /// navigation method just wrote.
    pub fn ensure_position(&mut self) {
        if self.position_is_set {
            return;
        }
        let point = self
            .layout
            .point_of_address(&self.doc, self.saved_position)
            .unwrap_or(Point::new(0, 0));
        match self.mode {
            ViewMode::Pages => {
                self.current_page = self
                    .layout
                    .pages
                    .find_nearest_page(point.y, PageRounding::Down)
                    .map_or(0, |p| p as i32);
                self.current_offset = UNSET;
            }
            ViewMode::Scroll => {
                self.current_offset = point.y.max(0);
                self.current_page = UNSET;
            }
        }
        self.position_is_set = true;
    }

    // --- queries -----------------------------------------------------------

    /// Number of pages; 0 while nothing is loaded.
    pub fn pages_count(&mut self) -> usize {
        self.render_if_dirty();
        self.layout.pages.len()
    }

    /// Full scrollable height of the main flow.
    pub fn full_height(&mut self) -> i32 {
        self.render_if_dirty();
        self.layout.main_height
    }

    /// Current page index (0 while nothing is loaded).
    pub fn current_page(&mut self) -> usize {
        self.render_if_dirty();
        self.ensure_position();
        match self.mode {
            ViewMode::Pages => self.current_page.max(0) as usize,
            ViewMode::Scroll => self
                .layout
                .pages
                .find_nearest_page(self.current_offset.max(0), PageRounding::Down)
                .unwrap_or(0),
        }
    }

    /// Current vertical offset on the virtual axis.
    pub fn current_offset(&mut self) -> i32 {
        self.render_if_dirty();
        self.ensure_position();
        match self.mode {
            ViewMode::Scroll => self.current_offset.max(0),
            ViewMode::Pages => {
                let page = self.current_page.max(0) as usize;
                self.layout.pages.get(page).map_or(0, |p| p.start)
            }
        }
    }

    // --- navigation --------------------------------------------------------

    /// Go to `page`, clamping out-of-range indices.
    ///
    /// Returns `false` when the index was clamped or nothing is loaded.
    pub fn go_to_page(&mut self, page: usize, update_bookmark: bool) -> bool {
        self.render_if_dirty();
        let count = self.layout.pages.len();
        if count == 0 {
            return false;
        }
        let clamped = page.min(count - 1);
        let ok = clamped == page;
        match self.mode {
            ViewMode::Pages => {
                self.current_page = clamped as i32;
                self.current_offset = UNSET;
            }
            ViewMode::Scroll => {
                self.current_offset = self.layout.pages.get(clamped).map_or(0, |p| p.start);
                self.current_page = UNSET;
            }
        }
        // The position is committed before any address derivation below so
        // no nested resolution can clobber it.
        self.position_is_set = true;
        if update_bookmark {
            let start = self.layout.pages.get(clamped).map_or(0, |p| p.start);
            self.saved_position = self.layout.address_at_offset(start);
        }
        self.ranges.update_rects(&Arc::clone(&self.doc), &self.layout);
        ok
    }

    /// Go to a vertical offset.
    ///
    /// Scroll mode clamps into `[0, full_height - viewport_height]` unless
    /// `allow_past_end`; paged mode quantizes to the containing page.
    pub fn go_to_offset(&mut self, offset: i32, update_bookmark: bool, allow_past_end: bool) {
        self.render_if_dirty();
        let effective = match self.mode {
            ViewMode::Scroll => {
                let max_offset = (self.layout.main_height - self.height).max(0);
                let clamped = if allow_past_end {
                    offset.max(0)
                } else {
                    offset.clamp(0, max_offset)
                };
                self.current_offset = clamped;
                self.current_page = UNSET;
                clamped
            }
            ViewMode::Pages => {
                let page = self
                    .layout
                    .pages
                    .find_nearest_page(offset.max(0), PageRounding::Down)
                    .unwrap_or(0);
                self.current_page = page as i32;
                self.current_offset = UNSET;
                self.layout.pages.get(page).map_or(0, |p| p.start)
            }
        };
        self.position_is_set = true;
        if update_bookmark {
            self.saved_position = self.layout.address_at_offset(effective);
        }
    }

    /// Go to a logical address; `false` for null or unresolvable addresses.
    pub fn go_to_address(&mut self, addr: PositionAddress) -> bool {
        self.render_if_dirty();
        if addr.is_null() {
            return false;
        }
        let Some(point) = self.layout.point_of_address(&self.doc, addr) else {
            return false;
        };
        match self.mode {
            ViewMode::Pages => {
                self.current_page = self
                    .layout
                    .pages
                    .find_nearest_page(point.y, PageRounding::Down)
                    .map_or(0, |p| p as i32);
                self.current_offset = UNSET;
            }
            ViewMode::Scroll => {
                self.current_offset = point.y.max(0);
                self.current_page = UNSET;
            }
        }
        self.position_is_set = true;
        self.saved_position = addr;
        true
    }

    /// Logical address of the top of the current page/offset.
    pub fn bookmark(&mut self) -> PositionAddress {
        self.render_if_dirty();
        self.ensure_position();
        let top = self.current_offset();
        self.layout.address_at_offset(top)
    }

    /// Persisted token for the current position.
    pub fn position_token(&mut self) -> Option<PositionToken> {
        let addr = self.bookmark();
        let path = addr.to_text(&self.doc)?;
        let count = self.layout.pages.len().max(1);
        let page = self.current_page();
        Some(PositionToken {
            path,
            global_progress: page as f32 / count as f32,
            page_index: page as u32,
            page_count: count as u32,
        })
    }

    /// Restore a persisted token; structural path first, progress fallback.
    pub fn restore_position_token(&mut self, token: &PositionToken) -> bool {
        self.render_if_dirty();
        if let Ok(addr) = self.doc.resolve_address_text(&token.path) {
            if self.go_to_address(addr) {
                return true;
            }
        }
        log::debug!("position token path did not resolve; falling back to progress remap");
        let offset = (token.normalized_progress() * self.layout.main_height as f32) as i32;
        self.go_to_offset(offset, true, false);
        false
    }

    // --- coordinate mapping -------------------------------------------------

    fn geometry_unrendered(&self) -> ViewGeometry<'_> {
        ViewGeometry {
            mode: self.mode,
            width: self.width,
            height: self.height,
            margins: self.margins,
            columns: self.columns,
            font_size: self.font_req.size,
            current_page: self.current_page.max(0) as usize,
            current_offset: self.current_offset.max(0),
            pages: &self.layout.pages,
        }
    }

    /// Coordinate mapping snapshot for the current (rendered) state.
    pub fn geometry(&mut self) -> ViewGeometry<'_> {
        self.render_if_dirty();
        self.ensure_position();
        self.geometry_unrendered()
    }

    /// Window point to logical address; NULL when nothing is hit.
    pub fn address_at_window_point(&mut self, point: Point) -> PositionAddress {
        self.render_if_dirty();
        self.ensure_position();
        let Some(doc_point) = self.geometry_unrendered().window_to_doc(point) else {
            return PositionAddress::NULL;
        };
        let doc = Arc::clone(&self.doc);
        self.layout.address_at_point(&doc, doc_point)
    }

    // --- selection, marks, links --------------------------------------------

    /// Replace the selection range and refresh overlay rectangles.
    pub fn set_selection(&mut self, start: PositionAddress, end: PositionAddress) {
        self.render_if_dirty();
        self.ranges.set_selection(start, end);
        let doc = Arc::clone(&self.doc);
        self.ranges.update_rects(&doc, &self.layout);
    }

    /// Select the whole word under a window point.
    ///
    /// Returns `false` (leaving the previous selection intact) when the
    /// point hits no text.
    pub fn select_word_at(&mut self, point: Point) -> bool {
        let addr = self.address_at_window_point(point);
        if addr.is_null() {
            return false;
        }
        let Some(text) = self.doc.text_of(addr.node()) else {
            return false;
        };
        let chars: Vec<char> = text.chars().collect();
        let mut start = (addr.offset() as usize).min(chars.len());
        let mut end = start;
        while start > 0 && !chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while end < chars.len() && !chars[end].is_whitespace() {
            end += 1;
        }
        if start == end {
            return false;
        }
        self.set_selection(
            PositionAddress::new(addr.node(), start as u32),
            PositionAddress::new(addr.node(), end as u32),
        );
        true
    }

    /// Select the full text extent of an element.
    pub fn select_element(&mut self, node: pageflow::NodeId) -> bool {
        let Some((last_text, len)) = self.doc.last_text_descendant(node) else {
            return false;
        };
        self.set_selection(
            PositionAddress::new(node, 0),
            PositionAddress::new(last_text, len),
        );
        true
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.ranges.clear_selection();
        let doc = Arc::clone(&self.doc);
        self.ranges.update_rects(&doc, &self.layout);
    }

    /// Replace highlight overlays (bookmarks, search hits, corrections).
    pub fn set_marks(&mut self, marks: Vec<RangeOverlay>) {
        self.render_if_dirty();
        self.ranges.set_marks(marks);
        let doc = Arc::clone(&self.doc);
        self.ranges.update_rects(&doc, &self.layout);
    }

    /// Overlay state (selection, marks, derived rectangles).
    pub fn ranges(&self) -> &RangeSet {
        &self.ranges
    }

    /// Links visible on the current page(s) or scroll viewport.
    pub fn current_links(&mut self) -> Vec<PageLink> {
        self.render_if_dirty();
        self.ensure_position();
        let (top, bottom) = self.visible_doc_range();
        let doc = Arc::clone(&self.doc);
        crate::ranges::links_in_range(&doc, &self.layout, top, bottom)
    }

    /// Visible range on the virtual axis (both columns in column mode).
    pub(crate) fn visible_doc_range(&self) -> (i32, i32) {
        match self.mode {
            ViewMode::Scroll => {
                let top = self.current_offset.max(0);
                (top, top.saturating_add(self.height))
            }
            ViewMode::Pages => {
                let first = self.current_page.max(0) as usize;
                let geometry = self.geometry_unrendered();
                let last = first + geometry.effective_columns() as usize - 1;
                let top = self.layout.pages.get(first).map_or(0, |p| p.start);
                let bottom = self
                    .layout
                    .pages
                    .get(last.min(self.layout.pages.len().saturating_sub(1)))
                    .map_or(top, |p| p.end());
                (top, bottom)
            }
        }
    }

    // --- outline & text ----------------------------------------------------

    /// Outline with page numbers resolved against the current layout.
    pub fn outline(&mut self) -> &[OutlineItem] {
        self.render_if_dirty();
        &self.outline
    }

    /// Plain text of one page; empty when out of range.
    pub fn page_text(&mut self, page: usize) -> String {
        self.render_if_dirty();
        let Some(descriptor) = self.layout.pages.get(page) else {
            return String::new();
        };
        let (start, end) = (descriptor.start, descriptor.end());
        let doc = Arc::clone(&self.doc);
        self.layout.text_in_range(&doc, start, end)
    }

    /// Logical range covered by one page; `None` when out of range or when
    /// the page resolves to no content.
    pub fn page_range(&mut self, page: usize) -> Option<(PositionAddress, PositionAddress)> {
        self.render_if_dirty();
        let descriptor = self.layout.pages.get(page)?;
        let start = self.layout.address_at_offset(descriptor.start);
        let end = self.layout.address_at_offset(descriptor.end().saturating_sub(1));
        if start.is_null() || end.is_null() {
            return None;
        }
        Some((start, end))
    }

    /// Whether the page at `index` is the cover page.
    pub fn is_cover_page(&mut self, index: usize) -> bool {
        self.render_if_dirty();
        self.layout
            .pages
            .get(index)
            .is_some_and(|p| p.kind == PageKind::Cover)
    }
}

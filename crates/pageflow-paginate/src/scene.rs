//! Paint-ready scene composition.
//!
//! The view flattens its current state (page descriptors, line geometry,
//! overlay rectangles) into window-space draw data; the pixel backend
//! executes it without touching view internals. This is the seam between
//! pagination and rasterization.

use std::sync::Arc;

use pageflow::FontFace;

use crate::coords::ViewMode;
use crate::geom::Rect;
use crate::layout::char_slice;
use crate::page_list::PageKind;
use crate::ranges::OverlayKind;
use crate::view::DocView;

/// One text run in window coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneRun {
    /// Left edge.
    pub x: i32,
    /// Baseline y.
    pub baseline_y: i32,
    /// Run content.
    pub text: String,
}

/// Overlay rectangle in window coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneOverlay {
    pub rect: Rect,
    pub kind: OverlayKind,
}

/// Paint data for one displayed page (or the scroll viewport).
#[derive(Clone, Debug)]
pub struct PagePaint {
    /// Window rectangle this page occupies.
    pub rect: Rect,
    /// Page kind; cover pages carry no runs.
    pub kind: PageKind,
    /// Main text runs.
    pub runs: Vec<SceneRun>,
    /// Footnote runs stacked below the main text.
    pub footnote_runs: Vec<SceneRun>,
    /// Separator rule above the footnote area, present only when footnotes
    /// were placed.
    pub footnote_rule: Option<Rect>,
    /// Overlay rectangles (selection, highlights) on this page.
    pub overlays: Vec<SceneOverlay>,
}

/// Complete paint description of the viewport.
#[derive(Clone)]
pub struct ViewScene {
    /// Viewport width.
    pub width: i32,
    /// Viewport height.
    pub height: i32,
    /// Presentation mode the scene was composed for.
    pub mode: ViewMode,
    /// Effective column count (1 or 2).
    pub columns: u32,
    /// Clip area for content painting.
    pub content: Rect,
    /// Face every run uses.
    pub font: Arc<dyn FontFace>,
    /// Pages to paint, left to right.
    pub pages: Vec<PagePaint>,
}

impl DocView {
    /// Compose the current viewport into paint-ready data.
    ///
    /// Renders lazily first; an unloaded document composes an empty scene
    /// (no pages) rather than failing.
    pub fn compose(&mut self) -> ViewScene {
        self.render_if_dirty();
        self.ensure_position();
        let geometry = self.geometry();
        let columns = geometry.effective_columns();
        let content = geometry.content_rect();
        let font = Arc::clone(self.layout.font());
        let mode = self.view_mode();

        let mut pages = Vec::with_capacity(2);
        match mode {
            ViewMode::Scroll => {
                if !self.layout.is_empty() {
                    pages.push(self.compose_scroll_viewport());
                }
            }
            ViewMode::Pages => {
                let displayed = self.geometry().displayed_pages();
                for (index, rect) in displayed {
                    pages.push(self.compose_page(index, rect));
                }
            }
        }

        ViewScene {
            width: self.width,
            height: self.height,
            mode,
            columns,
            content: match mode {
                // Scroll mode clips horizontally only; the vertical axis is
                // continuous.
                ViewMode::Scroll => Rect::new(
                    self.margins.left,
                    0,
                    (self.width - self.margins.horizontal()).max(0),
                    self.height,
                ),
                ViewMode::Pages => content,
            },
            font,
            pages,
        }
    }

    fn runs_for_lines(
        &self,
        top: i32,
        bottom: i32,
        base_x: i32,
        map_y: impl Fn(i32) -> i32,
        out: &mut Vec<SceneRun>,
    ) {
        for line in self.layout.lines_in_range(top, bottom) {
            let y = map_y(line.y);
            for span in &line.spans {
                let Some(text) = self.doc.text_of(span.node) else {
                    continue;
                };
                let slice = char_slice(text, span.start, span.end);
                if slice.is_empty() {
                    continue;
                }
                out.push(SceneRun {
                    x: base_x + span.x,
                    baseline_y: y + line.baseline,
                    text: String::from(slice),
                });
            }
        }
    }

    fn compose_scroll_viewport(&self) -> PagePaint {
        let offset = self.current_offset.max(0);
        let top = offset;
        let bottom = offset.saturating_add(self.height);
        let left = self.margins.left;

        let mut runs = Vec::with_capacity(32);
        // Scroll space covers the main flow only.
        let main_bottom = bottom.min(self.layout.main_height);
        self.runs_for_lines(top, main_bottom, left, |y| y - offset, &mut runs);

        let overlays = self
            .ranges
            .rects_in_range(top, bottom)
            .map(|o| SceneOverlay {
                rect: Rect::new(o.rect.x + left, o.rect.y - offset, o.rect.width, o.rect.height),
                kind: o.kind,
            })
            .collect();

        PagePaint {
            rect: Rect::new(
                left,
                0,
                (self.width - self.margins.horizontal()).max(0),
                self.height,
            ),
            kind: PageKind::Normal,
            runs,
            footnote_runs: Vec::with_capacity(0),
            footnote_rule: None,
            overlays,
        }
    }

    fn compose_page(&self, index: usize, rect: Rect) -> PagePaint {
        let Some(page) = self.layout.pages.get(index).cloned() else {
            return PagePaint {
                rect,
                kind: PageKind::Normal,
                runs: Vec::with_capacity(0),
                footnote_runs: Vec::with_capacity(0),
                footnote_rule: None,
                overlays: Vec::with_capacity(0),
            };
        };
        if page.kind == PageKind::Cover {
            // The paint rect is the reserved cover area, not the whole
            // column; a small reserve collapses the drawable region.
            let reserved = Rect::new(rect.x, rect.y, rect.width, page.height.min(rect.height));
            return PagePaint {
                rect: reserved,
                kind: PageKind::Cover,
                runs: Vec::with_capacity(0),
                footnote_runs: Vec::with_capacity(0),
                footnote_rule: None,
                overlays: Vec::with_capacity(0),
            };
        }

        let mut runs = Vec::with_capacity(32);
        self.runs_for_lines(
            page.start,
            page.end(),
            rect.x,
            |y| rect.y + (y - page.start),
            &mut runs,
        );

        // Footnote slices stack below the main text with a fixed gap.
        let gap = 8;
        let mut footnote_runs = Vec::with_capacity(8);
        let mut footnote_rule = None;
        if !page.footnotes.is_empty() {
            let area_top = rect.y + page.height + gap;
            let mut stacked = 0;
            for slice in &page.footnotes {
                let slice_top = area_top + stacked;
                let slice_start = slice.start;
                self.runs_for_lines(
                    slice.start,
                    slice.start + slice.height,
                    rect.x,
                    |y| slice_top + (y - slice_start),
                    &mut footnote_runs,
                );
                stacked += slice.height;
            }
            if !footnote_runs.is_empty() {
                footnote_rule = Some(Rect::new(
                    rect.x,
                    rect.y + page.height + gap / 2,
                    rect.width,
                    1,
                ));
            }
        }

        let overlays = self
            .ranges
            .rects_in_range(page.start, page.end())
            .map(|o| SceneOverlay {
                rect: Rect::new(
                    rect.x + o.rect.x,
                    rect.y + (o.rect.y - page.start),
                    o.rect.width,
                    o.rect.height,
                ),
                kind: o.kind,
            })
            .collect();

        PagePaint {
            rect,
            kind: PageKind::Normal,
            runs,
            footnote_runs,
            footnote_rule,
            overlays,
        }
    }
}

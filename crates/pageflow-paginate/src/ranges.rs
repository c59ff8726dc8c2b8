//! Logical ranges (selection, highlights) and their derived pixel overlays.
//!
//! The `(start, end)` address pairs are the source of truth; pixel
//! rectangles are derived after every re-layout and thrown away with the
//! layout that produced them. Endpoints that no longer resolve are dropped
//! silently rather than surfaced as errors.

use std::collections::HashMap;

use pageflow::{Document, NodeId, PositionAddress};

use crate::geom::Rect;
use crate::layout::LayoutResult;

/// What an overlay range represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayKind {
    /// Active text selection.
    Selection,
    /// Pure last-read-position marker; never painted as a highlight.
    PositionMarker,
    /// Reader comment/highlight.
    Comment,
    /// Correction/edit marker.
    Correction,
}

/// One logical overlay range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeOverlay {
    pub start: PositionAddress,
    pub end: PositionAddress,
    pub kind: OverlayKind,
    pub flags: u8,
}

impl RangeOverlay {
    /// Overlay over `[start, end)` of the given kind.
    pub fn new(start: PositionAddress, end: PositionAddress, kind: OverlayKind) -> Self {
        Self {
            start,
            end,
            kind,
            flags: 0,
        }
    }
}

/// Derived paint rectangle in document space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayRect {
    pub rect: Rect,
    pub kind: OverlayKind,
}

/// Active selection plus highlight overlays, with derived rectangles.
#[derive(Clone, Debug, Default)]
pub struct RangeSet {
    selection: Option<RangeOverlay>,
    marks: Vec<RangeOverlay>,
    rects: Vec<OverlayRect>,
}

impl RangeSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection; the previous one is always cleared.
    ///
    /// Null endpoints clear the selection outright.
    pub fn set_selection(&mut self, start: PositionAddress, end: PositionAddress) {
        if start.is_null() || end.is_null() {
            self.selection = None;
        } else {
            self.selection = Some(RangeOverlay::new(start, end, OverlayKind::Selection));
        }
    }

    /// Drop the selection.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Current selection, if any.
    pub fn selection(&self) -> Option<&RangeOverlay> {
        self.selection.as_ref()
    }

    /// Replace the highlight overlays.
    ///
    /// Pure position markers are filtered out; they are bookkeeping, not
    /// paintable ranges.
    pub fn set_marks(&mut self, marks: Vec<RangeOverlay>) {
        self.marks = marks
            .into_iter()
            .filter(|m| m.kind != OverlayKind::PositionMarker)
            .collect();
    }

    /// Highlight overlays currently installed.
    pub fn marks(&self) -> &[RangeOverlay] {
        &self.marks
    }

    /// Recompute document-space rectangles against a fresh layout.
    ///
    /// Ranges whose endpoints do not resolve contribute nothing.
    pub fn update_rects(&mut self, doc: &Document, layout: &LayoutResult) {
        self.rects.clear();
        let overlays = self
            .marks
            .iter()
            .chain(self.selection.iter());
        for overlay in overlays {
            let mut rects = Vec::with_capacity(2);
            layout.range_rects(doc, overlay.start, overlay.end, &mut rects);
            self.rects.extend(rects.into_iter().map(|rect| OverlayRect {
                rect,
                kind: overlay.kind,
            }));
        }
    }

    /// Derived rectangles from the last `update_rects`.
    pub fn rects(&self) -> &[OverlayRect] {
        &self.rects
    }

    /// Derived rectangles intersecting `[top, bottom)` on the virtual axis.
    pub fn rects_in_range(&self, top: i32, bottom: i32) -> impl Iterator<Item = &OverlayRect> {
        self.rects
            .iter()
            .filter(move |o| o.rect.bottom() > top && o.rect.y < bottom)
    }
}

/// Link harvested from a page, with one rect per visual line fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLink {
    /// Anchor element (stable id; used for de-duplication).
    pub node: NodeId,
    /// Link target.
    pub href: String,
    /// Document-space rectangles, split at visual line breaks.
    pub rects: Vec<Rect>,
}

/// Harvest anchors whose rendered text intersects `[top, bottom)`.
///
/// An anchor wrapped across a line break yields one rect per line; fragments
/// on the same visual line (equal line rectangle) merge into one rect.
/// Anchors are de-duplicated by node id, first encounter wins the order.
pub fn links_in_range(
    doc: &Document,
    layout: &LayoutResult,
    top: i32,
    bottom: i32,
) -> Vec<PageLink> {
    let mut out: Vec<PageLink> = Vec::with_capacity(4);
    let mut by_node: HashMap<NodeId, usize> = HashMap::with_capacity(4);

    for line in layout.lines_in_range(top, bottom) {
        for span in &line.spans {
            let Some(anchor) = doc.enclosing_anchor(span.node) else {
                continue;
            };
            let href = doc
                .node(anchor)
                .and_then(|n| match n.element() {
                    Some(pageflow::ElementKind::Anchor { href }) => Some(href.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            let index = *by_node.entry(anchor).or_insert_with(|| {
                out.push(PageLink {
                    node: anchor,
                    href,
                    rects: Vec::with_capacity(1),
                });
                out.len() - 1
            });
            let span_rect = Rect::new(span.x, line.y, span.width, line.height);
            let Some(link) = out.get_mut(index) else {
                continue;
            };
            // Same visual line (equal y/height) extends the last rect;
            // a new line starts a new fragment.
            match link.rects.last_mut() {
                Some(last)
                    if last.y == span_rect.y
                        && last.height == span_rect.height
                        && span_rect.x >= last.x =>
                {
                    last.width = (span_rect.right() - last.x).max(last.width);
                }
                _ => link.rects.push(span_rect),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{links_in_range, OverlayKind, RangeOverlay, RangeSet};
    use crate::layout::{LayoutEngine, LayoutParams};
    use pageflow::{Document, DocumentBuilder, ElementKind, MetricFace, PositionAddress};
    use std::sync::Arc;

    fn params(width: i32, height: i32) -> LayoutParams {
        LayoutParams {
            width,
            height,
            show_cover: false,
            cover_reserve: 0,
            font: Arc::new(MetricFace::new("Test", 16)),
            interline_percent: 100,
        }
    }

    fn linked_doc() -> Document {
        let mut b = DocumentBuilder::new();
        b.begin(ElementKind::Paragraph);
        b.text("before the link ");
        b.begin(ElementKind::Anchor {
            href: String::from("#target"),
        });
        b.text("a rather long anchor label that will certainly wrap");
        b.end();
        b.text(" after the link");
        b.end();
        b.finish()
    }

    #[test]
    fn selection_replaces_previous_selection() {
        let doc = linked_doc();
        let root = doc.root().expect("root");
        let para = doc.node(root).expect("node").children()[0];
        let first_text = doc.node(para).expect("node").children()[0];

        let mut ranges = RangeSet::new();
        ranges.set_selection(
            PositionAddress::new(first_text, 0),
            PositionAddress::new(first_text, 4),
        );
        ranges.set_selection(
            PositionAddress::new(first_text, 5),
            PositionAddress::new(first_text, 9),
        );
        let selection = ranges.selection().expect("selection");
        assert_eq!(selection.start.offset(), 5);
        ranges.set_selection(PositionAddress::NULL, PositionAddress::new(first_text, 2));
        assert!(ranges.selection().is_none());
    }

    #[test]
    fn position_markers_are_filtered_from_marks() {
        let doc = linked_doc();
        let root = doc.root().expect("root");
        let para = doc.node(root).expect("node").children()[0];
        let text = doc.node(para).expect("node").children()[0];
        let a = PositionAddress::new(text, 0);
        let b = PositionAddress::new(text, 3);

        let mut ranges = RangeSet::new();
        ranges.set_marks(vec![
            RangeOverlay::new(a, b, OverlayKind::Comment),
            RangeOverlay::new(a, a, OverlayKind::PositionMarker),
            RangeOverlay::new(a, b, OverlayKind::Correction),
        ]);
        assert_eq!(ranges.marks().len(), 2);
    }

    #[test]
    fn update_rects_resolves_and_drops_silently() {
        let doc = linked_doc();
        let engine = LayoutEngine::default();
        let layout = engine.layout(&doc, &params(200, 300));
        let root = doc.root().expect("root");
        let para = doc.node(root).expect("node").children()[0];
        let text = doc.node(para).expect("node").children()[0];

        let mut ranges = RangeSet::new();
        ranges.set_selection(
            PositionAddress::new(text, 0),
            PositionAddress::new(text, 10),
        );
        ranges.set_marks(vec![RangeOverlay::new(
            PositionAddress::NULL,
            PositionAddress::NULL,
            OverlayKind::Comment,
        )]);
        ranges.update_rects(&doc, &layout);
        // The selection resolves; the null-ended mark contributes nothing.
        assert!(!ranges.rects().is_empty());
        assert!(ranges
            .rects()
            .iter()
            .all(|r| r.kind == OverlayKind::Selection));
    }

    #[test]
    fn wrapped_anchor_splits_into_per_line_rects() {
        let doc = linked_doc();
        let engine = LayoutEngine::default();
        let layout = engine.layout(&doc, &params(200, 400));

        let links = links_in_range(&doc, &layout, 0, layout.main_height);
        assert_eq!(links.len(), 1, "anchor de-duplicates to one entry");
        let link = &links[0];
        assert_eq!(link.href, "#target");
        assert!(
            link.rects.len() > 1,
            "wrapped anchor yields one rect per visual line"
        );
        let mut ys: Vec<i32> = link.rects.iter().map(|r| r.y).collect();
        ys.dedup();
        assert_eq!(ys.len(), link.rects.len(), "one rect per line");
    }

    #[test]
    fn harvest_outside_range_is_empty() {
        let doc = linked_doc();
        let engine = LayoutEngine::default();
        let layout = engine.layout(&doc, &params(200, 400));
        let links = links_in_range(&doc, &layout, layout.main_height + 100, layout.main_height + 200);
        assert!(links.is_empty());
    }
}

//! Deterministic block layout over the document tree.
//!
//! `layout` is a pure function of the tree and the layout parameters: for
//! identical inputs the produced [`LayoutResult`] is byte-identical, which
//! the view layer relies on for stable page indices across repeated renders.
//! The walk is O(document size) and has no observable side effects; callers
//! are expected to gate invocations behind dirty tracking.

use std::collections::HashMap;
use std::sync::Arc;

use pageflow::{Document, ElementKind, FontFace, NodeId, NodeKind, PositionAddress};
use smallvec::SmallVec;

use crate::geom::{Point, Rect};
use crate::page_list::{FootnoteSlice, PageDescriptor, PageKind, PageList};

/// Style knobs that are not per-render parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutOptions {
    /// Gap after a paragraph block.
    pub paragraph_gap_px: i32,
    /// Gap around title blocks.
    pub title_gap_px: i32,
    /// Gap between main text and the footnote area of a page.
    pub footnote_gap_px: i32,
    /// First-line indent for paragraphs.
    pub first_line_indent_px: i32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            paragraph_gap_px: 8,
            title_gap_px: 10,
            footnote_gap_px: 8,
            first_line_indent_px: 18,
        }
    }
}

/// Per-render layout parameters.
///
/// `width`/`height` are the *content* area (viewport minus margins). The
/// interline percentage scales the font's line box; any positive value is
/// accepted.
#[derive(Clone)]
pub struct LayoutParams {
    /// Content width in pixels.
    pub width: i32,
    /// Content height in pixels.
    pub height: i32,
    /// Emit a cover page when the document carries a cover element.
    pub show_cover: bool,
    /// Height reserved for the cover page.
    pub cover_reserve: i32,
    /// Face used for every run (style-level face variation is the
    /// importer's concern and collapses to one face here).
    pub font: Arc<dyn FontFace>,
    /// Interline spacing in percent; 100 keeps the font's native line box.
    pub interline_percent: u32,
}

/// Slice of one text node placed on one visual line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpanBox {
    /// Source text node.
    pub node: NodeId,
    /// First char offset covered (inclusive).
    pub start: u32,
    /// Last char offset covered (exclusive).
    pub end: u32,
    /// Left edge in document space.
    pub x: i32,
    /// Advance width in pixels.
    pub width: i32,
}

/// One visual line in document space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineBox {
    /// Top offset in the virtual vertical axis.
    pub y: i32,
    /// Line height.
    pub height: i32,
    /// Baseline offset from the line top.
    pub baseline: i32,
    /// Placed spans, left to right.
    pub spans: SmallVec<[SpanBox; 4]>,
}

impl LineBox {
    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    fn left(&self) -> i32 {
        self.spans.first().map_or(0, |s| s.x)
    }

    fn right(&self) -> i32 {
        self.spans.last().map_or(0, |s| s.x.saturating_add(s.width))
    }
}

/// Vertical bounds of a laid-out block element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockBounds {
    /// Block top in the virtual axis.
    pub top: i32,
    /// Block extent.
    pub height: i32,
}

/// Output of one layout run.
///
/// Owns every derived geometry structure; replaced wholesale together with
/// the page list on re-layout.
pub struct LayoutResult {
    /// Pages covering the main flow.
    pub pages: PageList,
    /// All lines: main flow first, footnote lines after, ascending `y`.
    pub lines: Vec<LineBox>,
    /// Number of leading entries of `lines` that belong to the main flow.
    pub main_line_count: usize,
    /// End of the main flow axis (scroll-mode full height).
    pub main_height: i32,
    /// Extent of the footnote region past `main_height`.
    pub footnote_extent: i32,
    blocks: HashMap<NodeId, BlockBounds>,
    node_lines: HashMap<NodeId, Vec<u32>>,
    font: Arc<dyn FontFace>,
}

/// Deterministic layout engine.
#[derive(Clone, Debug, Default)]
pub struct LayoutEngine {
    options: LayoutOptions,
}

struct FootnoteRegion {
    start: i32,
    height: i32,
    anchor_line: usize,
}

struct FlowState {
    lines: Vec<LineBox>,
    blocks: HashMap<NodeId, BlockBounds>,
    node_lines: HashMap<NodeId, Vec<u32>>,
    cursor: i32,
    pending_footnotes: Vec<NodeId>,
    footnote_anchor: Vec<usize>,
}

enum InlineItem<'a> {
    Run { node: NodeId, text: &'a str },
    Break,
}

impl LayoutEngine {
    /// Engine with default style knobs.
    pub fn new(options: LayoutOptions) -> Self {
        Self { options }
    }

    /// Style knobs in effect.
    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    /// Lay out `doc` under `params`.
    ///
    /// A document without a renderable root produces an empty result; this
    /// is the "not yet loaded" state, not an error.
    pub fn layout(&self, doc: &Document, params: &LayoutParams) -> LayoutResult {
        let font = Arc::clone(&params.font);
        let Some(root) = doc.root() else {
            return LayoutResult::empty(font);
        };

        let cover = if params.show_cover && params.cover_reserve > 0 {
            find_cover(doc, root)
        } else {
            None
        };
        let flow_origin = if cover.is_some() {
            params.cover_reserve
        } else {
            0
        };

        let line_height = scaled_line_height(font.as_ref(), params.interline_percent);
        let mut flow = FlowState {
            lines: Vec::with_capacity(64),
            blocks: HashMap::with_capacity(16),
            node_lines: HashMap::with_capacity(32),
            cursor: flow_origin,
            pending_footnotes: Vec::with_capacity(4),
            footnote_anchor: Vec::with_capacity(4),
        };

        self.walk_flow(doc, root, params, line_height, &mut flow);
        let main_line_count = flow.lines.len();
        let main_height = flow.cursor;

        // Footnote blocks continue the axis past the main flow.
        let mut regions = Vec::with_capacity(flow.pending_footnotes.len());
        let pending = std::mem::take(&mut flow.pending_footnotes);
        let anchors = std::mem::take(&mut flow.footnote_anchor);
        for (node, anchor_line) in pending.into_iter().zip(anchors) {
            let top = flow.cursor;
            self.layout_block(doc, node, params, line_height, 0, &mut flow);
            let height = flow.cursor - top;
            if height > 0 {
                regions.push(FootnoteRegion {
                    start: top,
                    height,
                    anchor_line,
                });
            }
        }
        let footnote_extent = flow.cursor - main_height;

        let pages = assemble_pages(
            &flow.lines[..main_line_count],
            &regions,
            cover.is_some(),
            params,
            flow_origin,
            main_height,
            self.options.footnote_gap_px,
        );

        LayoutResult {
            pages,
            lines: flow.lines,
            main_line_count,
            main_height,
            footnote_extent,
            blocks: flow.blocks,
            node_lines: flow.node_lines,
            font,
        }
    }

    fn walk_flow(
        &self,
        doc: &Document,
        node_id: NodeId,
        params: &LayoutParams,
        line_height: i32,
        flow: &mut FlowState,
    ) {
        let Some(node) = doc.node(node_id) else {
            return;
        };
        match node.kind() {
            NodeKind::Text(_) => {
                // Stray text directly under a container renders as a block.
                self.layout_block(doc, node_id, params, line_height, 0, flow);
            }
            NodeKind::Element(kind) => match kind {
                ElementKind::Body | ElementKind::Section => {
                    let top = flow.cursor;
                    let children: Vec<NodeId> = node.children().to_vec();
                    for child in children {
                        self.walk_flow(doc, child, params, line_height, flow);
                    }
                    flow.blocks.insert(
                        node_id,
                        BlockBounds {
                            top,
                            height: flow.cursor - top,
                        },
                    );
                }
                ElementKind::Title => {
                    flow.cursor += self.options.title_gap_px;
                    self.layout_block(doc, node_id, params, line_height, 0, flow);
                    flow.cursor += self.options.title_gap_px;
                }
                ElementKind::Paragraph => {
                    self.layout_block(
                        doc,
                        node_id,
                        params,
                        line_height,
                        self.options.first_line_indent_px,
                        flow,
                    );
                    flow.cursor += self.options.paragraph_gap_px;
                }
                ElementKind::Footnote => {
                    flow.pending_footnotes.push(node_id);
                    flow.footnote_anchor
                        .push(flow.lines.len().saturating_sub(1));
                }
                ElementKind::Anchor { .. } | ElementKind::Cover { .. } | ElementKind::LineBreak => {
                }
            },
        }
    }

    /// Word-wrap one block's inline content into lines at the flow cursor.
    fn layout_block(
        &self,
        doc: &Document,
        block: NodeId,
        params: &LayoutParams,
        line_height: i32,
        first_line_indent: i32,
        flow: &mut FlowState,
    ) {
        let font = params.font.as_ref();
        let top = flow.cursor;
        let width = params.width.max(1);
        let baseline = line_baseline(font, line_height);

        let mut items = Vec::with_capacity(4);
        let mut inline_footnotes = Vec::with_capacity(0);
        match doc.node(block).map(|n| n.kind()) {
            Some(NodeKind::Text(text)) => items.push(InlineItem::Run { node: block, text }),
            Some(NodeKind::Element(_)) => {
                let children: Vec<NodeId> =
                    doc.node(block).map(|n| n.children().to_vec()).unwrap_or_default();
                for child in children {
                    collect_inline(doc, child, &mut items, &mut inline_footnotes);
                }
            }
            None => {}
        }

        let mut current: SmallVec<[SpanBox; 4]> = SmallVec::new();
        let mut pen_x = first_line_indent.min(width.saturating_sub(1)).max(0);
        let mut first_line = true;

        let flush =
            |spans: &mut SmallVec<[SpanBox; 4]>, flow: &mut FlowState, pen_x: &mut i32| {
                if spans.is_empty() {
                    return;
                }
                let line_index = flow.lines.len() as u32;
                for span in spans.iter() {
                    flow.node_lines
                        .entry(span.node)
                        .or_insert_with(|| Vec::with_capacity(2))
                        .push(line_index);
                }
                flow.lines.push(LineBox {
                    y: flow.cursor,
                    height: line_height,
                    baseline,
                    spans: std::mem::take(spans),
                });
                flow.cursor += line_height;
                *pen_x = 0;
            };

        for item in items {
            match item {
                InlineItem::Break => {
                    flush(&mut current, flow, &mut pen_x);
                    first_line = false;
                }
                InlineItem::Run { node, text } => {
                    let mut chars = text.char_indices().peekable();
                    let mut offset = 0u32;
                    while chars.peek().is_some() {
                        // Skip leading whitespace, tracking how many chars.
                        let mut space_chars = 0u32;
                        while let Some(&(_, ch)) = chars.peek() {
                            if ch.is_whitespace() {
                                chars.next();
                                offset += 1;
                                space_chars += 1;
                            } else {
                                break;
                            }
                        }
                        let word_start = offset;
                        let mut word_width = 0i32;
                        let mut word = String::with_capacity(16);
                        while let Some(&(_, ch)) = chars.peek() {
                            if ch.is_whitespace() {
                                break;
                            }
                            chars.next();
                            offset += 1;
                            word_width = word_width.saturating_add(font.char_width(ch));
                            word.push(ch);
                        }
                        if word.is_empty() {
                            continue;
                        }
                        let mut space_width = if current.is_empty() {
                            0
                        } else {
                            font.char_width(' ').saturating_mul(space_chars.max(1) as i32)
                        };
                        if pen_x + space_width + word_width > width && !current.is_empty() {
                            flush(&mut current, flow, &mut pen_x);
                            first_line = false;
                            // A wrapped word never carries its leading space.
                            space_width = 0;
                        }
                        let indent = if first_line && current.is_empty() {
                            first_line_indent.min(width.saturating_sub(1)).max(0)
                        } else {
                            0
                        };
                        if current.is_empty() {
                            pen_x = indent;
                        }
                        let joins_previous = current
                            .last()
                            .is_some_and(|s| s.node == node && s.end == word_start - space_chars);
                        if joins_previous && space_chars > 0 {
                            if let Some(last) = current.last_mut() {
                                last.end = offset;
                                last.width = last
                                    .width
                                    .saturating_add(space_width)
                                    .saturating_add(word_width);
                            }
                            pen_x = pen_x.saturating_add(space_width).saturating_add(word_width);
                        } else {
                            let x = pen_x.saturating_add(space_width);
                            current.push(SpanBox {
                                node,
                                start: word_start,
                                end: offset,
                                x,
                                width: word_width,
                            });
                            pen_x = x.saturating_add(word_width);
                        }
                    }
                }
            }
        }
        flush(&mut current, flow, &mut pen_x);

        // Footnotes referenced inside this block anchor to its last line.
        // Footnotes nested inside footnote bodies are dropped.
        let anchor = flow.lines.len().saturating_sub(1);
        for footnote in inline_footnotes {
            flow.pending_footnotes.push(footnote);
            flow.footnote_anchor.push(anchor);
        }

        flow.blocks.insert(
            block,
            BlockBounds {
                top,
                height: flow.cursor - top,
            },
        );
    }
}

fn collect_inline<'a>(
    doc: &'a Document,
    node_id: NodeId,
    out: &mut Vec<InlineItem<'a>>,
    footnotes: &mut Vec<NodeId>,
) {
    let Some(node) = doc.node(node_id) else {
        return;
    };
    match node.kind() {
        NodeKind::Text(text) => out.push(InlineItem::Run {
            node: node_id,
            text,
        }),
        NodeKind::Element(ElementKind::LineBreak) => out.push(InlineItem::Break),
        NodeKind::Element(ElementKind::Footnote) => {
            // Footnote content never flows inline; it lays out in the
            // footnote region and attaches to the enclosing block's page.
            footnotes.push(node_id);
        }
        NodeKind::Element(_) => {
            for &child in node.children() {
                collect_inline(doc, child, out, footnotes);
            }
        }
    }
}

fn find_cover(doc: &Document, root: NodeId) -> Option<NodeId> {
    let node = doc.node(root)?;
    if matches!(node.element(), Some(ElementKind::Cover { .. })) {
        return Some(root);
    }
    for &child in node.children() {
        if let Some(found) = find_cover(doc, child) {
            return Some(found);
        }
    }
    None
}

fn scaled_line_height(font: &dyn FontFace, interline_percent: u32) -> i32 {
    let pct = interline_percent.max(1) as i64;
    ((font.height() as i64 * pct) / 100).max(1) as i32
}

fn line_baseline(font: &dyn FontFace, line_height: i32) -> i32 {
    font.ascent() + (line_height - font.height()).max(0) / 2
}

fn assemble_pages(
    main_lines: &[LineBox],
    regions: &[FootnoteRegion],
    has_cover: bool,
    params: &LayoutParams,
    flow_origin: i32,
    main_height: i32,
    footnote_gap: i32,
) -> PageList {
    let mut pages = Vec::with_capacity(main_lines.len() / 8 + 2);
    if has_cover {
        pages.push(PageDescriptor {
            start: 0,
            height: params.cover_reserve,
            kind: PageKind::Cover,
            footnotes: SmallVec::new(),
        });
    }
    if main_lines.is_empty() {
        return PageList::from_pages(pages);
    }

    // Footnote regions grouped by the main line they anchor to.
    let mut anchored: HashMap<usize, Vec<usize>> = HashMap::with_capacity(regions.len());
    for (index, region) in regions.iter().enumerate() {
        anchored
            .entry(region.anchor_line.min(main_lines.len() - 1))
            .or_insert_with(|| Vec::with_capacity(1))
            .push(index);
    }

    let content_h = params.height.max(1);
    let mut i = 0usize;
    let mut page_start = flow_origin;
    while i < main_lines.len() {
        let mut footnote_total = 0i32;
        let mut slices: SmallVec<[FootnoteSlice; 2]> = SmallVec::new();
        let mut j = i;
        while j < main_lines.len() {
            let line = &main_lines[j];
            let extra: i32 = anchored
                .get(&j)
                .map(|rs| rs.iter().map(|&r| regions[r].height).sum())
                .unwrap_or(0);
            let projected = footnote_total.saturating_add(extra);
            let gap = if projected > 0 { footnote_gap } else { 0 };
            let used_main = line.bottom() - page_start;
            if j > i && used_main + projected + gap > content_h {
                break;
            }
            footnote_total = projected;
            if let Some(rs) = anchored.get(&j) {
                for &r in rs {
                    slices.push(FootnoteSlice {
                        start: regions[r].start,
                        height: regions[r].height,
                    });
                }
            }
            j += 1;
        }
        let page_end = if j < main_lines.len() {
            main_lines[j].y
        } else {
            main_height
        };
        pages.push(PageDescriptor {
            start: page_start,
            height: page_end - page_start,
            kind: PageKind::Normal,
            footnotes: slices,
        });
        page_start = page_end;
        i = j;
    }
    PageList::from_pages(pages)
}

/// Char-index slice of `text`; clamps out-of-range bounds.
pub(crate) fn char_slice(text: &str, start: u32, end: u32) -> &str {
    if end <= start {
        return "";
    }
    let mut byte_start = text.len();
    let mut byte_end = text.len();
    for (count, (byte, _)) in text.char_indices().enumerate() {
        if count == start as usize {
            byte_start = byte;
        }
        if count == end as usize {
            byte_end = byte;
            break;
        }
    }
    if (end as usize) >= text.chars().count() {
        byte_end = text.len();
    }
    if byte_start >= byte_end {
        ""
    } else {
        &text[byte_start..byte_end]
    }
}

impl LayoutResult {
    /// Result with no pages and no geometry.
    pub fn empty(font: Arc<dyn FontFace>) -> Self {
        Self {
            pages: PageList::empty(),
            lines: Vec::with_capacity(0),
            main_line_count: 0,
            main_height: 0,
            footnote_extent: 0,
            blocks: HashMap::with_capacity(0),
            node_lines: HashMap::with_capacity(0),
            font,
        }
    }

    /// Whether the layout carries no content.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.pages.is_empty()
    }

    /// Face the layout was produced with.
    pub fn font(&self) -> &Arc<dyn FontFace> {
        &self.font
    }

    /// Vertical bounds of a laid-out block element.
    pub fn block_bounds(&self, node: NodeId) -> Option<BlockBounds> {
        self.blocks.get(&node).copied()
    }

    /// Index of the line containing `y`, or the nearest following line.
    pub fn line_at(&self, y: i32) -> Option<usize> {
        if self.lines.is_empty() {
            return None;
        }
        let index = self.lines.partition_point(|line| line.bottom() <= y);
        Some(index.min(self.lines.len() - 1))
    }

    /// Document-space point of a logical address.
    ///
    /// `None` when the address is null, stale, or not covered by this
    /// layout.
    pub fn point_of_address(&self, doc: &Document, addr: PositionAddress) -> Option<Point> {
        if addr.is_null() {
            return None;
        }
        if let Some(bounds) = self.blocks.get(&addr.node()) {
            return Some(Point::new(0, bounds.top));
        }
        let line_indices = self.node_lines.get(&addr.node())?;
        let text = doc.text_of(addr.node())?;
        let offset = addr.offset();
        let mut best: Option<Point> = None;
        for &line_index in line_indices {
            let line = self.lines.get(line_index as usize)?;
            for span in &line.spans {
                if span.node != addr.node() {
                    continue;
                }
                if offset >= span.start && offset <= span.end {
                    let prefix = char_slice(text, span.start, offset);
                    let x = span.x.saturating_add(self.font.measure(prefix));
                    return Some(Point::new(x, line.y));
                }
                // Remember the closest earlier span as a fallback for
                // offsets that fall into collapsed whitespace.
                if offset > span.end {
                    best = Some(Point::new(span.x.saturating_add(span.width), line.y));
                }
            }
        }
        best
    }

    /// Logical address of the character nearest to a document-space point.
    ///
    /// Returns [`PositionAddress::NULL`] when the layout is empty.
    pub fn address_at_point(&self, doc: &Document, point: Point) -> PositionAddress {
        let Some(line_index) = self.line_at(point.y) else {
            return PositionAddress::NULL;
        };
        let Some(line) = self.lines.get(line_index) else {
            return PositionAddress::NULL;
        };
        let Some(first) = line.spans.first() else {
            return PositionAddress::NULL;
        };
        if point.x <= first.x {
            return PositionAddress::new(first.node, first.start);
        }
        for span in &line.spans {
            let right = span.x.saturating_add(span.width);
            if point.x < right {
                let Some(text) = doc.text_of(span.node) else {
                    return PositionAddress::new(span.node, span.start);
                };
                let mut x = span.x;
                for (count, ch) in char_slice(text, span.start, span.end).chars().enumerate() {
                    let advance = self.font.char_width(ch);
                    if point.x < x + advance {
                        return PositionAddress::new(span.node, span.start + count as u32);
                    }
                    x += advance;
                }
                return PositionAddress::new(span.node, span.end);
            }
        }
        let Some(last) = line.spans.last() else {
            return PositionAddress::NULL;
        };
        PositionAddress::new(last.node, last.end)
    }

    /// Address of the first content at or below `offset` on the main axis.
    pub fn address_at_offset(&self, offset: i32) -> PositionAddress {
        let Some(line_index) = self.line_at(offset) else {
            return PositionAddress::NULL;
        };
        self.lines
            .get(line_index)
            .and_then(|line| line.spans.first())
            .map_or(PositionAddress::NULL, |span| {
                PositionAddress::new(span.node, span.start)
            })
    }

    /// Per-line document-space rectangles covering `[start, end)`.
    ///
    /// Endpoints that do not resolve produce an empty result rather than an
    /// error; multi-line ranges yield one rect per visual line.
    pub fn range_rects(
        &self,
        doc: &Document,
        start: PositionAddress,
        end: PositionAddress,
        out: &mut Vec<Rect>,
    ) {
        let (start, end) = if end < start { (end, start) } else { (start, end) };
        let Some(start_pt) = self.point_of_address(doc, start) else {
            return;
        };
        let Some(end_pt) = self.point_of_address(doc, end) else {
            return;
        };
        let Some(start_line) = self.line_at(start_pt.y) else {
            return;
        };
        let Some(end_line) = self.line_at(end_pt.y) else {
            return;
        };
        for index in start_line..=end_line {
            let Some(line) = self.lines.get(index) else {
                continue;
            };
            let left = if index == start_line {
                start_pt.x
            } else {
                line.left()
            };
            let right = if index == end_line {
                end_pt.x
            } else {
                line.right()
            };
            if right > left {
                out.push(Rect::new(left, line.y, right - left, line.height));
            }
        }
    }

    /// Plain text of every line intersecting `[top, bottom)` on the main
    /// axis, one line per visual line.
    pub fn text_in_range(&self, doc: &Document, top: i32, bottom: i32) -> String {
        let mut out = String::with_capacity(256);
        for line in &self.lines[..self.main_line_count] {
            if line.bottom() <= top {
                continue;
            }
            if line.y >= bottom {
                break;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            let mut first = true;
            for span in &line.spans {
                if let Some(text) = doc.text_of(span.node) {
                    let slice = char_slice(text, span.start, span.end);
                    if !first && !slice.is_empty() && !out.ends_with(char::is_whitespace) {
                        out.push(' ');
                    }
                    out.push_str(slice.trim_matches(|c: char| c == '\n'));
                    first = false;
                }
            }
        }
        out
    }

    /// Lines whose vertical extent intersects `[top, bottom)`.
    pub fn lines_in_range(&self, top: i32, bottom: i32) -> &[LineBox] {
        let begin = self.lines.partition_point(|line| line.bottom() <= top);
        let end = self.lines.partition_point(|line| line.y < bottom);
        self.lines.get(begin..end).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::{char_slice, LayoutEngine, LayoutOptions, LayoutParams};
    use crate::geom::Point;
    use crate::page_list::PageKind;
    use pageflow::{Document, DocumentBuilder, ElementKind, MetricFace};
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

    fn prose_doc(paragraphs: usize, words_per_paragraph: usize) -> Document {
        let mut b = DocumentBuilder::new();
        b.begin(ElementKind::Section);
        b.begin(ElementKind::Title);
        b.text("Chapter");
        b.end();
        for _ in 0..paragraphs {
            b.begin(ElementKind::Paragraph);
            let mut text = String::with_capacity(words_per_paragraph * 6);
            for w in 0..words_per_paragraph {
                if w > 0 {
                    text.push(' ');
                }
                text.push_str("lorem");
            }
            b.text(&text);
            b.end();
        }
        b.end();
        b.finish()
    }

    #[test]
    fn empty_document_produces_empty_result() {
        let engine = LayoutEngine::default();
        let result = engine.layout(&Document::empty(), &params(300, 400));
        assert!(result.is_empty());
        assert_eq!(result.pages.len(), 0);
    }

    #[test]
    fn layout_is_deterministic() {
        let engine = LayoutEngine::default();
        let doc = prose_doc(6, 40);
        let p = params(280, 360);
        let a = engine.layout(&doc, &p);
        let b = engine.layout(&doc, &p);
        assert_eq!(a.pages, b.pages);
        assert_eq!(a.lines, b.lines);
    }

    #[test]
    fn pages_tile_the_main_axis() {
        let engine = LayoutEngine::default();
        let doc = prose_doc(8, 60);
        let result = engine.layout(&doc, &params(280, 360));
        assert!(result.pages.len() > 1);
        assert!(result.pages.is_contiguous());
        assert_eq!(result.pages.end_offset(), result.main_height);
    }

    #[test]
    fn narrower_content_produces_more_pages() {
        let engine = LayoutEngine::default();
        let doc = prose_doc(8, 60);
        let wide = engine.layout(&doc, &params(500, 360));
        let narrow = engine.layout(&doc, &params(180, 360));
        assert!(narrow.pages.len() > wide.pages.len());
    }

    #[test]
    fn cover_page_precedes_content_by_reserve() {
        let mut b = DocumentBuilder::new();
        b.leaf(ElementKind::Cover {
            width: 600,
            height: 800,
        });
        b.begin(ElementKind::Paragraph);
        b.text("after the cover");
        b.end();
        let doc = b.finish();

        let engine = LayoutEngine::default();
        let mut p = params(300, 400);
        p.show_cover = true;
        p.cover_reserve = 400;
        let result = engine.layout(&doc, &p);

        let first = result.pages.get(0).expect("cover page");
        assert_eq!(first.kind, PageKind::Cover);
        assert_eq!(first.start, 0);
        assert_eq!(first.height, 400);
        let second = result.pages.get(1).expect("content page");
        assert_eq!(second.start, 400);
        assert!(result.pages.is_contiguous());
    }

    #[test]
    fn footnotes_attach_to_their_anchor_page_and_shrink_it() {
        let mut b = DocumentBuilder::new();
        b.begin(ElementKind::Section);
        for i in 0..4 {
            b.begin(ElementKind::Paragraph);
            b.text(&format!("paragraph number {} with several words inside", i));
            b.end();
            if i == 0 {
                b.begin(ElementKind::Footnote);
                b.text("a footnote bound to the first paragraph");
                b.end();
            }
        }
        b.end();
        let doc = b.finish();

        let engine = LayoutEngine::default();
        let result = engine.layout(&doc, &params(260, 140));
        let with_notes: Vec<_> = result
            .pages
            .pages()
            .iter()
            .filter(|p| !p.footnotes.is_empty())
            .collect();
        assert_eq!(with_notes.len(), 1);
        let page = with_notes[0];
        assert_eq!(page.start, 0, "footnote anchors to the first page");
        // Main slice plus notes plus the gap stays within the content height.
        assert!(page.height + page.footnotes_height() + engine.options().footnote_gap_px <= 140);
        assert!(result.footnote_extent > 0);
    }

    #[test]
    fn address_point_round_trip_stays_on_char() {
        let engine = LayoutEngine::default();
        let doc = prose_doc(3, 30);
        let result = engine.layout(&doc, &params(240, 300));
        let probe = Point::new(37, 90);
        let addr = result.address_at_point(&doc, probe);
        assert!(!addr.is_null());
        let point = result.point_of_address(&doc, addr).expect("resolvable");
        let again = result.address_at_point(&doc, point);
        assert_eq!(addr, again);
    }

    #[test]
    fn interline_percent_scales_line_height() {
        let engine = LayoutEngine::default();
        let doc = prose_doc(2, 40);
        let mut p = params(240, 300);
        let normal = engine.layout(&doc, &p);
        p.interline_percent = 150;
        let spaced = engine.layout(&doc, &p);
        assert!(spaced.main_height > normal.main_height);
        assert_eq!(normal.main_line_count, spaced.main_line_count);
    }

    #[test]
    fn text_in_range_reads_page_text() {
        let engine = LayoutEngine::default();
        let doc = prose_doc(1, 8);
        let result = engine.layout(&doc, &params(500, 300));
        let page = result.pages.get(0).expect("page");
        let text = result.text_in_range(&doc, page.start, page.end());
        assert!(text.contains("Chapter"));
        assert!(text.contains("lorem"));
    }

    #[test]
    fn char_slice_clamps_bounds() {
        assert_eq!(char_slice("hello", 1, 3), "el");
        assert_eq!(char_slice("hello", 3, 99), "lo");
        assert_eq!(char_slice("hello", 4, 2), "");
        assert_eq!(char_slice("héllo", 1, 2), "é");
    }

    #[test]
    fn forced_line_breaks_split_lines() {
        let mut b = DocumentBuilder::new();
        b.begin(ElementKind::Paragraph);
        b.text("above");
        b.leaf(ElementKind::LineBreak);
        b.text("below");
        b.end();
        let doc = b.finish();
        let engine = LayoutEngine::default();
        let result = engine.layout(&doc, &params(500, 300));
        assert_eq!(result.main_line_count, 2);
    }
}

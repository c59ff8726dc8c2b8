//! Address-level navigation helpers built on the view and the layout.

use pageflow::{Document, ElementKind, OutlineItem, PositionAddress};

use crate::layout::LayoutResult;
use crate::page_list::PageRounding;
use crate::view::DocView;

/// Display caps for bookmark position text.
const TITLE_CHAR_CAP: usize = 70;
const SNIPPET_CHAR_CAP: usize = 120;

/// Refresh `resolved_page` across the outline tree.
///
/// Targets that do not resolve against the current layout become −1. Must
/// run after every re-layout that can move page boundaries; the view calls
/// it from its render path.
pub fn update_outline_pages(items: &mut [OutlineItem], doc: &Document, layout: &LayoutResult) {
    for item in items {
        item.resolved_page = layout
            .point_of_address(doc, item.target)
            .and_then(|point| layout.pages.find_nearest_page(point.y, PageRounding::Down))
            .map_or(-1, |page| page as i32);
        update_outline_pages(&mut item.children, doc, layout);
    }
}

fn trim_title_punctuation(title: &str) -> &str {
    title.trim_end_matches(['.', ';', ':', ',']).trim_end()
}

fn cap_chars(text: &str, cap: usize) -> String {
    let mut out = String::with_capacity(cap.min(text.len()));
    for (count, ch) in text.chars().enumerate() {
        if count >= cap {
            break;
        }
        out.push(ch);
    }
    out
}

impl DocView {
    /// Page containing `addr`; null addresses resolve to page 0.
    pub fn page_for_address(&mut self, addr: PositionAddress) -> usize {
        self.render_if_dirty();
        if addr.is_null() {
            return 0;
        }
        self.layout
            .point_of_address(&self.doc, addr)
            .and_then(|point| {
                self.layout
                    .pages
                    .find_nearest_page(point.y, PageRounding::Down)
            })
            .unwrap_or(0)
    }

    /// Human-readable `(title, snippet)` pair for a bookmark address.
    ///
    /// The title accumulates enclosing chapter titles outermost-first,
    /// joined with `". "` after trailing punctuation is normalized away;
    /// the snippet is the text at the address. Both are char-capped for UI
    /// display. Pure derivation, no view state changes.
    pub fn bookmark_position_text(&self, addr: PositionAddress) -> (String, String) {
        if addr.is_null() {
            return (String::new(), String::new());
        }
        let doc = &self.doc;

        let mut titles: Vec<String> = doc
            .ancestors(addr.node())
            .filter(|&ancestor| {
                doc.node(ancestor)
                    .is_some_and(|n| matches!(n.element(), Some(ElementKind::Section)))
            })
            .filter_map(|section| doc.section_title(section))
            .collect();
        titles.reverse();
        let mut title = String::with_capacity(TITLE_CHAR_CAP);
        for part in &titles {
            let part = trim_title_punctuation(part);
            if part.is_empty() {
                continue;
            }
            if !title.is_empty() {
                title.push_str(". ");
            }
            title.push_str(part);
        }
        let title = cap_chars(&title, TITLE_CHAR_CAP);

        let raw = doc.collect_text(addr.node(), SNIPPET_CHAR_CAP + addr.offset() as usize);
        let snippet: String = raw
            .chars()
            .skip(addr.offset() as usize)
            .take(SNIPPET_CHAR_CAP)
            .collect();
        (title, String::from(snippet.trim_start()))
    }
}

#[cfg(test)]
mod tests {
    use super::update_outline_pages;
    use crate::geom::Margins;
    use crate::view::DocView;
    use pageflow::{
        Document, DocumentBuilder, ElementKind, FontCache, FontFamily, PositionAddress,
        RegisteredFace,
    };
    use std::sync::Arc;

    fn provider() -> Arc<FontCache> {
        Arc::new(FontCache::new(vec![RegisteredFace {
            name: String::from("Test Serif"),
            family: FontFamily::Serif,
            weight: 400,
            italic: false,
        }]))
    }

    fn chaptered_doc() -> Document {
        let mut b = DocumentBuilder::new();
        for chapter in 0..3 {
            b.begin(ElementKind::Section);
            b.begin(ElementKind::Title);
            b.text(&format!("Chapter {}.", chapter + 1));
            b.end();
            for _ in 0..12 {
                b.begin(ElementKind::Paragraph);
                b.text("some reading material that fills a number of lines on every page");
                b.end();
            }
            b.end();
        }
        b.finish()
    }

    fn view() -> DocView {
        let mut view = DocView::new(chaptered_doc(), provider());
        view.resize(300, 400);
        view.set_margins(Margins::uniform(10));
        view
    }

    #[test]
    fn outline_pages_resolve_and_follow_relayout() {
        let mut view = view();
        let _ = view.pages_count();
        let first_pages: Vec<i32> = view.outline().iter().map(|i| i.resolved_page).collect();
        assert_eq!(first_pages.len(), 3);
        assert!(first_pages.iter().all(|&p| p >= 0));
        assert!(first_pages.windows(2).all(|w| w[0] <= w[1]));

        // A much larger font moves later chapters to later pages.
        view.set_font(pageflow::FontRequest::regular(26));
        let _ = view.pages_count();
        let second_pages: Vec<i32> = view.outline().iter().map(|i| i.resolved_page).collect();
        assert!(second_pages.iter().all(|&p| p >= 0));
        assert!(second_pages[2] >= first_pages[2]);
    }

    #[test]
    fn stale_outline_targets_resolve_to_minus_one() {
        let mut view = view();
        let _ = view.pages_count();
        let mut items = vec![pageflow::OutlineItem::new(
            String::from("ghost"),
            PositionAddress::NULL,
        )];
        let doc = Arc::clone(view.document());
        update_outline_pages(&mut items, &doc, &view.layout);
        assert_eq!(items[0].resolved_page, -1);
    }

    #[test]
    fn page_for_null_address_is_zero() {
        let mut view = view();
        assert_eq!(view.page_for_address(PositionAddress::NULL), 0);
    }

    #[test]
    fn bookmark_text_joins_chapter_titles_and_caps() {
        let mut view = view();
        let _ = view.pages_count();
        view.go_to_page(2, true);
        let addr = view.bookmark();
        let (title, snippet) = view.bookmark_position_text(addr);
        assert!(title.starts_with("Chapter"));
        assert!(!title.ends_with('.') || title.chars().count() == 70);
        assert!(title.chars().count() <= 70);
        assert!(!snippet.is_empty());
        assert!(snippet.chars().count() <= 120);
    }
}

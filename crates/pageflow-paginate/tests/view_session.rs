use std::sync::Arc;

use pageflow::{
    Document, DocumentBuilder, ElementKind, FontCache, FontFamily, FontRequest, PositionAddress,
    RegisteredFace,
};
use pageflow_paginate::{DocView, Margins, PageRounding, Point, ViewMode};

fn provider() -> Arc<FontCache> {
    Arc::new(FontCache::new(vec![
        RegisteredFace {
            name: String::from("Test Serif"),
            family: FontFamily::Serif,
            weight: 400,
            italic: false,
        },
        RegisteredFace {
            name: String::from("Test Sans"),
            family: FontFamily::SansSerif,
            weight: 400,
            italic: false,
        },
    ]))
}

fn novel() -> Document {
    let mut b = DocumentBuilder::new();
    for chapter in 0..4 {
        b.begin_with_id(ElementKind::Section, &format!("ch{}", chapter + 1));
        b.begin(ElementKind::Title);
        b.text(&format!("Chapter {}", chapter + 1));
        b.end();
        for paragraph in 0..15 {
            b.begin(ElementKind::Paragraph);
            let mut text = String::with_capacity(300);
            for word in 0..45 {
                if word > 0 {
                    text.push(' ');
                }
                text.push_str(match (chapter + paragraph + word) % 4 {
                    0 => "steady",
                    1 => "reading",
                    2 => "material",
                    _ => "here",
                });
            }
            b.text(&text);
            b.end();
        }
        b.end();
    }
    b.finish()
}

fn open_view() -> DocView {
    let mut view = DocView::new(novel(), provider());
    view.resize(360, 480);
    view.set_margins(Margins::uniform(12));
    view
}

#[test]
fn unloaded_state_answers_with_sentinels() {
    let mut view = DocView::new(Document::empty(), provider());
    view.resize(200, 400);
    assert_eq!(view.pages_count(), 0);
    assert!(!view.go_to_page(0, true));
    assert_eq!(view.full_height(), 0);
    let scene = view.compose();
    assert!(scene.pages.is_empty());
}

#[test]
fn render_is_idempotent_and_preserves_position() {
    let mut view = open_view();
    let count = view.pages_count();
    view.go_to_page(3, true);
    let runs = view.layout_runs();
    let page_before = view.current_page();
    view.render_if_dirty();
    view.render_if_dirty();
    assert_eq!(view.layout_runs(), runs);
    assert_eq!(view.current_page(), page_before);
    assert_eq!(view.pages_count(), count);
}

#[test]
fn page_lookup_is_monotonic_over_offsets() {
    let mut view = open_view();
    let _ = view.pages_count();
    let geometry = view.geometry();
    let pages = geometry.pages;
    let mut previous = 0usize;
    let mut offset = 0;
    while offset < pages.end_offset() {
        let page = pages
            .find_nearest_page(offset, PageRounding::Down)
            .expect("non-empty list");
        assert!(page >= previous, "lookup regressed at offset {}", offset);
        previous = page;
        offset += 7;
    }
}

#[test]
fn bookmark_text_round_trip_stays_on_page() {
    let mut view = open_view();
    let count = view.pages_count();
    view.go_to_page(count / 2, true);
    let addr = view.bookmark();
    let path = addr.to_text(view.document()).expect("serializable");

    let resolved = view
        .document()
        .resolve_address_text(&path)
        .expect("resolvable");
    assert_eq!(resolved, addr);
    assert_eq!(view.page_for_address(resolved), count / 2);
}

#[test]
fn reading_position_follows_content_across_font_change() {
    let mut view = open_view();
    let count = view.pages_count();
    view.go_to_page(count * 2 / 3, true);
    let addr = view.bookmark();

    view.set_font(FontRequest::regular(24));
    view.render_if_dirty();
    let new_page = view.current_page();
    let target = view.page_for_address(addr);
    assert_eq!(
        new_page, target,
        "current page must follow the saved address through relayout"
    );
}

#[test]
fn selection_logic_survives_resize_while_rects_refresh() {
    let mut view = open_view();
    let _ = view.pages_count();
    view.go_to_page(1, true);
    let start = view.bookmark();
    let end = PositionAddress::new(start.node(), start.offset() + 12);
    view.set_selection(start, end);
    let rects_before: Vec<_> = view.ranges().rects().to_vec();
    assert!(!rects_before.is_empty());

    view.resize(300, 420);
    let _ = view.pages_count();
    let selection = view.ranges().selection().cloned().expect("still selected");
    assert_eq!(selection.start, start);
    assert_eq!(selection.end, end);
    let rects_after: Vec<_> = view.ranges().rects().to_vec();
    assert!(!rects_after.is_empty());
    assert_ne!(
        rects_before, rects_after,
        "pixel rects must be recomputed for the new layout"
    );
}

#[test]
fn two_column_mode_shows_consecutive_pages() {
    let mut view = open_view();
    view.resize(1000, 800);
    view.set_columns(2);
    let _ = view.pages_count();
    assert_eq!(view.columns(), 2);
    view.go_to_page(2, true);
    let scene = view.compose();
    assert_eq!(scene.pages.len(), 2);
    assert!(scene.pages[0].rect.x < scene.pages[1].rect.x);

    // A tall viewport falls back to a single column.
    view.resize(1000, 1500);
    assert_eq!(view.columns(), 1);
    let _ = view.pages_count();
    let scene = view.compose();
    assert_eq!(scene.pages.len(), 1);
}

#[test]
fn window_points_round_trip_through_addresses() {
    let mut view = open_view();
    let _ = view.pages_count();
    view.go_to_page(1, true);
    let probe = Point::new(60, 80);
    let addr = view.address_at_window_point(probe);
    assert!(!addr.is_null());

    let geometry = view.geometry();
    let doc_point = geometry.window_to_doc(probe).expect("inside the page");
    let page = geometry
        .pages
        .find_nearest_page(doc_point.y, PageRounding::Down)
        .expect("non-empty");
    assert_eq!(page, 1);
}

#[test]
fn scroll_and_paged_modes_agree_on_the_position() {
    let mut view = open_view();
    let _ = view.pages_count();
    view.go_to_page(4, true);
    let paged_offset = view.current_offset();

    view.set_view_mode(ViewMode::Scroll);
    let scroll_offset = view.current_offset();
    assert!((scroll_offset - paged_offset).abs() <= 1);

    view.set_view_mode(ViewMode::Pages);
    assert_eq!(view.current_page(), 4);
}

#[test]
fn outline_targets_resolve_in_reading_order() {
    let mut view = open_view();
    let _ = view.pages_count();
    let pages: Vec<i32> = view.outline().iter().map(|i| i.resolved_page).collect();
    assert_eq!(pages.len(), 4);
    assert!(pages.iter().all(|&p| p >= 0));
    assert!(pages.windows(2).all(|w| w[0] <= w[1]));
}

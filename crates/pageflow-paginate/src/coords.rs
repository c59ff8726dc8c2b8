//! Window/document coordinate mapping.
//!
//! Window coordinates originate at the viewport top-left; document
//! coordinates live on the single virtual vertical axis the page list
//! covers. In paged mode the viewport shows one or two page rectangles
//! (column layout); scroll mode is a plain vertical translation.

use smallvec::SmallVec;

use crate::geom::{Margins, Point, Rect};
use crate::page_list::PageList;

/// Horizontal gap between the two page rectangles in column layout.
pub(crate) const COLUMN_GUTTER_PX: i32 = 16;

/// Presentation mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    /// Continuous vertical scroll.
    Scroll,
    /// Discrete pages.
    #[default]
    Pages,
}

/// Immutable snapshot of the view state the mapper needs.
///
/// Borrowed from the view for the duration of one mapping operation; the
/// page list reference keeps the mapping consistent even while a
/// replacement list is being computed elsewhere.
#[derive(Clone)]
pub struct ViewGeometry<'a> {
    pub mode: ViewMode,
    pub width: i32,
    pub height: i32,
    pub margins: Margins,
    /// Configured column count; the effective count also depends on the
    /// viewport shape.
    pub columns: u32,
    pub font_size: i32,
    pub current_page: usize,
    pub current_offset: i32,
    pub pages: &'a PageList,
}

impl ViewGeometry<'_> {
    /// Column count actually in effect.
    ///
    /// Two columns require paged mode, a viewport at least twenty font
    /// sizes wide, and `width x 5 >= height x 6`; anything else renders a
    /// single column regardless of configuration.
    pub fn effective_columns(&self) -> u32 {
        if self.mode != ViewMode::Pages {
            return 1;
        }
        let configured = self.columns.clamp(1, 2);
        if configured < 2 {
            return 1;
        }
        let wide_enough = self.width >= self.font_size.saturating_mul(20);
        let flat_enough =
            i64::from(self.width) * 5 >= i64::from(self.height) * 6;
        if wide_enough && flat_enough {
            2
        } else {
            1
        }
    }

    /// Content area inside the margins.
    pub fn content_rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height).inset(
            self.margins.left,
            self.margins.top,
            self.margins.right,
            self.margins.bottom,
        )
    }

    /// Width available to one page rectangle.
    pub fn column_width(&self) -> i32 {
        let content = self.content_rect();
        if self.effective_columns() == 2 {
            ((content.width - COLUMN_GUTTER_PX) / 2).max(1)
        } else {
            content.width.max(1)
        }
    }

    /// Visible page indices with their window rectangles.
    ///
    /// Empty in scroll mode and for an empty page list.
    pub fn displayed_pages(&self) -> SmallVec<[(usize, Rect); 2]> {
        let mut out = SmallVec::new();
        if self.mode != ViewMode::Pages || self.pages.is_empty() {
            return out;
        }
        let content = self.content_rect();
        let column_width = self.column_width();
        for column in 0..self.effective_columns() as usize {
            let index = self.current_page + column;
            if index >= self.pages.len() {
                break;
            }
            let x = content.x + column as i32 * (column_width + COLUMN_GUTTER_PX);
            out.push((index, Rect::new(x, content.y, column_width, content.height)));
        }
        out
    }

    /// Map a window point to a document point.
    ///
    /// Scroll mode always succeeds; paged mode fails (`None`) when the
    /// point falls in a margin or the inter-column gutter.
    pub fn window_to_doc(&self, point: Point) -> Option<Point> {
        match self.mode {
            ViewMode::Scroll => Some(Point::new(
                point.x - self.margins.left,
                point.y.saturating_add(self.current_offset),
            )),
            ViewMode::Pages => {
                for (index, rect) in self.displayed_pages() {
                    if !rect.contains(point) {
                        continue;
                    }
                    let page = self.pages.get(index)?;
                    return Some(Point::new(
                        point.x - rect.x,
                        page.start + (point.y - rect.y),
                    ));
                }
                None
            }
        }
    }

    /// Map a single-page document rect to a window rect.
    ///
    /// The rect must not span pages; multi-page rects are split by the
    /// overlay layer before mapping. `None` when the rect is not visible.
    pub fn doc_to_window(&self, rect: Rect) -> Option<Rect> {
        match self.mode {
            ViewMode::Scroll => {
                let mapped = Rect::new(
                    rect.x + self.margins.left,
                    rect.y - self.current_offset,
                    rect.width,
                    rect.height,
                );
                let viewport = Rect::new(0, 0, self.width, self.height);
                if mapped.intersect(&viewport).is_empty() {
                    None
                } else {
                    Some(mapped)
                }
            }
            ViewMode::Pages => {
                for (index, page_rect) in self.displayed_pages() {
                    let page = self.pages.get(index)?;
                    if rect.y < page.start || rect.bottom() > page.end() {
                        continue;
                    }
                    return Some(Rect::new(
                        page_rect.x + rect.x,
                        page_rect.y + (rect.y - page.start),
                        rect.width,
                        rect.height,
                    ));
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ViewGeometry, ViewMode};
    use crate::geom::{Margins, Point, Rect};
    use crate::page_list::{PageDescriptor, PageKind, PageList};
    use smallvec::SmallVec;

    fn pages_of(heights: &[i32]) -> PageList {
        let mut pages = Vec::with_capacity(heights.len());
        let mut start = 0;
        for &height in heights {
            pages.push(PageDescriptor {
                start,
                height,
                kind: PageKind::Normal,
                footnotes: SmallVec::new(),
            });
            start += height;
        }
        PageList::from_pages(pages)
    }

    fn geometry<'a>(pages: &'a PageList, width: i32, height: i32, columns: u32) -> ViewGeometry<'a> {
        ViewGeometry {
            mode: ViewMode::Pages,
            width,
            height,
            margins: Margins::uniform(10),
            columns,
            font_size: 20,
            current_page: 0,
            current_offset: 0,
            pages,
        }
    }

    #[test]
    fn two_columns_require_wide_flat_viewports() {
        let pages = pages_of(&[500, 500, 500]);
        // width 1000, height 800: both conditions hold.
        assert_eq!(geometry(&pages, 1000, 800, 2).effective_columns(), 2);
        // Taller than 5w >= 6h allows: single column regardless of config.
        assert_eq!(geometry(&pages, 1000, 1500, 2).effective_columns(), 1);
        // Narrower than twenty font sizes: single column.
        assert_eq!(geometry(&pages, 300, 200, 2).effective_columns(), 1);
        // Configured single column stays single.
        assert_eq!(geometry(&pages, 1000, 800, 1).effective_columns(), 1);
    }

    #[test]
    fn scroll_mapping_is_a_translation() {
        let pages = pages_of(&[500]);
        let mut geom = geometry(&pages, 400, 600, 1);
        geom.mode = ViewMode::Scroll;
        geom.current_offset = 120;
        let doc = geom.window_to_doc(Point::new(50, 30)).expect("always ok");
        assert_eq!(doc, Point::new(40, 150));
    }

    #[test]
    fn paged_mapping_rejects_gutter_points() {
        let pages = pages_of(&[500, 500, 500]);
        let geom = geometry(&pages, 1000, 800, 2);
        // Inside the left page.
        let doc = geom.window_to_doc(Point::new(20, 20)).expect("left page");
        assert_eq!(doc, Point::new(10, 10));
        // Inside the right page: maps into page 1's range.
        let right_x = geom.content_rect().x + geom.column_width() + 20;
        let doc = geom
            .window_to_doc(Point::new(right_x, 20))
            .expect("right page");
        assert!(doc.y >= 500);
        // Top margin point resolves nowhere.
        assert_eq!(geom.window_to_doc(Point::new(20, 2)), None);
    }

    #[test]
    fn doc_to_window_inverts_window_to_doc() {
        let pages = pages_of(&[500, 500]);
        let geom = geometry(&pages, 1000, 800, 2);
        let win = Point::new(30, 40);
        let doc = geom.window_to_doc(win).expect("inside");
        let rect = geom
            .doc_to_window(Rect::new(doc.x, doc.y, 8, 8))
            .expect("visible");
        assert_eq!((rect.x, rect.y), (win.x, win.y));
    }

    #[test]
    fn doc_to_window_hides_offscreen_pages() {
        let pages = pages_of(&[500, 500, 500]);
        let geom = geometry(&pages, 400, 600, 1);
        // Page 2 is not displayed while current_page is 0.
        assert_eq!(geom.doc_to_window(Rect::new(0, 1100, 10, 10)), None);
    }
}

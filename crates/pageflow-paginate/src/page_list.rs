//! Page descriptors and the ordered page list produced by layout.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Kind of a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageKind {
    /// Regular text page.
    #[default]
    Normal,
    /// Cover page occupying the reserved cover slot.
    Cover,
}

/// Footnote slice attached to a page, in footnote-axis coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteSlice {
    /// Top of the slice in the virtual footnote region.
    pub start: i32,
    /// Slice height in pixels.
    pub height: i32,
}

/// One page of the paginated document.
///
/// `start`/`height` address the virtual vertical axis; descriptors are
/// immutable once produced and owned by their [`PageList`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageDescriptor {
    /// Top offset in virtual document space.
    pub start: i32,
    /// Page height in virtual document space.
    pub height: i32,
    /// Page kind.
    pub kind: PageKind,
    /// Footnote slices stacked below the main text of this page.
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub footnotes: SmallVec<[FootnoteSlice; 2]>,
}

impl PageDescriptor {
    /// Exclusive end offset.
    pub fn end(&self) -> i32 {
        self.start.saturating_add(self.height)
    }

    /// Whether `offset` falls inside this page.
    pub fn contains(&self, offset: i32) -> bool {
        offset >= self.start && offset < self.end()
    }

    /// Total height of attached footnote slices.
    pub fn footnotes_height(&self) -> i32 {
        self.footnotes
            .iter()
            .map(|f| f.height)
            .fold(0i32, i32::saturating_add)
    }
}

/// Rounding policy for offset-to-page lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PageRounding {
    /// Page containing the offset (round toward the page start).
    #[default]
    Down,
    /// Page whose start is closest to the offset.
    Nearest,
    /// First page starting at or after the offset.
    Up,
}

/// Ordered, gap-free sequence of pages covering the virtual axis.
///
/// Replaced wholesale on every re-layout; never mutated in place, so any
/// in-flight reader of the previous list stays consistent until the
/// replacement is published.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageList {
    pages: Vec<PageDescriptor>,
}

impl PageList {
    /// Empty list ("not yet loaded").
    pub fn empty() -> Self {
        Self::default()
    }

    /// List over already-ordered descriptors.
    pub fn from_pages(pages: Vec<PageDescriptor>) -> Self {
        Self { pages }
    }

    /// Number of pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the list has no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Descriptor at `index`.
    pub fn get(&self, index: usize) -> Option<&PageDescriptor> {
        self.pages.get(index)
    }

    /// All descriptors in order.
    pub fn pages(&self) -> &[PageDescriptor] {
        &self.pages
    }

    /// Exclusive end offset of the last page; 0 when empty.
    pub fn end_offset(&self) -> i32 {
        self.pages.last().map_or(0, PageDescriptor::end)
    }

    /// Index of the page for `offset` under the given rounding.
    ///
    /// Total for `offset >= 0`: offsets past the end resolve to the last
    /// page, negative offsets to the first. Returns `None` only when the
    /// list is empty.
    pub fn find_nearest_page(&self, offset: i32, rounding: PageRounding) -> Option<usize> {
        if self.pages.is_empty() {
            return None;
        }
        let last = self.pages.len() - 1;
        if offset <= 0 {
            return Some(0);
        }
        if offset >= self.end_offset() {
            return Some(last);
        }
        // Gap-free coverage makes partition_point exact.
        let containing = self
            .pages
            .partition_point(|page| page.end() <= offset)
            .min(last);
        match rounding {
            PageRounding::Down => Some(containing),
            PageRounding::Up => {
                let page = self.pages.get(containing)?;
                if page.start >= offset {
                    Some(containing)
                } else {
                    Some((containing + 1).min(last))
                }
            }
            PageRounding::Nearest => {
                let page = self.pages.get(containing)?;
                let from_start = offset.saturating_sub(page.start);
                let to_end = page.end().saturating_sub(offset);
                if to_end < from_start && containing < last {
                    Some(containing + 1)
                } else {
                    Some(containing)
                }
            }
        }
    }

    /// Verify the coverage invariant: consecutive pages tile the axis with
    /// no gaps, except a leading cover page which may be followed by content
    /// at exactly its reserved end.
    pub fn is_contiguous(&self) -> bool {
        self.pages
            .windows(2)
            .all(|w| w[0].end() == w[1].start)
    }
}

#[cfg(test)]
mod tests {
    use super::{PageDescriptor, PageKind, PageList, PageRounding};
    use smallvec::SmallVec;

    fn list_of(heights: &[i32]) -> PageList {
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

    #[test]
    fn empty_list_finds_nothing() {
        assert_eq!(
            PageList::empty().find_nearest_page(0, PageRounding::Down),
            None
        );
        assert_eq!(PageList::empty().end_offset(), 0);
    }

    #[test]
    fn find_down_returns_containing_page() {
        let list = list_of(&[100, 100, 50]);
        assert_eq!(list.find_nearest_page(0, PageRounding::Down), Some(0));
        assert_eq!(list.find_nearest_page(99, PageRounding::Down), Some(0));
        assert_eq!(list.find_nearest_page(100, PageRounding::Down), Some(1));
        assert_eq!(list.find_nearest_page(249, PageRounding::Down), Some(2));
    }

    #[test]
    fn lookup_degrades_gracefully_past_the_end() {
        let list = list_of(&[100, 100]);
        assert_eq!(list.find_nearest_page(5_000, PageRounding::Down), Some(1));
        assert_eq!(list.find_nearest_page(-3, PageRounding::Nearest), Some(0));
    }

    #[test]
    fn nearest_rounds_to_closer_boundary() {
        let list = list_of(&[100, 100]);
        assert_eq!(list.find_nearest_page(20, PageRounding::Nearest), Some(0));
        assert_eq!(list.find_nearest_page(90, PageRounding::Nearest), Some(1));
    }

    #[test]
    fn lookup_is_monotonic() {
        let list = list_of(&[80, 120, 60, 200]);
        let mut previous = 0usize;
        for offset in 0..list.end_offset() {
            let page = list
                .find_nearest_page(offset, PageRounding::Down)
                .expect("non-empty");
            assert!(page >= previous);
            previous = page;
        }
    }

    #[test]
    fn contiguity_holds_for_generated_lists() {
        let list = list_of(&[80, 120, 60]);
        assert!(list.is_contiguous());
    }
}

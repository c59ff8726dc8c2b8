//! Pagination core for `pageflow`: lazy layout invalidation, the viewing
//! session state machine, coordinate mapping, overlay ranges, and
//! address-level navigation.
//!
//! The session ([`DocView`]) is single-threaded and synchronous: every call
//! runs to completion, nothing suspends, and no internal locking exists.
//! Sharing a view across threads requires external synchronization.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod cache;
mod coords;
mod geom;
mod layout;
mod navigator;
mod page_list;
mod ranges;
mod scene;
mod view;

pub use cache::{
    compute_profile, FilePageListCacheStore, LayoutProfileId, PageListCacheStore, ProfileInputs,
};
pub use coords::{ViewGeometry, ViewMode};
pub use geom::{Margins, Point, Rect};
pub use layout::{
    BlockBounds, LayoutEngine, LayoutOptions, LayoutParams, LayoutResult, LineBox, SpanBox,
};
pub use navigator::update_outline_pages;
pub use page_list::{FootnoteSlice, PageDescriptor, PageKind, PageList, PageRounding};
pub use ranges::{links_in_range, OverlayKind, OverlayRect, PageLink, RangeOverlay, RangeSet};
pub use scene::{PagePaint, SceneOverlay, SceneRun, ViewScene};
pub use view::{DocView, MAX_VIEWPORT_PX, MIN_VIEWPORT_PX};

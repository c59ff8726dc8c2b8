//! Document model, logical addresses, and font contracts for the `pageflow`
//! reflowable rendering core.
//!
//! This crate holds everything the pagination core consumes from the
//! document side: the arena-backed tree importers populate, stable
//! [`PositionAddress`] values that survive re-layout, the outline, and the
//! font-provider capability. The pagination state machine lives in
//! `pageflow-paginate`; pixel output lives in `pageflow-pixbuf`.

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

pub mod address;
pub mod font;
pub mod outline;
pub mod tree;

pub use address::{AddressParseError, PositionAddress, PositionToken};
pub use font::{
    face_match_score, FontCache, FontFace, FontFamily, FontProvider, FontRequest, MetricFace,
    NoFontProvider, RegisteredFace,
};
pub use outline::{outline_count, outline_flat, OutlineItem};
pub use tree::{Document, DocumentBuilder, ElementKind, Node, NodeId, NodeKind};

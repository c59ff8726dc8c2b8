//! Persisted page-list cache.
//!
//! A page list is a pure function of the document revision and the layout
//! configuration, so it can be keyed by a stable profile id and reused
//! across sessions (progress display, page-number UI) without re-running
//! layout. The cache is strictly an accelerator: every read path tolerates
//! a miss, and decode mismatches degrade to `None` rather than erroring.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use pageflow::FontRequest;
use serde::{Deserialize, Serialize};

use crate::geom::Margins;
use crate::page_list::{PageDescriptor, PageList};

const CACHE_SCHEMA_VERSION: u32 = 1;

/// Stable id of one layout configuration against one document revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutProfileId(u32);

impl LayoutProfileId {
    /// Raw CRC value.
    pub fn value(self) -> u32 {
        self.0
    }

    /// Hex form used for file names and envelope tags.
    pub fn hex(self) -> String {
        format!("{:08x}", self.0)
    }
}

/// Everything that influences pagination output.
#[derive(Clone, Debug)]
pub struct ProfileInputs<'a> {
    pub doc_revision: u64,
    pub width: i32,
    pub height: i32,
    pub margins: Margins,
    pub columns: u32,
    pub interline_percent: u32,
    pub show_cover: bool,
    pub cover_reserve: i32,
    pub font: &'a FontRequest,
}

/// Deterministic profile id over the layout inputs.
pub fn compute_profile(inputs: &ProfileInputs<'_>) -> LayoutProfileId {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&inputs.doc_revision.to_le_bytes());
    hasher.update(&inputs.width.to_le_bytes());
    hasher.update(&inputs.height.to_le_bytes());
    hasher.update(&inputs.margins.left.to_le_bytes());
    hasher.update(&inputs.margins.top.to_le_bytes());
    hasher.update(&inputs.margins.right.to_le_bytes());
    hasher.update(&inputs.margins.bottom.to_le_bytes());
    hasher.update(&inputs.columns.to_le_bytes());
    hasher.update(&inputs.interline_percent.to_le_bytes());
    hasher.update(&[u8::from(inputs.show_cover)]);
    hasher.update(&inputs.cover_reserve.to_le_bytes());
    hasher.update(&inputs.font.size.to_le_bytes());
    hasher.update(&inputs.font.weight.to_le_bytes());
    hasher.update(&[u8::from(inputs.font.italic)]);
    for face in &inputs.font.faces {
        hasher.update(face.as_bytes());
        hasher.update(&[0]);
    }
    LayoutProfileId(hasher.finalize())
}

/// Storage for page lists keyed by layout profile.
pub trait PageListCacheStore {
    /// Load the page list for `profile`, `None` on miss or decode failure.
    fn load_pages(&self, profile: LayoutProfileId) -> Option<PageList>;

    /// Persist `pages` under `profile`; `false` when rejected or failed.
    fn store_pages(&self, profile: LayoutProfileId, pages: &PageList) -> bool;
}

#[derive(Serialize, Deserialize)]
struct PersistedPageListEnvelope {
    schema: u32,
    profile: String,
    pages: Vec<PageDescriptor>,
}

/// File-backed cache store: one JSON envelope per profile.
#[derive(Clone, Debug)]
pub struct FilePageListCacheStore {
    root: PathBuf,
    max_file_bytes: usize,
}

impl FilePageListCacheStore {
    /// Store rooted at `root`; the directory is created lazily on store.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_file_bytes: 1024 * 1024,
        }
    }

    /// Cap the size of any single cache file.
    pub fn with_max_file_bytes(mut self, max_file_bytes: usize) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    fn path_for(&self, profile: LayoutProfileId) -> PathBuf {
        self.root.join(format!("pages-{}.json", profile.hex()))
    }
}

impl PageListCacheStore for FilePageListCacheStore {
    fn load_pages(&self, profile: LayoutProfileId) -> Option<PageList> {
        let payload = fs::read(self.path_for(profile)).ok()?;
        let envelope: PersistedPageListEnvelope = serde_json::from_slice(&payload).ok()?;
        if envelope.schema != CACHE_SCHEMA_VERSION || envelope.profile != profile.hex() {
            log::debug!(
                "page cache mismatch for {} (schema {})",
                envelope.profile,
                envelope.schema
            );
            return None;
        }
        Some(PageList::from_pages(envelope.pages))
    }

    fn store_pages(&self, profile: LayoutProfileId, pages: &PageList) -> bool {
        let envelope = PersistedPageListEnvelope {
            schema: CACHE_SCHEMA_VERSION,
            profile: profile.hex(),
            pages: pages.pages().to_vec(),
        };
        let Ok(payload) = serde_json::to_vec(&envelope) else {
            return false;
        };
        if payload.len() > self.max_file_bytes {
            log::debug!(
                "page cache payload {} exceeds cap {}; skipping",
                payload.len(),
                self.max_file_bytes
            );
            return false;
        }
        if fs::create_dir_all(&self.root).is_err() {
            return false;
        }
        let Ok(mut file) = fs::File::create(self.path_for(profile)) else {
            return false;
        };
        file.write_all(&payload).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        compute_profile, FilePageListCacheStore, LayoutProfileId, PageListCacheStore,
        ProfileInputs,
    };
    use crate::geom::Margins;
    use crate::page_list::{PageDescriptor, PageKind, PageList};
    use pageflow::FontRequest;
    use smallvec::SmallVec;

    fn inputs(font: &FontRequest) -> ProfileInputs<'_> {
        ProfileInputs {
            doc_revision: 1,
            width: 400,
            height: 600,
            margins: Margins::uniform(10),
            columns: 1,
            interline_percent: 100,
            show_cover: false,
            cover_reserve: 0,
            font,
        }
    }

    fn sample_pages() -> PageList {
        PageList::from_pages(vec![
            PageDescriptor {
                start: 0,
                height: 500,
                kind: PageKind::Normal,
                footnotes: SmallVec::new(),
            },
            PageDescriptor {
                start: 500,
                height: 320,
                kind: PageKind::Normal,
                footnotes: SmallVec::new(),
            },
        ])
    }

    #[test]
    fn profile_changes_with_any_input() {
        let font = FontRequest::regular(16);
        let base = compute_profile(&inputs(&font));
        let mut changed = inputs(&font);
        changed.width = 401;
        assert_ne!(base, compute_profile(&changed));
        let bigger = FontRequest::regular(17);
        let mut font_changed = inputs(&bigger);
        font_changed.width = 400;
        assert_ne!(base, compute_profile(&font_changed));
        assert_eq!(base, compute_profile(&inputs(&font)));
    }

    #[test]
    fn store_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FilePageListCacheStore::new(dir.path());
        let font = FontRequest::regular(16);
        let profile = compute_profile(&inputs(&font));
        let pages = sample_pages();

        assert!(store.store_pages(profile, &pages));
        let loaded = store.load_pages(profile).expect("cache hit");
        assert_eq!(loaded, pages);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FilePageListCacheStore::new(dir.path()).with_max_file_bytes(16);
        let font = FontRequest::regular(16);
        let profile = compute_profile(&inputs(&font));
        assert!(!store.store_pages(profile, &sample_pages()));
        assert!(store.load_pages(profile).is_none());
    }

    #[test]
    fn unknown_profile_misses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FilePageListCacheStore::new(dir.path());
        assert!(store.load_pages(LayoutProfileId(0xdead_beef)).is_none());
    }
}

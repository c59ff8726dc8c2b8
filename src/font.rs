//! Font provider contract and the process-wide face cache.
//!
//! Layout and rendering receive a [`FontProvider`] capability explicitly;
//! nothing in the core reaches for a bare global. The one process-wide
//! object is [`FontCache`], kept global because rasterized faces genuinely
//! benefit from cross-document sharing, with an explicit `init`/`shutdown`
//! lifecycle instead of a static pointer.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Generic font family classes understood by face matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Serif,
    SansSerif,
    Monospace,
}

/// Request for a renderable face.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FontRequest {
    /// Nominal size in pixels.
    pub size: i32,
    /// Numeric weight (400 regular, 700 bold).
    pub weight: u16,
    /// Italic flag.
    pub italic: bool,
    /// Generic family class.
    pub family: FontFamily,
    /// Preferred face names, most preferred first.
    pub faces: Vec<String>,
}

impl FontRequest {
    /// Regular serif request at `size` with no face preference.
    pub fn regular(size: i32) -> Self {
        Self {
            size,
            weight: 400,
            italic: false,
            family: FontFamily::Serif,
            faces: Vec::with_capacity(0),
        }
    }
}

/// Renderable face handle.
///
/// Metrics must be deterministic for identical faces; the cache and the
/// layout byte-identity guarantee rely on it.
pub trait FontFace: Send + Sync {
    /// Face name.
    fn name(&self) -> &str;
    /// Line height in pixels (includes leading).
    fn height(&self) -> i32;
    /// Baseline distance from the line top, in pixels.
    fn ascent(&self) -> i32;
    /// Advance width of one char, in pixels.
    fn char_width(&self, ch: char) -> i32;
    /// Nominal size the face was instantiated at.
    fn size(&self) -> i32;

    /// Advance width of a string, in pixels.
    fn measure(&self, text: &str) -> i32 {
        text.chars()
            .map(|ch| self.char_width(ch))
            .fold(0i32, i32::saturating_add)
    }
}

/// Capability handed to the layout engine and page renderer.
pub trait FontProvider: Send + Sync {
    /// Resolve a request to a face, `None` when nothing renderable exists.
    ///
    /// Must be deterministic for identical requests; callers cache on it.
    fn get_font(&self, req: &FontRequest) -> Option<Arc<dyn FontFace>>;
}

/// Installed face descriptor registered with the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredFace {
    /// Face name as importers/configs reference it.
    pub name: String,
    /// Generic family class.
    pub family: FontFamily,
    /// Native weight.
    pub weight: u16,
    /// Whether the face is italic.
    pub italic: bool,
}

/// Deterministic metric-only face.
///
/// Stands in for a shaping/rasterizing backend: advances derive purely from
/// the nominal size, which keeps layout reproducible in tests and in the
/// degraded no-backend mode.
#[derive(Clone, Debug)]
pub struct MetricFace {
    name: String,
    size: i32,
}

impl MetricFace {
    /// Face named `name` instantiated at `size` pixels.
    pub fn new(name: &str, size: i32) -> Self {
        Self {
            name: String::from(name),
            size: size.max(1),
        }
    }
}

impl FontFace for MetricFace {
    fn name(&self) -> &str {
        &self.name
    }

    fn height(&self) -> i32 {
        // 1.2em nominal line box.
        (self.size * 6) / 5
    }

    fn ascent(&self) -> i32 {
        (self.height() * 4) / 5
    }

    fn char_width(&self, ch: char) -> i32 {
        if ch.is_whitespace() {
            (self.size / 3).max(1)
        } else if ch.is_ascii() {
            (self.size / 2).max(1)
        } else {
            self.size.max(1)
        }
    }

    fn size(&self) -> i32 {
        self.size
    }
}

/// Relative-order face match score; higher wins.
///
/// The tiers are deliberate: an explicitly requested face name dominates
/// everything, then family class, then italic agreement, then weight
/// distance. The exact constants are not meaningful beyond preserving that
/// ordering.
pub fn face_match_score(face: &RegisteredFace, req: &FontRequest) -> u32 {
    let mut score = 0u32;
    if let Some(position) = req.faces.iter().position(|name| *name == face.name) {
        score += 10_000u32.saturating_sub((position as u32).saturating_mul(100));
    }
    if face.family == req.family {
        score += 1_000;
    }
    if face.italic == req.italic {
        score += 300;
    }
    let weight_distance = (i32::from(face.weight) - i32::from(req.weight)).unsigned_abs() / 5;
    score += 200u32.saturating_sub(weight_distance.min(200));
    score
}

/// Process-wide face cache.
///
/// Matches requests against registered faces and memoizes instantiated
/// handles per `(face, size)`.
pub struct FontCache {
    faces: Vec<RegisteredFace>,
    instances: Mutex<HashMap<(usize, i32), Arc<dyn FontFace>>>,
}

impl fmt::Debug for FontCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontCache")
            .field("faces", &self.faces.len())
            .finish()
    }
}

static GLOBAL_FONT_CACHE: Mutex<Option<Arc<FontCache>>> = Mutex::new(None);

impl FontCache {
    /// Cache over an explicit face registry.
    pub fn new(faces: Vec<RegisteredFace>) -> Self {
        Self {
            faces,
            instances: Mutex::new(HashMap::with_capacity(8)),
        }
    }

    /// Install the process-wide instance. Replaces any previous one.
    pub fn init(faces: Vec<RegisteredFace>) -> Arc<FontCache> {
        let cache = Arc::new(Self::new(faces));
        if let Ok(mut slot) = GLOBAL_FONT_CACHE.lock() {
            if slot.is_some() {
                log::warn!("FontCache::init replacing an existing process-wide cache");
            }
            *slot = Some(Arc::clone(&cache));
        }
        cache
    }

    /// Drop the process-wide instance. Handles already resolved stay valid.
    pub fn shutdown() {
        if let Ok(mut slot) = GLOBAL_FONT_CACHE.lock() {
            *slot = None;
        }
    }

    /// Process-wide instance, if `init` has run.
    pub fn global() -> Option<Arc<FontCache>> {
        GLOBAL_FONT_CACHE.lock().ok().and_then(|slot| slot.clone())
    }

    /// Registered faces.
    pub fn faces(&self) -> &[RegisteredFace] {
        &self.faces
    }

    fn best_face_index(&self, req: &FontRequest) -> Option<usize> {
        self.faces
            .iter()
            .enumerate()
            .max_by_key(|(index, face)| {
                // Stable winner on ties: earlier registration wins.
                (face_match_score(face, req), usize::MAX - index)
            })
            .map(|(index, _)| index)
    }
}

impl FontProvider for FontCache {
    fn get_font(&self, req: &FontRequest) -> Option<Arc<dyn FontFace>> {
        if req.size <= 0 {
            return None;
        }
        let index = self.best_face_index(req)?;
        let key = (index, req.size);
        let mut instances = self.instances.lock().ok()?;
        if let Some(face) = instances.get(&key) {
            return Some(Arc::clone(face));
        }
        let registered = self.faces.get(index)?;
        let face: Arc<dyn FontFace> = Arc::new(MetricFace::new(&registered.name, req.size));
        instances.insert(key, Arc::clone(&face));
        Some(face)
    }
}

/// Provider that never resolves a face; exercises degraded-mode paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFontProvider;

impl FontProvider for NoFontProvider {
    fn get_font(&self, _req: &FontRequest) -> Option<Arc<dyn FontFace>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{
        face_match_score, FontCache, FontFamily, FontProvider, FontRequest, MetricFace,
        RegisteredFace,
    };
    use crate::font::FontFace;
    use std::sync::Arc;

    fn registry() -> Vec<RegisteredFace> {
        vec![
            RegisteredFace {
                name: String::from("Bookerly"),
                family: FontFamily::Serif,
                weight: 400,
                italic: false,
            },
            RegisteredFace {
                name: String::from("Bookerly Italic"),
                family: FontFamily::Serif,
                weight: 400,
                italic: true,
            },
            RegisteredFace {
                name: String::from("Inter"),
                family: FontFamily::SansSerif,
                weight: 400,
                italic: false,
            },
            RegisteredFace {
                name: String::from("Inter Bold"),
                family: FontFamily::SansSerif,
                weight: 700,
                italic: false,
            },
        ]
    }

    #[test]
    fn requested_face_name_dominates_family() {
        let faces = registry();
        let mut req = FontRequest::regular(16);
        req.family = FontFamily::Serif;
        req.faces = vec![String::from("Inter")];
        let serif = &faces[0];
        let named = &faces[2];
        assert!(face_match_score(named, &req) > face_match_score(serif, &req));
    }

    #[test]
    fn family_beats_weight_distance() {
        let faces = registry();
        let mut req = FontRequest::regular(16);
        req.family = FontFamily::SansSerif;
        req.weight = 700;
        // Exact-weight serif still loses to regular-weight sans.
        let sans_regular = &faces[2];
        let serif_regular = &faces[0];
        assert!(face_match_score(sans_regular, &req) > face_match_score(serif_regular, &req));
    }

    #[test]
    fn cache_returns_same_instance_for_same_request() {
        let cache = FontCache::new(registry());
        let req = FontRequest::regular(18);
        let a = cache.get_font(&req).expect("face");
        let b = cache.get_font(&req).expect("face");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.size(), 18);
    }

    #[test]
    fn zero_size_request_resolves_nothing() {
        let cache = FontCache::new(registry());
        assert!(cache.get_font(&FontRequest::regular(0)).is_none());
    }

    #[test]
    fn metric_face_is_deterministic() {
        let a = MetricFace::new("Test", 20);
        let b = MetricFace::new("Test", 20);
        assert_eq!(a.measure("hello world"), b.measure("hello world"));
        assert!(a.ascent() < a.height());
    }
}

//! Logical document addresses that survive re-layout.
//!
//! A [`PositionAddress`] is a `(node, intra-node offset)` pair. Because the
//! tree arena is appended in pre-order, the derived `Ord` over
//! `(NodeId, offset)` is document order. Addresses serialize to an
//! XPath-like structural path (`/body/section[@id=ch1]/p[2]/text()[1].12`)
//! that stays resolvable after the document is reloaded from the same
//! source; it never references page numbers, which are not stable across
//! font or margin changes.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::tree::{Document, ElementKind, NodeId, NodeKind};

/// Immutable logical position inside a document tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionAddress {
    node: NodeId,
    offset: u32,
}

impl PositionAddress {
    /// Null address; sorts after every real address.
    pub const NULL: PositionAddress = PositionAddress {
        node: NodeId::NULL,
        offset: 0,
    };

    /// Address of `node` at character `offset` (0 for elements).
    pub fn new(node: NodeId, offset: u32) -> Self {
        Self { node, offset }
    }

    /// Referenced node.
    pub fn node(self) -> NodeId {
        self.node
    }

    /// Character offset inside the node (0 for element nodes).
    pub fn offset(self) -> u32 {
        self.offset
    }

    /// Whether this is the null sentinel.
    pub fn is_null(self) -> bool {
        self.node.is_null()
    }

    /// Serialize to the structural path form.
    ///
    /// Returns `None` when the address is null or does not belong to `doc`.
    pub fn to_text(self, doc: &Document) -> Option<String> {
        if self.is_null() {
            return None;
        }
        doc.node(self.node)?;
        let mut segments = Vec::with_capacity(8);
        let mut cursor = Some(self.node);
        while let Some(id) = cursor {
            let node = doc.node(id)?;
            let segment = match node.kind() {
                NodeKind::Text(_) => format!("text()[{}]", doc.sibling_ordinal(id)),
                NodeKind::Element(ElementKind::Body) => String::from("body"),
                NodeKind::Element(kind) => match node.id_attr() {
                    Some(id_attr) => format!("{}[@id={}]", kind.path_name(), id_attr),
                    None => format!("{}[{}]", kind.path_name(), doc.sibling_ordinal(id)),
                },
            };
            segments.push(segment);
            cursor = node.parent();
        }
        segments.reverse();
        let mut out = String::with_capacity(64);
        for segment in &segments {
            out.push('/');
            out.push_str(segment);
        }
        out.push('.');
        out.push_str(&self.offset.to_string());
        Some(out)
    }
}

/// Error from parsing a textual address path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddressParseError {
    /// Path was empty or missing the leading `/body` segment.
    EmptyPath,
    /// A segment could not be parsed.
    BadSegment(String),
    /// The trailing `.offset` suffix was missing or non-numeric.
    BadOffset(String),
    /// A segment parsed but matched no node in the tree.
    Unresolved(String),
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "empty address path"),
            Self::BadSegment(seg) => write!(f, "malformed path segment: {}", seg),
            Self::BadOffset(tail) => write!(f, "malformed offset suffix: {}", tail),
            Self::Unresolved(seg) => write!(f, "path segment matched no node: {}", seg),
        }
    }
}

impl std::error::Error for AddressParseError {}

enum Segment<'a> {
    Text(usize),
    Named { name: &'a str, ordinal: usize },
    ById { name: &'a str, id_attr: &'a str },
}

fn parse_segment(raw: &str) -> Result<Segment<'_>, AddressParseError> {
    if let Some(rest) = raw.strip_prefix("text()[") {
        let inner = rest
            .strip_suffix(']')
            .ok_or_else(|| AddressParseError::BadSegment(raw.to_string()))?;
        let ordinal: usize = inner
            .parse()
            .map_err(|_| AddressParseError::BadSegment(raw.to_string()))?;
        return Ok(Segment::Text(ordinal.max(1)));
    }
    match raw.split_once('[') {
        None => Ok(Segment::Named {
            name: raw,
            ordinal: 1,
        }),
        Some((name, bracketed)) => {
            let inner = bracketed
                .strip_suffix(']')
                .ok_or_else(|| AddressParseError::BadSegment(raw.to_string()))?;
            if let Some(id_attr) = inner.strip_prefix("@id=") {
                Ok(Segment::ById { name, id_attr })
            } else {
                let ordinal: usize = inner
                    .parse()
                    .map_err(|_| AddressParseError::BadSegment(raw.to_string()))?;
                Ok(Segment::Named {
                    name,
                    ordinal: ordinal.max(1),
                })
            }
        }
    }
}

impl Document {
    /// Resolve a structural path produced by [`PositionAddress::to_text`].
    pub fn resolve_address_text(&self, path: &str) -> Result<PositionAddress, AddressParseError> {
        let (body, offset_tail) = path
            .rsplit_once('.')
            .ok_or_else(|| AddressParseError::BadOffset(path.to_string()))?;
        let offset: u32 = offset_tail
            .parse()
            .map_err(|_| AddressParseError::BadOffset(offset_tail.to_string()))?;

        let mut segments = body.split('/').filter(|s| !s.is_empty());
        match segments.next() {
            Some(root_seg) if root_seg == "body" || root_seg.starts_with("body[") => {}
            _ => return Err(AddressParseError::EmptyPath),
        }
        let mut current = self
            .root()
            .ok_or_else(|| AddressParseError::Unresolved(String::from("body")))?;

        for raw in segments {
            let segment = parse_segment(raw)?;
            let children: Vec<NodeId> = self
                .node(current)
                .map(|n| n.children().to_vec())
                .unwrap_or_default();
            let found = match segment {
                Segment::Text(ordinal) => children
                    .iter()
                    .filter(|&&c| self.node(c).and_then(|n| n.text()).is_some())
                    .nth(ordinal - 1)
                    .copied(),
                Segment::Named { name, ordinal } => children
                    .iter()
                    .filter(|&&c| {
                        self.node(c)
                            .and_then(|n| n.element())
                            .is_some_and(|k| k.path_name() == name)
                    })
                    .nth(ordinal - 1)
                    .copied(),
                Segment::ById { name, id_attr } => children
                    .iter()
                    .find(|&&c| {
                        self.node(c).is_some_and(|n| {
                            n.id_attr() == Some(id_attr)
                                && n.element().is_some_and(|k| k.path_name() == name)
                        })
                    })
                    .copied(),
            };
            current = found.ok_or_else(|| AddressParseError::Unresolved(raw.to_string()))?;
        }

        Ok(PositionAddress::new(current, offset))
    }
}

/// Persisted reading position.
///
/// The structural `path` is the primary key; the progress hints let callers
/// remap the position when the path no longer resolves (document edition
/// changed) or when a cheap approximate restore is acceptable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionToken {
    /// Structural address path, as produced by [`PositionAddress::to_text`].
    pub path: String,
    /// Progress through the paginated document in `[0.0, 1.0]`.
    pub global_progress: f32,
    /// Page index in the source pagination, for diagnostics only.
    pub page_index: u32,
    /// Page count in the source pagination, for diagnostics only.
    pub page_count: u32,
}

impl PositionToken {
    /// Normalized progress clamped into `[0.0, 1.0]`.
    pub fn normalized_progress(&self) -> f32 {
        if self.global_progress.is_finite() {
            self.global_progress.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AddressParseError, PositionAddress, PositionToken};
    use crate::tree::{Document, DocumentBuilder, ElementKind};

    fn sample_doc() -> Document {
        let mut b = DocumentBuilder::new();
        b.begin_with_id(ElementKind::Section, "ch1");
        b.begin(ElementKind::Title);
        b.text("One");
        b.end();
        b.begin(ElementKind::Paragraph);
        b.text("first paragraph");
        b.end();
        b.begin(ElementKind::Paragraph);
        b.text("second paragraph");
        b.end();
        b.end();
        b.finish()
    }

    #[test]
    fn address_round_trips_through_text_form() {
        let doc = sample_doc();
        let section = doc.find_by_id("ch1").expect("section");
        let second_p = doc.node(section).expect("node").children()[2];
        let text = doc.node(second_p).expect("node").children()[0];
        let addr = PositionAddress::new(text, 7);

        let path = addr.to_text(&doc).expect("serializable");
        assert_eq!(path, "/body/section[@id=ch1]/p[2]/text()[1].7");
        let resolved = doc.resolve_address_text(&path).expect("resolvable");
        assert_eq!(resolved, addr);
    }

    #[test]
    fn null_address_has_no_text_form() {
        let doc = sample_doc();
        assert!(PositionAddress::NULL.is_null());
        assert_eq!(PositionAddress::NULL.to_text(&doc), None);
    }

    #[test]
    fn addresses_order_by_document_order() {
        let doc = sample_doc();
        let section = doc.find_by_id("ch1").expect("section");
        let title = doc.node(section).expect("node").children()[0];
        let para = doc.node(section).expect("node").children()[1];
        assert!(PositionAddress::new(title, 0) < PositionAddress::new(para, 0));
        assert!(PositionAddress::new(para, 3) < PositionAddress::new(para, 9));
        assert!(PositionAddress::new(para, 0) < PositionAddress::NULL);
    }

    #[test]
    fn resolve_rejects_malformed_paths() {
        let doc = sample_doc();
        assert!(matches!(
            doc.resolve_address_text("/body/p[x].0"),
            Err(AddressParseError::BadSegment(_))
        ));
        assert!(matches!(
            doc.resolve_address_text("/body/section[@id=ch1]/p[2]/text()[1]"),
            Err(AddressParseError::BadOffset(_))
        ));
        assert!(matches!(
            doc.resolve_address_text("/body/section[@id=nope].0"),
            Err(AddressParseError::Unresolved(_))
        ));
    }

    #[test]
    fn token_normalizes_progress() {
        let token = PositionToken {
            path: String::from("/body.0"),
            global_progress: 1.7,
            page_index: 3,
            page_count: 10,
        };
        assert_eq!(token.normalized_progress(), 1.0);
    }
}

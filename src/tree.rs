//! Arena-backed document tree consumed by the pagination and rendering crates.
//!
//! The tree is produced once per document by an importer (out of scope here)
//! through [`DocumentBuilder`] and is never restructured afterwards; layout
//! passes may attach caches but do not mutate content. Nodes live in a flat
//! arena appended in pre-order, so arena index order IS document order and
//! [`NodeId`] comparisons double as document-order comparisons.

/// Stable index of a node inside a [`Document`] arena.
///
/// Ids stay valid for the lifetime of the tree; they are only invalidated in
/// meaning when the document is reparsed into a new tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Sentinel id used by null addresses.
    pub const NULL: NodeId = NodeId(u32::MAX);

    /// Arena index backing this id.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Whether this is the null sentinel.
    pub fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

/// Closed set of element kinds the layout core understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    /// Document root.
    Body,
    /// Chapter/section container; may carry a [`ElementKind::Title`] child.
    Section,
    /// Section heading.
    Title,
    /// Paragraph of body text.
    Paragraph,
    /// Footnote block, pulled out of the main flow and attached to pages.
    Footnote,
    /// Inline link anchor.
    Anchor {
        /// Link target in importer-defined form.
        href: String,
    },
    /// Cover image placeholder with intrinsic pixel dimensions.
    Cover {
        /// Intrinsic width in pixels.
        width: u32,
        /// Intrinsic height in pixels.
        height: u32,
    },
    /// Forced line break inside a block.
    LineBreak,
}

impl ElementKind {
    /// Stable segment name used by textual address paths.
    pub fn path_name(&self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Section => "section",
            Self::Title => "title",
            Self::Paragraph => "p",
            Self::Footnote => "footnote",
            Self::Anchor { .. } => "a",
            Self::Cover { .. } => "cover",
            Self::LineBreak => "br",
        }
    }

    /// Whether children of this element participate in the main text flow.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Self::Body | Self::Section | Self::Title | Self::Paragraph | Self::Footnote
        )
    }
}

/// Node payload: an element or a text run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementKind),
    Text(String),
}

/// One tree node.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) id_attr: Option<String>,
}

impl Node {
    /// Node payload.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Parent id, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Optional stable `id` attribute.
    pub fn id_attr(&self) -> Option<&str> {
        self.id_attr.as_deref()
    }

    /// Element kind, `None` for text nodes.
    pub fn element(&self) -> Option<&ElementKind> {
        match &self.kind {
            NodeKind::Element(kind) => Some(kind),
            NodeKind::Text(_) => None,
        }
    }

    /// Text content, `None` for element nodes.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(_) => None,
            NodeKind::Text(text) => Some(text),
        }
    }
}

/// Immutable parsed document.
///
/// Owned by the viewing session. The arena is append-only during build and
/// frozen afterwards; all downstream structures reference nodes by [`NodeId`].
#[derive(Clone, Debug, Default)]
pub struct Document {
    nodes: Vec<Node>,
    revision: u64,
}

impl Document {
    /// Document with no renderable root ("not yet loaded").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Root node id, `None` when nothing is loaded.
    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(NodeId::from_index(0))
        }
    }

    /// Whether the document has no renderable content.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Monotonic content revision; bumps whenever the tree is rebuilt.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Node lookup; `None` for the null sentinel or out-of-range ids.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if id.is_null() {
            return None;
        }
        self.nodes.get(id.index())
    }

    /// Text content of `id`, `None` for elements and invalid ids.
    pub fn text_of(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(Node::text)
    }

    /// Iterate ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.node(id).and_then(Node::parent),
        }
    }

    /// Whether `ancestor` is `id` itself or one of its ancestors.
    pub fn is_inside(&self, id: NodeId, ancestor: NodeId) -> bool {
        if id == ancestor {
            return true;
        }
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Nearest ancestor-or-self anchor element.
    pub fn enclosing_anchor(&self, id: NodeId) -> Option<NodeId> {
        core::iter::once(id).chain(self.ancestors(id)).find(|&n| {
            self.node(n)
                .is_some_and(|node| matches!(node.element(), Some(ElementKind::Anchor { .. })))
        })
    }

    /// Last text descendant of `id` with its char length, in document order.
    pub fn last_text_descendant(&self, id: NodeId) -> Option<(NodeId, u32)> {
        let node = self.node(id)?;
        if let Some(text) = node.text() {
            return Some((id, text.chars().count() as u32));
        }
        node.children
            .iter()
            .rev()
            .find_map(|&child| self.last_text_descendant(child))
    }

    /// First node with the given `id` attribute, in document order.
    pub fn find_by_id(&self, id_attr: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.id_attr.as_deref() == Some(id_attr))
            .map(NodeId::from_index)
    }

    /// Accumulate plain text under `id` in document order, capped at
    /// `max_chars`. Block boundaries contribute a single space.
    pub fn collect_text(&self, id: NodeId, max_chars: usize) -> String {
        let mut out = String::with_capacity(max_chars.min(256));
        let mut remaining = max_chars;
        self.collect_text_into(id, &mut remaining, &mut out);
        out
    }

    fn collect_text_into(&self, id: NodeId, remaining: &mut usize, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => {
                for ch in text.chars() {
                    if *remaining == 0 {
                        return;
                    }
                    out.push(ch);
                    *remaining -= 1;
                }
            }
            NodeKind::Element(kind) => {
                if kind.is_block() && !out.is_empty() && !out.ends_with(' ') && *remaining > 0 {
                    out.push(' ');
                    *remaining -= 1;
                }
                for &child in &node.children {
                    if *remaining == 0 {
                        return;
                    }
                    self.collect_text_into(child, remaining, out);
                }
            }
        }
    }

    /// 1-based position of `id` among same-path-name siblings.
    ///
    /// Used by textual address paths; text nodes count against other text
    /// node siblings.
    pub fn sibling_ordinal(&self, id: NodeId) -> usize {
        let Some(node) = self.node(id) else {
            return 1;
        };
        let Some(parent) = node.parent.and_then(|p| self.node(p)) else {
            return 1;
        };
        let mut ordinal = 0usize;
        for &sibling in &parent.children {
            let Some(sib) = self.node(sibling) else {
                continue;
            };
            let same = match (&sib.kind, &node.kind) {
                (NodeKind::Text(_), NodeKind::Text(_)) => true,
                (NodeKind::Element(a), NodeKind::Element(b)) => a.path_name() == b.path_name(),
                _ => false,
            };
            if same {
                ordinal += 1;
            }
            if sibling == id {
                break;
            }
        }
        ordinal.max(1)
    }
}

/// Ancestor iterator, nearest first.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).and_then(Node::parent);
        Some(current)
    }
}

/// Incremental pre-order builder used by importer collaborators and tests.
///
/// `begin`/`end` calls bracket element nodes; `text` appends a text leaf to
/// the currently open element. `end` never pops the root, and `finish`
/// implicitly closes any still-open elements.
#[derive(Debug)]
pub struct DocumentBuilder {
    nodes: Vec<Node>,
    stack: Vec<NodeId>,
    revision: u64,
}

impl DocumentBuilder {
    /// Start a document with an implicit `Body` root.
    pub fn new() -> Self {
        Self::with_revision(1)
    }

    /// Start a document carrying an explicit content revision.
    pub fn with_revision(revision: u64) -> Self {
        let root = Node {
            kind: NodeKind::Element(ElementKind::Body),
            parent: None,
            children: Vec::with_capacity(4),
            id_attr: None,
        };
        Self {
            nodes: vec![root],
            stack: vec![NodeId::from_index(0)],
            revision,
        }
    }

    fn push_node(&mut self, kind: NodeKind, id_attr: Option<String>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        let parent = *self.stack.last().unwrap_or(&NodeId::from_index(0));
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::with_capacity(0),
            id_attr,
        });
        if let Some(parent_node) = self.nodes.get_mut(parent.index()) {
            parent_node.children.push(id);
        }
        id
    }

    /// Open an element; subsequent nodes nest inside it until `end`.
    pub fn begin(&mut self, kind: ElementKind) -> NodeId {
        let id = self.push_node(NodeKind::Element(kind), None);
        self.stack.push(id);
        id
    }

    /// Open an element carrying a stable `id` attribute.
    pub fn begin_with_id(&mut self, kind: ElementKind, id_attr: &str) -> NodeId {
        let id = self.push_node(NodeKind::Element(kind), Some(String::from(id_attr)));
        self.stack.push(id);
        id
    }

    /// Append a self-closing element (anchors with no children, breaks, covers).
    pub fn leaf(&mut self, kind: ElementKind) -> NodeId {
        self.push_node(NodeKind::Element(kind), None)
    }

    /// Append a text leaf to the open element.
    pub fn text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(String::from(text)), None)
    }

    /// Close the most recently opened element. The root stays open.
    pub fn end(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        } else {
            log::warn!("DocumentBuilder::end called with no open element; ignoring");
        }
    }

    /// Freeze the arena into an immutable [`Document`].
    pub fn finish(self) -> Document {
        Document {
            nodes: self.nodes,
            revision: self.revision,
        }
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

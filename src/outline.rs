//! Document outline (table of contents).
//!
//! Built once at load time from the section structure; `resolved_page` is a
//! derived field the pagination layer refreshes after every re-layout that
//! moves page boundaries.

use crate::address::PositionAddress;
use crate::tree::{Document, ElementKind, NodeId};

/// One outline entry.
#[derive(Clone, Debug, PartialEq)]
pub struct OutlineItem {
    /// Display title.
    pub title: String,
    /// Logical target; survives re-pagination.
    pub target: PositionAddress,
    /// Page the target currently resolves to; −1 while unresolved.
    pub resolved_page: i32,
    /// Nested entries.
    pub children: Vec<OutlineItem>,
}

impl OutlineItem {
    /// Unresolved entry for `target` titled `title`.
    pub fn new(title: String, target: PositionAddress) -> Self {
        Self {
            title,
            target,
            resolved_page: -1,
            children: Vec::with_capacity(0),
        }
    }
}

/// Total number of entries including nested ones.
pub fn outline_count(items: &[OutlineItem]) -> usize {
    items
        .iter()
        .map(|item| 1 + outline_count(&item.children))
        .sum()
}

/// Flatten into `(depth, item)` pairs in reading order.
pub fn outline_flat(items: &[OutlineItem]) -> Vec<(usize, &OutlineItem)> {
    let mut out = Vec::with_capacity(8);
    flatten_into(items, 0, &mut out);
    out
}

fn flatten_into<'a>(
    items: &'a [OutlineItem],
    depth: usize,
    out: &mut Vec<(usize, &'a OutlineItem)>,
) {
    for item in items {
        out.push((depth, item));
        flatten_into(&item.children, depth + 1, out);
    }
}

impl Document {
    /// Build the outline from the section/title structure.
    ///
    /// Every `Section` with a `Title` child contributes one entry targeting
    /// the section element; nested sections nest in the outline.
    pub fn build_outline(&self) -> Vec<OutlineItem> {
        match self.root() {
            Some(root) => self.outline_children(root),
            None => Vec::with_capacity(0),
        }
    }

    fn outline_children(&self, parent: NodeId) -> Vec<OutlineItem> {
        let Some(node) = self.node(parent) else {
            return Vec::with_capacity(0);
        };
        let mut out = Vec::with_capacity(4);
        for &child in node.children() {
            let Some(child_node) = self.node(child) else {
                continue;
            };
            match child_node.element() {
                Some(ElementKind::Section) => {
                    if let Some(title) = self.section_title(child) {
                        let mut item =
                            OutlineItem::new(title, PositionAddress::new(child, 0));
                        item.children = self.outline_children(child);
                        out.push(item);
                    } else {
                        // Untitled sections still surface nested titled ones.
                        out.extend(self.outline_children(child));
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Title text of a `Section` node, if it carries a non-empty `Title`.
    pub fn section_title(&self, section: NodeId) -> Option<String> {
        let node = self.node(section)?;
        for &child in node.children() {
            let Some(child_node) = self.node(child) else {
                continue;
            };
            if matches!(child_node.element(), Some(ElementKind::Title)) {
                let title = self.collect_text(child, 256);
                let trimmed = title.trim();
                if !trimmed.is_empty() {
                    return Some(String::from(trimmed));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{outline_count, outline_flat};
    use crate::tree::{DocumentBuilder, ElementKind};

    #[test]
    fn outline_nests_titled_sections() {
        let mut b = DocumentBuilder::new();
        b.begin(ElementKind::Section);
        b.begin(ElementKind::Title);
        b.text("Part I");
        b.end();
        b.begin(ElementKind::Section);
        b.begin(ElementKind::Title);
        b.text("Chapter 1");
        b.end();
        b.end();
        b.end();
        b.begin(ElementKind::Section);
        b.begin(ElementKind::Title);
        b.text("Part II");
        b.end();
        b.end();
        let doc = b.finish();

        let outline = doc.build_outline();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].title, "Part I");
        assert_eq!(outline[0].children.len(), 1);
        assert_eq!(outline[0].children[0].title, "Chapter 1");
        assert_eq!(outline_count(&outline), 3);

        let flat = outline_flat(&outline);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[1].0, 1);
        assert!(flat.iter().all(|(_, item)| item.resolved_page == -1));
    }

    #[test]
    fn untitled_sections_lift_nested_entries() {
        let mut b = DocumentBuilder::new();
        b.begin(ElementKind::Section);
        b.begin(ElementKind::Section);
        b.begin(ElementKind::Title);
        b.text("Inner");
        b.end();
        b.end();
        b.end();
        let doc = b.finish();

        let outline = doc.build_outline();
        assert_eq!(outline.len(), 1);
        assert_eq!(outline[0].title, "Inner");
    }

    #[test]
    fn empty_document_builds_empty_outline() {
        let doc = crate::tree::Document::empty();
        assert!(doc.build_outline().is_empty());
    }
}

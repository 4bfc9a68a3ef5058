//! Document tree built from the markdown event stream.
//!
//! The tree is owned by a single render call. Transforms mutate it in place
//! and the HTML serializer consumes it at the end.

use std::rc::Rc;

use pulldown_cmark::{Alignment, BlockQuoteKind};

use crate::toc::TocTree;

/// A node of the document tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Node kind with kind-specific attributes.
    pub kind: NodeKind,
    /// Ordered child nodes.
    pub children: Vec<Node>,
}

/// Kind tag of a [`Node`].
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Document,
    Paragraph,
    /// Heading with level 1-6 and the anchor id assigned by the builder.
    Heading {
        level: u8,
        id: Option<String>,
    },
    /// Block quote, or a GitHub-style alert when the kind is set.
    BlockQuote(Option<BlockQuoteKind>),
    /// Code block with its info string. Content lives in `literal`, never in children.
    CodeBlock {
        info: Option<String>,
        literal: String,
    },
    /// Container for raw HTML block lines.
    HtmlBlock,
    /// Raw HTML fragment (block line or inline tag).
    Html(String),
    List {
        start: Option<u64>,
    },
    Item,
    TaskListMarker(bool),
    Table(Vec<Alignment>),
    TableHead,
    TableRow,
    TableCell,
    FootnoteDefinition(String),
    FootnoteReference(String),
    DefinitionList,
    DefinitionListTitle,
    DefinitionListDefinition,
    Emphasis,
    Strong,
    Strikethrough,
    Superscript,
    Subscript,
    Link {
        dest: String,
        title: String,
    },
    /// Image; children hold the alt text.
    Image {
        dest: String,
        title: String,
    },
    Text(String),
    /// Inline code span.
    Code(String),
    SoftBreak,
    HardBreak,
    Rule,
    /// Front matter block. Kept in the tree, never rendered.
    Metadata,
    /// A recognized `{{ keyword args }}` shortcode.
    Extension(ExtensionNode),
}

/// Custom node produced by a shortcode recognizer.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtensionNode {
    /// Shortcode keyword, e.g. `toc`.
    pub keyword: String,
    /// Arguments following the keyword.
    pub args: Vec<String>,
    /// Payload attached by a transform for use at render time.
    pub data: Option<ExtensionData>,
}

impl ExtensionNode {
    /// Create a node without attached data.
    pub fn new(keyword: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            keyword: keyword.into(),
            args,
            data: None,
        }
    }
}

/// Per-keyword payload attached to an [`ExtensionNode`].
#[derive(Clone, Debug, PartialEq)]
pub enum ExtensionData {
    /// Heading tree shared by every `toc` node of the document.
    Toc(Rc<TocTree>),
}

/// Walk control returned by visitor callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkStatus {
    /// Visit children, then continue with siblings.
    Continue,
    /// Do not descend into this node's children.
    SkipChildren,
    /// Abort the whole walk.
    Stop,
}

impl Node {
    /// Create a leaf node.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    /// Create a node with children.
    pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self {
        Self { kind, children }
    }

    /// Create a text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Text(text.into()))
    }

    /// Pre-order walk over this node and its descendants.
    ///
    /// Returns [`WalkStatus::Stop`] if the visitor aborted the walk.
    /// Uses an explicit stack so deeply nested input cannot overflow.
    pub fn walk<'a, F>(&'a self, mut visit: F) -> WalkStatus
    where
        F: FnMut(&'a Node) -> WalkStatus,
    {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match visit(node) {
                WalkStatus::Stop => return WalkStatus::Stop,
                WalkStatus::SkipChildren => {}
                WalkStatus::Continue => stack.extend(node.children.iter().rev()),
            }
        }
        WalkStatus::Continue
    }

    /// Pre-order walk with mutable access and a fallible visitor.
    ///
    /// The visitor sees a node before its children, so it may replace the
    /// children it is about to descend into.
    pub fn walk_mut<F, E>(&mut self, mut visit: F) -> Result<WalkStatus, E>
    where
        F: FnMut(&mut Node) -> Result<WalkStatus, E>,
    {
        let mut stack: Vec<&mut Node> = vec![self];
        while let Some(node) = stack.pop() {
            match visit(node)? {
                WalkStatus::Stop => return Ok(WalkStatus::Stop),
                WalkStatus::SkipChildren => {}
                WalkStatus::Continue => stack.extend(node.children.iter_mut().rev()),
            }
        }
        Ok(WalkStatus::Continue)
    }
}

impl Drop for Node {
    // Flattens the subtree onto a heap stack. Recursive drop glue would use
    // one frame per nesting level and overflow on input such as `>>>>...`.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Node {
        Node::with_children(
            NodeKind::Document,
            vec![
                Node::with_children(
                    NodeKind::Heading { level: 1, id: None },
                    vec![Node::text("a")],
                ),
                Node::with_children(NodeKind::Paragraph, vec![Node::text("b")]),
                Node::with_children(NodeKind::Paragraph, vec![Node::text("c")]),
            ],
        )
    }

    fn texts(node: &Node) -> Vec<String> {
        let mut seen = Vec::new();
        node.walk(|n| {
            if let NodeKind::Text(t) = &n.kind {
                seen.push(t.clone());
            }
            WalkStatus::Continue
        });
        seen
    }

    #[test]
    fn test_walk_is_pre_order() {
        assert_eq!(texts(&sample()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_walk_skip_children() {
        let doc = sample();
        let mut seen = Vec::new();
        doc.walk(|n| {
            if let NodeKind::Text(t) = &n.kind {
                seen.push(t.as_str());
            }
            if matches!(n.kind, NodeKind::Heading { .. }) {
                WalkStatus::SkipChildren
            } else {
                WalkStatus::Continue
            }
        });
        assert_eq!(seen, vec!["b", "c"]);
    }

    #[test]
    fn test_walk_stop() {
        let doc = sample();
        let mut visited = 0;
        let status = doc.walk(|n| {
            visited += 1;
            if n.kind == NodeKind::Paragraph {
                WalkStatus::Stop
            } else {
                WalkStatus::Continue
            }
        });
        assert_eq!(status, WalkStatus::Stop);
        // document, heading, "a", paragraph
        assert_eq!(visited, 4);
    }

    #[test]
    fn test_walk_mut_rewrites_text() {
        let mut doc = sample();
        let status = doc
            .walk_mut(|n| {
                if let NodeKind::Text(t) = &mut n.kind {
                    t.make_ascii_uppercase();
                }
                Ok::<_, ()>(WalkStatus::Continue)
            })
            .unwrap();
        assert_eq!(status, WalkStatus::Continue);
        assert_eq!(texts(&doc), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_walk_mut_propagates_error() {
        let mut doc = sample();
        let result = doc.walk_mut(|n| match n.kind {
            NodeKind::Paragraph => Err("boom"),
            _ => Ok(WalkStatus::Continue),
        });
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn test_walk_deeply_nested() {
        let mut node = Node::text("leaf");
        for _ in 0..100_000 {
            node = Node::with_children(NodeKind::BlockQuote(None), vec![node]);
        }
        assert_eq!(texts(&node), vec!["leaf"]);
        drop(node);
    }

    #[test]
    fn test_drop_wide_and_deep() {
        let mut node = Node::text("leaf");
        for depth in 0..50_000 {
            let siblings = (0..depth % 3).map(|_| Node::text("x"));
            let mut children: Vec<Node> = siblings.collect();
            children.push(node);
            node = Node::with_children(NodeKind::Item, children);
        }
        let doc = Node::with_children(NodeKind::Document, vec![node, Node::text("tail")]);
        assert_eq!(texts(&doc).last().map(String::as_str), Some("tail"));
    }
}

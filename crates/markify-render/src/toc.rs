//! `{{ toc }}` shortcode: a nested list of the document's headings.
//!
//! The heading tree is built by an AST pass once per document and shared
//! by every `toc` node. `{{ toc 2 3 }}` limits the list to levels 2-3.

use std::fmt::Write;
use std::rc::Rc;

use crate::ast::{ExtensionData, ExtensionNode, Node, NodeKind, WalkStatus};
use crate::context::RenderContext;
use crate::error::RenderError;
use crate::registry::{AstTransformer, Extension, ExtensionRenderer, RegistryBuilder};
use crate::shortcode::ShortcodeParser;
use crate::state::escape_html;
use crate::util::extract_text;

/// Shortcode keyword.
pub const TOC_KEYWORD: &str = "toc";

const PARSER_PRIORITY: i32 = 200;
const TRANSFORM_PRIORITY: i32 = 10;
const DEFAULT_RANGE: (i32, i32) = (1, 6);

/// Node of the heading tree.
///
/// The root has level 0. Every other node sits at depth equal to its level;
/// skipped levels are filled with untitled placeholder nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TocTree {
    /// Anchor id of the heading, if one was assigned.
    pub heading_id: Option<String>,
    /// Flattened heading text. Empty for the root and placeholders.
    pub title: String,
    pub level: u8,
    pub children: Vec<TocTree>,
}

impl TocTree {
    /// Node for a heading.
    pub fn heading(level: u8, title: impl Into<String>, heading_id: Option<String>) -> Self {
        Self {
            heading_id,
            title: title.into(),
            level,
            children: Vec::new(),
        }
    }

    fn placeholder(level: u8) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    fn in_range(&self, low: i32, high: i32) -> bool {
        let level = i32::from(self.level);
        self.level > 0 && low <= level && level <= high
    }

    /// Render as HTML restricted to heading levels `low..=high`.
    ///
    /// Out-of-range nodes produce no markup of their own, but their
    /// in-range descendants are still listed.
    pub fn write_html(&self, low: i32, high: i32, out: &mut String) {
        if self.level == 0 {
            out.push_str(r#"<nav class="toc-block">"#);
            if !self.children.is_empty() {
                out.push_str("<ul>");
                for child in &self.children {
                    child.write_html(low, high, out);
                }
                out.push_str("</ul>");
            }
            out.push_str("</nav>");
            return;
        }

        let in_range = self.in_range(low, high);
        if in_range {
            out.push_str("<li>");
            self.write_label(out);
        }

        let wrap = in_range && !self.children.is_empty() && i32::from(self.level) < high;
        if wrap {
            out.push_str("<ul>");
        }
        for child in &self.children {
            child.write_html(low, high, out);
        }
        if wrap {
            out.push_str("</ul>");
        }

        if in_range {
            out.push_str("</li>");
        }
    }

    fn write_label(&self, out: &mut String) {
        if self.title.is_empty() {
            return;
        }
        let title = escape_html(&self.title);
        match &self.heading_id {
            Some(id) => {
                let _ = write!(out, r##"<a href="#{}">{title}</a>"##, escape_html(id));
            }
            None => {
                let _ = write!(out, "<span>{title}</span>");
            }
        }
    }
}

/// Incremental builder keeping the current insertion point.
pub struct TocBuilder {
    root: TocTree,
    /// Child indices from the root to the insertion point.
    cursor: Vec<usize>,
}

impl Default for TocBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TocBuilder {
    pub fn new() -> Self {
        Self {
            root: TocTree::placeholder(0),
            cursor: Vec::new(),
        }
    }

    fn point_mut(&mut self) -> &mut TocTree {
        let mut node = &mut self.root;
        for &index in &self.cursor {
            node = &mut node.children[index];
        }
        node
    }

    /// Insert the next heading in document order.
    ///
    /// A heading shallower than the insertion point moves up to the matching
    /// ancestor. A heading that skips levels gets placeholder parents. A
    /// level the root cannot hold is appended to the root as is.
    pub fn push(&mut self, entry: TocTree) {
        loop {
            let point = self.point_mut();
            let expected = point.level + 1;

            if entry.level < expected {
                if self.cursor.pop().is_none() {
                    self.root.children.push(entry);
                    return;
                }
                continue;
            }

            if entry.level == expected {
                point.children.push(entry);
                let index = point.children.len() - 1;
                self.cursor.push(index);
                return;
            }

            // Descend into a placeholder and retry.
            point.children.push(TocTree::placeholder(expected));
            let index = point.children.len() - 1;
            self.cursor.push(index);
        }
    }

    pub fn finish(self) -> TocTree {
        self.root
    }
}

/// Build the heading tree of a document.
pub fn build_toc(document: &Node) -> TocTree {
    let mut builder = TocBuilder::new();
    document.walk(|node| match &node.kind {
        NodeKind::Heading { level, id } => {
            builder.push(TocTree::heading(*level, extract_text(node), id.clone()));
            WalkStatus::SkipChildren
        }
        _ => WalkStatus::Continue,
    });
    builder.finish()
}

/// Parse the optional `low high` arguments, falling back to levels 1-6.
fn level_range(args: &[String]) -> (i32, i32) {
    match args {
        [low, high, ..] => match (low.parse(), high.parse()) {
            (Ok(low), Ok(high)) => (low, high),
            _ => DEFAULT_RANGE,
        },
        _ => DEFAULT_RANGE,
    }
}

/// The `toc` extension: parser, tree-building transform and renderer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableOfContents;

impl TableOfContents {
    /// Heading tree built for the current render, if any.
    pub(crate) fn tree(ctx: &RenderContext) -> Option<&Rc<TocTree>> {
        ctx.get::<Rc<TocTree>>()
    }
}

impl AstTransformer for TableOfContents {
    fn name(&self) -> &'static str {
        TOC_KEYWORD
    }

    fn transform(&self, document: &mut Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
        if !ctx.shortcodes_enabled() {
            return Ok(());
        }

        let tree = Rc::new(build_toc(document));
        ctx.insert(Rc::clone(&tree));

        if ctx.extension_node_count(TOC_KEYWORD) == 0 {
            return Ok(());
        }

        let mut attached = 0usize;
        document.walk_mut(|node| {
            if let NodeKind::Extension(ext) = &mut node.kind
                && ext.keyword == TOC_KEYWORD
            {
                ext.data = Some(ExtensionData::Toc(Rc::clone(&tree)));
                attached += 1;
            }
            Ok::<_, RenderError>(WalkStatus::Continue)
        })?;
        tracing::trace!(nodes = attached, "Attached table of contents");

        Ok(())
    }
}

impl ExtensionRenderer for TableOfContents {
    fn render(&self, node: &ExtensionNode, ctx: &RenderContext, out: &mut String) {
        // Nodes from parsers outside this crate are not counted by the
        // transform, so they carry no data and read the tree from the context.
        let tree = match &node.data {
            Some(ExtensionData::Toc(tree)) => tree,
            None => match Self::tree(ctx) {
                Some(tree) => tree,
                None => return,
            },
        };
        let (low, high) = level_range(&node.args);
        tree.write_html(low, high, out);
    }
}

impl Extension for TableOfContents {
    fn register(self, builder: RegistryBuilder) -> RegistryBuilder {
        builder
            .with_inline_parser(ShortcodeParser::new(TOC_KEYWORD), PARSER_PRIORITY)
            .with_transformer(self, TRANSFORM_PRIORITY)
            .with_renderer(TOC_KEYWORD, self)
    }
}

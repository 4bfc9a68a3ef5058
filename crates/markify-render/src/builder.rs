//! Builds the document tree from the pulldown-cmark event stream.
//!
//! Inline parsers run here, on every text run outside code, so shortcodes
//! become [`NodeKind::Extension`] nodes before any transform sees the tree.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag};

use crate::ast::{Node, NodeKind};
use crate::context::RenderContext;
use crate::registry::InlineParser;
use crate::state::HeadingIds;
use crate::util::{extract_text, heading_level_to_num};

/// Event sink producing a [`Node`] tree.
pub(crate) struct TreeBuilder<'r> {
    parsers: &'r [Box<dyn InlineParser>],
    triggers: Vec<char>,
    /// Open nodes; the document sits at the bottom.
    stack: Vec<Node>,
    heading_ids: HeadingIds,
}

impl<'r> TreeBuilder<'r> {
    /// Create a builder trying `parsers` in slice order.
    pub fn new(parsers: &'r [Box<dyn InlineParser>]) -> Self {
        let mut triggers: Vec<char> = parsers.iter().map(|p| p.trigger()).collect();
        triggers.sort_unstable();
        triggers.dedup();

        Self {
            parsers,
            triggers,
            stack: vec![Node::new(NodeKind::Document)],
            heading_ids: HeadingIds::default(),
        }
    }

    /// Consume `events` and return the finished document.
    pub fn build<'a, I>(mut self, events: I, ctx: &mut RenderContext) -> Node
    where
        I: Iterator<Item = Event<'a>>,
    {
        for event in events {
            self.process_event(event, ctx);
        }
        while self.stack.len() > 1 {
            self.close();
        }
        self.stack
            .pop()
            .unwrap_or_else(|| Node::new(NodeKind::Document))
    }

    fn process_event(&mut self, event: Event<'_>, ctx: &mut RenderContext) {
        match event {
            Event::Start(tag) => self.stack.push(Node::new(Self::kind_of(tag))),
            Event::End(_) => self.close(),
            Event::Text(text) => self.text(&text, ctx),
            Event::Code(code) => self.append(Node::new(NodeKind::Code(code.into_string()))),
            Event::Html(html) | Event::InlineHtml(html) => {
                self.append(Node::new(NodeKind::Html(html.into_string())));
            }
            Event::FootnoteReference(label) => {
                self.append(Node::new(NodeKind::FootnoteReference(label.into_string())));
            }
            Event::SoftBreak => self.append(Node::new(NodeKind::SoftBreak)),
            Event::HardBreak => self.append(Node::new(NodeKind::HardBreak)),
            Event::Rule => self.append(Node::new(NodeKind::Rule)),
            Event::TaskListMarker(checked) => self.append(Node::new(NodeKind::TaskListMarker(checked))),
            Event::InlineMath(_) | Event::DisplayMath(_) => {
                // Math is not enabled in parser options
            }
        }
    }

    fn kind_of(tag: Tag<'_>) -> NodeKind {
        match tag {
            Tag::Paragraph => NodeKind::Paragraph,
            Tag::Heading { level, id, .. } => NodeKind::Heading {
                level: heading_level_to_num(level),
                id: id.map(CowStr::into_string),
            },
            Tag::BlockQuote(kind) => NodeKind::BlockQuote(kind),
            Tag::CodeBlock(kind) => NodeKind::CodeBlock {
                info: match kind {
                    CodeBlockKind::Fenced(info) if !info.trim().is_empty() => {
                        Some(info.into_string())
                    }
                    _ => None,
                },
                literal: String::new(),
            },
            Tag::HtmlBlock => NodeKind::HtmlBlock,
            Tag::List(start) => NodeKind::List { start },
            Tag::Item => NodeKind::Item,
            Tag::FootnoteDefinition(label) => NodeKind::FootnoteDefinition(label.into_string()),
            Tag::DefinitionList => NodeKind::DefinitionList,
            Tag::DefinitionListTitle => NodeKind::DefinitionListTitle,
            Tag::DefinitionListDefinition => NodeKind::DefinitionListDefinition,
            Tag::Table(alignments) => NodeKind::Table(alignments),
            Tag::TableHead => NodeKind::TableHead,
            Tag::TableRow => NodeKind::TableRow,
            Tag::TableCell => NodeKind::TableCell,
            Tag::Emphasis => NodeKind::Emphasis,
            Tag::Strong => NodeKind::Strong,
            Tag::Strikethrough => NodeKind::Strikethrough,
            Tag::Superscript => NodeKind::Superscript,
            Tag::Subscript => NodeKind::Subscript,
            Tag::Link {
                dest_url, title, ..
            } => NodeKind::Link {
                dest: dest_url.into_string(),
                title: title.into_string(),
            },
            Tag::Image {
                dest_url, title, ..
            } => NodeKind::Image {
                dest: dest_url.into_string(),
                title: title.into_string(),
            },
            Tag::MetadataBlock(_) => NodeKind::Metadata,
        }
    }

    /// Pop the innermost open node into its parent.
    fn close(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(mut node) = self.stack.pop() else {
            return;
        };
        if let NodeKind::Heading { id, .. } = &node.kind {
            let text = extract_text(&node);
            let assigned = self.heading_ids.assign(id.as_deref(), &text);
            if let NodeKind::Heading { id, .. } = &mut node.kind {
                *id = Some(assigned);
            }
        }
        self.append(node);
    }

    fn append(&mut self, node: Node) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        }
    }

    fn text(&mut self, text: &str, ctx: &mut RenderContext) {
        match self.stack.last_mut().map(|node| &mut node.kind) {
            Some(NodeKind::CodeBlock { literal, .. }) => literal.push_str(text),
            Some(NodeKind::Metadata) => self.append(Node::text(text)),
            _ => {
                let nodes = self.scan_inline(text, ctx);
                if let Some(parent) = self.stack.last_mut() {
                    parent.children.extend(nodes);
                }
            }
        }
    }

    /// Split a text run into text and extension nodes.
    fn scan_inline(&self, text: &str, ctx: &mut RenderContext) -> Vec<Node> {
        let mut nodes = Vec::new();
        // Start of text not yet emitted.
        let mut flushed = 0;
        let mut pos = 0;
        // End of the line holding the current trigger, found once per line.
        let mut line_end = 0;

        while let Some(offset) = text[pos..].find(|c: char| self.triggers.contains(&c)) {
            let start = pos + offset;
            if start >= line_end {
                line_end = text[start..].find('\n').map_or(text.len(), |i| start + i);
            }
            let line = &text[start..line_end];
            let trigger = line.chars().next().unwrap_or_default();

            let parsed = self
                .parsers
                .iter()
                .filter(|parser| parser.trigger() == trigger)
                .find_map(|parser| parser.parse(line, ctx))
                .filter(|(_, consumed)| *consumed > 0 && line.is_char_boundary(*consumed));

            match parsed {
                Some((extension, consumed)) => {
                    if start > flushed {
                        nodes.push(Node::text(&text[flushed..start]));
                    }
                    tracing::trace!(keyword = %extension.keyword, "Recognized shortcode");
                    nodes.push(Node::new(NodeKind::Extension(extension)));
                    pos = start + consumed;
                    flushed = pos;
                }
                None => pos = start + trigger.len_utf8(),
            }
        }

        if flushed < text.len() {
            nodes.push(Node::text(&text[flushed..]));
        }
        nodes
    }
}

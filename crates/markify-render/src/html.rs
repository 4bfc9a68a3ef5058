//! HTML serialization of the document tree.
//!
//! Produces compact HTML5 without inter-block newlines. Shortcode nodes are
//! handed to the renderer registered for their keyword.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::LazyLock;

use pulldown_cmark::BlockQuoteKind;
use regex::Regex;

use crate::ast::{ExtensionNode, Node, NodeKind};
use crate::context::RenderContext;
use crate::registry::ExtensionRegistry;
use crate::state::{TableCursor, escape_html, push_escaped};
use crate::util::extract_text;

/// Placeholder written instead of raw HTML when raw HTML is disallowed.
pub const RAW_HTML_OMITTED: &str = "<!-- raw HTML omitted -->";

static DANGEROUS_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(javascript|vbscript|file|data):").unwrap());
static SAFE_DATA_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*data:image/(png|gif|jpeg|webp);").unwrap());

/// Whether a link or image URL may run script or read local files.
fn is_dangerous_url(url: &str) -> bool {
    DANGEROUS_URL_RE.is_match(url) && !SAFE_DATA_URL_RE.is_match(url)
}

fn alert_label(kind: BlockQuoteKind) -> (&'static str, &'static str) {
    match kind {
        BlockQuoteKind::Note => ("note", "Note"),
        BlockQuoteKind::Tip => ("tip", "Tip"),
        BlockQuoteKind::Important => ("important", "Important"),
        BlockQuoteKind::Warning => ("warning", "Warning"),
        BlockQuoteKind::Caution => ("caution", "Caution"),
    }
}

enum Step<'n> {
    Enter(&'n Node),
    Exit(&'n Node),
}

struct HtmlWriter<'a> {
    registry: &'a ExtensionRegistry,
    ctx: &'a RenderContext,
    raw_html: bool,
    out: String,
    table: TableCursor,
    /// Footnote label to display number, in order of first appearance.
    footnotes: HashMap<String, usize>,
}

/// Serialize `document` to HTML.
///
/// Raw HTML and script-capable URLs are replaced unless `raw_html` is set.
pub(crate) fn render_html(
    document: &Node,
    registry: &ExtensionRegistry,
    ctx: &RenderContext,
    raw_html: bool,
) -> String {
    let mut writer = HtmlWriter {
        registry,
        ctx,
        raw_html,
        out: String::with_capacity(4096),
        table: TableCursor::default(),
        footnotes: HashMap::new(),
    };

    let mut stack = vec![Step::Enter(document)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(node) => {
                if writer.enter(node) {
                    stack.push(Step::Exit(node));
                    stack.extend(node.children.iter().rev().map(Step::Enter));
                }
            }
            Step::Exit(node) => writer.exit(node),
        }
    }
    writer.out
}

impl HtmlWriter<'_> {
    fn footnote_number(&mut self, label: &str) -> usize {
        let next = self.footnotes.len() + 1;
        *self.footnotes.entry(label.to_owned()).or_insert(next)
    }

    fn url<'u>(&self, url: &'u str) -> &'u str {
        if !self.raw_html && is_dangerous_url(url) {
            ""
        } else {
            url
        }
    }

    fn title_attr(title: &str) -> String {
        if title.is_empty() {
            String::new()
        } else {
            format!(r#" title="{}""#, escape_html(title))
        }
    }

    fn code_block(&mut self, info: Option<&str>, literal: &str) {
        let lang = info.and_then(|info| info.split_whitespace().next());
        match lang {
            Some(lang) => {
                let _ = write!(
                    self.out,
                    r#"<pre><code class="language-{}">{}</code></pre>"#,
                    escape_html(lang),
                    escape_html(literal)
                );
            }
            None => {
                let _ = write!(self.out, "<pre><code>{}</code></pre>", escape_html(literal));
            }
        }
    }

    fn extension(&mut self, node: &ExtensionNode) {
        match self.registry.renderer(&node.keyword) {
            Some(renderer) => renderer.render(node, self.ctx, &mut self.out),
            None => tracing::debug!(keyword = %node.keyword, "No renderer for extension node"),
        }
    }

    /// Write the opening markup. Returns whether children should be visited.
    fn enter(&mut self, node: &Node) -> bool {
        match &node.kind {
            NodeKind::Document => {}
            NodeKind::Paragraph => self.out.push_str("<p>"),
            NodeKind::Heading { level, id } => {
                let _ = match id {
                    Some(id) => write!(self.out, r#"<h{level} id="{}">"#, escape_html(id)),
                    None => write!(self.out, "<h{level}>"),
                };
            }
            NodeKind::BlockQuote(None) => self.out.push_str("<blockquote>"),
            NodeKind::BlockQuote(Some(kind)) => {
                let (class, title) = alert_label(*kind);
                let _ = write!(
                    self.out,
                    r#"<div class="alert alert-{class}"><p class="alert-title">{title}</p>"#
                );
            }
            NodeKind::CodeBlock { info, literal } => {
                self.code_block(info.as_deref(), literal);
                return false;
            }
            NodeKind::HtmlBlock => {
                if !self.raw_html {
                    self.out.push_str(RAW_HTML_OMITTED);
                    return false;
                }
            }
            NodeKind::Html(html) => {
                self.out
                    .push_str(if self.raw_html { html.as_str() } else { RAW_HTML_OMITTED });
                return false;
            }
            NodeKind::List { start } => {
                let _ = match start {
                    Some(1) => write!(self.out, "<ol>"),
                    Some(n) => write!(self.out, r#"<ol start="{n}">"#),
                    None => write!(self.out, "<ul>"),
                };
            }
            NodeKind::Item => self.out.push_str("<li>"),
            NodeKind::TaskListMarker(checked) => {
                self.out.push_str(if *checked {
                    r#"<input type="checkbox" checked disabled> "#
                } else {
                    r#"<input type="checkbox" disabled> "#
                });
                return false;
            }
            NodeKind::Table(alignments) => {
                self.table.enter_table(alignments);
                self.out.push_str("<table>");
            }
            NodeKind::TableHead => {
                self.table.enter_head();
                self.out.push_str("<thead><tr>");
            }
            NodeKind::TableRow => {
                self.table.enter_row();
                self.out.push_str("<tr>");
            }
            NodeKind::TableCell => self.table.open_cell(&mut self.out),
            NodeKind::FootnoteDefinition(label) => {
                let number = self.footnote_number(label);
                let _ = write!(
                    self.out,
                    r#"<div class="footnote-definition" id="fn-{}"><sup class="footnote-definition-label">{number}</sup>"#,
                    escape_html(label)
                );
            }
            NodeKind::FootnoteReference(label) => {
                let number = self.footnote_number(label);
                let label = escape_html(label);
                let _ = write!(
                    self.out,
                    r##"<sup class="footnote-reference"><a href="#fn-{label}" id="fnref-{label}">{number}</a></sup>"##
                );
                return false;
            }
            NodeKind::DefinitionList => self.out.push_str("<dl>"),
            NodeKind::DefinitionListTitle => self.out.push_str("<dt>"),
            NodeKind::DefinitionListDefinition => self.out.push_str("<dd>"),
            NodeKind::Emphasis => self.out.push_str("<em>"),
            NodeKind::Strong => self.out.push_str("<strong>"),
            NodeKind::Strikethrough => self.out.push_str("<s>"),
            NodeKind::Superscript => self.out.push_str("<sup>"),
            NodeKind::Subscript => self.out.push_str("<sub>"),
            NodeKind::Link { dest, title } => {
                let _ = write!(
                    self.out,
                    r#"<a href="{}"{}>"#,
                    escape_html(self.url(dest)),
                    Self::title_attr(title)
                );
            }
            NodeKind::Image { dest, title } => {
                let _ = write!(
                    self.out,
                    r#"<img src="{}" alt="{}"{}>"#,
                    escape_html(self.url(dest)),
                    escape_html(&extract_text(node)),
                    Self::title_attr(title)
                );
                return false;
            }
            NodeKind::Text(text) => {
                push_escaped(&mut self.out, text);
                return false;
            }
            NodeKind::Code(code) => {
                let _ = write!(self.out, "<code>{}</code>", escape_html(code));
                return false;
            }
            NodeKind::SoftBreak => {
                self.out.push('\n');
                return false;
            }
            NodeKind::HardBreak => {
                self.out.push_str("<br>");
                return false;
            }
            NodeKind::Rule => {
                self.out.push_str("<hr>");
                return false;
            }
            NodeKind::Metadata => return false,
            NodeKind::Extension(extension) => {
                self.extension(extension);
                return false;
            }
        }
        true
    }

    fn exit(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Paragraph => self.out.push_str("</p>"),
            NodeKind::Heading { level, .. } => {
                let _ = write!(self.out, "</h{level}>");
            }
            NodeKind::BlockQuote(None) => self.out.push_str("</blockquote>"),
            NodeKind::BlockQuote(Some(_)) | NodeKind::FootnoteDefinition(_) => {
                self.out.push_str("</div>");
            }
            NodeKind::List { start } => {
                self.out
                    .push_str(if start.is_some() { "</ol>" } else { "</ul>" });
            }
            NodeKind::Item => self.out.push_str("</li>"),
            NodeKind::Table(_) => self.out.push_str("</tbody></table>"),
            NodeKind::TableHead => {
                self.out.push_str("</tr></thead><tbody>");
                self.table.leave_head();
            }
            NodeKind::TableRow => self.out.push_str("</tr>"),
            NodeKind::TableCell => self.table.close_cell(&mut self.out),
            NodeKind::DefinitionList => self.out.push_str("</dl>"),
            NodeKind::DefinitionListTitle => self.out.push_str("</dt>"),
            NodeKind::DefinitionListDefinition => self.out.push_str("</dd>"),
            NodeKind::Emphasis => self.out.push_str("</em>"),
            NodeKind::Strong => self.out.push_str("</strong>"),
            NodeKind::Strikethrough => self.out.push_str("</s>"),
            NodeKind::Superscript => self.out.push_str("</sup>"),
            NodeKind::Subscript => self.out.push_str("</sub>"),
            NodeKind::Link { .. } => self.out.push_str("</a>"),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::registry::{ExtensionRenderer, InlineParser};
    use pretty_assertions::assert_eq;
    use pulldown_cmark::{Options, Parser};

    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_GFM
    }

    fn render_with(markdown: &str, raw_html: bool) -> String {
        let parsers: Vec<Box<dyn InlineParser>> = Vec::new();
        let mut ctx = RenderContext::new(None, true);
        let doc = TreeBuilder::new(&parsers).build(Parser::new_ext(markdown, options()), &mut ctx);
        let registry = ExtensionRegistry::builder().build().unwrap();
        render_html(&doc, &registry, &ctx, raw_html)
    }

    fn render(markdown: &str) -> String {
        render_with(markdown, false)
    }

    #[test]
    fn test_paragraph_and_emphasis() {
        assert_eq!(render("Hello *world*"), "<p>Hello <em>world</em></p>");
    }

    #[test]
    fn test_heading_with_id() {
        assert_eq!(render("## Hello World"), r#"<h2 id="hello-world">Hello World</h2>"#);
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(render("a &amp; \\<b\\>"), "<p>a &amp; &lt;b&gt;</p>");
    }

    #[test]
    fn test_code_block_with_language() {
        assert_eq!(
            render("```rust title=x\nlet a = 1 < 2;\n```"),
            r#"<pre><code class="language-rust">let a = 1 &lt; 2;
</code></pre>"#
        );
    }

    #[test]
    fn test_code_block_without_language() {
        assert!(render("    plain").starts_with("<pre><code>plain"));
    }

    #[test]
    fn test_alert() {
        assert_eq!(
            render("> [!NOTE]\n> Hello"),
            r#"<div class="alert alert-note"><p class="alert-title">Note</p><p>Hello</p></div>"#
        );
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(render("> quoted"), "<blockquote><p>quoted</p></blockquote>");
    }

    #[test]
    fn test_lists() {
        assert_eq!(render("- a\n- b"), "<ul><li>a</li><li>b</li></ul>");
        assert_eq!(render("1. a\n2. b"), "<ol><li>a</li><li>b</li></ol>");
        assert_eq!(render("3. a"), r#"<ol start="3"><li>a</li></ol>"#);
    }

    #[test]
    fn test_task_list() {
        let html = render("- [x] done\n- [ ] todo");
        assert!(html.contains(r#"<input type="checkbox" checked disabled>"#));
        assert!(html.contains(r#"<input type="checkbox" disabled>"#));
    }

    #[test]
    fn test_table_alignment() {
        assert_eq!(
            render("| a | b |\n|:--|--:|\n| 1 | 2 |"),
            concat!(
                "<table><thead><tr>",
                r#"<th style="text-align:left">a</th><th style="text-align:right">b</th>"#,
                "</tr></thead><tbody><tr>",
                r#"<td style="text-align:left">1</td><td style="text-align:right">2</td>"#,
                "</tr></tbody></table>"
            )
        );
    }

    #[test]
    fn test_strikethrough() {
        assert_eq!(render("~~gone~~"), "<p><s>gone</s></p>");
    }

    #[test]
    fn test_raw_html_omitted_by_default() {
        let html = render("<div>x</div>\n\nok <b>bold</b>");
        assert!(!html.contains("<div>"));
        assert!(!html.contains("<b>"));
        assert!(html.starts_with(RAW_HTML_OMITTED));
        assert!(html.contains("<p>ok <!-- raw HTML omitted -->bold<!-- raw HTML omitted --></p>"));
    }

    #[test]
    fn test_raw_html_allowed() {
        let html = render_with("<div>x</div>\n\nok <b>bold</b>", true);
        assert!(html.contains("<div>x</div>"));
        assert!(html.contains("<p>ok <b>bold</b></p>"));
    }

    #[test]
    fn test_dangerous_link_neutralized() {
        assert_eq!(render("[x](javascript:alert(1))"), r#"<p><a href="">x</a></p>"#);
        assert_eq!(
            render_with("[x](javascript:alert(1))", true),
            r#"<p><a href="javascript:alert(1)">x</a></p>"#
        );
    }

    #[test]
    fn test_dangerous_url_detection() {
        assert!(is_dangerous_url("JavaScript:alert(1)"));
        assert!(is_dangerous_url("vbscript:x"));
        assert!(is_dangerous_url("file:///etc/passwd"));
        assert!(is_dangerous_url("data:text/html;base64,AAAA"));
        assert!(!is_dangerous_url("data:image/png;base64,AAAA"));
        assert!(!is_dangerous_url("https://example.com/a.png"));
        assert!(!is_dangerous_url("static/x.png"));
    }

    #[test]
    fn test_link_with_title() {
        assert_eq!(
            render(r#"[x](http://a.com "T")"#),
            r#"<p><a href="http://a.com" title="T">x</a></p>"#
        );
    }

    #[test]
    fn test_image() {
        assert_eq!(
            render(r#"![a *b*](i.png "t")"#),
            r#"<p><img src="i.png" alt="a b" title="t"></p>"#
        );
    }

    #[test]
    fn test_footnotes() {
        let html = render("Text[^n].\n\n[^n]: Note.");
        assert!(html.contains(
            r##"<sup class="footnote-reference"><a href="#fn-n" id="fnref-n">1</a></sup>"##
        ));
        assert!(html.contains(
            r#"<div class="footnote-definition" id="fn-n"><sup class="footnote-definition-label">1</sup><p>Note.</p></div>"#
        ));
    }

    #[test]
    fn test_breaks_and_rule() {
        assert_eq!(render("a\nb"), "<p>a\nb</p>");
        assert_eq!(render("a  \nb"), "<p>a<br>b</p>");
        assert_eq!(render("***"), "<hr>");
    }

    struct Shout;

    impl ExtensionRenderer for Shout {
        fn render(&self, node: &ExtensionNode, _ctx: &RenderContext, out: &mut String) {
            out.push_str(&node.args.join(" ").to_uppercase());
        }
    }

    #[test]
    fn test_extension_dispatch() {
        let doc = Node::with_children(
            NodeKind::Document,
            vec![Node::with_children(
                NodeKind::Paragraph,
                vec![
                    Node::new(NodeKind::Extension(ExtensionNode::new(
                        "shout",
                        vec!["hi".to_owned(), "there".to_owned()],
                    ))),
                    Node::new(NodeKind::Extension(ExtensionNode::new("unknown", vec![]))),
                ],
            )],
        );
        let registry = ExtensionRegistry::builder()
            .with_renderer("shout", Shout)
            .build()
            .unwrap();
        let ctx = RenderContext::new(None, true);
        assert_eq!(render_html(&doc, &registry, &ctx, false), "<p>HI THERE</p>");
    }

    #[test]
    fn test_deep_nesting() {
        let html = render(&">".repeat(2_000));
        assert!(html.starts_with("<blockquote><blockquote>"));
        assert!(html.ends_with("</blockquote></blockquote>"));
    }
}

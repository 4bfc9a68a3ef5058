//! Recognizer for `{{ keyword arg1 arg2 }}` shortcodes.

use crate::ast::ExtensionNode;
use crate::context::RenderContext;
use crate::registry::InlineParser;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Offset of the `}}` closing a shortcode body.
///
/// The search stops at the first line break or nested `{{`, so the next
/// opening brace starts its own candidate and every byte is scanned once
/// per run of a long line.
fn close_position(body: &str) -> Option<usize> {
    let mut from = 0;
    loop {
        let i = from + body[from..].find(['{', '}', '\n'])?;
        let tail = &body[i..];
        if tail.starts_with(CLOSE) {
            return Some(i);
        }
        if tail.starts_with(OPEN) || tail.starts_with('\n') {
            return None;
        }
        from = i + 1;
    }
}

/// Inline parser matching a single shortcode keyword.
///
/// A shortcode must fit on one line. Arguments are the space-separated
/// tokens after the keyword; repeated spaces are ignored.
#[derive(Clone, Debug)]
pub struct ShortcodeParser {
    keyword: String,
    min_args: usize,
}

impl ShortcodeParser {
    /// Create a parser for `keyword` accepting any number of arguments.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            min_args: 0,
        }
    }

    /// Require at least `min_args` arguments; shorter shortcodes stay literal text.
    #[must_use]
    pub fn with_min_args(mut self, min_args: usize) -> Self {
        self.min_args = min_args;
        self
    }
}

impl InlineParser for ShortcodeParser {
    fn keyword(&self) -> &str {
        &self.keyword
    }

    fn trigger(&self) -> char {
        '{'
    }

    fn parse(&self, line: &str, ctx: &mut RenderContext) -> Option<(ExtensionNode, usize)> {
        let rest = line.strip_prefix(OPEN)?;
        let end = close_position(rest)?;
        let body = rest[..end].trim();

        let mut tokens = body.split(' ').filter(|token| !token.is_empty());
        if tokens.next()? != self.keyword {
            return None;
        }
        let args: Vec<String> = tokens.map(str::to_owned).collect();

        ctx.record_shortcode(&self.keyword);
        if !ctx.shortcodes_enabled() {
            tracing::trace!(keyword = %self.keyword, "Shortcodes disabled, keeping literal text");
            return None;
        }
        if args.len() < self.min_args {
            tracing::debug!(
                keyword = %self.keyword,
                args = args.len(),
                min_args = self.min_args,
                "Shortcode has too few arguments"
            );
            return None;
        }

        ctx.record_extension_node(&self.keyword);
        Some((
            ExtensionNode::new(&*self.keyword, args),
            OPEN.len() + end + CLOSE.len(),
        ))
    }
}

//! Text helpers shared by transforms and renderers.

use std::sync::LazyLock;

use pulldown_cmark::HeadingLevel;
use regex::Regex;

use crate::ast::{Node, NodeKind, WalkStatus};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Maximum length of a page title, in characters, before the ellipsis.
pub const TITLE_MAX_CHARS: usize = 120;

/// Flatten the text of a subtree.
///
/// Collects text and inline code leaves in document order, with a space for
/// every soft break and a newline for every hard break. Extension nodes
/// contribute nothing. Collection stops at the first empty text leaf.
pub fn extract_text(node: &Node) -> String {
    let mut out = String::new();
    node.walk(|n| match &n.kind {
        NodeKind::Text(text) | NodeKind::Code(text) => {
            if text.is_empty() {
                return WalkStatus::Stop;
            }
            out.push_str(text);
            WalkStatus::Continue
        }
        NodeKind::SoftBreak => {
            out.push(' ');
            WalkStatus::Continue
        }
        NodeKind::HardBreak => {
            out.push('\n');
            WalkStatus::Continue
        }
        NodeKind::Extension(_) => WalkStatus::SkipChildren,
        _ => WalkStatus::Continue,
    });
    out
}

/// Shorten text for use as a page title.
///
/// Whitespace runs collapse to a single space. Text longer than `max_chars`
/// is cut and gets a trailing `…`. When the cut lands inside a word the cut
/// moves back to the previous space, unless that would drop more than a
/// fifth of the budget.
pub fn truncate_title(text: &str, max_chars: usize) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text.trim(), " ");
    let chars: Vec<char> = collapsed.chars().collect();
    if chars.len() <= max_chars {
        return collapsed.into_owned();
    }

    let mut cut = &chars[..max_chars];
    if chars[max_chars] != ' '
        && let Some(last_space) = cut.iter().rposition(|&c| c == ' ')
        && max_chars - last_space <= max_chars / 5
    {
        cut = &cut[..last_space];
    }

    let mut title: String = cut.iter().collect();
    title.push('…');
    title
}

/// Convert heading level enum to number (1-6).
#[must_use]
pub(crate) fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paragraph(children: Vec<Node>) -> Node {
        Node::with_children(NodeKind::Paragraph, children)
    }

    #[test]
    fn test_extract_text_breaks() {
        let node = paragraph(vec![
            Node::text("one"),
            Node::new(NodeKind::SoftBreak),
            Node::text("two"),
            Node::new(NodeKind::HardBreak),
            Node::new(NodeKind::Code("three".to_owned())),
        ]);
        assert_eq!(extract_text(&node), "one two\nthree");
    }

    #[test]
    fn test_extract_text_nested_inline() {
        let node = paragraph(vec![
            Node::text("a "),
            Node::with_children(NodeKind::Strong, vec![Node::text("bold")]),
            Node::text(" b"),
        ]);
        assert_eq!(extract_text(&node), "a bold b");
    }

    #[test]
    fn test_extract_text_stops_at_empty_leaf() {
        let node = paragraph(vec![Node::text("kept"), Node::text(""), Node::text("lost")]);
        assert_eq!(extract_text(&node), "kept");
    }

    #[test]
    fn test_extract_text_skips_extensions() {
        let node = paragraph(vec![
            Node::text("before "),
            Node::new(NodeKind::Extension(crate::ExtensionNode::new("toc", vec![]))),
            Node::text("after"),
        ]);
        assert_eq!(extract_text(&node), "before after");
    }

    #[test]
    fn test_truncate_title_short_text_unchanged() {
        assert_eq!(truncate_title("  short   title \n", 120), "short title");
    }

    #[test]
    fn test_truncate_title_cuts_at_space() {
        // Cut point falls inside "delta"; the last space is within the last fifth.
        assert_eq!(truncate_title("alpha beta gamma delta", 19), "alpha beta gamma…");
    }

    #[test]
    fn test_truncate_title_hard_cut_for_long_word() {
        assert_eq!(truncate_title("ab cdefghijklmnop", 10), "ab cdefghi…");
    }

    #[test]
    fn test_truncate_title_cut_on_space_boundary() {
        assert_eq!(truncate_title("abcd efgh", 4), "abcd…");
    }

    #[test]
    fn test_truncate_title_long_heading() {
        let word = "lorem ipsum dolor sit amet ";
        let text = word.repeat(12);
        let title = truncate_title(&text, TITLE_MAX_CHARS);
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
        let body = title.trim_end_matches('…');
        assert!(text.starts_with(body));
        // Cut at a word boundary.
        assert!(text[body.len()..].starts_with(' '));
    }

    #[test]
    fn test_truncate_title_counts_characters() {
        let text = "é".repeat(130);
        let title = truncate_title(&text, TITLE_MAX_CHARS);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
    }
}

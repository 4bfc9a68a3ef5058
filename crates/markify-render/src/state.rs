//! Small pieces of state shared by the tree builder and the HTML serializer.

use std::collections::HashMap;
use std::fmt::Write;

use pulldown_cmark::Alignment;

/// Position inside the table being serialized.
///
/// Header cells become `<th>`, body cells `<td>`, each with the inline
/// `text-align` style of its column.
#[derive(Default)]
pub(crate) struct TableCursor {
    alignments: Vec<Alignment>,
    in_head: bool,
    column: usize,
}

impl TableCursor {
    /// Enter a table, forgetting the previous one.
    pub fn enter_table(&mut self, alignments: &[Alignment]) {
        self.alignments.clear();
        self.alignments.extend_from_slice(alignments);
        self.in_head = false;
        self.column = 0;
    }

    pub fn enter_head(&mut self) {
        self.in_head = true;
        self.column = 0;
    }

    pub fn leave_head(&mut self) {
        self.in_head = false;
    }

    pub fn enter_row(&mut self) {
        self.column = 0;
    }

    /// Write the opening tag of the cell in the current column.
    pub fn open_cell(&self, out: &mut String) {
        let _ = write!(out, "<{}{}>", self.cell_tag(), self.alignment_style());
    }

    /// Write the closing tag and move to the next column.
    pub fn close_cell(&mut self, out: &mut String) {
        let _ = write!(out, "</{}>", self.cell_tag());
        self.column += 1;
    }

    fn cell_tag(&self) -> &'static str {
        if self.in_head { "th" } else { "td" }
    }

    fn alignment_style(&self) -> &'static str {
        match self.alignments.get(self.column) {
            Some(Alignment::Left) => r#" style="text-align:left""#,
            Some(Alignment::Center) => r#" style="text-align:center""#,
            Some(Alignment::Right) => r#" style="text-align:right""#,
            Some(Alignment::None) | None => "",
        }
    }
}

/// Assigns unique anchor ids to headings of one document.
#[derive(Default)]
pub(crate) struct HeadingIds {
    counts: HashMap<String, usize>,
}

impl HeadingIds {
    /// Id used when a heading slugifies to nothing.
    const FALLBACK: &'static str = "heading";

    /// Resolve the id for a heading.
    ///
    /// An explicit `{#id}` attribute is kept verbatim. Otherwise the id is the
    /// slug of the heading text, suffixed with `-1`, `-2`, ... on repeats.
    pub fn assign(&mut self, explicit: Option<&str>, text: &str) -> String {
        if let Some(id) = explicit {
            *self.counts.entry(id.to_owned()).or_default() += 1;
            return id.to_owned();
        }

        let mut base_id = slugify(text);
        if base_id.is_empty() {
            Self::FALLBACK.clone_into(&mut base_id);
        }
        let count = self.counts.entry(base_id.clone()).or_default();
        let id = match *count {
            0 => base_id,
            n => format!("{base_id}-{n}"),
        };
        *count += 1;
        id
    }
}

/// Convert text to URL-safe slug.
///
/// ASCII letters and digits are kept lowercased. Runs of whitespace, `-`
/// and `_` between them become one dash; anything else is dropped.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut separated = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if separated && !slug.is_empty() {
                slug.push('-');
            }
            separated = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            separated = true;
        }
    }
    slug
}

/// Escape HTML special characters.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    push_escaped(&mut out, s);
    out
}

/// Append `s` to `out`, escaped. Unescaped stretches are copied in one piece.
pub(crate) fn push_escaped(out: &mut String, s: &str) {
    let mut copied = 0;
    for (i, byte) in s.bytes().enumerate() {
        let entity = match byte {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            b'\'' => "&#x27;",
            _ => continue,
        };
        out.push_str(&s[copied..i]);
        out.push_str(entity);
        copied = i + 1;
    }
    out.push_str(&s[copied..]);
}

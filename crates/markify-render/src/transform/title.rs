//! Page title and preview extraction.

use crate::ast::{Node, NodeKind, WalkStatus};
use crate::context::{PagePreviewText, RenderContext};
use crate::error::RenderError;
use crate::registry::{AstTransformer, Extension, RegistryBuilder};
use crate::util::extract_text;

const PRIORITY: i32 = 500;

/// Nodes visited before the search gives up.
const MAX_VISITED_NODES: usize = 2000;

/// Finds the first heading and the first paragraph of a document.
///
/// The title is the flattened text of the first heading, the preview the
/// flattened text of the first paragraph. Either may be empty. Running the
/// pass again on a context that already holds a preview does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct TitleExtractor;

/// Title and preview of `document`, visiting at most `limit` nodes.
fn find_preview(document: &Node, limit: usize) -> PagePreviewText {
    let mut found = PagePreviewText::default();
    let mut visited = 0usize;

    document.walk(|node| {
        visited += 1;
        if visited > limit {
            return WalkStatus::Stop;
        }

        let status = match node.kind {
            NodeKind::Heading { .. } => {
                if found.title.is_empty() {
                    found.title = extract_text(node);
                }
                WalkStatus::SkipChildren
            }
            NodeKind::Paragraph => {
                if found.preview.is_empty() {
                    found.preview = extract_text(node);
                }
                WalkStatus::SkipChildren
            }
            _ => WalkStatus::Continue,
        };

        if found.title.is_empty() || found.preview.is_empty() {
            status
        } else {
            WalkStatus::Stop
        }
    });

    found
}

impl AstTransformer for TitleExtractor {
    fn name(&self) -> &'static str {
        "title"
    }

    fn transform(&self, document: &mut Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
        if ctx.preview().is_some() {
            return Ok(());
        }
        let preview = find_preview(document, MAX_VISITED_NODES);
        tracing::trace!(title = %preview.title, "Extracted page title");
        ctx.set_preview(preview);
        Ok(())
    }
}

impl Extension for TitleExtractor {
    fn register(self, builder: RegistryBuilder) -> RegistryBuilder {
        builder.with_transformer(self, PRIORITY)
    }
}

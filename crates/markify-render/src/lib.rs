//! Extensible markdown to HTML rendering.
//!
//! A render runs in three phases over one document tree:
//!
//! 1. **Parse**: pulldown-cmark events are folded into a [`Node`] tree while
//!    registered [`InlineParser`]s turn `{{ keyword args }}` shortcodes into
//!    extension nodes.
//! 2. **Transform**: [`AstTransformer`]s run in priority order. The standard
//!    set extracts the page title and preview, absolutizes relative images
//!    and builds the table of contents.
//! 3. **Serialize**: the tree is written as HTML, with extension nodes
//!    handed to their [`ExtensionRenderer`].
//!
//! All phases share one [`RenderContext`] created per call. The
//! [`ExtensionRegistry`] is built once and read concurrently.
//!
//! # Example
//!
//! ```no_run
//! use markify_render::{ExtensionRegistry, MarkdownRenderer, RenderOptions};
//!
//! let renderer = MarkdownRenderer::new(ExtensionRegistry::with_defaults()?);
//! let result = renderer.render(b"# Hello\n\n{{ toc }}", &RenderOptions::default())?;
//! assert_eq!(result.page_title(), "Hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod ast;
mod builder;
mod context;
pub mod embed;
mod error;
mod html;
mod registry;
mod renderer;
mod shortcode;
mod state;
pub mod toc;
pub mod transform;
mod util;

pub use ast::{ExtensionData, ExtensionNode, Node, NodeKind, WalkStatus};
pub use context::{PagePreviewText, RenderContext};
pub use error::{FetchError, RegistryError, RenderError};
pub use html::RAW_HTML_OMITTED;
pub use registry::{
    AstTransformer, Extension, ExtensionRegistry, ExtensionRenderer, InlineParser, RegistryBuilder,
};
pub use renderer::{MarkdownRenderer, RenderOptions, RenderResult, RendererConfig};
pub use shortcode::ShortcodeParser;
pub use state::{escape_html, slugify};
pub use toc::{TableOfContents, TocTree};
pub use util::{TITLE_MAX_CHARS, extract_text, truncate_title};

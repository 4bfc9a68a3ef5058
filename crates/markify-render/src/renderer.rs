//! Pipeline entry point: markdown bytes in, HTML and page facts out.

use std::collections::BTreeSet;

use markify_config::{Config, RenderConfig};
use pulldown_cmark::{Options, Parser, TextMergeStream};
use url::Url;

use crate::builder::TreeBuilder;
use crate::context::{PagePreviewText, RenderContext};
use crate::error::{RegistryError, RenderError};
use crate::html::{RAW_HTML_OMITTED, render_html};
use crate::registry::ExtensionRegistry;
use crate::util::{TITLE_MAX_CHARS, truncate_title};

/// Renderer-wide settings fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RendererConfig {
    /// Pass raw HTML and script-capable URLs through unchanged.
    pub raw_html: bool,
    /// Convert straight quotes, dashes and ellipses to typographic forms.
    pub typographer: bool,
    /// Default for [`RenderOptions::shortcodes_enabled`].
    pub shortcodes: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            raw_html: false,
            typographer: true,
            shortcodes: true,
        }
    }
}

impl From<&RenderConfig> for RendererConfig {
    fn from(config: &RenderConfig) -> Self {
        Self {
            raw_html: config.raw_html,
            typographer: config.typographer,
            shortcodes: config.shortcodes,
        }
    }
}

/// Per-document options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Absolute URL of the document, used to absolutize relative images.
    pub base_url: Option<String>,
    /// Expand `{{ ... }}` shortcodes. When off they stay literal text.
    pub shortcodes_enabled: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            shortcodes_enabled: true,
        }
    }
}

impl RenderOptions {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_shortcodes(mut self, enabled: bool) -> Self {
        self.shortcodes_enabled = enabled;
        self
    }
}

/// Result of rendering one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderResult {
    /// Rendered HTML.
    pub html: String,
    /// First heading and first paragraph text.
    pub preview: PagePreviewText,
    /// Shortcode keywords seen in the document, expanded or not.
    pub used_shortcodes: BTreeSet<String>,
}

impl RenderResult {
    pub fn preview(&self) -> &PagePreviewText {
        &self.preview
    }

    /// Display title: the first heading, else the preview, shortened to
    /// [`TITLE_MAX_CHARS`] characters.
    pub fn page_title(&self) -> String {
        let source = if self.preview.title.trim().is_empty() {
            &self.preview.preview
        } else {
            &self.preview.title
        };
        truncate_title(source, TITLE_MAX_CHARS)
    }

    pub fn used_shortcodes(&self) -> &BTreeSet<String> {
        &self.used_shortcodes
    }

    /// Whether the output has no visible content.
    pub fn is_empty(&self) -> bool {
        self.html.replace(RAW_HTML_OMITTED, "").trim().is_empty()
    }
}

/// Markdown to HTML renderer.
///
/// Holds only read-only state, so one instance can serve concurrent
/// renders from many threads.
pub struct MarkdownRenderer {
    registry: ExtensionRegistry,
    config: RendererConfig,
}

impl MarkdownRenderer {
    /// Create a renderer with default settings.
    pub fn new(registry: ExtensionRegistry) -> Self {
        Self::with_config(registry, RendererConfig::default())
    }

    pub fn with_config(registry: ExtensionRegistry, config: RendererConfig) -> Self {
        Self { registry, config }
    }

    /// Create a renderer with the standard extensions from a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let registry = ExtensionRegistry::from_config(&config.embeds)?;
        Ok(Self::with_config(registry, RendererConfig::from(&config.render)))
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn config(&self) -> RendererConfig {
        self.config
    }

    /// Options matching this renderer's configured defaults.
    pub fn default_options(&self) -> RenderOptions {
        RenderOptions::default().with_shortcodes(self.config.shortcodes)
    }

    /// Get parser options based on configuration.
    #[must_use]
    pub fn parser_options(&self) -> Options {
        let mut options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_GFM;
        if self.config.typographer {
            options |= Options::ENABLE_SMART_PUNCTUATION;
        }
        options
    }

    /// Render a markdown document.
    ///
    /// Embed failures are rendered inline and never fail the call.
    ///
    /// # Errors
    ///
    /// Fails if the input is not UTF-8, the base URL is unusable, or an
    /// image destination cannot be parsed.
    pub fn render(
        &self,
        input: &[u8],
        options: &RenderOptions,
    ) -> Result<RenderResult, RenderError> {
        let markdown = std::str::from_utf8(input)?;
        self.render_str(markdown, options)
    }

    /// Render markdown text.
    ///
    /// # Errors
    ///
    /// See [`render`](Self::render).
    pub fn render_str(
        &self,
        markdown: &str,
        options: &RenderOptions,
    ) -> Result<RenderResult, RenderError> {
        let base_url = options.base_url.as_deref().map(parse_base_url).transpose()?;
        let mut ctx = RenderContext::new(base_url, options.shortcodes_enabled);

        let events = TextMergeStream::new(Parser::new_ext(markdown, self.parser_options()));
        let mut document = TreeBuilder::new(self.registry.inline_parsers()).build(events, &mut ctx);

        for transformer in self.registry.transformers() {
            tracing::trace!(transformer = transformer.name(), "Running transform");
            transformer.transform(&mut document, &mut ctx)?;
        }

        let html = render_html(&document, &self.registry, &ctx, self.config.raw_html);
        let (preview, used_shortcodes) = ctx.into_parts();
        tracing::debug!(
            bytes = html.len(),
            shortcodes = used_shortcodes.len(),
            "Rendered document"
        );

        Ok(RenderResult {
            html,
            preview: preview.unwrap_or_default(),
            used_shortcodes,
        })
    }
}

fn parse_base_url(url: &str) -> Result<Url, RenderError> {
    let invalid = |source: url::ParseError| RenderError::InvalidBaseUrl {
        url: url.to_owned(),
        source,
    };
    let parsed = Url::parse(url).map_err(invalid)?;
    // Joining anything onto a `mailto:` or `data:` base fails the same way.
    if parsed.cannot_be_a_base() {
        return Err(invalid(url::ParseError::RelativeUrlWithCannotBeABaseBase));
    }
    Ok(parsed)
}

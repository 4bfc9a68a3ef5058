//! Extension registry assembled once at startup.
//!
//! The registry holds every inline parser, AST transformer and shortcode
//! renderer the pipeline uses. It is immutable after [`RegistryBuilder::build`]
//! and is shared by reference between concurrent renders.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use markify_config::EmbedsConfig;

use crate::ast::{ExtensionNode, Node};
use crate::context::RenderContext;
use crate::embed::{HttpFetcher, OembedEmbed, OembedFetcher, TemplateEmbed, builtin_providers};
use crate::error::{RegistryError, RenderError};
use crate::toc::TableOfContents;
use crate::transform::{RelativeImageLinks, TitleExtractor};

/// Recognizes a custom inline construct inside plain text.
pub trait InlineParser: Send + Sync {
    /// Keyword of the extension nodes this parser emits.
    fn keyword(&self) -> &str;

    /// Character that may start the construct.
    fn trigger(&self) -> char;

    /// Try to parse a construct at the start of `line`.
    ///
    /// `line` runs from the trigger character to the end of the current
    /// line. Returns the node and the number of bytes consumed, or `None`
    /// to leave the text to other parsers.
    fn parse(&self, line: &str, ctx: &mut RenderContext) -> Option<(ExtensionNode, usize)>;
}

/// Whole-document pass run after parsing and before serialization.
pub trait AstTransformer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Transform the document in place.
    fn transform(&self, document: &mut Node, ctx: &mut RenderContext) -> Result<(), RenderError>;
}

/// Writes the HTML for extension nodes of one keyword.
///
/// Output is inserted verbatim, so implementations must escape whatever
/// they take from the document.
pub trait ExtensionRenderer: Send + Sync {
    fn render(&self, node: &ExtensionNode, ctx: &RenderContext, out: &mut String);
}

/// A bundle of parsers, transformers and renderers registered together.
pub trait Extension {
    /// Add this extension's parts to the builder.
    fn register(self, builder: RegistryBuilder) -> RegistryBuilder;
}

struct Prioritized<T> {
    priority: i32,
    value: T,
}

/// Sort by descending priority, keeping registration order among equals.
fn into_sorted<T>(mut items: Vec<Prioritized<T>>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(item.priority));
    items.into_iter().map(|item| item.value).collect()
}

/// Builder for [`ExtensionRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    parsers: Vec<Prioritized<Box<dyn InlineParser>>>,
    transformers: Vec<Prioritized<Box<dyn AstTransformer>>>,
    renderers: Vec<(String, Box<dyn ExtensionRenderer>)>,
}

impl RegistryBuilder {
    /// Register an inline parser. Higher priority parsers are tried first.
    #[must_use]
    pub fn with_inline_parser(mut self, parser: impl InlineParser + 'static, priority: i32) -> Self {
        self.parsers.push(Prioritized {
            priority,
            value: Box::new(parser),
        });
        self
    }

    /// Register an AST transformer. Higher priority transformers run first.
    #[must_use]
    pub fn with_transformer(
        mut self,
        transformer: impl AstTransformer + 'static,
        priority: i32,
    ) -> Self {
        self.transformers.push(Prioritized {
            priority,
            value: Box::new(transformer),
        });
        self
    }

    /// Register the renderer for a shortcode keyword.
    #[must_use]
    pub fn with_renderer(
        mut self,
        keyword: impl Into<String>,
        renderer: impl ExtensionRenderer + 'static,
    ) -> Self {
        self.renderers.push((keyword.into(), Box::new(renderer)));
        self
    }

    /// Register every part of an extension.
    #[must_use]
    pub fn with_extension(self, extension: impl Extension) -> Self {
        extension.register(self)
    }

    /// Validate and freeze the registry.
    ///
    /// # Errors
    ///
    /// Fails if two parsers or two renderers claim the same keyword, or a
    /// parser's keyword has no renderer.
    pub fn build(self) -> Result<ExtensionRegistry, RegistryError> {
        let mut parser_keywords = HashSet::new();
        for parser in &self.parsers {
            if !parser_keywords.insert(parser.value.keyword().to_owned()) {
                return Err(RegistryError::DuplicateKeyword {
                    keyword: parser.value.keyword().to_owned(),
                });
            }
        }

        let mut renderers = HashMap::with_capacity(self.renderers.len());
        for (keyword, renderer) in self.renderers {
            if renderers.contains_key(&keyword) {
                return Err(RegistryError::DuplicateKeyword { keyword });
            }
            renderers.insert(keyword, renderer);
        }

        if let Some(keyword) = parser_keywords
            .into_iter()
            .find(|keyword| !renderers.contains_key(keyword))
        {
            return Err(RegistryError::MissingRenderer { keyword });
        }

        let registry = ExtensionRegistry {
            parsers: into_sorted(self.parsers),
            transformers: into_sorted(self.transformers),
            renderers,
        };
        tracing::debug!(
            keywords = ?registry.keywords().collect::<Vec<_>>(),
            transformers = ?registry.transformers.iter().map(|t| t.name()).collect::<Vec<_>>(),
            "Extension registry built"
        );
        Ok(registry)
    }
}

/// Read-only set of extensions used by the renderer.
pub struct ExtensionRegistry {
    parsers: Vec<Box<dyn InlineParser>>,
    transformers: Vec<Box<dyn AstTransformer>>,
    renderers: HashMap<String, Box<dyn ExtensionRenderer>>,
}

impl ExtensionRegistry {
    /// Start an empty registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Standard extensions with default embed settings.
    ///
    /// # Errors
    ///
    /// Returns an error only if a built-in extension is misconfigured.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        Self::from_config(&EmbedsConfig::default())
    }

    /// Standard extensions, with oEmbed lookups over HTTP.
    ///
    /// # Errors
    ///
    /// Fails if a configured provider clashes with another shortcode.
    pub fn from_config(config: &EmbedsConfig) -> Result<Self, RegistryError> {
        let fetcher: Arc<dyn OembedFetcher> = Arc::new(HttpFetcher::new(config.timeout()));
        Self::standard(config, fetcher)
    }

    /// Standard extensions with a custom oEmbed fetcher.
    ///
    /// Registers the title extractor, relative image links, the `toc`
    /// shortcode, the `gist` template embed and one oEmbed shortcode per
    /// provider. Configured providers override the built-in endpoints.
    ///
    /// # Errors
    ///
    /// Fails if a configured provider clashes with another shortcode.
    pub fn standard(
        config: &EmbedsConfig,
        fetcher: Arc<dyn OembedFetcher>,
    ) -> Result<Self, RegistryError> {
        let mut providers = builtin_providers();
        for (keyword, provider) in &config.providers {
            providers.insert(keyword.clone(), provider.url_template.clone());
        }

        let mut builder = Self::builder()
            .with_extension(TitleExtractor)
            .with_extension(RelativeImageLinks)
            .with_extension(TableOfContents)
            .with_extension(TemplateEmbed::gist()?.with_center(config.center_templates));
        for (keyword, url_template) in providers {
            let embed = OembedEmbed::new(keyword, url_template, Arc::clone(&fetcher))?
                .with_center(config.center);
            builder = builder.with_extension(embed);
        }
        builder.build()
    }

    /// Inline parsers in priority order.
    pub fn inline_parsers(&self) -> &[Box<dyn InlineParser>] {
        &self.parsers
    }

    /// AST transformers in priority order.
    pub fn transformers(&self) -> &[Box<dyn AstTransformer>] {
        &self.transformers
    }

    /// Renderer for a shortcode keyword.
    pub fn renderer(&self, keyword: &str) -> Option<&dyn ExtensionRenderer> {
        self.renderers.get(keyword).map(|renderer| &**renderer)
    }

    /// Registered shortcode keywords, sorted.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        let mut keywords: Vec<&str> = self.renderers.keys().map(String::as_str).collect();
        keywords.sort_unstable();
        keywords.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcode::ShortcodeParser;
    use pretty_assertions::assert_eq;

    struct Echo;

    impl ExtensionRenderer for Echo {
        fn render(&self, node: &ExtensionNode, _ctx: &RenderContext, out: &mut String) {
            out.push_str(&node.keyword);
        }
    }

    struct Named(&'static str);

    impl AstTransformer for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn transform(&self, _document: &mut Node, _ctx: &mut RenderContext) -> Result<(), RenderError> {
            Ok(())
        }
    }

    #[test]
    fn test_transformers_sorted_by_priority() {
        let registry = ExtensionRegistry::builder()
            .with_transformer(Named("low"), 10)
            .with_transformer(Named("high"), 500)
            .with_transformer(Named("mid"), 100)
            .with_transformer(Named("mid-later"), 100)
            .build()
            .unwrap();
        let names: Vec<_> = registry.transformers().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["high", "mid", "mid-later", "low"]);
    }

    #[test]
    fn test_parsers_sorted_by_priority() {
        let registry = ExtensionRegistry::builder()
            .with_inline_parser(ShortcodeParser::new("toc"), 200)
            .with_inline_parser(ShortcodeParser::new("tweet"), 500)
            .with_renderer("toc", Echo)
            .with_renderer("tweet", Echo)
            .build()
            .unwrap();
        let keywords: Vec<_> = registry.inline_parsers().iter().map(|p| p.keyword()).collect();
        assert_eq!(keywords, vec!["tweet", "toc"]);
    }

    #[test]
    fn test_missing_renderer_fails_fast() {
        let result = ExtensionRegistry::builder()
            .with_inline_parser(ShortcodeParser::new("toc"), 200)
            .build();
        assert!(matches!(
            result,
            Err(RegistryError::MissingRenderer { keyword }) if keyword == "toc"
        ));
    }

    #[test]
    fn test_duplicate_parser_keyword() {
        let result = ExtensionRegistry::builder()
            .with_inline_parser(ShortcodeParser::new("toc"), 200)
            .with_inline_parser(ShortcodeParser::new("toc"), 100)
            .with_renderer("toc", Echo)
            .build();
        assert!(matches!(result, Err(RegistryError::DuplicateKeyword { .. })));
    }

    #[test]
    fn test_duplicate_renderer_keyword() {
        let result = ExtensionRegistry::builder()
            .with_renderer("toc", Echo)
            .with_renderer("toc", Echo)
            .build();
        assert!(matches!(result, Err(RegistryError::DuplicateKeyword { .. })));
    }

    #[test]
    fn test_defaults_register_builtin_shortcodes() {
        let registry = ExtensionRegistry::with_defaults().unwrap();
        let keywords: Vec<_> = registry.keywords().collect();
        assert_eq!(keywords, vec!["gist", "instagram", "toc", "tweet"]);

        let names: Vec<_> = registry.transformers().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["title", "relative-image-links", "toc"]);
    }

    #[test]
    fn test_configured_provider_adds_shortcode() {
        let mut config = EmbedsConfig::default();
        config.providers.insert(
            "video".to_owned(),
            markify_config::ProviderConfig {
                url_template: "https://video.example.com/oembed?id={id}".to_owned(),
            },
        );
        let registry = ExtensionRegistry::from_config(&config).unwrap();
        assert!(registry.renderer("video").is_some());
    }

    #[test]
    fn test_configured_provider_cannot_shadow_template_embed() {
        let mut config = EmbedsConfig::default();
        config.providers.insert(
            "gist".to_owned(),
            markify_config::ProviderConfig {
                url_template: "https://example.com/{id}".to_owned(),
            },
        );
        let result = ExtensionRegistry::from_config(&config);
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateKeyword { keyword }) if keyword == "gist"
        ));
    }

    #[test]
    fn test_registry_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExtensionRegistry>();
    }
}

//! Shortcodes expanded by filling an HTML template.

use std::fmt::Write;
use std::ops::RangeInclusive;

use minijinja::{AutoEscape, Environment, UndefinedBehavior, context};

use super::{EMBED_PRIORITY, write_centered};
use crate::ast::ExtensionNode;
use crate::context::RenderContext;
use crate::error::RegistryError;
use crate::registry::{Extension, ExtensionRenderer, RegistryBuilder};
use crate::shortcode::ShortcodeParser;

const TEMPLATE_NAME: &str = "embed";

#[derive(Debug, thiserror::Error)]
enum TemplateError {
    #[error("expected {min}..={max} arguments, got {got}")]
    ArgumentCount { min: usize, max: usize, got: usize },
    #[error(transparent)]
    Render(#[from] minijinja::Error),
}

/// Shortcode rendered from a fixed template.
///
/// The template sees the shortcode arguments as `args`. Values are
/// HTML-escaped and undefined values are errors, so a short argument list
/// fails instead of producing a broken tag.
pub struct TemplateEmbed {
    keyword: String,
    env: Environment<'static>,
    params: RangeInclusive<usize>,
    center: bool,
}

impl TemplateEmbed {
    /// Compile `template` for `keyword`, accepting `params` arguments.
    ///
    /// # Errors
    ///
    /// Fails if the template does not compile.
    pub fn new(
        keyword: impl Into<String>,
        template: &'static str,
        params: RangeInclusive<usize>,
    ) -> Result<Self, RegistryError> {
        let keyword = keyword.into();
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.add_template(TEMPLATE_NAME, template)
            .map_err(|source| RegistryError::InvalidTemplate {
                keyword: keyword.clone(),
                source,
            })?;

        Ok(Self {
            keyword,
            env,
            params,
            center: false,
        })
    }

    /// Wrap the output in a centering container.
    #[must_use]
    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    fn render_args(&self, args: &[String]) -> Result<String, TemplateError> {
        if !self.params.contains(&args.len()) {
            return Err(TemplateError::ArgumentCount {
                min: *self.params.start(),
                max: *self.params.end(),
                got: args.len(),
            });
        }
        let template = self.env.get_template(TEMPLATE_NAME)?;
        Ok(template.render(context! { args => args })?)
    }
}

impl ExtensionRenderer for TemplateEmbed {
    fn render(&self, node: &ExtensionNode, _ctx: &RenderContext, out: &mut String) {
        write_centered(self.center, out, |out| match self.render_args(&node.args) {
            Ok(html) => out.push_str(&html),
            Err(e) => {
                tracing::warn!(keyword = %self.keyword, error = %e, "Cannot render embed template");
                let _ = write!(out, "Unable to display {}", self.keyword);
            }
        });
    }
}

impl Extension for TemplateEmbed {
    fn register(self, builder: RegistryBuilder) -> RegistryBuilder {
        let keyword = self.keyword.clone();
        builder
            .with_inline_parser(ShortcodeParser::new(keyword.clone()), EMBED_PRIORITY)
            .with_renderer(keyword, self)
    }
}

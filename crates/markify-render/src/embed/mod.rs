//! Shortcodes that expand to third-party embed markup.
//!
//! Two strategies exist: [`TemplateEmbed`] fills a fixed HTML template with
//! the shortcode arguments, [`OembedEmbed`] asks a provider's oEmbed endpoint
//! for the markup. Both degrade to a short inline message on failure and
//! never abort the render.

mod oembed;
mod services;
mod template;

pub use oembed::{HttpFetcher, OembedEmbed, OembedFetcher, OembedResponse};
pub use services::{GIST_KEYWORD, INSTAGRAM_KEYWORD, TWEET_KEYWORD, builtin_providers};
pub use template::TemplateEmbed;

/// Inline parser priority of embed shortcodes.
pub(crate) const EMBED_PRIORITY: i32 = 500;

const CENTER_OPEN: &str = r#"<div class="embed-center">"#;
const CENTER_CLOSE: &str = "</div>";

/// Run `body`, optionally wrapped in the centering container.
fn write_centered(center: bool, out: &mut String, body: impl FnOnce(&mut String)) {
    if center {
        out.push_str(CENTER_OPEN);
    }
    body(out);
    if center {
        out.push_str(CENTER_CLOSE);
    }
}

//! Built-in embed shortcodes.

use std::collections::BTreeMap;

use super::TemplateEmbed;
use crate::error::RegistryError;

pub const TWEET_KEYWORD: &str = "tweet";
pub const INSTAGRAM_KEYWORD: &str = "instagram";
pub const GIST_KEYWORD: &str = "gist";

const TWEET_OEMBED_URL: &str =
    "https://publish.twitter.com/oembed?url=https://twitter.com/i/status/{id}&omit_script=true";
const INSTAGRAM_OEMBED_URL: &str =
    "https://api.instagram.com/oembed/?url=https://www.instagram.com/p/{id}/&maxwidth=420&omitscript=true";

const GIST_TEMPLATE: &str = concat!(
    r#"<script type="application/javascript" "#,
    r#"src="https://gist.github.com/{{ args[0] }}/{{ args[1] }}.js"#,
    r#"{% if args|length == 3 %}?file={{ args[2] }}{% endif %}">"#,
    "</script>",
);

/// Built-in oEmbed providers as `keyword -> URL template`.
pub fn builtin_providers() -> BTreeMap<String, String> {
    BTreeMap::from([
        (TWEET_KEYWORD.to_owned(), TWEET_OEMBED_URL.to_owned()),
        (INSTAGRAM_KEYWORD.to_owned(), INSTAGRAM_OEMBED_URL.to_owned()),
    ])
}

impl TemplateEmbed {
    /// `{{ gist user id [file] }}` as a GitHub gist script tag.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the template is fixed.
    pub fn gist() -> Result<Self, RegistryError> {
        Self::new(GIST_KEYWORD, GIST_TEMPLATE, 2..=3)
    }
}

//! oEmbed-backed shortcodes such as `{{ tweet 123 }}`.

use std::fmt::Write;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use markify_config::ID_PLACEHOLDER;
use regex::Regex;
use serde::Deserialize;
use ureq::Agent;

use super::{EMBED_PRIORITY, write_centered};
use crate::ast::ExtensionNode;
use crate::context::RenderContext;
use crate::error::{FetchError, RegistryError};
use crate::registry::{Extension, ExtensionRenderer, RegistryBuilder};
use crate::shortcode::ShortcodeParser;

static RESOURCE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").unwrap());

/// Body of an oEmbed response. Only the markup is used.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct OembedResponse {
    pub html: String,
}

/// Performs the single lookup behind an oEmbed shortcode.
pub trait OembedFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<OembedResponse, FetchError>;
}

/// [`OembedFetcher`] over a pooled HTTP agent.
pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl OembedFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<OembedResponse, FetchError> {
        let response = self
            .agent
            .get(url)
            .header("Accept", "application/json")
            .call()?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if !(200..300).contains(&status) {
            let body = body
                .read_to_string()
                .unwrap_or_else(|_| String::from("(unable to read error body)"));
            return Err(FetchError::Status { status, body });
        }

        let text = body.read_to_string()?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Shortcode resolved through a provider's oEmbed endpoint.
///
/// The first argument is the resource id and must consist of ASCII
/// letters, digits, `_` or `-`. It replaces `{id}` in the URL template.
pub struct OembedEmbed {
    keyword: String,
    url_template: String,
    center: bool,
    fetcher: Arc<dyn OembedFetcher>,
}

impl OembedEmbed {
    /// Create an embed for `keyword`.
    ///
    /// # Errors
    ///
    /// Fails if `url_template` has no `{id}` placeholder.
    pub fn new(
        keyword: impl Into<String>,
        url_template: impl Into<String>,
        fetcher: Arc<dyn OembedFetcher>,
    ) -> Result<Self, RegistryError> {
        let keyword = keyword.into();
        let url_template = url_template.into();
        if !url_template.contains(ID_PLACEHOLDER) {
            return Err(RegistryError::InvalidUrlTemplate {
                keyword,
                template: url_template,
            });
        }
        Ok(Self {
            keyword,
            url_template,
            center: true,
            fetcher,
        })
    }

    /// Wrap the output in a centering container.
    #[must_use]
    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    /// Lookup URL for a resource id.
    pub fn url_for(&self, id: &str) -> String {
        self.url_template.replace(ID_PLACEHOLDER, id)
    }
}

impl ExtensionRenderer for OembedEmbed {
    fn render(&self, node: &ExtensionNode, _ctx: &RenderContext, out: &mut String) {
        write_centered(self.center, out, |out| {
            let Some(id) = node.args.first().filter(|id| RESOURCE_ID_RE.is_match(id)) else {
                let _ = write!(out, "Wrong arguments for {}!", self.keyword);
                return;
            };

            let url = self.url_for(id);
            match self.fetcher.fetch(&url) {
                Ok(response) => out.push_str(&response.html),
                Err(e) => {
                    tracing::warn!(
                        keyword = %self.keyword,
                        id = %id,
                        url = %url,
                        error = %e,
                        "Cannot get oEmbed code via API"
                    );
                    let _ = write!(out, "Unable to load {} {id}!", self.keyword);
                }
            }
        });
    }
}

impl Extension for OembedEmbed {
    fn register(self, builder: RegistryBuilder) -> RegistryBuilder {
        let keyword = self.keyword.clone();
        builder
            .with_inline_parser(ShortcodeParser::new(keyword.clone()), EMBED_PRIORITY)
            .with_renderer(keyword, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Records requested URLs and answers with a canned result.
    struct MockFetcher {
        requests: Mutex<Vec<String>>,
        html: Option<String>,
    }

    impl MockFetcher {
        fn ok(html: &str) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                html: Some(html.to_owned()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                html: None,
            })
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl OembedFetcher for MockFetcher {
        fn fetch(&self, url: &str) -> Result<OembedResponse, FetchError> {
            self.requests.lock().unwrap().push(url.to_owned());
            match &self.html {
                Some(html) => Ok(OembedResponse { html: html.clone() }),
                None => Err(FetchError::Status {
                    status: 404,
                    body: "not found".to_owned(),
                }),
            }
        }
    }

    fn render(embed: &OembedEmbed, args: &[&str]) -> String {
        let node = ExtensionNode::new("tweet", args.iter().map(|a| (*a).to_owned()).collect());
        let mut out = String::new();
        embed.render(&node, &RenderContext::new(None, true), &mut out);
        out
    }

    fn tweet(fetcher: Arc<dyn OembedFetcher>) -> OembedEmbed {
        OembedEmbed::new("tweet", "http://oembed.test/?id={id}", fetcher).unwrap()
    }

    #[test]
    fn test_renders_fetched_html_centered() {
        let fetcher = MockFetcher::ok("<blockquote>hi</blockquote>");
        let embed = tweet(Arc::clone(&fetcher) as Arc<dyn OembedFetcher>);
        assert_eq!(
            render(&embed, &["123"]),
            r#"<div class="embed-center"><blockquote>hi</blockquote></div>"#
        );
        assert_eq!(fetcher.requests(), vec!["http://oembed.test/?id=123"]);
    }

    #[test]
    fn test_without_center() {
        let embed = tweet(MockFetcher::ok("<p>x</p>")).with_center(false);
        assert_eq!(render(&embed, &["123"]), "<p>x</p>");
    }

    #[test]
    fn test_fetch_failure_falls_back() {
        let embed = tweet(MockFetcher::failing()).with_center(false);
        assert_eq!(render(&embed, &["000"]), "Unable to load tweet 000!");
    }

    #[test]
    fn test_invalid_id_skips_lookup() {
        let fetcher = MockFetcher::ok("<p>x</p>");
        let embed = tweet(Arc::clone(&fetcher) as Arc<dyn OembedFetcher>).with_center(false);
        assert_eq!(render(&embed, &["x;//sdfs"]), "Wrong arguments for tweet!");
        assert!(fetcher.requests().is_empty());
    }

    #[test]
    fn test_missing_id() {
        let embed = tweet(MockFetcher::ok("<p>x</p>"));
        assert_eq!(
            render(&embed, &[]),
            r#"<div class="embed-center">Wrong arguments for tweet!</div>"#
        );
    }

    #[test]
    fn test_url_template_requires_placeholder() {
        let result = OembedEmbed::new("tweet", "http://oembed.test/", MockFetcher::failing());
        assert!(matches!(
            result,
            Err(RegistryError::InvalidUrlTemplate { keyword, .. }) if keyword == "tweet"
        ));
    }

    #[test]
    fn test_http_fetcher_unreachable_endpoint() {
        let fetcher = HttpFetcher::new(Duration::from_secs(2));
        let result = fetcher.fetch("http://127.0.0.1:9/oembed?id=000");
        assert!(matches!(result, Err(FetchError::Http(_))));
    }

    #[test]
    fn test_oembed_response_requires_html() {
        let parsed: Result<OembedResponse, _> = serde_json::from_str(r#"{"type":"rich"}"#);
        assert!(parsed.is_err());
        let parsed: OembedResponse =
            serde_json::from_str(r#"{"html":"<b>x</b>","width":550}"#).unwrap();
        assert_eq!(parsed.html, "<b>x</b>");
    }
}

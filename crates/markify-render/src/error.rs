//! Error types for the rendering pipeline.

/// Error that aborts a single render call.
///
/// Embed failures never surface here: they are rendered inline as
/// fallback text.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Input bytes are not valid UTF-8.
    #[error("document is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// The base URL supplied in render options is unusable.
    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        /// Base URL as supplied by the caller.
        url: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// A link destination in the document failed to parse.
    #[error("invalid link destination '{destination}': {source}")]
    InvalidDestination {
        /// Destination as written in the document.
        destination: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// A relative image destination holds characters no URL may contain.
    #[error("invalid link destination '{destination}': {reason}")]
    MalformedDestination {
        /// Destination as written in the document.
        destination: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Programmer error detected while assembling an [`ExtensionRegistry`](crate::ExtensionRegistry).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A shortcode keyword has a parser but nothing to render its nodes.
    #[error("no renderer registered for shortcode '{keyword}'")]
    MissingRenderer {
        /// Shortcode keyword.
        keyword: String,
    },
    /// Two extensions claimed the same keyword.
    #[error("shortcode '{keyword}' registered more than once")]
    DuplicateKeyword {
        /// Shortcode keyword.
        keyword: String,
    },
    /// Embed template failed to compile.
    #[error("invalid template for shortcode '{keyword}': {source}")]
    InvalidTemplate {
        /// Shortcode keyword.
        keyword: String,
        /// Template compilation error.
        #[source]
        source: minijinja::Error,
    },
    /// Provider URL template lacks the identifier placeholder.
    #[error("URL template for shortcode '{keyword}' must contain {{id}}: {template}")]
    InvalidUrlTemplate {
        /// Shortcode keyword.
        keyword: String,
        /// Offending template.
        template: String,
    },
}

/// Failure of a single oEmbed lookup.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure, including timeouts.
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),
    /// Provider answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// Response body is not an oEmbed JSON document.
    #[error("malformed oEmbed response: {0}")]
    Json(#[from] serde_json::Error),
}

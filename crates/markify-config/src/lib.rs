//! Configuration management for markify.
//!
//! Parses `markify.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! ```toml
//! [render]
//! shortcodes = true
//! raw_html = false
//!
//! [embeds]
//! timeout_secs = 5
//! center = true
//! center_templates = false
//!
//! [embeds.providers.tweet]
//! url_template = "https://publish.twitter.com/oembed?url=https://twitter.com/i/status/{id}"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "markify.toml";

/// Placeholder substituted with the embed identifier in provider URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Markdown rendering configuration.
    pub render: RenderConfig,
    /// Embed resolver configuration.
    pub embeds: EmbedsConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Markdown rendering configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Whether `{{ keyword args }}` shortcodes are expanded by default.
    pub shortcodes: bool,
    /// Pass raw HTML and unsafe link schemes through untouched.
    pub raw_html: bool,
    /// Convert straight quotes and dashes to typographic ones.
    pub typographer: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            shortcodes: true,
            raw_html: false,
            typographer: true,
        }
    }
}

/// Embed resolver configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EmbedsConfig {
    /// Timeout for a single oEmbed lookup, in seconds.
    pub timeout_secs: u64,
    /// Wrap fetched embeds in a centering container.
    pub center: bool,
    /// Wrap template embeds such as `gist` in a centering container.
    pub center_templates: bool,
    /// oEmbed providers keyed by shortcode keyword.
    ///
    /// Entries override the built-in `tweet` and `instagram` endpoints or
    /// register additional oEmbed-backed shortcodes.
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl EmbedsConfig {
    /// Lookup timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmbedsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            center: true,
            center_templates: false,
            providers: BTreeMap::new(),
        }
    }
}

/// A single oEmbed provider.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Endpoint URL with an `{id}` placeholder.
    pub url_template: String,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `markify.toml` in current directory and parents,
    /// falling back to defaults when none is found.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails
    /// or the loaded values don't pass validation.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::load_from_file(path);
        }

        match Self::discover_config() {
            Some(discovered) => Self::load_from_file(&discovered),
            None => Ok(Self::default()),
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::discover_from(&current)
    }

    fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_embeds()
    }

    fn validate_embeds(&self) -> Result<(), ConfigError> {
        const MAX_TIMEOUT_SECS: u64 = 30;

        let timeout = self.embeds.timeout_secs;
        if timeout == 0 {
            return Err(ConfigError::Validation(
                "embeds.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        if timeout > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "embeds.timeout_secs cannot exceed {MAX_TIMEOUT_SECS}"
            )));
        }

        for (keyword, provider) in &self.embeds.providers {
            let field = format!("embeds.providers.{keyword}.url_template");
            if keyword.contains(char::is_whitespace) {
                return Err(ConfigError::Validation(format!(
                    "embeds.providers key '{keyword}' cannot contain whitespace"
                )));
            }
            require_non_empty(&provider.url_template, &field)?;
            require_http_url(&provider.url_template, &field)?;
            if !provider.url_template.contains(ID_PLACEHOLDER) {
                return Err(ConfigError::Validation(format!(
                    "{field} must contain {ID_PLACEHOLDER}"
                )));
            }
        }

        Ok(())
    }
}

//! Per-render shared state.
//!
//! One [`RenderContext`] is created for every render call and is the only
//! channel through which the parse, transform and serialize phases share
//! facts. Well-known facts are plain fields; extension-specific payloads go
//! into a store keyed by their Rust type, so two extensions can never
//! collide on a key.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use url::Url;

/// Title and preview text of a page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PagePreviewText {
    /// Flattened text of the first heading.
    pub title: String,
    /// Flattened text of the first paragraph.
    pub preview: String,
}

/// Shared state of a single render call.
///
/// Not thread-safe by construction: it lives on the stack of one render.
pub struct RenderContext {
    base_url: Option<Url>,
    shortcodes_enabled: bool,
    used_shortcodes: BTreeSet<String>,
    preview: Option<PagePreviewText>,
    extension_nodes: BTreeMap<String, usize>,
    slots: HashMap<TypeId, Box<dyn Any>>,
}

impl RenderContext {
    /// Create a fresh context.
    pub fn new(base_url: Option<Url>, shortcodes_enabled: bool) -> Self {
        Self {
            base_url,
            shortcodes_enabled,
            used_shortcodes: BTreeSet::new(),
            preview: None,
            extension_nodes: BTreeMap::new(),
            slots: HashMap::new(),
        }
    }

    /// Base URL used to absolutize relative image links.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Whether shortcodes are expanded in this render.
    pub fn shortcodes_enabled(&self) -> bool {
        self.shortcodes_enabled
    }

    /// Record that a shortcode keyword appeared in the document.
    ///
    /// Recorded even when shortcodes are disabled.
    pub fn record_shortcode(&mut self, keyword: &str) {
        if !self.used_shortcodes.contains(keyword) {
            self.used_shortcodes.insert(keyword.to_owned());
        }
    }

    /// Shortcode keywords seen so far.
    pub fn used_shortcodes(&self) -> &BTreeSet<String> {
        &self.used_shortcodes
    }

    /// Title and preview, once extracted.
    pub fn preview(&self) -> Option<&PagePreviewText> {
        self.preview.as_ref()
    }

    /// Store the page preview, replacing any previous value.
    pub fn set_preview(&mut self, preview: PagePreviewText) {
        self.preview = Some(preview);
    }

    pub(crate) fn record_extension_node(&mut self, keyword: &str) {
        *self.extension_nodes.entry(keyword.to_owned()).or_default() += 1;
    }

    /// Number of extension nodes emitted for `keyword`.
    pub fn extension_node_count(&self, keyword: &str) -> usize {
        self.extension_nodes.get(keyword).copied().unwrap_or_default()
    }

    /// Store an extension payload, replacing any previous value of the same type.
    pub fn insert<T: Any>(&mut self, value: T) {
        self.slots.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Fetch an extension payload by type.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub(crate) fn into_parts(self) -> (Option<PagePreviewText>, BTreeSet<String>) {
        (self.preview, self.used_shortcodes)
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("base_url", &self.base_url)
            .field("shortcodes_enabled", &self.shortcodes_enabled)
            .field("used_shortcodes", &self.used_shortcodes)
            .field("preview", &self.preview)
            .field("extension_nodes", &self.extension_nodes)
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq)]
    struct Counter(u32);

    #[derive(Debug, PartialEq)]
    struct Label(&'static str);

    #[test]
    fn test_slots_are_keyed_by_type() {
        let mut ctx = RenderContext::new(None, true);
        assert_eq!(ctx.get::<Counter>(), None);

        ctx.insert(Counter(1));
        ctx.insert(Label("x"));
        assert_eq!(ctx.get::<Counter>(), Some(&Counter(1)));
        assert_eq!(ctx.get::<Label>(), Some(&Label("x")));
    }

    #[test]
    fn test_insert_overwrites() {
        let mut ctx = RenderContext::new(None, true);
        ctx.insert(Counter(1));
        ctx.insert(Counter(2));
        assert_eq!(ctx.get::<Counter>(), Some(&Counter(2)));
        assert_eq!(ctx.get::<Label>(), None);
    }

    #[test]
    fn test_used_shortcodes_accumulate() {
        let mut ctx = RenderContext::new(None, false);
        ctx.record_shortcode("tweet");
        ctx.record_shortcode("toc");
        ctx.record_shortcode("tweet");
        let used: Vec<_> = ctx.used_shortcodes().iter().map(String::as_str).collect();
        assert_eq!(used, vec!["toc", "tweet"]);
    }

    #[test]
    fn test_extension_node_count() {
        let mut ctx = RenderContext::new(None, true);
        assert_eq!(ctx.extension_node_count("toc"), 0);
        ctx.record_extension_node("toc");
        ctx.record_extension_node("toc");
        assert_eq!(ctx.extension_node_count("toc"), 2);
    }

    #[test]
    fn test_preview_set_overwrites() {
        let mut ctx = RenderContext::new(None, true);
        assert!(ctx.preview().is_none());
        ctx.set_preview(PagePreviewText {
            title: "a".to_owned(),
            preview: String::new(),
        });
        ctx.set_preview(PagePreviewText {
            title: "b".to_owned(),
            preview: String::new(),
        });
        assert_eq!(ctx.preview().map(|p| p.title.as_str()), Some("b"));
    }
}

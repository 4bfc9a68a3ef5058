//! Absolutize relative image sources against the page URL.

use url::Url;

use crate::ast::{Node, NodeKind, WalkStatus};
use crate::context::RenderContext;
use crate::error::RenderError;
use crate::registry::{AstTransformer, Extension, RegistryBuilder};

const PRIORITY: i32 = 100;

/// Rewrites relative image destinations to absolute URLs.
///
/// A destination without scheme and host takes the scheme and host of the
/// render's base URL. Its path is joined onto the directory of the base
/// path, so `static/x.png` and `/static/x.png` on `http://a.com/foo/bar.md`
/// both become `http://a.com/foo/static/x.png`. The destination's query and
/// fragment are kept. Destinations with a scheme and protocol-relative
/// `//host/...` references are left alone. Nothing runs without a base URL.
#[derive(Clone, Copy, Debug, Default)]
pub struct RelativeImageLinks;

/// Resolved destination, or `None` when `dest` stays as written.
fn resolve_destination(dest: &str, base: &Url) -> Result<Option<Url>, RenderError> {
    if dest.is_empty() || dest.starts_with("//") {
        return Ok(None);
    }

    match Url::parse(dest) {
        Ok(_) => return Ok(None),
        Err(url::ParseError::RelativeUrlWithoutBase) => {}
        Err(source) => {
            return Err(RenderError::InvalidDestination {
                destination: dest.to_owned(),
                source,
            });
        }
    }
    check_reference(dest).map_err(|reason| RenderError::MalformedDestination {
        destination: dest.to_owned(),
        reason,
    })?;

    let (rest, fragment) = match dest.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (dest, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let base_path = base.path();
    let dir = base_path.rfind('/').map_or("", |i| &base_path[..i]);

    let mut resolved = base.clone();
    resolved.set_path(&clean_path(&format!("{dir}/{path}")));
    resolved.set_query(query);
    resolved.set_fragment(fragment);
    Ok(Some(resolved))
}

/// Reject control characters and `%` not followed by two hex digits.
fn check_reference(dest: &str) -> Result<(), &'static str> {
    let bytes = dest.as_bytes();
    for (i, byte) in bytes.iter().enumerate() {
        if byte.is_ascii_control() {
            return Err("control character");
        }
        if *byte == b'%'
            && !bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
        {
            return Err("invalid percent escape");
        }
    }
    Ok(())
}

/// Lexically clean a rooted path: drop empty and `.` segments and let `..`
/// remove the previous segment, never climbing above the root.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

impl AstTransformer for RelativeImageLinks {
    fn name(&self) -> &'static str {
        "relative-image-links"
    }

    fn transform(&self, document: &mut Node, ctx: &mut RenderContext) -> Result<(), RenderError> {
        let Some(base) = ctx.base_url() else {
            return Ok(());
        };

        document.walk_mut(|node| {
            if let NodeKind::Image { dest, .. } = &mut node.kind
                && let Some(resolved) = resolve_destination(dest, base)?
            {
                tracing::trace!(from = %dest, to = %resolved, "Rewrote image source");
                *dest = resolved.into();
            }
            Ok::<_, RenderError>(WalkStatus::Continue)
        })?;
        Ok(())
    }
}

impl Extension for RelativeImageLinks {
    fn register(self, builder: RegistryBuilder) -> RegistryBuilder {
        builder.with_transformer(self, PRIORITY)
    }
}

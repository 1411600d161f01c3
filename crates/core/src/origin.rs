//! URL and origin helpers.
//!
//! Parsing never fails loudly: a malformed URL simply has no origin.

use serde::{Deserialize, Serialize};
use url::Url;

/// Schemes browsers use for resources packaged inside an extension.
pub const EXTENSION_SCHEMES: &[&str] = &["moz-extension", "chrome-extension"];

/// Where a resource was loaded from, relative to the monitored page.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OriginKind {
    Page,
    External,
    Extension,
    #[default]
    Unknown,
}

pub fn is_extension_url(value: &str) -> bool {
    EXTENSION_SCHEMES.iter().any(|scheme| {
        value
            .strip_prefix(scheme)
            .is_some_and(|rest| rest.starts_with("://"))
    })
}

fn is_extension_scheme(scheme: &str) -> bool {
    EXTENSION_SCHEMES.contains(&scheme)
}

/// Serialized origin of an already parsed URL.
///
/// Extension URLs have an opaque origin as far as the URL standard is
/// concerned, but browsers report them as `scheme://host`, so we do too.
pub fn origin_of_url(url: &Url) -> Option<String> {
    if is_extension_scheme(url.scheme()) {
        let host = url.host_str()?;
        return Some(format!("{}://{}", url.scheme(), host));
    }
    let origin = url.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}

/// Resolve `value` against `base` (the page URL) and return its origin.
pub fn origin_of(value: &str, base: Option<&Url>) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let parsed = match base {
        Some(base) => base.join(value),
        None => Url::parse(value),
    }
    .ok()?;
    origin_of_url(&parsed)
}

/// Classify an origin relative to the page origin.
pub fn classify_origin(origin: Option<&str>, page_origin: Option<&str>) -> OriginKind {
    let Some(origin) = origin.filter(|o| !o.is_empty()) else {
        return OriginKind::Unknown;
    };
    if is_extension_url(origin) {
        return OriginKind::Extension;
    }
    if page_origin == Some(origin) {
        return OriginKind::Page;
    }
    OriginKind::External
}

/// `scheme://host/` for extension URLs, `None` for anything else.
pub fn internal_origin_prefix(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    if !is_extension_scheme(parsed.scheme()) {
        return None;
    }
    let host = parsed.host_str()?;
    Some(format!("{}://{}/", parsed.scheme(), host))
}

/// Turn a declared host permission like `moz-extension://abc/*` into a
/// comparable prefix (`moz-extension://abc/`).
pub fn normalize_permission_pattern(pattern: &str) -> String {
    if pattern.is_empty() {
        return String::new();
    }
    let mut value = pattern.to_string();
    if value.ends_with("/*") {
        value.pop();
    }
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

// Source attribution: which installed extensions could have produced the
// extension-origin URLs seen on a page. Based on declared host permissions
// only, so a match is a correlation and never proof.

use domsentry_core::origin::{internal_origin_prefix, is_extension_url, normalize_permission_pattern};
use domsentry_core::{ExtensionRecord, SourceExtension};
use std::collections::BTreeMap;

/// Does `extension` declare an extension-scheme host permission covering
/// `origin` (an `scheme://host/` prefix)?
pub fn matches_internal_origin(extension: &ExtensionRecord, origin: &str) -> bool {
    if origin.is_empty() {
        return false;
    }
    extension
        .host_permissions
        .iter()
        .filter(|pattern| is_extension_url(pattern))
        .map(|pattern| normalize_permission_pattern(pattern))
        .any(|prefix| origin.starts_with(&prefix))
}

/// Match every observed URL against every inventory entry.
///
/// One result per extension id. When several observed URLs match the same
/// extension, the one seen last supplies `matched_origin`. Results are
/// ordered by extension id.
pub fn resolve_sources(
    extension_urls: &[String],
    inventory: &BTreeMap<String, ExtensionRecord>,
) -> Vec<SourceExtension> {
    let origins: Vec<String> = extension_urls
        .iter()
        .filter_map(|url| internal_origin_prefix(url))
        .collect();
    if origins.is_empty() {
        return Vec::new();
    }

    inventory
        .values()
        .filter_map(|ext| {
            origins
                .iter()
                .rfind(|origin| matches_internal_origin(ext, origin))
                .map(|origin| SourceExtension {
                    id: ext.id.clone(),
                    name: ext.name.clone(),
                    version: ext.version.clone(),
                    install_type: ext.install_type.clone(),
                    matched_origin: origin.clone(),
                })
        })
        .collect()
}

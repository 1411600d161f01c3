use serde::{Deserialize, Serialize};

/// An installed extension as reported by the browser's management API.
///
/// Only `host_permissions` matters for alert attribution; the rest is
/// carried for the inventory views.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub install_type: String,
    pub update_url: String,
    pub permissions: Vec<String>,
    pub host_permissions: Vec<String>,
    pub permission_warnings: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_new: bool,
    pub last_seen: i64,
}

impl ExtensionRecord {
    /// Themes and other add-on types are not tracked.
    pub fn is_extension(&self) -> bool {
        self.kind.is_empty() || self.kind == "extension"
    }
}

/// An extension whose declared permissions are consistent with having
/// produced an observed extension-origin URL. Correlation, not proof.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceExtension {
    pub id: String,
    pub name: String,
    pub version: String,
    pub install_type: String,
    pub matched_origin: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_record_deserializes_with_defaults() {
        let record: ExtensionRecord = serde_json::from_value(serde_json::json!({
            "id": "ext@example",
            "name": "Example",
            "hostPermissions": ["moz-extension://abc/*"],
            "type": "extension"
        }))
        .unwrap();

        assert_eq!(record.id, "ext@example");
        assert_eq!(record.host_permissions.len(), 1);
        assert!(record.permissions.is_empty());
        assert!(!record.is_new);
        assert!(record.is_extension());
    }

    #[test]
    fn test_theme_is_not_extension() {
        let record = ExtensionRecord {
            kind: "theme".to_string(),
            ..Default::default()
        };
        assert!(!record.is_extension());
    }
}

//! Alert: the exported, persisted unit of page-mutation telemetry.
//!
//! Field names serialize in camelCase because the popup and the history
//! viewer read the persisted log directly.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extension::SourceExtension;
use crate::limits::{
    recap_into, MAX_EXPORTED_EXTENSION_URLS, MAX_REASONS, MAX_TOP_TAGS, MERGED_DIFF_CAP,
    MERGED_SCRIPT_CAP, MERGED_SECURITY_CAP,
};
use crate::origin::OriginKind;
use crate::severity::Level;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Counts {
    pub added: u64,
    pub removed: u64,
    pub attributes: u64,
    pub text: u64,
}

impl Counts {
    pub fn structural(&self) -> u64 {
        self.added.saturating_add(self.removed)
    }

    pub fn total(&self) -> u64 {
        self.added
            .saturating_add(self.removed)
            .saturating_add(self.attributes)
            .saturating_add(self.text)
    }

    pub fn sum(&self, other: &Counts) -> Counts {
        Counts {
            added: self.added.saturating_add(other.added),
            removed: self.removed.saturating_add(other.removed),
            attributes: self.attributes.saturating_add(other.attributes),
            text: self.text.saturating_add(other.text),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Exported projection of the window's structural signals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EvidenceSummary {
    pub extension_urls: Vec<String>,
    pub script_adds: u64,
    pub inline_scripts: u64,
    pub inline_handlers: u64,
    pub iframe_adds: u64,
    pub form_adds: u64,
    pub link_changes: u64,
    pub src_changes: u64,
    pub action_changes: u64,
}

// ----------------------------------------------------------------------------
// Diff
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AddedEntry {
    pub tag: String,
    pub selector: String,
    pub snippet: String,
    pub src: String,
    pub href: String,
    pub action: String,
    pub input_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RemovedEntry {
    pub tag: String,
    pub selector: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeEntry {
    pub selector: String,
    pub tag: String,
    pub attribute: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TextEntry {
    pub selector: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiffOverflow {
    pub added: u64,
    pub removed: u64,
    pub attributes: u64,
    pub text: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Diff {
    pub added: Vec<AddedEntry>,
    pub removed: Vec<RemovedEntry>,
    pub attributes: Vec<AttributeEntry>,
    pub text: Vec<TextEntry>,
    pub overflow: DiffOverflow,
}

impl Diff {
    /// Enforce `cap` on every category; dropped entries land in overflow.
    pub fn recap(&mut self, cap: usize) {
        recap_into(&mut self.added, &mut self.overflow.added, cap);
        recap_into(&mut self.removed, &mut self.overflow.removed, cap);
        recap_into(&mut self.attributes, &mut self.overflow.attributes, cap);
        recap_into(&mut self.text, &mut self.overflow.text, cap);
    }
}

// ----------------------------------------------------------------------------
// Security
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptEvidence {
    pub selector: String,
    pub src: String,
    pub inline: bool,
    pub origin: String,
    pub origin_kind: OriginKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct IframeEvidence {
    pub selector: String,
    pub src: String,
    pub origin: String,
    pub origin_kind: OriginKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FormEvidence {
    pub selector: String,
    pub action: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct InputEvidence {
    pub selector: String,
    pub input_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UrlChange {
    pub tag: String,
    pub attribute: String,
    pub selector: String,
    pub old_value: String,
    pub new_value: String,
    pub origin: String,
    pub origin_kind: OriginKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionChange {
    pub selector: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityOverflow {
    pub scripts: u64,
    pub iframes: u64,
    pub forms: u64,
    pub inputs: u64,
    pub url_changes: u64,
    pub action_changes: u64,
}

/// High-signal items: injected scripts/iframes/forms/inputs and URL or
/// form-action rewrites.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Security {
    pub scripts: Vec<ScriptEvidence>,
    pub iframes: Vec<IframeEvidence>,
    pub forms: Vec<FormEvidence>,
    pub inputs: Vec<InputEvidence>,
    pub url_changes: Vec<UrlChange>,
    pub action_changes: Vec<ActionChange>,
    pub inline_handlers: u64,
    pub overflow: SecurityOverflow,
}

impl Security {
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
            && self.iframes.is_empty()
            && self.forms.is_empty()
            && self.inputs.is_empty()
            && self.url_changes.is_empty()
            && self.action_changes.is_empty()
            && self.inline_handlers == 0
    }

    /// Enforce the persisted ceilings (scripts 20, everything else 10).
    pub fn recap(&mut self) {
        let o = &mut self.overflow;
        recap_into(&mut self.scripts, &mut o.scripts, MERGED_SCRIPT_CAP);
        recap_into(&mut self.iframes, &mut o.iframes, MERGED_SECURITY_CAP);
        recap_into(&mut self.forms, &mut o.forms, MERGED_SECURITY_CAP);
        recap_into(&mut self.inputs, &mut o.inputs, MERGED_SECURITY_CAP);
        recap_into(&mut self.url_changes, &mut o.url_changes, MERGED_SECURITY_CAP);
        recap_into(&mut self.action_changes, &mut o.action_changes, MERGED_SECURITY_CAP);
    }
}

// ----------------------------------------------------------------------------
// Alert
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Alert {
    pub id: String,
    pub url: String,
    pub hostname: String,
    pub title: String,
    /// Unix millis
    pub timestamp: i64,
    pub level: Level,
    pub reasons: Vec<String>,
    pub counts: Counts,
    pub top_tags: Vec<TagCount>,
    pub evidence: EvidenceSummary,
    pub diff: Diff,
    pub security: Security,
    pub source_extensions: Vec<SourceExtension>,
}

impl Alert {
    /// Coerce an arbitrary (possibly partial or malformed) payload into a
    /// well-formed alert. Never fails: every bad field takes its default.
    pub fn normalize(payload: &Value) -> Self {
        let field = |name: &str| payload.get(name);

        let url = string_field(field("url")).unwrap_or_default();
        let hostname = string_field(field("hostname")).unwrap_or_default();
        let title = string_field(field("title"))
            .or_else(|| Some(hostname.clone()).filter(|h| !h.is_empty()))
            .or_else(|| Some(url.clone()).filter(|u| !u.is_empty()))
            .unwrap_or_else(|| "Unknown".to_string());

        let timestamp = field("timestamp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .filter(|ts| *ts > 0)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        let level = field("level")
            .and_then(Value::as_str)
            .map(Level::parse_lenient)
            .unwrap_or_default();

        let id = string_field(field("id")).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut reasons: Vec<String> = lenient_list(field("reasons"));
        dedup_in_order(&mut reasons);
        reasons.truncate(MAX_REASONS);

        let mut top_tags: Vec<TagCount> = lenient_list(field("topTags"));
        top_tags.truncate(MAX_TOP_TAGS);

        let mut evidence: EvidenceSummary = lenient(field("evidence"));
        dedup_in_order(&mut evidence.extension_urls);
        evidence
            .extension_urls
            .truncate(MAX_EXPORTED_EXTENSION_URLS);

        let mut diff: Diff = lenient(field("diff"));
        diff.recap(MERGED_DIFF_CAP);

        let mut security: Security = lenient(field("security"));
        security.recap();

        Self {
            id,
            url,
            hostname,
            title,
            timestamp,
            level,
            reasons,
            counts: lenient(field("counts")),
            top_tags,
            evidence,
            diff,
            security,
            source_extensions: lenient_list(field("sourceExtensions")),
        }
    }

    /// Normalize every element of a JSON array; anything else is empty.
    pub fn normalize_list(value: &Value) -> Vec<Alert> {
        value
            .as_array()
            .map(|items| items.iter().map(Alert::normalize).collect())
            .unwrap_or_default()
    }
}

/// Non-empty string, or a number rendered as a string.
fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient<T: DeserializeOwned + Default>(value: Option<&Value>) -> T {
    value
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Parse each element on its own so one bad entry does not sink the list.
fn lenient_list<T: DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Remove repeated values, keeping the first occurrence.
pub fn dedup_in_order(values: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    values.retain(|v| seen.insert(v.clone()));
}

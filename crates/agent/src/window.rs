//! Evidence Window: the per-document accumulator between flushes.
//!
//! Mutated only by the collector, cleared only by the flush gate (or by a
//! visibility change). Every list is capped; anything beyond a ceiling is
//! counted in the matching overflow counter.

use std::collections::HashMap;

use domsentry_core::limits::{push_capped, MAX_EXPORTED_EXTENSION_URLS};
use domsentry_core::origin::is_extension_url;
use domsentry_core::{
    ActionChange, AddedEntry, AttributeEntry, Counts, Diff, EvidenceSummary, FormEvidence,
    IframeEvidence, InputEvidence, RemovedEntry, ScriptEvidence, Security, TagCount, TextEntry,
    UrlChange,
};

use crate::config::CollectorConfig;

/// Structural signals observed during the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowEvidence {
    /// Insertion ordered, no duplicates
    pub extension_urls: Vec<String>,
    pub extension_urls_dropped: u64,
    pub script_adds: u64,
    pub inline_scripts: u64,
    pub inline_handlers: u64,
    pub iframe_adds: u64,
    pub form_adds: u64,
    pub link_changes: u64,
    pub src_changes: u64,
    pub action_changes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    pub max_detail_entries: usize,
    pub max_security_items: usize,
    pub max_extension_urls: usize,
    pub max_records: usize,
}

impl From<&CollectorConfig> for WindowLimits {
    fn from(cfg: &CollectorConfig) -> Self {
        Self {
            max_detail_entries: cfg.max_detail_entries,
            max_security_items: cfg.max_security_items,
            max_extension_urls: cfg.max_extension_urls,
            max_records: cfg.max_mutations_per_window,
        }
    }
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self::from(&CollectorConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct EvidenceWindow {
    pub counts: Counts,
    pub evidence: WindowEvidence,
    pub diff: Diff,
    pub security: Security,
    pub tag_counts: HashMap<String, u64>,
    records_seen: usize,
    saturated: bool,
    limits: WindowLimits,
}

impl EvidenceWindow {
    pub fn new(limits: WindowLimits) -> Self {
        Self {
            counts: Counts::default(),
            evidence: WindowEvidence::default(),
            diff: Diff::default(),
            security: Security::default(),
            tag_counts: HashMap::new(),
            records_seen: 0,
            saturated: false,
            limits,
        }
    }

    pub fn limits(&self) -> WindowLimits {
        self.limits
    }

    /// Clear everything; the window starts over.
    pub fn reset(&mut self) {
        *self = Self::new(self.limits);
    }

    /// Admit one raw record against the per-window ceiling.
    ///
    /// The first record past the ceiling saturates the window and leaves a
    /// single overflow marker; every later record is refused silently.
    pub fn admit_record(&mut self) -> bool {
        if self.saturated {
            return false;
        }
        if self.records_seen >= self.limits.max_records {
            self.saturated = true;
            self.diff.overflow.added += 1;
            return false;
        }
        self.records_seen += 1;
        true
    }

    pub fn records_seen(&self) -> usize {
        self.records_seen
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn total(&self) -> u64 {
        self.counts.total()
    }

    pub fn has_extension_urls(&self) -> bool {
        !self.evidence.extension_urls.is_empty()
    }

    /// Any concrete security-impact evidence captured this window.
    pub fn has_security_impact(&self) -> bool {
        !self.security.is_empty() || self.has_extension_urls()
    }

    /// Remember `value` if it points into an extension package.
    pub fn record_url(&mut self, value: &str) {
        if !is_extension_url(value) {
            return;
        }
        if self.evidence.extension_urls.iter().any(|u| u == value) {
            return;
        }
        if self.evidence.extension_urls.len() < self.limits.max_extension_urls {
            self.evidence.extension_urls.push(value.to_string());
        } else {
            self.evidence.extension_urls_dropped += 1;
        }
    }

    pub fn track_tag(&mut self, tag: &str) {
        let tag = tag.to_ascii_lowercase();
        if tag.is_empty() {
            return;
        }
        *self.tag_counts.entry(tag).or_insert(0) += 1;
    }

    /// Most frequent tags, ties broken alphabetically.
    pub fn top_tags(&self, limit: usize) -> Vec<TagCount> {
        let mut tags: Vec<TagCount> = self
            .tag_counts
            .iter()
            .map(|(tag, count)| TagCount {
                tag: tag.clone(),
                count: *count,
            })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        tags.truncate(limit);
        tags
    }

    pub fn evidence_summary(&self) -> EvidenceSummary {
        let ev = &self.evidence;
        EvidenceSummary {
            extension_urls: ev
                .extension_urls
                .iter()
                .take(MAX_EXPORTED_EXTENSION_URLS)
                .cloned()
                .collect(),
            script_adds: ev.script_adds,
            inline_scripts: ev.inline_scripts,
            inline_handlers: ev.inline_handlers,
            iframe_adds: ev.iframe_adds,
            form_adds: ev.form_adds,
            link_changes: ev.link_changes,
            src_changes: ev.src_changes,
            action_changes: ev.action_changes,
        }
    }

    // Diff

    pub fn push_added(&mut self, entry: AddedEntry) {
        let cap = self.limits.max_detail_entries;
        push_capped(&mut self.diff.added, &mut self.diff.overflow.added, cap, entry);
    }

    pub fn push_removed(&mut self, entry: RemovedEntry) {
        let cap = self.limits.max_detail_entries;
        push_capped(
            &mut self.diff.removed,
            &mut self.diff.overflow.removed,
            cap,
            entry,
        );
    }

    pub fn push_attribute(&mut self, entry: AttributeEntry) {
        let cap = self.limits.max_detail_entries;
        push_capped(
            &mut self.diff.attributes,
            &mut self.diff.overflow.attributes,
            cap,
            entry,
        );
    }

    pub fn push_text(&mut self, entry: TextEntry) {
        let cap = self.limits.max_detail_entries;
        push_capped(&mut self.diff.text, &mut self.diff.overflow.text, cap, entry);
    }

    // Security

    pub fn push_script(&mut self, entry: ScriptEvidence) {
        let cap = self.limits.max_security_items;
        let s = &mut self.security;
        push_capped(&mut s.scripts, &mut s.overflow.scripts, cap, entry);
    }

    pub fn push_iframe(&mut self, entry: IframeEvidence) {
        let cap = self.limits.max_security_items;
        let s = &mut self.security;
        push_capped(&mut s.iframes, &mut s.overflow.iframes, cap, entry);
    }

    pub fn push_form(&mut self, entry: FormEvidence) {
        let cap = self.limits.max_security_items;
        let s = &mut self.security;
        push_capped(&mut s.forms, &mut s.overflow.forms, cap, entry);
    }

    pub fn push_input(&mut self, entry: InputEvidence) {
        let cap = self.limits.max_security_items;
        let s = &mut self.security;
        push_capped(&mut s.inputs, &mut s.overflow.inputs, cap, entry);
    }

    pub fn push_url_change(&mut self, entry: UrlChange) {
        let cap = self.limits.max_security_items;
        let s = &mut self.security;
        push_capped(&mut s.url_changes, &mut s.overflow.url_changes, cap, entry);
    }

    pub fn push_action_change(&mut self, entry: ActionChange) {
        let cap = self.limits.max_security_items;
        let s = &mut self.security;
        push_capped(
            &mut s.action_changes,
            &mut s.overflow.action_changes,
            cap,
            entry,
        );
    }
}

impl Default for EvidenceWindow {
    fn default() -> Self {
        Self::new(WindowLimits::default())
    }
}

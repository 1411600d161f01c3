//! Classifier: severity and reasons for one Evidence Window.
//!
//! Pure; the rules only ever raise the level. Volume alone appends a reason
//! but never raises the level.

use domsentry_core::limits::MAX_REASONS;
use domsentry_core::Level;

use crate::window::EvidenceWindow;

pub const REASON_EXTENSION_URLS: &str = "Extension resource URLs were found on the page.";
pub const REASON_SCRIPTS: &str = "Scripts were injected into the page.";
pub const REASON_IFRAMES: &str = "Iframes were added to the page.";
pub const REASON_LINKS: &str = "Links or media sources were changed.";
pub const REASON_ACTIONS: &str = "Form actions were changed.";
pub const REASON_HANDLERS: &str = "Inline event handlers were added.";
pub const REASON_VOLUME: &str = "Many elements were added or removed.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub level: Level,
    pub reasons: Vec<String>,
}

impl Classification {
    fn raise(&mut self, level: Level, reason: &str) {
        self.level.raise_to(level);
        self.note(reason);
    }

    fn note(&mut self, reason: &str) {
        if self.reasons.len() < MAX_REASONS {
            self.reasons.push(reason.to_string());
        }
    }
}

pub fn classify(window: &EvidenceWindow, change_threshold: u64) -> Classification {
    let ev = &window.evidence;
    let mut out = Classification::default();

    if window.has_extension_urls() {
        out.raise(Level::High, REASON_EXTENSION_URLS);
    }
    if ev.script_adds > 0 || ev.inline_scripts > 0 {
        out.raise(Level::Medium, REASON_SCRIPTS);
    }
    if ev.iframe_adds > 0 {
        out.raise(Level::Medium, REASON_IFRAMES);
    }
    if ev.link_changes > 0 || ev.src_changes > 0 {
        out.raise(Level::Medium, REASON_LINKS);
    }
    if ev.action_changes > 0 {
        out.raise(Level::Medium, REASON_ACTIONS);
    }
    if ev.inline_handlers > 0 {
        out.raise(Level::Medium, REASON_HANDLERS);
    }
    if window.counts.structural() >= change_threshold {
        out.note(REASON_VOLUME);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: u64 = 25;

    #[test]
    fn test_empty_window_is_low() {
        let c = classify(&EvidenceWindow::default(), THRESHOLD);
        assert_eq!(c.level, Level::Low);
        assert!(c.reasons.is_empty());
    }

    #[test]
    fn test_extension_url_is_high() {
        let mut w = EvidenceWindow::default();
        w.record_url("moz-extension://abc/inject.js");
        w.evidence.script_adds = 1;
        let c = classify(&w, THRESHOLD);
        assert_eq!(c.level, Level::High);
        assert_eq!(c.reasons, vec![REASON_EXTENSION_URLS, REASON_SCRIPTS]);
    }

    fn assert_medium(setup: impl FnOnce(&mut EvidenceWindow), reason: &str) {
        let mut w = EvidenceWindow::default();
        setup(&mut w);
        let c = classify(&w, THRESHOLD);
        assert_eq!(c.level, Level::Medium, "{reason}");
        assert_eq!(c.reasons, vec![reason]);
    }

    #[test]
    fn test_medium_rules() {
        assert_medium(|w| w.evidence.inline_scripts = 1, REASON_SCRIPTS);
        assert_medium(|w| w.evidence.iframe_adds = 2, REASON_IFRAMES);
        assert_medium(|w| w.evidence.src_changes = 1, REASON_LINKS);
        assert_medium(|w| w.evidence.action_changes = 1, REASON_ACTIONS);
        assert_medium(|w| w.evidence.inline_handlers = 3, REASON_HANDLERS);
    }

    #[test]
    fn test_volume_only_appends_reason() {
        let mut w = EvidenceWindow::default();
        w.counts.added = 20;
        w.counts.removed = 5;
        let c = classify(&w, THRESHOLD);
        assert_eq!(c.level, Level::Low);
        assert_eq!(c.reasons, vec![REASON_VOLUME]);

        w.counts.removed = 4;
        assert!(classify(&w, THRESHOLD).reasons.is_empty());
    }

    #[test]
    fn test_all_rules_fire_capped_at_six() {
        let mut w = EvidenceWindow::default();
        w.record_url("chrome-extension://x/a.js");
        let ev = &mut w.evidence;
        ev.script_adds = 1;
        ev.iframe_adds = 1;
        ev.link_changes = 1;
        ev.action_changes = 1;
        ev.inline_handlers = 1;
        w.counts.added = 100;

        let c = classify(&w, THRESHOLD);
        assert_eq!(c.level, Level::High);
        assert_eq!(c.reasons.len(), MAX_REASONS);
        assert!(!c.reasons.iter().any(|r| r == REASON_VOLUME));
    }

    #[test]
    fn test_more_evidence_never_lowers_level() {
        let mut w = EvidenceWindow::default();
        w.record_url("moz-extension://x/a.js");
        let before = classify(&w, THRESHOLD).level;
        w.evidence.iframe_adds = 4;
        w.counts.added = 500;
        assert!(classify(&w, THRESHOLD).level >= before);
    }
}

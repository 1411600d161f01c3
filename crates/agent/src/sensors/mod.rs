//! Mutation Collector
//!
//! Turns raw host mutation batches into bounded evidence on an
//! [`EvidenceWindow`]. Per-node filtering and every size ceiling live here;
//! the window itself only knows how to cap its lists.

pub mod selector;
pub mod snippet;

use domsentry_core::origin::{classify_origin, origin_of, origin_of_url};
use domsentry_core::{
    ActionChange, AddedEntry, AttributeEntry, FormEvidence, IframeEvidence, InputEvidence,
    RemovedEntry, ScriptEvidence, TextEntry, UrlChange,
};
use url::Url;

use crate::config::CollectorConfig;
use crate::dom::{ElementNode, MutationRecord, Node};
use crate::window::EvidenceWindow;

pub use selector::{css_escape, selector_for};
pub use snippet::{sanitize_snippet, truncate};

/// Tags always worth capturing when added or removed
pub const INTERESTING_TAGS: &[&str] = &[
    "script", "iframe", "object", "embed", "link", "form", "input", "textarea", "select",
    "button", "img",
];

/// Attributes tracked on change (plus any `on*` handler)
pub const ATTRIBUTE_WATCH: &[&str] = &["src", "href", "action", "style", "data-src", "data-href"];

/// Descendant tags inspected during the bounded subtree scan
const SCAN_TAGS: &[&str] = &["script", "style", "iframe", "form"];

/// Attributes whose values may carry a URL
const URL_ATTRIBUTES: &[&str] = &["src", "href", "data-src", "data-href", "style"];

pub fn is_watched_attribute(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    ATTRIBUTE_WATCH.contains(&name.as_str()) || name.starts_with("on")
}

/// Added/removed nodes that get a diff entry.
pub fn should_capture(el: &ElementNode) -> bool {
    INTERESTING_TAGS.contains(&el.tag_name().as_str())
        || el.has_attr("src")
        || el.has_attr("href")
        || el.has_attr("action")
}

/// Matches `[src],[href],script,style,iframe,form`.
fn matches_scan(el: &ElementNode) -> bool {
    el.has_attr("src") || el.has_attr("href") || SCAN_TAGS.contains(&el.tag_name().as_str())
}

/// Work done for one batch, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: usize,
    pub refused: usize,
}

pub struct MutationCollector {
    config: CollectorConfig,
    page_url: Option<Url>,
    page_origin: Option<String>,
}

impl MutationCollector {
    pub fn new(config: CollectorConfig, page_url: &str) -> Self {
        let page_url = Url::parse(page_url).ok();
        let page_origin = page_url.as_ref().and_then(origin_of_url);
        Self {
            config,
            page_url,
            page_origin,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Fold one host batch into `window`.
    pub fn process_batch(&self, window: &mut EvidenceWindow, batch: &[MutationRecord]) -> BatchStats {
        let mut stats = BatchStats::default();
        for (idx, record) in batch.iter().enumerate() {
            if !window.admit_record() {
                stats.refused = batch.len() - idx;
                tracing::debug!(
                    refused = stats.refused,
                    seen = window.records_seen(),
                    "mutation window saturated"
                );
                break;
            }
            self.process_record(window, record);
            stats.processed += 1;
        }
        stats
    }

    fn process_record(&self, window: &mut EvidenceWindow, record: &MutationRecord) {
        match record {
            MutationRecord::ChildList { added, removed } => {
                for el in added.iter().filter_map(Node::as_element) {
                    window.counts.added += 1;
                    self.scan_node(window, el);
                    self.record_added(window, el);
                }
                for el in removed.iter().filter_map(Node::as_element) {
                    window.counts.removed += 1;
                    self.record_removed(window, el);
                }
            }
            MutationRecord::Attributes {
                target,
                name,
                old_value,
                new_value,
            } => {
                let Some(el) = target.as_element() else {
                    return;
                };
                if !is_watched_attribute(name) {
                    return;
                }
                window.counts.attributes += 1;
                self.record_attribute_change(
                    window,
                    el,
                    &name.to_ascii_lowercase(),
                    old_value.as_deref(),
                    new_value.as_deref(),
                );
            }
            MutationRecord::CharacterData {
                parent,
                old_value,
                data,
            } => {
                window.counts.text += 1;
                if let Some(parent) = parent {
                    self.record_text_change(window, parent, old_value.as_deref(), data);
                }
            }
        }
    }

    /// Structural signals from an added root and a bounded slice of its subtree.
    fn scan_node(&self, window: &mut EvidenceWindow, root: &ElementNode) {
        self.check_element(window, root, true);
        for child in root
            .descendants
            .iter()
            .filter(|d| matches_scan(d))
            .take(self.config.max_descendants)
        {
            self.check_element(window, child, false);
        }
    }

    fn check_element(&self, window: &mut EvidenceWindow, el: &ElementNode, track_tag: bool) {
        if track_tag {
            window.track_tag(&el.tag);
        }

        if el.is("script") {
            window.evidence.script_adds += 1;
            match el.attr("src").filter(|s| !s.is_empty()) {
                Some(src) => window.record_url(src),
                None if !el.text_content.trim().is_empty() => window.evidence.inline_scripts += 1,
                None => {}
            }
        }
        if el.is("iframe") {
            window.evidence.iframe_adds += 1;
        }
        if el.is("form") {
            window.evidence.form_adds += 1;
        }

        for attr in URL_ATTRIBUTES {
            let Some(value) = el.attr(attr) else {
                continue;
            };
            if *attr == "style" {
                for url in snippet::style_urls(value) {
                    window.record_url(&url);
                }
            } else {
                window.record_url(value);
            }
        }

        let handlers = el.attribute_names().filter(|n| n.starts_with("on")).count();
        window.evidence.inline_handlers += handlers as u64;
    }

    fn snippet(&self, el: &ElementNode) -> String {
        sanitize_snippet(&el.outer_html, self.config.max_snippet_length)
    }

    fn truncate(&self, value: Option<&str>, attribute: &str) -> String {
        snippet::safe_attribute_value(attribute, value, self.config.max_snippet_length)
    }

    fn origin_and_kind(&self, value: &str) -> (String, domsentry_core::OriginKind) {
        let origin = origin_of(value, self.page_url.as_ref());
        let kind = classify_origin(origin.as_deref(), self.page_origin.as_deref());
        (origin.unwrap_or_default(), kind)
    }

    fn record_added(&self, window: &mut EvidenceWindow, el: &ElementNode) {
        if !should_capture(el) {
            return;
        }
        let tag = el.tag_name();
        let selector = selector_for(el);

        window.push_added(AddedEntry {
            tag: tag.clone(),
            selector: selector.clone(),
            snippet: self.snippet(el),
            src: el.attr_or_empty("src"),
            href: el.attr_or_empty("href"),
            action: el.attr_or_empty("action"),
            input_type: el.attr_or_empty("type"),
        });

        match tag.as_str() {
            "script" => {
                let src = el.attr_or_empty("src");
                let (origin, origin_kind) = self.origin_and_kind(&src);
                window.push_script(ScriptEvidence {
                    selector,
                    inline: src.is_empty(),
                    src,
                    origin,
                    origin_kind,
                });
            }
            "iframe" => {
                let src = el.attr_or_empty("src");
                let (origin, origin_kind) = self.origin_and_kind(&src);
                window.push_iframe(IframeEvidence {
                    selector,
                    src,
                    origin,
                    origin_kind,
                });
            }
            "form" => {
                window.push_form(FormEvidence {
                    selector,
                    action: el.attr_or_empty("action"),
                });
            }
            "input" => {
                let input_type = el
                    .attr("type")
                    .filter(|t| !t.is_empty())
                    .unwrap_or("text")
                    .to_ascii_lowercase();
                window.push_input(InputEvidence {
                    selector,
                    input_type,
                    name: el.attr_or_empty("name"),
                });
            }
            _ => {}
        }
    }

    fn record_removed(&self, window: &mut EvidenceWindow, el: &ElementNode) {
        if !should_capture(el) {
            return;
        }
        window.push_removed(RemovedEntry {
            tag: el.tag_name(),
            selector: selector_for(el),
            snippet: self.snippet(el),
        });
    }

    fn record_attribute_change(
        &self,
        window: &mut EvidenceWindow,
        target: &ElementNode,
        name: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) {
        let safe_old = self.truncate(old_value, name);
        let safe_new = self.truncate(new_value, name);
        let selector = selector_for(target);
        let tag = target.tag_name();

        match name {
            "href" => window.evidence.link_changes += 1,
            "src" => window.evidence.src_changes += 1,
            "action" => window.evidence.action_changes += 1,
            _ => {}
        }

        if name.starts_with("on") {
            window.evidence.inline_handlers += 1;
            window.security.inline_handlers += 1;
        }

        if matches!(name, "src" | "href" | "data-src" | "data-href") {
            let raw = new_value.unwrap_or_default();
            window.record_url(raw);
            let (origin, origin_kind) = self.origin_and_kind(raw);
            window.push_url_change(UrlChange {
                tag: tag.clone(),
                attribute: name.to_string(),
                selector: selector.clone(),
                old_value: safe_old.clone(),
                new_value: safe_new.clone(),
                origin,
                origin_kind,
            });
        }

        if name == "style" {
            for url in snippet::style_urls(new_value.unwrap_or_default()) {
                window.record_url(&url);
            }
        }

        if name == "action" {
            window.push_action_change(ActionChange {
                selector: selector.clone(),
                old_value: safe_old.clone(),
                new_value: safe_new.clone(),
            });
        }

        window.push_attribute(AttributeEntry {
            selector,
            tag,
            attribute: name.to_string(),
            old_value: safe_old,
            new_value: safe_new,
        });
    }

    /// Only executable or styling text is interesting: a payload smuggled in
    /// as a text mutation of an existing script/style element.
    fn record_text_change(
        &self,
        window: &mut EvidenceWindow,
        parent: &ElementNode,
        old_value: Option<&str>,
        data: &str,
    ) {
        if parent.content_editable {
            return;
        }
        if !(parent.is("script") || parent.is("style")) {
            return;
        }
        let limit = self.config.max_snippet_length;
        window.push_text(TextEntry {
            selector: selector_for(parent),
            old_value: truncate(old_value.unwrap_or_default(), limit),
            new_value: truncate(data, limit),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::AncestorRef;
    use crate::window::WindowLimits;
    use domsentry_core::OriginKind;

    const PAGE: &str = "https://example.com/index.html";

    fn collector() -> MutationCollector {
        MutationCollector::new(CollectorConfig::default(), PAGE)
    }

    fn window() -> EvidenceWindow {
        EvidenceWindow::new(WindowLimits::default())
    }

    fn added(nodes: Vec<Node>) -> MutationRecord {
        MutationRecord::ChildList {
            added: nodes,
            removed: vec![],
        }
    }

    fn attr_change(el: ElementNode, name: &str, old: &str, new: &str) -> MutationRecord {
        MutationRecord::Attributes {
            target: el.into_node(),
            name: name.to_string(),
            old_value: Some(old.to_string()),
            new_value: Some(new.to_string()),
        }
    }

    #[test]
    fn test_counts_only_element_nodes() {
        let c = collector();
        let mut w = window();
        let batch = vec![
            MutationRecord::ChildList {
                added: vec![
                    ElementNode::new("div").into_node(),
                    Node::Text {
                        data: "hi".to_string(),
                    },
                    ElementNode::new("span").into_node(),
                ],
                removed: vec![ElementNode::new("p").into_node(), Node::Other],
            },
        ];
        let stats = c.process_batch(&mut w, &batch);
        assert_eq!(stats.processed, 1);
        assert_eq!(w.counts.added, 2);
        assert_eq!(w.counts.removed, 1);
        // div/span/p are not interesting and carry no src/href/action
        assert!(w.diff.added.is_empty());
        assert!(w.diff.removed.is_empty());
    }

    #[test]
    fn test_external_script_injection() {
        let c = collector();
        let mut w = window();
        let script = ElementNode::new("script")
            .with_attr("src", "https://cdn.evil.test/x.js")
            .with_html(r#"<script src="https://cdn.evil.test/x.js"></script>"#)
            .with_ancestor(AncestorRef::new("head"));
        c.process_batch(&mut w, &[added(vec![script.into_node()])]);

        assert_eq!(w.evidence.script_adds, 1);
        assert_eq!(w.evidence.inline_scripts, 0);
        assert_eq!(w.diff.added.len(), 1);
        assert_eq!(w.diff.added[0].selector, "head > script");
        let s = &w.security.scripts[0];
        assert!(!s.inline);
        assert_eq!(s.origin, "https://cdn.evil.test");
        assert_eq!(s.origin_kind, OriginKind::External);
        assert_eq!(w.tag_counts.get("script"), Some(&1));
    }

    #[test]
    fn test_inline_script_and_extension_url() {
        let c = collector();
        let mut w = window();
        let inline = ElementNode::new("script").with_text("alert(1)");
        let ext = ElementNode::new("script").with_attr("src", "moz-extension://abc-123/inject.js");
        c.process_batch(&mut w, &[added(vec![inline.into_node(), ext.into_node()])]);

        assert_eq!(w.evidence.script_adds, 2);
        assert_eq!(w.evidence.inline_scripts, 1);
        assert_eq!(w.evidence.extension_urls, vec!["moz-extension://abc-123/inject.js"]);
        assert!(w.security.scripts[0].inline);
        assert_eq!(w.security.scripts[1].origin_kind, OriginKind::Extension);
    }

    #[test]
    fn test_descendant_scan_is_bounded() {
        let mut cfg = CollectorConfig::default();
        cfg.max_descendants = 5;
        let c = MutationCollector::new(cfg, PAGE);
        let mut w = window();

        let mut root = ElementNode::new("div");
        for _ in 0..20 {
            root = root.with_descendant(ElementNode::new("iframe"));
        }
        root = root.with_descendant(ElementNode::new("span"));
        c.process_batch(&mut w, &[added(vec![root.into_node()])]);

        assert_eq!(w.evidence.iframe_adds, 5);
        // only the root is tag-tracked
        assert_eq!(w.tag_counts.len(), 1);
    }

    #[test]
    fn test_descendant_extension_style_url() {
        let c = collector();
        let mut w = window();
        let root = ElementNode::new("div").with_descendant(
            ElementNode::new("div")
                .with_attr("href", "#")
                .with_attr("style", "background:url(chrome-extension://zzz/bg.png)"),
        );
        c.process_batch(&mut w, &[added(vec![root.into_node()])]);
        assert_eq!(w.evidence.extension_urls, vec!["chrome-extension://zzz/bg.png"]);
    }

    #[test]
    fn test_form_and_input_evidence() {
        let c = collector();
        let mut w = window();
        let form = ElementNode::new("form").with_attr("action", "https://phish.test/collect");
        let input = ElementNode::new("input")
            .with_attr("type", "PASSWORD")
            .with_attr("name", "pw")
            .with_attr("value", "hunter2")
            .with_html(r#"<input type="PASSWORD" name="pw" value="hunter2">"#);
        c.process_batch(&mut w, &[added(vec![form.into_node(), input.into_node()])]);

        assert_eq!(w.evidence.form_adds, 1);
        assert_eq!(w.security.forms[0].action, "https://phish.test/collect");
        assert_eq!(w.security.inputs[0].input_type, "password");
        assert_eq!(w.security.inputs[0].name, "pw");
        assert!(!w.diff.added[1].snippet.contains("hunter2"));
    }

    #[test]
    fn test_input_type_defaults_to_text() {
        let c = collector();
        let mut w = window();
        c.process_batch(&mut w, &[added(vec![ElementNode::new("input").into_node()])]);
        assert_eq!(w.security.inputs[0].input_type, "text");
    }

    #[test]
    fn test_inline_handlers_on_added_nodes() {
        let c = collector();
        let mut w = window();
        let el = ElementNode::new("img")
            .with_attr("src", "/a.png")
            .with_attr("onerror", "steal()")
            .with_attr("onload", "x()");
        c.process_batch(&mut w, &[added(vec![el.into_node()])]);
        assert_eq!(w.evidence.inline_handlers, 2);
        // handlers on added nodes are structural evidence only
        assert_eq!(w.security.inline_handlers, 0);
    }

    #[test]
    fn test_removed_nodes_captured() {
        let c = collector();
        let mut w = window();
        let batch = vec![MutationRecord::ChildList {
            added: vec![],
            removed: vec![
                ElementNode::new("iframe").with_id("ad").into_node(),
                ElementNode::new("div").into_node(),
            ],
        }];
        c.process_batch(&mut w, &batch);
        assert_eq!(w.counts.removed, 2);
        assert_eq!(w.diff.removed.len(), 1);
        assert_eq!(w.diff.removed[0].selector, "#ad");
    }

    #[test]
    fn test_unwatched_attributes_ignored() {
        let c = collector();
        let mut w = window();
        let batch = vec![
            attr_change(ElementNode::new("div"), "class", "a", "b"),
            attr_change(ElementNode::new("div"), "aria-hidden", "true", "false"),
            MutationRecord::Attributes {
                target: Node::Other,
                name: "src".to_string(),
                old_value: None,
                new_value: None,
            },
        ];
        c.process_batch(&mut w, &batch);
        assert_eq!(w.counts.attributes, 0);
        assert!(w.diff.attributes.is_empty());
    }

    #[test]
    fn test_link_change_records_url_change() {
        let c = collector();
        let mut w = window();
        let batch = vec![attr_change(
            ElementNode::new("a").with_id("buy"),
            "href",
            "/checkout",
            "https://affiliate.test/?ref=1",
        )];
        c.process_batch(&mut w, &batch);

        assert_eq!(w.counts.attributes, 1);
        assert_eq!(w.evidence.link_changes, 1);
        let change = &w.security.url_changes[0];
        assert_eq!(change.attribute, "href");
        assert_eq!(change.old_value, "/checkout");
        assert_eq!(change.origin, "https://affiliate.test");
        assert_eq!(change.origin_kind, OriginKind::External);
        assert_eq!(w.diff.attributes[0].selector, "#buy");
    }

    #[test]
    fn test_same_page_src_change() {
        let c = collector();
        let mut w = window();
        c.process_batch(
            &mut w,
            &[attr_change(ElementNode::new("img"), "src", "/a.png", "/b.png")],
        );
        assert_eq!(w.evidence.src_changes, 1);
        assert_eq!(w.security.url_changes[0].origin_kind, OriginKind::Page);
    }

    #[test]
    fn test_action_and_handler_changes() {
        let c = collector();
        let mut w = window();
        let batch = vec![
            attr_change(ElementNode::new("form"), "action", "/login", "https://x.test/"),
            attr_change(ElementNode::new("button"), "onclick", "", "go()"),
        ];
        c.process_batch(&mut w, &batch);
        assert_eq!(w.evidence.action_changes, 1);
        assert_eq!(w.security.action_changes.len(), 1);
        assert_eq!(w.evidence.inline_handlers, 1);
        assert_eq!(w.security.inline_handlers, 1);
        assert_eq!(w.diff.attributes.len(), 2);
    }

    #[test]
    fn test_text_changes_only_for_script_and_style() {
        let c = collector();
        let mut w = window();
        let batch = vec![
            MutationRecord::CharacterData {
                parent: Some(ElementNode::new("script")),
                old_value: Some("var a = 1".to_string()),
                data: "fetch('//evil.test')".to_string(),
            },
            MutationRecord::CharacterData {
                parent: Some(ElementNode::new("p")),
                old_value: None,
                data: "hello".to_string(),
            },
            MutationRecord::CharacterData {
                parent: Some(ElementNode {
                    content_editable: true,
                    ..ElementNode::new("style")
                }),
                old_value: None,
                data: "a{}".to_string(),
            },
            MutationRecord::CharacterData {
                parent: None,
                old_value: None,
                data: String::new(),
            },
        ];
        c.process_batch(&mut w, &batch);
        assert_eq!(w.counts.text, 4);
        assert_eq!(w.diff.text.len(), 1);
        assert_eq!(w.diff.text[0].new_value, "fetch('//evil.test')");
    }

    #[test]
    fn test_diff_overflow_beyond_ceiling() {
        let c = collector();
        let mut w = window();
        let nodes: Vec<Node> = (0..35).map(|_| ElementNode::new("img").into_node()).collect();
        c.process_batch(&mut w, &[added(nodes)]);
        assert_eq!(w.counts.added, 35);
        assert_eq!(w.diff.added.len(), 30);
        assert_eq!(w.diff.overflow.added, 5);
    }

    #[test]
    fn test_record_ceiling_single_overflow_marker() {
        let c = collector();
        let mut w = window();
        let batch: Vec<MutationRecord> = (0..3001)
            .map(|_| attr_change(ElementNode::new("img"), "src", "/a.png", "/b.png"))
            .collect();

        let stats = c.process_batch(&mut w, &batch);
        assert_eq!(stats.processed, 3000);
        assert_eq!(stats.refused, 1);
        assert_eq!(w.counts.attributes, 3000);
        assert_eq!(w.diff.overflow.added, 1);

        // a later batch in the same window is refused without another marker
        let stats = c.process_batch(&mut w, &batch[..10]);
        assert_eq!(stats.processed, 0);
        assert_eq!(w.counts.attributes, 3000);
        assert_eq!(w.diff.overflow.added, 1);
    }
}

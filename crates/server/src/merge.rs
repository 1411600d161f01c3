// Alert merge rules. Two alerts for the same URL close together in time
// collapse into one log entry.

use domsentry_core::alert::dedup_in_order;
use domsentry_core::limits::{
    truncate_counted, MAX_ALERTS, MAX_EXPORTED_EXTENSION_URLS, MAX_REASONS, MERGED_DIFF_CAP,
};
use domsentry_core::{Alert, Diff, DiffOverflow, EvidenceSummary, Security, SecurityOverflow};

/// Alerts for the same URL closer than this are merged.
pub const MATCH_WINDOW_MS: i64 = 30_000;

/// Index of the most recent alert `incoming` should merge into.
pub fn find_mergeable(log: &[Alert], incoming: &Alert) -> Option<usize> {
    log.iter().position(|existing| {
        existing.url == incoming.url
            && incoming.timestamp.abs_diff(existing.timestamp) < MATCH_WINDOW_MS as u64
    })
}

/// Fold `incoming` into `prev`. The predecessor's id survives; every other
/// scalar comes from the newer record.
pub fn merge_alerts(prev: &Alert, incoming: &Alert) -> Alert {
    let mut reasons: Vec<String> = prev.reasons.iter().chain(&incoming.reasons).cloned().collect();
    dedup_in_order(&mut reasons);
    reasons.truncate(MAX_REASONS);

    let mut source_extensions = prev.source_extensions.clone();
    for source in &incoming.source_extensions {
        match source_extensions.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source.clone(),
            None => source_extensions.push(source.clone()),
        }
    }

    let top_tags = if incoming.top_tags.is_empty() {
        prev.top_tags.clone()
    } else {
        incoming.top_tags.clone()
    };

    Alert {
        id: prev.id.clone(),
        url: incoming.url.clone(),
        hostname: incoming.hostname.clone(),
        title: incoming.title.clone(),
        timestamp: incoming.timestamp,
        level: prev.level.max(incoming.level),
        reasons,
        counts: prev.counts.sum(&incoming.counts),
        top_tags,
        evidence: merge_evidence(&prev.evidence, &incoming.evidence),
        diff: merge_diff(&prev.diff, &incoming.diff),
        security: merge_security(&prev.security, &incoming.security),
        source_extensions,
    }
}

fn merge_evidence(prev: &EvidenceSummary, incoming: &EvidenceSummary) -> EvidenceSummary {
    let mut extension_urls: Vec<String> = prev
        .extension_urls
        .iter()
        .chain(&incoming.extension_urls)
        .cloned()
        .collect();
    dedup_in_order(&mut extension_urls);
    extension_urls.truncate(MAX_EXPORTED_EXTENSION_URLS);

    EvidenceSummary {
        extension_urls,
        script_adds: prev.script_adds.saturating_add(incoming.script_adds),
        inline_scripts: prev.inline_scripts.saturating_add(incoming.inline_scripts),
        inline_handlers: prev.inline_handlers.saturating_add(incoming.inline_handlers),
        iframe_adds: prev.iframe_adds.saturating_add(incoming.iframe_adds),
        form_adds: prev.form_adds.saturating_add(incoming.form_adds),
        link_changes: prev.link_changes.saturating_add(incoming.link_changes),
        src_changes: prev.src_changes.saturating_add(incoming.src_changes),
        action_changes: prev.action_changes.saturating_add(incoming.action_changes),
    }
}

fn concat<T: Clone>(a: &[T], b: &[T]) -> Vec<T> {
    a.iter().chain(b).cloned().collect()
}

fn merge_diff(prev: &Diff, incoming: &Diff) -> Diff {
    let (p, n) = (&prev.overflow, &incoming.overflow);
    let mut diff = Diff {
        added: concat(&prev.added, &incoming.added),
        removed: concat(&prev.removed, &incoming.removed),
        attributes: concat(&prev.attributes, &incoming.attributes),
        text: concat(&prev.text, &incoming.text),
        overflow: DiffOverflow {
            added: p.added.saturating_add(n.added),
            removed: p.removed.saturating_add(n.removed),
            attributes: p.attributes.saturating_add(n.attributes),
            text: p.text.saturating_add(n.text),
        },
    };
    diff.recap(MERGED_DIFF_CAP);
    diff
}

fn merge_security(prev: &Security, incoming: &Security) -> Security {
    let (p, n) = (&prev.overflow, &incoming.overflow);
    let mut security = Security {
        scripts: concat(&prev.scripts, &incoming.scripts),
        iframes: concat(&prev.iframes, &incoming.iframes),
        forms: concat(&prev.forms, &incoming.forms),
        inputs: concat(&prev.inputs, &incoming.inputs),
        url_changes: concat(&prev.url_changes, &incoming.url_changes),
        action_changes: concat(&prev.action_changes, &incoming.action_changes),
        inline_handlers: prev.inline_handlers.saturating_add(incoming.inline_handlers),
        overflow: SecurityOverflow {
            scripts: p.scripts.saturating_add(n.scripts),
            iframes: p.iframes.saturating_add(n.iframes),
            forms: p.forms.saturating_add(n.forms),
            inputs: p.inputs.saturating_add(n.inputs),
            url_changes: p.url_changes.saturating_add(n.url_changes),
            action_changes: p.action_changes.saturating_add(n.action_changes),
        },
    };
    security.recap();
    security
}

/// Merge `incoming` into its predecessor (moving it to the front) or
/// prepend it, then enforce the log ceiling. Returns true on merge.
pub fn insert_alert(log: &mut Vec<Alert>, incoming: Alert) -> bool {
    let merged = match find_mergeable(log, &incoming) {
        Some(idx) => {
            let prev = log.remove(idx);
            log.insert(0, merge_alerts(&prev, &incoming));
            true
        }
        None => {
            log.insert(0, incoming);
            false
        }
    };
    let dropped = truncate_counted(log, MAX_ALERTS);
    if dropped > 0 {
        tracing::debug!(dropped, "alert log trimmed");
    }
    merged
}

//! Collector configuration with env var overrides.
//! All times in milliseconds. All limits are per observation window.
//! Designed for bounded evidence collection on pathological pages.

/// Ceilings and timings for one monitored document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Trailing debounce: flush once no batch arrived for this long
    pub quiet_window_ms: i64,
    /// Minimum gap between two non-high alerts from the same document
    pub min_report_interval_ms: i64,
    /// Grace period after load completion
    pub settle_after_load_ms: i64,
    /// added + removed at or above this appends the volume reason
    pub change_threshold: u64,
    /// Descendants inspected per added root
    pub max_descendants: usize,
    /// Diff entries per category
    pub max_detail_entries: usize,
    /// Characters kept in snippets and attribute values
    pub max_snippet_length: usize,
    /// Raw records processed before the window saturates
    pub max_mutations_per_window: usize,
    /// Security items per category
    pub max_security_items: usize,
    /// Distinct extension URLs remembered in one window
    pub max_extension_urls: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: 1500,
            min_report_interval_ms: 10_000,
            settle_after_load_ms: 2000,
            change_threshold: 25,
            max_descendants: 50,
            max_detail_entries: 30,
            max_snippet_length: 220,
            max_mutations_per_window: 3000,
            max_security_items: 20,
            max_extension_urls: 10,
        }
    }
}

impl CollectorConfig {
    /// Defaults, overridden by `DOMSENTRY_<SETTING>` env vars.
    /// Unparseable values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit lookup, so
    /// overrides can be exercised without touching the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        override_with(&lookup, "QUIET_WINDOW_MS", &mut cfg.quiet_window_ms);
        override_with(
            &lookup,
            "MIN_REPORT_INTERVAL_MS",
            &mut cfg.min_report_interval_ms,
        );
        override_with(&lookup, "SETTLE_AFTER_LOAD_MS", &mut cfg.settle_after_load_ms);
        override_with(&lookup, "CHANGE_THRESHOLD", &mut cfg.change_threshold);
        override_with(&lookup, "MAX_DESCENDANTS", &mut cfg.max_descendants);
        override_with(&lookup, "MAX_DETAIL_ENTRIES", &mut cfg.max_detail_entries);
        override_with(&lookup, "MAX_SNIPPET_LENGTH", &mut cfg.max_snippet_length);
        override_with(
            &lookup,
            "MAX_MUTATIONS_PER_WINDOW",
            &mut cfg.max_mutations_per_window,
        );
        override_with(&lookup, "MAX_SECURITY_ITEMS", &mut cfg.max_security_items);
        override_with(&lookup, "MAX_EXTENSION_URLS", &mut cfg.max_extension_urls);

        cfg
    }
}

fn override_with<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    setting: &str,
    slot: &mut T,
) {
    let key = format!("DOMSENTRY_{}", setting);
    if let Some(value) = lookup(&key).and_then(|raw| raw.trim().parse().ok()) {
        *slot = value;
    }
}

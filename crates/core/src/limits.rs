//! List ceilings shared by the collector and the merge engine.
//!
//! Every capped list in an alert pairs with an overflow counter, so a
//! ceiling never hides that something was dropped.

/// Reasons kept on one alert.
pub const MAX_REASONS: usize = 6;

/// Entries in the "top tags" summary.
pub const MAX_TOP_TAGS: usize = 3;

/// Extension-origin URLs exported on one alert.
pub const MAX_EXPORTED_EXTENSION_URLS: usize = 3;

/// Diff entries per category in a merged (persisted) alert.
pub const MERGED_DIFF_CAP: usize = 40;

/// Script entries in a merged alert.
pub const MERGED_SCRIPT_CAP: usize = 20;

/// Every other security category in a merged alert.
pub const MERGED_SECURITY_CAP: usize = 10;

/// Alerts kept in the persisted log.
pub const MAX_ALERTS: usize = 50;

/// Append `item` if there is room, otherwise count it as overflow.
pub fn push_capped<T>(list: &mut Vec<T>, overflow: &mut u64, cap: usize, item: T) {
    if list.len() < cap {
        list.push(item);
    } else {
        *overflow = overflow.saturating_add(1);
    }
}

/// Truncate `list` to `cap`, returning how many entries were dropped.
pub fn truncate_counted<T>(list: &mut Vec<T>, cap: usize) -> u64 {
    if list.len() <= cap {
        return 0;
    }
    let dropped = list.len() - cap;
    list.truncate(cap);
    dropped as u64
}

/// Truncate `list` to `cap` and add the dropped count to `overflow`.
pub fn recap_into<T>(list: &mut Vec<T>, overflow: &mut u64, cap: usize) {
    *overflow = overflow.saturating_add(truncate_counted(list, cap));
}

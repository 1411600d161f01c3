//! Flush Gate: trailing debounce plus the report/discard decision.
//!
//! Times are milliseconds on a single clock chosen by the caller (the
//! session driver uses Unix millis). The gate never looks at a clock itself.

use domsentry_core::limits::MAX_TOP_TAGS;
use domsentry_core::{Alert, Level};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::classifier::{classify, Classification};
use crate::config::CollectorConfig;
use crate::window::EvidenceWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Pending { deadline: i64 },
}

/// Identity of the monitored document, copied into every alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    pub hostname: String,
    pub title: String,
}

impl PageInfo {
    /// Hostname is derived from `url`; an empty title falls back to it.
    pub fn new(url: &str, title: &str) -> Self {
        let hostname = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let title = if title.trim().is_empty() {
            hostname.clone()
        } else {
            title.to_string()
        };
        Self {
            url: url.to_string(),
            hostname,
            title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    Empty,
    Unsettled,
    LowSeverity,
    NoSecurityImpact,
    RateLimited,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::Empty => "empty",
            DiscardReason::Unsettled => "unsettled",
            DiscardReason::LowSeverity => "low_severity",
            DiscardReason::NoSecurityImpact => "no_security_impact",
            DiscardReason::RateLimited => "rate_limited",
        }
    }
}

#[derive(Debug, Clone)]
pub enum FlushDecision {
    Emit(Alert),
    Discard(DiscardReason),
}

impl FlushDecision {
    pub fn is_emit(&self) -> bool {
        matches!(self, FlushDecision::Emit(_))
    }

    pub fn alert(&self) -> Option<&Alert> {
        match self {
            FlushDecision::Emit(alert) => Some(alert),
            FlushDecision::Discard(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlushGate {
    quiet_window_ms: i64,
    settle_after_load_ms: i64,
    min_report_interval_ms: i64,
    change_threshold: u64,
    state: GateState,
    settled_at: Option<i64>,
    last_report: Option<i64>,
}

impl FlushGate {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            quiet_window_ms: config.quiet_window_ms,
            settle_after_load_ms: config.settle_after_load_ms,
            min_report_interval_ms: config.min_report_interval_ms,
            change_threshold: config.change_threshold,
            state: GateState::Idle,
            settled_at: None,
            last_report: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Arm or re-arm the debounce. Returns the new deadline.
    pub fn on_batch(&mut self, now: i64) -> i64 {
        let deadline = now + self.quiet_window_ms;
        self.state = GateState::Pending { deadline };
        deadline
    }

    pub fn on_load_complete(&mut self, now: i64) {
        self.settled_at = Some(now + self.settle_after_load_ms);
    }

    pub fn is_settled(&self, now: i64) -> bool {
        self.settled_at.is_some_and(|at| now >= at)
    }

    pub fn deadline(&self) -> Option<i64> {
        match self.state {
            GateState::Pending { deadline } => Some(deadline),
            GateState::Idle => None,
        }
    }

    pub fn due(&self, now: i64) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    pub fn cancel(&mut self) {
        self.state = GateState::Idle;
    }

    pub fn last_report(&self) -> Option<i64> {
        self.last_report
    }

    /// Decide the fate of `window`. The window is always reset afterwards.
    pub fn evaluate(&mut self, window: &mut EvidenceWindow, page: &PageInfo, now: i64) -> FlushDecision {
        self.state = GateState::Idle;
        let classification = classify(window, self.change_threshold);

        let decision = match self.check(window, &classification, now) {
            Err(reason) => {
                tracing::debug!(
                    url = %page.url,
                    level = %classification.level,
                    reason = reason.as_str(),
                    "window discarded"
                );
                FlushDecision::Discard(reason)
            }
            Ok(()) => {
                self.last_report = Some(now);
                FlushDecision::Emit(build_alert(window, classification, page, now))
            }
        };

        window.reset();
        decision
    }

    fn check(
        &self,
        window: &EvidenceWindow,
        classification: &Classification,
        now: i64,
    ) -> Result<(), DiscardReason> {
        let high = classification.level == Level::High;

        if window.total() == 0 && !window.has_extension_urls() {
            return Err(DiscardReason::Empty);
        }
        if !self.is_settled(now) && !high {
            return Err(DiscardReason::Unsettled);
        }
        if classification.level == Level::Low {
            return Err(DiscardReason::LowSeverity);
        }
        if !window.has_security_impact() && !high {
            return Err(DiscardReason::NoSecurityImpact);
        }
        if !high {
            if let Some(last) = self.last_report {
                if now - last < self.min_report_interval_ms {
                    return Err(DiscardReason::RateLimited);
                }
            }
        }
        Ok(())
    }
}

fn build_alert(
    window: &mut EvidenceWindow,
    classification: Classification,
    page: &PageInfo,
    now: i64,
) -> Alert {
    Alert {
        url: page.url.clone(),
        hostname: page.hostname.clone(),
        title: page.title.clone(),
        timestamp: now,
        level: classification.level,
        reasons: classification.reasons,
        counts: window.counts,
        top_tags: window.top_tags(MAX_TOP_TAGS),
        evidence: window.evidence_summary(),
        diff: std::mem::take(&mut window.diff),
        security: std::mem::take(&mut window.security),
        ..Default::default()
    }
}

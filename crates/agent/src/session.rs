//! Observation session for one monitored document.
//!
//! `PageObserver` is the single owner of the Evidence Window. The host feeds
//! it events one at a time; `run_observer` is the async driver that turns a
//! channel of host events plus the debounce deadline into those calls.

use std::sync::Arc;
use std::time::Duration;

use domsentry_core::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::CollectorConfig;
use crate::dom::MutationBatch;
use crate::flush_gate::{FlushDecision, FlushGate, PageInfo};
use crate::sensors::MutationCollector;
use crate::sink::AlertSink;
use crate::window::{EvidenceWindow, WindowLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// What the host pushes into a running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    Visibility { state: Visibility },
    LoadComplete,
    Mutations { batch: MutationBatch },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverStats {
    pub batches: u64,
    pub dropped_batches: u64,
    pub records_processed: u64,
    pub alerts_emitted: u64,
    pub windows_discarded: u64,
    pub send_failures: u64,
}

pub struct PageObserver {
    collector: MutationCollector,
    window: EvidenceWindow,
    gate: FlushGate,
    page: PageInfo,
    sink: Arc<dyn AlertSink>,
    attached: bool,
    stats: ObserverStats,
}

impl PageObserver {
    /// Starts detached; the host reports visibility before anything else.
    pub fn new(config: CollectorConfig, page: PageInfo, sink: Arc<dyn AlertSink>) -> Self {
        let window = EvidenceWindow::new(WindowLimits::from(&config));
        let gate = FlushGate::new(&config);
        let collector = MutationCollector::new(config, &page.url);
        Self {
            collector,
            window,
            gate,
            page,
            sink,
            attached: false,
            stats: ObserverStats::default(),
        }
    }

    pub fn page(&self) -> &PageInfo {
        &self.page
    }

    pub fn window(&self) -> &EvidenceWindow {
        &self.window
    }

    pub fn gate(&self) -> &FlushGate {
        &self.gate
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn stats(&self) -> ObserverStats {
        self.stats
    }

    pub fn deadline(&self) -> Option<i64> {
        self.gate.deadline()
    }

    /// Hidden: cancel the pending flush and stop listening. Visible: start
    /// over with an empty window.
    pub fn on_visibility(&mut self, state: Visibility, _now: i64) {
        match state {
            Visibility::Visible => {
                self.window.reset();
                self.attached = true;
            }
            Visibility::Hidden => {
                self.gate.cancel();
                self.attached = false;
            }
        }
        tracing::debug!(url = %self.page.url, ?state, "visibility changed");
    }

    pub fn on_load_complete(&mut self, now: i64) {
        self.gate.on_load_complete(now);
    }

    pub fn on_mutations(&mut self, batch: &[crate::dom::MutationRecord], now: i64) {
        if !self.attached {
            self.stats.dropped_batches += 1;
            return;
        }
        let batch_stats = self.collector.process_batch(&mut self.window, batch);
        self.stats.batches += 1;
        self.stats.records_processed += batch_stats.processed as u64;
        self.gate.on_batch(now);
    }

    /// Flush if the debounce deadline has passed.
    pub fn poll(&mut self, now: i64) -> Option<FlushDecision> {
        if !self.gate.due(now) {
            return None;
        }
        Some(self.flush(now))
    }

    /// Evaluate the window immediately and deliver any alert.
    pub fn flush(&mut self, now: i64) -> FlushDecision {
        let decision = self.gate.evaluate(&mut self.window, &self.page, now);
        match &decision {
            FlushDecision::Emit(alert) => {
                self.stats.alerts_emitted += 1;
                tracing::info!(url = %alert.url, level = %alert.level, "alert emitted");
                let sent = Message::page_mutation(alert)
                    .map_err(Into::into)
                    .and_then(|message| self.sink.send(message));
                if let Err(e) = sent {
                    self.stats.send_failures += 1;
                    tracing::debug!(error = %e, "alert send dropped");
                }
            }
            FlushDecision::Discard(_) => self.stats.windows_discarded += 1,
        }
        decision
    }
}

/// Wall-clock millis for a tokio instant, anchored at driver start.
struct Clock {
    start: Instant,
    start_ms: i64,
}

impl Clock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            start_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn now_ms(&self) -> i64 {
        self.start_ms + self.start.elapsed().as_millis() as i64
    }

    fn instant_at(&self, ms: i64) -> Instant {
        let offset = (ms - self.start_ms).max(0) as u64;
        self.start + Duration::from_millis(offset)
    }
}

/// Drive `observer` until the host side of the channel closes.
///
/// Waits on whichever comes first: the next host event or the debounce
/// deadline. Returns the observer so callers can inspect its final state.
pub async fn run_observer(
    mut observer: PageObserver,
    mut rx: mpsc::Receiver<HostEvent>,
) -> PageObserver {
    let clock = Clock::new();
    tracing::info!(url = %observer.page().url, "observer started");

    loop {
        let deadline = observer.deadline().map(|ms| clock.instant_at(ms));
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let now = clock.now_ms();
                match event {
                    HostEvent::Visibility { state } => observer.on_visibility(state, now),
                    HostEvent::LoadComplete => observer.on_load_complete(now),
                    HostEvent::Mutations { batch } => observer.on_mutations(&batch, now),
                }
            }
            _ = sleep_until_opt(deadline) => {
                let now = clock.now_ms();
                observer.poll(now);
            }
        }
    }

    let stats = observer.stats();
    tracing::info!(
        url = %observer.page().url,
        alerts = stats.alerts_emitted,
        discarded = stats.windows_discarded,
        "observer stopped"
    );
    observer
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// Alert Merge Engine service: the only writer of the persisted alert log.
//
// Every mutation is read-merge-write under the shared write lock; the merge
// is not idempotent under interleaving.

use domsentry_core::limits::MAX_ALERTS;
use domsentry_core::{Alert, Level};
use serde_json::Value;
use std::sync::Arc;

use crate::attribution::resolve_sources;
use crate::badge::BadgeCounters;
use crate::inventory::parse_inventory;
use crate::merge::insert_alert;
use crate::store::{read_or_none, KvStore, StoreError, WriteLock, ALERTS_KEY, EXTENSIONS_KEY};

/// What happened to one submitted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub id: String,
    pub level: Level,
    pub merged: bool,
    pub log_len: usize,
}

pub struct AlertLog {
    store: Arc<dyn KvStore>,
    lock: WriteLock,
    badge: Arc<BadgeCounters>,
}

impl AlertLog {
    pub fn new(store: Arc<dyn KvStore>, lock: WriteLock, badge: Arc<BadgeCounters>) -> Self {
        Self { store, lock, badge }
    }

    fn load_strict(&self) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .store
            .get(ALERTS_KEY)?
            .map(|v| Alert::normalize_list(&v))
            .unwrap_or_default())
    }

    fn persist(&self, alerts: &[Alert]) -> Result<(), StoreError> {
        self.store.set(ALERTS_KEY, serde_json::to_value(alerts)?)?;
        self.badge.set_alert_count(alerts.len());
        Ok(())
    }

    /// Normalize, attribute, then merge-or-prepend `payload`.
    ///
    /// A failed read aborts the write so a storage hiccup never truncates
    /// the persisted log.
    pub async fn add(&self, payload: &Value) -> Result<AddOutcome, StoreError> {
        let mut incoming = Alert::normalize(payload);

        let _guard = self.lock.lock().await;
        let inventory = parse_inventory(read_or_none(self.store.as_ref(), EXTENSIONS_KEY).as_ref());
        incoming.source_extensions = resolve_sources(&incoming.evidence.extension_urls, &inventory);

        let mut alerts = self.load_strict()?;
        let merged = insert_alert(&mut alerts, incoming);
        self.persist(&alerts)?;

        let head = &alerts[0];
        let outcome = AddOutcome {
            id: head.id.clone(),
            level: head.level,
            merged,
            log_len: alerts.len(),
        };
        tracing::info!(
            url = %head.url,
            level = %head.level,
            merged,
            sources = head.source_extensions.len(),
            "alert recorded"
        );
        Ok(outcome)
    }

    /// The persisted log, newest first. Empty on read failure.
    pub fn list(&self) -> Vec<Alert> {
        read_or_none(self.store.as_ref(), ALERTS_KEY)
            .map(|v| Alert::normalize_list(&v))
            .unwrap_or_default()
    }

    /// Overwrite the log (UI edits). Non-arrays clear it.
    pub async fn replace(&self, alerts: &Value) -> Result<usize, StoreError> {
        let mut next = Alert::normalize_list(alerts);
        next.truncate(MAX_ALERTS);
        let _guard = self.lock.lock().await;
        self.persist(&next)?;
        Ok(next.len())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.persist(&[])
    }

    pub fn count(&self) -> usize {
        self.list().len()
    }

    /// Publish the stored alert count to the badge.
    pub fn hydrate(&self) {
        self.badge.set_alert_count(self.count());
    }
}

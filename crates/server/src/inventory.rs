// Extension inventory: installed extensions keyed by id, with a "new since
// first sync" flag that drives the badge.

use domsentry_core::ExtensionRecord;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::badge::BadgeCounters;
use crate::store::{read_or_none, KvStore, StoreError, WriteLock, EXTENSIONS_KEY, INITIALIZED_KEY};

pub type InventoryMap = BTreeMap<String, ExtensionRecord>;

/// Lenient parse of the stored inventory map; bad entries are skipped.
pub fn parse_inventory(value: Option<&Value>) -> InventoryMap {
    let Some(entries) = value.and_then(Value::as_object) else {
        return InventoryMap::new();
    };
    entries
        .iter()
        .filter_map(|(id, raw)| {
            let mut record: ExtensionRecord = serde_json::from_value(raw.clone()).ok()?;
            if record.id.is_empty() {
                record.id = id.clone();
            }
            Some((id.clone(), record))
        })
        .collect()
}

pub fn count_new(entries: &InventoryMap) -> usize {
    entries.values().filter(|e| e.is_new).count()
}

pub struct Inventory {
    store: Arc<dyn KvStore>,
    lock: WriteLock,
    badge: Arc<BadgeCounters>,
    /// Our own id, never listed
    self_id: Option<String>,
}

impl Inventory {
    pub fn new(
        store: Arc<dyn KvStore>,
        lock: WriteLock,
        badge: Arc<BadgeCounters>,
        self_id: Option<String>,
    ) -> Self {
        Self {
            store,
            lock,
            badge,
            self_id,
        }
    }

    fn tracked(&self, ext: &ExtensionRecord) -> bool {
        ext.is_extension() && self.self_id.as_deref() != Some(ext.id.as_str())
    }

    fn load(&self) -> Result<(InventoryMap, bool), StoreError> {
        let entries = parse_inventory(self.store.get(EXTENSIONS_KEY)?.as_ref());
        let initialized = self
            .store
            .get(INITIALIZED_KEY)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok((entries, initialized))
    }

    fn save(&self, entries: &InventoryMap, initialized: bool) -> Result<(), StoreError> {
        self.store.set_many(vec![
            (EXTENSIONS_KEY.to_string(), serde_json::to_value(entries)?),
            (INITIALIZED_KEY.to_string(), Value::Bool(initialized)),
        ])?;
        self.badge.set_new_count(count_new(entries));
        Ok(())
    }

    /// Replace the inventory with `reported`. Before the first sync nothing
    /// is new; afterwards unseen ids are new and known ids keep their flag.
    pub async fn sync(&self, reported: Vec<ExtensionRecord>) -> Result<InventoryMap, StoreError> {
        let _guard = self.lock.lock().await;
        let (stored, initialized) = self.load()?;
        let now = chrono::Utc::now().timestamp_millis();

        let mut next = InventoryMap::new();
        for mut ext in reported.into_iter().filter(|e| self.tracked(e)) {
            ext.is_new = stored.get(&ext.id).map_or(initialized, |prev| prev.is_new);
            ext.last_seen = now;
            next.insert(ext.id.clone(), ext);
        }

        self.save(&next, true)?;
        tracing::info!(
            extensions = next.len(),
            new = count_new(&next),
            first_sync = !initialized,
            "inventory synced"
        );
        Ok(next)
    }

    /// Insert or refresh one extension. An existing entry keeps its flag.
    pub async fn upsert(&self, mut ext: ExtensionRecord, is_new: bool) -> Result<(), StoreError> {
        if !self.tracked(&ext) {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let (mut entries, _) = self.load()?;
        ext.is_new = entries.get(&ext.id).map_or(is_new, |prev| prev.is_new);
        ext.last_seen = chrono::Utc::now().timestamp_millis();
        entries.insert(ext.id.clone(), ext);
        self.save(&entries, true)
    }

    /// Returns whether anything was removed.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let (mut entries, initialized) = self.load()?;
        if entries.remove(id).is_none() {
            return Ok(false);
        }
        self.save(&entries, initialized)?;
        Ok(true)
    }

    pub async fn clear_new(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let (mut entries, _) = self.load()?;
        for ext in entries.values_mut() {
            ext.is_new = false;
        }
        self.save(&entries, true)
    }

    /// Entries sorted by name, and how many are new. Empty on read failure.
    pub fn list(&self) -> (Vec<ExtensionRecord>, usize) {
        let entries = parse_inventory(read_or_none(self.store.as_ref(), EXTENSIONS_KEY).as_ref());
        let new_count = count_new(&entries);
        let mut list: Vec<ExtensionRecord> = entries.into_values().collect();
        list.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        (list, new_count)
    }

    pub fn snapshot(&self) -> InventoryMap {
        parse_inventory(read_or_none(self.store.as_ref(), EXTENSIONS_KEY).as_ref())
    }

    pub fn new_count(&self) -> usize {
        count_new(&self.snapshot())
    }

    /// Publish the stored new count to the badge.
    pub fn hydrate(&self) {
        self.badge.set_new_count(self.new_count());
    }
}

//! `/health` endpoint payload.
//!
//! Reports build info and whether the backing store answers a read. Never
//! fails: a broken store shows up as `storage.ok == false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{KvStore, ALERTS_KEY};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    pub name: String,
    pub version: String,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHealth {
    pub backend: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub build: BuildInfo,
    pub storage: StorageHealth,
    pub alerts: usize,
    pub new_extensions: usize,
    pub checked_at: DateTime<Utc>,
}

pub fn check_health(
    store: &dyn KvStore,
    backend: &str,
    alerts: usize,
    new_extensions: usize,
) -> HealthResponse {
    let storage = match store.get(ALERTS_KEY) {
        Ok(_) => StorageHealth {
            backend: backend.to_string(),
            ok: true,
            error: None,
        },
        Err(e) => StorageHealth {
            backend: backend.to_string(),
            ok: false,
            error: Some(e.to_string()),
        },
    };
    HealthResponse {
        status: if storage.ok { "ok" } else { "degraded" }.to_string(),
        build: BuildInfo::current(),
        storage,
        alerts,
        new_extensions,
        checked_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_health_reports_storage_state() {
        let store = MemoryStore::new();
        let health = check_health(&store, "memory", 3, 1);
        assert_eq!(health.status, "ok");
        assert!(health.storage.ok);
        assert_eq!(health.alerts, 3);
        assert_eq!(health.build.name, "domsentry-server");

        store.set_unavailable(true);
        let health = check_health(&store, "memory", 0, 0);
        assert_eq!(health.status, "degraded");
        assert_eq!(health.storage.error.as_deref(), Some("store unavailable"));
    }
}

//! domsentry-server
//!
//! The receiving side of domsentry: persists the alert log and the extension
//! inventory, attributes extension-origin evidence to installed extensions,
//! and answers the message protocol over HTTP.

pub mod alert_log;
pub mod api;
pub mod attribution;
pub mod badge;
pub mod health;
pub mod inventory;
pub mod logging;
pub mod merge;
pub mod store;

pub use alert_log::{AddOutcome, AlertLog};
pub use api::{dispatch, parse_message, router, spawn_message_pump, AppState, SharedState};
pub use attribution::{matches_internal_origin, resolve_sources};
pub use badge::{Badge, BadgeCounters};
pub use health::{check_health, HealthResponse};
pub use inventory::{Inventory, InventoryMap};
pub use merge::{find_mergeable, insert_alert, merge_alerts, MATCH_WINDOW_MS};
pub use store::{KvStore, MemoryStore, SqliteStore, StoreError};

// HTTP surface: the message protocol on POST /api/message plus a few
// read-only conveniences for the UI and for probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use domsentry_core::{ErrorCode, ErrorReport, Message, Response};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

use crate::alert_log::AlertLog;
use crate::badge::{Badge, BadgeCounters};
use crate::health::{check_health, HealthResponse};
use crate::inventory::Inventory;
use crate::store::{write_lock, KvStore};

/// Message `type` values the router understands.
const KNOWN_TYPES: &[&str] = &[
    "pageMutation",
    "getAlerts",
    "setAlerts",
    "clearAlerts",
    "getList",
    "clearNew",
    "extensionInstalled",
    "extensionEnabled",
    "extensionDisabled",
    "extensionUninstalled",
    "getBadge",
];

// ============================================================================
// Application State
// ============================================================================

pub struct AppState {
    pub alerts: AlertLog,
    pub inventory: Inventory,
    pub badge: Arc<BadgeCounters>,
    store: Arc<dyn KvStore>,
    backend: String,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire both services to one store and one write lock, then load the
    /// badge counters from what is already stored.
    pub fn new(store: Arc<dyn KvStore>, backend: &str, self_id: Option<String>) -> SharedState {
        let lock = write_lock();
        let badge = Arc::new(BadgeCounters::new());
        let state = AppState {
            alerts: AlertLog::new(store.clone(), lock.clone(), badge.clone()),
            inventory: Inventory::new(store.clone(), lock, badge.clone(), self_id),
            badge,
            store,
            backend: backend.to_string(),
        };
        state.alerts.hydrate();
        state.inventory.hydrate();
        Arc::new(state)
    }

    pub fn health(&self) -> HealthResponse {
        check_health(
            self.store.as_ref(),
            &self.backend,
            self.badge.alert_count(),
            self.badge.new_count(),
        )
    }
}

fn storage_error(context: &str, err: impl std::fmt::Display) -> Response {
    tracing::warn!(error = %err, "{} failed", context);
    Response::error(ErrorReport::new(ErrorCode::StorageUnavailable, err.to_string()).to_string())
}

/// Answer one protocol message.
pub async fn dispatch(state: &AppState, message: Message) -> Response {
    let kind = message.kind();
    tracing::debug!(kind, "message");

    match message {
        Message::PageMutation { payload } => match state.alerts.add(&payload).await {
            Ok(_) => Response::ok(),
            Err(e) => storage_error(kind, e),
        },
        Message::GetAlerts => Response::Alerts {
            alerts: state.alerts.list(),
        },
        Message::SetAlerts { alerts } => match state.alerts.replace(&alerts).await {
            Ok(_) => Response::ok(),
            Err(e) => storage_error(kind, e),
        },
        Message::ClearAlerts => match state.alerts.clear().await {
            Ok(()) => Response::ok(),
            Err(e) => storage_error(kind, e),
        },
        Message::GetList { sync, extensions } => {
            if let (true, Some(reported)) = (sync, extensions) {
                if let Err(e) = state.inventory.sync(reported).await {
                    tracing::warn!(error = %e, "inventory sync failed, listing stored entries");
                }
            }
            let (extensions, new_count) = state.inventory.list();
            Response::Inventory {
                extensions,
                new_count,
            }
        }
        Message::ClearNew => match state.inventory.clear_new().await {
            Ok(()) => Response::ok(),
            Err(e) => storage_error(kind, e),
        },
        Message::ExtensionInstalled { extension } => {
            match state.inventory.upsert(extension, true).await {
                Ok(()) => Response::ok(),
                Err(e) => storage_error(kind, e),
            }
        }
        Message::ExtensionEnabled { extension } | Message::ExtensionDisabled { extension } => {
            match state.inventory.upsert(extension, false).await {
                Ok(()) => Response::ok(),
                Err(e) => storage_error(kind, e),
            }
        }
        Message::ExtensionUninstalled { id } => match state.inventory.remove(&id).await {
            Ok(_) => Response::ok(),
            Err(e) => storage_error(kind, e),
        },
        Message::GetBadge => {
            let Badge { text, color } = state.badge.badge();
            Response::Badge { text, color }
        }
    }
}

/// Parse a raw request body into a message, classifying failures.
pub fn parse_message(body: Value) -> Result<Message, ErrorReport> {
    let kind = body.get("type").and_then(Value::as_str).map(str::to_string);
    serde_json::from_value(body).map_err(|e| match kind {
        Some(kind) if !KNOWN_TYPES.contains(&kind.as_str()) => ErrorReport::new(
            ErrorCode::UnknownMessageType,
            format!("unknown message type: {}", kind),
        ),
        _ => ErrorReport::new(ErrorCode::InvalidMessage, e.to_string()),
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn post_message(State(state): State<SharedState>, Json(body): Json<Value>) -> impl IntoResponse {
    match parse_message(body) {
        Ok(message) => (StatusCode::OK, Json(dispatch(&state, message).await)),
        Err(report) => {
            tracing::debug!(code = report.code.as_str(), "rejected message");
            (StatusCode::BAD_REQUEST, Json(Response::error(report.to_string())))
        }
    }
}

async fn get_alerts(State(state): State<SharedState>) -> Json<Response> {
    Json(Response::Alerts {
        alerts: state.alerts.list(),
    })
}

async fn get_badge(State(state): State<SharedState>) -> Json<Badge> {
    Json(state.badge.badge())
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(state.health())
}

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/message", post(post_message))
        .route("/api/alerts", get(get_alerts))
        .route("/api/badge", get(get_badge))
        .layer(cors)
        .with_state(state)
}

/// Feed messages from an in-process collector (see `ChannelSink`) into
/// `dispatch`. Ends when every sender is dropped; returns how many were
/// handled.
pub fn spawn_message_pump(
    state: SharedState,
    mut rx: mpsc::UnboundedReceiver<Message>,
) -> tokio::task::JoinHandle<u64> {
    tokio::spawn(async move {
        let mut handled = 0;
        while let Some(message) = rx.recv().await {
            dispatch(&state, message).await;
            handled += 1;
        }
        handled
    })
}

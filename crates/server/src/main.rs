// domsentry-server main.rs
// Alert merge engine and extension inventory behind the message API

use domsentry_server::logging::{default_data_dir, init_logging};
use domsentry_server::store::{KvStore, MemoryStore, SqliteStore};
use domsentry_server::{router, AppState};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_PORT: u16 = 8787;

struct Args {
    port: u16,
    data_dir: PathBuf,
    memory: bool,
    self_id: Option<String>,
}

fn arg_value(args: &[String], long: &str, short: &str) -> Option<String> {
    args.iter()
        .position(|a| a == long || a == short)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();

    let port: u16 = arg_value(&args, "--port", "-p")
        .and_then(|s| s.parse().ok())
        .or_else(|| {
            std::env::var("DOMSENTRY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(DEFAULT_PORT);

    let data_dir = arg_value(&args, "--data-dir", "-d")
        .map(PathBuf::from)
        .or_else(|| std::env::var("DOMSENTRY_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(default_data_dir);

    let self_id = std::env::var("DOMSENTRY_SELF_ID").ok().filter(|s| !s.is_empty());

    Args {
        port,
        data_dir,
        memory: args.iter().any(|a| a == "--memory"),
        self_id,
    }
}

fn open_store(args: &Args) -> (Arc<dyn KvStore>, &'static str) {
    if args.memory {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        return (store, "memory");
    }
    let db_path = args.data_dir.join("domsentry.db");
    tracing::info!("Database: {:?}", db_path);
    match SqliteStore::open(&db_path) {
        Ok(store) => {
            let store: Arc<dyn KvStore> = Arc::new(store);
            (store, "sqlite")
        }
        Err(e) => {
            tracing::warn!(error = %e, "sqlite unavailable, falling back to memory store");
            let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
            (store, "memory")
        }
    }
}

#[tokio::main]
async fn main() {
    let args = parse_args();
    if let Err(e) = std::fs::create_dir_all(&args.data_dir) {
        eprintln!("cannot create data directory {:?}: {}", args.data_dir, e);
        std::process::exit(1);
    }
    let _log_guard = init_logging(Some(&args.data_dir));

    let (store, backend) = open_store(&args);

    let state = AppState::new(store, backend, args.self_id);
    tracing::info!(
        alerts = state.badge.alert_count(),
        new_extensions = state.badge.new_count(),
        "state loaded"
    );

    let app = router(state);
    let addr = format!("127.0.0.1:{}", args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "cannot bind {}", addr);
            std::process::exit(1);
        }
    };
    tracing::info!("domsentry-server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl+c handler unavailable");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use queueline_core::{
    create_audit_system, create_authenticator, load_config, validate_config, AuditEvent,
    AuditStore, Authenticator, Config, QueueService, SqliteAuditStore, SqliteQueueStore,
    SystemClock,
};
use queueline_server::api::{create_router, WsBroadcaster};
use queueline_server::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const AUDIT_BUFFER_SIZE: usize = 1000;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound on flushing queued audit events at shutdown.
const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("QUEUELINE_LOG_FORMAT").is_ok_and(|format| format == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var("QUEUELINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        auth = ?config.auth.method,
        database = ?config.database.path,
        utc_offset_minutes = config.queue.utc_offset_minutes,
        "Configuration loaded"
    );

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let queue_store = SqliteQueueStore::with_config(&config.database.path, &config.queue)
        .context("Failed to open queue store")?;
    info!("Queue store initialized");

    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(audit_writer.run());

    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash(&config),
        })
        .await;

    // Validation guarantees the offset is representable.
    let offset = config
        .queue
        .utc_offset()
        .context("Invalid queue.utc_offset_minutes")?;
    let queue = QueueService::new(Arc::new(queue_store), Arc::new(SystemClock::new(offset)))
        .with_audit(audit_handle.clone());

    let ws_broadcaster = WsBroadcaster::default();
    let heartbeat = ws_broadcaster.spawn_heartbeat(HEARTBEAT_INTERVAL);

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        queue,
        audit_store,
        ws_broadcaster.clone(),
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Upgraded sockets are not tracked by graceful shutdown.
        ws_broadcaster.shutdown();
    })
    .await
    .context("Server error")?;

    info!("Server shutting down...");
    heartbeat.abort();

    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The writer stops once every handle is dropped, including the one
    // inside the queue service held by the application state.
    drop(audit_handle);
    match tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, writer_handle).await {
        Ok(Ok(())) => info!("Audit writer drained"),
        Ok(Err(e)) => error!("Audit writer task failed: {}", e),
        Err(_) => warn!(
            "Audit writer still busy after {:?}, exiting anyway",
            AUDIT_DRAIN_TIMEOUT
        ),
    }

    Ok(())
}

/// Short SHA-256 of the effective configuration, for the audit trail.
fn config_hash(config: &Config) -> String {
    let json = serde_json::to_string(config).unwrap_or_default();
    let digest = format!("{:x}", Sha256::digest(json.as_bytes()));
    digest[..16].to_string()
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

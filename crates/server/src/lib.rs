pub mod bootstrap;
pub mod health;
pub mod messages;

use std::future::IntoFuture;
use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use orderbot_core::config::{AppConfig, LoadOptions, LogFormat};
use orderbot_core::flows::ConversationService;
use orderbot_db::DbPool;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};

#[derive(Clone)]
pub struct ServerState {
    pub service: ConversationService,
    pub db_pool: Option<DbPool>,
}

impl From<&Application> for ServerState {
    fn from(app: &Application) -> Self {
        Self { service: app.service.clone(), db_pool: app.db_pool.clone() }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/conversations/{conversation_id}/messages", post(messages::post_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        warn!("tracing subscriber already installed; keeping the existing one");
    }
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        catalog_backend = app.service.engine().catalog_backend(),
        ledger_backend = app.service.engine().ledger_backend(),
        "orderbot-server listening"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(
        axum::serve(listener, router(ServerState::from(&app)))
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .into_future(),
    );

    wait_for_shutdown().await?;
    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "orderbot-server stopping"
    );
    let _ = stop_tx.send(());

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(serve_error))) => {
            error!(
                event_name = "system.server.error",
                correlation_id = "shutdown",
                error = %serve_error,
                "http server terminated with an error"
            );
        }
        Ok(Err(join_error)) => {
            error!(
                event_name = "system.server.error",
                correlation_id = "shutdown",
                error = %join_error,
                "http server task failed"
            );
        }
        Err(_) => {
            warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight requests did not finish within the grace period"
            );
        }
    }

    if let Some(pool) = app.db_pool {
        pool.close().await;
    }
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

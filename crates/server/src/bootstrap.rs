use std::sync::Arc;
use std::time::Duration;

use orderbot_appsheet::{AppSheetCatalog, AppSheetClient, AppSheetError, AppSheetOrderLedger};
use orderbot_core::audit::{AuditSink, TracingAuditSink};
use orderbot_core::catalog::{CatalogClient, InMemoryCatalog};
use orderbot_core::config::{AppConfig, CatalogBackend, ConfigError, LedgerBackend, LoadOptions};
use orderbot_core::domain::order::OrderIdAllocator;
use orderbot_core::flows::{ConversationEngine, ConversationService, EngineSettings, KeywordSet};
use orderbot_core::ledger::{LedgerError, OrderLedger};
use orderbot_db::{connect_with_config, migrations, DbPool, InMemoryOrderLedger, SqlOrderLedger};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub service: ConversationService,
    /// Present only when the ledger backend is sqlite.
    pub db_pool: Option<DbPool>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("appsheet client setup failed: {0}")]
    AppSheet(#[from] AppSheetError),
    #[error("could not read the highest stored order id: {0}")]
    LedgerSeed(#[source] LedgerError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires backends, seeds the order id allocator and builds the conversation
/// service from an already loaded config.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        catalog_backend = config.catalog.backend.as_str(),
        ledger_backend = config.ledger.backend.as_str(),
        "starting application bootstrap"
    );
    config.validate()?;

    let catalog: Arc<dyn CatalogClient> = match config.catalog.backend {
        CatalogBackend::Memory => Arc::new(InMemoryCatalog::new(config.catalog.items.clone())),
        CatalogBackend::AppSheet => {
            let client = Arc::new(AppSheetClient::new(
                &config.appsheet,
                Duration::from_secs(config.catalog.timeout_secs),
            )?);
            Arc::new(AppSheetCatalog::from_config(client, &config.catalog))
        }
    };

    let mut db_pool = None;
    let ledger: Arc<dyn OrderLedger> = match config.ledger.backend {
        LedgerBackend::Memory => Arc::new(InMemoryOrderLedger::default()),
        LedgerBackend::Sqlite => {
            let pool = connect_with_config(&config.database)
                .await
                .map_err(BootstrapError::DatabaseConnect)?;
            info!(
                event_name = "system.bootstrap.database_connected",
                correlation_id = "bootstrap",
                "database connection established"
            );
            migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
            info!(
                event_name = "system.bootstrap.migrations_applied",
                correlation_id = "bootstrap",
                "database migrations applied"
            );
            db_pool = Some(pool.clone());
            Arc::new(SqlOrderLedger::new(pool))
        }
        LedgerBackend::AppSheet => {
            let client = Arc::new(AppSheetClient::new(
                &config.appsheet,
                Duration::from_secs(config.ledger.timeout_secs),
            )?);
            Arc::new(AppSheetOrderLedger::from_config(client, &config.ledger))
        }
    };

    let allocator = Arc::new(OrderIdAllocator::new(
        config.conversation.order_id_prefix.clone(),
        config.conversation.order_id_width,
    ));
    if let Some(highest) = ledger.highest_sequence().await.map_err(BootstrapError::LedgerSeed)? {
        allocator.advance_past(highest);
    }
    info!(
        event_name = "system.bootstrap.allocator_seeded",
        correlation_id = "bootstrap",
        next_sequence = allocator.peek_next(),
        "order id allocator seeded"
    );

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let engine = ConversationEngine::new(
        catalog,
        ledger,
        allocator,
        KeywordSet::from_config(&config.conversation),
        EngineSettings::from_config(&config),
        audit,
    );

    Ok(Application { config, service: ConversationService::new(engine), db_pool })
}

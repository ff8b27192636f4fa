use std::sync::Arc;

use compline_core::approvals::{ApprovalEngine, OutcomeDispatcher, TracingOutcomeDispatcher};
use compline_core::config::{AppConfig, ConfigError};
use compline_db::{
    connect_with_settings, migrations, DbPool, SqlApproverResolver, SqlCaseRepository,
    SqlTemplateRepository,
};
use thiserror::Error;
use tracing::info;

use crate::dispatch::HttpOutcomeDispatcher;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: ApprovalEngine,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("outcome dispatcher could not be built: {0}")]
    Dispatcher(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let dispatcher: Arc<dyn OutcomeDispatcher> = if config.dispatch.enabled {
        Arc::new(
            HttpOutcomeDispatcher::new(config.dispatch.clone())
                .map_err(BootstrapError::Dispatcher)?,
        )
    } else {
        Arc::new(TracingOutcomeDispatcher)
    };
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        dispatch_mode = if config.dispatch.enabled { "http" } else { "log_only" },
        "outcome dispatcher initialized"
    );

    let engine = ApprovalEngine::new(
        Arc::new(SqlCaseRepository::new(db_pool.clone())),
        Arc::new(SqlTemplateRepository::new(db_pool.clone())),
        Arc::new(SqlApproverResolver::new(db_pool.clone())),
        dispatcher,
    );

    Ok(Application { config, db_pool, engine })
}

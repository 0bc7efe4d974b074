use std::sync::Arc;

use crmlite_core::config::{AppConfig, ConfigError};
use crmlite_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::boundary::CrmBoundary;
use crate::pages::{self, CookieSettings, PageState};
use crate::session::SessionStore;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub boundary: Arc<CrmBoundary>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("template loading failed: {0}")]
    Templates(#[source] tera::Error),
}

impl Application {
    pub fn page_state(&self) -> Result<PageState, BootstrapError> {
        let templates = pages::init_templates().map_err(BootstrapError::Templates)?;
        Ok(PageState::new(
            self.boundary.clone(),
            Arc::new(templates),
            CookieSettings::from(&self.config.auth),
        ))
    }
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

    let sessions = Arc::new(SessionStore::new(config.auth.session_ttl_secs));
    let boundary = Arc::new(CrmBoundary::with_pool(db_pool.clone(), sessions));

    Ok(Application { config, db_pool, boundary })
}

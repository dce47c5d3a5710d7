use std::sync::Arc;

use roster_core::config::{AppConfig, ConfigError, LoadOptions};
use roster_core::{CustomerService, StorageError};
use roster_db::repositories::SqlCustomerRepository;
use roster_db::{schema, ConnectionError, ConnectionSettings, Store};
use thiserror::Error;
use tracing::info;

use crate::auth::{AuthError, Authenticator};

pub struct Application {
    pub config: AppConfig,
    pub store: Store,
    pub service: CustomerService,
    pub authenticator: Authenticator,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("schema bootstrap failed: {0}")]
    Schema(#[source] StorageError),
    #[error("auth setup failed: {0}")]
    Auth(#[from] AuthError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let store = Store::new(ConnectionSettings::from_config(&config.database));
    store.ensure_connected().await?;

    let created = schema::initialize(&store).await.map_err(BootstrapError::Schema)?;
    info!(
        event_name = "system.bootstrap.schema_ready",
        correlation_id = "bootstrap",
        table_created = created,
        "customer schema ready"
    );

    let authenticator = Authenticator::from_config(&config.auth)?;
    let service = CustomerService::new(Arc::new(SqlCustomerRepository::new(store.clone())));

    Ok(Application { config, store, service, authenticator })
}

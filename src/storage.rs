use std::sync::Arc;

use object_store::azure::MicrosoftAzureBuilder;
use object_store::memory::InMemory;
use object_store::{BackoffConfig, ObjectStore, RetryConfig};

use crate::config::{AzureConfig, Config, RetrySettings, StorageBackend};
use crate::error::{AppError, Result};
use crate::services::containers::{
    AzureContainerAdmin, ContainerAdmin, MemoryContainerAdmin, EMULATOR_ACCOUNT_KEY,
};

/// Local address of the Azurite blob service.
const EMULATOR_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000";

/// The data-plane and control-plane clients for one container.
pub struct StorageClients {
    pub store: Arc<dyn ObjectStore>,
    pub admin: Arc<dyn ContainerAdmin>,
}

/// Maps the configured retry settings onto the object store's retry policy.
pub fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig {
        backoff: BackoffConfig {
            init_backoff: settings.init_backoff,
            max_backoff: settings.max_backoff,
            base: settings.base,
        },
        max_retries: settings.max_retries,
        retry_timeout: settings.retry_timeout,
    }
}

/// Creates the storage clients for the configured backend.
pub fn create_clients(config: &Config) -> Result<StorageClients> {
    match &config.storage {
        StorageBackend::Memory => {
            tracing::info!("✅ In-memory blob store initialized (contents are lost on restart)");
            Ok(StorageClients {
                store: Arc::new(InMemory::new()),
                admin: Arc::new(MemoryContainerAdmin::new()),
            })
        }
        StorageBackend::Azure(azure) => create_azure_clients(azure, config),
    }
}

fn create_azure_clients(azure: &AzureConfig, config: &Config) -> Result<StorageClients> {
    let access_key = match (&azure.access_key, azure.use_emulator) {
        (Some(key), _) => key.clone(),
        (None, true) => EMULATOR_ACCOUNT_KEY.to_string(),
        (None, false) => {
            return Err(AppError::Internal(
                "Azure backend requires an access key".to_string(),
            ));
        }
    };

    let mut builder = MicrosoftAzureBuilder::new()
        .with_account(&azure.account)
        .with_access_key(&access_key)
        .with_container_name(&config.container_name)
        .with_retry(retry_config(&config.retry));

    if azure.use_emulator {
        builder = builder.with_use_emulator(true);
    }
    if let Some(endpoint) = &azure.endpoint {
        builder = builder.with_endpoint(endpoint.clone());
    }

    let store = builder.build()?;

    let endpoint = match (&azure.endpoint, azure.use_emulator) {
        (Some(endpoint), _) => endpoint.clone(),
        (None, true) => format!("{}/{}", EMULATOR_BLOB_ENDPOINT, azure.account),
        (None, false) => format!("https://{}.blob.core.windows.net", azure.account),
    };

    let admin = AzureContainerAdmin::new(
        azure.account.clone(),
        &access_key,
        endpoint,
        config.retry.clone(),
    )?;

    tracing::info!(
        "✅ Azure blob store initialized: account={} container={} (max {} retries)",
        azure.account,
        config.container_name,
        config.retry.max_retries
    );

    Ok(StorageClients {
        store: Arc::new(store),
        admin: Arc::new(admin),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn retry_policy_mirrors_settings() {
        let settings = RetrySettings {
            max_retries: 5,
            init_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            base: 2.0,
            retry_timeout: Duration::from_secs(60),
        };

        let retry = retry_config(&settings);
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.retry_timeout, Duration::from_secs(60));
        assert_eq!(retry.backoff.init_backoff, Duration::from_millis(250));
        assert_eq!(retry.backoff.max_backoff, Duration::from_secs(10));
    }

    #[test]
    fn memory_backend_needs_no_credentials() {
        assert!(create_clients(&Config::in_memory()).is_ok());
    }
}

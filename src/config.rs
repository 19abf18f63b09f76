use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Well-known account name of the local Azure storage emulator.
pub const EMULATOR_ACCOUNT: &str = "devstoreaccount1";

/// Which blob backend the gateway talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// Azure Blob Storage (or the Azurite emulator).
    Azure(AzureConfig),
    /// Process-local store, lost on restart.
    Memory,
}

/// Connection settings for Azure Blob Storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AzureConfig {
    /// The storage account name.
    pub account: String,
    /// The base64 shared access key, if not using the emulator defaults.
    pub access_key: Option<String>,
    /// Talk to Azurite on `127.0.0.1:10000` instead of the public endpoint.
    pub use_emulator: bool,
    /// Explicit blob service endpoint, overriding the derived one.
    pub endpoint: Option<String>,
}

/// Exponential backoff applied by the storage clients to transient failures.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrySettings {
    /// Maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// The delay before the first retry.
    pub init_backoff: Duration,
    /// The upper bound for a single delay.
    pub max_backoff: Duration,
    /// The multiplier applied to the delay after each retry.
    pub base: f64,
    /// Total time budget across all retries of one call.
    pub retry_timeout: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            init_backoff: Duration::from_secs(3),
            max_backoff: Duration::from_secs(90),
            base: 2.0,
            retry_timeout: Duration::from_secs(180),
        }
    }
}

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The address to bind the listener to.
    pub bind_addr: IpAddr,
    /// The port to listen on.
    pub port: u16,
    /// Whether the app runs in production (secure cookies).
    pub production: bool,
    /// The name of the single blob container.
    pub container_name: String,
    /// The blob backend.
    pub storage: StorageBackend,
    /// Retry policy for the storage clients.
    pub retry: RetrySettings,
    /// Login of the account seeded at startup.
    pub seed_login: String,
    /// Password of the account seeded at startup.
    pub seed_password: String,
    /// Delay of the locals step before the login and register forms render.
    pub locals_delay: Duration,
    /// Directory uploads are spooled to before they are sent to storage.
    pub upload_dir: PathBuf,
    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// Every key is optional except the Azure credentials when the Azure
    /// backend is selected outside the emulator.
    pub fn from_env() -> Result<Self> {
        let storage = match env_or("STORAGE_BACKEND", "azure").as_str() {
            "memory" => StorageBackend::Memory,
            "azure" => {
                let use_emulator: bool = parse_env("AZURE_STORAGE_USE_EMULATOR", false)?;
                let account = match env::var("AZURE_STORAGE_ACCOUNT") {
                    Ok(account) => account,
                    Err(_) if use_emulator => EMULATOR_ACCOUNT.to_string(),
                    Err(_) => anyhow::bail!(
                        "AZURE_STORAGE_ACCOUNT must be set (or STORAGE_BACKEND=memory)"
                    ),
                };
                let access_key = env::var("AZURE_STORAGE_ACCESS_KEY").ok();
                if access_key.is_none() && !use_emulator {
                    anyhow::bail!("AZURE_STORAGE_ACCESS_KEY must be set for the azure backend");
                }
                StorageBackend::Azure(AzureConfig {
                    account,
                    access_key,
                    use_emulator,
                    endpoint: env::var("AZURE_STORAGE_ENDPOINT").ok(),
                })
            }
            other => anyhow::bail!("Unknown STORAGE_BACKEND '{}' (expected azure or memory)", other),
        };

        let defaults = RetrySettings::default();
        let retry = RetrySettings {
            max_retries: parse_env("STORAGE_MAX_RETRIES", defaults.max_retries)?,
            init_backoff: Duration::from_millis(parse_env(
                "STORAGE_RETRY_INIT_MS",
                defaults.init_backoff.as_millis() as u64,
            )?),
            max_backoff: Duration::from_millis(parse_env(
                "STORAGE_RETRY_MAX_MS",
                defaults.max_backoff.as_millis() as u64,
            )?),
            base: defaults.base,
            retry_timeout: Duration::from_secs(parse_env(
                "STORAGE_RETRY_TIMEOUT_SECS",
                defaults.retry_timeout.as_secs(),
            )?),
        };

        Ok(Self {
            bind_addr: parse_env("BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_env("PORT", 1337)?,
            production: env_or("APP_ENV", "development") == "production",
            container_name: env_or("CONTAINER_NAME", "webpi"),
            storage,
            retry,
            seed_login: env_or("SEED_LOGIN", "finomial"),
            seed_password: env_or("SEED_PASSWORD", "finomial"),
            locals_delay: Duration::from_millis(parse_env("LOCALS_DELAY_MS", 200)?),
            upload_dir: env::var("UPLOAD_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 1024 * 1024 * 1024)?,
        })
    }

    /// A configuration backed by the in-memory store, with no locals delay.
    pub fn in_memory() -> Self {
        Self {
            bind_addr: IpAddr::from([127, 0, 0, 1]),
            port: 1337,
            production: false,
            container_name: "webpi".to_string(),
            storage: StorageBackend::Memory,
            retry: RetrySettings::default(),
            seed_login: "finomial".to_string(),
            seed_password: "finomial".to_string(),
            locals_delay: Duration::ZERO,
            upload_dir: env::temp_dir(),
            max_upload_bytes: 1024 * 1024 * 1024,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

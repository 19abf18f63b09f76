//! Container management for the blob backend.
//!
//! The object store API covers blobs only, so creating the container and
//! opening it for public reads go through a separate control-plane client.
//! `AzureContainerAdmin` talks to the Blob REST API directly, signing each
//! request with the account's Shared Key:
//!
//! ```text
//! PUT {endpoint}/{container}?restype=container            Create Container
//! PUT {endpoint}/{container}?restype=container&comp=acl   Set Container ACL
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use reqwest::{Method, StatusCode};
use sha2::Sha256;
use tokio::sync::RwLock;

use crate::config::RetrySettings;
use crate::error::{AppError, Result};

/// Azure REST API version used for all requests.
pub const AZURE_API_VERSION: &str = "2023-11-03";

/// Well-known shared key of the Azurite emulator account.
pub const EMULATOR_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Who may read a container's content without credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAccess {
    /// Only authorised requests.
    Private,
    /// Anyone may read blobs by direct URL, but not list the container.
    PublicBlob,
}

/// Control-plane operations on the single container.
#[async_trait]
pub trait ContainerAdmin: Send + Sync {
    /// Creates the container unless it exists. Returns whether it was created.
    async fn ensure_container(&self, name: &str) -> Result<bool>;

    /// Makes blob content of the container publicly readable.
    async fn set_public_read_acl(&self, name: &str) -> Result<()>;
}

/// Container bookkeeping for the in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryContainerAdmin {
    containers: RwLock<HashMap<String, ContainerAccess>>,
}

impl MemoryContainerAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the known containers and their access level.
    pub async fn containers(&self) -> Vec<(String, ContainerAccess)> {
        let mut containers: Vec<_> = self
            .containers
            .read()
            .await
            .iter()
            .map(|(name, access)| (name.clone(), *access))
            .collect();
        containers.sort_by(|a, b| a.0.cmp(&b.0));
        containers
    }
}

#[async_trait]
impl ContainerAdmin for MemoryContainerAdmin {
    async fn ensure_container(&self, name: &str) -> Result<bool> {
        let mut containers = self.containers.write().await;
        if containers.contains_key(name) {
            return Ok(false);
        }
        containers.insert(name.to_string(), ContainerAccess::Private);
        Ok(true)
    }

    async fn set_public_read_acl(&self, name: &str) -> Result<()> {
        let mut containers = self.containers.write().await;
        let access = containers
            .get_mut(name)
            .ok_or_else(|| AppError::NotFound(format!("container {}", name)))?;
        *access = ContainerAccess::PublicBlob;
        Ok(())
    }
}

/// Container management against Azure Blob Storage (or Azurite).
pub struct AzureContainerAdmin {
    client: reqwest::Client,
    account: String,
    key_bytes: Vec<u8>,
    /// Blob service endpoint without a trailing slash.
    endpoint: String,
    retry: RetrySettings,
}

impl AzureContainerAdmin {
    /// Creates a new admin client.
    ///
    /// `access_key` is the base64 account key as shown in the portal.
    pub fn new(
        account: String,
        access_key: &str,
        endpoint: String,
        retry: RetrySettings,
    ) -> Result<Self> {
        let key_bytes = BASE64_STANDARD.decode(access_key).map_err(|e| {
            AppError::ContainerAdmin(format!("Invalid account key (not valid base64): {}", e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::ContainerAdmin(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Azure container admin initialized: account={} endpoint={}",
            account,
            endpoint
        );

        Ok(Self {
            client,
            account,
            key_bytes,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn container_url(&self, container: &str) -> String {
        format!("{}/{}", self.endpoint, container)
    }

    /// Computes the `Authorization` header for a body-less container request.
    ///
    /// The string to sign leaves every standard header empty (a zero
    /// Content-Length is sent as empty), then appends the sorted `x-ms-*`
    /// headers and the canonicalized resource
    /// `/{account}{url path}` followed by the sorted query parameters.
    fn sign(
        &self,
        method: &Method,
        url: &reqwest::Url,
        ms_headers: &[(&str, &str)],
    ) -> Result<String> {
        let mut headers: Vec<(String, &str)> = ms_headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), *v))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        let canonicalized_headers = headers
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join("\n");

        let mut canonicalized_resource = format!("/{}{}", self.account, url.path());
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
            .collect();
        params.sort();
        for (k, v) in &params {
            canonicalized_resource.push_str(&format!("\n{}:{}", k, v));
        }

        let string_to_sign = format!(
            "{}\n\n\n\n\n\n\n\n\n\n\n\n{}\n{}",
            method.as_str(),
            canonicalized_headers,
            canonicalized_resource
        );

        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(&self.key_bytes)
            .map_err(|e| AppError::ContainerAdmin(format!("HMAC key error: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{}", self.account, signature))
    }

    /// Sends one signed PUT, retrying transient failures with exponential backoff.
    async fn put_signed(&self, url: &str, extra_headers: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| AppError::ContainerAdmin(format!("Invalid URL {}: {}", url, e)))?;
        let started = tokio::time::Instant::now();
        let mut backoff = Backoff::new(&self.retry);
        let mut attempt = 0;

        loop {
            let date = httpdate::fmt_http_date(std::time::SystemTime::now());
            let mut ms_headers = vec![("x-ms-date", date.as_str()), ("x-ms-version", AZURE_API_VERSION)];
            ms_headers.extend_from_slice(extra_headers);
            let authorization = self.sign(&Method::PUT, &url, &ms_headers)?;

            let mut request = self
                .client
                .put(url.clone())
                .header("Authorization", authorization)
                .header("Content-Length", "0");
            for (name, value) in &ms_headers {
                request = request.header(*name, *value);
            }

            let outcome = request.send().await;
            let transient = match &outcome {
                Ok(response) => is_transient(response.status()),
                Err(e) => e.is_connect() || e.is_timeout(),
            };

            if !transient
                || attempt >= self.retry.max_retries
                || started.elapsed() >= self.retry.retry_timeout
            {
                return outcome.map_err(|e| {
                    AppError::ContainerAdmin(format!("PUT {} failed: {}", url, e))
                });
            }

            attempt += 1;
            let delay = backoff.next();
            match &outcome {
                Ok(response) => tracing::warn!(
                    "⚠️ PUT {} returned {}, retry {}/{} in {:?}",
                    url,
                    response.status(),
                    attempt,
                    self.retry.max_retries,
                    delay
                ),
                Err(e) => tracing::warn!(
                    "⚠️ PUT {} failed: {}, retry {}/{} in {:?}",
                    url,
                    e,
                    attempt,
                    self.retry.max_retries,
                    delay
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ContainerAdmin for AzureContainerAdmin {
    async fn ensure_container(&self, name: &str) -> Result<bool> {
        let url = format!("{}?restype=container", self.container_url(name));
        let response = self.put_signed(&url, &[]).await?;
        let status = response.status();

        if status == StatusCode::CREATED {
            tracing::info!("✅ Container created: {}", name);
            return Ok(true);
        }

        let error_code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if status == StatusCode::CONFLICT && error_code == "ContainerAlreadyExists" {
            tracing::debug!("Container already exists: {}", name);
            return Ok(false);
        }

        let body = response.text().await.unwrap_or_default();
        Err(azure_error("create container", status, &error_code, &body))
    }

    async fn set_public_read_acl(&self, name: &str) -> Result<()> {
        let url = format!("{}?restype=container&comp=acl", self.container_url(name));
        let response = self
            .put_signed(&url, &[("x-ms-blob-public-access", "blob")])
            .await?;
        let status = response.status();

        if status.is_success() {
            tracing::info!("✅ Container {} is publicly readable", name);
            return Ok(());
        }

        let error_code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await.unwrap_or_default();
        Err(azure_error("set container ACL", status, &error_code, &body))
    }
}

fn azure_error(context: &str, status: StatusCode, code: &str, body: &str) -> AppError {
    if status == StatusCode::NOT_FOUND {
        return AppError::NotFound(format!("Azure {}: {}", context, code));
    }
    AppError::ContainerAdmin(format!("Azure {}: HTTP {} {} - {}", context, status, code, body))
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Exponential backoff with full jitter, capped at `max_backoff`.
struct Backoff {
    next_ceiling: f64,
    max: f64,
    base: f64,
}

impl Backoff {
    fn new(settings: &RetrySettings) -> Self {
        Self {
            next_ceiling: settings.init_backoff.as_secs_f64(),
            max: settings.max_backoff.as_secs_f64(),
            base: settings.base,
        }
    }

    fn next(&mut self) -> Duration {
        let ceiling = self.next_ceiling.min(self.max);
        self.next_ceiling = (self.next_ceiling * self.base).min(self.max);
        if ceiling <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..=ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetrySettings {
        RetrySettings {
            max_retries: 2,
            init_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            base: 2.0,
            retry_timeout: Duration::from_secs(5),
        }
    }

    fn admin_for(server: &MockServer) -> AzureContainerAdmin {
        AzureContainerAdmin::new(
            "devstoreaccount1".to_string(),
            EMULATOR_ACCOUNT_KEY,
            server.uri(),
            fast_retry(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn memory_ensure_is_idempotent() {
        let admin = MemoryContainerAdmin::new();

        assert!(admin.ensure_container("webpi").await.unwrap());
        admin.set_public_read_acl("webpi").await.unwrap();
        assert!(!admin.ensure_container("webpi").await.unwrap());

        assert_eq!(
            admin.containers().await,
            vec![("webpi".to_string(), ContainerAccess::PublicBlob)]
        );
    }

    #[tokio::test]
    async fn memory_acl_requires_container() {
        let admin = MemoryContainerAdmin::new();
        let err = admin.set_public_read_acl("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn creates_then_tolerates_existing_container() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/webpi"))
            .and(query_param("restype", "container"))
            .and(query_param_is_missing("comp"))
            .and(header("x-ms-version", AZURE_API_VERSION))
            .respond_with(ResponseTemplate::new(201))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/webpi"))
            .and(query_param("restype", "container"))
            .and(query_param_is_missing("comp"))
            .respond_with(
                ResponseTemplate::new(409).insert_header("x-ms-error-code", "ContainerAlreadyExists"),
            )
            .mount(&server)
            .await;

        let admin = admin_for(&server);
        assert!(admin.ensure_container("webpi").await.unwrap());
        assert!(!admin.ensure_container("webpi").await.unwrap());
    }

    #[tokio::test]
    async fn sets_blob_level_public_access() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/webpi"))
            .and(query_param("restype", "container"))
            .and(query_param("comp", "acl"))
            .and(header("x-ms-blob-public-access", "blob"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let admin = admin_for(&server);
        admin.set_public_read_acl("webpi").await.unwrap();
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/webpi"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/webpi"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let admin = admin_for(&server);
        assert!(admin.ensure_container("webpi").await.unwrap());
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/webpi"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let admin = admin_for(&server);
        let err = admin.ensure_container("webpi").await.unwrap_err();
        assert!(matches!(err, AppError::ContainerAdmin(_)));
    }

    #[test]
    fn signature_covers_account_path_and_sorted_query() {
        let admin = AzureContainerAdmin::new(
            "devstoreaccount1".to_string(),
            EMULATOR_ACCOUNT_KEY,
            "http://127.0.0.1:10000/devstoreaccount1".to_string(),
            fast_retry(),
        )
        .unwrap();

        let url = reqwest::Url::parse(
            "http://127.0.0.1:10000/devstoreaccount1/webpi?restype=container&comp=acl",
        )
        .unwrap();
        let headers = [
            ("x-ms-date", "Mon, 19 Oct 2026 10:00:00 GMT"),
            ("x-ms-version", AZURE_API_VERSION),
        ];

        let first = admin.sign(&Method::PUT, &url, &headers).unwrap();
        let again = admin.sign(&Method::PUT, &url, &headers).unwrap();
        let other_url =
            reqwest::Url::parse("http://127.0.0.1:10000/devstoreaccount1/other?restype=container")
                .unwrap();
        let other = admin.sign(&Method::PUT, &other_url, &headers).unwrap();

        assert!(first.starts_with("SharedKey devstoreaccount1:"));
        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn backoff_stays_under_ceiling() {
        let mut backoff = Backoff::new(&RetrySettings {
            init_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            ..RetrySettings::default()
        });

        for _ in 0..10 {
            assert!(backoff.next() <= Duration::from_millis(300));
        }
    }
}

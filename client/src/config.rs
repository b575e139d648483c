use payloads::APIClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::contexts::toast::DEFAULT_TOAST_DURATION_MS;
use crate::hooks::DEFAULT_PAGE_SIZE;
use crate::storage::{FileStore, KeyValueStore, MemoryStore, StorageError};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid number: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("Failed to build HTTP client")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin, without the `/api` suffix.
    pub backend_url: String,
    /// File for the session store. Sessions only live in memory when unset.
    pub storage_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub default_page_size: u32,
    pub toast_duration_ms: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.into(),
            storage_path: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            default_page_size: DEFAULT_PAGE_SIZE,
            toast_duration_ms: DEFAULT_TOAST_DURATION_MS,
        }
    }
}

impl ClientConfig {
    /// Read configuration from the environment, loading `.env` first if
    /// there is one.
    ///
    /// BACKEND_URL=http://127.0.0.1:8000
    /// STORAGE_PATH=/var/lib/events/session.json
    /// REQUEST_TIMEOUT_SECS=30
    /// DEFAULT_PAGE_SIZE=10
    /// TOAST_DURATION_MS=5000
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let backend_url = var("BACKEND_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.backend_url);
        let storage_path = var("STORAGE_PATH").map(PathBuf::from);
        let request_timeout = match var("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse("REQUEST_TIMEOUT_SECS", v)?),
            None => defaults.request_timeout,
        };
        let default_page_size = match var("DEFAULT_PAGE_SIZE") {
            Some(v) => parse::<u32>("DEFAULT_PAGE_SIZE", v)?.max(1),
            None => defaults.default_page_size,
        };
        let toast_duration_ms = match var("TOAST_DURATION_MS") {
            Some(v) => parse("TOAST_DURATION_MS", v)?,
            None => defaults.toast_duration_ms,
        };

        Ok(Self {
            backend_url,
            storage_path,
            request_timeout,
            default_page_size,
            toast_duration_ms,
        })
    }

    pub fn api_client(&self) -> Result<APIClient, ConfigError> {
        let inner_client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?;
        Ok(APIClient {
            address: self.backend_url.clone(),
            inner_client,
        })
    }

    /// The session store: file-backed when a path is configured.
    pub fn store(&self) -> Result<Arc<dyn KeyValueStore>, StorageError> {
        Ok(match &self.storage_path {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        })
    }
}

fn parse<N: std::str::FromStr>(
    name: &'static str,
    value: String,
) -> Result<N, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { name, value })
}

//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services as an
//! `Arc<CoreConfig>`. Request handling never reads process-wide environment variables, which
//! keeps behaviour consistent across multi-threaded runtimes and test harnesses.

use crate::constants::{
    DEFAULT_CAS_ATTEMPTS, DEFAULT_LOCK_WAIT_MS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_STORAGE_ATTEMPTS,
};
use crate::{RaccordError, RaccordResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Which [`DossierStore`](crate::store::DossierStore) implementation to open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// YAML records under the data directory, safe across processes.
    File,
    /// Process-local tables; contents are lost on exit.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = RaccordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(RaccordError::InvalidInput(format!(
                "unknown store backend '{other}' (expected 'file' or 'memory')"
            ))),
        }
    }
}

/// Bounds on how hard the reconciler tries before surfacing an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Full re-read/recompute cycles allowed when a compare-and-set loses a race.
    pub cas_attempts: u32,
    /// Attempts per store call when it fails with a retryable storage error.
    pub storage_attempts: u32,
    /// Base delay between storage attempts; doubles on every retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(cas_attempts: u32, storage_attempts: u32, backoff: Duration) -> RaccordResult<Self> {
        if cas_attempts == 0 {
            return Err(RaccordError::InvalidInput(
                "cas_attempts must be at least 1".into(),
            ));
        }
        if storage_attempts == 0 {
            return Err(RaccordError::InvalidInput(
                "storage_attempts must be at least 1".into(),
            ));
        }
        Ok(Self {
            cas_attempts,
            storage_attempts,
            backoff,
        })
    }

    /// Delay before storage retry number `attempt` (1-based), capped at one second.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff
            .saturating_mul(factor)
            .min(Duration::from_secs(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            cas_attempts: DEFAULT_CAS_ATTEMPTS,
            storage_attempts: DEFAULT_STORAGE_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    store_backend: StoreBackend,
    retry: RetryPolicy,
    lock_wait: Duration,
    api_key: Option<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        data_dir: PathBuf,
        store_backend: StoreBackend,
        retry: RetryPolicy,
        lock_wait: Duration,
        api_key: Option<String>,
    ) -> RaccordResult<Self> {
        if store_backend == StoreBackend::File && data_dir.as_os_str().is_empty() {
            return Err(RaccordError::InvalidInput(
                "data_dir cannot be empty for the file store".into(),
            ));
        }
        if lock_wait.is_zero() {
            return Err(RaccordError::InvalidInput(
                "lock_wait must be greater than zero".into(),
            ));
        }
        let api_key = api_key.filter(|k| !k.trim().is_empty());

        Ok(Self {
            data_dir,
            store_backend,
            retry,
            lock_wait,
            api_key,
        })
    }

    /// In-memory configuration with default retry bounds, for tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            data_dir: PathBuf::new(),
            store_backend: StoreBackend::Memory,
            retry: RetryPolicy::default(),
            lock_wait: Duration::from_millis(DEFAULT_LOCK_WAIT_MS),
            api_key: None,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.store_backend
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// How long a file-store mutation waits on a record lock held by another writer.
    pub fn lock_wait(&self) -> Duration {
        self.lock_wait
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

/// Parse the store backend from an optional string value; empty means [`StoreBackend::File`].
pub fn store_backend_from_env_value(value: Option<String>) -> RaccordResult<StoreBackend> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| v.parse())
        .transpose()
        .map(|parsed| parsed.unwrap_or(StoreBackend::File))
}

/// Parse a numeric setting from an optional string value, falling back to `default`.
pub fn number_from_env_value<T>(name: &str, value: Option<String>, default: T) -> RaccordResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| RaccordError::InvalidInput(format!("{name}='{raw}': {e}"))),
    }
}

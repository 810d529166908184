//! Startup configuration read from the environment.
//!
//! Binaries call these once, before serving, and pass the result down explicitly. Nothing reads
//! the environment while handling a request.

use raccord_core::config::{number_from_env_value, store_backend_from_env_value};
use raccord_core::constants::{
    DEFAULT_CAS_ATTEMPTS, DEFAULT_DATA_DIR, DEFAULT_LOCK_WAIT_MS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_STORAGE_ATTEMPTS,
};
use raccord_core::{CoreConfig, RaccordResult, RetryPolicy};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// REST bind address from `RACCORD_REST_ADDR`.
pub fn rest_addr_from_env() -> String {
    std::env::var("RACCORD_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into())
}

/// Builds the core configuration from `RACCORD_*` variables and `API_KEY`.
///
/// # Errors
///
/// Returns `InvalidInput` if a variable is set to something unparseable or out of range.
pub fn core_config_from_env() -> RaccordResult<CoreConfig> {
    core_config_from_lookup(|name| std::env::var(name).ok())
}

/// Same as [`core_config_from_env`], reading values through `lookup`.
pub fn core_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RaccordResult<CoreConfig> {
    let data_dir = lookup("RACCORD_DATA_DIR")
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_DIR.into());
    let store_backend = store_backend_from_env_value(lookup("RACCORD_STORE"))?;

    let retry = RetryPolicy::new(
        number_from_env_value(
            "RACCORD_CAS_ATTEMPTS",
            lookup("RACCORD_CAS_ATTEMPTS"),
            DEFAULT_CAS_ATTEMPTS,
        )?,
        number_from_env_value(
            "RACCORD_STORAGE_ATTEMPTS",
            lookup("RACCORD_STORAGE_ATTEMPTS"),
            DEFAULT_STORAGE_ATTEMPTS,
        )?,
        Duration::from_millis(number_from_env_value(
            "RACCORD_RETRY_BACKOFF_MS",
            lookup("RACCORD_RETRY_BACKOFF_MS"),
            DEFAULT_RETRY_BACKOFF_MS,
        )?),
    )?;
    let lock_wait = Duration::from_millis(number_from_env_value(
        "RACCORD_LOCK_WAIT_MS",
        lookup("RACCORD_LOCK_WAIT_MS"),
        DEFAULT_LOCK_WAIT_MS,
    )?);

    CoreConfig::new(
        PathBuf::from(data_dir),
        store_backend,
        retry,
        lock_wait,
        lookup("API_KEY"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use raccord_core::StoreBackend;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = core_config_from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.data_dir(), PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(cfg.store_backend(), StoreBackend::File);
        assert_eq!(cfg.retry(), RetryPolicy::default());
        assert_eq!(cfg.api_key(), None);
        assert_eq!(cfg.lock_wait(), Duration::from_millis(DEFAULT_LOCK_WAIT_MS));
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let cfg = core_config_from_lookup(lookup(&[
            ("RACCORD_STORE", "memory"),
            ("RACCORD_CAS_ATTEMPTS", "9"),
            ("RACCORD_RETRY_BACKOFF_MS", "1"),
            ("API_KEY", "secret"),
        ]))
        .unwrap();
        assert_eq!(cfg.store_backend(), StoreBackend::Memory);
        assert_eq!(cfg.retry().cas_attempts, 9);
        assert_eq!(cfg.retry().backoff, Duration::from_millis(1));
        assert_eq!(cfg.api_key(), Some("secret"));
    }

    #[test]
    fn zero_attempts_are_rejected() {
        assert!(core_config_from_lookup(lookup(&[("RACCORD_CAS_ATTEMPTS", "0")])).is_err());
        assert!(core_config_from_lookup(lookup(&[("RACCORD_STORAGE_ATTEMPTS", "x")])).is_err());
    }
}

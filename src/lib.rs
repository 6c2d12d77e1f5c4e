//! Caches downloaded browser driver binaries on local disk.
//!
//! The library answers two questions: whether a usable driver already exists
//! for a given identity, and where a freshly downloaded driver archive ended
//! up once extracted. Identities combine the operating system, driver name,
//! unified driver version, and the browser version the driver targets. Entries
//! stay usable for a configurable number of whole days.
//!
//! Fetching archives and resolving which versions to request are left to the
//! caller; see [`cache::DriverCache`] for the lookup and save flow.

pub mod cache;
mod cli;
mod error;
mod fs;
mod observability;
#[doc(hidden)]
pub mod test_support;

pub use cli::run;
pub use error::{
    CacheError, CacheErrorKind, CacheResult, ConfigError, ConfigResult, Result, WdmError,
};

use camino::Utf8PathBuf;
use color_eyre::eyre::eyre;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;

use crate::cache::DriverCacheConfig;

/// Environment variable naming the parallel test worker.
pub const WORKER_ID_ENV: &str = "WDM_WORKER_ID";

/// Captures cache settings supplied via `WDM_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, OrthoConfig, Default)]
#[ortho_config(prefix = "WDM")]
///
/// # Examples
/// ```
/// use webdriver_cache::WdmEnvCfg;
///
/// let cfg = WdmEnvCfg::default();
/// assert!(cfg.cache_dir.is_none());
/// ```
pub struct WdmEnvCfg {
    /// Stores the cache beside the project when `true` (`WDM_LOCAL`).
    pub local: Option<bool>,
    /// Base directory for the cache (`WDM_CACHE_DIR`).
    pub cache_dir: Option<Utf8PathBuf>,
    /// Validity window in whole days (`WDM_VALID_RANGE`).
    pub valid_range: Option<u32>,
    /// Log switch for the command-line tool; `0` silences it (`WDM_LOG`).
    pub log: Option<u32>,
}

impl WdmEnvCfg {
    /// Loads configuration from environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable holds a value of the wrong type.
    pub fn load() -> ConfigResult<Self> {
        let args = [OsString::from("wdm_cache")];
        Self::load_from_iter(args).map_err(|err| ConfigError::from(eyre!(err)))
    }

    /// Converts the settings into a [`DriverCacheConfig`].
    ///
    /// The worker identity is read from [`WORKER_ID_ENV`].
    #[must_use]
    pub fn to_cache_config(&self) -> DriverCacheConfig {
        let mut config = DriverCacheConfig::new().with_local(self.local.unwrap_or(false));

        if let Some(ref dir) = self.cache_dir {
            config = config.with_root_dir(dir.clone());
        }
        if let Some(range) = self.valid_range {
            config = config.with_valid_range(range);
        }
        if let Some(worker) = worker_id_from_env() {
            config = config.with_worker_id(worker);
        }
        config
    }

    /// Returns `false` when logging was switched off with `WDM_LOG=0`.
    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.log != Some(0)
    }
}

/// Reads the worker identity, ignoring blank and non-UTF-8 values.
#[must_use]
pub fn worker_id_from_env() -> Option<String> {
    let raw = std::env::var(WORKER_ID_ENV).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}

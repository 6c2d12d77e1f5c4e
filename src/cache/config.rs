//! Configuration for the driver cache.
//!
//! Resolves the cache root from an explicit [`DriverCacheConfig`] rather than
//! ambient process state, so callers (and tests) control every input.
//!
//! # Root precedence
//!
//! The root is derived in three steps, each later step overriding the
//! earlier ones:
//!
//! 1. `~/.wdm`, namespaced by the worker identity when one is set
//! 2. `{root_dir}/.wdm[/{worker}]` when a root override is supplied
//! 3. `{project_dir}/.wdm[/{worker}]` when local mode is enabled
//!
//! Local mode therefore silently discards a caller-supplied root override.
//! Existing caches rely on this ordering, so it is preserved as-is.

use camino::Utf8PathBuf;
use std::path::PathBuf;

/// Name of the folder holding all cache state beneath a chosen base directory.
pub const ROOT_FOLDER_NAME: &str = ".wdm";

/// Default validity window, in whole days.
pub const DEFAULT_VALID_RANGE: u32 = 1;

/// Configuration for the driver cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCacheConfig {
    /// Caller-supplied base directory; ignored in local mode.
    pub root_dir: Option<Utf8PathBuf>,
    /// Stores the cache beside the project instead of the user's home.
    pub local: bool,
    /// Identity of a parallel test worker whose cache must stay isolated.
    pub worker_id: Option<String>,
    /// Number of whole days an entry stays usable after it was recorded.
    pub valid_range: u32,
    /// Project directory used as the base in local mode.
    pub project_dir: Utf8PathBuf,
}

impl DriverCacheConfig {
    /// Creates a configuration with default settings, capturing the current
    /// working directory as the project directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root_dir: None,
            local: false,
            worker_id: None,
            valid_range: DEFAULT_VALID_RANGE,
            project_dir: current_project_dir(),
        }
    }

    /// Sets the caller-supplied base directory.
    #[must_use]
    pub fn with_root_dir(mut self, root_dir: impl Into<Utf8PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    /// Enables or disables project-local caching.
    #[must_use]
    pub const fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    /// Namespaces the cache root for the given worker identity.
    #[must_use]
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    /// Sets the validity window in whole days.
    #[must_use]
    pub const fn with_valid_range(mut self, valid_range: u32) -> Self {
        self.valid_range = valid_range;
        self
    }

    /// Overrides the project directory used in local mode.
    #[must_use]
    pub fn with_project_dir(mut self, project_dir: impl Into<Utf8PathBuf>) -> Self {
        self.project_dir = project_dir.into();
        self
    }

    /// Returns the worker identity when it is present and not blank.
    #[must_use]
    pub fn worker(&self) -> Option<&str> {
        self.worker_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

impl Default for DriverCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves the cache root for the given configuration.
///
/// This only computes a path; no directories are created.
///
/// # Examples
///
/// ```
/// use webdriver_cache::cache::{DriverCacheConfig, resolve_root_dir};
///
/// let config = DriverCacheConfig::new()
///     .with_root_dir("/srv/ci")
///     .with_worker_id("gw1");
/// assert_eq!(resolve_root_dir(&config).as_str(), "/srv/ci/.wdm/gw1");
/// ```
#[must_use]
pub fn resolve_root_dir(config: &DriverCacheConfig) -> Utf8PathBuf {
    let worker = config.worker();

    let mut root = namespaced(default_user_home_cache_path(), worker);

    if let Some(ref dir) = config.root_dir {
        root = namespaced(dir.join(ROOT_FOLDER_NAME), worker);
    }

    if config.local {
        root = namespaced(config.project_dir.join(ROOT_FOLDER_NAME), worker);
    }

    root
}

/// Returns the fallback cache location inside the user's home directory.
///
/// Falls back to the system temporary directory when no home directory can
/// be determined.
#[must_use]
pub fn default_user_home_cache_path() -> Utf8PathBuf {
    dirs::home_dir()
        .and_then(|home| Utf8PathBuf::from_path_buf(home).ok())
        .or_else(|| Utf8PathBuf::from_path_buf(std::env::temp_dir()).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("/tmp"))
        .join(ROOT_FOLDER_NAME)
}

fn namespaced(base: Utf8PathBuf, worker: Option<&str>) -> Utf8PathBuf {
    match worker {
        Some(id) => base.join(id),
        None => base,
    }
}

fn current_project_dir() -> Utf8PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|dir: PathBuf| Utf8PathBuf::from_path_buf(dir).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
}

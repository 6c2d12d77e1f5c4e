//! The driver cache handle tying root resolution, layout and metadata together.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use super::config::{DriverCacheConfig, resolve_root_dir};
use super::metadata::MetadataStore;

/// Directory beneath the cache root holding extracted drivers.
pub const DRIVERS_DIR_NAME: &str = "drivers";

/// Observability target for cache operations.
const LOG_TARGET: &str = "wdm::cache";

/// Disk-backed cache of driver binaries.
///
/// Layout beneath the resolved root:
///
/// ```text
/// {root}/drivers.json
/// {root}/drivers/{name}/{os_type}/{unified_version}/...
/// ```
///
/// The cache performs blocking I/O and holds no in-memory state beyond its
/// paths; every lookup reloads the metadata document.
#[derive(Debug, Clone)]
pub struct DriverCache {
    root_dir: Utf8PathBuf,
    drivers_dir: Utf8PathBuf,
    metadata: MetadataStore,
    valid_range: u32,
}

impl DriverCache {
    /// Creates a cache from an explicit configuration.
    ///
    /// Only paths are computed; nothing is created on disk until the first
    /// save.
    #[must_use]
    pub fn new(config: &DriverCacheConfig) -> Self {
        if let Some(worker) = config.worker() {
            debug!(target: LOG_TARGET, worker = %worker, "namespacing cache for worker");
        }

        let root_dir = resolve_root_dir(config);
        debug!(target: LOG_TARGET, root = %root_dir, valid_range = config.valid_range, "driver cache configured");

        Self {
            drivers_dir: root_dir.join(DRIVERS_DIR_NAME),
            metadata: MetadataStore::in_root(&root_dir),
            valid_range: config.valid_range,
            root_dir,
        }
    }

    /// Resolved cache root.
    #[must_use]
    pub fn root_dir(&self) -> &Utf8Path {
        &self.root_dir
    }

    /// Directory holding extracted drivers.
    #[must_use]
    pub fn drivers_dir(&self) -> &Utf8Path {
        &self.drivers_dir
    }

    /// Location of the metadata document.
    #[must_use]
    pub fn metadata_path(&self) -> &Utf8Path {
        self.metadata.path()
    }

    /// Store backing the metadata document.
    #[must_use]
    pub const fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Validity window in whole days.
    #[must_use]
    pub const fn valid_range(&self) -> u32 {
        self.valid_range
    }

    /// Directory holding one unpacked driver version.
    #[must_use]
    pub fn driver_dir(&self, name: &str, os_type: &str, unified_version: &str) -> Utf8PathBuf {
        self.drivers_dir
            .join(name)
            .join(os_type)
            .join(unified_version)
    }
}

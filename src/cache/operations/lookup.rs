//! Cache lookup and hit/miss detection.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::cache::driver_cache::DriverCache;
use crate::cache::key::{CacheKey, Driver, format_version};

/// Observability target for cache operations.
const LOG_TARGET: &str = "wdm::cache";

/// Why a lookup did not produce a usable driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// No metadata entry exists for the identity.
    NoEntry,
    /// The conventionally named binary is absent from the driver directory.
    BinaryMissing,
    /// The entry is older than the validity window.
    Stale,
    /// The stored entry could not be decoded.
    InvalidEntry,
}

/// Result of a cache lookup operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookupResult {
    /// Cache hit: the entry is fresh and its binary exists.
    Hit {
        /// Binary path recorded when the driver was saved.
        binary_path: Utf8PathBuf,
    },
    /// Cache miss: the driver needs to be downloaded.
    Miss(MissReason),
}

impl CacheLookupResult {
    /// Returns the binary path on a hit.
    #[must_use]
    pub fn into_path(self) -> Option<Utf8PathBuf> {
        match self {
            Self::Hit { binary_path } => Some(binary_path),
            Self::Miss(_) => None,
        }
    }
}

impl DriverCache {
    /// Finds a usable cached driver for the given identity.
    ///
    /// Returns the binary path recorded at save time when an entry exists,
    /// the driver binary is still on disk, and the entry is younger than the
    /// validity window. Any failure is a miss and leaves metadata untouched.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use webdriver_cache::cache::{BrowserType, DriverCache, DriverCacheConfig, DriverSpec};
    ///
    /// let cache = DriverCache::new(&DriverCacheConfig::new());
    /// let driver = DriverSpec::new("geckodriver", "linux64", "0.34.0", "121", BrowserType::Firefox);
    /// match cache.find_driver(&driver) {
    ///     Some(path) => println!("using cached driver at {path}"),
    ///     None => println!("cache miss, need to download"),
    /// }
    /// ```
    #[must_use]
    pub fn find_driver<D: Driver + ?Sized>(&self, driver: &D) -> Option<Utf8PathBuf> {
        self.check_cache(driver).into_path()
    }

    /// Same as [`DriverCache::find_driver`], judging freshness against
    /// `today`.
    #[must_use]
    pub fn find_driver_on<D: Driver + ?Sized>(
        &self,
        driver: &D,
        today: NaiveDate,
    ) -> Option<Utf8PathBuf> {
        self.check_cache_on(driver, today).into_path()
    }

    /// Looks up the driver, reporting why a miss occurred.
    #[must_use]
    pub fn check_cache<D: Driver + ?Sized>(&self, driver: &D) -> CacheLookupResult {
        self.check_cache_on(driver, Local::now().date_naive())
    }

    /// Looks up the driver against `today`, reporting why a miss occurred.
    #[must_use]
    pub fn check_cache_on<D: Driver + ?Sized>(
        &self,
        driver: &D,
        today: NaiveDate,
    ) -> CacheLookupResult {
        let unified_version = format_version(driver.browser_type(), driver.version());
        let key = CacheKey::new(
            driver.os_type(),
            driver.name(),
            &unified_version,
            driver.browser_version(),
        );

        let metadata = self.metadata().load();
        if !metadata.contains_key(key.as_str()) {
            info!(
                target: LOG_TARGET,
                key = %key,
                "There is no [{}] {} for browser {} in cache",
                driver.os_type(),
                driver.name(),
                driver.browser_version()
            );
            return CacheLookupResult::Miss(MissReason::NoEntry);
        }

        let expected_binary = self
            .driver_dir(driver.name(), driver.os_type(), &unified_version)
            .join(driver.binary_name());
        if !expected_binary.exists() {
            log_binary_missing(&key, &expected_binary);
            return CacheLookupResult::Miss(MissReason::BinaryMissing);
        }

        let entry = match metadata.entry(key.as_str()) {
            Ok(Some(entry)) => entry,
            Ok(None) => return CacheLookupResult::Miss(MissReason::NoEntry),
            Err(err) => {
                warn!(target: LOG_TARGET, key = %key, error = %err, "ignoring unreadable cache entry");
                return CacheLookupResult::Miss(MissReason::InvalidEntry);
            }
        };

        match entry.is_fresh(today, self.valid_range()) {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    target: LOG_TARGET,
                    key = %key,
                    timestamp = %entry.timestamp,
                    valid_range = self.valid_range(),
                    "cache entry is stale"
                );
                return CacheLookupResult::Miss(MissReason::Stale);
            }
            Err(err) => {
                warn!(target: LOG_TARGET, key = %key, error = %err, "ignoring unreadable cache entry");
                return CacheLookupResult::Miss(MissReason::InvalidEntry);
            }
        }

        let binary_path = entry.binary_path;
        info!(target: LOG_TARGET, path = %binary_path, "Driver [{binary_path}] found in cache");
        CacheLookupResult::Hit { binary_path }
    }
}

fn log_binary_missing(key: &CacheKey, expected: &Utf8Path) {
    debug!(
        target: LOG_TARGET,
        key = %key,
        path = %expected,
        "cached driver binary is missing"
    );
}

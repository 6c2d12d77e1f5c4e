//! Cache population after successful downloads.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::cache::archive::{DownloadedFile, save_file};
use crate::cache::driver_cache::DriverCache;
use crate::cache::key::{CacheKey, Driver, format_version};
use crate::cache::metadata::CacheEntry;
use crate::error::{CacheError, CacheErrorKind, CacheResult};

/// Observability target for cache operations.
const LOG_TARGET: &str = "wdm::cache";

impl DriverCache {
    /// Stores a freshly downloaded driver and records it as valid today.
    ///
    /// The file is written beneath
    /// `{root}/drivers/{name}/{os_type}/{unified_version}/`, unpacked in place,
    /// and the driver binary is selected from the extracted files. The
    /// metadata entry is keyed by the driver identity.
    ///
    /// # Errors
    ///
    /// Returns [`CacheErrorKind::Unpack`] when saving or extracting fails,
    /// [`CacheErrorKind::BinaryNotFound`] when no extracted file can be
    /// designated as the binary, and other kinds when the metadata document
    /// cannot be rewritten.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use webdriver_cache::cache::{
    ///     BrowserType, DownloadedFile, DriverCache, DriverCacheConfig, DriverSpec,
    /// };
    ///
    /// let cache = DriverCache::new(&DriverCacheConfig::new());
    /// let driver = DriverSpec::new("geckodriver", "linux64", "0.34.0", "121", BrowserType::Firefox);
    /// let archive = DownloadedFile::new("geckodriver-v0.34.0-linux64.tar.gz", Vec::new());
    /// let binary = cache.save_file_to_cache(&driver, &archive)?;
    /// println!("driver stored at {binary}");
    /// # Ok::<(), webdriver_cache::CacheError>(())
    /// ```
    pub fn save_file_to_cache<D: Driver + ?Sized>(
        &self,
        driver: &D,
        file: &DownloadedFile,
    ) -> CacheResult<Utf8PathBuf> {
        self.save_file_to_cache_on(driver, file, Local::now().date_naive())
    }

    /// Same as [`DriverCache::save_file_to_cache`], recording `date` as the
    /// entry timestamp.
    ///
    /// # Errors
    ///
    /// See [`DriverCache::save_file_to_cache`].
    pub fn save_file_to_cache_on<D: Driver + ?Sized>(
        &self,
        driver: &D,
        file: &DownloadedFile,
        date: NaiveDate,
    ) -> CacheResult<Utf8PathBuf> {
        let unified_version = format_version(driver.browser_type(), driver.version());
        let path = self.driver_dir(driver.name(), driver.os_type(), &unified_version);

        log_populate_start(driver, &path, file);

        let files = unpack_into(file, &path)?;
        let binary = select_binary(&files, driver.name())?;
        let binary_path = path.join(binary);

        let key = CacheKey::new(
            driver.os_type(),
            driver.name(),
            &unified_version,
            driver.browser_version(),
        );
        self.metadata()
            .merge_and_save(&key, &CacheEntry::new(date, binary_path.clone()))?;

        info!(target: LOG_TARGET, path = %path, "Driver has been saved in cache [{path}]");
        Ok(binary_path)
    }
}

/// Picks the driver binary among extracted file names.
///
/// A single extracted file is the binary regardless of its name. Otherwise
/// the first file whose name contains `driver_name` wins.
///
/// # Errors
///
/// Returns [`CacheErrorKind::BinaryNotFound`] when no file qualifies.
///
/// # Examples
///
/// ```
/// use webdriver_cache::cache::select_binary;
///
/// let files = vec!["README.txt".to_owned(), "geckodriver".to_owned()];
/// assert_eq!(select_binary(&files, "geckodriver")?, "geckodriver");
/// # Ok::<(), webdriver_cache::CacheError>(())
/// ```
pub fn select_binary<'a>(files: &'a [String], driver_name: &str) -> CacheResult<&'a str> {
    if let [only] = files {
        return Ok(only.as_str());
    }

    files
        .iter()
        .find(|file| file.contains(driver_name))
        .map(String::as_str)
        .ok_or_else(|| CacheError::binary_not_found(driver_name, files))
}

fn unpack_into(file: &DownloadedFile, path: &Utf8Path) -> CacheResult<Vec<String>> {
    save_file(file, path)
        .and_then(|archive| archive.unpack(path))
        .map_err(|report| CacheError::new(CacheErrorKind::Unpack, report))
}

fn log_populate_start<D: Driver + ?Sized>(driver: &D, path: &Utf8Path, file: &DownloadedFile) {
    debug!(
        target: LOG_TARGET,
        driver = driver.name(),
        os_type = driver.os_type(),
        version = driver.version(),
        browser_version = driver.browser_version(),
        file = file.filename(),
        path = %path,
        "populating cache"
    );
}

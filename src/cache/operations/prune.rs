//! Explicit removal of unusable cache entries.
//!
//! Lookups never delete anything; stale entries only go away when a caller
//! asks for it here.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDate};
use color_eyre::eyre::Context;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use tracing::{debug, info};

use crate::cache::driver_cache::DriverCache;
use crate::cache::metadata::{CacheEntry, Metadata};
use crate::error::CacheResult;

/// Observability target for cache operations.
const LOG_TARGET: &str = "wdm::cache";

impl DriverCache {
    /// Removes entries that are stale, undecodable, or whose binary is gone.
    ///
    /// Matching keys are dropped from the metadata document and their driver
    /// directories are deleted unless a remaining entry still points into
    /// them. Returns the removed keys in document order.
    ///
    /// # Errors
    ///
    /// Returns an error when the metadata lock cannot be acquired, the
    /// document cannot be rewritten, or a driver directory cannot be removed.
    pub fn prune_stale(&self) -> CacheResult<Vec<String>> {
        self.prune_stale_on(Local::now().date_naive())
    }

    /// Same as [`DriverCache::prune_stale`], judging freshness against
    /// `today`.
    ///
    /// # Errors
    ///
    /// See [`DriverCache::prune_stale`].
    pub fn prune_stale_on(&self, today: NaiveDate) -> CacheResult<Vec<String>> {
        let _lock = self.metadata().lock()?;
        let mut metadata = self.metadata().load();

        let (removed, kept) = partition_entries(&metadata, today, self.valid_range());
        if removed.is_empty() {
            debug!(target: LOG_TARGET, "nothing to prune");
            return Ok(Vec::new());
        }

        for (key, _) in &removed {
            metadata.remove(key);
        }
        self.metadata().write(&metadata)?;

        let referenced: BTreeSet<Utf8PathBuf> = kept
            .iter()
            .filter_map(|entry| self.version_dir_of(&entry.binary_path))
            .collect();
        for dir in removed
            .iter()
            .filter_map(|(_, entry)| entry.as_ref())
            .filter_map(|entry| self.version_dir_of(&entry.binary_path))
            .filter(|dir| !referenced.contains(dir))
        {
            remove_dir_if_present(&dir)?;
        }

        let keys: Vec<String> = removed.into_iter().map(|(key, _)| key).collect();
        info!(target: LOG_TARGET, count = keys.len(), "pruned stale cache entries");
        Ok(keys)
    }

    /// Maps a binary path back to its `{name}/{os_type}/{version}` directory.
    ///
    /// Returns `None` unless the path lies below the drivers directory using
    /// plain components only, so `..` segments never escape the layout.
    fn version_dir_of(&self, binary_path: &Utf8Path) -> Option<Utf8PathBuf> {
        let relative = binary_path.strip_prefix(self.drivers_dir()).ok()?;
        let parts = relative
            .components()
            .map(|component| match component {
                Utf8Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect::<Option<Vec<&str>>>()?;
        let [name, os_type, version, _, ..] = parts.as_slice() else {
            return None;
        };
        Some(self.drivers_dir().join(name).join(os_type).join(version))
    }
}

type Removed = Vec<(String, Option<CacheEntry>)>;

fn partition_entries(
    metadata: &Metadata,
    today: NaiveDate,
    valid_range: u32,
) -> (Removed, Vec<CacheEntry>) {
    let mut removed = Vec::new();
    let mut kept = Vec::new();

    for key in metadata.keys() {
        match metadata.entry(key) {
            Ok(Some(entry)) => {
                let usable = entry.binary_path.exists()
                    && entry.is_fresh(today, valid_range).unwrap_or(false);
                if usable {
                    kept.push(entry);
                } else {
                    removed.push((key.to_owned(), Some(entry)));
                }
            }
            Ok(None) | Err(_) => removed.push((key.to_owned(), None)),
        }
    }

    (removed, kept)
}

fn remove_dir_if_present(dir: &Utf8Path) -> CacheResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(target: LOG_TARGET, path = %dir, "removed driver directory");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err)
            .with_context(|| format!("failed to remove driver directory {dir}"))
            .map_err(Into::into),
    }
}

//! Cross-process file locking for metadata rewrites.
//!
//! Serialises read-modify-write cycles on the metadata document so processes
//! sharing one cache root do not drop each other's keys. On Unix systems this
//! uses `flock(2)` advisory locking. On non-Unix platforms locking is a no-op.

use camino::Utf8Path;
use std::fs::{File, OpenOptions};
use std::io;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Subdirectory within the cache root for lock files.
const LOCKS_SUBDIR: &str = ".locks";

/// Guard that holds an exclusive file lock until dropped.
#[derive(Debug)]
pub struct CacheLock {
    _file: File,
}

impl CacheLock {
    /// Acquires an exclusive lock named after the resource it protects.
    ///
    /// Blocks until any other holder releases the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or the lock cannot
    /// be acquired.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use camino::Utf8Path;
    /// use webdriver_cache::cache::CacheLock;
    ///
    /// let root = Utf8Path::new("/tmp/wdm-cache");
    /// let _lock = CacheLock::acquire_exclusive(root, "drivers.json")?;
    /// # Ok::<(), std::io::Error>(())
    /// ```
    #[cfg(unix)]
    pub fn acquire_exclusive(root: &Utf8Path, resource: &str) -> io::Result<Self> {
        let locks_dir = root.join(LOCKS_SUBDIR);
        std::fs::create_dir_all(&locks_dir)?;

        let lock_path = locks_dir.join(format!("{resource}.lock"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        // SAFETY: `file` owns a valid descriptor for the duration of the call
        // and is moved into the guard afterwards, so the descriptor is not
        // closed while `flock` runs.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { _file: file })
    }

    /// No-op lock acquisition on non-Unix platforms.
    #[cfg(not(unix))]
    pub fn acquire_exclusive(root: &Utf8Path, resource: &str) -> io::Result<Self> {
        let locks_dir = root.join(LOCKS_SUBDIR);
        std::fs::create_dir_all(&locks_dir)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(locks_dir.join(format!("{resource}.lock")))?;
        Ok(Self { _file: file })
    }
}

//! Disk-backed cache for downloaded browser driver binaries.
//!
//! Drivers are keyed by operating system, driver name, unified driver
//! version, and the browser version they pair with. Each entry records the
//! day it was written, and lookups treat an entry as usable only while it is
//! younger than the configured validity window and its binary is still on
//! disk.
//!
//! # Layout
//!
//! ```text
//! {root}/drivers.json                                   metadata document
//! {root}/drivers/{name}/{os_type}/{unified_version}/    extracted archive
//! ```
//!
//! # Cache Location
//!
//! See [`resolve_root_dir`] for how the root is chosen. Local mode overrides
//! an explicit root directory; this long-standing precedence is kept so
//! existing caches continue to resolve to the same place.
//!
//! # Cross-Process Coordination
//!
//! Metadata rewrites are serialised with a file lock and replace the document
//! atomically. Concurrent saves of the same driver directory are not
//! coordinated; parallel test workers should use distinct worker identities.

mod archive;
mod config;
mod driver_cache;
mod key;
mod lock;
mod metadata;
mod operations;

pub use archive::{ArchiveKind, DownloadedFile, SavedArchive, save_file};
pub use config::{
    DEFAULT_VALID_RANGE, DriverCacheConfig, ROOT_FOLDER_NAME, default_user_home_cache_path,
    resolve_root_dir,
};
pub use driver_cache::{DRIVERS_DIR_NAME, DriverCache};
pub use key::{BrowserType, CacheKey, Driver, DriverSpec, format_version};
pub use lock::CacheLock;
pub use metadata::{CacheEntry, DATE_FORMAT, METADATA_FILE_NAME, Metadata, MetadataStore};
pub use operations::{CacheLookupResult, MissReason, select_binary};

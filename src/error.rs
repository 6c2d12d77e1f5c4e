//! Domain error types for the driver cache.

use color_eyre::Report;
use color_eyre::eyre::eyre;
use thiserror::Error;

/// Result alias for operations that may return a [`WdmError`].
pub type Result<T> = std::result::Result<T, WdmError>;

/// Result alias for cache-specific fallible operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Result alias for configuration fallible operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level error exposed by the crate.
#[derive(Debug, Error)]
pub enum WdmError {
    /// Indicates a cache operation failed.
    #[error("driver cache operation failed")]
    Cache(#[from] CacheError),
    /// Indicates configuration parsing failed.
    #[error("configuration parsing failed")]
    Config(#[from] ConfigError),
    /// Indicates writing command output failed.
    #[error("failed to write output")]
    Io(#[from] std::io::Error),
}

/// Categorises cache failures so callers can branch on structured errors.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum CacheErrorKind {
    /// Represents errors without a more specific semantic meaning.
    #[default]
    Other,
    /// No extracted file could be designated as the driver binary.
    BinaryNotFound,
    /// Saving or unpacking a downloaded archive failed.
    Unpack,
    /// The metadata lock could not be acquired.
    Lock,
}

/// Captures cache-specific failures.
#[derive(Debug, Error)]
#[error("{report}")]
pub struct CacheError {
    kind: CacheErrorKind,
    #[source]
    report: Report,
}

impl CacheError {
    /// Constructs a new cache error with the provided kind and diagnostic
    /// report.
    #[must_use]
    pub const fn new(kind: CacheErrorKind, report: Report) -> Self {
        Self { kind, report }
    }

    /// Builds the error raised when extraction yields no usable binary.
    #[must_use]
    pub fn binary_not_found(driver_name: &str, files: &[String]) -> Self {
        Self::new(
            CacheErrorKind::BinaryNotFound,
            eyre!("Can't find binary for {driver_name} among {files:?}"),
        )
    }

    /// Returns the semantic category for this cache failure.
    #[must_use]
    pub const fn kind(&self) -> CacheErrorKind {
        self.kind
    }

    /// Extracts the underlying diagnostic report.
    pub fn into_report(self) -> Report {
        self.report
    }
}

impl From<Report> for CacheError {
    fn from(report: Report) -> Self {
        Self::new(CacheErrorKind::Other, report)
    }
}

/// Captures configuration failures.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ConfigError(#[from] Report);

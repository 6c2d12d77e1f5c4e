//! Driver identities and the composite keys derived from them.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Browser family a driver targets.
///
/// The family decides how driver versions are unified before they become part
/// of a cache key or directory path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BrowserType {
    /// Google Chrome.
    Google,
    /// Chromium.
    Chromium,
    /// Brave.
    Brave,
    /// Microsoft Edge.
    Msedge,
    /// Mozilla Firefox.
    Firefox,
    /// Opera.
    Opera,
    /// Any other browser, identified by name.
    Other(String),
}

impl BrowserType {
    /// Returns `true` for browsers built on Chromium.
    #[must_use]
    pub const fn is_chromium_family(&self) -> bool {
        matches!(self, Self::Google | Self::Chromium | Self::Brave | Self::Msedge)
    }

    /// Returns the canonical name of the browser type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Google => "google-chrome",
            Self::Chromium => "chromium",
            Self::Brave => "brave-browser",
            Self::Msedge => "msedge",
            Self::Firefox => "firefox",
            Self::Opera => "opera",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for BrowserType {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parsed = match raw.trim().to_ascii_lowercase().as_str() {
            "google-chrome" | "google" | "chrome" => Self::Google,
            "chromium" => Self::Chromium,
            "brave-browser" | "brave" => Self::Brave,
            "msedge" | "edge" => Self::Msedge,
            "firefox" => Self::Firefox,
            "opera" => Self::Opera,
            _ => Self::Other(raw.trim().to_owned()),
        };
        Ok(parsed)
    }
}

impl fmt::Display for BrowserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unifies a driver version according to the browser family.
///
/// Chromium-family versions keep their first three components so that
/// patch-level releases share one cache slot. Empty and `latest` versions,
/// and every version for other families, pass through unchanged.
///
/// # Examples
///
/// ```
/// use webdriver_cache::cache::{BrowserType, format_version};
///
/// assert_eq!(format_version(&BrowserType::Google, "114.0.5735.90"), "114.0.5735");
/// assert_eq!(format_version(&BrowserType::Firefox, "0.34.0"), "0.34.0");
/// ```
#[must_use]
pub fn format_version(browser_type: &BrowserType, version: &str) -> String {
    if !browser_type.is_chromium_family() || version.is_empty() || version == "latest" {
        return version.to_owned();
    }
    version.split('.').take(3).collect::<Vec<_>>().join(".")
}

/// Accessors describing the driver artifact being cached.
pub trait Driver {
    /// Driver name, e.g. `geckodriver`.
    fn name(&self) -> &str;
    /// Operating system and architecture, e.g. `linux64`.
    fn os_type(&self) -> &str;
    /// Raw driver version before unification.
    fn version(&self) -> &str;
    /// Version of the browser the driver is paired with.
    fn browser_version(&self) -> &str;
    /// Browser family used for version unification.
    fn browser_type(&self) -> &BrowserType;
    /// Conventional executable name probed on lookup.
    ///
    /// Platforms whose `os_type` starts with `win` carry an `.exe` suffix.
    fn binary_name(&self) -> String;
}

/// Plain-data [`Driver`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSpec {
    /// Driver name.
    pub name: String,
    /// Operating system and architecture.
    pub os_type: String,
    /// Raw driver version.
    pub version: String,
    /// Paired browser version.
    pub browser_version: String,
    /// Browser family.
    pub browser_type: BrowserType,
    /// Explicit executable name; derived from the driver name when absent.
    pub binary_name: Option<String>,
}

impl DriverSpec {
    /// Creates a driver description without an explicit binary name.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        os_type: impl Into<String>,
        version: impl Into<String>,
        browser_version: impl Into<String>,
        browser_type: BrowserType,
    ) -> Self {
        Self {
            name: name.into(),
            os_type: os_type.into(),
            version: version.into(),
            browser_version: browser_version.into(),
            browser_type,
            binary_name: None,
        }
    }

    /// Sets an explicit executable name.
    #[must_use]
    pub fn with_binary_name(mut self, binary_name: impl Into<String>) -> Self {
        self.binary_name = Some(binary_name.into());
        self
    }
}

impl Driver for DriverSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn os_type(&self) -> &str {
        &self.os_type
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn browser_version(&self) -> &str {
        &self.browser_version
    }

    fn browser_type(&self) -> &BrowserType {
        &self.browser_type
    }

    fn binary_name(&self) -> String {
        if let Some(ref explicit) = self.binary_name {
            return explicit.clone();
        }
        if self.os_type.starts_with("win") {
            format!("{}.exe", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Composite metadata key for one driver identity.
///
/// Rendered as `{os_type}_{name}_{unified_version}_for_{browser_version}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds a key from already-unified components.
    #[must_use]
    pub fn new(os_type: &str, name: &str, unified_version: &str, browser_version: &str) -> Self {
        Self(format!(
            "{os_type}_{name}_{unified_version}_for_{browser_version}"
        ))
    }

    /// Builds the key for a driver, unifying its version first.
    #[must_use]
    pub fn for_driver<D: Driver + ?Sized>(driver: &D) -> Self {
        let unified = format_version(driver.browser_type(), driver.version());
        Self::new(
            driver.os_type(),
            driver.name(),
            &unified,
            driver.browser_version(),
        )
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

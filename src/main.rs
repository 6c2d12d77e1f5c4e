//! Command-line access to the local driver cache.
//!
//! Looks up, stores, and prunes cached driver binaries using the same layout
//! and metadata document as the library. Configuration is provided via
//! `WDM_*` environment variables. `find` exits with status `1` on a cache
//! miss.

use std::process::ExitCode;

fn main() -> color_eyre::eyre::Result<ExitCode> {
    let code = webdriver_cache::run().map_err(|err| color_eyre::eyre::eyre!(err))?;
    Ok(code)
}

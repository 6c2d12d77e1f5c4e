//! Command-line front end over [`DriverCache`].

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::process::ExitCode;

use crate::WdmEnvCfg;
use crate::cache::{BrowserType, DownloadedFile, DriverCache, DriverSpec};
use crate::error::{CacheError, CacheErrorKind, Result};
use crate::observability::init_logging;

/// Inspect and populate the local driver cache.
#[derive(Debug, Parser)]
#[command(name = "wdm_cache", version)]
struct Cli {
    /// Base directory for the cache; overrides `WDM_CACHE_DIR`.
    #[arg(long, global = true)]
    cache_dir: Option<Utf8PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the cached driver path; exits with status 1 on a miss.
    Find(IdentityArgs),
    /// Store a local driver archive and print the selected binary path.
    Save {
        /// Archive or executable to store.
        archive: Utf8PathBuf,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Remove stale entries and print the removed keys.
    Prune,
    /// Print the resolved cache root.
    Root,
}

#[derive(Debug, Args)]
struct IdentityArgs {
    /// Driver name, e.g. `geckodriver`.
    #[arg(long)]
    name: String,
    /// Operating system and architecture, e.g. `linux64`.
    #[arg(long)]
    os_type: String,
    /// Driver version.
    #[arg(long)]
    driver_version: String,
    /// Browser version the driver targets.
    #[arg(long)]
    browser_version: String,
    /// Browser family.
    #[arg(long, default_value = "google-chrome")]
    browser_type: BrowserType,
    /// Executable name probed on lookup.
    #[arg(long)]
    binary_name: Option<String>,
}

impl IdentityArgs {
    fn to_driver(&self) -> DriverSpec {
        let driver = DriverSpec::new(
            self.name.clone(),
            self.os_type.clone(),
            self.driver_version.clone(),
            self.browser_version.clone(),
            self.browser_type.clone(),
        );
        match self.binary_name {
            Some(ref binary) => driver.with_binary_name(binary.clone()),
            None => driver,
        }
    }
}

/// Parses process arguments and runs the requested cache command.
///
/// Configuration comes from `WDM_*` environment variables.
///
/// # Errors
///
/// Returns an error when configuration is invalid, a cache operation fails,
/// or output cannot be written.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let env = WdmEnvCfg::load()?;
    init_logging(env.logging_enabled());
    execute(cli, &env, &mut io::stdout().lock())
}

fn execute(cli: Cli, env: &WdmEnvCfg, out: &mut impl Write) -> Result<ExitCode> {
    let mut config = env.to_cache_config();
    if let Some(dir) = cli.cache_dir {
        config = config.with_root_dir(dir);
    }
    let cache = DriverCache::new(&config);

    match cli.command {
        Command::Find(identity) => match cache.find_driver(&identity.to_driver()) {
            Some(path) => {
                writeln!(out, "{path}")?;
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(ExitCode::FAILURE),
        },
        Command::Save { archive, identity } => {
            let file = DownloadedFile::from_path(&archive)
                .map_err(|report| CacheError::new(CacheErrorKind::Unpack, report))?;
            let binary = cache.save_file_to_cache(&identity.to_driver(), &file)?;
            writeln!(out, "{binary}")?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Prune => {
            for key in cache.prune_stale()? {
                writeln!(out, "{key}")?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Root => {
            writeln!(out, "{}", cache.root_dir())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse arguments")
    }

    fn run_in(args: &[&str]) -> (ExitCode, String) {
        let mut out = Vec::new();
        let code = execute(parse(args), &WdmEnvCfg::default(), &mut out).expect("execute");
        (code, String::from_utf8(out).expect("utf8 output"))
    }

    #[test]
    fn root_prints_resolved_directory() {
        let temp = tempdir().expect("tempdir");
        let base = temp.path().to_str().expect("utf8 path");

        let (code, output) = run_in(&["wdm_cache", "--cache-dir", base, "root"]);

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(output.trim_end(), format!("{base}/.wdm"));
    }

    #[test]
    fn save_then_find_prints_binary_path() {
        let temp = tempdir().expect("tempdir");
        let base = temp.path().to_str().expect("utf8 path");
        let download = temp.path().join("geckodriver");
        fs::write(&download, b"gecko").expect("write download");
        let download_str = download.to_str().expect("utf8 path");
        let identity = [
            "--name",
            "geckodriver",
            "--os-type",
            "linux64",
            "--driver-version",
            "0.34.0",
            "--browser-version",
            "121",
            "--browser-type",
            "firefox",
        ];

        let mut save_args = vec!["wdm_cache", "--cache-dir", base, "save", download_str];
        save_args.extend(identity);
        let (save_code, saved) = run_in(&save_args);

        let mut find_args = vec!["wdm_cache", "--cache-dir", base, "find"];
        find_args.extend(identity);
        let (find_code, found) = run_in(&find_args);

        assert_eq!(save_code, ExitCode::SUCCESS);
        assert_eq!(find_code, ExitCode::SUCCESS);
        assert_eq!(saved, found);
        assert!(saved.trim_end().ends_with("drivers/geckodriver/linux64/0.34.0/geckodriver"));
    }

    #[test]
    fn find_miss_exits_with_failure() {
        let temp = tempdir().expect("tempdir");
        let base = temp.path().to_str().expect("utf8 path");

        let (code, output) = run_in(&[
            "wdm_cache",
            "--cache-dir",
            base,
            "find",
            "--name",
            "chromedriver",
            "--os-type",
            "linux64",
            "--driver-version",
            "114.0.5735.90",
            "--browser-version",
            "114",
        ]);

        assert_eq!(code, ExitCode::FAILURE);
        assert!(output.is_empty());
    }

    #[test]
    fn browser_type_defaults_to_chrome() {
        let cli = parse(&[
            "wdm_cache",
            "find",
            "--name",
            "chromedriver",
            "--os-type",
            "win64",
            "--driver-version",
            "1",
            "--browser-version",
            "1",
        ]);
        let Command::Find(identity) = cli.command else {
            panic!("expected find command");
        };
        assert_eq!(identity.browser_type, BrowserType::Google);
        assert_eq!(identity.to_driver().binary_name, None);
    }
}

//! Validates translating `WDM_*` environment settings into cache configuration.

use camino::Utf8PathBuf;
use color_eyre::eyre::{Result, ensure};
use rstest::rstest;
use webdriver_cache::cache::{DEFAULT_VALID_RANGE, DriverCache, resolve_root_dir};
use webdriver_cache::{WORKER_ID_ENV, WdmEnvCfg, worker_id_from_env};

const VARS: [&str; 5] = [
    "WDM_LOCAL",
    "WDM_CACHE_DIR",
    "WDM_VALID_RANGE",
    "WDM_LOG",
    WORKER_ID_ENV,
];

/// Runs `action` with only the listed `WDM_*` variables set.
fn with_wdm_env<R>(vars: &[(&str, &str)], action: impl FnOnce() -> R) -> R {
    let scoped: Vec<(&str, Option<&str>)> = VARS
        .iter()
        .map(|name| {
            let value = vars
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| *value);
            (*name, value)
        })
        .collect();
    temp_env::with_vars(scoped, action)
}

#[rstest]
fn empty_environment_uses_defaults() -> Result<()> {
    let cfg = with_wdm_env(&[], WdmEnvCfg::load)?;
    let config = cfg.to_cache_config();

    ensure!(cfg.logging_enabled(), "logging should default to on");
    ensure!(config.root_dir.is_none(), "no root override expected");
    ensure!(!config.local, "local mode should default to off");
    ensure!(config.worker().is_none(), "no worker expected");
    ensure!(config.valid_range == DEFAULT_VALID_RANGE, "unexpected range");
    Ok(())
}

#[rstest]
fn cache_dir_and_range_flow_into_config() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let base = temp.path().to_string_lossy().into_owned();

    let cache = with_wdm_env(
        &[("WDM_CACHE_DIR", base.as_str()), ("WDM_VALID_RANGE", "5")],
        || -> Result<DriverCache> {
            let cfg = WdmEnvCfg::load()?;
            Ok(DriverCache::new(&cfg.to_cache_config()))
        },
    )?;

    ensure!(cache.valid_range() == 5, "range was {}", cache.valid_range());
    ensure!(
        cache.root_dir() == Utf8PathBuf::from(format!("{base}/.wdm")).as_path(),
        "unexpected root {}",
        cache.root_dir()
    );
    Ok(())
}

#[rstest]
fn local_mode_places_cache_in_project_dir() -> Result<()> {
    let cfg = with_wdm_env(&[("WDM_LOCAL", "true")], WdmEnvCfg::load)?;
    let project = Utf8PathBuf::from("/work/project");
    let config = cfg.to_cache_config().with_project_dir(project.clone());

    ensure!(config.local, "WDM_LOCAL=true should enable local mode");
    ensure!(
        resolve_root_dir(&config) == project.join(".wdm"),
        "unexpected root {}",
        resolve_root_dir(&config)
    );
    Ok(())
}

#[rstest]
#[case("0", false)]
#[case("1", true)]
fn log_switch_reads_wdm_log(#[case] value: &str, #[case] enabled: bool) -> Result<()> {
    let cfg = with_wdm_env(&[("WDM_LOG", value)], WdmEnvCfg::load)?;
    ensure!(
        cfg.logging_enabled() == enabled,
        "WDM_LOG={value} should give enabled={enabled}"
    );
    Ok(())
}

#[rstest]
fn invalid_range_is_reported() {
    let outcome = with_wdm_env(&[("WDM_VALID_RANGE", "soon")], WdmEnvCfg::load);
    assert!(outcome.is_err(), "non-numeric range should fail to load");
}

#[rstest]
#[case("gw3", Some("gw3"))]
#[case("  gw4 ", Some("gw4"))]
#[case("   ", None)]
#[case("", None)]
#[case("7", Some("7"))]
fn worker_id_is_trimmed_and_blank_ignored(
    #[case] raw: &str,
    #[case] expected: Option<&str>,
) {
    let worker = with_wdm_env(&[(WORKER_ID_ENV, raw)], worker_id_from_env);
    assert_eq!(worker.as_deref(), expected);
}

#[rstest]
fn worker_id_nests_cache_root() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let base = temp.path().to_string_lossy().into_owned();

    let config = with_wdm_env(
        &[("WDM_CACHE_DIR", base.as_str()), (WORKER_ID_ENV, "gw1")],
        || -> Result<_> { Ok(WdmEnvCfg::load()?.to_cache_config()) },
    )?;

    ensure!(
        resolve_root_dir(&config) == Utf8PathBuf::from(format!("{base}/.wdm/gw1")),
        "unexpected root {}",
        resolve_root_dir(&config)
    );
    Ok(())
}

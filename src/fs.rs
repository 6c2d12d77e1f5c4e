//! Shared filesystem helpers built on capability-scoped directory handles.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs::Dir};
use color_eyre::eyre::{Context, Result};
use std::io::ErrorKind;

/// Resolves a path to an ambient directory handle paired with the relative path component.
///
/// Absolute paths are opened relative to the ambient root; relative paths reuse the current
/// working directory.
pub(crate) fn ambient_dir_and_path(path: &Utf8Path) -> Result<(Dir, Utf8PathBuf)> {
    if path.has_root() {
        let stripped = path
            .strip_prefix("/")
            .map_or_else(|_| path.to_path_buf(), Utf8Path::to_path_buf);
        let dir = Dir::open_ambient_dir("/", ambient_authority())
            .context("open ambient root directory")?;
        Ok((dir, stripped))
    } else {
        let dir = Dir::open_ambient_dir(".", ambient_authority())
            .context("open ambient working directory")?;
        Ok((dir, path.to_path_buf()))
    }
}

/// Ensures the provided path exists, creating intermediate directories when required.
pub(crate) fn ensure_dir_exists(path: &Utf8Path) -> Result<()> {
    let (dir, relative) = ambient_dir_and_path(path)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }

    dir.create_dir_all(relative.as_std_path())
        .or_else(|err| {
            if err.kind() == ErrorKind::AlreadyExists {
                Ok(())
            } else {
                Err(err)
            }
        })
        .with_context(|| format!("create {}", path.as_str()))
}

/// Marks the file at `path` as executable by everyone.
#[cfg(unix)]
pub(crate) fn make_executable(path: &Utf8Path) -> Result<()> {
    use cap_std::fs::{Permissions, PermissionsExt};

    let (dir, relative) = ambient_dir_and_path(path)?;
    dir.set_permissions(relative.as_std_path(), Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.as_str()))
}

/// Executable bits do not exist on this platform.
#[cfg(not(unix))]
pub(crate) fn make_executable(_path: &Utf8Path) -> Result<()> {
    Ok(())
}

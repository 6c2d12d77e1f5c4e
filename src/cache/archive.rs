//! Saving and unpacking downloaded driver archives.
//!
//! Supports:
//! - zip archives (`.zip`)
//! - gzip-compressed tarballs (`.tar.gz`, `.tgz`)
//! - bare executables, which are kept as-is

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, Result, eyre};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use tracing::{debug, trace};

use crate::fs::{ensure_dir_exists, make_executable};

/// Observability target for archive operations.
const LOG_TARGET: &str = "wdm::cache::archive";

/// A file produced by the fetcher, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    filename: String,
    content: Vec<u8>,
}

impl DownloadedFile {
    /// Wraps downloaded bytes under the file name reported by the server.
    ///
    /// Only the final path component of `filename` is kept.
    #[must_use]
    pub fn new(filename: &str, content: Vec<u8>) -> Self {
        let name = Utf8Path::new(filename)
            .file_name()
            .unwrap_or(filename)
            .to_owned();
        Self {
            filename: name,
            content,
        }
    }

    /// Reads a local file as if it had just been downloaded.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or has no file name.
    pub fn from_path(path: &Utf8Path) -> Result<Self> {
        let filename = path
            .file_name()
            .ok_or_else(|| eyre!("{path} does not name a file"))?;
        let content = fs::read(path).with_context(|| format!("read {path}"))?;
        Ok(Self::new(filename, content))
    }

    /// File name the download will be stored under.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Raw downloaded bytes.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// Archive layout, detected from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// A zip archive.
    Zip,
    /// A gzip-compressed tarball.
    TarGz,
    /// Not an archive; the file itself is the payload.
    Plain,
}

impl ArchiveKind {
    /// Detects the archive kind from a file name.
    #[must_use]
    pub fn detect(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Self::Zip
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else {
            Self::Plain
        }
    }
}

/// A downloaded file persisted inside a cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArchive {
    path: Utf8PathBuf,
    kind: ArchiveKind,
}

impl SavedArchive {
    /// Location of the stored file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Detected archive kind.
    #[must_use]
    pub const fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Extracts the archive into `dest`, returning extracted file names
    /// relative to `dest` in archive order. Directories are not listed.
    ///
    /// A plain file is not extracted; its own name is returned.
    ///
    /// # Errors
    ///
    /// Returns an error when the archive cannot be read or a member cannot be
    /// written.
    pub fn unpack(&self, dest: &Utf8Path) -> Result<Vec<String>> {
        ensure_dir_exists(dest)?;
        let files = match self.kind {
            ArchiveKind::Zip => unpack_zip(&self.path, dest)?,
            ArchiveKind::TarGz => unpack_tar_gz(&self.path, dest)?,
            ArchiveKind::Plain => vec![self.plain_member_name()?],
        };
        debug!(
            target: LOG_TARGET,
            archive = %self.path,
            dest = %dest,
            count = files.len(),
            "archive unpacked"
        );
        Ok(files)
    }

    fn plain_member_name(&self) -> Result<String> {
        make_executable(&self.path)?;
        self.path
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| eyre!("{} does not name a file", self.path))
    }
}

/// Writes `file` into `directory`, creating the directory when needed.
///
/// # Errors
///
/// Returns an error when the directory or the file cannot be written.
pub fn save_file(file: &DownloadedFile, directory: &Utf8Path) -> Result<SavedArchive> {
    ensure_dir_exists(directory)?;
    let path = directory.join(file.filename());
    fs::write(&path, file.content()).with_context(|| format!("write {path}"))?;
    debug!(target: LOG_TARGET, path = %path, bytes = file.content().len(), "download saved");
    Ok(SavedArchive {
        kind: ArchiveKind::detect(file.filename()),
        path,
    })
}

fn unpack_zip(archive_path: &Utf8Path, dest: &Utf8Path) -> Result<Vec<String>> {
    let file = File::open(archive_path).with_context(|| format!("open {archive_path}"))?;
    let mut archive =
        zip::ZipArchive::new(file).with_context(|| format!("read zip {archive_path}"))?;

    let mut names = Vec::new();
    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .with_context(|| format!("read zip entry {index} of {archive_path}"))?;
        let Some(enclosed) = member.enclosed_name() else {
            trace!(target: LOG_TARGET, name = member.name(), "skipping unsafe zip entry");
            continue;
        };
        let Some(relative) = enclosed.to_str().map(str::to_owned) else {
            trace!(target: LOG_TARGET, "skipping non-UTF-8 zip entry");
            continue;
        };
        let out_path = dest.join(&relative);

        if member.is_dir() {
            ensure_dir_exists(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            ensure_dir_exists(parent)?;
        }

        let mut out = File::create(&out_path).with_context(|| format!("create {out_path}"))?;
        io::copy(&mut member, &mut out).with_context(|| format!("extract {out_path}"))?;
        apply_zip_mode(&out_path, member.unix_mode())?;

        trace!(target: LOG_TARGET, path = %out_path, "extracted zip entry");
        names.push(relative);
    }
    Ok(names)
}

#[cfg(unix)]
fn apply_zip_mode(path: &Utf8Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        Some(bits) if bits & 0o111 != 0 => {
            fs::set_permissions(path, fs::Permissions::from_mode(bits & 0o777))
                .with_context(|| format!("chmod {path}"))
        }
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_zip_mode(_path: &Utf8Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

fn unpack_tar_gz(archive_path: &Utf8Path, dest: &Utf8Path) -> Result<Vec<String>> {
    let file = File::open(archive_path).with_context(|| format!("open {archive_path}"))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);

    let mut names = Vec::new();
    for entry in archive
        .entries()
        .with_context(|| format!("read tarball {archive_path}"))?
    {
        let mut entry = entry.with_context(|| format!("read entry of {archive_path}"))?;
        let is_file = entry.header().entry_type().is_file();
        let relative = entry
            .path()
            .context("read tar entry path")?
            .to_string_lossy()
            .trim_start_matches("./")
            .to_owned();

        let unpacked = entry
            .unpack_in(dest.as_std_path())
            .with_context(|| format!("extract {relative} into {dest}"))?;
        if !unpacked {
            trace!(target: LOG_TARGET, name = %relative, "skipping unsafe tar entry");
            continue;
        }
        if is_file && !relative.is_empty() {
            trace!(target: LOG_TARGET, name = %relative, "extracted tar entry");
            names.push(relative);
        }
    }
    Ok(names)
}

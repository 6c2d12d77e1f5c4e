//! Persistence for the `drivers.json` metadata document.
//!
//! The document is a single JSON object mapping cache keys to entries of the
//! form `{"timestamp": "DD/MM/YYYY", "binary_path": "..."}`. Keys keep their
//! insertion order and unrelated entries are carried through rewrites
//! verbatim. Rewrites go through a temporary file that is renamed over the
//! document, so readers never observe a partially written file.
//!
//! Non-ASCII characters are written as `\uXXXX` escapes so documents produced
//! by other `drivers.json` writers survive a rewrite byte for byte.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use color_eyre::eyre::{Context, eyre};
use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::key::CacheKey;
use super::lock::CacheLock;
use crate::error::{CacheError, CacheErrorKind, CacheResult};
use crate::fs::ensure_dir_exists;

/// Date format used for entry timestamps.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// File name of the metadata document inside the cache root.
pub const METADATA_FILE_NAME: &str = "drivers.json";

/// Observability target for metadata operations.
const LOG_TARGET: &str = "wdm::cache::metadata";

/// Metadata recorded for one cached driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Day the entry was written, formatted with [`DATE_FORMAT`].
    pub timestamp: String,
    /// Absolute path of the selected driver binary.
    pub binary_path: Utf8PathBuf,
}

impl CacheEntry {
    /// Creates an entry recorded on `date`.
    #[must_use]
    pub fn new(date: NaiveDate, binary_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            timestamp: date.format(DATE_FORMAT).to_string(),
            binary_path: binary_path.into(),
        }
    }

    /// Parses the recorded timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error when the timestamp does not match [`DATE_FORMAT`].
    pub fn recorded_on(&self) -> CacheResult<NaiveDate> {
        NaiveDate::parse_from_str(&self.timestamp, DATE_FORMAT)
            .with_context(|| format!("invalid cache timestamp '{}'", self.timestamp))
            .map_err(CacheError::from)
    }

    /// Whole days elapsed between the recorded timestamp and `today`.
    ///
    /// # Errors
    ///
    /// Returns an error when the timestamp cannot be parsed.
    pub fn age_in_days(&self, today: NaiveDate) -> CacheResult<i64> {
        Ok((today - self.recorded_on()?).num_days())
    }

    /// Returns `true` while the entry is younger than `valid_range` days.
    ///
    /// # Errors
    ///
    /// Returns an error when the timestamp cannot be parsed.
    pub fn is_fresh(&self, today: NaiveDate, valid_range: u32) -> CacheResult<bool> {
        Ok(self.age_in_days(today)? < i64::from(valid_range))
    }
}

/// In-memory view of the metadata document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Map<String, Value>,
}

impl Metadata {
    /// Returns `true` when the document holds `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Decodes the entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the stored value is not a valid entry.
    pub fn entry(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        self.entries
            .get(key)
            .map(|value| {
                CacheEntry::deserialize(value)
                    .with_context(|| format!("malformed metadata entry for {key}"))
                    .map_err(CacheError::from)
            })
            .transpose()
    }

    /// Inserts or overwrites the entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the entry cannot be converted to JSON.
    pub fn insert(&mut self, key: &CacheKey, entry: &CacheEntry) -> CacheResult<()> {
        let value = serde_json::to_value(entry).context("serialise metadata entry")?;
        self.entries.insert(key.as_str().to_owned(), value);
        Ok(())
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    /// Iterates over the stored keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the document holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the document as JSON indented with four spaces, escaping
    /// non-ASCII characters.
    ///
    /// # Errors
    ///
    /// Returns an error when serialisation fails.
    pub fn to_json(&self) -> CacheResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let formatter = AsciiFormatter {
            inner: PrettyFormatter::with_indent(b"    "),
        };
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.entries
            .serialize(&mut serializer)
            .context("serialise metadata document")?;
        Ok(buffer)
    }
}

/// Pretty formatter that escapes every non-ASCII character as `\uXXXX`.
struct AsciiFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl Formatter for AsciiFormatter<'_> {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut utf8 = [0_u8; 4];
        let mut utf16 = [0_u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(ch.encode_utf8(&mut utf8).as_bytes())?;
            } else {
                for unit in &*ch.encode_utf16(&mut utf16) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Reads and rewrites the metadata document at a fixed path.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: Utf8PathBuf,
}

impl MetadataStore {
    /// Creates a store for the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store for the default document inside `root`.
    #[must_use]
    pub fn in_root(root: &Utf8Path) -> Self {
        Self::new(root.join(METADATA_FILE_NAME))
    }

    /// Location of the metadata document.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Loads the document.
    ///
    /// A missing file yields an empty document. An unreadable or unparsable
    /// file is logged and also yields an empty document.
    #[must_use]
    pub fn load(&self) -> Metadata {
        if !self.path.exists() {
            debug!(target: LOG_TARGET, path = %self.path, "metadata document absent");
            return Metadata::default();
        }

        match self.read() {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    path = %self.path,
                    error = %err,
                    "Driver json error, treating cache metadata as empty"
                );
                Metadata::default()
            }
        }
    }

    /// Sets `key` to `entry` and rewrites the whole document.
    ///
    /// Other keys are carried over unchanged. The rewrite holds the metadata
    /// lock for its full read-modify-write cycle.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock cannot be acquired or the document
    /// cannot be written.
    pub fn merge_and_save(&self, key: &CacheKey, entry: &CacheEntry) -> CacheResult<()> {
        let _lock = self.lock()?;
        let mut metadata = self.load();
        metadata.insert(key, entry)?;
        self.write(&metadata)?;
        debug!(target: LOG_TARGET, key = %key, path = %self.path, "metadata entry saved");
        Ok(())
    }

    /// Acquires the exclusive metadata lock.
    pub(crate) fn lock(&self) -> CacheResult<CacheLock> {
        let root = self.parent_dir()?;
        ensure_dir_exists(root)?;
        CacheLock::acquire_exclusive(root, METADATA_FILE_NAME).map_err(|err| {
            CacheError::new(
                CacheErrorKind::Lock,
                eyre!(err).wrap_err(format!("failed to lock metadata in {root}")),
            )
        })
    }

    /// Atomically replaces the document with `metadata`.
    pub(crate) fn write(&self, metadata: &Metadata) -> CacheResult<()> {
        let dir = self.parent_dir()?;
        ensure_dir_exists(dir)?;

        let bytes = metadata.to_json()?;
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temporary metadata file in {dir}"))?;
        temp.write_all(&bytes)
            .with_context(|| format!("failed to write temporary metadata file in {dir}"))?;
        temp.as_file()
            .sync_all()
            .context("failed to flush temporary metadata file")?;
        temp.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to replace metadata document {}", self.path))?;
        Ok(())
    }

    fn read(&self) -> CacheResult<Metadata> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path))?;
        let entries: Map<String, Value> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path))?;
        Ok(Metadata { entries })
    }

    fn parent_dir(&self) -> CacheResult<&Utf8Path> {
        self.path
            .parent()
            .ok_or_else(|| CacheError::from(eyre!("metadata path {} has no parent", self.path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capture_warn_logs;
    use rstest::rstest;
    use tempfile::tempdir;

    fn day(year: i32, month: u32, day_of_month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day_of_month).expect("valid date")
    }

    fn store_in(temp: &tempfile::TempDir) -> MetadataStore {
        let root = Utf8Path::from_path(temp.path()).expect("utf8 path");
        MetadataStore::in_root(root)
    }

    #[test]
    fn entry_timestamp_uses_day_month_year() {
        let entry = CacheEntry::new(day(2024, 3, 7), "/cache/geckodriver");
        assert_eq!(entry.timestamp, "07/03/2024");
        assert_eq!(entry.recorded_on().expect("parse"), day(2024, 3, 7));
    }

    #[rstest]
    #[case(0, 1, true)]
    #[case(1, 1, false)]
    #[case(2, 3, true)]
    #[case(3, 3, false)]
    #[case(-2, 1, true)]
    fn freshness_compares_whole_days(
        #[case] age: i64,
        #[case] valid_range: u32,
        #[case] fresh: bool,
    ) {
        let today = day(2024, 6, 15);
        let recorded = today - chrono::Duration::days(age);
        let entry = CacheEntry::new(recorded, "/cache/driver");
        assert_eq!(entry.is_fresh(today, valid_range).expect("fresh"), fresh);
    }

    #[test]
    fn invalid_timestamp_is_an_error() {
        let entry = CacheEntry {
            timestamp: "2024-06-15".to_owned(),
            binary_path: Utf8PathBuf::from("/cache/driver"),
        };
        assert!(entry.recorded_on().is_err());
    }

    #[test]
    fn load_returns_empty_when_document_is_missing() {
        let temp = tempdir().expect("tempdir");
        assert!(store_in(&temp).load().is_empty());
    }

    #[test]
    fn load_recovers_from_corrupt_document() {
        let temp = tempdir().expect("tempdir");
        let store = store_in(&temp);
        fs::write(store.path(), b"{not json").expect("write corrupt document");

        let (logs, metadata) = capture_warn_logs(|| store.load());

        assert!(metadata.is_empty());
        assert!(
            logs.iter().any(|line| line.contains("Driver json error")),
            "expected a warning, got {logs:?}"
        );
    }

    #[test]
    fn load_treats_non_object_document_as_empty() {
        let temp = tempdir().expect("tempdir");
        let store = store_in(&temp);
        fs::write(store.path(), b"[1, 2, 3]").expect("write array document");

        assert!(store.load().is_empty());
    }

    #[test]
    fn merge_and_save_writes_four_space_indentation() {
        let temp = tempdir().expect("tempdir");
        let store = store_in(&temp);
        let key = CacheKey::new("linux64", "geckodriver", "0.34.0", "121");
        let entry = CacheEntry::new(day(2024, 1, 2), "/cache/geckodriver");

        store.merge_and_save(&key, &entry).expect("save");

        let raw = fs::read_to_string(store.path()).expect("read document");
        let expected = concat!(
            "{\n",
            "    \"linux64_geckodriver_0.34.0_for_121\": {\n",
            "        \"timestamp\": \"02/01/2024\",\n",
            "        \"binary_path\": \"/cache/geckodriver\"\n",
            "    }\n",
            "}"
        );
        assert_eq!(raw, expected);
    }

    #[test]
    fn merge_and_save_preserves_other_keys_verbatim() {
        let temp = tempdir().expect("tempdir");
        let store = store_in(&temp);
        fs::write(
            store.path(),
            br#"{"first": {"timestamp": "01/01/2020", "binary_path": "/a", "extra": [1, 2]}, "second": 7}"#,
        )
        .expect("seed document");

        let key = CacheKey::new("win64", "chromedriver", "114.0.5735", "114");
        store
            .merge_and_save(&key, &CacheEntry::new(day(2024, 5, 5), "/b"))
            .expect("save");

        let metadata = store.load();
        let keys: Vec<&str> = metadata.keys().collect();
        assert_eq!(keys, vec!["first", "second", key.as_str()]);
        assert_eq!(
            metadata.entries.get("first"),
            Some(&serde_json::json!({"timestamp": "01/01/2020", "binary_path": "/a", "extra": [1, 2]}))
        );
        assert_eq!(metadata.entries.get("second"), Some(&serde_json::json!(7)));
    }

    #[test]
    fn write_leaves_no_temporary_files_behind() {
        let temp = tempdir().expect("tempdir");
        let store = store_in(&temp);
        let key = CacheKey::new("linux64", "geckodriver", "0.34.0", "121");
        store
            .merge_and_save(&key, &CacheEntry::new(day(2024, 1, 2), "/cache/geckodriver"))
            .expect("save");

        let names: Vec<String> = fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        let mut sorted = names;
        sorted.sort();
        assert_eq!(sorted, vec![".locks".to_owned(), METADATA_FILE_NAME.to_owned()]);
    }

    #[test]
    fn malformed_entry_surfaces_as_error() {
        let temp = tempdir().expect("tempdir");
        let store = store_in(&temp);
        fs::write(store.path(), br#"{"key": {"timestamp": 5}}"#).expect("seed document");

        let metadata = store.load();
        assert!(metadata.contains_key("key"));
        assert!(metadata.entry("key").is_err());
        assert!(metadata.entry("missing").expect("lookup").is_none());
    }

    #[test]
    fn remove_drops_only_the_named_key() {
        let mut metadata = Metadata::default();
        let first = CacheKey::new("a", "b", "c", "d");
        let second = CacheKey::new("e", "f", "g", "h");
        let entry = CacheEntry::new(day(2024, 1, 1), "/x");
        metadata.insert(&first, &entry).expect("insert first");
        metadata.insert(&second, &entry).expect("insert second");

        assert!(metadata.remove(first.as_str()));
        assert!(!metadata.remove(first.as_str()));
        assert_eq!(metadata.len(), 1);
        assert!(metadata.contains_key(second.as_str()));
    }

    #[test]
    fn non_ascii_paths_are_escaped() {
        let mut metadata = Metadata::default();
        let key = CacheKey::new("linux64", "geckodriver", "0.34.0", "121");
        metadata
            .insert(&key, &CacheEntry::new(day(2024, 1, 2), "/home/jörg/𝔡/geckodriver"))
            .expect("insert");

        let raw = String::from_utf8(metadata.to_json().expect("render")).expect("utf8");

        assert!(raw.is_ascii(), "unexpected raw UTF-8 in {raw}");
        assert!(raw.contains(r"/home/j\u00f6rg/\ud835\udd21/geckodriver"), "got {raw}");
        let reloaded: Value = serde_json::from_str(&raw).expect("parse");
        assert_eq!(
            reloaded[key.as_str()]["binary_path"],
            Value::from("/home/jörg/𝔡/geckodriver")
        );
    }

    #[test]
    fn escaped_entries_survive_rewrite_byte_for_byte() {
        let temp = tempdir().expect("tempdir");
        let store = store_in(&temp);
        let seeded = concat!(
            "{\n",
            "    \"win64_chromedriver_114.0.5735_for_114\": {\n",
            "        \"timestamp\": \"01/02/2023\",\n",
            "        \"binary_path\": \"C:\\\\Users\\\\J\\u00f6rg\\\\chromedriver.exe\"\n",
            "    }"
        );
        fs::write(store.path(), format!("{seeded}\n}}")).expect("seed document");

        let key = CacheKey::new("linux64", "geckodriver", "0.34.0", "121");
        store
            .merge_and_save(&key, &CacheEntry::new(day(2024, 1, 2), "/cache/geckodriver"))
            .expect("save");

        let raw = fs::read_to_string(store.path()).expect("read document");
        assert!(raw.starts_with(seeded), "untouched entry was re-encoded: {raw}");
    }

    #[cfg(unix)]
    #[test]
    fn concurrent_savers_keep_every_key() {
        const WRITERS: usize = 8;
        const KEYS_PER_WRITER: usize = 10;

        let temp = tempdir().expect("tempdir");
        let root = Utf8Path::from_path(temp.path()).expect("utf8 path").to_path_buf();

        std::thread::scope(|scope| {
            for writer in 0..WRITERS {
                let shared_root = &root;
                scope.spawn(move || {
                    let store = MetadataStore::in_root(shared_root);
                    for index in 0..KEYS_PER_WRITER {
                        let key = CacheKey::new(
                            "linux64",
                            &format!("driver{writer}"),
                            &index.to_string(),
                            "121",
                        );
                        let entry =
                            CacheEntry::new(day(2024, 1, 2), format!("/cache/{writer}/{index}"));
                        store.merge_and_save(&key, &entry).expect("save");
                    }
                });
            }
        });

        let metadata = MetadataStore::in_root(&root).load();
        assert_eq!(metadata.len(), WRITERS * KEYS_PER_WRITER);
    }
}

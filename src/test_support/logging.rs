//! Captures tracing output for assertions in tests.
//!
//! The helpers record logs without timestamps so assertions can match
//! human-readable messages directly.

use std::io::{Result as IoResult, Write};
use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt;

struct BufferWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let mut guard = self
            .buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

/// Runs `action` with a subscriber recording events at `level` and above,
/// returning the captured lines alongside the closure result.
///
/// # Examples
/// ```
/// use tracing::Level;
/// use webdriver_cache::test_support::capture_logs;
///
/// let (logs, value) = capture_logs(Level::INFO, || {
///     tracing::info!("cache primed");
///     41 + 1
/// });
/// assert!(logs.iter().any(|line| line.contains("cache primed")));
/// assert_eq!(value, 42);
/// ```
#[must_use]
pub fn capture_logs<F, R>(level: Level, action: F) -> (Vec<String>, R)
where
    F: FnOnce() -> R,
{
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer_buffer = Arc::clone(&buffer);
    let subscriber = fmt()
        .with_max_level(level)
        .without_time()
        .with_ansi(false)
        .with_writer(move || BufferWriter {
            buffer: Arc::clone(&writer_buffer),
        })
        .finish();

    let result = with_default(subscriber, action);

    let bytes = buffer
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone();
    let content = String::from_utf8_lossy(&bytes);
    let logs = content.lines().map(str::to_owned).collect();
    (logs, result)
}

/// Captures `INFO`-level logs and above.
#[must_use]
pub fn capture_info_logs<F, R>(action: F) -> (Vec<String>, R)
where
    F: FnOnce() -> R,
{
    capture_logs(Level::INFO, action)
}

/// Captures `WARN`-level logs and above.
#[must_use]
pub fn capture_warn_logs<F, R>(action: F) -> (Vec<String>, R)
where
    F: FnOnce() -> R,
{
    capture_logs(Level::WARN, action)
}

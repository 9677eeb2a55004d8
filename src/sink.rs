//! Shared output stream for user-facing progress and results.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::error::Result;

/// A cloneable, thread-safe writer.
///
/// Tracking workers print concurrently; each line is written and flushed
/// under the lock so lines never interleave.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    /// Wraps a writer.
    #[must_use]
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Writes to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Discards everything.
    #[must_use]
    pub fn discard() -> Self {
        Self::new(io::sink())
    }

    /// Writes one line.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")?;
        writer.flush()
    }

    /// Writes `value` as indented JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let encoded = serde_json::to_string_pretty(value)?;
        self.write_line(&encoded)?;
        Ok(())
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}

/// In-memory writer for asserting on output.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn sink(&self) -> OutputSink {
        OutputSink::new(self.clone())
    }

    pub(crate) fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lines_and_json() {
        let buffer = SharedBuffer::default();
        let sink = buffer.sink();
        sink.write_line("hello").unwrap();
        sink.write_json(&json!({"a": 1})).unwrap();
        assert_eq!(buffer.contents(), "hello\n{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn test_clones_share_writer() {
        let buffer = SharedBuffer::default();
        let first = buffer.sink();
        let second = first.clone();
        first.write_line("one").unwrap();
        second.write_line("two").unwrap();
        assert_eq!(buffer.contents(), "one\ntwo\n");
    }
}

//! Byte sinks and the fan-out writer that duplicates output across them.
//!
//! A [`FanOutWriter`] always wraps at least one sink: it is created from a
//! primary sink and grows with [`FanOutWriter::with_sink`]. Writes and
//! flushes go to every sink in insertion order and stop at the first failure.
//! [`FanOutWriter::close`] is attempted on every sink and reports all failures.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//! use clio_core::{FanOutWriter, SharedBuffer};
//!
//! let response = SharedBuffer::new();
//! let backup = SharedBuffer::new();
//!
//! let mut writer = FanOutWriter::new(Box::new(response.clone()))
//!     .with_sink(Box::new(backup.clone()));
//! writer.write_all(b"%PDF-1.7").unwrap();
//! writer.close().unwrap();
//!
//! assert_eq!(response.to_vec(), b"%PDF-1.7");
//! assert_eq!(backup.to_vec(), b"%PDF-1.7");
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

/// A byte sink with an explicit close step.
pub trait Sink: Write + Send {
    /// Flushes and releases the sink. The default only flushes.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Sink for Vec<u8> {}

/// Closing a file syncs it to disk and blocks the calling thread; async
/// callers close from a blocking task.
impl Sink for File {
    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

/// A cloneable in-memory sink; every clone sees the same bytes.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the buffered bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }

    /// Takes the buffered bytes, leaving the buffer empty.
    pub fn take(&self) -> Bytes {
        Bytes::from(std::mem::take(&mut *self.inner.lock()))
    }

    /// Returns the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for SharedBuffer {}

/// Writes every byte to all of its sinks, in the order they were added.
pub struct FanOutWriter {
    sinks: Vec<Box<dyn Sink>>,
}

impl FanOutWriter {
    /// Creates a writer over a single primary sink.
    pub fn new(primary: Box<dyn Sink>) -> Self {
        Self {
            sinks: vec![primary],
        }
    }

    /// Appends another sink.
    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Closes every sink, even after earlier failures.
    pub fn close(mut self) -> Result<(), CloseError> {
        let total = self.sinks.len();
        let failures: Vec<(usize, io::Error)> = self
            .sinks
            .iter_mut()
            .enumerate()
            .filter_map(|(index, sink)| sink.close().err().map(|err| (index, err)))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CloseError { total, failures })
        }
    }
}

impl fmt::Debug for FanOutWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutWriter")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Write for FanOutWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in &mut self.sinks {
            sink.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

/// One or more sinks failed to close.
#[derive(Debug)]
pub struct CloseError {
    total: usize,
    failures: Vec<(usize, io::Error)>,
}

impl CloseError {
    /// Returns `(sink index, error)` for each sink that failed.
    pub fn failures(&self) -> &[(usize, io::Error)] {
        &self.failures
    }
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to close {} of {} output sinks",
            self.failures.len(),
            self.total
        )?;
        for (index, err) in &self.failures {
            write!(f, "; sink {index}: {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CloseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|(_, err)| err as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records writes and closes; can be told to fail.
    struct Recorder {
        buffer: SharedBuffer,
        closed: Arc<AtomicBool>,
        fail_writes: bool,
        fail_close: bool,
    }

    impl Recorder {
        fn new(fail_writes: bool, fail_close: bool) -> (Self, SharedBuffer, Arc<AtomicBool>) {
            let buffer = SharedBuffer::new();
            let closed = Arc::new(AtomicBool::new(false));
            let recorder = Self {
                buffer: buffer.clone(),
                closed: Arc::clone(&closed),
                fail_writes,
                fail_close,
            };
            (recorder, buffer, closed)
        }
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink gone"));
            }
            self.buffer.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Sink for Recorder {
        fn close(&mut self) -> io::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            if self.fail_close {
                Err(io::Error::new(io::ErrorKind::Other, "close failed"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_all_sinks_receive_same_bytes() {
        let (first, first_buf, _) = Recorder::new(false, false);
        let (second, second_buf, _) = Recorder::new(false, false);
        let mut writer = FanOutWriter::new(Box::new(first)).with_sink(Box::new(second));

        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        writer.flush().unwrap();
        writer.close().unwrap();

        assert_eq!(first_buf.to_vec(), b"hello world");
        assert_eq!(second_buf.to_vec(), b"hello world");
    }

    #[test]
    fn test_second_sink_failure_fails_write_and_still_closes_both() {
        let (first, first_buf, first_closed) = Recorder::new(false, false);
        let (second, _, second_closed) = Recorder::new(true, false);
        let mut writer = FanOutWriter::new(Box::new(first)).with_sink(Box::new(second));

        let err = writer.write_all(b"abc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(first_buf.to_vec(), b"abc");

        writer.close().unwrap();
        assert!(first_closed.load(Ordering::SeqCst));
        assert!(second_closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_first_sink_failure_stops_before_second() {
        let (first, _, _) = Recorder::new(true, false);
        let (second, second_buf, _) = Recorder::new(false, false);
        let mut writer = FanOutWriter::new(Box::new(first)).with_sink(Box::new(second));

        assert!(writer.write_all(b"abc").is_err());
        assert!(second_buf.is_empty());
    }

    #[test]
    fn test_close_aggregates_failures() {
        let (first, _, first_closed) = Recorder::new(false, true);
        let (second, _, second_closed) = Recorder::new(false, false);
        let (third, _, _) = Recorder::new(false, true);
        let writer = FanOutWriter::new(Box::new(first))
            .with_sink(Box::new(second))
            .with_sink(Box::new(third));

        let err = writer.close().unwrap_err();
        assert!(first_closed.load(Ordering::SeqCst));
        assert!(second_closed.load(Ordering::SeqCst));
        let indexes: Vec<usize> = err.failures().iter().map(|(i, _)| *i).collect();
        assert_eq!(indexes, vec![0, 2]);
        assert!(err.to_string().starts_with("failed to close 2 of 3 output sinks"));
    }

    #[test]
    fn test_shared_buffer_take() {
        let mut buffer = SharedBuffer::new();
        buffer.write_all(b"xyz").unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(&buffer.take()[..], b"xyz");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_debug_reports_sink_count() {
        let writer = FanOutWriter::new(Box::new(Vec::new())).with_sink(Box::new(Vec::new()));
        assert_eq!(format!("{writer:?}"), "FanOutWriter { sinks: 2 }");
    }

    #[test]
    fn test_file_sink_is_synced_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.pdf");
        let file = File::create(&path).unwrap();
        let buffer = SharedBuffer::new();
        let mut writer = FanOutWriter::new(Box::new(buffer.clone())).with_sink(Box::new(file));

        writer.write_all(b"%PDF").unwrap();
        writer.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF");
        assert_eq!(buffer.to_vec(), b"%PDF");
    }
}

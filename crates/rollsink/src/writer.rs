// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-file sink variants behind one capability interface.
//!
//! The rolling sink never touches files directly. It asks the factory here
//! for "an open sink that can emit a record and can be flushed", and the
//! factory selects one of a small closed set of variants: an exclusively
//! locked file (optionally buffered) or a shared file tolerating concurrent
//! writers.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Record-to-text formatter: renders one record into the output stream.
///
/// Opaque to this crate; the rendered bytes are written verbatim.
pub type FormatFn<R> = dyn Fn(&R, &mut dyn io::Write) -> io::Result<()> + Send + Sync;

/// An open file sink consumed by the rolling sink.
pub trait RecordSink<R>: Send {
    /// Format and append one record.
    fn emit(&mut self, record: &R) -> io::Result<()>;

    /// Flush any buffered bytes to disk.
    fn flush(&mut self) -> io::Result<()>;
}

impl<R> std::fmt::Debug for dyn RecordSink<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecordSink")
    }
}

/// Why opening a candidate file failed.
#[derive(Debug, Error)]
pub enum OpenError {
    /// Another process or handle already holds the file. Retryable by
    /// advancing the sequence number.
    #[error("log file is locked by another writer")]
    Locked,

    /// Any other failure (permissions, disk full, invalid path). Fatal for
    /// this open attempt.
    #[error(transparent)]
    Other(#[from] io::Error),
}

/// Options the rolling sink forwards to the factory.
#[derive(Debug, Clone)]
pub(crate) struct WriteOptions {
    pub size_limit: u64,
    pub buffered: bool,
    pub shared: bool,
    pub flush_interval: Option<Duration>,
}

/// Open a file sink for `path`, creating the directory lazily.
pub(crate) fn open_sink<R: 'static>(
    path: &Path,
    formatter: Arc<FormatFn<R>>,
    opts: &WriteOptions,
) -> Result<Box<dyn RecordSink<R>>, OpenError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(OpenError::Other)?;
    }

    if opts.shared {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(OpenError::Other)?;
        Ok(Box::new(SharedFileSink {
            formatter,
            file,
            path: path.to_path_buf(),
            size_limit: opts.size_limit,
            limit_warned: false,
            scratch: Vec::new(),
        }))
    } else {
        let file = open_exclusive(path)?;
        let written = file.metadata().map_err(OpenError::Other)?.len();
        let writer = if opts.buffered {
            SinkWriter::Buffered(BufWriter::new(file))
        } else {
            SinkWriter::Direct(file)
        };
        Ok(Box::new(FileSink {
            formatter,
            writer,
            path: path.to_path_buf(),
            written,
            size_limit: opts.size_limit,
            limit_warned: false,
            flush_interval: opts.flush_interval,
            last_flush: Instant::now(),
            scratch: Vec::new(),
        }))
    }
}

// The advisory lock is released when the descriptor closes.
#[cfg(unix)]
fn open_exclusive(path: &Path) -> Result<File, OpenError> {
    use std::os::unix::io::AsRawFd;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(OpenError::Other)?;
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(file);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::EWOULDBLOCK || code == libc::EAGAIN => Err(OpenError::Locked),
        _ => Err(OpenError::Other(err)),
    }
}

// Readers may share the file; a second writer hits a sharing violation.
#[cfg(windows)]
fn open_exclusive(path: &Path) -> Result<File, OpenError> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_READ: u32 = 0x1;
    const ERROR_SHARING_VIOLATION: i32 = 32;

    match OpenOptions::new()
        .create(true)
        .append(true)
        .share_mode(FILE_SHARE_READ)
        .open(path)
    {
        Ok(file) => Ok(file),
        Err(err) if err.raw_os_error() == Some(ERROR_SHARING_VIOLATION) => Err(OpenError::Locked),
        Err(err) => Err(OpenError::Other(err)),
    }
}

enum SinkWriter {
    Direct(File),
    Buffered(BufWriter<File>),
}

impl SinkWriter {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            SinkWriter::Direct(file) => file.write_all(buf),
            SinkWriter::Buffered(writer) => writer.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SinkWriter::Direct(file) => file.flush(),
            SinkWriter::Buffered(writer) => writer.flush(),
        }
    }
}

/// Exclusively owned file, advisory-locked against other writers.
struct FileSink<R> {
    formatter: Arc<FormatFn<R>>,
    writer: SinkWriter,
    path: PathBuf,
    written: u64,
    size_limit: u64,
    limit_warned: bool,
    flush_interval: Option<Duration>,
    last_flush: Instant,
    scratch: Vec<u8>,
}

impl<R> RecordSink<R> for FileSink<R> {
    fn emit(&mut self, record: &R) -> io::Result<()> {
        if self.limit_warned {
            return Ok(());
        }
        self.scratch.clear();
        (self.formatter)(record, &mut self.scratch)?;
        if self.written + self.scratch.len() as u64 > self.size_limit {
            self.limit_warned = true;
            tracing::warn!(
                path = %self.path.display(),
                limit = self.size_limit,
                "file size limit reached, dropping further records for this file"
            );
            return Ok(());
        }
        self.writer.write_all(&self.scratch)?;
        self.written += self.scratch.len() as u64;

        if let Some(interval) = self.flush_interval {
            if self.last_flush.elapsed() >= interval {
                self.writer.flush()?;
                self.last_flush = Instant::now();
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Append-mode file tolerating concurrent writers from other processes.
///
/// Unbuffered so that records from different writers interleave at record
/// granularity. The size limit is checked against the live file length,
/// which other writers may have grown.
struct SharedFileSink<R> {
    formatter: Arc<FormatFn<R>>,
    file: File,
    path: PathBuf,
    size_limit: u64,
    limit_warned: bool,
    scratch: Vec<u8>,
}

impl<R> RecordSink<R> for SharedFileSink<R> {
    fn emit(&mut self, record: &R) -> io::Result<()> {
        if self.limit_warned {
            return Ok(());
        }
        self.scratch.clear();
        (self.formatter)(record, &mut self.scratch)?;
        let length = self.file.metadata()?.len();
        if length + self.scratch.len() as u64 > self.size_limit {
            self.limit_warned = true;
            tracing::warn!(
                path = %self.path.display(),
                limit = self.size_limit,
                "file size limit reached, dropping further records for this file"
            );
            return Ok(());
        }
        self.file.write_all(&self.scratch)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn line_formatter() -> Arc<FormatFn<String>> {
        Arc::new(|record: &String, out: &mut dyn io::Write| writeln!(out, "{record}"))
    }

    fn options() -> WriteOptions {
        WriteOptions {
            size_limit: u64::MAX,
            buffered: false,
            shared: false,
            flush_interval: None,
        }
    }

    #[test]
    fn test_exclusive_sink_writes_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.log");
        let mut sink = open_sink(&path, line_formatter(), &options()).unwrap();
        sink.emit(&"one".to_string()).unwrap();
        sink.emit(&"two".to_string()).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }

    #[test]
    fn test_factory_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("out.log");
        let mut sink = open_sink(&path, line_formatter(), &options()).unwrap();
        sink.emit(&"hello".to_string()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_buffered_sink_flushes_on_demand() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.log");
        let opts = WriteOptions {
            buffered: true,
            ..options()
        };
        let mut sink = open_sink(&path, line_formatter(), &opts).unwrap();
        sink.emit(&"buffered".to_string()).unwrap();
        sink.flush().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "buffered\n");
    }

    #[test]
    fn test_size_limit_drops_overflowing_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.log");
        let opts = WriteOptions {
            size_limit: 10,
            ..options()
        };
        let mut sink = open_sink(&path, line_formatter(), &opts).unwrap();
        sink.emit(&"12345678".to_string()).unwrap(); // 9 bytes with newline
        sink.emit(&"overflow".to_string()).unwrap(); // would exceed the limit
        sink.emit(&"x".to_string()).unwrap(); // dropped, limit already hit
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "12345678\n");
    }

    #[test]
    fn test_shared_sinks_tolerate_each_other() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.log");
        let opts = WriteOptions {
            shared: true,
            ..options()
        };
        let mut first = open_sink(&path, line_formatter(), &opts).unwrap();
        let mut second = open_sink(&path, line_formatter(), &opts).unwrap();
        first.emit(&"from first".to_string()).unwrap();
        second.emit(&"from second".to_string()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("from first"));
        assert!(content.contains("from second"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exclusive_open_detects_locked_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locked.log");
        let _held = open_sink(&path, line_formatter(), &options()).unwrap();

        let err = open_sink(&path, line_formatter(), &options()).unwrap_err();
        assert!(matches!(err, OpenError::Locked));
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_is_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("released.log");
        drop(open_sink(&path, line_formatter(), &options()).unwrap());
        assert!(open_sink(&path, line_formatter(), &options()).is_ok());
    }
}

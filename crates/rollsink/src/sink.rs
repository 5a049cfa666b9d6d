// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The rolling file sink state machine.
//!
//! Holds the currently open file and the next checkpoint instant. Every
//! incoming record first aligns the open file to "now": the first record
//! opens a file, a record past the checkpoint closes the current file and
//! opens the next one, and everything else is appended to whichever file is
//! open. All transitions run under one mutex held for the whole operation,
//! so the sink is safe to drive from multiple producer threads.

use crate::clock::Clock;
use crate::config::RollingSinkBuilder;
use crate::error::SinkError;
use crate::retention::RetentionPolicy;
use crate::template::PathTemplate;
use crate::writer::{open_sink, FormatFn, OpenError, RecordSink, WriteOptions};
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Sequence-advancing open attempts per checkpoint. Exhausting the cap
/// defers further attempts to the next checkpoint instead of rescanning the
/// directory on every record.
const MAX_OPEN_ATTEMPTS: u32 = 3;

/// Counters describing what the sink has done so far.
#[derive(Debug, Clone, Default)]
pub struct SinkStats {
    /// Records appended to a file.
    pub records_written: u64,
    /// Records dropped because no file could be opened at the last boundary.
    pub records_dropped: u64,
    /// Write failures surfaced to callers.
    pub write_errors: u64,
    /// Checkpoint rollovers performed.
    pub rollovers: u64,
    /// Open attempts that found the candidate file locked.
    pub open_collisions: u64,
    /// Boundaries at which no file could be opened.
    pub failed_opens: u64,
    /// Files deleted by retention sweeps.
    pub files_deleted: u64,
}

struct SinkState<R> {
    current: Option<Box<dyn RecordSink<R>>>,
    current_path: Option<PathBuf>,
    next_checkpoint: Option<NaiveDateTime>,
    closed: bool,
    stats: SinkStats,
}

/// A log sink writing each record to one of a rotating set of files.
///
/// Files are selected by the time bucket of the wall clock at write time;
/// size and retention limits bound disk usage. Construct via
/// [`RollingFileSink::builder`].
pub struct RollingFileSink<R> {
    template: PathTemplate,
    formatter: Arc<FormatFn<R>>,
    policies: Vec<RetentionPolicy>,
    write_opts: WriteOptions,
    clock: Arc<dyn Clock>,
    state: Mutex<SinkState<R>>,
}

impl<R> std::fmt::Debug for RollingFileSink<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingFileSink").finish_non_exhaustive()
    }
}

impl<R: 'static> RollingFileSink<R> {
    /// Start building a sink for the given path pattern.
    pub fn builder(pattern: impl Into<String>) -> RollingSinkBuilder<R> {
        RollingSinkBuilder::new(pattern)
    }

    pub(crate) fn from_parts(
        template: PathTemplate,
        formatter: Arc<FormatFn<R>>,
        policies: Vec<RetentionPolicy>,
        write_opts: WriteOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            template,
            formatter,
            policies,
            write_opts,
            clock,
            state: Mutex::new(SinkState {
                current: None,
                current_path: None,
                next_checkpoint: None,
                closed: false,
                stats: SinkStats::default(),
            }),
        }
    }

    /// Emit one record to the file owning the current time bucket.
    ///
    /// If no file could be opened at the last checkpoint the record is
    /// silently dropped; opening is retried at the next checkpoint, not on
    /// every record. Rollover follows wall-clock arrival order, so a record
    /// arriving after the boundary lands in the new file regardless of any
    /// timestamp it carries.
    pub fn emit(&self, record: &R) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SinkError::Closed);
        }

        let now = self.clock.now();
        self.align(&mut state, now);

        match state.current.as_mut() {
            Some(sink) => match sink.emit(record) {
                Ok(()) => {
                    state.stats.records_written += 1;
                    Ok(())
                }
                Err(err) => {
                    state.stats.write_errors += 1;
                    Err(SinkError::Io(err))
                }
            },
            None => {
                state.stats.records_dropped += 1;
                Ok(())
            }
        }
    }

    /// Flush the currently open file, if any.
    pub fn flush(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SinkError::Closed);
        }
        if let Some(sink) = state.current.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Path of the currently open file, if any.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.state.lock().current_path.clone()
    }

    /// Snapshot of the sink's counters.
    pub fn stats(&self) -> SinkStats {
        self.state.lock().stats.clone()
    }

    /// Close the sink. Idempotent; every later [`emit`](Self::emit) fails
    /// with [`SinkError::Closed`].
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        Self::close_current(&mut state);
        state.closed = true;
    }

    fn align(&self, state: &mut SinkState<R>, now: NaiveDateTime) {
        match state.next_checkpoint {
            None => self.open_file(state, now),
            Some(checkpoint) if now >= checkpoint => {
                Self::close_current(state);
                state.stats.rollovers += 1;
                self.open_file(state, now);
            }
            Some(_) => {}
        }
    }

    fn open_file(&self, state: &mut SinkState<R>, now: NaiveDateTime) {
        // Set before any I/O so a failed open is not retried until the next
        // boundary, no matter how many records flood in meanwhile.
        let bucket = self.template.bucket();
        state.next_checkpoint = Some(bucket.next_bucket_start(now));

        let target = bucket.bucket_start(now);
        let mut sequence = self
            .template
            .existing_files()
            .iter()
            .filter(|file| file.bucket == target)
            .map(|file| file.sequence)
            .max()
            .unwrap_or(0);

        for _ in 0..MAX_OPEN_ATTEMPTS {
            let path = self.template.path_for(now, sequence);
            match open_sink(&path, Arc::clone(&self.formatter), &self.write_opts) {
                Ok(sink) => {
                    state.current = Some(sink);
                    state.current_path = Some(path.clone());
                    for policy in &self.policies {
                        state.stats.files_deleted +=
                            policy.apply(&self.template, &path, now) as u64;
                    }
                    return;
                }
                Err(OpenError::Locked) => {
                    state.stats.open_collisions += 1;
                    tracing::warn!(
                        path = %path.display(),
                        "log file is locked by another writer, advancing sequence"
                    );
                    sequence += 1;
                }
                Err(OpenError::Other(err)) => {
                    state.stats.failed_opens += 1;
                    tracing::error!(
                        path = %path.display(),
                        %err,
                        "failed to open log file, dropping records until the next checkpoint"
                    );
                    return;
                }
            }
        }

        state.stats.failed_opens += 1;
        tracing::error!(
            glob = self.template.search_glob(),
            "all candidate log files are locked, dropping records until the next checkpoint"
        );
    }

    fn close_current(state: &mut SinkState<R>) {
        if let Some(mut sink) = state.current.take() {
            if let Err(err) = sink.flush() {
                tracing::warn!(%err, "failed to flush log file on close");
            }
        }
        state.current_path = None;
        state.next_checkpoint = None;
    }
}

impl<R> Drop for RollingFileSink<R> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if !state.closed {
            if let Some(mut sink) = state.current.take() {
                let _ = sink.flush();
            }
            state.current_path = None;
            state.next_checkpoint = None;
            state.closed = true;
        }
    }
}

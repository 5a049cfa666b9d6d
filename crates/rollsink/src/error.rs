// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for sink construction and runtime emission.

use std::io;
use thiserror::Error;

/// Configuration errors, raised eagerly at build time and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("path pattern must not be empty")]
    EmptyPattern,

    #[error("path pattern must include a file name")]
    MissingFileName,

    #[error("path pattern contains more than one time placeholder")]
    MultiplePlaceholders,

    #[error("directory portion of a path pattern cannot contain a time placeholder")]
    PlaceholderInDirectory,

    #[error("a record formatter is required")]
    MissingFormatter,

    #[error("retained file count limit must be at least 1")]
    InvalidCountLimit,

    #[error("retained file age limit must be a positive duration")]
    InvalidAgeLimit,

    #[error("flush interval must be a positive duration")]
    InvalidFlushInterval,

    #[error("buffered writes cannot be combined with a shared log file")]
    BufferedSharedConflict,

    #[error("failed to resolve log directory: {0}")]
    Directory(#[from] io::Error),
}

/// Runtime errors surfaced by [`RollingFileSink`](crate::RollingFileSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink was closed; no further records can be emitted.
    #[error("rolling file sink has been closed")]
    Closed,

    /// Writing to the currently open file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sink construction: builder surface and plain-data configuration.
//!
//! All limits and flags are validated eagerly at build time; a sink that
//! constructs successfully never fails later for configuration reasons.

use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::retention::RetentionPolicy;
use crate::sink::RollingFileSink;
use crate::template::PathTemplate;
use crate::writer::{FormatFn, WriteOptions};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Default per-file size limit: 1 GiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 1 << 30;

/// Default retained-file count, the current file included.
pub const DEFAULT_RETAINED_FILES: usize = 31;

/// Builder for a [`RollingFileSink`].
///
/// ```rust,ignore
/// let sink = RollingFileSink::builder("logs/app-{Date}.log")
///     .formatter(|line: &String, out: &mut dyn Write| writeln!(out, "{line}"))
///     .retained_files(7)
///     .build()?;
/// ```
pub struct RollingSinkBuilder<R> {
    pattern: String,
    formatter: Option<Arc<FormatFn<R>>>,
    size_limit: u64,
    retained_files: Option<usize>,
    retained_age: Option<Duration>,
    buffered: bool,
    shared: bool,
    flush_interval: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl<R: 'static> RollingSinkBuilder<R> {
    pub(crate) fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            formatter: None,
            size_limit: DEFAULT_SIZE_LIMIT,
            retained_files: Some(DEFAULT_RETAINED_FILES),
            retained_age: None,
            buffered: false,
            shared: false,
            flush_interval: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the record-to-text formatter (required).
    pub fn formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&R, &mut dyn io::Write) -> io::Result<()> + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Set the per-file size limit in bytes.
    pub fn size_limit_bytes(mut self, limit: u64) -> Self {
        self.size_limit = limit;
        self
    }

    /// Keep at most `count` files, the current one included (must be ≥ 1).
    pub fn retained_files(mut self, count: usize) -> Self {
        self.retained_files = Some(count);
        self
    }

    /// Disable count-based retention entirely.
    pub fn no_retained_files(mut self) -> Self {
        self.retained_files = None;
        self
    }

    /// Delete rotated files older than `age` (must be positive).
    pub fn retained_age(mut self, age: Duration) -> Self {
        self.retained_age = Some(age);
        self
    }

    /// Buffer writes in memory. Mutually exclusive with [`shared`](Self::shared).
    pub fn buffered(mut self, buffered: bool) -> Self {
        self.buffered = buffered;
        self
    }

    /// Open files in a mode tolerating writers from other processes.
    /// Mutually exclusive with [`buffered`](Self::buffered).
    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Flush to disk at most once per `interval` (must be positive).
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Override the wall-clock source (tests supply a controllable stub).
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate the configuration and build the sink.
    pub fn build(self) -> Result<RollingFileSink<R>, ConfigError> {
        let formatter = self.formatter.ok_or(ConfigError::MissingFormatter)?;
        if self.buffered && self.shared {
            return Err(ConfigError::BufferedSharedConflict);
        }
        if self.retained_files == Some(0) {
            return Err(ConfigError::InvalidCountLimit);
        }
        if let Some(interval) = self.flush_interval {
            if interval.is_zero() {
                return Err(ConfigError::InvalidFlushInterval);
            }
        }

        let mut policies = Vec::new();
        if let Some(count) = self.retained_files {
            policies.push(RetentionPolicy::Count(count));
        }
        if let Some(age) = self.retained_age {
            if age.is_zero() {
                return Err(ConfigError::InvalidAgeLimit);
            }
            let age = chrono::Duration::from_std(age).map_err(|_| ConfigError::InvalidAgeLimit)?;
            policies.push(RetentionPolicy::Age(age));
        }

        let template = PathTemplate::new(&self.pattern)?;
        let write_opts = WriteOptions {
            size_limit: self.size_limit,
            buffered: self.buffered,
            shared: self.shared,
            flush_interval: self.flush_interval,
        };
        Ok(RollingFileSink::from_parts(
            template, formatter, policies, write_opts, self.clock,
        ))
    }
}

/// Plain-data mirror of the sink options, loadable from configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingConfig {
    /// Path pattern with at most one time placeholder.
    pub pattern: String,
    /// Per-file size limit in bytes.
    #[serde(default = "default_size_limit")]
    pub size_limit_bytes: u64,
    /// Retained-file count (`null` disables count retention).
    #[serde(default = "default_retained_files")]
    pub retained_files: Option<usize>,
    /// Retained-file age limit in seconds.
    #[serde(default)]
    pub retained_age_secs: Option<u64>,
    /// Buffer writes in memory.
    #[serde(default)]
    pub buffered: bool,
    /// Tolerate writers from other processes.
    #[serde(default)]
    pub shared: bool,
    /// Periodic disk-flush interval in seconds.
    #[serde(default)]
    pub flush_interval_secs: Option<u64>,
}

fn default_size_limit() -> u64 {
    DEFAULT_SIZE_LIMIT
}

fn default_retained_files() -> Option<usize> {
    Some(DEFAULT_RETAINED_FILES)
}

impl RollingConfig {
    /// Config with defaults for the given pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            size_limit_bytes: DEFAULT_SIZE_LIMIT,
            retained_files: Some(DEFAULT_RETAINED_FILES),
            retained_age_secs: None,
            buffered: false,
            shared: false,
            flush_interval_secs: None,
        }
    }

    /// Turn the config into a builder; the formatter still has to be set.
    pub fn builder<R: 'static>(&self) -> RollingSinkBuilder<R> {
        let mut builder = RollingSinkBuilder::new(self.pattern.clone())
            .size_limit_bytes(self.size_limit_bytes)
            .buffered(self.buffered)
            .shared(self.shared);
        builder = match self.retained_files {
            Some(count) => builder.retained_files(count),
            None => builder.no_retained_files(),
        };
        if let Some(secs) = self.retained_age_secs {
            builder = builder.retained_age(Duration::from_secs(secs));
        }
        if let Some(secs) = self.flush_interval_secs {
            builder = builder.flush_interval(Duration::from_secs(secs));
        }
        builder
    }
}

impl<R: 'static> RollingFileSink<R> {
    /// Build a sink from a plain-data config plus a formatter.
    pub fn from_config<F>(config: &RollingConfig, formatter: F) -> Result<Self, ConfigError>
    where
        F: Fn(&R, &mut dyn io::Write) -> io::Result<()> + Send + Sync + 'static,
    {
        config.builder().formatter(formatter).build()
    }
}

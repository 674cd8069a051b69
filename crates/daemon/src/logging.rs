// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup shared by `hvd` and `hv-backend`.
//!
//! Logs go to a daily-rolled file under the log directory. Stdout is never
//! used: for managed children it carries IPC frames.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::env;

/// Install the global subscriber. Keep the guard alive until exit or
/// buffered lines are lost.
pub fn init(log_dir: &Path, prefix: &str) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, format!("{prefix}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_new(env::log_filter()).unwrap_or_else(|_| EnvFilter::new("info"));
    let file = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
    let stderr = env::log_stderr()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing_subscriber::registry().with(filter).with(file).with(stderr).try_init()?;
    Ok(guard)
}

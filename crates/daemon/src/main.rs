// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hvd`: supervises the crawler and backend processes.

use anyhow::Result;
use clap::Parser;
use hv_daemon::supervisor::acquire_lock;
use hv_daemon::{logging, Supervisor, SupervisorConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hvd", version, about = "Harvest process supervisor")]
struct Cli {
    /// Config file (default: $HV_CONFIG or <state dir>/harvest.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SupervisorConfig::load(cli.config)?;
    let guard = logging::init(&config.log_dir, "hvd")?;
    let _lock = acquire_lock(&config.lock_path)?;

    tracing::info!(
        state_dir = %config.state_dir.display(),
        grace_ms = config.grace.as_millis() as u64,
        "supervisor starting"
    );
    let code = Supervisor::new(config).run().await?;
    tracing::info!(code, "supervisor exiting");

    drop(guard);
    std::process::exit(code);
}

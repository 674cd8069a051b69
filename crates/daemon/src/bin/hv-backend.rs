// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hv-backend`: job store and crawler message bus, run under `hvd`.

use anyhow::Result;
use hv_daemon::{env, logging, Backend, BackendConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = BackendConfig::from_env()?;
    let _guard = logging::init(&env::state_dir()?.join("logs"), "backend")?;

    let backend = Backend::new(config)?;
    if let Err(e) = backend.run(tokio::io::stdin(), tokio::io::stdout()).await {
        tracing::error!(error = %e, "backend failed");
        return Err(e.into());
    }
    Ok(())
}

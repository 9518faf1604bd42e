//! Timeguard - app usage tracking and block enforcement daemon
//!
//! Loads configuration, samples usage once and runs a full sync, then keeps
//! usage sampling, enforcement and periodic re-sync running until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use timeguard_lib::utils::logging::init_tracing;
use timeguard_lib::{get_platform_info, perform_full_sync, start_background_services, AppContext};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before tracing so RUST_LOG and TIMEGUARD_LOG_FORMAT apply
    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) => info!(error = %e, "no .env loaded"),
    }

    let ctx = Arc::new(AppContext::new().await.context("failed to build application context")?);
    info!(profile = %ctx.config.platform.profile, "Timeguard starting");

    ctx.prime_usage().await;
    if !perform_full_sync(&ctx).await {
        warn!("initial sync did not complete; periodic re-sync will retry");
    }
    start_background_services(&ctx).await.context("failed to start background services")?;

    for (key, value) in get_platform_info(&ctx).await {
        info!(key = %key, value = %value, "platform_info");
    }

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    ctx.shutdown().await.context("shutdown failed")?;
    info!("Timeguard stopped");
    Ok(())
}

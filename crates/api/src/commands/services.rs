//! Background service commands

use std::time::Instant;

use timeguard_domain::Result;
use tracing::info;

use crate::utils::logging::{error_label, log_command_execution};
use crate::AppContext;

/// Start usage sampling, the enforcement loop and periodic re-sync.
pub async fn start_background_services(ctx: &AppContext) -> Result<()> {
    let command_name = "services::start_background_services";
    let start = Instant::now();

    info!(command = command_name, "Starting background services");
    let result = ctx.start_background_services().await;
    let error_type = result.as_ref().err().map(error_label);

    log_command_execution(command_name, start.elapsed(), result.is_ok(), error_type);
    result
}

/// Stop every background service.
pub async fn stop_background_services(ctx: &AppContext) -> Result<()> {
    let command_name = "services::stop_background_services";
    let start = Instant::now();

    info!(command = command_name, "Stopping background services");
    let result = ctx.stop_background_services().await;
    let error_type = result.as_ref().err().map(error_label);

    log_command_execution(command_name, start.elapsed(), result.is_ok(), error_type);
    result
}

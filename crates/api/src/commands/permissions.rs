//! Permission commands

use std::time::Instant;

use tracing::info;

use crate::utils::logging::log_command_execution;
use crate::AppContext;

/// Refresh permission state and prompt for anything missing.
///
/// Returns `true` when both usage tracking and blocking are ready.
pub async fn request_permissions(ctx: &AppContext) -> bool {
    let command_name = "permissions::request_permissions";
    let start = Instant::now();

    info!(command = command_name, "Requesting platform permissions");
    let ready = ctx.coordinator.request_permissions().await;

    log_command_execution(command_name, start.elapsed(), true, None);
    ready
}

/// Re-check permissions with the OS without prompting.
pub async fn has_required_permissions(ctx: &AppContext) -> bool {
    let command_name = "permissions::has_required_permissions";
    let start = Instant::now();

    let ready = ctx.coordinator.has_required_permissions().await;

    log_command_execution(command_name, start.elapsed(), true, None);
    ready
}

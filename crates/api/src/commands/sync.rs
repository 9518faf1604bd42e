//! Sync commands

use std::time::Instant;

use tracing::info;

use crate::utils::logging::{error_label, log_command_execution};
use crate::AppContext;

/// Run the full pipeline once.
///
/// `false` only when permissions stopped the sync; partial failures are
/// retried by the next cycle and still count as success here.
pub async fn perform_full_sync(ctx: &AppContext) -> bool {
    let command_name = "sync::perform_full_sync";
    let start = Instant::now();

    info!(command = command_name, "Running full sync");
    let result = ctx.coordinator.full_sync().await;
    let elapsed = start.elapsed();
    let error_type = result.as_ref().err().map(error_label);

    log_command_execution(command_name, elapsed, result.is_ok(), error_type);
    result.is_ok()
}

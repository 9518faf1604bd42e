//! Health command

use std::time::Instant;

use crate::utils::health::HealthStatus;
use crate::utils::logging::log_command_execution;
use crate::AppContext;

pub async fn get_app_health(ctx: &AppContext) -> HealthStatus {
    let command_name = "health::get_app_health";
    let start = Instant::now();

    let health = ctx.health_check().await;

    log_command_execution(command_name, start.elapsed(), health.is_healthy, None);
    health
}

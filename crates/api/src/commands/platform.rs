//! Diagnostic platform info

use std::collections::BTreeMap;
use std::time::Instant;

use crate::utils::logging::log_command_execution;
use crate::AppContext;

/// Key/value snapshot of the engine: profile, enforcement model, loop state,
/// permission states and the last sync. For display only.
pub async fn get_platform_info(ctx: &AppContext) -> BTreeMap<String, String> {
    let command_name = "platform::get_platform_info";
    let start = Instant::now();

    let mut info = ctx.coordinator.platform_info().await;
    info.insert("config.profile".into(), ctx.config.platform.profile.to_string());
    info.insert("database.path".into(), ctx.db.path().display().to_string());

    log_command_execution(command_name, start.elapsed(), true, None);
    info
}

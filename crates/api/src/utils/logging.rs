use std::time::Duration;

use timeguard_domain::constants::LOG_FORMAT_ENV;
use timeguard_domain::TimeguardError;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` sets the filter (default `info`); `TIMEGUARD_LOG_FORMAT=json`
/// switches to one JSON object per line. Returns `false` when a subscriber
/// was already installed, which happens when tests share a process.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|value| value.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(fmt::layer().json().with_current_span(true).with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.is_ok()
}

/// Log the outcome of a command execution with structured fields.
///
/// # Parameters
/// * `command` - Logical command identifier (e.g. `"sync::perform_full_sync"`).
/// * `elapsed` - Duration the command execution took.
/// * `success` - Whether the command completed successfully.
/// * `error_type` - Stable label from [`error_label`] when it did not.
#[inline]
pub fn log_command_execution(
    command: &str,
    elapsed: Duration,
    success: bool,
    error_type: Option<&str>,
) {
    let duration_ms = elapsed.as_millis() as u64;

    if success {
        info!(command, duration_ms, "command_execution_success");
    } else {
        warn!(command, duration_ms, error_type, "command_execution_failure");
    }
}

/// Convert a `TimeguardError` into a stable label suitable for logging.
#[inline]
pub fn error_label(error: &TimeguardError) -> &'static str {
    error.label()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_labels_are_stable() {
        assert_eq!(
            error_label(&TimeguardError::PermissionDenied("usage".into())),
            "permission_denied"
        );
        assert_eq!(
            error_label(&TimeguardError::CapabilityUnavailable("shield".into())),
            "capability_unavailable"
        );
    }

    #[test]
    fn second_initialisation_is_refused() {
        init_tracing();
        assert!(!init_tracing());
    }
}

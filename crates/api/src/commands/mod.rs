//! Commands exposed to a settings UI
//!
//! Each command logs its outcome through
//! [`log_command_execution`](crate::utils::logging::log_command_execution).
//! Callers only ever see booleans and the diagnostic map.

mod health;
mod permissions;
mod platform;
mod services;
mod sync;

pub use health::*;
pub use permissions::*;
pub use platform::*;
pub use services::*;
pub use sync::*;

//! Permission state machine gating usage tracking and blocking

pub mod gate;
pub mod ports;

pub use gate::PermissionGate;
pub use ports::PermissionProvider;

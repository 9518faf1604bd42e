//! SQLite reference implementations of the persistence ports

pub mod app_repository;
pub mod manager;
pub mod policy_repository;
pub mod usage_repository;

pub use app_repository::{SqliteAppRepository, StoredApp};
pub use manager::DbManager;
pub use policy_repository::SqliteBlockPolicyRepository;
pub use usage_repository::SqliteUsageRepository;

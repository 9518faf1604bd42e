#![allow(dead_code)]

use tempfile::TempDir;
use timeguard_domain::{Config, DatabaseConfig, PlatformConfig, PlatformProfile};
use timeguard_lib::AppContext;

/// Configuration pointing at a fresh database under `temp_dir`.
pub fn test_config(temp_dir: &TempDir, profile: PlatformProfile) -> Config {
    let db_path = temp_dir.path().join("timeguard.db");
    Config {
        database: DatabaseConfig { path: db_path.to_string_lossy().to_string(), pool_size: 4 },
        platform: PlatformConfig { profile },
        ..Config::default()
    }
}

/// Build a context on a temporary database. The returned directory must
/// outlive the context.
pub async fn create_test_context(profile: PlatformProfile) -> (AppContext, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir should be created");
    let config = test_config(&temp_dir, profile);
    let ctx = AppContext::new_with_config(config).await.expect("context should build");
    (ctx, temp_dir)
}

//! SQLite implementation of the `AppRepository` port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use timeguard_core::AppRepository;
use timeguard_domain::{
    AppCategory, AppId, AppIdentity, AppMetadata, DiscoverySource, Result, TimeguardError,
};

use super::manager::{with_connection, DbManager};
use crate::errors::conversions::to_domain;

/// Keeps the first `discovered_at`; every other column follows the latest
/// upsert.
const UPSERT_APP_SQL: &str = "INSERT INTO apps (
        id, display_name, category, platform, source, discovered_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
    ON CONFLICT(id) DO UPDATE SET
        display_name = excluded.display_name,
        category = excluded.category,
        platform = excluded.platform,
        source = excluded.source,
        updated_at = excluded.updated_at";

const SELECT_APPS_SQL: &str = "SELECT id, display_name, category, platform, source, discovered_at
    FROM apps ORDER BY id";

/// A stored application row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredApp {
    pub identity: AppIdentity,
    pub metadata: AppMetadata,
}

pub struct SqliteAppRepository {
    db: Arc<DbManager>,
}

impl SqliteAppRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    pub async fn list_apps(&self) -> Result<Vec<StoredApp>> {
        with_connection(&self.db, |conn| {
            let mut stmt = conn.prepare(SELECT_APPS_SQL).map_err(to_domain)?;
            let rows = stmt.query_map([], map_app_row).map_err(to_domain)?;
            rows.map(|row| row.map_err(to_domain)?).collect()
        })
        .await
    }

    pub async fn count(&self) -> Result<usize> {
        with_connection(&self.db, |conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM apps", [], |row| row.get(0)).map_err(to_domain)?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }
}

#[async_trait]
impl AppRepository for SqliteAppRepository {
    async fn upsert_app(&self, app: &AppIdentity, metadata: &AppMetadata) -> Result<()> {
        let app = app.clone();
        let metadata = metadata.clone();

        with_connection(&self.db, move |conn| {
            conn.execute(
                UPSERT_APP_SQL,
                params![
                    app.id.as_str(),
                    app.display_name,
                    app.category.as_str(),
                    metadata.platform,
                    metadata.source.as_str(),
                    metadata.discovered_at.timestamp(),
                ],
            )
            .map_err(to_domain)?;
            Ok(())
        })
        .await
    }
}

fn map_app_row(row: &Row<'_>) -> rusqlite::Result<Result<StoredApp>> {
    let id: String = row.get(0)?;
    let display_name: String = row.get(1)?;
    let category: String = row.get(2)?;
    let platform: String = row.get(3)?;
    let source: String = row.get(4)?;
    let discovered_at: i64 = row.get(5)?;

    Ok(decode_app(id, display_name, &category, platform, &source, discovered_at))
}

fn decode_app(
    id: String,
    display_name: String,
    category: &str,
    platform: String,
    source: &str,
    discovered_at: i64,
) -> Result<StoredApp> {
    let category = category.parse::<AppCategory>().unwrap_or_default();
    let source = source.parse::<DiscoverySource>().map_err(TimeguardError::Repository)?;
    let discovered_at = timestamp(discovered_at)?;

    Ok(StoredApp {
        identity: AppIdentity::new(AppId::new(id), display_name, category),
        metadata: AppMetadata { platform, source, discovered_at },
    })
}

pub(crate) fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| TimeguardError::Repository(format!("timestamp out of range: {secs}")))
}

//! SQLite implementation of the `BlockPolicyRepository` port.
//!
//! The engine only reads directives; `set_directive` and `clear_directive`
//! are the write side used by the policy layer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use timeguard_core::BlockPolicyRepository;
use timeguard_domain::{AppId, BlockDirective, Result};
use tracing::debug;

use super::app_repository::timestamp;
use super::manager::{with_connection, DbManager};
use crate::errors::conversions::to_domain;

const UPSERT_DIRECTIVE_SQL: &str = "INSERT INTO block_directives (app_id, expires_at, created_at)
    VALUES (?1, ?2, CAST(strftime('%s','now') AS INTEGER))
    ON CONFLICT(app_id) DO UPDATE SET expires_at = excluded.expires_at";

pub struct SqliteBlockPolicyRepository {
    db: Arc<DbManager>,
}

impl SqliteBlockPolicyRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Store or replace the directive for one app.
    pub async fn set_directive(&self, directive: &BlockDirective) -> Result<()> {
        let directive = directive.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                UPSERT_DIRECTIVE_SQL,
                params![directive.app.as_str(), directive.expires_at.map(|at| at.timestamp())],
            )
            .map_err(to_domain)?;
            debug!(app_id = %directive.app, "block directive stored");
            Ok(())
        })
        .await
    }

    /// Remove the directive for `app`. Returns whether one existed.
    pub async fn clear_directive(&self, app: &AppId) -> Result<bool> {
        let app = app.clone();
        with_connection(&self.db, move |conn| {
            let removed = conn
                .execute("DELETE FROM block_directives WHERE app_id = ?1", params![app.as_str()])
                .map_err(to_domain)?;
            Ok(removed > 0)
        })
        .await
    }

    /// Delete directives that expired at or before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        with_connection(&self.db, move |conn| {
            conn.execute(
                "DELETE FROM block_directives WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now.timestamp()],
            )
            .map_err(to_domain)
        })
        .await
    }
}

#[async_trait]
impl BlockPolicyRepository for SqliteBlockPolicyRepository {
    async fn get_blocked_apps(&self) -> Result<Vec<BlockDirective>> {
        with_connection(&self.db, |conn| {
            let mut stmt = conn
                .prepare("SELECT app_id, expires_at FROM block_directives ORDER BY app_id")
                .map_err(to_domain)?;
            let rows = stmt.query_map([], map_directive_row).map_err(to_domain)?;
            rows.map(|row| row.map_err(to_domain)?).collect()
        })
        .await
    }
}

fn map_directive_row(row: &Row<'_>) -> rusqlite::Result<Result<BlockDirective>> {
    let app: String = row.get(0)?;
    let expires_at: Option<i64> = row.get(1)?;

    Ok(expires_at
        .map(timestamp)
        .transpose()
        .map(|expires_at| BlockDirective { app: AppId::new(app), expires_at }))
}

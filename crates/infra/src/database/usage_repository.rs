//! SQLite implementation of the `UsageRepository` port.
//!
//! The upsert applies the same monotonic rule as `UsageRecord::merge` inside
//! one statement, so concurrent writers cannot lower a stored value.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use timeguard_core::UsageRepository;
use timeguard_domain::{AppId, Result, TimeguardError, UsageRecord};

use super::app_repository::timestamp;
use super::manager::{with_connection, DbManager};
use crate::errors::conversions::to_domain;

const DATE_FORMAT: &str = "%Y-%m-%d";

const UPSERT_USAGE_SQL: &str = "INSERT INTO daily_usage (
        app_id, usage_date, foreground_secs, launch_count, last_used
    ) VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(app_id, usage_date) DO UPDATE SET
        foreground_secs = MAX(foreground_secs, excluded.foreground_secs),
        launch_count = MAX(launch_count, excluded.launch_count),
        last_used = CASE
            WHEN last_used IS NULL THEN excluded.last_used
            WHEN excluded.last_used IS NULL THEN last_used
            ELSE MAX(last_used, excluded.last_used)
        END";

const USAGE_COLUMNS: &str = "app_id, usage_date, foreground_secs, launch_count, last_used";

pub struct SqliteUsageRepository {
    db: Arc<DbManager>,
}

impl SqliteUsageRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    pub async fn get_usage(&self, app: &AppId, date: NaiveDate) -> Result<Option<UsageRecord>> {
        let app = app.clone();
        with_connection(&self.db, move |conn| {
            let sql = format!(
                "SELECT {USAGE_COLUMNS} FROM daily_usage WHERE app_id = ?1 AND usage_date = ?2"
            );
            let row = conn
                .query_row(&sql, params![app.as_str(), date.format(DATE_FORMAT).to_string()], map_usage_row)
                .optional()
                .map_err(to_domain)?;
            row.transpose()
        })
        .await
    }

    /// Every record with `start <= date <= end`, ordered by date then app.
    pub async fn usage_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<UsageRecord>> {
        with_connection(&self.db, move |conn| {
            let sql = format!(
                "SELECT {USAGE_COLUMNS} FROM daily_usage
                 WHERE usage_date BETWEEN ?1 AND ?2
                 ORDER BY usage_date, app_id"
            );
            let mut stmt = conn.prepare(&sql).map_err(to_domain)?;
            let rows = stmt
                .query_map(
                    params![start.format(DATE_FORMAT).to_string(), end.format(DATE_FORMAT).to_string()],
                    map_usage_row,
                )
                .map_err(to_domain)?;
            rows.map(|row| row.map_err(to_domain)?).collect()
        })
        .await
    }
}

#[async_trait]
impl UsageRepository for SqliteUsageRepository {
    async fn upsert_usage(&self, record: &UsageRecord) -> Result<()> {
        let record = record.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                UPSERT_USAGE_SQL,
                params![
                    record.app.as_str(),
                    record.date.format(DATE_FORMAT).to_string(),
                    record.foreground_secs.max(0),
                    record.launch_count,
                    record.last_used.map(|at| at.timestamp()),
                ],
            )
            .map_err(to_domain)?;
            Ok(())
        })
        .await
    }
}

fn map_usage_row(row: &Row<'_>) -> rusqlite::Result<Result<UsageRecord>> {
    let app: String = row.get(0)?;
    let date: String = row.get(1)?;
    let foreground_secs: i64 = row.get(2)?;
    let launch_count: u32 = row.get(3)?;
    let last_used: Option<i64> = row.get(4)?;

    Ok(decode_usage(app, &date, foreground_secs, launch_count, last_used))
}

fn decode_usage(
    app: String,
    date: &str,
    foreground_secs: i64,
    launch_count: u32,
    last_used: Option<i64>,
) -> Result<UsageRecord> {
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| TimeguardError::Repository(format!("invalid usage date {date:?}: {e}")))?;
    let last_used = last_used.map(timestamp).transpose()?;

    Ok(UsageRecord { app: AppId::new(app), date, foreground_secs, launch_count, last_used })
}

//! # SQLite Report Repository
//!
//! Maps the `reports` table onto the domain `Report`. `generated_at` is kept
//! as integer microseconds so ordering happens in SQL without string
//! comparison; the second attachment slot is split over the nullable
//! `zip_url` and `database_saved_on_pc` columns.
//!
//! The table is read in full once, at connect. After that each committed
//! write is mirrored into the live query in memory.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use domains::{
    AccessPolicy, ArchiveRecord, Attestation, LiveQueryHub, MonotonicClock, NewReport, OperationKind, Principal,
    Report, ReportId, ReportPatch, ReportRepository, ReportStatus, ReportSubscription, StoreError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::collection_path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
    id                   TEXT PRIMARY KEY NOT NULL,
    client_name          TEXT NOT NULL,
    technician_name      TEXT NOT NULL,
    error_date           TEXT NOT NULL,
    report_text          TEXT NOT NULL,
    media_url            TEXT,
    zip_url              TEXT,
    database_saved_on_pc TEXT,
    reported_by_user_id  TEXT NOT NULL,
    generated_at         INTEGER NOT NULL,
    status               TEXT NOT NULL DEFAULT 'open'
);
CREATE INDEX IF NOT EXISTS reports_generated_at ON reports (generated_at DESC);
"#;

const SELECT_ALL: &str = "SELECT * FROM reports ORDER BY generated_at DESC";

pub struct SqliteReportRepository {
    pool: SqlitePool,
    hub: Arc<LiveQueryHub>,
    clock: Arc<MonotonicClock>,
    policy: AccessPolicy,
    app_id: String,
    /// Serializes commit + snapshot update so snapshots follow commit order.
    write_lock: Arc<Mutex<()>>,
}

fn unavailable(err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Runs a write on its own task: once started it commits and updates the
/// live query together, even if the caller stops waiting.
async fn detached<T, F>(write: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
{
    tokio::spawn(write)
        .await
        .map_err(|err| unavailable(format!("report write task failed: {err}")))?
}

impl SqliteReportRepository {
    /// Opens (or creates) the database, applies the schema and loads the
    /// current rows into the live query.
    pub async fn connect(database_url: &str, app_id: impl Into<String>, policy: AccessPolicy) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(unavailable)?
            .create_if_missing(true);
        // every in-memory connection is its own database
        let max = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await
            .map_err(unavailable)?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await.map_err(unavailable)?;

        let existing = load_all(&pool).await?;
        let clock = match existing.first() {
            Some(newest) => MonotonicClock::starting_after(newest.generated_at),
            None => MonotonicClock::new(),
        };
        tracing::info!(database_url, rows = existing.len(), "sqlite report store ready");

        Ok(Self {
            pool,
            hub: Arc::new(LiveQueryHub::new(existing)),
            clock: Arc::new(clock),
            policy,
            app_id: app_id.into(),
            write_lock: Arc::new(Mutex::new(())),
        })
    }
}

async fn load_all(pool: &SqlitePool) -> Result<Vec<Report>, StoreError> {
    let rows = sqlx::query(SELECT_ALL).fetch_all(pool).await.map_err(unavailable)?;
    rows.iter().map(row_to_report).collect()
}

fn row_to_report(row: &SqliteRow) -> Result<Report, StoreError> {
    let id: String = row.try_get("id").map_err(unavailable)?;
    let error_date: String = row.try_get("error_date").map_err(unavailable)?;
    let generated_at: i64 = row.try_get("generated_at").map_err(unavailable)?;
    let status: String = row.try_get("status").map_err(unavailable)?;
    let saved_on_pc: Option<String> = row.try_get("database_saved_on_pc").map_err(unavailable)?;

    let archive = match saved_on_pc {
        Some(answer) => ArchiveRecord::DatabaseSavedOnPc(
            Attestation::parse(&answer).ok_or_else(|| unavailable(format!("corrupt attestation '{answer}'")))?,
        ),
        None => ArchiveRecord::ZipUrl(row.try_get("zip_url").map_err(unavailable)?),
    };

    Ok(Report {
        id: Uuid::parse_str(&id).map_err(unavailable)?,
        client_name: row.try_get("client_name").map_err(unavailable)?,
        technician_name: row.try_get("technician_name").map_err(unavailable)?,
        error_date: NaiveDate::from_str(&error_date).map_err(unavailable)?,
        report_text: row.try_get("report_text").map_err(unavailable)?,
        media_url: row.try_get("media_url").map_err(unavailable)?,
        archive,
        reported_by_user_id: row.try_get("reported_by_user_id").map_err(unavailable)?,
        generated_at: DateTime::from_timestamp_micros(generated_at)
            .ok_or_else(|| unavailable(format!("corrupt timestamp {generated_at}")))?,
        status: ReportStatus::from_str(&status).map_err(unavailable)?,
    })
}

async fn insert(pool: &SqlitePool, report: &Report) -> Result<(), StoreError> {
    let (zip_url, saved_on_pc) = match &report.archive {
        ArchiveRecord::ZipUrl(url) => (url.clone(), None),
        ArchiveRecord::DatabaseSavedOnPc(answer) => (None, Some(answer.as_str())),
    };
    sqlx::query(
        "INSERT INTO reports (id, client_name, technician_name, error_date, report_text, media_url, zip_url, \
         database_saved_on_pc, reported_by_user_id, generated_at, status) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(report.id.to_string())
    .bind(&report.client_name)
    .bind(&report.technician_name)
    .bind(report.error_date.to_string())
    .bind(&report.report_text)
    .bind(&report.media_url)
    .bind(zip_url)
    .bind(saved_on_pc)
    .bind(&report.reported_by_user_id)
    .bind(report.generated_at.timestamp_micros())
    .bind(report.status.as_str())
    .execute(pool)
    .await
    .map_err(unavailable)?;
    Ok(())
}

/// Writes `patch` and reads the row back in one transaction. A row that
/// cannot be read back rolls the write back.
async fn patch_row(pool: &SqlitePool, id: ReportId, patch: &ReportPatch) -> Result<Report, StoreError> {
    let mut tx = pool.begin().await.map_err(unavailable)?;

    if !patch.is_empty() {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE reports SET ");
        let mut set = qb.separated(", ");
        if let Some(v) = &patch.client_name {
            set.push("client_name = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.technician_name {
            set.push("technician_name = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.error_date {
            set.push("error_date = ").push_bind_unseparated(v.to_string());
        }
        if let Some(v) = &patch.report_text {
            set.push("report_text = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.status {
            set.push("status = ").push_bind_unseparated(v.as_str());
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());

        let result = qb.build().execute(&mut *tx).await.map_err(unavailable)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
    }

    let row = sqlx::query("SELECT * FROM reports WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(unavailable)?;
    let updated = row.as_ref().map(row_to_report).transpose()?.ok_or(StoreError::NotFound(id))?;
    tx.commit().await.map_err(unavailable)?;
    Ok(updated)
}

#[async_trait]
impl ReportRepository for SqliteReportRepository {
    async fn create(&self, actor: &Principal, report: NewReport) -> Result<ReportId, StoreError> {
        self.policy.check(actor, OperationKind::Create)?;
        let (pool, hub, clock, lock) = (
            self.pool.clone(),
            Arc::clone(&self.hub),
            Arc::clone(&self.clock),
            Arc::clone(&self.write_lock),
        );

        detached(async move {
            let _guard = lock.lock_owned().await;
            let stored = report.into_report(Uuid::now_v7(), clock.now());
            insert(&pool, &stored).await?;
            let id = stored.id;
            hub.apply(|reports| reports.push(stored));
            Ok(id)
        })
        .await
    }

    async fn patch(&self, actor: &Principal, id: ReportId, patch: ReportPatch) -> Result<Report, StoreError> {
        self.policy.check(actor, OperationKind::Update)?;
        let (pool, hub, lock) = (self.pool.clone(), Arc::clone(&self.hub), Arc::clone(&self.write_lock));

        detached(async move {
            let _guard = lock.lock_owned().await;
            let updated = patch_row(&pool, id, &patch).await?;
            if !patch.is_empty() {
                let mirrored = updated.clone();
                hub.apply(move |reports| match reports.iter_mut().find(|r| r.id == mirrored.id) {
                    Some(slot) => *slot = mirrored,
                    None => reports.push(mirrored),
                });
            }
            Ok(updated)
        })
        .await
    }

    async fn delete(&self, actor: &Principal, id: ReportId) -> Result<(), StoreError> {
        self.policy.check(actor, OperationKind::Delete)?;
        let (pool, hub, lock) = (self.pool.clone(), Arc::clone(&self.hub), Arc::clone(&self.write_lock));

        detached(async move {
            let _guard = lock.lock_owned().await;
            let result = sqlx::query("DELETE FROM reports WHERE id = ?")
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(unavailable)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(id));
            }
            hub.apply(|reports| reports.retain(|r| r.id != id));
            Ok(())
        })
        .await
    }

    fn subscribe(&self) -> ReportSubscription {
        self.hub.subscribe()
    }

    fn collection_path(&self) -> String {
        collection_path(&self.app_id)
    }
}

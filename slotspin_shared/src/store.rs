//! SQLite log of resolved spins.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use slotspin_core::{Classification, SpinReport};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::SpinLogEntry;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(sqlx::FromRow)]
struct SpinRow {
    id: i64,
    ts: String,
    spin: i64,
    wager: i64,
    reels_json: String,
    classification: String,
    payout: i64,
    balance_after: i64,
    nonce: Option<i64>,
    server_seed_hash: Option<String>,
}

impl TryFrom<SpinRow> for SpinLogEntry {
    type Error = StoreError;

    fn try_from(row: SpinRow) -> StoreResult<Self> {
        let corrupt = |reason: String| StoreError::Corrupt { id: row.id, reason };
        let ts = DateTime::parse_from_rfc3339(&row.ts)
            .map_err(|e| corrupt(e.to_string()))?
            .with_timezone(&Utc);
        let reels = serde_json::from_str(&row.reels_json)?;
        let classification = Classification::from_str(&row.classification).map_err(corrupt)?;
        Ok(SpinLogEntry {
            id: row.id,
            ts,
            spin: row.spin,
            wager: row.wager,
            reels,
            classification,
            payout: row.payout,
            balance_after: row.balance_after,
            nonce: row.nonce,
            server_seed_hash: row.server_seed_hash,
        })
    }
}

// sqlite integers are signed
fn as_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

const SELECT_SPINS: &str = "SELECT id, ts, spin, wager, reels_json, classification, payout, balance_after, nonce, server_seed_hash FROM spins";

#[derive(Clone)]
pub struct SpinStore {
    pool: SqlitePool,
}

impl SpinStore {
    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // every connection to an in-memory database is a separate database
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append a resolved spin, returning its row id.
    pub async fn record(&self, report: &SpinReport) -> StoreResult<i64> {
        let names: Vec<&str> = report.symbols.iter().map(|s| s.name.as_str()).collect();
        let reels_json = serde_json::Value::from(names).to_string();
        let ts = Utc::now().to_rfc3339();
        let (nonce, hash) = match &report.proof {
            Some(p) => (Some(as_i64(p.nonce)), Some(p.server_seed_hash.clone())),
            None => (None, None),
        };
        let result = sqlx::query(
            "INSERT INTO spins (ts, spin, wager, reels_json, classification, payout, balance_after, nonce, server_seed_hash) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(ts)
        .bind(as_i64(report.spin))
        .bind(as_i64(report.wager))
        .bind(reels_json)
        .bind(report.outcome.classification.to_string())
        .bind(as_i64(report.outcome.payout))
        .bind(as_i64(report.balance_after))
        .bind(nonce)
        .bind(hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Highest nonce logged under `server_seed_hash`, if any spin used it.
    pub async fn last_nonce(&self, server_seed_hash: &str) -> StoreResult<Option<u64>> {
        let nonce: Option<i64> =
            sqlx::query_scalar("SELECT MAX(nonce) FROM spins WHERE server_seed_hash = ?")
                .bind(server_seed_hash)
                .fetch_one(&self.pool)
                .await?;
        Ok(nonce.map(|n| n.max(0) as u64))
    }

    /// Last `n` spins, newest first.
    pub async fn recent(&self, n: i64) -> StoreResult<Vec<SpinLogEntry>> {
        let rows = sqlx::query_as::<_, SpinRow>(&format!("{SELECT_SPINS} ORDER BY id DESC LIMIT ?"))
            .bind(n)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(SpinLogEntry::try_from).collect()
    }

    /// Every spin, oldest first.
    pub async fn all(&self) -> StoreResult<Vec<SpinLogEntry>> {
        let rows = sqlx::query_as::<_, SpinRow>(&format!("{SELECT_SPINS} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(SpinLogEntry::try_from).collect()
    }
}

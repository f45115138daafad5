use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

use crate::db::ObservationStore;
use crate::models::{Capture, CanonicalPosition, ExtractedBreakdown, Observation, PositionKey, ScrapedPosition};

const OBSERVATION_COLUMNS: &str = "protocol, pair, token0, token1, balance, pending_yield, apy, \
    range_min, range_max, current_price, in_range, captured_at, breakdown_pair, token0_amount, \
    token1_amount, token0_percentage, token1_percentage, extracted_at";

const CANONICAL_COLUMNS: &str = "protocol, pair, raw_pair, token0, token1, balance, pending_yield, \
    apy, range_min, range_max, current_price, in_range, captured_at, token0_amount, token1_amount, \
    token0_percentage, token1_percentage, breakdown_at, has_breakdown";

/// Database manager for handling SQLite operations
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database path {}", database_url))?
            .create_if_missing(true);

        // every in-memory connection is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", database_url))?;

        // Initialize schema if needed
        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS captures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                protocol TEXT NOT NULL,
                captured_at INTEGER NOT NULL,
                vision_response TEXT
            )"
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                capture_id INTEGER NOT NULL,
                protocol TEXT NOT NULL,
                pair_key TEXT NOT NULL,
                pair TEXT NOT NULL,
                token0 TEXT,
                token1 TEXT,
                balance REAL,
                pending_yield REAL,
                apy REAL,
                range_min REAL,
                range_max REAL,
                current_price REAL,
                in_range BOOLEAN,
                captured_at INTEGER NOT NULL,
                breakdown_pair TEXT,
                token0_amount REAL,
                token1_amount REAL,
                token0_percentage REAL,
                token1_percentage REAL,
                extracted_at INTEGER,
                FOREIGN KEY (capture_id) REFERENCES captures (id)
            )"
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_observations_key
                ON observations (protocol, pair_key, captured_at)"
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS canonical_positions (
                protocol TEXT NOT NULL,
                pair TEXT NOT NULL,
                raw_pair TEXT NOT NULL,
                token0 TEXT,
                token1 TEXT,
                balance REAL,
                pending_yield REAL,
                apy REAL,
                range_min REAL,
                range_max REAL,
                current_price REAL,
                in_range BOOLEAN,
                captured_at INTEGER NOT NULL,
                token0_amount REAL,
                token1_amount REAL,
                token0_percentage REAL,
                token1_percentage REAL,
                breakdown_at INTEGER,
                has_breakdown BOOLEAN NOT NULL DEFAULT FALSE,
                PRIMARY KEY (protocol, pair)
            )"
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store a capture and one observation per scraped row, plus the matched
    /// position carrying its breakdown when the vision answer placed one.
    /// Everything lands in one transaction. Returns the capture id.
    pub async fn insert_capture(
        &self,
        capture: &Capture,
        matched: Option<(&ScrapedPosition, &ExtractedBreakdown)>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let capture_id = sqlx::query(
            "INSERT INTO captures (protocol, captured_at, vision_response) VALUES (?, ?, ?)"
        )
        .bind(&capture.protocol)
        .bind(capture.captured_at.timestamp_millis())
        .bind(&capture.vision_response)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for position in capture.positions() {
            insert_observation(&mut *tx, capture_id, &position, None).await?;
        }

        if let Some((position, breakdown)) = matched {
            insert_observation(&mut *tx, capture_id, position, Some(breakdown)).await?;
        }

        tx.commit().await?;
        debug!(
            "Stored capture {} for {} with {} rows (breakdown: {})",
            capture_id,
            capture.protocol,
            capture.rows.len(),
            matched.is_some()
        );
        Ok(capture_id)
    }

    /// Swap the whole canonical table for `positions` in one transaction,
    /// so rows under keys no longer produced do not linger.
    pub async fn replace_canonical_positions<'a, I>(&self, positions: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a CanonicalPosition>,
    {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM canonical_positions")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut written = 0;
        for position in positions {
            write_canonical(&mut *tx, position).await?;
            written += 1;
        }

        tx.commit().await?;
        debug!("Replaced {} canonical rows with {}", removed, written);
        Ok(written)
    }

    /// Every stored observation, oldest capture first
    pub async fn fetch_all_observations(&self) -> Result<Vec<Observation>> {
        let sql = format!("SELECT {} FROM observations ORDER BY captured_at, id", OBSERVATION_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(observation_from_row).collect()
    }

    /// Plain scraped rows of the most recent capture, optionally for one protocol
    pub async fn latest_capture_positions(&self, protocol: Option<&str>) -> Result<Vec<ScrapedPosition>> {
        let capture_id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM captures
             WHERE (?1 IS NULL OR protocol = ?1)
             ORDER BY captured_at DESC, id DESC
             LIMIT 1"
        )
        .bind(protocol)
        .fetch_optional(&self.pool)
        .await?;

        let capture_id = match capture_id {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let sql = format!(
            "SELECT {} FROM observations WHERE capture_id = ? AND breakdown_pair IS NULL ORDER BY id",
            OBSERVATION_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(capture_id).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| observation_from_row(row).map(|observation| observation.position))
            .collect()
    }

    /// All canonical rows ordered by key
    pub async fn fetch_canonical_positions(&self) -> Result<Vec<CanonicalPosition>> {
        let sql = format!("SELECT {} FROM canonical_positions ORDER BY protocol, pair", CANONICAL_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(canonical_from_row).collect()
    }
}

#[async_trait]
impl ObservationStore for Database {
    async fn fetch_observations(&self, key: &PositionKey) -> Result<Vec<Observation>> {
        let sql = format!(
            "SELECT {} FROM observations WHERE protocol = ? AND pair_key = ? ORDER BY captured_at, id",
            OBSERVATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&key.protocol)
            .bind(&key.pair)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(observation_from_row).collect()
    }

    async fn upsert_canonical(&self, position: &CanonicalPosition) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_canonical(&mut *conn, position).await
    }
}

async fn write_canonical(conn: &mut SqliteConnection, position: &CanonicalPosition) -> Result<()> {
    let sql = format!(
        "INSERT OR REPLACE INTO canonical_positions ({}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        CANONICAL_COLUMNS
    );

    sqlx::query(&sql)
        .bind(&position.protocol)
        .bind(&position.pair)
        .bind(&position.raw_pair)
        .bind(&position.token0)
        .bind(&position.token1)
        .bind(position.balance)
        .bind(position.pending_yield)
        .bind(position.apy)
        .bind(position.range_min)
        .bind(position.range_max)
        .bind(position.current_price)
        .bind(position.in_range)
        .bind(position.captured_at.timestamp_millis())
        .bind(position.token0_amount)
        .bind(position.token1_amount)
        .bind(position.token0_percentage)
        .bind(position.token1_percentage)
        .bind(position.breakdown_at.map(|at| at.timestamp_millis()))
        .bind(position.has_breakdown)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn insert_observation(
    conn: &mut SqliteConnection,
    capture_id: i64,
    position: &ScrapedPosition,
    breakdown: Option<&ExtractedBreakdown>,
) -> Result<()> {
    let key = position.key();

    sqlx::query(
        "INSERT INTO observations (
            capture_id, protocol, pair_key, pair, token0, token1, balance, pending_yield, apy,
            range_min, range_max, current_price, in_range, captured_at, breakdown_pair,
            token0_amount, token1_amount, token0_percentage, token1_percentage, extracted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(capture_id)
    .bind(&key.protocol)
    .bind(&key.pair)
    .bind(&position.pair)
    .bind(&position.token0)
    .bind(&position.token1)
    .bind(position.balance)
    .bind(position.pending_yield)
    .bind(position.apy)
    .bind(position.range_min)
    .bind(position.range_max)
    .bind(position.current_price)
    .bind(position.in_range)
    .bind(position.captured_at.timestamp_millis())
    .bind(breakdown.map(|b| b.pair.clone()))
    .bind(breakdown.and_then(|b| b.token0_amount))
    .bind(breakdown.and_then(|b| b.token1_amount))
    .bind(breakdown.and_then(|b| b.token0_percentage))
    .bind(breakdown.and_then(|b| b.token1_percentage))
    .bind(breakdown.map(|b| b.extracted_at.timestamp_millis()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| anyhow!("Invalid stored timestamp {}", millis))
}

fn observation_from_row(row: &SqliteRow) -> Result<Observation> {
    let position = ScrapedPosition {
        protocol: row.try_get("protocol")?,
        pair: row.try_get("pair")?,
        token0: row.try_get("token0")?,
        token1: row.try_get("token1")?,
        balance: row.try_get("balance")?,
        pending_yield: row.try_get("pending_yield")?,
        apy: row.try_get("apy")?,
        range_min: row.try_get("range_min")?,
        range_max: row.try_get("range_max")?,
        current_price: row.try_get("current_price")?,
        in_range: row.try_get("in_range")?,
        captured_at: from_millis(row.try_get("captured_at")?)?,
    };

    let breakdown_pair: Option<String> = row.try_get("breakdown_pair")?;
    let breakdown = match breakdown_pair {
        Some(pair) => {
            let extracted_at: Option<i64> = row.try_get("extracted_at")?;
            Some(ExtractedBreakdown {
                pair,
                token0_amount: row.try_get("token0_amount")?,
                token1_amount: row.try_get("token1_amount")?,
                token0_percentage: row.try_get("token0_percentage")?,
                token1_percentage: row.try_get("token1_percentage")?,
                extracted_at: match extracted_at {
                    Some(millis) => from_millis(millis)?,
                    None => position.captured_at,
                },
            })
        }
        None => None,
    };

    Ok(Observation { position, breakdown })
}

fn canonical_from_row(row: &SqliteRow) -> Result<CanonicalPosition> {
    let breakdown_at: Option<i64> = row.try_get("breakdown_at")?;

    Ok(CanonicalPosition {
        protocol: row.try_get("protocol")?,
        pair: row.try_get("pair")?,
        raw_pair: row.try_get("raw_pair")?,
        token0: row.try_get("token0")?,
        token1: row.try_get("token1")?,
        balance: row.try_get("balance")?,
        pending_yield: row.try_get("pending_yield")?,
        apy: row.try_get("apy")?,
        range_min: row.try_get("range_min")?,
        range_max: row.try_get("range_max")?,
        current_price: row.try_get("current_price")?,
        in_range: row.try_get("in_range")?,
        captured_at: from_millis(row.try_get("captured_at")?)?,
        token0_amount: row.try_get("token0_amount")?,
        token1_amount: row.try_get("token1_amount")?,
        token0_percentage: row.try_get("token0_percentage")?,
        token1_percentage: row.try_get("token1_percentage")?,
        breakdown_at: breakdown_at.map(from_millis).transpose()?,
        has_breakdown: row.try_get("has_breakdown")?,
    })
}

/// Initialize an in-memory database for testing
#[cfg(test)]
pub async fn init_test_db() -> Result<Database> {
    Database::new("sqlite::memory:").await
}

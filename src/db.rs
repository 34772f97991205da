use crate::errors::{IpvError, IpvResult};
use crate::state::DbCommand;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub type DbPool = Arc<Mutex<Connection>>;

pub fn init_db(data_dir: &Path) -> IpvResult<DbPool> {
    std::fs::create_dir_all(data_dir).map_err(|e| IpvError::Database(format!("create dir: {e}")))?;
    let db_path = data_dir.join("ipv_pricer.db");
    let conn = Connection::open(&db_path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA cache_size=-64000;")?;
    apply_schema(&conn)?;

    tracing::info!("database initialized at {}", db_path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

/// In-memory database with the same schema.
pub fn init_memory_db() -> IpvResult<DbPool> {
    let conn = Connection::open_in_memory()?;
    apply_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn apply_schema(conn: &Connection) -> IpvResult<()> {
    let schema = include_str!("../migrations/001_init.sql");
    conn.execute_batch(schema)?;
    Ok(())
}

/// Dedicated DB writer task. Reads commands from bounded channel, executes SQL.
/// This is the ONLY task that writes to the database connection.
pub async fn run_db_writer(db: DbPool, mut rx: mpsc::Receiver<DbCommand>) {
    tracing::info!("db writer task started");

    while let Some(cmd) = rx.recv().await {
        if let Err(e) = execute_command(&db, cmd) {
            tracing::error!("db write error: {e}");
        }
    }

    tracing::info!("db writer task shutting down");
}

fn execute_command(db: &DbPool, cmd: DbCommand) -> IpvResult<()> {
    let conn = db.lock().map_err(|e| IpvError::Database(format!("lock poisoned: {e}")))?;

    match cmd {
        DbCommand::InsertPricing {
            timestamp, spot, strike, time, rate, volatility, option_type,
            price, delta, gamma, vega,
        } => {
            conn.execute(
                "INSERT INTO pricings (timestamp, spot, strike, time_years, rate, volatility, option_type, price, delta, gamma, vega)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![timestamp, spot, strike, time, rate, volatility, option_type, price, delta, gamma, vega],
            )?;
        }
        DbCommand::InsertRun {
            id, timestamp, model, spot, spot_origin, ticker, total_rows, kept_rows,
            priced_count, failed_count, overpriced_count, underpriced_count,
            max_difference, min_difference, avg_difference,
        } => {
            conn.execute(
                "INSERT OR REPLACE INTO ipv_runs (id, timestamp, model, spot, spot_origin, ticker, total_rows, kept_rows, priced_count, failed_count, overpriced_count, underpriced_count, max_difference, min_difference, avg_difference)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                rusqlite::params![
                    id, timestamp, model, spot, spot_origin, ticker, total_rows, kept_rows,
                    priced_count, failed_count, overpriced_count, underpriced_count,
                    max_difference, min_difference, avg_difference
                ],
            )?;
        }
    }
    Ok(())
}

// ── Query helpers (for server REST reads -- these DO lock, but only from cold path) ──

pub fn get_recent_pricings(db: &DbPool, limit: usize) -> IpvResult<Vec<PricingRow>> {
    let conn = db.lock().map_err(|e| IpvError::Database(format!("lock: {e}")))?;
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, spot, strike, time_years, rate, volatility, option_type, price, delta, gamma, vega FROM pricings ORDER BY id DESC LIMIT ?1"
    )?;
    let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
        Ok(PricingRow {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            spot: row.get(2)?,
            strike: row.get(3)?,
            time: row.get(4)?,
            rate: row.get(5)?,
            volatility: row.get(6)?,
            option_type: row.get(7)?,
            price: row.get(8)?,
            delta: row.get(9)?,
            gamma: row.get(10)?,
            vega: row.get(11)?,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn get_recent_runs(db: &DbPool, limit: usize) -> IpvResult<Vec<RunRow>> {
    let conn = db.lock().map_err(|e| IpvError::Database(format!("lock: {e}")))?;
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, model, spot, spot_origin, ticker, total_rows, kept_rows, priced_count, failed_count, overpriced_count, underpriced_count, max_difference, min_difference, avg_difference FROM ipv_runs ORDER BY timestamp DESC LIMIT ?1"
    )?;
    let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
        Ok(RunRow {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            model: row.get(2)?,
            spot: row.get(3)?,
            spot_origin: row.get(4)?,
            ticker: row.get(5)?,
            total_rows: row.get(6)?,
            kept_rows: row.get(7)?,
            priced_count: row.get(8)?,
            failed_count: row.get(9)?,
            overpriced_count: row.get(10)?,
            underpriced_count: row.get(11)?,
            max_difference: row.get(12)?,
            min_difference: row.get(13)?,
            avg_difference: row.get(14)?,
        })
    })?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

// ── Row types ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct PricingRow {
    pub id: i64,
    pub timestamp: String,
    pub spot: f64,
    pub strike: f64,
    pub time: f64,
    pub rate: f64,
    pub volatility: f64,
    pub option_type: String,
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RunRow {
    pub id: String,
    pub timestamp: String,
    pub model: String,
    pub spot: f64,
    pub spot_origin: String,
    pub ticker: Option<String>,
    pub total_rows: i64,
    pub kept_rows: i64,
    pub priced_count: i64,
    pub failed_count: i64,
    pub overpriced_count: i64,
    pub underpriced_count: i64,
    pub max_difference: Option<f64>,
    pub min_difference: Option<f64>,
    pub avg_difference: Option<f64>,
}

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::feeds::spot::SpotClient;
use crate::models::black_scholes::BlackScholes;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

// ── DB Commands (sent to writer task via bounded channel) ──

#[derive(Debug)]
pub enum DbCommand {
    InsertPricing {
        timestamp: String,
        spot: f64,
        strike: f64,
        time: f64,
        rate: f64,
        volatility: f64,
        option_type: String,
        price: f64,
        delta: f64,
        gamma: f64,
        vega: f64,
    },
    InsertRun {
        id: String,
        timestamp: String,
        model: String,
        spot: f64,
        spot_origin: String,
        ticker: Option<String>,
        total_rows: i64,
        kept_rows: i64,
        priced_count: i64,
        failed_count: i64,
        overpriced_count: i64,
        underpriced_count: i64,
        max_difference: Option<f64>,
        min_difference: Option<f64>,
        avg_difference: Option<f64>,
    },
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub options_priced: AtomicU64,
    pub pricing_errors: AtomicU64,
    pub batches_processed: AtomicU64,
    pub rows_priced: AtomicU64,
    pub rows_failed: AtomicU64,
    pub spot_fetches: AtomicU64,
    pub spot_fallbacks: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            options_priced: AtomicU64::new(0),
            pricing_errors: AtomicU64::new(0),
            batches_processed: AtomicU64::new(0),
            rows_priced: AtomicU64::new(0),
            rows_failed: AtomicU64::new(0),
            spot_fetches: AtomicU64::new(0),
            spot_fallbacks: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,

    // Handlers -> DB Writer: bounded command channel
    pub db_tx: mpsc::Sender<DbCommand>,

    /// Pricing model (stateless, shared by every handler)
    pub model: BlackScholes,
    pub spot_client: SpotClient,

    // Lock-free performance counters
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, db_tx: mpsc::Sender<DbCommand>) -> Arc<Self> {
        let spot_client = SpotClient::new(&config.spot_api_base_url);
        Arc::new(Self {
            config,
            db,
            db_tx,
            model: BlackScholes::new(),
            spot_client,
            counters: PerfCounters::new(),
        })
    }

    /// Queue a write for the DB task. A full or closed channel drops the
    /// write rather than stalling the request.
    #[inline]
    pub fn record(&self, cmd: DbCommand) {
        if let Err(e) = self.db_tx.try_send(cmd) {
            tracing::warn!("db write dropped: {e}");
        }
    }
}

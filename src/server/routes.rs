use crate::db;
use crate::errors::IpvResult;
use crate::feeds::spot::{SpotOrigin, SpotQuote, SpotSource};
use crate::ipv::analysis::{TradeFilter, MAX_HISTOGRAM_BINS};
use crate::ipv::report::{self, IpvReport, ReportOptions};
use crate::ipv::trades;
use crate::models::{OptionType, PricingModel, PricingRequest, PricingResult};
use crate::state::{AppState, DbCommand, PerfCounters};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json};
use std::sync::Arc;

#[derive(serde::Deserialize)]
pub struct PriceBody {
    pub spot: Option<f64>,
    pub ticker: Option<String>,
    pub strike: f64,
    pub time: f64,
    pub rate: f64,
    pub volatility: f64,
    /// Raw string so an unknown type surfaces as InvalidOptionType
    pub option_type: String,
}

#[derive(serde::Serialize)]
pub struct PriceResponse {
    pub spot: SpotQuote,
    pub option_type: OptionType,
    #[serde(flatten)]
    pub result: PricingResult,
}

#[derive(serde::Deserialize)]
pub struct SpotQuery {
    pub spot: Option<f64>,
    pub ticker: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct IpvQuery {
    pub spot: Option<f64>,
    pub ticker: Option<String>,
    /// Comma-separated raw Type values
    pub types: Option<String>,
    pub strike_min: Option<f64>,
    pub strike_max: Option<f64>,
    pub top_n: Option<usize>,
    pub bins: Option<usize>,
}

#[derive(serde::Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Manual spot unless a ticker is given; a failed fetch falls back to the
/// manual value (or the configured default).
async fn resolve_spot(state: &AppState, spot: Option<f64>, ticker: Option<&str>) -> IpvResult<SpotQuote> {
    let manual = spot.unwrap_or(state.config.default_spot);
    let source = match ticker.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => {
            PerfCounters::bump(&state.counters.spot_fetches, 1);
            SpotSource::Ticker(t.to_uppercase())
        }
        None => SpotSource::Manual(manual),
    };
    let quote = state.spot_client.resolve(&source, manual).await?;
    if quote.origin == SpotOrigin::Fallback {
        PerfCounters::bump(&state.counters.spot_fallbacks, 1);
    }
    Ok(quote)
}

/// POST /api/price -- price a single option
pub async fn post_price(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PriceBody>,
) -> IpvResult<Json<PriceResponse>> {
    let option_type: OptionType = body.option_type.parse().inspect_err(|_| {
        PerfCounters::bump(&state.counters.pricing_errors, 1);
    })?;
    let spot = resolve_spot(&state, body.spot, body.ticker.as_deref()).await?;

    let req = PricingRequest {
        spot: spot.price,
        strike: body.strike,
        time: body.time,
        rate: body.rate,
        volatility: body.volatility,
        option_type,
    };
    let result = state.model.price(&req).inspect_err(|_| {
        PerfCounters::bump(&state.counters.pricing_errors, 1);
    })?;
    PerfCounters::bump(&state.counters.options_priced, 1);

    tracing::info!(
        option_type = %option_type,
        spot = req.spot,
        strike = req.strike,
        price = result.price,
        "option priced"
    );

    state.record(DbCommand::InsertPricing {
        timestamp: chrono::Utc::now().to_rfc3339(),
        spot: req.spot,
        strike: req.strike,
        time: req.time,
        rate: req.rate,
        volatility: req.volatility,
        option_type: option_type.to_string(),
        price: result.price,
        delta: result.delta,
        gamma: result.gamma,
        vega: result.vega,
    });

    Ok(Json(PriceResponse { spot, option_type, result }))
}

/// GET /api/spot -- resolve spot (manual, live, or fallback)
pub async fn get_spot(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SpotQuery>,
) -> IpvResult<Json<SpotQuote>> {
    let quote = resolve_spot(&state, params.spot, params.ticker.as_deref()).await?;
    Ok(Json(quote))
}

async fn run_ipv(state: &AppState, params: &IpvQuery, body: &str) -> IpvResult<IpvReport> {
    let upload = trades::read_trades(body.as_bytes(), state.config.max_upload_rows)?;
    let spot = resolve_spot(state, params.spot, params.ticker.as_deref()).await?;

    let mut filter = TradeFilter {
        types: None,
        strike_min: params.strike_min,
        strike_max: params.strike_max,
    };
    if let Some(types) = params.types.as_deref() {
        filter = filter.with_types_csv(types);
    }
    let opts = ReportOptions {
        filter,
        top_n: params.top_n.unwrap_or(state.config.top_n),
        histogram_max_bins: params
            .bins
            .unwrap_or(state.config.histogram_max_bins)
            .clamp(1, MAX_HISTOGRAM_BINS),
    };

    let report = report::build_report(&state.model, spot, upload, &opts);

    let s = &report.summary;
    PerfCounters::bump(&state.counters.batches_processed, 1);
    PerfCounters::bump(&state.counters.rows_priced, s.priced_count as u64);
    PerfCounters::bump(&state.counters.rows_failed, s.failed_count as u64);

    state.record(DbCommand::InsertRun {
        id: report.run_id.clone(),
        timestamp: report.spot.timestamp.clone(),
        model: report.model.to_string(),
        spot: report.spot.price,
        spot_origin: report.spot.origin.to_string(),
        ticker: report.spot.ticker.clone(),
        total_rows: report.total_rows as i64,
        kept_rows: report.rows.len() as i64,
        priced_count: s.priced_count as i64,
        failed_count: s.failed_count as i64,
        overpriced_count: s.overpriced_count as i64,
        underpriced_count: s.underpriced_count as i64,
        max_difference: s.max_difference,
        min_difference: s.min_difference,
        avg_difference: s.avg_difference,
    });

    Ok(report)
}

/// POST /api/ipv -- price an uploaded CSV and return the mispricing report
pub async fn post_ipv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IpvQuery>,
    body: String,
) -> IpvResult<Json<IpvReport>> {
    Ok(Json(run_ipv(&state, &params, &body).await?))
}

/// POST /api/ipv/export -- same run, filtered rows as a CSV download
pub async fn post_ipv_export(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IpvQuery>,
    body: String,
) -> IpvResult<impl IntoResponse> {
    let report = run_ipv(&state, &params, &body).await?;
    let mut out = Vec::with_capacity(report.rows.len() * 128);
    trades::write_csv(&report.columns, &report.rows, &mut out)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"filtered_data.csv\""),
        ],
        out,
    ))
}

/// GET /api/runs -- recent IPV runs from DB (cold path)
pub async fn get_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> IpvResult<Json<serde_json::Value>> {
    let limit = params.limit.unwrap_or(50).min(500);
    let runs = db::get_recent_runs(&state.db, limit)?;
    Ok(Json(serde_json::json!({ "runs": runs })))
}

/// GET /api/pricings -- recent single pricings from DB (cold path)
pub async fn get_pricings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> IpvResult<Json<serde_json::Value>> {
    let limit = params.limit.unwrap_or(50).min(500);
    let pricings = db::get_recent_pricings(&state.db, limit)?;
    Ok(Json(serde_json::json!({ "pricings": pricings })))
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "options_priced": state.counters.options_priced.load(Relaxed),
        "pricing_errors": state.counters.pricing_errors.load(Relaxed),
        "batches_processed": state.counters.batches_processed.load(Relaxed),
        "rows_priced": state.counters.rows_priced.load(Relaxed),
        "rows_failed": state.counters.rows_failed.load(Relaxed),
        "spot_fetches": state.counters.spot_fetches.load(Relaxed),
        "spot_fallbacks": state.counters.spot_fallbacks.load(Relaxed),
    }))
}

use crate::feeds::spot::SpotQuote;
use crate::ipv::analysis::{self, HistogramBin, MispricingSummary, TradeFilter, TypeBreakdown};
use crate::ipv::batch::{self, PricedTrade};
use crate::ipv::trades::TradeUpload;
use crate::models::PricingModel;

/// Knobs for one IPV run.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub filter: TradeFilter,
    pub top_n: usize,
    pub histogram_max_bins: usize,
}

/// Everything produced by one IPV run over an upload.
/// Type list and strike bounds describe the whole upload; every other
/// figure is computed on the filtered rows.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IpvReport {
    pub run_id: String,
    pub model: &'static str,
    pub spot: SpotQuote,
    /// Uploaded header, in upload order
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub available_types: Vec<String>,
    pub strike_bounds: Option<(f64, f64)>,
    pub filter: TradeFilter,
    pub summary: MispricingSummary,
    pub breakdown: Vec<TypeBreakdown>,
    pub top_overpriced: Vec<PricedTrade>,
    pub top_underpriced: Vec<PricedTrade>,
    pub histogram: Vec<HistogramBin>,
    pub rows: Vec<PricedTrade>,
}

/// Price the upload against the shared spot and assemble the report.
pub fn build_report<M: PricingModel + ?Sized>(
    model: &M,
    spot: SpotQuote,
    upload: TradeUpload,
    opts: &ReportOptions,
) -> IpvReport {
    let all = batch::price_trades(model, spot.price, upload.trades);
    let rows = opts.filter.apply(&all);

    let report = IpvReport {
        run_id: uuid::Uuid::new_v4().to_string(),
        model: model.name(),
        columns: upload.columns,
        total_rows: all.len(),
        available_types: analysis::option_types(&all),
        strike_bounds: analysis::strike_bounds(&all),
        filter: opts.filter.clone(),
        summary: analysis::summarize(&rows),
        breakdown: analysis::breakdown_by_type(&rows),
        top_overpriced: analysis::top_overpriced(&rows, opts.top_n),
        top_underpriced: analysis::top_underpriced(&rows, opts.top_n),
        histogram: analysis::histogram(&rows, opts.histogram_max_bins),
        spot,
        rows,
    };

    tracing::info!(
        run_id = %report.run_id,
        spot = report.spot.price,
        origin = %report.spot.origin,
        total = report.total_rows,
        kept = report.rows.len(),
        priced = report.summary.priced_count,
        failed = report.summary.failed_count,
        "ipv run complete"
    );
    report
}

use crate::errors::{IpvError, IpvResult};
use crate::ipv::trades::TradeRecord;
use crate::models::{PricingModel, PricingRequest, PricingResult};

/// A trade with the shared spot and its model outcome attached.
/// Exactly one of (model columns, `error`) is populated.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PricedTrade {
    /// Zero-based position in the upload
    pub row: usize,
    #[serde(flatten)]
    pub trade: TradeRecord,
    #[serde(rename = "Spot")]
    pub spot: f64,
    #[serde(rename = "BSM Price")]
    pub bsm_price: Option<f64>,
    #[serde(rename = "Delta")]
    pub delta: Option<f64>,
    #[serde(rename = "Gamma")]
    pub gamma: Option<f64>,
    #[serde(rename = "Vega")]
    pub vega: Option<f64>,
    /// TraderPrice - BSM Price; positive means the trader is above model
    pub difference: Option<f64>,
    pub error: Option<String>,
}

impl PricedTrade {
    #[inline]
    pub fn is_priced(&self) -> bool {
        self.difference.is_some()
    }
}

/// Price one upload row against the shared spot.
pub fn price_trade<M: PricingModel + ?Sized>(
    model: &M,
    spot: f64,
    trade: &TradeRecord,
) -> IpvResult<PricingResult> {
    if !trade.trader_price.is_finite() {
        return Err(IpvError::Domain(format!(
            "TraderPrice must be finite, got {}",
            trade.trader_price
        )));
    }
    let req = PricingRequest {
        spot,
        strike: trade.strike,
        time: trade.time,
        rate: trade.rate,
        volatility: trade.volatility,
        option_type: trade.option_type.parse()?,
    };
    model.price(&req)
}

/// Apply the model row-wise. A failing row is flagged with its error and
/// the remaining rows are still priced.
pub fn price_trades<M: PricingModel + ?Sized>(
    model: &M,
    spot: f64,
    trades: Vec<TradeRecord>,
) -> Vec<PricedTrade> {
    let mut failed = 0usize;

    let rows: Vec<PricedTrade> = trades
        .into_iter()
        .enumerate()
        .map(|(row, trade)| match price_trade(model, spot, &trade) {
            Ok(r) => PricedTrade {
                row,
                spot,
                bsm_price: Some(r.price),
                delta: Some(r.delta),
                gamma: Some(r.gamma),
                vega: Some(r.vega),
                difference: Some(trade.trader_price - r.price),
                error: None,
                trade,
            },
            Err(e) => {
                failed += 1;
                tracing::debug!(row, error = %e, "row not priced");
                PricedTrade {
                    row,
                    spot,
                    bsm_price: None,
                    delta: None,
                    gamma: None,
                    vega: None,
                    difference: None,
                    error: Some(e.to_string()),
                    trade,
                }
            }
        })
        .collect();

    if failed > 0 {
        tracing::warn!(failed, total = rows.len(), model = model.name(), "some rows could not be priced");
    }
    rows
}

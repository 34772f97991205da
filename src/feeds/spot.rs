use crate::errors::{IpvError, IpvResult};
use reqwest::Client;

/// Where the shared spot for a pricing run comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SpotSource {
    Manual(f64),
    Ticker(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotOrigin {
    Manual,
    Live,
    Fallback,
}

impl std::fmt::Display for SpotOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Live => write!(f, "live"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SpotQuote {
    pub price: f64,
    pub origin: SpotOrigin,
    pub ticker: Option<String>,
    /// Why the live fetch failed, when origin is fallback
    pub error: Option<String>,
    pub timestamp: String,
}

/// Last-close spot client for the Yahoo Finance chart API.
#[derive(Clone)]
pub struct SpotClient {
    client: Client,
    base_url: String,
}

impl SpotClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .user_agent("Mozilla/5.0 (compatible; ipv_pricer)")
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the last daily close for `ticker`.
    pub async fn fetch_last_close(&self, ticker: &str) -> IpvResult<f64> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(IpvError::SpotFeed("empty ticker".into()));
        }
        let url = format!("{}/chart/{}?range=1d&interval=1d", self.base_url, ticker);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IpvError::SpotFeed(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IpvError::SpotFeed(format!("HTTP {status}: {body}")));
        }

        let data: ChartResponse = resp
            .json()
            .await
            .map_err(|e| IpvError::SpotFeed(format!("parse: {e}")))?;

        last_close(&data, ticker)
    }

    /// Resolve the spot for a run. A failed live fetch falls back to
    /// `fallback` instead of failing the request.
    pub async fn resolve(&self, source: &SpotSource, fallback: f64) -> IpvResult<SpotQuote> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        match source {
            SpotSource::Manual(price) => {
                validate_spot(*price)?;
                Ok(SpotQuote {
                    price: *price,
                    origin: SpotOrigin::Manual,
                    ticker: None,
                    error: None,
                    timestamp,
                })
            }
            SpotSource::Ticker(ticker) => match self.fetch_last_close(ticker).await {
                Ok(price) => {
                    tracing::info!(ticker = %ticker, price, "live spot fetched");
                    Ok(SpotQuote {
                        price,
                        origin: SpotOrigin::Live,
                        ticker: Some(ticker.clone()),
                        error: None,
                        timestamp,
                    })
                }
                Err(e) => {
                    validate_spot(fallback)?;
                    tracing::warn!(
                        ticker = %ticker,
                        error = %e,
                        fallback,
                        "could not fetch live price, using fallback spot"
                    );
                    Ok(SpotQuote {
                        price: fallback,
                        origin: SpotOrigin::Fallback,
                        ticker: Some(ticker.clone()),
                        error: Some(e.to_string()),
                        timestamp,
                    })
                }
            },
        }
    }
}

fn validate_spot(price: f64) -> IpvResult<()> {
    if price > 0.0 && price.is_finite() {
        Ok(())
    } else {
        Err(IpvError::Domain(format!("spot must be a positive finite number, got {price}")))
    }
}

// Chart API response format (trimmed to what we read):
// {
//   "chart": {
//     "result": [
//       {
//         "meta": { "symbol": "AAPL", "regularMarketPrice": 227.52 },
//         "timestamp": [1729258200],
//         "indicators": { "quote": [ { "close": [227.52] } ] }
//       }
//     ],
//     "error": null
//   }
// }

#[derive(Debug, serde::Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, serde::Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    indicators: Option<Indicators>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, serde::Deserialize)]
struct Indicators {
    quote: Option<Vec<QuoteSeries>>,
}

#[derive(Debug, serde::Deserialize)]
struct QuoteSeries {
    close: Option<Vec<Option<f64>>>,
}

/// Last non-null close, else the meta market price.
fn last_close(data: &ChartResponse, ticker: &str) -> IpvResult<f64> {
    if let Some(err) = &data.chart.error {
        return Err(IpvError::SpotFeed(format!(
            "{ticker}: {} {}",
            err.code.as_deref().unwrap_or("error"),
            err.description.as_deref().unwrap_or("")
        )));
    }

    let result = data
        .chart
        .result
        .as_ref()
        .and_then(|r| r.first())
        .ok_or_else(|| IpvError::SpotFeed(format!("no chart data for {ticker}")))?;

    let close = result
        .indicators
        .as_ref()
        .and_then(|i| i.quote.as_ref())
        .and_then(|q| q.first())
        .and_then(|q| q.close.as_ref())
        .and_then(|c| c.iter().rev().find_map(|v| *v));

    let price = close
        .or_else(|| result.meta.as_ref().and_then(|m| m.regular_market_price))
        .ok_or_else(|| IpvError::SpotFeed(format!("no close price for {ticker}")))?;

    if price <= 0.0 || !price.is_finite() {
        return Err(IpvError::SpotFeed(format!("invalid price: {price}")));
    }

    Ok(price)
}

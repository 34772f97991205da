use crate::errors::{IpvError, IpvResult};
use crate::ipv::batch::PricedTrade;
use std::io::{Read, Write};

/// Columns every trader upload must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = ["Strike", "Time", "Rate", "Volatility", "Type", "TraderPrice"];

/// Model columns appended after the uploaded ones on export.
pub const COMPUTED_COLUMNS: [&str; 7] = ["Spot", "BSM Price", "Delta", "Gamma", "Vega", "difference", "error"];

/// One uploaded trade. `Type` stays a raw string so a bad value fails
/// only its own row at pricing time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TradeRecord {
    #[serde(rename = "Strike")]
    pub strike: f64,
    #[serde(rename = "Time")]
    pub time: f64,
    #[serde(rename = "Rate")]
    pub rate: f64,
    #[serde(rename = "Volatility")]
    pub volatility: f64,
    #[serde(rename = "Type")]
    pub option_type: String,
    #[serde(rename = "TraderPrice")]
    pub trader_price: f64,
    /// Every uploaded cell, in upload column order
    #[serde(skip)]
    pub raw: Vec<String>,
}

impl TradeRecord {
    /// Typed value for a required column, `None` for any other column.
    fn required_field(&self, column: &str) -> Option<String> {
        Some(match column {
            "Strike" => self.strike.to_string(),
            "Time" => self.time.to_string(),
            "Rate" => self.rate.to_string(),
            "Volatility" => self.volatility.to_string(),
            "Type" => self.option_type.clone(),
            "TraderPrice" => self.trader_price.to_string(),
            _ => return None,
        })
    }
}

/// A parsed upload: its header in upload order plus one record per row.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeUpload {
    pub columns: Vec<String>,
    pub trades: Vec<TradeRecord>,
}

/// Read trades from CSV with a header row. Columns beyond the required
/// ones are kept verbatim for export.
pub fn read_trades<R: Read>(reader: R, max_rows: usize) -> IpvResult<TradeUpload> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for col in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == col) {
            return Err(IpvError::MissingColumn(col.to_string()));
        }
    }

    let mut trades = Vec::new();
    for record in rdr.records() {
        if trades.len() >= max_rows {
            return Err(IpvError::Csv(format!("upload exceeds {max_rows} rows")));
        }
        let record = record?;
        let mut trade: TradeRecord = record.deserialize(Some(&headers))?;
        trade.raw = record.iter().map(str::to_string).collect();
        trades.push(trade);
    }

    tracing::debug!(rows = trades.len(), columns = headers.len(), "trades parsed");
    Ok(TradeUpload {
        columns: headers.iter().map(str::to_string).collect(),
        trades,
    })
}

/// Write priced rows: the uploaded columns in upload order, then
/// `COMPUTED_COLUMNS`. Required columns carry their parsed values; other
/// uploaded cells are written back unchanged. Unpriced rows leave the
/// model columns empty and carry their error message.
pub fn write_csv<W: Write>(columns: &[String], rows: &[PricedTrade], writer: W) -> IpvResult<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(columns.iter().map(String::as_str).chain(COMPUTED_COLUMNS))?;

    let mut record: Vec<String> = Vec::with_capacity(columns.len() + COMPUTED_COLUMNS.len());
    for row in rows {
        let t = &row.trade;
        record.clear();
        record.extend(columns.iter().enumerate().map(|(i, col)| {
            t.required_field(col)
                .or_else(|| t.raw.get(i).cloned())
                .unwrap_or_default()
        }));
        record.extend([
            row.spot.to_string(),
            opt(row.bsm_price),
            opt(row.delta),
            opt(row.gamma),
            opt(row.vega),
            opt(row.difference),
            row.error.clone().unwrap_or_default(),
        ]);
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

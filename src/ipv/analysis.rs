/// Mispricing analytics over priced rows.
/// All functions are pure -- they take rows and return computed values.

use crate::ipv::batch::PricedTrade;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Row filter: raw `Type` membership and an inclusive strike range.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct TradeFilter {
    /// Raw `Type` values to keep; `None` keeps every type
    pub types: Option<SmallVec<[String; 4]>>,
    pub strike_min: Option<f64>,
    pub strike_max: Option<f64>,
}

impl TradeFilter {
    /// Parse a comma-separated type list ("call,put"). Blank entries are skipped.
    pub fn with_types_csv(mut self, types: &str) -> Self {
        let list: SmallVec<[String; 4]> = types
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self.types = Some(list);
        self
    }

    #[inline]
    pub fn matches(&self, row: &PricedTrade) -> bool {
        if let Some(types) = &self.types {
            if !types.iter().any(|t| *t == row.trade.option_type) {
                return false;
            }
        }
        let k = row.trade.strike;
        if let Some(lo) = self.strike_min {
            if !(k >= lo) {
                return false;
            }
        }
        if let Some(hi) = self.strike_max {
            if !(k <= hi) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, rows: &[PricedTrade]) -> Vec<PricedTrade> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Distinct raw `Type` values in first-appearance order.
pub fn option_types(rows: &[PricedTrade]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for r in rows {
        if !r.trade.option_type.is_empty() && !out.contains(&r.trade.option_type) {
            out.push(r.trade.option_type.clone());
        }
    }
    out
}

/// (min, max) strike across rows.
pub fn strike_bounds(rows: &[PricedTrade]) -> Option<(f64, f64)> {
    rows.iter()
        .map(|r| r.trade.strike)
        .filter(|k| !k.is_nan())
        .fold(None, |acc, k| match acc {
            None => Some((k, k)),
            Some((lo, hi)) => Some((lo.min(k), hi.max(k))),
        })
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MispricingSummary {
    pub max_difference: Option<f64>,
    pub min_difference: Option<f64>,
    pub avg_difference: Option<f64>,
    pub overpriced_count: usize,
    pub underpriced_count: usize,
    pub priced_count: usize,
    pub failed_count: usize,
}

/// Summary statistics over rows that priced successfully.
pub fn summarize(rows: &[PricedTrade]) -> MispricingSummary {
    let mut max: Option<f64> = None;
    let mut min: Option<f64> = None;
    let mut sum = 0.0;
    let mut priced = 0usize;
    let mut over = 0usize;
    let mut under = 0usize;

    for d in rows.iter().filter_map(|r| r.difference) {
        priced += 1;
        sum += d;
        max = Some(max.map_or(d, |m| m.max(d)));
        min = Some(min.map_or(d, |m| m.min(d)));
        if d > 0.0 {
            over += 1;
        } else if d < 0.0 {
            under += 1;
        }
    }

    MispricingSummary {
        max_difference: max,
        min_difference: min,
        avg_difference: (priced > 0).then(|| sum / priced as f64),
        overpriced_count: over,
        underpriced_count: under,
        priced_count: priced,
        failed_count: rows.len() - priced,
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TypeBreakdown {
    pub option_type: String,
    pub avg_difference: f64,
    pub max_difference: f64,
    pub min_difference: f64,
    pub trade_count: usize,
}

/// Per raw `Type` statistics, sorted by type.
pub fn breakdown_by_type(rows: &[PricedTrade]) -> Vec<TypeBreakdown> {
    // (sum, max, min, count)
    let mut groups: BTreeMap<&str, (f64, f64, f64, usize)> = BTreeMap::new();
    for r in rows {
        let Some(d) = r.difference else { continue };
        let g = groups
            .entry(r.trade.option_type.as_str())
            .or_insert((0.0, f64::NEG_INFINITY, f64::INFINITY, 0));
        g.0 += d;
        g.1 = g.1.max(d);
        g.2 = g.2.min(d);
        g.3 += 1;
    }

    groups
        .into_iter()
        .map(|(ty, (sum, max, min, count))| TypeBreakdown {
            option_type: ty.to_string(),
            avg_difference: sum / count as f64,
            max_difference: max,
            min_difference: min,
            trade_count: count,
        })
        .collect()
}

/// The `n` largest differences; ties keep upload order.
pub fn top_overpriced(rows: &[PricedTrade], n: usize) -> Vec<PricedTrade> {
    ranked(rows, n, true)
}

/// The `n` smallest differences; ties keep upload order.
pub fn top_underpriced(rows: &[PricedTrade], n: usize) -> Vec<PricedTrade> {
    ranked(rows, n, false)
}

fn ranked(rows: &[PricedTrade], n: usize, descending: bool) -> Vec<PricedTrade> {
    let mut priced: Vec<(f64, &PricedTrade)> =
        rows.iter().filter_map(|r| r.difference.map(|d| (d, r))).collect();
    // sort_by is stable
    if descending {
        priced.sort_by(|a, b| b.0.total_cmp(&a.0));
    } else {
        priced.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    priced.into_iter().take(n).map(|(_, r)| r.clone()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Upper bound on histogram bins, whatever the caller asks for.
pub const MAX_HISTOGRAM_BINS: usize = 200;

/// Bucket differences into equal-width bins with a "nice" step
/// (1, 2 or 5 times a power of ten) aligned to multiples of the step.
/// Never more than `max_bins` bins (capped at `MAX_HISTOGRAM_BINS`); bins
/// are [start, end) except the last, which is closed. Empty when no row
/// priced or the range has no representable step.
pub fn histogram(rows: &[PricedTrade], max_bins: usize) -> Vec<HistogramBin> {
    let diffs: Vec<f64> = rows.iter().filter_map(|r| r.difference).collect();
    if diffs.is_empty() {
        return Vec::new();
    }
    let max_bins = max_bins.clamp(1, MAX_HISTOGRAM_BINS);
    let lo = diffs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = diffs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let Some((start, step, n)) = bin_layout(lo, hi, max_bins) else {
        tracing::debug!(lo, hi, "no usable histogram step");
        return Vec::new();
    };

    let mut bins: Vec<HistogramBin> = (0..n)
        .map(|i| HistogramBin {
            start: start + i as f64 * step,
            end: start + (i + 1) as f64 * step,
            count: 0,
        })
        .collect();

    for d in diffs {
        let idx = (((d - start) / step).floor().max(0.0) as usize).min(n - 1);
        bins[idx].count += 1;
    }
    bins
}

/// (start, step, bin count) covering [lo, hi] in at most `max_bins` bins.
fn bin_layout(lo: f64, hi: f64, max_bins: usize) -> Option<(f64, f64, usize)> {
    if hi - lo <= 0.0 {
        return Some((lo.floor(), 1.0, 1));
    }
    let mut step = nice_step((hi - lo) / max_bins as f64);
    loop {
        if !(step.is_finite() && step > 0.0) {
            return None;
        }
        let start = (lo / step).floor() * step;
        let span = ((hi - start) / step).ceil();
        if !span.is_finite() {
            return None;
        }
        let n = (span as usize).max(1);
        if n <= max_bins {
            return Some((start, step, n));
        }
        step = nice_step(step * 1.000_001);
    }
}

/// Smallest value of the form {1, 2, 5} x 10^k that is >= raw.
fn nice_step(raw: f64) -> f64 {
    let mag = 10f64.powf(raw.log10().floor());
    for m in [1.0, 2.0, 5.0, 10.0] {
        if m * mag >= raw {
            return m * mag;
        }
    }
    10.0 * mag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipv::batch::price_trades;
    use crate::ipv::trades::TradeRecord;
    use crate::models::black_scholes::{price_option, BlackScholes};

    /// Rows with the given (type, strike, difference). Difference None = failed row.
    fn rows(cases: &[(&str, f64, Option<f64>)]) -> Vec<PricedTrade> {
        cases.iter()
            .enumerate()
            .map(|(i, (ty, k, d))| PricedTrade {
                row: i,
                trade: TradeRecord {
                    strike: *k,
                    time: 1.0,
                    rate: 0.05,
                    volatility: 0.2,
                    option_type: ty.to_string(),
                    trader_price: 10.0,
                    raw: Vec::new(),
                },
                spot: 100.0,
                bsm_price: d.map(|d| 10.0 - d),
                delta: d.map(|_| 0.5),
                gamma: d.map(|_| 0.01),
                vega: d.map(|_| 30.0),
                difference: *d,
                error: if d.is_none() { Some("invalid option type".into()) } else { None },
            })
            .collect()
    }

    #[test]
    fn test_exact_trader_prices_give_zero_mispricing() {
        let trades: Vec<TradeRecord> = [(90.0, "call"), (100.0, "put"), (110.0, "Call")]
            .iter()
            .map(|&(k, ty)| TradeRecord {
                strike: k,
                time: 0.5,
                rate: 0.03,
                volatility: 0.3,
                option_type: ty.into(),
                trader_price: price_option(100.0, k, 0.5, 0.03, 0.3, ty).unwrap().price,
                raw: Vec::new(),
            })
            .collect();
        let priced = price_trades(&BlackScholes::new(), 100.0, trades);
        assert!(priced.iter().all(|r| r.difference == Some(0.0)));

        let s = summarize(&priced);
        assert_eq!(s.overpriced_count, 0);
        assert_eq!(s.underpriced_count, 0);
        assert_eq!(s.priced_count, 3);
        assert_eq!(s.max_difference, Some(0.0));
    }

    #[test]
    fn test_summary_stats() {
        let r = rows(&[("call", 90.0, Some(2.0)), ("put", 95.0, Some(-1.0)), ("x", 100.0, None), ("put", 105.0, Some(0.5))]);
        let s = summarize(&r);
        assert_eq!(s.max_difference, Some(2.0));
        assert_eq!(s.min_difference, Some(-1.0));
        assert!((s.avg_difference.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(s.overpriced_count, 2);
        assert_eq!(s.underpriced_count, 1);
        assert_eq!(s.failed_count, 1);
    }

    #[test]
    fn test_summary_empty() {
        let s = summarize(&[]);
        assert_eq!(s.avg_difference, None);
        assert_eq!(s.priced_count, 0);
    }

    #[test]
    fn test_filter_types_and_strikes() {
        let r = rows(&[("call", 90.0, Some(1.0)), ("put", 95.0, Some(1.0)), ("call", 100.0, Some(1.0)), ("call", 110.0, Some(1.0))]);
        let f = TradeFilter { strike_min: Some(95.0), strike_max: Some(100.0), ..Default::default() }
            .with_types_csv("call, ");
        let kept = f.apply(&r);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].row, 2);

        assert_eq!(TradeFilter::default().apply(&r).len(), 4);
    }

    #[test]
    fn test_option_types_and_bounds() {
        let r = rows(&[("put", 120.0, Some(1.0)), ("call", 80.0, Some(1.0)), ("put", 100.0, None)]);
        assert_eq!(option_types(&r), vec!["put".to_string(), "call".to_string()]);
        assert_eq!(strike_bounds(&r), Some((80.0, 120.0)));
        assert_eq!(strike_bounds(&[]), None);
    }

    #[test]
    fn test_breakdown_sorted_by_type() {
        let r = rows(&[("put", 90.0, Some(-2.0)), ("call", 95.0, Some(1.0)), ("call", 100.0, Some(3.0)), ("bad", 1.0, None)]);
        let b = breakdown_by_type(&r);
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].option_type, "call");
        assert_eq!(b[0].trade_count, 2);
        assert!((b[0].avg_difference - 2.0).abs() < 1e-12);
        assert_eq!(b[0].max_difference, 3.0);
        assert_eq!(b[0].min_difference, 1.0);
        assert_eq!(b[1].option_type, "put");
    }

    #[test]
    fn test_top_n_matches_stable_sort() {
        let diffs = [1.0, 5.0, 3.0, 5.0, -2.0, 3.0, 0.0, 4.0];
        let cases: Vec<(&str, f64, Option<f64>)> = diffs.iter().map(|&d| ("call", 100.0, Some(d))).collect();
        let r = rows(&cases);

        let top: Vec<usize> = top_overpriced(&r, 5).iter().map(|t| t.row).collect();
        let mut expected: Vec<&PricedTrade> = r.iter().collect();
        expected.sort_by(|a, b| b.difference.unwrap().partial_cmp(&a.difference.unwrap()).unwrap());
        let expected: Vec<usize> = expected.iter().take(5).map(|t| t.row).collect();
        assert_eq!(top, expected);
        assert_eq!(top, vec![1, 3, 7, 2, 5]);

        let bottom: Vec<usize> = top_underpriced(&r, 2).iter().map(|t| t.row).collect();
        assert_eq!(bottom, vec![4, 6]);
    }

    #[test]
    fn test_top_n_skips_failed_and_short_input() {
        let r = rows(&[("call", 90.0, None), ("call", 95.0, Some(1.0))]);
        let top = top_overpriced(&r, 5);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].row, 1);
    }

    #[test]
    fn test_histogram_unit_bins() {
        let r = rows(&[("c", 1.0, Some(0.0)), ("c", 1.0, Some(1.0)), ("c", 1.0, Some(2.0)), ("c", 1.0, Some(3.0)), ("c", 1.0, Some(4.0))]);
        let h = histogram(&r, 4);
        assert_eq!(h.len(), 4);
        assert_eq!(h[0].start, 0.0);
        assert_eq!(h[3].end, 4.0);
        assert_eq!(h.iter().map(|b| b.count).collect::<Vec<_>>(), vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_histogram_respects_max_bins_and_counts_all() {
        let cases: Vec<(&str, f64, Option<f64>)> = (0..57)
            .map(|i| ("call", 100.0, Some((i as f64 * 0.37).sin() * 3.1 - 0.4)))
            .chain(std::iter::once(("bad", 100.0, None)))
            .collect();
        let r = rows(&cases);
        let h = histogram(&r, 30);
        assert!(!h.is_empty() && h.len() <= 30, "bins={}", h.len());
        assert_eq!(h.iter().map(|b| b.count).sum::<usize>(), 57);
        let lo = r.iter().filter_map(|t| t.difference).fold(f64::INFINITY, f64::min);
        assert!(h[0].start <= lo);
    }

    #[test]
    fn test_histogram_degenerate() {
        assert!(histogram(&[], 30).is_empty());
        let r = rows(&[("c", 1.0, Some(0.0)), ("c", 1.0, Some(0.0))]);
        let h = histogram(&r, 30);
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].count, 2);
    }

    #[test]
    fn test_histogram_caps_huge_bin_request() {
        let r = rows(&[("call", 95.0, Some(1.5)), ("put", 100.0, Some(-0.7))]);
        let h = histogram(&r, usize::MAX);
        assert!(!h.is_empty() && h.len() <= MAX_HISTOGRAM_BINS, "bins={}", h.len());
        assert_eq!(h.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_histogram_unrepresentable_range() {
        // Width underflows to zero
        let r = rows(&[("c", 1.0, Some(0.0)), ("c", 1.0, Some(5e-324))]);
        assert!(histogram(&r, 30).is_empty());
        // Width overflows to infinity
        let r = rows(&[("c", 1.0, Some(-f64::MAX)), ("c", 1.0, Some(f64::MAX))]);
        assert!(histogram(&r, 30).is_empty());
    }

    #[test]
    fn test_nice_step() {
        assert_eq!(nice_step(1.0), 1.0);
        assert!((nice_step(0.19) - 0.2).abs() < 1e-12);
        assert!((nice_step(3.3) - 5.0).abs() < 1e-12);
        assert!((nice_step(7.0) - 10.0).abs() < 1e-12);
    }
}

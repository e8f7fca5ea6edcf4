// =================================================================
// provider/utils.rs - Utility Functions
// =================================================================

use chrono::{DateTime, NaiveDate};
use pairs_common::{Bar, OhlcvSeries};
use tracing::warn;

use super::{CsvBarRecord, ProviderError, YahooChartResult};

/// Validate a ticker as accepted by Yahoo Finance (`MA`, `BRK-B`, `^GSPC`, `EURUSD=X`)
pub fn validate_symbol(symbol: &str) -> Result<String, ProviderError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ProviderError::InvalidSymbol("Symbol cannot be empty".to_string()));
    }

    let symbol = symbol.to_uppercase();

    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    {
        return Err(ProviderError::InvalidSymbol(format!(
            "Symbol '{}' contains invalid characters",
            symbol
        )));
    }

    if symbol.len() > 20 {
        return Err(ProviderError::InvalidSymbol(format!(
            "Symbol '{}' has invalid length",
            symbol
        )));
    }

    Ok(symbol)
}

/// Midnight UTC of `date` as seconds since the epoch
pub fn date_to_unix(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Trading date of a bar stamped `timestamp`, seen from the exchange's time zone
pub fn exchange_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}

/// Convert a chart result into a bar series.
///
/// Rows without any close are skipped. A missing adjusted close falls back
/// to the close. Bars are ordered by date; when two timestamps land on the
/// same trading date the one later in the response wins.
pub fn convert_chart_result(symbol: &str, result: YahooChartResult) -> Result<OhlcvSeries, ProviderError> {
    let offset = result.meta.gmtoffset;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let column = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten().filter(|v| v.is_finite());

    let mut bars: Vec<Bar> = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let Some(date) = exchange_date(ts, offset) else {
            warn!("Skipping {} bar with invalid timestamp {}", symbol, ts);
            continue;
        };
        let Some(close) = column(&quote.close, i) else {
            continue;
        };
        let bar = Bar {
            date,
            open: column(&quote.open, i).unwrap_or(close),
            high: column(&quote.high, i).unwrap_or(close),
            low: column(&quote.low, i).unwrap_or(close),
            close,
            adj_close: column(&adjclose, i).unwrap_or(close),
            volume: column(&quote.volume, i).and_then(volume_from_f64),
        };
        bars.push(bar);
    }

    Ok(OhlcvSeries::new(symbol, sort_dedup_by_date(bars))?)
}

/// Convert parsed CSV rows into a bar series, sorted by date.
pub fn convert_csv_records(symbol: &str, records: Vec<CsvBarRecord>) -> Result<OhlcvSeries, ProviderError> {
    let mut bars = Vec::with_capacity(records.len());
    for record in records {
        let date = NaiveDate::parse_from_str(record.date.trim(), "%Y-%m-%d").map_err(|e| {
            ProviderError::ParseError(format!("Invalid date '{}' for {}: {}", record.date, symbol, e))
        })?;
        let close = parse_number(record.close.as_deref())?;
        let adj_close = parse_number(record.adj_close.as_deref())?;
        let Some(close) = close.or(adj_close) else {
            continue;
        };
        bars.push(Bar {
            date,
            open: parse_number(record.open.as_deref())?.unwrap_or(close),
            high: parse_number(record.high.as_deref())?.unwrap_or(close),
            low: parse_number(record.low.as_deref())?.unwrap_or(close),
            close,
            adj_close: adj_close.unwrap_or(close),
            volume: parse_number(record.volume.as_deref())?.and_then(volume_from_f64),
        });
    }
    Ok(OhlcvSeries::new(symbol, sort_dedup_by_date(bars))?)
}

/// Stable sort by date, keeping the last bar seen for each date
fn sort_dedup_by_date(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.date);
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

/// Parse a numeric cell; blank, `null` and `NaN` cells are missing.
pub fn parse_number(cell: Option<&str>) -> Result<Option<f64>, ProviderError> {
    let Some(cell) = cell.map(str::trim) else {
        return Ok(None);
    };
    if cell.is_empty() || cell.eq_ignore_ascii_case("null") || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(|v| v.is_finite().then_some(v))
        .map_err(|e| ProviderError::ParseError(format!("Invalid number '{}': {}", cell, e)))
}

fn volume_from_f64(volume: f64) -> Option<u64> {
    (volume.is_finite() && volume >= 0.0).then(|| volume.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::{YahooIndicators, YahooMeta, YahooQuote};

    #[test]
    fn test_symbol_validation() {
        assert_eq!(validate_symbol("ma").unwrap(), "MA");
        assert_eq!(validate_symbol(" brk-b ").unwrap(), "BRK-B");
        assert!(validate_symbol("^GSPC").is_ok());
        assert!(validate_symbol("EURUSD=X").is_ok());
        assert!(validate_symbol("").is_err());
        assert!(validate_symbol("MA V").is_err());
        assert!(validate_symbol("../etc").is_err());
        assert!(validate_symbol("A/B").is_err());
    }

    #[test]
    fn test_exchange_date_uses_offset() {
        // 2024-03-01 14:30 UTC is a New York open
        let ts = 1_709_303_400;
        let date = exchange_date(ts, -5 * 3600).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        // Just after midnight UTC still belongs to the previous New York day
        let late = date_to_unix(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()) + 60;
        assert_eq!(
            exchange_date(late, -5 * 3600).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(Some("1.5")).unwrap(), Some(1.5));
        assert_eq!(parse_number(Some("null")).unwrap(), None);
        assert_eq!(parse_number(Some(" ")).unwrap(), None);
        assert_eq!(parse_number(None).unwrap(), None);
        assert!(parse_number(Some("abc")).is_err());
    }

    #[test]
    fn test_convert_csv_records_sorts_and_skips_blank_rows() {
        let row = |date: &str, close: &str, volume: &str| CsvBarRecord {
            date: date.to_string(),
            open: Some(close.to_string()),
            high: Some(close.to_string()),
            low: Some(close.to_string()),
            close: Some(close.to_string()),
            adj_close: Some(close.to_string()),
            volume: Some(volume.to_string()),
        };
        let series = convert_csv_records(
            "V",
            vec![
                row("2024-01-03", "11.0", "200"),
                row("2024-01-02", "10.0", "100.0"),
                row("2024-01-04", "null", "null"),
            ],
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].volume, Some(100));
        assert_eq!(series.bars()[1].adj_close, 11.0);
    }

    fn chart(timestamps: Vec<i64>, closes: Vec<Option<f64>>) -> YahooChartResult {
        YahooChartResult {
            meta: YahooMeta {
                symbol: "MA".to_string(),
                currency: Some("USD".to_string()),
                gmtoffset: -5 * 3600,
            },
            timestamp: timestamps,
            indicators: YahooIndicators {
                quote: vec![YahooQuote {
                    close: closes,
                    ..YahooQuote::default()
                }],
                adjclose: Vec::new(),
            },
        }
    }

    #[test]
    fn test_chart_bars_out_of_order_are_sorted() {
        // Mar 4 arrives before Mar 1; the Mar 4 bar must survive
        let series = convert_chart_result(
            "MA",
            chart(vec![1_709_562_600, 1_709_303_400], vec![Some(2.0), Some(1.0)]),
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(series.bars()[0].close, 1.0);
        assert_eq!(series.bars()[1].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(series.bars()[1].close, 2.0);
    }

    #[test]
    fn test_chart_same_day_keeps_later_bar() {
        let series = convert_chart_result(
            "MA",
            chart(
                vec![1_709_303_400, 1_709_562_600, 1_709_303_400 + 3_600],
                vec![Some(1.0), Some(2.0), Some(3.0)],
            ),
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].close, 3.0);
        assert_eq!(series.bars()[1].close, 2.0);
    }
}

// =================================================================
// provider/types.rs - Data Structures
// =================================================================

use chrono::NaiveDate;
use serde::Deserialize;

use super::{utils::validate_symbol, ProviderError};

/// Parameters for a historical daily bar query. Both ends are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct BarsRequest {
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BarsRequest {
    pub fn new<I, S>(symbols: I, start: NaiveDate, end: NaiveDate) -> Result<Self, ProviderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if start > end {
            return Err(ProviderError::EmptyRange { start, end });
        }

        let mut validated: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = validate_symbol(symbol.as_ref())?;
            if !validated.contains(&symbol) {
                validated.push(symbol);
            }
        }
        if validated.is_empty() {
            return Err(ProviderError::InvalidSymbol("No symbols provided".to_string()));
        }

        Ok(Self {
            symbols: validated,
            start,
            end,
        })
    }

    /// Convenience constructor for a pair of tickers
    pub fn pair(a: &str, b: &str, start: NaiveDate, end: NaiveDate) -> Result<Self, ProviderError> {
        Self::new([a, b], start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Yahoo Finance chart endpoint envelope
#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    pub result: Option<Vec<YahooChartResult>>,
    pub error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
pub struct YahooApiError {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    pub meta: YahooMeta,

    /// Bar open times, seconds since the epoch
    #[serde(default)]
    pub timestamp: Vec<i64>,

    pub indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
pub struct YahooMeta {
    pub symbol: String,

    pub currency: Option<String>,

    /// Exchange offset from UTC in seconds
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooQuote>,

    #[serde(default)]
    pub adjclose: Vec<YahooAdjClose>,
}

/// Columns of the quote block; gaps arrive as `null`
#[derive(Debug, Default, Deserialize)]
pub struct YahooQuote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct YahooAdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

/// One row of a Yahoo-style CSV download
#[derive(Debug, Deserialize)]
pub struct CsvBarRecord {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Open")]
    pub open: Option<String>,
    #[serde(rename = "High")]
    pub high: Option<String>,
    #[serde(rename = "Low")]
    pub low: Option<String>,
    #[serde(rename = "Close")]
    pub close: Option<String>,
    #[serde(rename = "Adj Close")]
    pub adj_close: Option<String>,
    #[serde(rename = "Volume")]
    pub volume: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_request_normalizes_symbols() {
        let request = BarsRequest::new(["ma", "V", "MA"], day(1, 1), day(6, 30)).unwrap();
        assert_eq!(request.symbols, vec!["MA".to_string(), "V".to_string()]);
        assert!(request.contains(day(6, 30)));
        assert!(!request.contains(day(7, 1)));
    }

    #[test]
    fn test_request_rejects_reversed_range() {
        let err = BarsRequest::pair("MA", "V", day(6, 1), day(1, 1)).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyRange { .. }));
    }

    #[test]
    fn test_request_rejects_empty_symbols() {
        let none: [&str; 0] = [];
        assert!(matches!(
            BarsRequest::new(none, day(1, 1), day(2, 1)),
            Err(ProviderError::InvalidSymbol(_))
        ));
    }
}

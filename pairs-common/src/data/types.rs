// =================================================================
// data/types.rs - Market Data Types
// =================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while constructing or aligning market data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Series for {0} is empty")]
    EmptySeries(String),

    #[error("Dates for {symbol} must be strictly increasing (offending date: {date})")]
    NonIncreasingDates { symbol: String, date: NaiveDate },

    #[error("Invalid price for {symbol} on {date}: {value}")]
    InvalidPrice {
        symbol: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("No overlapping dates between {0} and {1}")]
    NoOverlap(String, String),
}

/// Daily OHLCV bar as returned by a data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Split and dividend adjusted close
    pub adj_close: f64,
    pub volume: Option<u64>,
}

impl Bar {
    /// Adjusted close is the only price the analysis consumes.
    /// A bar is usable when that price has a finite logarithm.
    pub fn has_valid_price(&self) -> bool {
        self.adj_close.is_finite() && self.adj_close > 0.0
    }
}

/// Bars for one ticker, ordered by strictly increasing date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvSeries {
    pub symbol: String,
    bars: Vec<Bar>,
}

impl OhlcvSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, DataError> {
        let symbol = symbol.into();
        ensure_increasing(&symbol, bars.iter().map(|b| b.date))?;
        Ok(Self { symbol, bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Keep only bars with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: self.symbol.clone(),
            bars: self
                .bars
                .iter()
                .filter(|b| b.date >= start && b.date <= end)
                .cloned()
                .collect(),
        }
    }
}

/// Single (date, value) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Log-price series for one ticker. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, DataError> {
        let symbol = symbol.into();
        ensure_increasing(&symbol, points.iter().map(|p| p.date))?;
        if let Some(p) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(DataError::InvalidPrice {
                symbol,
                date: p.date,
                value: p.value,
            });
        }
        Ok(Self { symbol, points })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when both series cover exactly the same dates.
    pub fn is_aligned_with(&self, other: &PriceSeries) -> bool {
        self.points.len() == other.points.len()
            && self
                .points
                .iter()
                .zip(&other.points)
                .all(|(a, b)| a.date == b.date)
    }
}

/// Two tickers aligned on the intersection of their trading dates.
///
/// Columns are stored side by side; every column has the same length
/// as `dates`, and `dates` is strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePair {
    pub symbol_a: String,
    pub symbol_b: String,
    pub(crate) dates: Vec<NaiveDate>,
    pub(crate) log_a: Vec<f64>,
    pub(crate) log_b: Vec<f64>,
    pub(crate) volume_a: Vec<Option<u64>>,
    pub(crate) volume_b: Vec<Option<u64>>,
}

impl PricePair {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn log_a(&self) -> &[f64] {
        &self.log_a
    }

    pub fn log_b(&self) -> &[f64] {
        &self.log_b
    }

    pub fn volume_a(&self) -> &[Option<u64>] {
        &self.volume_a
    }

    pub fn volume_b(&self) -> &[Option<u64>] {
        &self.volume_b
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn series_a(&self) -> PriceSeries {
        self.to_series(&self.symbol_a, &self.log_a)
    }

    pub fn series_b(&self) -> PriceSeries {
        self.to_series(&self.symbol_b, &self.log_b)
    }

    fn to_series(&self, symbol: &str, values: &[f64]) -> PriceSeries {
        PriceSeries {
            symbol: symbol.to_string(),
            points: self
                .dates
                .iter()
                .zip(values)
                .map(|(&date, &value)| PricePoint { date, value })
                .collect(),
        }
    }
}

/// Target exposure to the spread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Flat,
    Long,
    Short,
}

impl Position {
    /// Numeric encoding used by signal columns: 0, 1, -1.
    pub fn as_i8(self) -> i8 {
        match self {
            Position::Flat => 0,
            Position::Long => 1,
            Position::Short => -1,
        }
    }

    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(Position::Flat),
            1 => Some(Position::Long),
            -1 => Some(Position::Short),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Position::Flat => "FLAT",
            Position::Long => "LONG",
            Position::Short => "SHORT",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub position: Position,
}

/// Positions aligned one-to-one with the feature frame dates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    points: Vec<SignalPoint>,
}

impl SignalSeries {
    pub fn new(points: Vec<SignalPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[SignalPoint] {
        &self.points
    }

    pub fn positions(&self) -> Vec<Position> {
        self.points.iter().map(|p| p.position).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points where the position differs from the previous one.
    /// The initial state is flat, so an opening position on the first
    /// point counts as a transition.
    pub fn transitions(&self) -> Vec<SignalPoint> {
        let mut previous = Position::Flat;
        let mut out = Vec::new();
        for point in &self.points {
            if point.position != previous {
                out.push(*point);
                previous = point.position;
            }
        }
        out
    }
}

fn ensure_increasing<I>(symbol: &str, dates: I) -> Result<(), DataError>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut previous: Option<NaiveDate> = None;
    for date in dates {
        if let Some(prev) = previous {
            if date <= prev {
                return Err(DataError::NonIncreasingDates {
                    symbol: symbol.to_string(),
                    date,
                });
            }
        }
        previous = Some(date);
    }
    Ok(())
}

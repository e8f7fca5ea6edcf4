// =================================================================
// data/align.rs - Date Alignment
// =================================================================

use std::cmp::Ordering;
use tracing::debug;

use super::types::{DataError, OhlcvSeries, PricePair};

/// Inner-join two bar series on date and take logs of the adjusted close.
///
/// Dates where either side lacks a usable price are dropped, so the
/// resulting pair has identical, strictly increasing dates on both legs.
pub fn align_pair(a: &OhlcvSeries, b: &OhlcvSeries) -> Result<PricePair, DataError> {
    if a.is_empty() {
        return Err(DataError::EmptySeries(a.symbol.clone()));
    }
    if b.is_empty() {
        return Err(DataError::EmptySeries(b.symbol.clone()));
    }

    let bars_a = a.bars();
    let bars_b = b.bars();
    let capacity = bars_a.len().min(bars_b.len());

    let mut pair = PricePair {
        symbol_a: a.symbol.clone(),
        symbol_b: b.symbol.clone(),
        dates: Vec::with_capacity(capacity),
        log_a: Vec::with_capacity(capacity),
        log_b: Vec::with_capacity(capacity),
        volume_a: Vec::with_capacity(capacity),
        volume_b: Vec::with_capacity(capacity),
    };

    // Both inputs are sorted by construction, so a merge walk suffices.
    let (mut i, mut j) = (0, 0);
    while i < bars_a.len() && j < bars_b.len() {
        let (bar_a, bar_b) = (&bars_a[i], &bars_b[j]);
        match bar_a.date.cmp(&bar_b.date) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                if bar_a.has_valid_price() && bar_b.has_valid_price() {
                    pair.dates.push(bar_a.date);
                    pair.log_a.push(bar_a.adj_close.ln());
                    pair.log_b.push(bar_b.adj_close.ln());
                    pair.volume_a.push(bar_a.volume);
                    pair.volume_b.push(bar_b.volume);
                }
                i += 1;
                j += 1;
            }
        }
    }

    if pair.is_empty() {
        return Err(DataError::NoOverlap(a.symbol.clone(), b.symbol.clone()));
    }

    debug!(
        "Aligned {}/{}: {} common dates ({} and {} bars in)",
        a.symbol,
        b.symbol,
        pair.len(),
        bars_a.len(),
        bars_b.len()
    );

    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::Bar;
    use chrono::NaiveDate;

    fn bar(d: u32, price: f64, volume: Option<u64>) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            open: price,
            high: price,
            low: price,
            close: price,
            adj_close: price,
            volume,
        }
    }

    #[test]
    fn test_inner_join_on_dates() {
        let a = OhlcvSeries::new(
            "A",
            vec![bar(1, 10.0, Some(1)), bar(2, 11.0, Some(2)), bar(4, 12.0, Some(3))],
        )
        .unwrap();
        let b = OhlcvSeries::new(
            "B",
            vec![bar(2, 20.0, Some(5)), bar(3, 21.0, Some(6)), bar(4, 22.0, None)],
        )
        .unwrap();

        let pair = align_pair(&a, &b).unwrap();
        assert_eq!(pair.len(), 2);
        assert_eq!(pair.dates()[0], NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!((pair.log_a()[1] - 12.0_f64.ln()).abs() < 1e-12);
        assert!((pair.log_b()[0] - 20.0_f64.ln()).abs() < 1e-12);
        assert_eq!(pair.volume_a(), &[Some(2), Some(3)]);
        assert_eq!(pair.volume_b(), &[Some(5), None]);
        assert!(pair.series_a().is_aligned_with(&pair.series_b()));
    }

    #[test]
    fn test_rows_with_missing_price_are_dropped() {
        let a = OhlcvSeries::new("A", vec![bar(1, 10.0, Some(1)), bar(2, f64::NAN, Some(1))])
            .unwrap();
        let b = OhlcvSeries::new("B", vec![bar(1, 20.0, Some(1)), bar(2, 21.0, Some(1))])
            .unwrap();
        let pair = align_pair(&a, &b).unwrap();
        assert_eq!(pair.len(), 1);
    }

    #[test]
    fn test_disjoint_series_fail() {
        let a = OhlcvSeries::new("A", vec![bar(1, 10.0, None)]).unwrap();
        let b = OhlcvSeries::new("B", vec![bar(2, 20.0, None)]).unwrap();
        assert_eq!(
            align_pair(&a, &b),
            Err(DataError::NoOverlap("A".into(), "B".into()))
        );
    }

    #[test]
    fn test_empty_series_fail() {
        let a = OhlcvSeries::new("A", vec![]).unwrap();
        let b = OhlcvSeries::new("B", vec![bar(2, 20.0, None)]).unwrap();
        assert_eq!(align_pair(&a, &b), Err(DataError::EmptySeries("A".into())));
    }
}

// =================================================================
// analysis/signals.rs - Z-Score Signal State Machine
// =================================================================

use chrono::NaiveDate;
use pairs_common::{Position, SignalPoint, SignalSeries};
use tracing::debug;

use super::errors::AnalysisError;
use super::types::FeatureFrame;

pub const DEFAULT_ENTRY_THRESHOLD: f64 = 2.0;
pub const DEFAULT_EXIT_THRESHOLD: f64 = 0.5;

/// Turns z-scores into target positions with entry/exit hysteresis.
///
/// | state | condition     | next  |
/// |-------|---------------|-------|
/// | Flat  | z < -entry    | Long  |
/// | Flat  | z > +entry    | Short |
/// | Long  | z > -exit     | Flat  |
/// | Short | z < +exit     | Flat  |
///
/// Anything else keeps the current state. The position recorded for a
/// date is the state after that date's transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalGenerator {
    entry: f64,
    exit: f64,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self {
            entry: DEFAULT_ENTRY_THRESHOLD,
            exit: DEFAULT_EXIT_THRESHOLD,
        }
    }
}

impl SignalGenerator {
    /// Requires `entry > exit > 0`.
    pub fn new(entry: f64, exit: f64) -> Result<Self, AnalysisError> {
        if !(exit > 0.0 && entry > exit) || !entry.is_finite() {
            return Err(AnalysisError::InvalidThreshold { entry, exit });
        }
        Ok(Self { entry, exit })
    }

    pub fn entry(&self) -> f64 {
        self.entry
    }

    pub fn exit(&self) -> f64 {
        self.exit
    }

    /// One transition. A NaN z-score fails every comparison and holds the state.
    pub fn step(&self, current: Position, z: f64) -> Position {
        match current {
            Position::Flat if z < -self.entry => Position::Long,
            Position::Flat if z > self.entry => Position::Short,
            Position::Long if z > -self.exit => Position::Flat,
            Position::Short if z < self.exit => Position::Flat,
            state => state,
        }
    }

    pub fn positions(&self, z_scores: &[f64]) -> Vec<Position> {
        z_scores
            .iter()
            .scan(Position::Flat, |state, &z| {
                *state = self.step(*state, z);
                Some(*state)
            })
            .collect()
    }

    pub fn generate<I>(&self, z_scores: I) -> SignalSeries
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut state = Position::Flat;
        let points = z_scores
            .into_iter()
            .map(|(date, z)| {
                state = self.step(state, z);
                SignalPoint {
                    date,
                    position: state,
                }
            })
            .collect();
        SignalSeries::new(points)
    }

    /// Signals aligned one-to-one with the frame's rows.
    pub fn generate_for(&self, frame: &FeatureFrame) -> SignalSeries {
        let series = self.generate(frame.rows.iter().map(|r| (r.date, r.z_score)));
        debug!(
            "Signals {}/{}: {} rows, {} transitions (entry {}, exit {})",
            frame.symbol_a,
            frame.symbol_b,
            series.len(),
            series.transitions().len(),
            self.entry,
            self.exit
        );
        series
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pairs_common::Position::{Flat, Long, Short};

    #[test]
    fn test_reference_sequence() {
        let generator = SignalGenerator::new(2.0, 0.5).unwrap();
        let positions = generator.positions(&[0.0, -2.5, -2.5, -0.4, -0.4, 3.0]);
        assert_eq!(positions, vec![Flat, Long, Long, Flat, Flat, Short]);
    }

    #[test]
    fn test_empty_input() {
        let generator = SignalGenerator::default();
        assert!(generator.positions(&[]).is_empty());
        assert!(generator.generate(Vec::<(NaiveDate, f64)>::new()).is_empty());
    }

    #[test]
    fn test_invalid_thresholds() {
        for (entry, exit) in [(0.5, 2.0), (1.0, 1.0), (1.0, 0.0), (1.0, -0.5), (f64::NAN, 0.5), (f64::INFINITY, 0.5)] {
            assert_eq!(
                SignalGenerator::new(entry, exit).map(|_| ()).unwrap_err().to_string(),
                AnalysisError::InvalidThreshold { entry, exit }.to_string()
            );
        }
    }

    #[test]
    fn test_no_direct_reversal() {
        // Deterministic swings across both bands for several threshold pairs
        let z: Vec<f64> = (0..2_000)
            .map(|i| 3.5 * (i as f64 * 0.37).sin() + 1.2 * (i as f64 * 1.91).cos())
            .collect();
        for (entry, exit) in [(2.0, 0.5), (1.0, 0.25), (0.3, 0.1), (4.0, 3.9)] {
            let positions = SignalGenerator::new(entry, exit).unwrap().positions(&z);
            for pair in positions.windows(2) {
                assert!(
                    !matches!((pair[0], pair[1]), (Long, Short) | (Short, Long)),
                    "direct reversal with entry {} exit {}",
                    entry,
                    exit
                );
            }
        }
    }

    #[test]
    fn test_hysteresis_band_holds_position() {
        let generator = SignalGenerator::new(2.0, 0.5).unwrap();
        // Inside (-entry, -exit) a long is held, a flat stays flat.
        assert_eq!(generator.step(Long, -1.0), Long);
        assert_eq!(generator.step(Flat, -1.0), Flat);
        assert_eq!(generator.step(Short, 1.0), Short);
        // Boundaries are strict.
        assert_eq!(generator.step(Flat, -2.0), Flat);
        assert_eq!(generator.step(Long, -0.5), Long);
        assert_eq!(generator.step(Short, 0.5), Short);
    }

    #[test]
    fn test_nan_holds_state() {
        let generator = SignalGenerator::default();
        assert_eq!(generator.positions(&[-3.0, f64::NAN, -0.1]), vec![Long, Long, Flat]);
        assert_eq!(generator.step(Flat, f64::NAN), Flat);
    }

    #[test]
    fn test_deterministic() {
        let z: Vec<f64> = (0..500).map(|i| 3.0 * (i as f64 * 0.11).sin()).collect();
        let generator = SignalGenerator::new(1.5, 0.2).unwrap();
        assert_eq!(generator.positions(&z), generator.positions(&z));
    }

    #[test]
    fn test_generate_keeps_dates() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let input: Vec<(NaiveDate, f64)> = [0.0, 2.5, 0.1]
            .iter()
            .enumerate()
            .map(|(i, &z)| (start + chrono::Duration::days(i as i64), z))
            .collect();
        let series = SignalGenerator::default().generate(input.clone());
        assert_eq!(series.positions(), vec![Flat, Short, Flat]);
        assert_eq!(series.dates(), input.iter().map(|(d, _)| *d).collect::<Vec<_>>());
    }
}

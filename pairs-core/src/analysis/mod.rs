// =================================================================
// analysis/mod.rs - Statistical Pipeline Stages
// =================================================================

pub mod cointegration;
pub mod errors;
pub mod features;
pub mod signals;
pub mod spread;
pub mod stats;
pub mod types;

pub use cointegration::CointegrationTester;
pub use errors::AnalysisError;
pub use features::FeatureEngine;
pub use signals::SignalGenerator;
pub use spread::SpreadBuilder;
pub use stats::EwmStd;
pub use types::{CointegrationResult, CriticalValues, FeatureFrame, FeatureRow, HedgeModel, Spread};

pub mod data;

pub use data::align_pair;
pub use data::types::{
    Bar, DataError, OhlcvSeries, Position, PricePair, PricePoint, PriceSeries, SignalPoint,
    SignalSeries,
};

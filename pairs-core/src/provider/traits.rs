// provider/traits.rs

use super::{BarsRequest, ProviderError};
use async_trait::async_trait;
use pairs_common::OhlcvSeries;
use std::collections::HashMap;

/// Source of daily OHLCV history that every provider implements
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetch adjusted daily bars, including volume, for every requested
    /// symbol in one call. The map is keyed by the symbol as requested.
    async fn fetch_daily_bars(
        &self,
        request: &BarsRequest,
    ) -> Result<HashMap<String, OhlcvSeries>, ProviderError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

// =================================================================
// provider/memory.rs - In-Memory Provider
// =================================================================

use async_trait::async_trait;
use pairs_common::OhlcvSeries;
use std::collections::HashMap;

use super::{errors::ProviderError, traits::DataProvider, types::BarsRequest};

/// Serves preloaded series; used for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<String, OhlcvSeries>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series under its upper-cased symbol
    pub fn with_series(mut self, series: OhlcvSeries) -> Self {
        self.insert(series);
        self
    }

    pub fn insert(&mut self, series: OhlcvSeries) {
        self.series.insert(series.symbol.to_uppercase(), series);
    }
}

#[async_trait]
impl DataProvider for InMemoryProvider {
    async fn fetch_daily_bars(
        &self,
        request: &BarsRequest,
    ) -> Result<HashMap<String, OhlcvSeries>, ProviderError> {
        request
            .symbols
            .iter()
            .map(|symbol| {
                let stored = self
                    .series
                    .get(symbol)
                    .ok_or_else(|| ProviderError::UnknownSymbol(symbol.clone()))?;
                let mut series = stored.between(request.start, request.end);
                if series.is_empty() {
                    return Err(ProviderError::NoData(symbol.clone()));
                }
                series.symbol = symbol.clone();
                Ok((symbol.clone(), series))
            })
            .collect()
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// =================================================================
// provider/csv_file.rs - Local CSV Directory Provider
// =================================================================

use async_trait::async_trait;
use pairs_common::OhlcvSeries;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use super::{
    errors::ProviderError,
    traits::DataProvider,
    types::{BarsRequest, CsvBarRecord},
    utils::convert_csv_records,
};

/// Reads `{dir}/{SYMBOL}.csv` files in the Yahoo download layout:
/// `Date,Open,High,Low,Close,Adj Close,Volume`
#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol))
    }

    async fn load(&self, symbol: &str, request: &BarsRequest) -> Result<OhlcvSeries, ProviderError> {
        let path = self.path_for(symbol);
        debug!("Reading daily bars from {}", path.display());

        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::UnknownSymbol(format!(
                    "{} (no file at {})",
                    symbol,
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_slice());
        let records = reader
            .deserialize::<CsvBarRecord>()
            .collect::<Result<Vec<_>, _>>()?;

        let series = convert_csv_records(symbol, records)?.between(request.start, request.end);
        if series.is_empty() {
            return Err(ProviderError::NoData(symbol.to_string()));
        }
        Ok(series)
    }
}

#[async_trait]
impl DataProvider for CsvProvider {
    async fn fetch_daily_bars(
        &self,
        request: &BarsRequest,
    ) -> Result<HashMap<String, OhlcvSeries>, ProviderError> {
        let mut out = HashMap::with_capacity(request.symbols.len());
        for symbol in &request.symbols {
            let series = self.load(symbol, request).await?;
            info!("Loaded {} daily bars for {} from {}", series.len(), symbol, self.dir.display());
            out.insert(symbol.clone(), series);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "csv"
    }
}

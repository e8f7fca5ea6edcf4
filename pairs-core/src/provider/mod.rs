// provider/mod.rs
pub mod csv_file;
pub mod errors;
pub mod memory;
pub mod traits;
pub mod types;
pub mod utils;
pub mod yahoo;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ProviderKind, ProviderSettings};

// Re-export main interfaces for easy access
pub use csv_file::CsvProvider;
pub use errors::ProviderError;
pub use memory::InMemoryProvider;
pub use traits::DataProvider;
pub use types::*;
pub use yahoo::YahooProvider;

/// Build the provider selected by configuration
pub fn from_settings(settings: &ProviderSettings) -> Arc<dyn DataProvider> {
    match settings.kind {
        ProviderKind::Yahoo => {
            let mut provider = YahooProvider::new()
                .with_timeout(Duration::from_secs(settings.timeout_secs))
                .with_retry(
                    settings.retry_attempts,
                    Duration::from_millis(settings.retry_delay_ms),
                );
            if let Some(url) = &settings.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Arc::new(provider)
        }
        ProviderKind::Csv => Arc::new(CsvProvider::new(settings.csv_dir.clone())),
    }
}

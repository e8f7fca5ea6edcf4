// =================================================================
// provider/yahoo.rs - Yahoo Finance Chart API Provider
// =================================================================

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future::try_join_all;
use pairs_common::OhlcvSeries;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{
    errors::ProviderError,
    traits::DataProvider,
    types::{BarsRequest, YahooChartResponse},
    utils::{convert_chart_result, date_to_unix},
};

// Constants
const YAHOO_API_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) pairs-trade";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
const SECONDS_PER_DAY: i64 = 86_400;

/// Daily bars from the Yahoo Finance v8 chart endpoint
pub struct YahooProvider {
    api_url: String,
    client: reqwest::Client,
    timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl YahooProvider {
    pub fn new() -> Self {
        Self {
            api_url: YAHOO_API_URL.to_string(),
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts per symbol (at least one) and the pause between them
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        // period2 is exclusive, so extend it past the last requested day
        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=div%7Csplit&includeAdjustedClose=true",
            self.api_url,
            symbol,
            date_to_unix(start),
            date_to_unix(end) + SECONDS_PER_DAY
        )
    }

    /// Fetch one symbol, retrying transient failures
    async fn fetch_symbol(
        &self,
        symbol: &str,
        request: &BarsRequest,
    ) -> Result<(String, OhlcvSeries), ProviderError> {
        let mut attempt = 1;
        loop {
            match self.fetch_symbol_once(symbol, request).await {
                Ok(series) => return Ok((symbol.to_string(), series)),
                Err(e) if e.is_transient() && attempt < self.retry_attempts => {
                    warn!(
                        "Fetching {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        symbol, attempt, self.retry_attempts, e, self.retry_delay
                    );
                    attempt += 1;
                    sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_symbol_once(
        &self,
        symbol: &str,
        request: &BarsRequest,
    ) -> Result<OhlcvSeries, ProviderError> {
        let url = self.chart_url(symbol, request.start, request.end);
        debug!("Fetching daily bars from: {}", url);

        let response = self.client.get(&url).timeout(self.timeout).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::UnknownSymbol(symbol.to_string()));
        }
        if status.is_server_error() {
            return Err(ProviderError::NetworkError(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let series = parse_chart_response(symbol, &body)?;
        let series = series.between(request.start, request.end);
        if series.is_empty() {
            return Err(ProviderError::NoData(symbol.to_string()));
        }

        info!(
            "Fetched {} daily bars for {} ({} to {})",
            series.len(),
            symbol,
            series.first_date().map(|d| d.to_string()).unwrap_or_default(),
            series.last_date().map(|d| d.to_string()).unwrap_or_default()
        );
        Ok(series)
    }
}

/// Parse a chart endpoint body into a bar series for `symbol`
pub fn parse_chart_response(symbol: &str, body: &str) -> Result<OhlcvSeries, ProviderError> {
    let response: YahooChartResponse = serde_json::from_str(body)?;

    if let Some(error) = response.chart.error {
        return Err(if error.code.eq_ignore_ascii_case("Not Found") {
            ProviderError::UnknownSymbol(format!("{}: {}", symbol, error.description))
        } else {
            ProviderError::ApiError(format!("{}: {}", error.code, error.description))
        });
    }

    let result = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| ProviderError::NoData(symbol.to_string()))?;

    if !result.meta.symbol.eq_ignore_ascii_case(symbol) {
        debug!("Yahoo answered {} for requested {}", result.meta.symbol, symbol);
    }

    convert_chart_result(symbol, result)
}

#[async_trait]
impl DataProvider for YahooProvider {
    async fn fetch_daily_bars(
        &self,
        request: &BarsRequest,
    ) -> Result<HashMap<String, OhlcvSeries>, ProviderError> {
        info!(
            "Fetching daily bars for {:?} from {} to {}",
            request.symbols, request.start, request.end
        );

        let fetches = request
            .symbols
            .iter()
            .map(|symbol| self.fetch_symbol(symbol, request));
        let results = try_join_all(fetches).await?;

        Ok(results.into_iter().collect())
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

use chrono::{Local, NaiveDate};
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::analysis::cointegration::{DEFAULT_MIN_OBSERVATIONS, DEFAULT_SIGNIFICANCE};
use crate::analysis::features::{DEFAULT_MA_WINDOW, DEFAULT_ROC_PERIOD, DEFAULT_WINDOW};
use crate::analysis::signals::{DEFAULT_ENTRY_THRESHOLD, DEFAULT_EXIT_THRESHOLD};
use crate::analysis::EwmStd;
use crate::backtest::FillTiming;

/// Pair, date range and stage parameters for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ticker_a: String,
    pub ticker_b: String,
    pub start_date: NaiveDate,
    /// Inclusive; today when unset
    pub end_date: Option<NaiveDate>,
    pub significance: f64,
    pub window: usize,
    pub ma_window: usize,
    pub roc_period: usize,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    pub min_observations: usize,
    pub max_adf_lag: Option<usize>,
    pub ewm_std: EwmStd,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ticker_a: "DBC".to_string(),
            ticker_b: "GSG".to_string(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end_date: None,
            significance: DEFAULT_SIGNIFICANCE,
            window: DEFAULT_WINDOW,
            ma_window: DEFAULT_MA_WINDOW,
            roc_period: DEFAULT_ROC_PERIOD,
            entry_threshold: DEFAULT_ENTRY_THRESHOLD,
            exit_threshold: DEFAULT_EXIT_THRESHOLD,
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            max_adf_lag: None,
            ewm_std: EwmStd::default(),
        }
    }
}

impl PipelineConfig {
    pub fn end_date_or_today(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub enabled: bool,
    pub initial_capital: Decimal,
    /// Proportional commission charged on every fill
    pub commission_rate: Decimal,
    /// Share of available equity committed when opening a position
    pub size_fraction: Decimal,
    pub fill: FillTiming,
    pub close_at_end: bool,
    /// Annual rate used by the Sharpe and Sortino ratios
    pub risk_free_rate: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_capital: Decimal::from(100_000),
            commission_rate: Decimal::new(1, 3),
            size_fraction: Decimal::new(9999, 4),
            fill: FillTiming::default(),
            close_at_end: true,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub csv_dir: PathBuf,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            base_url: None,
            timeout_secs: 30,
            retry_attempts: 3,
            retry_delay_ms: 500,
            csv_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub backtest: BacktestSettings,
    pub provider: ProviderSettings,
}

impl Settings {
    /// Defaults, then `config/default.toml`, then `config/{RUN_MODE}.toml`,
    /// then `PAIRS__SECTION__KEY` environment variables.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = std::env::var("PAIRS_CONFIG_DIR").unwrap_or_else(|_| "config".into());
        Self::load(Path::new(&config_dir), &run_mode)
    }

    pub fn load(config_dir: &Path, run_mode: &str) -> Result<Self, ConfigError> {
        Self::load_with_env(config_dir, run_mode, None)
    }

    /// `env` stands in for the process environment when given
    fn load_with_env(
        config_dir: &Path,
        run_mode: &str,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let file = |name: &str| {
            let path = config_dir.join(name);
            File::with_name(&path.to_string_lossy()).required(false)
        };

        let s = Config::builder()
            .add_source(file("default"))
            .add_source(file(run_mode))
            .add_source(
                Environment::with_prefix("PAIRS")
                    .separator("__")
                    .source(env),
            )
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path(), "development").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.pipeline.window, 60);
        assert_eq!(settings.pipeline.ma_window, 20);
        assert_eq!(settings.backtest.commission_rate, Decimal::new(1, 3));
        assert_eq!(settings.provider.kind, ProviderKind::Yahoo);
    }

    #[test]
    fn test_run_mode_file_overrides_default_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
[pipeline]
ticker_a = "MA"
ticker_b = "V"
entry_threshold = 1.5

[backtest]
fill = "next_bar"
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("research.toml"),
            r#"
[pipeline]
entry_threshold = 1.0
exit_threshold = 0.25
start_date = "2021-06-01"
ewm_std = "unbiased"

[provider]
kind = "csv"
csv_dir = "fixtures"
"#,
        )
        .unwrap();

        let settings = Settings::load(dir.path(), "research").unwrap();
        assert_eq!(settings.pipeline.ticker_a, "MA");
        assert_eq!(settings.pipeline.entry_threshold, 1.0);
        assert_eq!(settings.pipeline.exit_threshold, 0.25);
        assert_eq!(
            settings.pipeline.start_date,
            NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()
        );
        assert_eq!(settings.pipeline.ewm_std, EwmStd::Unbiased);
        assert_eq!(settings.pipeline.window, 60);
        assert_eq!(settings.backtest.fill, FillTiming::NextBar);
        assert_eq!(settings.provider.kind, ProviderKind::Csv);
        assert_eq!(settings.provider.csv_dir, PathBuf::from("fixtures"));
    }

    #[test]
    fn test_environment_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[pipeline]\nwindow = 90\n\n[backtest]\ninitial_capital = 5000\n",
        )
        .unwrap();

        let env: HashMap<String, String> = [
            ("PAIRS__PIPELINE__WINDOW", "30"),
            ("PAIRS__PIPELINE__END_DATE", "2023-06-30"),
            ("PAIRS__BACKTEST__INITIAL_CAPITAL", "25000.50"),
            ("PAIRS__PROVIDER__KIND", "csv"),
            ("UNRELATED__PIPELINE__WINDOW", "7"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let settings = Settings::load_with_env(dir.path(), "development", Some(env)).unwrap();
        assert_eq!(settings.pipeline.window, 30);
        assert_eq!(settings.pipeline.end_date, NaiveDate::from_ymd_opt(2023, 6, 30));
        assert_eq!(settings.backtest.initial_capital, Decimal::new(2500050, 2));
        assert_eq!(settings.provider.kind, ProviderKind::Csv);
        assert_eq!(settings.pipeline.ma_window, 20);
    }

    #[test]
    fn test_explicit_end_date() {
        let config = PipelineConfig {
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31),
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.end_date_or_today(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }
}

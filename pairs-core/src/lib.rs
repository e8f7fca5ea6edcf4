pub mod analysis;
pub mod backtest;
pub mod config;
pub mod provider;
pub mod service;

//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod portfolio;
pub mod ranker;
pub mod sector;
pub mod timeframe;
pub mod window;
pub mod backtest;
pub mod benchmark;
pub mod metrics;
pub mod config_validation;
pub mod error;

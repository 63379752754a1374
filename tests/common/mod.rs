#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use reversion::domain::backtest::{BacktestConfig, SelectionMode, DEFAULT_MAX_SELECTION_ATTEMPTS};
use reversion::domain::error::ReversionError;
pub use reversion::domain::ohlcv::{PriceBar, PriceSeries};
use reversion::domain::sector::Sector;
use reversion::domain::timeframe::parse_timeframe;
use reversion::ports::data_port::PriceHistoryPort;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory price history. Every request is recorded so tests can check
/// which date ranges the engine asked for.
pub struct MockPriceHistory {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub requests: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MockPriceHistory {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.entry(ticker.to_string()).or_default().extend(bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn requests(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.requests.lock().unwrap().clone()
    }
}

impl PriceHistoryPort for MockPriceHistory {
    fn get_history(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, ReversionError> {
        self.requests
            .lock()
            .unwrap()
            .push((ticker.to_string(), start_date, end_date));

        if let Some(reason) = self.errors.get(ticker) {
            return Err(ReversionError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(ticker).ok_or_else(|| ReversionError::NoData {
            ticker: ticker.to_string(),
        })?;
        Ok(PriceSeries::new(
            ticker,
            bars.iter()
                .filter(|b| b.date >= start_date && b.date <= end_date)
                .cloned()
                .collect(),
        ))
    }

    fn list_tickers(&self) -> Result<Vec<String>, ReversionError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(date_str: &str, open: f64, close: f64) -> PriceBar {
    PriceBar {
        date: date(date_str),
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume: 1000.0,
    }
}

/// One bar per calendar day in `[start, end)`, all opening and closing at `price`.
pub fn flat_bars(start: &str, end: &str, price: f64) -> Vec<PriceBar> {
    path_bars(start, end, price, price)
}

/// Daily bars over `[start, end)` that open at `open` on the first day, sit
/// at `open` in between and close at `close` on the last day.
pub fn path_bars(start: &str, end: &str, open: f64, close: f64) -> Vec<PriceBar> {
    let (start, end) = (date(start), date(end));
    let mut bars = Vec::new();
    let mut day = start;
    while day < end {
        let next = day + Days::new(1);
        let c = if next == end { close } else { open };
        bars.push(PriceBar {
            date: day,
            open,
            high: open.max(c),
            low: open.min(c),
            close: c,
            volume: 1000.0,
        });
        day = next;
    }
    bars
}

pub fn sector(name: &str, tickers: &[&str]) -> Sector {
    Sector::new(name, tickers.iter().map(|t| t.to_string()))
}

/// One monthly window holding through February 2024 after a January lookback.
pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        start_date: date("2024-02-01"),
        end_date: date("2024-03-01"),
        initial_capital: 1000.0,
        backtest_interval: parse_timeframe("1m").unwrap(),
        test_interval: parse_timeframe("1m").unwrap(),
        selection: SelectionMode::Ranked,
        include_partial_window: false,
        max_selection_attempts: DEFAULT_MAX_SELECTION_ATTEMPTS,
    }
}

//! Portfolio state, equity curve and the per-window ledger.

use chrono::NaiveDate;

use super::window::BacktestWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// The short/long pair opened for one sector in one window.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorPick {
    pub sector: String,
    pub short_ticker: String,
    pub long_ticker: String,
    /// Lookback performance of each leg; `None` when picked at random.
    pub short_lookback: Option<f64>,
    pub long_lookback: Option<f64>,
    pub capital: f64,
    pub ending_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowRecord {
    pub window: BacktestWindow,
    pub starting_balance: f64,
    pub ending_balance: f64,
    pub picks: Vec<SectorPick>,
    pub skipped_sectors: Vec<String>,
}

impl WindowRecord {
    pub fn window_return(&self) -> f64 {
        if self.starting_balance > 0.0 {
            (self.ending_balance - self.starting_balance) / self.starting_balance
        } else {
            0.0
        }
    }
}

/// Single-writer run state. `balance` only changes between windows and the
/// equity curve only grows forward in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub balance: f64,
    pub initial_capital: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub windows: Vec<WindowRecord>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            balance: initial_capital,
            initial_capital,
            equity_curve: Vec::new(),
            windows: Vec::new(),
        }
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        if self.equity_curve.last().is_some_and(|p| p.date >= date) {
            return;
        }
        self.equity_curve.push(EquityPoint { date, equity });
    }

    /// Appends a window's segment and closes the window at `record.ending_balance`.
    pub fn close_window(&mut self, record: WindowRecord, segment: &[EquityPoint]) {
        for point in segment {
            self.record_equity(point.date, point.equity);
        }
        self.balance = record.ending_balance;
        self.windows.push(record);
    }

    /// The last `n` points of the equity curve.
    pub fn equity_tail(&self, n: usize) -> &[EquityPoint] {
        let start = self.equity_curve.len().saturating_sub(n);
        &self.equity_curve[start..]
    }
}

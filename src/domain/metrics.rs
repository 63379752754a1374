//! Performance metrics over the equity curve and the window ledger.

use super::portfolio::{EquityPoint, Portfolio};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest stretch below a prior peak, in equity-curve points.
    pub max_drawdown_duration: usize,
    pub windows_run: usize,
    pub windows_won: usize,
    pub windows_lost: usize,
    pub best_window_return: f64,
    pub worst_window_return: f64,
    pub sectors_skipped: usize,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, risk_free_rate: f64) -> Self {
        let equity_curve = &portfolio.equity_curve;
        let initial_capital = portfolio.initial_capital;

        let total_return = if initial_capital > 0.0 {
            (portfolio.balance - initial_capital) / initial_capital
        } else {
            0.0
        };

        let trading_days = equity_curve.len() as f64;
        let years = trading_days / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return.is_finite() && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, daily_rf);

        let mut windows_won = 0usize;
        let mut windows_lost = 0usize;
        let mut best_window_return = 0.0_f64;
        let mut worst_window_return = 0.0_f64;
        let mut sectors_skipped = 0usize;

        for (i, record) in portfolio.windows.iter().enumerate() {
            let r = record.window_return();
            if r > 0.0 {
                windows_won += 1;
            } else if r < 0.0 {
                windows_lost += 1;
            }
            if i == 0 || r > best_window_return {
                best_window_return = r;
            }
            if i == 0 || r < worst_window_return {
                worst_window_return = r;
            }
            sectors_skipped += record.skipped_sectors.len();
        }

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            windows_run: portfolio.windows.len(),
            windows_won,
            windows_lost,
            best_window_return,
            worst_window_return,
            sectors_skipped,
        }
    }
}

/// Deepest peak-to-trough fall as a fraction of the peak, and the longest
/// run of consecutive points spent below a prior peak.
fn compute_drawdown(curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut depth = 0.0_f64;
    let mut underwater = 0usize;
    let mut longest = 0usize;

    for point in &curve[1..] {
        if point.equity >= peak {
            peak = point.equity;
            underwater = 0;
            continue;
        }
        if peak > 0.0 {
            depth = depth.max(1.0 - point.equity / peak);
        }
        underwater += 1;
        longest = longest.max(underwater);
    }

    (depth, longest)
}

fn daily_returns(curve: &[EquityPoint]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|pair| match pair[0].equity {
            prev if prev > 0.0 => pair[1].equity / prev - 1.0,
            _ => 0.0,
        })
        .collect()
}

/// Annualised Sharpe and Sortino ratios of the daily returns in excess of
/// `daily_rf`. Both are zero when their deviation is zero.
fn compute_risk_adjusted(curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    let returns = daily_returns(curve);
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let excess = mean - daily_rf;
    let annualise = TRADING_DAYS_PER_YEAR.sqrt();

    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let downside = (returns
        .iter()
        .map(|r| (r - daily_rf).min(0.0).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let ratio = |deviation: f64| {
        if deviation > 0.0 {
            excess / deviation * annualise
        } else {
            0.0
        }
    };
    (ratio(stddev), ratio(downside))
}

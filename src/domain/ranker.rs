//! Best/worst performer selection within a sector over a lookback window.

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::error::ReversionError;
use super::position::{scalar_return, Stance};
use crate::ports::data_port::PriceHistoryPort;

#[derive(Debug, Clone, PartialEq)]
pub struct TickerScore {
    pub ticker: String,
    /// Raw percentage performance, open of the first bar to close of the last.
    pub performance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub best: TickerScore,
    pub worst: TickerScore,
}

/// Scores every ticker with usable data over `[start, end]`, in input order.
///
/// Tickers that fail to load, have no bars in the window, or produce a
/// numeric error are left out.
pub fn score_tickers(
    port: &dyn PriceHistoryPort,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<TickerScore> {
    tickers
        .iter()
        .filter_map(|ticker| match score_ticker(port, ticker, start, end) {
            Ok(performance) => {
                debug!(ticker = %ticker, performance, "scored");
                Some(TickerScore {
                    ticker: ticker.clone(),
                    performance,
                })
            }
            Err(e) if e.is_ticker_level() => {
                debug!(ticker = %ticker, error = %e, "excluded from ranking");
                None
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "excluded from ranking");
                None
            }
        })
        .collect()
}

fn score_ticker(
    port: &dyn PriceHistoryPort,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, ReversionError> {
    let series = port.get_history(ticker, start, end)?;
    let window = series.range_inclusive(start, end);
    if window.is_empty() {
        return Err(ReversionError::NoData {
            ticker: ticker.to_string(),
        });
    }
    scalar_return(window, Stance::Long)
}

/// Picks the extremes with strict comparisons, so the first ticker to reach
/// a maximum or minimum keeps it on ties.
pub fn pick_extremes(scores: &[TickerScore]) -> Option<Ranking> {
    let mut iter = scores.iter();
    let first = iter.next()?;
    let mut best = first;
    let mut worst = first;

    for score in iter {
        if score.performance > best.performance {
            best = score;
        }
        if score.performance < worst.performance {
            worst = score;
        }
    }

    Some(Ranking {
        best: best.clone(),
        worst: worst.clone(),
    })
}

/// Ranks `tickers` over `[start, end]`.
///
/// Fails with [`ReversionError::NoEligibleInstruments`] if no ticker has
/// usable data, so the caller can skip the sector instead of aborting.
pub fn rank(
    port: &dyn PriceHistoryPort,
    sector: &str,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Ranking, ReversionError> {
    let scores = score_tickers(port, tickers, start, end);
    pick_extremes(&scores).ok_or_else(|| ReversionError::NoEligibleInstruments {
        sector: sector.to_string(),
    })
}

//! Rolling-window mean-reversion engine.
//!
//! For every holding window the engine ranks each sector over the preceding
//! lookback window, shorts the best performer and buys the worst, marks both
//! legs to market daily and folds the result into one equity curve. Windows
//! run strictly in date order because each starts from the previous ending
//! balance; sectors inside a window are independent and fan out on rayon.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::benchmark::Benchmark;
use super::error::ReversionError;
use super::ohlcv::PriceBar;
use super::portfolio::{EquityPoint, Portfolio, SectorPick, WindowRecord};
use super::position::{daily_value_path, Position, PositionValuePath, Stance};
use super::ranker::{pick_extremes, score_tickers};
use super::sector::{Sector, SectorHistory};
use super::timeframe::Timeframe;
use super::window::{plan_windows, BacktestWindow};
use crate::ports::data_port::PriceHistoryPort;

pub const DEFAULT_MAX_SELECTION_ATTEMPTS: usize = 5;

const EQUITY_TAIL_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Short the lookback winner, buy the lookback loser.
    Ranked,
    /// Null-hypothesis baseline: two tickers drawn uniformly with replacement.
    Random { seed: u64 },
}

impl SelectionMode {
    pub fn is_random(&self) -> bool {
        matches!(self, SelectionMode::Random { .. })
    }
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub backtest_interval: Timeframe,
    pub test_interval: Timeframe,
    pub selection: SelectionMode,
    pub include_partial_window: bool,
    /// Upper bound on re-ranking/re-sampling when a picked leg has no usable
    /// holding-window data.
    pub max_selection_attempts: usize,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), ReversionError> {
        if self.end_date <= self.start_date {
            return Err(ReversionError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if !(self.initial_capital > 0.0 && self.initial_capital.is_finite()) {
            return Err(ReversionError::ConfigInvalid {
                section: "backtest".into(),
                key: "initial_capital".into(),
                reason: "initial_capital must be positive".into(),
            });
        }
        if self.max_selection_attempts == 0 {
            return Err(ReversionError::ConfigInvalid {
                section: "backtest".into(),
                key: "max_selection_attempts".into(),
                reason: "max_selection_attempts must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub selection: SelectionMode,
    pub portfolio: Portfolio,
}

impl BacktestResult {
    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.portfolio.equity_curve
    }

    pub fn final_balance(&self) -> f64 {
        self.portfolio.balance
    }
}

/// Everything an exporter needs: the strategy run, optional random
/// baselines and an optional benchmark overlay.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub result: BacktestResult,
    pub baselines: Vec<BacktestResult>,
    pub benchmark: Option<Benchmark>,
}

/// Where sector membership comes from for a run.
#[derive(Debug, Clone)]
pub enum Membership {
    Fixed(Vec<Sector>),
    History(SectorHistory),
}

impl Membership {
    /// Sectors in force on `date`.
    pub fn sectors_on(&self, date: NaiveDate) -> Option<&[Sector]> {
        match self {
            Membership::Fixed(sectors) => Some(sectors),
            Membership::History(history) => history.as_of(date).map(|(_, sectors)| sectors),
        }
    }
}

/// Runs the strategy against whichever membership source is configured.
pub fn run_strategy(
    port: &dyn PriceHistoryPort,
    membership: &Membership,
    config: &BacktestConfig,
) -> Result<BacktestResult, ReversionError> {
    match membership {
        Membership::Fixed(sectors) => run_backtest(port, sectors, config),
        Membership::History(history) => run_with_sector_history(port, history, config),
    }
}

/// A window's contribution: the balance it closes at and its daily segment.
#[derive(Debug, Clone)]
pub struct WindowOutcome {
    pub record: WindowRecord,
    pub segment: Vec<EquityPoint>,
}

#[derive(Debug, Clone)]
struct Leg {
    ticker: String,
    lookback: Option<f64>,
    bars: Vec<PriceBar>,
}

impl Leg {
    fn open(self, stance: Stance, capital: f64) -> Position {
        Position {
            ticker: self.ticker,
            stance,
            capital,
            bars: self.bars,
        }
    }
}

#[derive(Debug, Clone)]
struct SectorLegs {
    short: Leg,
    long: Leg,
}

/// Runs the strategy over a fixed set of sectors.
pub fn run_backtest(
    port: &dyn PriceHistoryPort,
    sectors: &[Sector],
    config: &BacktestConfig,
) -> Result<BacktestResult, ReversionError> {
    if sectors.is_empty() {
        return Err(ReversionError::Universe {
            reason: "universe contains no sectors".into(),
        });
    }
    run_windows(port, config, |_| Some(sectors))
}

/// Runs the strategy with sector membership looked up per window: the
/// definition in force is the latest one effective on or before the
/// window's lookback start. Windows with no definition yet hold cash.
pub fn run_with_sector_history(
    port: &dyn PriceHistoryPort,
    history: &SectorHistory,
    config: &BacktestConfig,
) -> Result<BacktestResult, ReversionError> {
    if history.is_empty() {
        return Err(ReversionError::Universe {
            reason: "sector history contains no definitions".into(),
        });
    }
    run_windows(port, config, |window| {
        history.as_of(window.lookback_start).map(|(effective, sectors)| {
            debug!(window = window.index, %effective, "using sector definition");
            sectors
        })
    })
}

fn run_windows<'a, F>(
    port: &dyn PriceHistoryPort,
    config: &BacktestConfig,
    sectors_for: F,
) -> Result<BacktestResult, ReversionError>
where
    F: Fn(&BacktestWindow) -> Option<&'a [Sector]>,
{
    config.validate()?;
    let windows = plan_windows(
        config.start_date,
        config.end_date,
        &config.backtest_interval,
        &config.test_interval,
        config.include_partial_window,
    )?;

    info!(
        total_windows = windows.len(),
        lookback = %config.backtest_interval,
        hold = %config.test_interval,
        random = config.selection.is_random(),
        "starting backtest"
    );

    let mut portfolio = Portfolio::new(config.initial_capital);

    for window in &windows {
        let outcome = match sectors_for(window) {
            Some(sectors) => run_window(port, sectors, window, portfolio.balance, config)?,
            None => {
                warn!(
                    window = window.index,
                    lookback_start = %window.lookback_start,
                    "no sector definition in force, holding cash"
                );
                idle_window(window, portfolio.balance, Vec::new())
            }
        };
        portfolio.close_window(outcome.record, &outcome.segment);

        let tail: Vec<String> = portfolio
            .equity_tail(EQUITY_TAIL_LEN)
            .iter()
            .map(|p| format!("{} {:.2}", p.date, p.equity))
            .collect();
        info!(
            window = window.index + 1,
            of = windows.len(),
            hold_start = %window.hold_start,
            hold_end = %window.hold_end,
            partial = window.is_partial(&config.test_interval),
            balance = %format!("{:.2}", portfolio.balance),
            tail = %tail.join(", "),
            "window complete"
        );
    }

    Ok(BacktestResult {
        selection: config.selection,
        portfolio,
    })
}

fn idle_window(window: &BacktestWindow, balance: f64, skipped: Vec<String>) -> WindowOutcome {
    WindowOutcome {
        record: WindowRecord {
            window: *window,
            starting_balance: balance,
            ending_balance: balance,
            picks: Vec::new(),
            skipped_sectors: skipped,
        },
        segment: cash_segment(window, balance),
    }
}

/// Flat `balance` on every weekday in `[hold_start, hold_end)`.
fn cash_segment(window: &BacktestWindow, balance: f64) -> Vec<EquityPoint> {
    window
        .hold_start
        .iter_days()
        .take_while(|day| *day < window.hold_end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .map(|date| EquityPoint {
            date,
            equity: balance,
        })
        .collect()
}

/// Executes one window as a pure function of the prior balance and inputs.
///
/// Sectors with no eligible pair are skipped and the balance is split
/// equally among the remaining ones.
pub fn run_window(
    port: &dyn PriceHistoryPort,
    sectors: &[Sector],
    window: &BacktestWindow,
    balance: f64,
    config: &BacktestConfig,
) -> Result<WindowOutcome, ReversionError> {
    let selections: Vec<Result<SectorLegs, ReversionError>> = sectors
        .par_iter()
        .enumerate()
        .map(|(sector_index, sector)| select_legs(port, sector, sector_index, window, config))
        .collect();

    let mut eligible: Vec<(&Sector, SectorLegs)> = Vec::new();
    let mut skipped = Vec::new();
    for (sector, selection) in sectors.iter().zip(selections) {
        match selection {
            Ok(legs) => eligible.push((sector, legs)),
            Err(e) => {
                warn!(window = window.index, sector = %sector.name, error = %e, "skipping sector");
                skipped.push(sector.name.clone());
            }
        }
    }

    if eligible.is_empty() {
        warn!(window = window.index, "no eligible sectors, holding cash");
        return Ok(idle_window(window, balance, skipped));
    }

    let capital = balance / eligible.len() as f64;
    let mut picks = Vec::with_capacity(eligible.len());
    let mut sector_paths = Vec::with_capacity(eligible.len());

    for (sector, legs) in eligible {
        let (short_lookback, long_lookback) = (legs.short.lookback, legs.long.lookback);
        let short = legs.short.open(Stance::Short, capital / 2.0);
        let long = legs.long.open(Stance::Long, capital / 2.0);
        let sector_path =
            PositionValuePath::sum_aligned(&[short.value_path()?, long.value_path()?]);

        debug!(
            window = window.index,
            sector = %sector.name,
            short = %short.ticker,
            long = %long.ticker,
            "opened pair"
        );

        picks.push(SectorPick {
            sector: sector.name.clone(),
            short_ticker: short.ticker,
            long_ticker: long.ticker,
            short_lookback,
            long_lookback,
            capital,
            ending_value: sector_path.last_value().unwrap_or(capital),
        });
        sector_paths.push(sector_path);
    }

    let window_path = PositionValuePath::sum_aligned(&sector_paths);
    let ending_balance = window_path.last_value().unwrap_or(balance);

    Ok(WindowOutcome {
        record: WindowRecord {
            window: *window,
            starting_balance: balance,
            ending_balance,
            picks,
            skipped_sectors: skipped,
        },
        segment: window_path.points,
    })
}

fn select_legs(
    port: &dyn PriceHistoryPort,
    sector: &Sector,
    sector_index: usize,
    window: &BacktestWindow,
    config: &BacktestConfig,
) -> Result<SectorLegs, ReversionError> {
    match config.selection {
        SelectionMode::Ranked => select_ranked(port, sector, window, config.max_selection_attempts),
        SelectionMode::Random { seed } => {
            let mut rng = StdRng::seed_from_u64(mix_seed(seed, window.index, sector_index));
            select_random(port, sector, window, config.max_selection_attempts, &mut rng)
        }
    }
}

fn select_ranked(
    port: &dyn PriceHistoryPort,
    sector: &Sector,
    window: &BacktestWindow,
    max_attempts: usize,
) -> Result<SectorLegs, ReversionError> {
    let mut scores = score_tickers(
        port,
        &sector.tickers,
        window.lookback_start,
        window.lookback_end,
    );

    for attempt in 1..=max_attempts {
        let Some(ranking) = pick_extremes(&scores) else {
            break;
        };
        let short = load_leg(port, &ranking.best.ticker, window, Stance::Short);
        let long = load_leg(port, &ranking.worst.ticker, window, Stance::Long);

        match (short, long) {
            (Ok(short_bars), Ok(long_bars)) => {
                return Ok(SectorLegs {
                    short: Leg {
                        ticker: ranking.best.ticker,
                        lookback: Some(ranking.best.performance),
                        bars: short_bars,
                    },
                    long: Leg {
                        ticker: ranking.worst.ticker,
                        lookback: Some(ranking.worst.performance),
                        bars: long_bars,
                    },
                });
            }
            (short, long) => {
                for (ticker, result) in [(&ranking.best.ticker, short), (&ranking.worst.ticker, long)] {
                    if let Err(e) = result {
                        debug!(sector = %sector.name, %ticker, attempt, error = %e, "leg unavailable, re-ranking");
                        scores.retain(|s| &s.ticker != ticker);
                    }
                }
            }
        }
    }

    Err(ReversionError::NoEligibleInstruments {
        sector: sector.name.clone(),
    })
}

fn select_random(
    port: &dyn PriceHistoryPort,
    sector: &Sector,
    window: &BacktestWindow,
    max_attempts: usize,
    rng: &mut StdRng,
) -> Result<SectorLegs, ReversionError> {
    let n = sector.tickers.len();
    if n > 0 {
        for attempt in 1..=max_attempts {
            let short_ticker = &sector.tickers[rng.gen_range(0..n)];
            let long_ticker = &sector.tickers[rng.gen_range(0..n)];

            let short = load_leg(port, short_ticker, window, Stance::Short);
            let long = load_leg(port, long_ticker, window, Stance::Long);
            match (short, long) {
                (Ok(short_bars), Ok(long_bars)) => {
                    return Ok(SectorLegs {
                        short: Leg {
                            ticker: short_ticker.clone(),
                            lookback: None,
                            bars: short_bars,
                        },
                        long: Leg {
                            ticker: long_ticker.clone(),
                            lookback: None,
                            bars: long_bars,
                        },
                    });
                }
                _ => debug!(sector = %sector.name, attempt, "sampled leg unavailable, re-sampling"),
            }
        }
    }

    Err(ReversionError::NoEligibleInstruments {
        sector: sector.name.clone(),
    })
}

/// Holding-window bars for one leg, checked to produce a finite value path.
fn load_leg(
    port: &dyn PriceHistoryPort,
    ticker: &str,
    window: &BacktestWindow,
    stance: Stance,
) -> Result<Vec<PriceBar>, ReversionError> {
    let series = port.get_history(ticker, window.hold_start, window.hold_end)?;
    let bars = series.range(window.hold_start, window.hold_end).to_vec();
    if bars.is_empty() {
        return Err(ReversionError::NoData {
            ticker: ticker.to_string(),
        });
    }
    daily_value_path(1.0, &bars, stance)?;
    Ok(bars)
}

/// Derives an independent RNG stream per (run, window, sector) so results do
/// not depend on the order rayon schedules sectors in.
fn mix_seed(seed: u64, window_index: usize, sector_index: usize) -> u64 {
    seed.wrapping_add((window_index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((sector_index as u64 + 1).wrapping_mul(0xC2B2_AE3D_27D4_EB4F))
}

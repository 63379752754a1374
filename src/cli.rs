//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::{CsvLedgerAdapter, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::svg_chart_adapter::SvgChartAdapter;
use crate::adapters::universe_csv_adapter::{CsvSectorHistoryAdapter, CsvUniverseAdapter};
use crate::domain::backtest::{
    self as engine, BacktestConfig, BacktestReport, BacktestResult, Membership, SelectionMode,
    DEFAULT_MAX_SELECTION_ATTEMPTS,
};
use crate::domain::benchmark::Benchmark;
use crate::domain::config_validation::{parse_date, parse_value, validate_backtest_config};
use crate::domain::error::ReversionError;
use crate::domain::metrics::Metrics;
use crate::domain::position::{scalar_return, Position, Stance};
use crate::domain::ranker;
use crate::domain::timeframe::{parse_timeframe, Timeframe};
use crate::domain::window::plan_windows;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceHistoryPort;
use crate::ports::report_port::ReportPort;
use crate::ports::universe_port::{SectorHistoryPort, UniversePort};

#[derive(Parser, Debug)]
#[command(name = "reversion", about = "Sector mean-reversion backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the rolling-window backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Equity curve CSV (overrides [report] output)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// SVG chart (overrides [report] chart)
        #[arg(long)]
        chart: Option<PathBuf>,
        /// Per-window ledger CSV (overrides [report] ledger)
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Pick both legs at random instead of by lookback rank
        #[arg(long)]
        random: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Rank one sector over a single lookback and holding period
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        sector: String,
        #[arg(long)]
        lookback_start: NaiveDate,
        #[arg(long)]
        hold_start: NaiveDate,
        #[arg(long)]
        hold_end: NaiveDate,
    },
    /// Return of a single long or short position
    Position {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        start: NaiveDate,
        /// Last trading day included
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        short: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List tickers with price data and universe members missing it
    Tickers {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Report settings and overlays that sit outside the engine's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub random_runs: usize,
    /// Baseline run `i` (1-based) uses `baseline_seed + i`.
    pub baseline_seed: u64,
    pub risk_free_rate: f64,
    pub benchmark: Option<String>,
    pub output: PathBuf,
    pub chart: Option<PathBuf>,
    pub ledger: Option<PathBuf>,
}

/// Command-line overrides for the `[report]` section and selection mode.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub chart: Option<PathBuf>,
    pub ledger: Option<PathBuf>,
    pub random: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            chart,
            ledger,
            random,
            dry_run,
        } => {
            let overrides = Overrides {
                output,
                chart,
                ledger,
                random,
            };
            run_backtest(&config, &overrides, dry_run)
        }
        Command::Analyze {
            config,
            sector,
            lookback_start,
            hold_start,
            hold_end,
        } => run_analyze(&config, &sector, lookback_start, hold_start, hold_end),
        Command::Position {
            config,
            ticker,
            start,
            end,
            short,
        } => {
            let stance = if short { Stance::Short } else { Stance::Long };
            run_position(&config, &ticker, start, end, stance)
        }
        Command::Validate { config } => run_validate(&config),
        Command::Tickers { config } => run_tickers(&config),
    }
}

fn fail(err: &ReversionError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

fn required(adapter: &dyn ConfigPort, section: &str, key: &str) -> Result<String, ReversionError> {
    adapter
        .get_non_empty(section, key)
        .ok_or_else(|| ReversionError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

fn required_timeframe(adapter: &dyn ConfigPort, key: &str) -> Result<Timeframe, ReversionError> {
    parse_timeframe(&required(adapter, "backtest", key)?)
}

/// The configured seed, or a fresh one that is logged so the run can be repeated.
fn resolve_seed(adapter: &dyn ConfigPort) -> Result<u64, ReversionError> {
    match adapter.get_non_empty("backtest", "random_seed") {
        Some(seed) => seed.parse().map_err(|e| ReversionError::ConfigInvalid {
            section: "backtest".into(),
            key: "random_seed".into(),
            reason: format!("random_seed must be an unsigned integer: {e}"),
        }),
        None => {
            let seed = rand::random::<u64>();
            info!(seed, "no random_seed configured, drew one");
            Ok(seed)
        }
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, ReversionError> {
    let start_date = parse_date(
        adapter.get_non_empty("backtest", "start_date").as_deref(),
        "start_date",
    )?;
    let end_date = parse_date(
        adapter.get_non_empty("backtest", "end_date").as_deref(),
        "end_date",
    )?;

    let selection = if adapter.get_bool("backtest", "random_selection", false) {
        SelectionMode::Random {
            seed: resolve_seed(adapter)?,
        }
    } else {
        SelectionMode::Ranked
    };

    let attempts: i64 = parse_value(
        adapter,
        "backtest",
        "max_selection_attempts",
        DEFAULT_MAX_SELECTION_ATTEMPTS as i64,
    )?;
    let max_selection_attempts =
        usize::try_from(attempts).map_err(|_| ReversionError::ConfigInvalid {
            section: "backtest".into(),
            key: "max_selection_attempts".into(),
            reason: "max_selection_attempts must be at least 1".into(),
        })?;

    let config = BacktestConfig {
        start_date,
        end_date,
        initial_capital: parse_value(adapter, "backtest", "initial_capital", 0.0)?,
        backtest_interval: required_timeframe(adapter, "backtest_interval")?,
        test_interval: required_timeframe(adapter, "test_interval")?,
        selection,
        include_partial_window: adapter.get_bool("backtest", "include_partial_window", false),
        max_selection_attempts,
    };
    config.validate()?;
    Ok(config)
}

pub fn build_pipeline_options(
    adapter: &dyn ConfigPort,
    bt_config: &BacktestConfig,
    overrides: &Overrides,
) -> Result<PipelineOptions, ReversionError> {
    let runs: i64 = parse_value(adapter, "backtest", "random_runs", 0)?;
    let random_runs = usize::try_from(runs).map_err(|_| ReversionError::ConfigInvalid {
        section: "backtest".into(),
        key: "random_runs".into(),
        reason: "random_runs must be non-negative".into(),
    })?;

    let baseline_seed = match bt_config.selection {
        SelectionMode::Random { seed } => seed,
        SelectionMode::Ranked if random_runs > 0 => resolve_seed(adapter)?,
        SelectionMode::Ranked => 0,
    };

    let report_path = |cli: &Option<PathBuf>, key: &str| {
        cli.clone()
            .or_else(|| adapter.get_non_empty("report", key).map(PathBuf::from))
    };

    Ok(PipelineOptions {
        random_runs,
        baseline_seed,
        risk_free_rate: parse_value(adapter, "backtest", "risk_free_rate", 0.0)?,
        benchmark: adapter
            .get_non_empty("benchmark", "ticker")
            .map(|t| t.to_uppercase()),
        output: report_path(&overrides.output, "output")
            .unwrap_or_else(|| PathBuf::from("equity.csv")),
        chart: report_path(&overrides.chart, "chart"),
        ledger: report_path(&overrides.ledger, "ledger"),
    })
}

/// Point-in-time sector history when configured, otherwise the fixed universe.
pub fn load_membership(adapter: &dyn ConfigPort) -> Result<Membership, ReversionError> {
    if let Some(path) = adapter.get_non_empty("data", "sector_history_file") {
        let history = CsvSectorHistoryAdapter::new(PathBuf::from(path)).get_sector_history()?;
        return Ok(Membership::History(history));
    }
    let path = required(adapter, "data", "universe_file")?;
    let sectors = CsvUniverseAdapter::new(PathBuf::from(path)).get_universe()?;
    Ok(Membership::Fixed(sectors))
}

pub fn price_adapter(adapter: &dyn ConfigPort) -> Result<CsvPriceAdapter, ReversionError> {
    let dir = required(adapter, "data", "price_dir")?;
    Ok(CsvPriceAdapter::new(PathBuf::from(dir)))
}

fn run_backtest(config_path: &Path, overrides: &Overrides, dry_run: bool) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }

    // Stage 3: Build engine config and pipeline options
    let mut bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if overrides.random && !bt_config.selection.is_random() {
        bt_config.selection = match resolve_seed(&adapter) {
            Ok(seed) => SelectionMode::Random { seed },
            Err(e) => return fail(&e),
        };
    }
    let options = match build_pipeline_options(&adapter, &bt_config, overrides) {
        Ok(o) => o,
        Err(e) => return fail(&e),
    };

    // Stage 4: Load sector membership
    let membership = match load_membership(&adapter) {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };

    if dry_run {
        return run_dry_run(&bt_config, &membership, &options);
    }

    let prices = match price_adapter(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    run_backtest_pipeline(&prices, &membership, &bt_config, &options)
}

fn describe_membership(membership: &Membership) {
    match membership {
        Membership::Fixed(sectors) => {
            let tickers: usize = sectors.iter().map(|s| s.count()).sum();
            eprintln!("  {} sectors, {} tickers", sectors.len(), tickers);
            for sector in sectors {
                eprintln!("    {}: {}", sector.name, sector.count());
            }
        }
        Membership::History(history) => {
            eprintln!("  sector history with {} dated definitions", history.len());
        }
    }
}

pub fn run_dry_run(
    bt_config: &BacktestConfig,
    membership: &Membership,
    options: &PipelineOptions,
) -> ExitCode {
    let windows = match plan_windows(
        bt_config.start_date,
        bt_config.end_date,
        &bt_config.backtest_interval,
        &bt_config.test_interval,
        bt_config.include_partial_window,
    ) {
        Ok(w) => w,
        Err(e) => return fail(&e),
    };

    eprintln!("Config validated successfully");
    eprintln!("\nBacktest:");
    eprintln!(
        "  {} to {}, lookback {}, hold {}",
        bt_config.start_date, bt_config.end_date, bt_config.backtest_interval, bt_config.test_interval
    );
    eprintln!("  initial capital: {:.2}", bt_config.initial_capital);
    match bt_config.selection {
        SelectionMode::Ranked => eprintln!("  selection: ranked"),
        SelectionMode::Random { seed } => eprintln!("  selection: random (seed {seed})"),
    }
    eprintln!("  windows: {}", windows.len());
    if let (Some(first), Some(last)) = (windows.first(), windows.last()) {
        eprintln!(
            "    first: lookback {}..{}, hold {}..{}",
            first.lookback_start, first.lookback_end, first.hold_start, first.hold_end
        );
        eprintln!(
            "    last:  lookback {}..{}, hold {}..{}",
            last.lookback_start, last.lookback_end, last.hold_start, last.hold_end
        );
    }

    eprintln!("\nUniverse:");
    describe_membership(membership);

    eprintln!("\nReports:");
    eprintln!("  equity: {}", options.output.display());
    if let Some(chart) = &options.chart {
        eprintln!("  chart:  {}", chart.display());
    }
    if let Some(ledger) = &options.ledger {
        eprintln!("  ledger: {}", ledger.display());
    }
    if options.random_runs > 0 {
        eprintln!(
            "  random baselines: {} (seeds {}..={})",
            options.random_runs,
            options.baseline_seed.wrapping_add(1),
            options.baseline_seed.wrapping_add(options.random_runs as u64)
        );
    }
    if let Some(ticker) = &options.benchmark {
        eprintln!("  benchmark: {ticker}");
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

/// Random-selection runs over the same inputs, one per baseline seed.
pub fn run_baselines(
    prices: &dyn PriceHistoryPort,
    membership: &Membership,
    bt_config: &BacktestConfig,
    runs: usize,
    base_seed: u64,
) -> Result<Vec<BacktestResult>, ReversionError> {
    (1..=runs as u64)
        .into_par_iter()
        .map(|i| {
            let mut config = bt_config.clone();
            config.selection = SelectionMode::Random {
                seed: base_seed.wrapping_add(i),
            };
            engine::run_strategy(prices, membership, &config)
        })
        .collect()
}

fn load_benchmark(
    prices: &dyn PriceHistoryPort,
    ticker: &str,
    bt_config: &BacktestConfig,
) -> Option<Benchmark> {
    let loaded = prices
        .get_history(ticker, bt_config.start_date, bt_config.end_date)
        .and_then(|series| Benchmark::new(series, bt_config.initial_capital));
    match loaded {
        Ok(b) => Some(b),
        Err(e) => {
            warn!(%ticker, error = %e, "benchmark unavailable");
            eprintln!("warning: benchmark {ticker} unavailable ({e})");
            None
        }
    }
}

fn print_summary(
    metrics: &Metrics,
    report: &BacktestReport,
    initial_capital: f64,
) {
    eprintln!("\n=== Results ===");
    eprintln!("Final Balance:    {:.2}", report.result.final_balance());
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!(
        "Annualized:       {:.2}%",
        metrics.annualized_return * 100.0
    );
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!(
        "Max Drawdown:     -{:.1}% ({} days)",
        metrics.max_drawdown * 100.0,
        metrics.max_drawdown_duration
    );
    eprintln!(
        "Windows:          {} ({} won, {} lost)",
        metrics.windows_run, metrics.windows_won, metrics.windows_lost
    );
    if metrics.windows_run > 0 {
        eprintln!(
            "Best / Worst:     {:+.2}% / {:+.2}%",
            metrics.best_window_return * 100.0,
            metrics.worst_window_return * 100.0
        );
    }
    eprintln!("Sectors Skipped:  {}", metrics.sectors_skipped);

    if let Some(bench) = &report.benchmark {
        if let Some(ret) = bench.total_return() {
            eprintln!("Benchmark {}:    {:.2}%", bench.ticker, ret * 100.0);
        }
    }

    if !report.baselines.is_empty() {
        let strategy_final = report.result.final_balance();
        let returns: Vec<f64> = report
            .baselines
            .iter()
            .map(|b| (b.final_balance() - initial_capital) / initial_capital)
            .collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let beaten = report
            .baselines
            .iter()
            .filter(|b| strategy_final > b.final_balance())
            .count();
        eprintln!("\n=== Random Baselines ===");
        eprintln!("Runs:             {}", returns.len());
        eprintln!("Mean Return:      {:.2}%", mean * 100.0);
        eprintln!("Beaten:           {} of {}", beaten, returns.len());
    }
}

pub fn run_backtest_pipeline(
    prices: &dyn PriceHistoryPort,
    membership: &Membership,
    bt_config: &BacktestConfig,
    options: &PipelineOptions,
) -> ExitCode {
    // Stage 5: Run strategy
    eprintln!(
        "Running backtest: {} to {}, lookback {}, hold {}",
        bt_config.start_date, bt_config.end_date, bt_config.backtest_interval, bt_config.test_interval
    );
    let result = match engine::run_strategy(prices, membership, bt_config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 6: Random baselines
    let baselines = if options.random_runs > 0 {
        eprintln!("Running {} random baselines", options.random_runs);
        match run_baselines(
            prices,
            membership,
            bt_config,
            options.random_runs,
            options.baseline_seed,
        ) {
            Ok(b) => b,
            Err(e) => return fail(&e),
        }
    } else {
        Vec::new()
    };

    // Stage 7: Benchmark overlay
    let benchmark = options
        .benchmark
        .as_deref()
        .and_then(|ticker| load_benchmark(prices, ticker, bt_config));

    let report = BacktestReport {
        result,
        baselines,
        benchmark,
    };

    // Stage 8: Metrics
    let metrics = Metrics::compute(&report.result.portfolio, options.risk_free_rate);
    print_summary(&metrics, &report, bt_config.initial_capital);

    // Stage 9: Reports
    let mut outputs: Vec<(&dyn ReportPort, &Path, &str)> = Vec::new();
    outputs.push((&CsvReportAdapter, options.output.as_path(), "Equity curve"));
    if let Some(chart) = &options.chart {
        outputs.push((&SvgChartAdapter, chart.as_path(), "Chart"));
    }
    if let Some(ledger) = &options.ledger {
        outputs.push((&CsvLedgerAdapter, ledger.as_path(), "Window ledger"));
    }

    for (writer, path, label) in outputs {
        if let Err(e) = writer.write(&report, path) {
            eprintln!("error: failed to write {}: {e}", path.display());
            return (&e).into();
        }
        eprintln!("{label} written to: {}", path.display());
    }

    ExitCode::SUCCESS
}

fn run_analyze(
    config_path: &Path,
    sector_name: &str,
    lookback_start: NaiveDate,
    hold_start: NaiveDate,
    hold_end: NaiveDate,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match analyze_sector(&adapter, sector_name, lookback_start, hold_start, hold_end) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// Ranks one sector over `[lookback_start, hold_start]` and reports the
/// SHORT/LONG returns of the extremes over `[hold_start, hold_end)`.
pub fn analyze_sector(
    adapter: &dyn ConfigPort,
    sector_name: &str,
    lookback_start: NaiveDate,
    hold_start: NaiveDate,
    hold_end: NaiveDate,
) -> Result<Vec<String>, ReversionError> {
    if lookback_start >= hold_start {
        return Err(ReversionError::InvalidDateRange {
            start: lookback_start,
            end: hold_start,
        });
    }
    if hold_start >= hold_end {
        return Err(ReversionError::InvalidDateRange {
            start: hold_start,
            end: hold_end,
        });
    }

    let prices = price_adapter(adapter)?;
    let membership = load_membership(adapter)?;
    let sectors = membership
        .sectors_on(lookback_start)
        .ok_or_else(|| ReversionError::Universe {
            reason: format!("no sector definition in force on {lookback_start}"),
        })?;
    let sector = sectors
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(sector_name.trim()))
        .ok_or_else(|| ReversionError::Universe {
            reason: format!("sector '{sector_name}' not found"),
        })?;

    let ranking = ranker::rank(&prices, &sector.name, &sector.tickers, lookback_start, hold_start)?;

    let mut lines = vec![
        format!("sector: {}", sector.name),
        format!("lookback: {lookback_start} to {hold_start}"),
        format!(
            "best:  {} {:+.2}%",
            ranking.best.ticker, ranking.best.performance
        ),
        format!(
            "worst: {} {:+.2}%",
            ranking.worst.ticker, ranking.worst.performance
        ),
        format!("hold: {hold_start} to {hold_end}"),
    ];

    for (ticker, stance) in [
        (&ranking.best.ticker, Stance::Short),
        (&ranking.worst.ticker, Stance::Long),
    ] {
        let line = match hold_return(&prices, ticker, hold_start, hold_end, stance) {
            Ok(ret) => format!("{stance} {ticker}: {ret:+.2}%"),
            Err(e) => format!("{stance} {ticker}: unavailable ({e})"),
        };
        lines.push(line);
    }
    Ok(lines)
}

fn hold_return(
    prices: &dyn PriceHistoryPort,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    stance: Stance,
) -> Result<f64, ReversionError> {
    let series = prices.get_history(ticker, start, end)?;
    let bars = series.range(start, end);
    if bars.is_empty() {
        return Err(ReversionError::NoData {
            ticker: ticker.to_string(),
        });
    }
    scalar_return(bars, stance)
}

fn run_position(
    config_path: &Path,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    stance: Stance,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match describe_position(&adapter, ticker, start, end, stance) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// Entry at the first open on or after `start`, exit at the last close on
/// or before `end`.
pub fn describe_position(
    adapter: &dyn ConfigPort,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    stance: Stance,
) -> Result<Vec<String>, ReversionError> {
    if end < start {
        return Err(ReversionError::InvalidDateRange { start, end });
    }
    let ticker = ticker.trim().to_uppercase();
    let prices = price_adapter(adapter)?;
    let series = prices.get_history(&ticker, start, end)?;
    let (Some(entry), Some(exit)) = (series.first(), series.last()) else {
        return Err(ReversionError::NoData { ticker });
    };

    let position = Position {
        ticker: ticker.clone(),
        stance,
        capital: 1.0,
        bars: series.bars().to_vec(),
    };
    let ret = position.scalar_return()?;

    let (open_label, close_label) = match stance {
        Stance::Long => ("Buy", "Sell"),
        Stance::Short => ("Short", "Cover"),
    };
    Ok(vec![
        format!("{stance} {ticker}"),
        format!("{open_label} Date: {}", entry.date),
        format!("{open_label} Price: {:.2}", entry.open),
        format!("{close_label} Date: {}", exit.date),
        format!("{close_label} Price: {:.2}", exit.close),
        format!("Return: {ret:+.2}%"),
    ])
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }
    if let Err(e) = build_backtest_config(&adapter) {
        return fail(&e);
    }
    eprintln!("Configuration is valid.");
    ExitCode::SUCCESS
}

/// Sector members, across every definition in a history, with no price data.
/// Sorted and deduplicated.
pub fn missing_tickers(membership: &Membership, available: &[String]) -> Vec<String> {
    let members: BTreeSet<&String> = match membership {
        Membership::Fixed(sectors) => sectors.iter().flat_map(|s| &s.tickers).collect(),
        Membership::History(history) => history
            .definitions()
            .flat_map(|(_, sectors)| sectors)
            .flat_map(|s| &s.tickers)
            .collect(),
    };
    members
        .into_iter()
        .filter(|t| !available.contains(t))
        .cloned()
        .collect()
}

fn run_tickers(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let prices = match price_adapter(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let available = match prices.list_tickers() {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };
    for ticker in &available {
        println!("{ticker}");
    }
    eprintln!("{} tickers with price data", available.len());

    match load_membership(&adapter) {
        Ok(membership) => {
            let missing = missing_tickers(&membership, &available);
            if !missing.is_empty() {
                eprintln!("universe members without data: {}", missing.join(", "));
            }
        }
        Err(e) => eprintln!("warning: cannot check universe coverage ({e})"),
    }
    ExitCode::SUCCESS
}

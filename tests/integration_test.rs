//! Integration tests for the ranking and rolling-window engine.
//!
//! Tests cover:
//! - Sector ranking over a lookback window
//! - Single-sector, single-window zero-growth scenario
//! - Inclusive lookback slicing (the hold-start close counts toward ranking)
//! - Sector skipping, capital re-normalisation and cash-holding windows
//! - Bounded re-ranking when a picked leg has no usable holding data
//! - Point-in-time sector definitions
//! - Determinism of ranked and seeded random runs

mod common;

use approx::assert_relative_eq;
use common::*;
use reversion::domain::backtest::{
    run_backtest, run_strategy, run_with_sector_history, BacktestResult, Membership, SelectionMode,
};
use reversion::domain::error::ReversionError;
use reversion::domain::metrics::Metrics;
use reversion::domain::ranker;
use reversion::domain::sector::{Sector, SectorHistory};
use reversion::domain::timeframe::parse_timeframe;

/// Lookback Jan 1 open to Feb 1 close: A +10%, B -10%, C +1%.
/// February hold: A 110 -> 137.5 (+25%), B 90 -> 108 (+20%), C flat at 101.
fn sample_port() -> MockPriceHistory {
    MockPriceHistory::new()
        .with_bars("A", path_bars("2024-01-01", "2024-02-01", 100.0, 110.0))
        .with_bars("A", path_bars("2024-02-01", "2024-03-01", 110.0, 137.5))
        .with_bars("B", path_bars("2024-01-01", "2024-02-01", 100.0, 90.0))
        .with_bars("B", path_bars("2024-02-01", "2024-03-01", 90.0, 108.0))
        .with_bars("C", path_bars("2024-01-01", "2024-02-01", 100.0, 101.0))
        .with_bars("C", flat_bars("2024-02-01", "2024-03-01", 101.0))
}

fn only_window(result: &BacktestResult) -> &reversion::domain::portfolio::WindowRecord {
    assert_eq!(result.portfolio.windows.len(), 1);
    &result.portfolio.windows[0]
}

mod ranking {
    use super::*;

    #[test]
    fn picks_best_and_worst_over_lookback() {
        let port = MockPriceHistory::new()
            .with_bars("A", vec![make_bar("2024-01-02", 100.0, 105.0)])
            .with_bars("B", vec![make_bar("2024-01-02", 100.0, 97.0)])
            .with_bars("C", vec![make_bar("2024-01-02", 100.0, 101.0)]);
        let tickers: Vec<String> = ["A", "B", "C"].iter().map(|t| t.to_string()).collect();

        let ranking =
            ranker::rank(&port, "S", &tickers, date("2024-01-01"), date("2024-02-01")).unwrap();

        assert_eq!(ranking.best.ticker, "A");
        assert_relative_eq!(ranking.best.performance, 5.0, epsilon = 1e-9);
        assert_eq!(ranking.worst.ticker, "B");
        assert_relative_eq!(ranking.worst.performance, -3.0, epsilon = 1e-9);
    }

    #[test]
    fn failing_and_empty_tickers_are_skipped() {
        let port = MockPriceHistory::new()
            .with_bars("A", vec![make_bar("2024-01-02", 100.0, 105.0)])
            .with_bars("LATE", vec![make_bar("2024-03-01", 100.0, 500.0)])
            .with_error("BROKEN", "provider timeout");
        let tickers: Vec<String> = ["BROKEN", "LATE", "A", "MISSING"]
            .iter()
            .map(|t| t.to_string())
            .collect();

        let ranking =
            ranker::rank(&port, "S", &tickers, date("2024-01-01"), date("2024-02-01")).unwrap();
        assert_eq!(ranking.best.ticker, "A");
        assert_eq!(ranking.worst.ticker, "A");
    }

    #[test]
    fn no_survivors_is_no_eligible_instruments() {
        let port = MockPriceHistory::new().with_error("X", "gone");
        let err = ranker::rank(
            &port,
            "Energy",
            &["X".to_string()],
            date("2024-01-01"),
            date("2024-02-01"),
        )
        .unwrap_err();
        assert!(matches!(err, ReversionError::NoEligibleInstruments { sector } if sector == "Energy"));
    }
}

mod engine {
    use super::*;

    #[test]
    fn zero_growth_window_keeps_balance() {
        let port = sample_port();
        let sectors = vec![sector("S", &["A", "B"])];

        let result = run_backtest(&port, &sectors, &sample_config()).unwrap();
        let record = only_window(&result);

        assert_eq!(record.picks[0].short_ticker, "A");
        assert_eq!(record.picks[0].long_ticker, "B");
        assert_relative_eq!(record.picks[0].short_lookback.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(record.picks[0].long_lookback.unwrap(), -10.0, epsilon = 1e-9);

        let curve = result.equity_curve();
        assert_eq!(curve.len(), 29);
        assert_eq!(curve[0].date, date("2024-02-01"));
        assert_eq!(curve[0].equity, 1000.0);
        assert_relative_eq!(result.final_balance(), 1000.0, epsilon = 1e-9);
        assert_eq!(result.final_balance(), curve.last().unwrap().equity);
    }

    #[test]
    fn hold_start_close_counts_toward_ranking() {
        // D gains 20% through Jan 31, then crashes on Feb 1. The lookback
        // closes on Feb 1, so D ranks worst (-90%) rather than best.
        let mut d_feb = vec![make_bar("2024-02-01", 120.0, 10.0)];
        d_feb.extend(flat_bars("2024-02-02", "2024-03-01", 10.0));
        let port = sample_port()
            .with_bars("D", path_bars("2024-01-01", "2024-02-01", 100.0, 120.0))
            .with_bars("D", d_feb);
        let sectors = vec![sector("S", &["A", "B", "D"])];

        let result = run_backtest(&port, &sectors, &sample_config()).unwrap();
        let pick = &only_window(&result).picks[0];
        assert_eq!(pick.short_ticker, "A");
        assert_eq!(pick.long_ticker, "D");
        assert_relative_eq!(pick.long_lookback.unwrap(), -90.0, epsilon = 1e-9);
    }

    #[test]
    fn ranking_requests_stop_at_hold_start() {
        let port = sample_port();
        let sectors = vec![sector("S", &["A", "B", "C"])];
        run_backtest(&port, &sectors, &sample_config()).unwrap();

        let requests = port.requests();
        assert!(!requests.is_empty());
        for (_, start, end) in requests {
            if start < date("2024-02-01") {
                assert_eq!(end, date("2024-02-01"));
            }
        }
    }

    #[test]
    fn ranked_runs_are_bit_for_bit_repeatable() {
        let port = sample_port();
        let sectors = vec![sector("S", &["A", "B", "C"])];
        let config = sample_config();

        let first = run_backtest(&port, &sectors, &config).unwrap();
        let second = run_backtest(&port, &sectors, &config).unwrap();
        assert_eq!(first.portfolio, second.portfolio);
    }

    #[test]
    fn sector_without_data_is_skipped_and_capital_renormalised() {
        let port = sample_port();
        let sectors = vec![sector("S", &["A", "B"]), sector("Dead", &["X", "Y"])];

        let result = run_backtest(&port, &sectors, &sample_config()).unwrap();
        let record = only_window(&result);

        assert_eq!(record.skipped_sectors, vec!["Dead"]);
        assert_eq!(record.picks.len(), 1);
        assert_eq!(record.picks[0].capital, 1000.0);
        assert_relative_eq!(result.final_balance(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn capital_splits_equally_across_sectors() {
        let port = sample_port()
            .with_bars("E", flat_bars("2024-01-01", "2024-03-01", 100.0));
        let sectors = vec![sector("S1", &["A", "B"]), sector("S2", &["C", "E"])];

        let result = run_backtest(&port, &sectors, &sample_config()).unwrap();
        let record = only_window(&result);

        assert_eq!(record.picks.len(), 2);
        for pick in &record.picks {
            assert_eq!(pick.capital, 500.0);
        }
        assert_eq!(record.picks[1].short_ticker, "C");
        assert_eq!(record.picks[1].long_ticker, "E");
        assert_relative_eq!(record.picks[1].ending_value, 500.0, epsilon = 1e-9);
        assert_relative_eq!(result.final_balance(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn window_with_no_eligible_sector_holds_cash() {
        let port = sample_port();
        let sectors = vec![sector("Dead", &["X"])];

        let result = run_backtest(&port, &sectors, &sample_config()).unwrap();
        let record = only_window(&result);

        assert!(record.picks.is_empty());
        assert_eq!(record.ending_balance, 1000.0);
        assert_eq!(result.final_balance(), 1000.0);

        // 21 weekdays in February 2024, all marked at the cash balance
        let curve = result.equity_curve();
        assert_eq!(curve.len(), 21);
        assert_eq!(curve[0].date, date("2024-02-01"));
        assert_eq!(curve.last().unwrap().date, date("2024-02-29"));
        assert!(curve.iter().all(|p| p.equity == 1000.0));
    }

    #[test]
    fn leg_without_hold_data_is_reranked() {
        // A still ranks best on January data but has no February bars.
        let port = MockPriceHistory::new()
            .with_bars("A", path_bars("2024-01-01", "2024-02-01", 100.0, 110.0))
            .with_bars("B", path_bars("2024-01-01", "2024-03-01", 100.0, 90.0))
            .with_bars("C", path_bars("2024-01-01", "2024-02-01", 100.0, 101.0))
            .with_bars("C", flat_bars("2024-02-01", "2024-03-01", 101.0));
        let sectors = vec![sector("S", &["A", "B", "C"])];

        let result = run_backtest(&port, &sectors, &sample_config()).unwrap();
        let pick = &only_window(&result).picks[0];
        assert_eq!(pick.short_ticker, "C");
        assert_eq!(pick.long_ticker, "B");
    }

    #[test]
    fn zero_open_on_hold_is_excluded() {
        // B ranks worst on its Feb 1 close but cannot be entered at a zero open.
        let mut b_feb = vec![make_bar("2024-02-01", 0.0, 90.0)];
        b_feb.extend(flat_bars("2024-02-02", "2024-03-01", 90.0));
        let port = MockPriceHistory::new()
            .with_bars("A", path_bars("2024-01-01", "2024-02-01", 100.0, 110.0))
            .with_bars("A", flat_bars("2024-02-01", "2024-03-01", 110.0))
            .with_bars("B", path_bars("2024-01-01", "2024-02-01", 100.0, 90.0))
            .with_bars("B", b_feb)
            .with_bars("C", path_bars("2024-01-01", "2024-02-01", 100.0, 101.0))
            .with_bars("C", flat_bars("2024-02-01", "2024-03-01", 101.0));
        let sectors = vec![sector("S", &["A", "B", "C"])];

        let result = run_backtest(&port, &sectors, &sample_config()).unwrap();
        let pick = &only_window(&result).picks[0];
        assert_eq!(pick.short_ticker, "A");
        assert_eq!(pick.long_ticker, "C");
    }

    #[test]
    fn selection_attempts_are_bounded() {
        let port = MockPriceHistory::new()
            .with_bars("A", path_bars("2024-01-01", "2024-02-01", 100.0, 110.0))
            .with_bars("B", path_bars("2024-01-01", "2024-03-01", 100.0, 90.0))
            .with_bars("C", path_bars("2024-01-01", "2024-02-01", 100.0, 101.0))
            .with_bars("C", flat_bars("2024-02-01", "2024-03-01", 101.0));
        let sectors = vec![sector("S", &["A", "B", "C"])];
        let mut config = sample_config();
        config.max_selection_attempts = 1;

        let result = run_backtest(&port, &sectors, &config).unwrap();
        let record = only_window(&result);
        assert!(record.picks.is_empty());
        assert_eq!(record.skipped_sectors, vec!["S"]);
    }

    #[test]
    fn single_ticker_sector_pairs_with_itself() {
        let port = sample_port();
        let sectors = vec![sector("Solo", &["A"])];

        let result = run_backtest(&port, &sectors, &sample_config()).unwrap();
        let pick = &only_window(&result).picks[0];
        assert_eq!(pick.short_ticker, "A");
        assert_eq!(pick.long_ticker, "A");
        // 500 * 110/137.5 + 500 * 137.5/110
        assert_relative_eq!(result.final_balance(), 1025.0, epsilon = 1e-9);
    }

    #[test]
    fn balance_carries_into_next_window() {
        let port = sample_port()
            .with_bars("A", flat_bars("2024-03-01", "2024-04-01", 137.5))
            .with_bars("B", flat_bars("2024-03-01", "2024-04-01", 108.0));
        let sectors = vec![sector("Solo", &["A"]), sector("S", &["A", "B"])];
        let mut config = sample_config();
        config.end_date = date("2024-04-01");

        let result = run_backtest(&port, &sectors, &config).unwrap();
        let windows = &result.portfolio.windows;
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].starting_balance, windows[0].ending_balance);
        assert_eq!(windows[1].window.hold_start, windows[0].window.hold_end);

        let curve = result.equity_curve();
        assert!(curve.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn partial_window_only_when_requested() {
        let port = sample_port();
        let sectors = vec![sector("S", &["A", "B"])];
        let mut config = sample_config();
        config.end_date = date("2024-03-15");

        let truncated = run_backtest(&port, &sectors, &config).unwrap();
        assert_eq!(truncated.portfolio.windows.len(), 1);

        config.include_partial_window = true;
        let full = run_backtest(&port, &sectors, &config).unwrap();
        assert_eq!(full.portfolio.windows.len(), 2);
        assert_eq!(full.portfolio.windows[1].window.hold_end, date("2024-03-15"));
    }

    #[test]
    fn run_level_errors_abort_before_any_window() {
        let port = sample_port();
        let sectors = vec![sector("S", &["A", "B"])];

        let mut config = sample_config();
        config.end_date = config.start_date;
        assert!(matches!(
            run_backtest(&port, &sectors, &config),
            Err(ReversionError::InvalidDateRange { .. })
        ));

        let mut config = sample_config();
        config.initial_capital = -5.0;
        assert!(matches!(
            run_backtest(&port, &sectors, &config),
            Err(ReversionError::ConfigInvalid { .. })
        ));

        assert!(matches!(
            run_backtest(&port, &[], &sample_config()),
            Err(ReversionError::Universe { .. })
        ));
        assert!(port.requests().is_empty());
    }

    #[test]
    fn zero_growth_metrics() {
        let port = sample_port();
        let result = run_backtest(&port, &[sector("S", &["A", "B"])], &sample_config()).unwrap();
        let metrics = Metrics::compute(&result.portfolio, 0.0);

        assert_relative_eq!(metrics.total_return, 0.0, epsilon = 1e-9);
        assert_eq!(metrics.windows_run, 1);
        assert_eq!(metrics.sectors_skipped, 0);
    }
}

mod random_selection {
    use super::*;

    #[test]
    fn seeded_runs_repeat() {
        let port = sample_port();
        let sectors = vec![sector("S", &["A", "B", "C"])];
        let mut config = sample_config();
        config.end_date = date("2024-03-01");
        config.selection = SelectionMode::Random { seed: 1234 };

        let first = run_backtest(&port, &sectors, &config).unwrap();
        let second = run_backtest(&port, &sectors, &config).unwrap();
        assert_eq!(first.portfolio, second.portfolio);

        let pick = &first.portfolio.windows[0].picks[0];
        assert!(pick.short_lookback.is_none());
        assert!(["A", "B", "C"].contains(&pick.short_ticker.as_str()));
        assert!(["A", "B", "C"].contains(&pick.long_ticker.as_str()));
    }

    #[test]
    fn sector_with_no_data_is_skipped_not_looped() {
        let port = MockPriceHistory::new();
        let sectors = vec![sector("Dead", &["X", "Y"])];
        let mut config = sample_config();
        config.selection = SelectionMode::Random { seed: 9 };

        let result = run_backtest(&port, &sectors, &config).unwrap();
        assert_eq!(result.portfolio.windows[0].skipped_sectors, vec!["Dead"]);
        assert!(port.requests().len() <= 2 * config.max_selection_attempts);
    }
}

mod sector_history {
    use super::*;

    fn two_month_config() -> reversion::domain::backtest::BacktestConfig {
        let mut config = sample_config();
        config.end_date = date("2024-04-01");
        config
    }

    fn port() -> MockPriceHistory {
        sample_port()
            .with_bars("A", flat_bars("2024-03-01", "2024-04-01", 137.5))
            .with_bars("B", flat_bars("2024-03-01", "2024-04-01", 108.0))
            .with_bars("C", flat_bars("2024-03-01", "2024-04-01", 101.0))
    }

    #[test]
    fn definition_in_force_at_lookback_start_is_used() {
        let mut history = SectorHistory::new();
        history.insert(date("2023-12-01"), vec![sector("S", &["A", "B"])]);
        history.insert(date("2024-02-01"), vec![sector("S", &["A", "C"])]);

        let result = run_with_sector_history(&port(), &history, &two_month_config()).unwrap();
        let windows = &result.portfolio.windows;

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].picks[0].long_ticker, "B");
        // February: A +25%, C flat
        assert_eq!(windows[1].picks[0].short_ticker, "A");
        assert_eq!(windows[1].picks[0].long_ticker, "C");
    }

    #[test]
    fn windows_before_first_definition_hold_cash() {
        let mut history = SectorHistory::new();
        history.insert(date("2024-01-15"), vec![sector("S", &["A", "B"])]);

        let result = run_with_sector_history(&port(), &history, &two_month_config()).unwrap();
        let windows = &result.portfolio.windows;

        assert!(windows[0].picks.is_empty());
        assert_eq!(windows[0].ending_balance, 1000.0);
        assert_eq!(windows[1].picks.len(), 1);

        let curve = result.equity_curve();
        assert_eq!(curve[0].date, date("2024-02-01"));
        assert_eq!(curve[0].equity, 1000.0);
        assert!(curve.iter().any(|p| p.date == date("2024-03-01")));
        assert!(curve.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn empty_history_is_fatal() {
        let err = run_with_sector_history(&port(), &SectorHistory::new(), &two_month_config())
            .unwrap_err();
        assert!(matches!(err, ReversionError::Universe { .. }));
    }

    #[test]
    fn membership_dispatch_matches_direct_calls() {
        let sectors: Vec<Sector> = vec![sector("S", &["A", "B"])];
        let port = port();
        let config = two_month_config();

        let direct = run_backtest(&port, &sectors, &config).unwrap();
        let via = run_strategy(&port, &Membership::Fixed(sectors), &config).unwrap();
        assert_eq!(direct.portfolio, via.portfolio);
    }

    #[test]
    fn timeframe_tokens_drive_window_count() {
        let mut config = two_month_config();
        config.test_interval = parse_timeframe("14d").unwrap();
        let result = run_backtest(&port(), &[sector("S", &["A", "B"])], &config).unwrap();
        // Feb 1 + 14d steps inside [Feb 1, Apr 1): Feb 1, Feb 15, Feb 29, Mar 14
        assert_eq!(result.portfolio.windows.len(), 4);
    }
}

//! Lookback/holding window planning.
//!
//! Holding windows tile `[start_date, end_date)` back to back. Each one is
//! preceded by a lookback window that ends exactly where holding begins.
//! Ranking reads the lookback as `[lookback_start, lookback_end]`, so the
//! first holding day also closes the lookback; holding reads
//! `[hold_start, hold_end)` so consecutive windows never share a bar.

use chrono::NaiveDate;

use super::error::ReversionError;
use super::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktestWindow {
    pub index: usize,
    pub lookback_start: NaiveDate,
    pub lookback_end: NaiveDate,
    pub hold_start: NaiveDate,
    pub hold_end: NaiveDate,
}

impl BacktestWindow {
    /// True for a trailing window cut short by the end of the run.
    pub fn is_partial(&self, test_interval: &Timeframe) -> bool {
        test_interval
            .add_to(self.hold_start)
            .map(|full_end| self.hold_end < full_end)
            .unwrap_or(true)
    }
}

/// Plans every holding window in `[start, end)`.
///
/// `current` starts at `start` and advances by `test_interval` from the
/// previous boundary, so month-end anchors drift the way repeated calendar
/// addition does. Only windows that fit entirely before `end` are produced
/// unless `include_partial` is set, in which case a shortened final window
/// `[current, end)` covers the remainder.
pub fn plan_windows(
    start: NaiveDate,
    end: NaiveDate,
    backtest_interval: &Timeframe,
    test_interval: &Timeframe,
    include_partial: bool,
) -> Result<Vec<BacktestWindow>, ReversionError> {
    if end <= start {
        return Err(ReversionError::InvalidDateRange { start, end });
    }

    let mut windows = Vec::new();
    let mut current = start;

    while current < end {
        let full_end = test_interval.add_to(current)?;
        let hold_end = if full_end <= end {
            full_end
        } else if include_partial {
            end
        } else {
            break;
        };

        windows.push(BacktestWindow {
            index: windows.len(),
            lookback_start: backtest_interval.sub_from(current)?,
            lookback_end: current,
            hold_start: current,
            hold_end,
        });
        current = hold_end;
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timeframe::parse_timeframe;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tf(s: &str) -> Timeframe {
        parse_timeframe(s).unwrap()
    }

    #[test]
    fn windows_tile_without_gaps() {
        let windows =
            plan_windows(d(2020, 1, 1), d(2021, 1, 1), &tf("3m"), &tf("1m"), false).unwrap();
        assert_eq!(windows.len(), 12);

        assert_eq!(windows[0].hold_start, d(2020, 1, 1));
        assert_eq!(windows[0].lookback_start, d(2019, 10, 1));
        assert_eq!(windows[0].lookback_end, windows[0].hold_start);

        for pair in windows.windows(2) {
            assert_eq!(pair[0].hold_end, pair[1].hold_start);
            assert_eq!(pair[0].index + 1, pair[1].index);
        }
        assert_eq!(windows.last().unwrap().hold_end, d(2021, 1, 1));
    }

    #[test]
    fn trailing_partial_window_dropped_by_default() {
        let windows =
            plan_windows(d(2020, 1, 1), d(2020, 3, 15), &tf("1m"), &tf("1m"), false).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].hold_end, d(2020, 3, 1));
    }

    #[test]
    fn trailing_partial_window_included_on_request() {
        let windows =
            plan_windows(d(2020, 1, 1), d(2020, 3, 15), &tf("1m"), &tf("1m"), true).unwrap();
        assert_eq!(windows.len(), 3);
        let last = windows[2];
        assert_eq!(last.hold_start, d(2020, 3, 1));
        assert_eq!(last.hold_end, d(2020, 3, 15));
        assert!(last.is_partial(&tf("1m")));
        assert!(!windows[0].is_partial(&tf("1m")));
    }

    #[test]
    fn range_shorter_than_one_window() {
        let windows =
            plan_windows(d(2020, 1, 1), d(2020, 1, 20), &tf("1m"), &tf("1m"), false).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn month_end_start_drifts() {
        let windows =
            plan_windows(d(2023, 1, 31), d(2023, 5, 1), &tf("1m"), &tf("1m"), false).unwrap();
        let starts: Vec<NaiveDate> = windows.iter().map(|w| w.hold_start).collect();
        assert_eq!(starts, vec![d(2023, 1, 31), d(2023, 2, 28), d(2023, 3, 28)]);
    }

    #[test]
    fn invalid_range_rejected() {
        let err = plan_windows(d(2020, 1, 1), d(2020, 1, 1), &tf("1m"), &tf("1m"), false)
            .unwrap_err();
        assert!(matches!(err, ReversionError::InvalidDateRange { .. }));
    }
}

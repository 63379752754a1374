//! Position returns and daily mark-to-market value paths.
//!
//! Value paths are not compounded: every day is marked against the entry
//! open of day 0, as if the position were sized once and never rebalanced.

use chrono::NaiveDate;

use super::error::ReversionError;
use super::ohlcv::PriceBar;
use super::portfolio::EquityPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stance {
    Long,
    Short,
}

impl std::fmt::Display for Stance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stance::Long => write!(f, "LONG"),
            Stance::Short => write!(f, "SHORT"),
        }
    }
}

/// Percentage return from the first bar's open to the last bar's close.
///
/// LONG: (close - open) / open * 100. SHORT: (open - close) / open * 100.
pub fn scalar_return(bars: &[PriceBar], stance: Stance) -> Result<f64, ReversionError> {
    let (first, last) = match (bars.first(), bars.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => {
            return Err(ReversionError::Numeric {
                reason: "cannot compute a return over an empty series".into(),
            });
        }
    };
    let open = checked_price(first.open, first.date, "open")?;
    let close = last.close;

    let pct = match stance {
        Stance::Long => (close - open) / open * 100.0,
        Stance::Short => (open - close) / open * 100.0,
    };
    finite(pct, last.date)
}

/// Daily value of `capital` committed at the first bar's open.
///
/// Day 0 is exactly `capital`. Day i > 0 is `capital * close[i] / open[0]`
/// for LONG and `capital * open[0] / close[i]` for SHORT.
pub fn daily_value_path(
    capital: f64,
    bars: &[PriceBar],
    stance: Stance,
) -> Result<PositionValuePath, ReversionError> {
    let first = bars.first().ok_or_else(|| ReversionError::Numeric {
        reason: "cannot build a value path over an empty series".into(),
    })?;
    let entry = checked_price(first.open, first.date, "open")?;

    let mut points = Vec::with_capacity(bars.len());
    points.push(EquityPoint {
        date: first.date,
        equity: capital,
    });

    for bar in &bars[1..] {
        let close = checked_price(bar.close, bar.date, "close")?;
        let equity = match stance {
            Stance::Long => capital * (close / entry),
            Stance::Short => capital * (entry / close),
        };
        points.push(EquityPoint {
            date: bar.date,
            equity: finite(equity, bar.date)?,
        });
    }

    Ok(PositionValuePath { points })
}

fn checked_price(price: f64, date: NaiveDate, field: &str) -> Result<f64, ReversionError> {
    if price > 0.0 && price.is_finite() {
        Ok(price)
    } else {
        Err(ReversionError::Numeric {
            reason: format!("non-positive {field} price {price} on {date}"),
        })
    }
}

fn finite(value: f64, date: NaiveDate) -> Result<f64, ReversionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ReversionError::Numeric {
            reason: format!("non-finite value on {date}"),
        })
    }
}

/// One leg held over a holding window.
#[derive(Debug, Clone)]
pub struct Position {
    pub ticker: String,
    pub stance: Stance,
    pub capital: f64,
    pub bars: Vec<PriceBar>,
}

impl Position {
    pub fn value_path(&self) -> Result<PositionValuePath, ReversionError> {
        daily_value_path(self.capital, &self.bars, self.stance)
    }

    pub fn scalar_return(&self) -> Result<f64, ReversionError> {
        scalar_return(&self.bars, self.stance)
    }
}

/// Date-indexed dollar values, one per trading day, ascending.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionValuePath {
    pub points: Vec<EquityPoint>,
}

impl PositionValuePath {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first_value(&self) -> Option<f64> {
        self.points.first().map(|p| p.equity)
    }

    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.equity)
    }

    /// Value carried on `date`: the entry value before the path starts, the
    /// most recent mark otherwise.
    pub fn value_as_of(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.points.partition_point(|p| p.date <= date);
        match idx {
            0 => self.first_value(),
            i => Some(self.points[i - 1].equity),
        }
    }

    /// Sums paths date by date over the union of their dates. A path with no
    /// mark on a date contributes its carried value, so legs trading on
    /// different calendars still add up to the capital they were funded with.
    pub fn sum_aligned(paths: &[PositionValuePath]) -> PositionValuePath {
        let mut dates: Vec<NaiveDate> = paths
            .iter()
            .flat_map(|p| p.points.iter().map(|pt| pt.date))
            .collect();
        dates.sort_unstable();
        dates.dedup();

        let points = dates
            .into_iter()
            .map(|date| EquityPoint {
                date,
                equity: paths.iter().filter_map(|p| p.value_as_of(date)).sum(),
            })
            .collect();

        PositionValuePath { points }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bar(day: u32, open: f64, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 10_000.0,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn scalar_return_long_and_short() {
        let bars = vec![bar(1, 100.0, 104.0), bar(4, 104.0, 110.0)];
        assert_relative_eq!(scalar_return(&bars, Stance::Long).unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(scalar_return(&bars, Stance::Short).unwrap(), -10.0, epsilon = 1e-9);
    }

    #[test]
    fn scalar_return_single_bar_uses_same_day() {
        let bars = vec![bar(1, 50.0, 45.0)];
        assert_relative_eq!(scalar_return(&bars, Stance::Long).unwrap(), -10.0, epsilon = 1e-9);
    }

    #[test]
    fn scalar_return_empty_fails() {
        assert!(matches!(
            scalar_return(&[], Stance::Long),
            Err(ReversionError::Numeric { .. })
        ));
    }

    #[test]
    fn scalar_return_zero_open_fails() {
        let bars = vec![bar(1, 0.0, 10.0)];
        assert!(scalar_return(&bars, Stance::Long).is_err());
    }

    #[test]
    fn value_path_two_day_long_and_short() {
        let bars = vec![bar(1, 100.0, 100.0), bar(4, 105.0, 110.0)];

        let long = daily_value_path(1000.0, &bars, Stance::Long).unwrap();
        assert_eq!(long.len(), 2);
        assert_eq!(long.points[0].equity, 1000.0);
        assert_relative_eq!(long.points[1].equity, 1100.0, epsilon = 1e-9);

        let short = daily_value_path(1000.0, &bars, Stance::Short).unwrap();
        assert_eq!(short.points[0].equity, 1000.0);
        assert_relative_eq!(short.points[1].equity, 1000.0 * 100.0 / 110.0, epsilon = 1e-9);
    }

    #[test]
    fn value_path_does_not_compound() {
        let bars = vec![
            bar(1, 100.0, 100.0),
            bar(4, 100.0, 120.0),
            bar(5, 120.0, 90.0),
        ];
        let path = daily_value_path(500.0, &bars, Stance::Long).unwrap();
        assert_relative_eq!(path.points[1].equity, 600.0, epsilon = 1e-9);
        // 500 * 90/100, not 600 * 90/120
        assert_relative_eq!(path.points[2].equity, 450.0, epsilon = 1e-9);
    }

    #[test]
    fn value_path_short_zero_close_fails() {
        let bars = vec![bar(1, 100.0, 100.0), bar(4, 100.0, 0.0)];
        assert!(matches!(
            daily_value_path(1000.0, &bars, Stance::Short),
            Err(ReversionError::Numeric { .. })
        ));
    }

    #[test]
    fn value_path_zero_entry_fails() {
        let bars = vec![bar(1, 0.0, 100.0), bar(4, 100.0, 100.0)];
        assert!(daily_value_path(1000.0, &bars, Stance::Long).is_err());
    }

    #[test]
    fn position_delegates_to_calculator() {
        let pos = Position {
            ticker: "XOM".into(),
            stance: Stance::Short,
            capital: 250.0,
            bars: vec![bar(1, 100.0, 100.0), bar(4, 100.0, 125.0)],
        };
        let path = pos.value_path().unwrap();
        assert_relative_eq!(path.last_value().unwrap(), 200.0, epsilon = 1e-9);
        assert_relative_eq!(pos.scalar_return().unwrap(), -25.0, epsilon = 1e-9);
    }

    #[test]
    fn value_as_of_carries_entry_and_last_mark() {
        let path = daily_value_path(
            100.0,
            &[bar(4, 10.0, 10.0), bar(6, 10.0, 12.0)],
            Stance::Long,
        )
        .unwrap();
        assert_eq!(path.value_as_of(date(1)), Some(100.0));
        assert_eq!(path.value_as_of(date(5)), Some(100.0));
        assert_relative_eq!(path.value_as_of(date(9)).unwrap(), 120.0, epsilon = 1e-9);
        assert_eq!(PositionValuePath::default().value_as_of(date(1)), None);
    }

    #[test]
    fn sum_aligned_adds_by_date() {
        let a = daily_value_path(
            500.0,
            &[bar(1, 100.0, 100.0), bar(4, 100.0, 80.0)],
            Stance::Short,
        )
        .unwrap();
        let b = daily_value_path(
            500.0,
            &[bar(1, 100.0, 100.0), bar(4, 100.0, 120.0)],
            Stance::Long,
        )
        .unwrap();

        let total = PositionValuePath::sum_aligned(&[a, b]);
        assert_eq!(total.len(), 2);
        assert_eq!(total.points[0].equity, 1000.0);
        assert_relative_eq!(total.points[1].equity, 625.0 + 600.0, epsilon = 1e-9);
    }

    #[test]
    fn sum_aligned_fills_missing_days() {
        let a = daily_value_path(
            100.0,
            &[bar(1, 10.0, 10.0), bar(4, 10.0, 11.0), bar(5, 10.0, 12.0)],
            Stance::Long,
        )
        .unwrap();
        // b does not trade on the 4th
        let b = daily_value_path(
            100.0,
            &[bar(1, 20.0, 20.0), bar(5, 20.0, 10.0)],
            Stance::Long,
        )
        .unwrap();

        let total = PositionValuePath::sum_aligned(&[a, b]);
        let values: Vec<f64> = total.points.iter().map(|p| p.equity).collect();
        assert_eq!(total.len(), 3);
        assert_relative_eq!(values[0], 200.0, epsilon = 1e-9);
        assert_relative_eq!(values[1], 110.0 + 100.0, epsilon = 1e-9);
        assert_relative_eq!(values[2], 120.0 + 50.0, epsilon = 1e-9);
    }

    #[test]
    fn sum_aligned_of_nothing_is_empty() {
        assert!(PositionValuePath::sum_aligned(&[]).is_empty());
    }

    mod properties {
        use super::*;
        use chrono::Days;
        use proptest::prelude::*;

        fn bars_from(prices: &[(f64, f64)]) -> Vec<PriceBar> {
            prices
                .iter()
                .enumerate()
                .map(|(i, &(open, close))| PriceBar {
                    date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Days::new(i as u64),
                    open,
                    high: open.max(close),
                    low: open.min(close),
                    close,
                    volume: 0.0,
                })
                .collect()
        }

        proptest! {
            #[test]
            fn first_value_is_capital(
                capital in 1.0f64..1e7,
                prices in prop::collection::vec((1.0f64..1000.0, 1.0f64..1000.0), 1..40),
            ) {
                let bars = bars_from(&prices);
                for stance in [Stance::Long, Stance::Short] {
                    let path = daily_value_path(capital, &bars, stance).unwrap();
                    prop_assert_eq!(path.len(), bars.len());
                    prop_assert_eq!(path.first_value(), Some(capital));
                }
            }

            #[test]
            fn long_and_short_returns_are_negatives(
                prices in prop::collection::vec((1.0f64..1000.0, 1.0f64..1000.0), 1..40),
            ) {
                let bars = bars_from(&prices);
                let long = scalar_return(&bars, Stance::Long).unwrap();
                let short = scalar_return(&bars, Stance::Short).unwrap();
                prop_assert!((long + short).abs() < 1e-9);
            }
        }
    }
}

//! Benchmark overlay normalised to the portfolio's starting capital.

use chrono::NaiveDate;

use super::error::ReversionError;
use super::ohlcv::PriceSeries;
use super::portfolio::EquityPoint;

#[derive(Debug, Clone, PartialEq)]
pub struct Benchmark {
    pub ticker: String,
    series: PriceSeries,
    scale: f64,
}

impl Benchmark {
    /// Scales closes so the first bar is worth `capital`.
    pub fn new(series: PriceSeries, capital: f64) -> Result<Self, ReversionError> {
        let first = series.first().ok_or_else(|| ReversionError::NoData {
            ticker: series.ticker.clone(),
        })?;
        if !(first.close > 0.0 && first.close.is_finite()) {
            return Err(ReversionError::Numeric {
                reason: format!(
                    "benchmark {} has non-positive first close {}",
                    series.ticker, first.close
                ),
            });
        }
        Ok(Self {
            ticker: series.ticker.clone(),
            scale: capital / first.close,
            series,
        })
    }

    /// Normalised value on `date`, using the last close on or before it.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.series.as_of(date).map(|bar| bar.close * self.scale)
    }

    pub fn points(&self) -> Vec<EquityPoint> {
        self.series
            .bars()
            .iter()
            .map(|bar| EquityPoint {
                date: bar.date,
                equity: bar.close * self.scale,
            })
            .collect()
    }

    pub fn total_return(&self) -> Option<f64> {
        let first = self.series.first()?;
        let last = self.series.last()?;
        Some(last.close / first.close - 1.0)
    }
}

/// Value of a curve on `date`: the latest point on or before it.
pub fn equity_as_of(curve: &[EquityPoint], date: NaiveDate) -> Option<f64> {
    let idx = curve.partition_point(|p| p.date <= date);
    idx.checked_sub(1).map(|i| curve[i].equity)
}

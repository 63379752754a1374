//! Daily price bars and per-ticker price series.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered daily bars for one ticker. Dates are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Sorts by date and keeps the last bar for any duplicated date.
    pub fn new(ticker: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            ticker: ticker.into(),
            bars: deduped,
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Bars with `start <= date < end`.
    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> &[PriceBar] {
        if end <= start {
            return &[];
        }
        let lo = self.bars.partition_point(|b| b.date < start);
        let hi = self.bars.partition_point(|b| b.date < end);
        &self.bars[lo..hi]
    }

    /// Bars dated within `[start, end]`, both ends included.
    pub fn range_inclusive(&self, start: NaiveDate, end: NaiveDate) -> &[PriceBar] {
        if end < start {
            return &[];
        }
        let lo = self.bars.partition_point(|b| b.date < start);
        let hi = self.bars.partition_point(|b| b.date <= end);
        &self.bars[lo..hi]
    }

    /// Exact bar for `date`, or the most recent bar before it when `date` is
    /// not a trading day. `None` if the series starts after `date`.
    pub fn as_of(&self, date: NaiveDate) -> Option<&PriceBar> {
        let idx = self.bars.partition_point(|b| b.date <= date);
        idx.checked_sub(1).map(|i| &self.bars[i])
    }
}

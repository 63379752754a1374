//! Price history access port.

use crate::domain::error::ReversionError;
use crate::domain::ohlcv::PriceSeries;
use chrono::NaiveDate;

/// Daily price history for a ticker, filtered to `start <= date <= end`.
///
/// Implementations must be shareable across the per-sector worker threads.
pub trait PriceHistoryPort: Sync {
    fn get_history(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, ReversionError>;

    fn list_tickers(&self) -> Result<Vec<String>, ReversionError>;
}

//! CSV price directory adapter.
//!
//! One file per ticker, `<dir>/<TICKER>.csv`, with a header row naming at
//! least `Date,Open,Close`. `High`, `Low` and `Volume` are read when present.

use crate::domain::error::ReversionError;
use crate::domain::ohlcv::{PriceBar, PriceSeries};
use crate::ports::data_port::PriceHistoryPort;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::debug;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
    cache: RwLock<HashMap<String, PriceSeries>>,
}

struct Columns {
    date: usize,
    open: usize,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord, path: &str) -> Result<Self, ReversionError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| ReversionError::Data {
                reason: format!("{path}: missing {name} column"),
            })
        };
        Ok(Columns {
            date: require("date")?,
            open: require("open")?,
            high: find("high"),
            low: find("low"),
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    fn load(&self, ticker: &str) -> Result<PriceSeries, ReversionError> {
        if let Some(series) = self.cache.read().ok().and_then(|c| c.get(ticker).cloned()) {
            return Ok(series);
        }

        let series = self.read_file(ticker)?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(ticker.to_string(), series.clone());
        }
        Ok(series)
    }

    fn read_file(&self, ticker: &str) -> Result<PriceSeries, ReversionError> {
        let path = self.csv_path(ticker);
        let source = path.display().to_string();
        let content = fs::read_to_string(&path).map_err(|e| {
            debug!(%ticker, path = %source, error = %e, "price file unavailable");
            ReversionError::NoData {
                ticker: ticker.to_string(),
            }
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| ReversionError::Data {
            reason: format!("{source}: CSV header error: {e}"),
        })?;
        let cols = Columns::from_headers(headers, &source)?;

        let mut bars = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| ReversionError::Data {
                reason: format!("{source}: CSV parse error: {e}"),
            })?;

            let date_str = record.get(cols.date).unwrap_or("").trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                ReversionError::Data {
                    reason: format!("{source}: invalid date '{date_str}': {e}"),
                }
            })?;

            // Rows with blank prices are gaps in the provider's history.
            let (Some(open), Some(close)) = (
                parse_field(&record, Some(cols.open), "open", &source)?,
                parse_field(&record, Some(cols.close), "close", &source)?,
            ) else {
                debug!(%ticker, row = line + 1, %date, "skipping row with missing prices");
                continue;
            };

            bars.push(PriceBar {
                date,
                open,
                high: parse_field(&record, cols.high, "high", &source)?.unwrap_or(open.max(close)),
                low: parse_field(&record, cols.low, "low", &source)?.unwrap_or(open.min(close)),
                close,
                volume: parse_field(&record, cols.volume, "volume", &source)?.unwrap_or(0.0),
            });
        }

        Ok(PriceSeries::new(ticker, bars))
    }
}

/// `Ok(None)` for an absent column or blank cell, `Err` for a malformed one.
fn parse_field(
    record: &csv::StringRecord,
    column: Option<usize>,
    name: &str,
    path: &str,
) -> Result<Option<f64>, ReversionError> {
    let Some(raw) = column.and_then(|c| record.get(c)).map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|e| ReversionError::Data {
            reason: format!("{path}: invalid {name} value '{raw}': {e}"),
        })
}

impl PriceHistoryPort for CsvPriceAdapter {
    fn get_history(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, ReversionError> {
        let series = self.load(ticker)?;
        let bars = series
            .bars()
            .iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect();
        Ok(PriceSeries::new(ticker, bars))
    }

    fn list_tickers(&self) -> Result<Vec<String>, ReversionError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ReversionError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ReversionError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(ticker) = name_str.strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }
}

//! CSV exports: the daily equity curve and the per-window ledger.

use crate::domain::backtest::BacktestReport;
use crate::domain::benchmark::equity_as_of;
use crate::domain::error::ReversionError;
use crate::ports::report_port::ReportPort;
use std::path::Path;

fn csv_error(e: csv::Error) -> ReversionError {
    ReversionError::Io(std::io::Error::other(e))
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

/// `date,portfolio[,benchmark][,random_1..N]`, one row per portfolio date.
/// Overlay columns carry the latest value on or before the row's date and
/// are blank before their first point.
pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), ReversionError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(csv_error)?;

        let mut header = vec!["date".to_string(), "portfolio".to_string()];
        if let Some(bench) = &report.benchmark {
            header.push(format!("benchmark_{}", bench.ticker));
        }
        for i in 1..=report.baselines.len() {
            header.push(format!("random_{i}"));
        }
        wtr.write_record(&header).map_err(csv_error)?;

        for point in report.result.equity_curve() {
            let mut row = vec![point.date.to_string(), format!("{:.4}", point.equity)];
            if let Some(bench) = &report.benchmark {
                row.push(cell(bench.value_on(point.date)));
            }
            for baseline in &report.baselines {
                row.push(cell(equity_as_of(baseline.equity_curve(), point.date)));
            }
            wtr.write_record(&row).map_err(csv_error)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

/// One row per sector pair opened, plus one row per skipped sector.
pub struct CsvLedgerAdapter;

impl ReportPort for CsvLedgerAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), ReversionError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(csv_error)?;
        wtr.write_record([
            "window",
            "lookback_start",
            "hold_start",
            "hold_end",
            "sector",
            "short",
            "long",
            "short_lookback_pct",
            "long_lookback_pct",
            "capital",
            "ending_value",
        ])
        .map_err(csv_error)?;

        for record in &report.result.portfolio.windows {
            let w = &record.window;
            let dates = [
                w.index.to_string(),
                w.lookback_start.to_string(),
                w.hold_start.to_string(),
                w.hold_end.to_string(),
            ];
            for pick in &record.picks {
                let mut row = dates.to_vec();
                row.extend([
                    pick.sector.clone(),
                    pick.short_ticker.clone(),
                    pick.long_ticker.clone(),
                    cell(pick.short_lookback),
                    cell(pick.long_lookback),
                    format!("{:.4}", pick.capital),
                    format!("{:.4}", pick.ending_value),
                ]);
                wtr.write_record(&row).map_err(csv_error)?;
            }
            for sector in &record.skipped_sectors {
                let mut row = dates.to_vec();
                row.push(sector.clone());
                row.extend(std::iter::repeat_n(String::new(), 6));
                wtr.write_record(&row).map_err(csv_error)?;
            }
        }

        wtr.flush()?;
        Ok(())
    }
}

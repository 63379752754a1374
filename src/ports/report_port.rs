//! Report generation port.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::ReversionError;
use std::path::Path;

/// Port for exporting a finished backtest.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), ReversionError>;
}

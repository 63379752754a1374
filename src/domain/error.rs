//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for reversion.
#[derive(Debug, thiserror::Error)]
pub enum ReversionError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid timeframe '{token}': {reason}")]
    InvalidTimeframe { token: String, reason: String },

    #[error("invalid date range: end {end} must be after start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("universe unavailable: {reason}")]
    Universe { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("no eligible instruments in sector {sector}")]
    NoEligibleInstruments { sector: String },

    #[error("numeric error: {reason}")]
    Numeric { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReversionError {
    /// Ticker-level failures exclude the ticker for the current window; they
    /// never abort a run on their own.
    pub fn is_ticker_level(&self) -> bool {
        matches!(
            self,
            ReversionError::Data { .. } | ReversionError::NoData { .. } | ReversionError::Numeric { .. }
        )
    }
}

impl From<&ReversionError> for std::process::ExitCode {
    fn from(err: &ReversionError) -> Self {
        let code: u8 = match err {
            ReversionError::Io(_) => 1,
            ReversionError::ConfigParse { .. }
            | ReversionError::ConfigMissing { .. }
            | ReversionError::ConfigInvalid { .. }
            | ReversionError::InvalidTimeframe { .. }
            | ReversionError::InvalidDateRange { .. } => 2,
            ReversionError::Universe { .. } => 3,
            ReversionError::Data { .. }
            | ReversionError::NoData { .. }
            | ReversionError::NoEligibleInstruments { .. } => 4,
            ReversionError::Numeric { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

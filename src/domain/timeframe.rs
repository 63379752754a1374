//! Compact duration tokens such as `1d`, `3m` or `2y`.
//!
//! Month and year arithmetic is calendar-aware: adding one month to Jan 31
//! lands on the last day of February rather than overflowing into March.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};

use crate::domain::error::ReversionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Days,
    Months,
    Years,
}

impl TimeUnit {
    fn suffix(self) -> char {
        match self {
            TimeUnit::Days => 'd',
            TimeUnit::Months => 'm',
            TimeUnit::Years => 'y',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeframe {
    pub amount: u32,
    pub unit: TimeUnit,
}

impl Timeframe {
    pub fn new(amount: u32, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    /// `date + self`, or an error if the result leaves chrono's date range.
    pub fn add_to(&self, date: NaiveDate) -> Result<NaiveDate, ReversionError> {
        let shifted = match self.unit {
            TimeUnit::Days => date.checked_add_days(Days::new(u64::from(self.amount))),
            TimeUnit::Months => date.checked_add_months(Months::new(self.amount)),
            TimeUnit::Years => self
                .amount
                .checked_mul(12)
                .and_then(|m| date.checked_add_months(Months::new(m))),
        };
        shifted.ok_or_else(|| self.out_of_range(date))
    }

    /// `date - self`, or an error if the result leaves chrono's date range.
    pub fn sub_from(&self, date: NaiveDate) -> Result<NaiveDate, ReversionError> {
        let shifted = match self.unit {
            TimeUnit::Days => date.checked_sub_days(Days::new(u64::from(self.amount))),
            TimeUnit::Months => date.checked_sub_months(Months::new(self.amount)),
            TimeUnit::Years => self
                .amount
                .checked_mul(12)
                .and_then(|m| date.checked_sub_months(Months::new(m))),
        };
        shifted.ok_or_else(|| self.out_of_range(date))
    }

    fn out_of_range(&self, date: NaiveDate) -> ReversionError {
        ReversionError::InvalidTimeframe {
            token: self.to_string(),
            reason: format!("shifting {date} leaves the supported date range"),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for Timeframe {
    type Err = ReversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_timeframe(s)
    }
}

/// Parses `<positive integer><d|m|y>`. Anything else, including an unknown
/// unit letter, is rejected.
pub fn parse_timeframe(token: &str) -> Result<Timeframe, ReversionError> {
    let invalid = |reason: String| ReversionError::InvalidTimeframe {
        token: token.to_string(),
        reason,
    };

    let trimmed = token.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| invalid("missing unit (expected d, m or y)".into()))?;
    let (digits, unit) = trimmed.split_at(split);

    if digits.is_empty() {
        return Err(invalid("missing amount".into()));
    }
    let amount: u32 = digits
        .parse()
        .map_err(|e| invalid(format!("bad amount: {e}")))?;
    if amount == 0 {
        return Err(invalid("amount must be positive".into()));
    }

    let unit = match unit {
        "d" => TimeUnit::Days,
        "m" => TimeUnit::Months,
        "y" => TimeUnit::Years,
        other => return Err(invalid(format!("unknown unit '{other}'"))),
    };

    Ok(Timeframe { amount, unit })
}

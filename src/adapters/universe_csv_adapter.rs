//! CSV sector-membership adapters.
//!
//! The universe file lists `sector,ticker` rows. The sector-history file adds
//! a leading `effective_date` column; all rows sharing a date form one
//! complete definition.

use crate::domain::error::ReversionError;
use crate::domain::sector::{group_by_sector, Sector, SectorHistory};
use crate::ports::universe_port::{SectorHistoryPort, UniversePort};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvUniverseAdapter {
    path: PathBuf,
}

impl CsvUniverseAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

pub struct CsvSectorHistoryAdapter {
    path: PathBuf,
}

impl CsvSectorHistoryAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn read_records(
    path: &PathBuf,
    columns: &[&str],
) -> Result<Vec<Vec<String>>, ReversionError> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| ReversionError::Universe {
        reason: format!("failed to read {display}: {e}"),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr.headers().map_err(|e| ReversionError::Universe {
        reason: format!("{display}: CSV header error: {e}"),
    })?;
    let indices = columns
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| ReversionError::Universe {
                    reason: format!("{display}: missing {name} column"),
                })
        })
        .collect::<Result<Vec<usize>, _>>()?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| ReversionError::Universe {
            reason: format!("{display}: CSV parse error: {e}"),
        })?;
        rows.push(
            indices
                .iter()
                .map(|&i| record.get(i).unwrap_or("").trim().to_string())
                .collect(),
        );
    }
    Ok(rows)
}

impl UniversePort for CsvUniverseAdapter {
    fn get_universe(&self) -> Result<Vec<Sector>, ReversionError> {
        let rows = read_records(&self.path, &["sector", "ticker"])?;
        let sectors: Vec<Sector> = group_by_sector(
            rows.into_iter()
                .map(|mut row| (std::mem::take(&mut row[0]), std::mem::take(&mut row[1]))),
        )
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

        if sectors.is_empty() {
            return Err(ReversionError::Universe {
                reason: format!("{} defines no sectors", self.path.display()),
            });
        }
        Ok(sectors)
    }
}

impl SectorHistoryPort for CsvSectorHistoryAdapter {
    fn get_sector_history(&self) -> Result<SectorHistory, ReversionError> {
        let rows = read_records(&self.path, &["effective_date", "sector", "ticker"])?;
        let mut parsed = Vec::with_capacity(rows.len());
        for mut row in rows {
            let date = NaiveDate::parse_from_str(&row[0], "%Y-%m-%d").map_err(|e| {
                ReversionError::Universe {
                    reason: format!("invalid effective_date '{}': {e}", row[0]),
                }
            })?;
            parsed.push((date, std::mem::take(&mut row[1]), std::mem::take(&mut row[2])));
        }

        let history = SectorHistory::from_rows(parsed);
        if history.is_empty() {
            return Err(ReversionError::Universe {
                reason: format!("{} defines no sector snapshots", self.path.display()),
            });
        }
        Ok(history)
    }
}

//! Sector membership, fixed for a run or dated for point-in-time lookups.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    pub name: String,
    pub tickers: Vec<String>,
}

impl Sector {
    /// Normalises tickers to upper case and drops blanks and repeats, keeping
    /// first-appearance order (ranking ties go to the earlier ticker).
    pub fn new(name: impl Into<String>, tickers: impl IntoIterator<Item = String>) -> Self {
        let mut seen = HashSet::new();
        let tickers = tickers
            .into_iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.clone()))
            .collect();
        Self {
            name: name.into(),
            tickers,
        }
    }

    pub fn count(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

/// Groups `(sector, ticker)` pairs into sectors in order of first appearance.
pub fn group_by_sector<I>(rows: I) -> Vec<Sector>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut order: Vec<String> = Vec::new();
    let mut members: HashMap<String, Vec<String>> = HashMap::new();

    for (sector, ticker) in rows {
        let sector = sector.trim().to_string();
        if sector.is_empty() {
            continue;
        }
        members
            .entry(sector.clone())
            .or_insert_with(|| {
                order.push(sector);
                Vec::new()
            })
            .push(ticker);
    }

    order
        .into_iter()
        .map(|name| {
            let tickers = members.remove(&name).unwrap_or_default();
            Sector::new(name, tickers)
        })
        .collect()
}

/// Sector definitions keyed by the date they take effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorHistory {
    snapshots: BTreeMap<NaiveDate, Vec<Sector>>,
}

impl SectorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, effective: NaiveDate, sectors: Vec<Sector>) {
        self.snapshots.insert(effective, sectors);
    }

    /// Builds snapshots from `(effective_date, sector, ticker)` rows.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, String, String)>,
    {
        let mut by_date: BTreeMap<NaiveDate, Vec<(String, String)>> = BTreeMap::new();
        for (date, sector, ticker) in rows {
            by_date.entry(date).or_default().push((sector, ticker));
        }
        Self {
            snapshots: by_date
                .into_iter()
                .map(|(date, rows)| (date, group_by_sector(rows)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Every snapshot in effective-date order.
    pub fn definitions(&self) -> impl Iterator<Item = (NaiveDate, &[Sector])> {
        self.snapshots
            .iter()
            .map(|(effective, sectors)| (*effective, sectors.as_slice()))
    }

    /// The most recent definition effective on or before `date`.
    pub fn as_of(&self, date: NaiveDate) -> Option<(NaiveDate, &[Sector])> {
        self.snapshots
            .range(..=date)
            .next_back()
            .map(|(effective, sectors)| (*effective, sectors.as_slice()))
    }
}

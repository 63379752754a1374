//! Universe and sector-membership ports.

use crate::domain::error::ReversionError;
use crate::domain::sector::{Sector, SectorHistory};

/// Sector groupings for the whole run. A failure is fatal to the run.
pub trait UniversePort {
    fn get_universe(&self) -> Result<Vec<Sector>, ReversionError>;
}

/// Dated sector definitions for point-in-time reclassification.
pub trait SectorHistoryPort {
    fn get_sector_history(&self) -> Result<SectorHistory, ReversionError>;
}

pub mod demographics;
pub mod overview;
pub mod standings;
pub mod trend;

use crate::models::CategoryStanding;
use serde::Serialize;

// Tunables shared by the aggregation passes
#[derive(Debug, Clone, PartialEq)]
pub struct TallySettings {
    /// Length of each trend comparison period, in days.
    pub trend_window_days: i64,
    /// Relative change (in percent) still reported as `Trend::Stable`.
    pub stable_band_percent: f64,
    /// Default number of locations returned before folding into "Other".
    pub location_top_n: usize,
}

impl Default for TallySettings {
    fn default() -> Self {
        Self {
            trend_window_days: 7,
            stable_band_percent: 2.0,
            location_top_n: 3,
        }
    }
}

// Output of the tally engine for one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TallyReport {
    pub standings: Vec<CategoryStanding>,
    /// Votes whose nominee id is not in the nominee collection.
    pub orphaned_votes: u64,
    /// Votes whose category id is not in the category collection.
    pub unknown_category_votes: u64,
    /// Repeated vote ids; only the first occurrence is counted.
    pub duplicate_votes: u64,
}

impl TallyReport {
    pub fn has_integrity_warnings(&self) -> bool {
        self.orphaned_votes > 0 || self.unknown_category_votes > 0 || self.duplicate_votes > 0
    }
}

/// `part / whole * 100`, rounded half-up to one decimal. Zero when `whole` is zero.
///
/// Computed in integer tenths so that exact halves (e.g. 1/8 = 12.5%, 1/16 =
/// 6.25%) round the same way on every platform.
pub fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let part = part as u128;
    let whole = whole as u128;
    let tenths = (part * 2000 + whole) / (whole * 2);
    tenths as f64 / 10.0
}

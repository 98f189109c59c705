use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---- Reference data pulled from the voting platform ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub vote_id: String,
    pub user_id: String,
    pub category_id: String,
    pub nominee_id: String,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub category_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomineeRef {
    pub nominee_id: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_ids: BTreeSet<String>,
}

impl NomineeRef {
    pub fn is_eligible_in(&self, category_id: &str) -> bool {
        self.category_ids.contains(category_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

// ---- Derived views, rebuilt on every cycle ----

/// Direction of a nominee's (or the platform's) vote flow compared with the
/// preceding period of equal length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NomineeStanding {
    pub nominee_id: String,
    pub nominee_name: Option<String>,
    pub category_id: String,
    pub vote_count: u64,
    pub percentage_of_category: f64,
    pub rank: usize,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStanding {
    pub category_id: String,
    pub category_name: String,
    pub total_votes: u64,
    pub nominee_standings: Vec<NomineeStanding>,
}

impl CategoryStanding {
    pub fn leader(&self) -> Option<&NomineeStanding> {
        self.nominee_standings
            .first()
            .filter(|standing| standing.vote_count > 0)
    }
}

/// Time granularity used to bucket votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    HourOfDay,
    DayOfWeek,
    MonthOfYear,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [
        Granularity::HourOfDay,
        Granularity::DayOfWeek,
        Granularity::MonthOfYear,
    ];

    pub fn bucket_count(self) -> usize {
        match self {
            Granularity::HourOfDay => 24,
            Granularity::DayOfWeek => 7,
            Granularity::MonthOfYear => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendSeries {
    pub granularity: Granularity,
    pub bucket_labels: Vec<String>,
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationBreakdown {
    pub location: String,
    pub voter_count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VotingOverview {
    pub total_votes: u64,
    pub distinct_voters: u64,
    pub registered_users: u64,
    pub participation_rate: f64,
    pub category_count: usize,
    pub nominee_count: usize,
    pub vote_trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentVote {
    pub vote_id: String,
    pub user_id: String,
    pub category_id: String,
    pub category_name: Option<String>,
    pub nominee_id: String,
    pub nominee_name: Option<String>,
    pub cast_at: DateTime<Utc>,
}

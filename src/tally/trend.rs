use crate::models::{Granularity, Trend, TrendSeries, VoteRecord};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Bucket index of `at` for the given granularity, always `< bucket_count()`.
pub fn bucket_of(at: DateTime<Utc>, granularity: Granularity) -> usize {
    match granularity {
        Granularity::HourOfDay => at.hour() as usize,
        Granularity::DayOfWeek => at.weekday().num_days_from_monday() as usize,
        Granularity::MonthOfYear => at.month0() as usize,
    }
}

pub fn bucket_labels(granularity: Granularity) -> Vec<String> {
    match granularity {
        Granularity::HourOfDay => (0..24).map(|hour| format!("{:02}:00", hour)).collect(),
        Granularity::DayOfWeek => WEEKDAY_LABELS.iter().map(|s| s.to_string()).collect(),
        Granularity::MonthOfYear => MONTH_LABELS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Zero-filled, fixed-length vote counts per bucket, optionally restricted to
/// one category.
pub fn series(votes: &[VoteRecord], granularity: Granularity, category_id: Option<&str>) -> TrendSeries {
    let mut counts = vec![0u64; granularity.bucket_count()];

    for vote in votes {
        if let Some(category_id) = category_id {
            if vote.category_id != category_id {
                continue;
            }
        }
        counts[bucket_of(vote.cast_at, granularity)] += 1;
    }

    TrendSeries {
        granularity,
        bucket_labels: bucket_labels(granularity),
        counts,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Current,
    Previous,
}

/// Two back-to-back periods of equal length ending at `as_of`:
/// current is `(as_of - len, as_of]`, previous is `(as_of - 2*len, as_of - len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendWindow {
    as_of: DateTime<Utc>,
    length: Duration,
}

impl TrendWindow {
    pub fn ending_at(as_of: DateTime<Utc>, days: i64) -> Self {
        Self {
            as_of,
            length: Duration::days(days.max(1)),
        }
    }

    pub fn classify(&self, at: DateTime<Utc>) -> Option<Period> {
        let current_start = self.as_of - self.length;
        let previous_start = current_start - self.length;
        if at > current_start && at <= self.as_of {
            Some(Period::Current)
        } else if at > previous_start && at <= current_start {
            Some(Period::Previous)
        } else {
            None
        }
    }
}

/// Running totals for the two periods of a `TrendWindow`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodCounts {
    pub current: u64,
    pub previous: u64,
}

impl PeriodCounts {
    pub fn record(&mut self, period: Option<Period>) {
        match period {
            Some(Period::Current) => self.current += 1,
            Some(Period::Previous) => self.previous += 1,
            None => {}
        }
    }

    pub fn direction(&self, stable_band_percent: f64) -> Trend {
        direction(self.current, self.previous, stable_band_percent)
    }
}

/// Compares a period's total against the preceding one. Without a baseline
/// (previous == 0) the answer is `Stable`.
pub fn direction(current: u64, previous: u64, stable_band_percent: f64) -> Trend {
    if previous == 0 {
        return Trend::Stable;
    }
    let change = (current as f64 - previous as f64) / previous as f64 * 100.0;
    if change.abs() <= stable_band_percent {
        Trend::Stable
    } else if change > 0.0 {
        Trend::Up
    } else {
        Trend::Down
    }
}

/// Week-over-week (or whatever the window length is) direction for a set of votes.
pub fn overall_direction(votes: &[VoteRecord], window_days: i64, stable_band_percent: f64) -> Trend {
    let Some(as_of) = votes.iter().map(|vote| vote.cast_at).max() else {
        return Trend::Stable;
    };
    let window = TrendWindow::ending_at(as_of, window_days);
    let mut counts = PeriodCounts::default();
    for vote in votes {
        counts.record(window.classify(vote.cast_at));
    }
    counts.direction(stable_band_percent)
}

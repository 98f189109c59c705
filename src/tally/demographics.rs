use crate::models::{LocationBreakdown, UserRef};
use crate::tally::percent_of;
use std::collections::HashMap;

pub const UNKNOWN_LOCATION: &str = "Unknown";
pub const OTHER_LOCATION: &str = "Other";

/// Full location ranking: voters per location, count descending, then
/// location name ascending. Blank or missing locations count as "Unknown".
pub fn rank_locations(users: &[UserRef]) -> Vec<(String, u64)> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for user in users {
        let location = user
            .location
            .as_deref()
            .map(str::trim)
            .filter(|location| !location.is_empty())
            .unwrap_or(UNKNOWN_LOCATION);
        *counts.entry(location).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(location, count)| (location.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Top `top_n` locations plus an "Other" bucket for the remainder. `None`
/// returns every location. When the list is cut, users whose location is
/// literally "Other" are merged into the bucket so the name appears once.
pub fn breakdown(ranked: &[(String, u64)], top_n: Option<usize>) -> Vec<LocationBreakdown> {
    let total: u64 = ranked.iter().map(|(_, count)| count).sum();
    let row = |location: &str, count: u64| LocationBreakdown {
        location: location.to_string(),
        voter_count: count,
        percentage: percent_of(count, total),
    };

    let limit = match top_n {
        Some(limit) if limit < ranked.len() => limit,
        _ => return ranked.iter().map(|(location, count)| row(location, *count)).collect(),
    };

    let (named, literal_other): (Vec<_>, Vec<_>) = ranked
        .iter()
        .partition(|(location, _)| location != OTHER_LOCATION);
    let keep = limit.min(named.len());

    let mut result: Vec<LocationBreakdown> = named[..keep]
        .iter()
        .map(|(location, count)| row(location, *count))
        .collect();

    let rest: u64 = named[keep..]
        .iter()
        .chain(literal_other.iter())
        .map(|(_, count)| count)
        .sum();
    result.push(row(OTHER_LOCATION, rest));
    result
}

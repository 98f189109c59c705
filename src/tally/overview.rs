use crate::models::{CategoryStanding, NomineeStanding, RecentVote, VotingOverview};
use crate::store::Snapshot;
use crate::tally::{percent_of, trend, TallySettings};
use std::collections::{HashMap, HashSet};

/// Headline numbers for the dashboard landing view.
pub fn overview(snapshot: &Snapshot, settings: &TallySettings) -> VotingOverview {
    let distinct_voters = snapshot
        .votes
        .iter()
        .map(|vote| vote.user_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;
    let registered_users = snapshot.users.len() as u64;

    VotingOverview {
        total_votes: snapshot.votes.len() as u64,
        distinct_voters,
        registered_users,
        participation_rate: percent_of(distinct_voters.min(registered_users), registered_users),
        category_count: snapshot.categories.len(),
        nominee_count: snapshot.nominees.len(),
        vote_trend: trend::overall_direction(
            &snapshot.votes,
            settings.trend_window_days,
            settings.stable_band_percent,
        ),
    }
}

/// Leaderboard across all categories.
pub fn top_nominees(standings: &[CategoryStanding], limit: usize) -> Vec<NomineeStanding> {
    let mut all: Vec<&NomineeStanding> = standings
        .iter()
        .flat_map(|category| category.nominee_standings.iter())
        .collect();
    all.sort_by(|a, b| {
        b.vote_count
            .cmp(&a.vote_count)
            .then_with(|| a.nominee_id.cmp(&b.nominee_id))
            .then_with(|| a.category_id.cmp(&b.category_id))
    });
    all.into_iter().take(limit).cloned().collect()
}

/// Newest votes first, with names resolved where the reference data knows them.
pub fn recent_votes(snapshot: &Snapshot, limit: usize) -> Vec<RecentVote> {
    let categories: HashMap<&str, &str> = snapshot
        .categories
        .iter()
        .map(|c| (c.category_id.as_str(), c.name.as_str()))
        .collect();
    let nominees: HashMap<&str, &str> = snapshot
        .nominees
        .iter()
        .map(|n| (n.nominee_id.as_str(), n.name.as_str()))
        .collect();

    let mut votes: Vec<_> = snapshot.votes.iter().collect();
    votes.sort_by(|a, b| b.cast_at.cmp(&a.cast_at).then_with(|| a.vote_id.cmp(&b.vote_id)));

    votes
        .into_iter()
        .take(limit)
        .map(|vote| RecentVote {
            vote_id: vote.vote_id.clone(),
            user_id: vote.user_id.clone(),
            category_id: vote.category_id.clone(),
            category_name: categories.get(vote.category_id.as_str()).map(|s| s.to_string()),
            nominee_id: vote.nominee_id.clone(),
            nominee_name: nominees.get(vote.nominee_id.as_str()).map(|s| s.to_string()),
            cast_at: vote.cast_at,
        })
        .collect()
}

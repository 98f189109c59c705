use crate::models::{CategoryStanding, NomineeRef, NomineeStanding, Trend, VoteRecord};
use crate::store::Snapshot;
use crate::tally::trend::{PeriodCounts, TrendWindow};
use crate::tally::{percent_of, TallyReport, TallySettings};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

// Per-nominee accumulator within one category
#[derive(Debug, Default, Clone, Copy)]
struct NomineeTally {
    votes: u64,
    periods: PeriodCounts,
}

/// Builds the standings of every category in the snapshot.
///
/// Categories keep the snapshot's order. Within a category, nominees are
/// ranked by vote count descending with nominee id ascending as the tie-break,
/// so identical input always yields identical ranks. Eligible nominees without
/// votes are listed with a zero count.
pub fn calculate_standings(snapshot: &Snapshot, settings: &TallySettings) -> TallyReport {
    let nominees: HashMap<&str, &NomineeRef> = snapshot
        .nominees
        .iter()
        .map(|nominee| (nominee.nominee_id.as_str(), nominee))
        .collect();
    let known_categories: HashSet<&str> = snapshot
        .categories
        .iter()
        .map(|category| category.category_id.as_str())
        .collect();

    let window = snapshot
        .latest_vote_at()
        .map(|as_of| TrendWindow::ending_at(as_of, settings.trend_window_days));

    let mut report = TallyReport::default();

    // Group the votes once: category -> (total, nominee -> tally)
    let mut seen_votes: HashSet<&str> = HashSet::new();
    let mut by_category: HashMap<&str, (u64, HashMap<&str, NomineeTally>)> = HashMap::new();

    for vote in &snapshot.votes {
        if !seen_votes.insert(vote.vote_id.as_str()) {
            report.duplicate_votes += 1;
            continue;
        }
        if !known_categories.contains(vote.category_id.as_str()) {
            report.unknown_category_votes += 1;
            continue;
        }

        let (total, tallies) = by_category.entry(vote.category_id.as_str()).or_default();
        *total += 1;

        if !nominees.contains_key(vote.nominee_id.as_str()) {
            report.orphaned_votes += 1;
            continue;
        }
        let tally = tallies.entry(vote.nominee_id.as_str()).or_default();
        record_vote(tally, vote, window.as_ref());
    }

    for category in &snapshot.categories {
        let (total_votes, mut tallies) = by_category
            .remove(category.category_id.as_str())
            .unwrap_or_default();

        // Eligible nominees with no votes still belong on the leaderboard
        for nominee in &snapshot.nominees {
            if nominee.is_eligible_in(&category.category_id) {
                tallies.entry(nominee.nominee_id.as_str()).or_default();
            }
        }

        let mut ranked: Vec<(&str, NomineeTally)> = tallies.into_iter().collect();
        ranked.sort_by(|a, b| b.1.votes.cmp(&a.1.votes).then_with(|| a.0.cmp(b.0)));

        let nominee_standings = ranked
            .into_iter()
            .enumerate()
            .map(|(position, (nominee_id, tally))| NomineeStanding {
                nominee_id: nominee_id.to_string(),
                nominee_name: nominees.get(nominee_id).map(|nominee| nominee.name.clone()),
                category_id: category.category_id.clone(),
                vote_count: tally.votes,
                percentage_of_category: percent_of(tally.votes, total_votes),
                rank: position + 1,
                trend: if window.is_some() {
                    tally.periods.direction(settings.stable_band_percent)
                } else {
                    Trend::Stable
                },
            })
            .collect::<Vec<_>>();

        debug!(
            "Category {} ({}): {} votes across {} nominees",
            category.category_id,
            category.name,
            total_votes,
            nominee_standings.len()
        );

        report.standings.push(CategoryStanding {
            category_id: category.category_id.clone(),
            category_name: category.name.clone(),
            total_votes,
            nominee_standings,
        });
    }

    if report.has_integrity_warnings() {
        warn!(
            "Tally integrity: {} orphaned vote(s), {} vote(s) for unknown categories, {} duplicate vote id(s)",
            report.orphaned_votes, report.unknown_category_votes, report.duplicate_votes
        );
    }

    report
}

fn record_vote(tally: &mut NomineeTally, vote: &VoteRecord, window: Option<&TrendWindow>) {
    tally.votes += 1;
    if let Some(window) = window {
        tally.periods.record(window.classify(vote.cast_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryRef, UserRef};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeSet;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
    }

    fn category(id: &str) -> CategoryRef {
        CategoryRef {
            category_id: id.to_string(),
            name: format!("Category {id}"),
        }
    }

    fn nominee(id: &str, categories: &[&str]) -> NomineeRef {
        NomineeRef {
            nominee_id: id.to_string(),
            name: format!("Nominee {id}"),
            image_url: None,
            category_ids: categories.iter().map(|c| c.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn votes(pairs: &[(&str, &str)]) -> Vec<VoteRecord> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (category_id, nominee_id))| VoteRecord {
                vote_id: format!("v{i}"),
                user_id: format!("u{i}"),
                category_id: category_id.to_string(),
                nominee_id: nominee_id.to_string(),
                cast_at: base_time(),
            })
            .collect()
    }

    fn snapshot(
        votes: Vec<VoteRecord>,
        categories: Vec<CategoryRef>,
        nominees: Vec<NomineeRef>,
    ) -> Snapshot {
        Snapshot {
            generation: 1,
            loaded_at: None,
            votes,
            categories,
            nominees,
            users: Vec::<UserRef>::new(),
        }
    }

    fn summary(standing: &CategoryStanding) -> Vec<(String, u64, f64, usize)> {
        standing
            .nominee_standings
            .iter()
            .map(|s| (s.nominee_id.clone(), s.vote_count, s.percentage_of_category, s.rank))
            .collect()
    }

    #[test]
    fn ranks_by_votes_with_percentages() {
        let snapshot = snapshot(
            votes(&[
                ("C1", "A"),
                ("C1", "A"),
                ("C1", "B"),
                ("C1", "D"),
                ("C1", "D"),
                ("C1", "D"),
            ]),
            vec![category("C1")],
            vec![nominee("A", &["C1"]), nominee("B", &["C1"]), nominee("D", &["C1"])],
        );

        let report = calculate_standings(&snapshot, &TallySettings::default());
        let c1 = &report.standings[0];
        assert_eq!(c1.total_votes, 6);
        assert_eq!(
            summary(c1),
            vec![
                ("D".to_string(), 3, 50.0, 1),
                ("A".to_string(), 2, 33.3, 2),
                ("B".to_string(), 1, 16.7, 3),
            ]
        );
        assert_eq!(c1.leader().map(|s| s.nominee_id.as_str()), Some("D"));
        assert!(!report.has_integrity_warnings());
    }

    #[test]
    fn zero_vote_category_lists_every_eligible_nominee() {
        let snapshot = snapshot(
            Vec::new(),
            vec![category("C2")],
            vec![nominee("Y", &["C2"]), nominee("X", &["C2"]), nominee("Z", &["C9"])],
        );

        let report = calculate_standings(&snapshot, &TallySettings::default());
        let c2 = &report.standings[0];
        assert_eq!(c2.total_votes, 0);
        assert_eq!(
            summary(c2),
            vec![("X".to_string(), 0, 0.0, 1), ("Y".to_string(), 0, 0.0, 2)]
        );
        assert!(c2.leader().is_none());
        assert!(c2.nominee_standings.iter().all(|s| s.trend == Trend::Stable));
    }

    #[test]
    fn empty_snapshot_yields_no_standings() {
        let report = calculate_standings(&Snapshot::default(), &TallySettings::default());
        assert!(report.standings.is_empty());
        assert_eq!(report, TallyReport::default());
    }

    #[test]
    fn ties_break_by_nominee_id_and_ranks_never_repeat() {
        let snapshot = snapshot(
            votes(&[("C1", "b"), ("C1", "a"), ("C1", "c"), ("C1", "c")]),
            vec![category("C1")],
            vec![nominee("a", &["C1"]), nominee("b", &["C1"]), nominee("c", &["C1"])],
        );
        let report = calculate_standings(&snapshot, &TallySettings::default());
        let ranks: Vec<_> = report.standings[0]
            .nominee_standings
            .iter()
            .map(|s| (s.nominee_id.as_str(), s.rank))
            .collect();
        assert_eq!(ranks, vec![("c", 1), ("a", 2), ("b", 3)]);
    }

    #[test]
    fn counts_are_conserved_and_percentages_sum_to_about_100() {
        let snapshot = snapshot(
            votes(&[
                ("C1", "a"),
                ("C1", "b"),
                ("C1", "c"),
                ("C1", "a"),
                ("C1", "b"),
                ("C1", "a"),
                ("C1", "d"),
            ]),
            vec![category("C1")],
            vec![
                nominee("a", &["C1"]),
                nominee("b", &["C1"]),
                nominee("c", &["C1"]),
                nominee("d", &["C1"]),
            ],
        );
        let report = calculate_standings(&snapshot, &TallySettings::default());
        let c1 = &report.standings[0];
        let counted: u64 = c1.nominee_standings.iter().map(|s| s.vote_count).sum();
        assert_eq!(counted, c1.total_votes);
        let percent: f64 = c1.nominee_standings.iter().map(|s| s.percentage_of_category).sum();
        let tolerance = 0.1 * c1.nominee_standings.len() as f64;
        assert!((percent - 100.0).abs() <= tolerance, "percentages summed to {percent}");
    }

    #[test]
    fn repeated_runs_are_identical() {
        let snapshot = snapshot(
            votes(&[("C1", "x"), ("C1", "y"), ("C2", "y"), ("C2", "x"), ("C1", "z")]),
            vec![category("C1"), category("C2")],
            vec![nominee("x", &["C1", "C2"]), nominee("y", &["C1", "C2"]), nominee("z", &["C1"])],
        );
        let settings = TallySettings::default();
        let first = calculate_standings(&snapshot, &settings);
        for _ in 0..10 {
            assert_eq!(calculate_standings(&snapshot, &settings), first);
        }
    }

    #[test]
    fn integrity_problems_are_counted_not_fatal() {
        let mut all = votes(&[("C1", "a"), ("C1", "ghost"), ("C404", "a"), ("C1", "a")]);
        // repeat the first vote id
        all.push(all[0].clone());
        let snapshot = snapshot(all, vec![category("C1")], vec![nominee("a", &["C1"])]);

        let report = calculate_standings(&snapshot, &TallySettings::default());
        assert_eq!(report.orphaned_votes, 1);
        assert_eq!(report.unknown_category_votes, 1);
        assert_eq!(report.duplicate_votes, 1);

        let c1 = &report.standings[0];
        assert_eq!(c1.total_votes, 3);
        assert_eq!(c1.nominee_standings.len(), 1);
        assert_eq!(c1.nominee_standings[0].vote_count, 2);
        assert_eq!(c1.nominee_standings[0].percentage_of_category, 66.7);
    }

    #[test]
    fn votes_for_known_but_ineligible_nominees_still_count() {
        let snapshot = snapshot(
            votes(&[("C1", "a"), ("C1", "late")]),
            vec![category("C1")],
            vec![nominee("a", &["C1"]), nominee("late", &[])],
        );
        let report = calculate_standings(&snapshot, &TallySettings::default());
        assert_eq!(report.orphaned_votes, 0);
        let ids: Vec<_> = report.standings[0]
            .nominee_standings
            .iter()
            .map(|s| s.nominee_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "late"]);
    }

    #[test]
    fn nominee_trend_compares_the_last_two_windows() {
        let now = base_time();
        let mut all = Vec::new();
        let mut push = |id: usize, nominee_id: &str, at: DateTime<Utc>| {
            all.push(VoteRecord {
                vote_id: format!("v{id}"),
                user_id: format!("u{id}"),
                category_id: "C1".to_string(),
                nominee_id: nominee_id.to_string(),
                cast_at: at,
            })
        };
        // rising: 1 last week, 3 this week
        push(1, "rising", now - Duration::days(10));
        push(2, "rising", now - Duration::days(1));
        push(3, "rising", now - Duration::days(2));
        push(4, "rising", now);
        // falling: 2 last week, 1 this week
        push(5, "falling", now - Duration::days(8));
        push(6, "falling", now - Duration::days(9));
        push(7, "falling", now - Duration::days(3));
        // flat: 1 and 1
        push(8, "flat", now - Duration::days(12));
        push(9, "flat", now - Duration::hours(5));
        // new: nothing last week
        push(10, "new", now - Duration::days(1));

        let snapshot = snapshot(
            all,
            vec![category("C1")],
            vec![
                nominee("rising", &["C1"]),
                nominee("falling", &["C1"]),
                nominee("flat", &["C1"]),
                nominee("new", &["C1"]),
            ],
        );
        let report = calculate_standings(&snapshot, &TallySettings::default());
        let trend_of = |id: &str| {
            report.standings[0]
                .nominee_standings
                .iter()
                .find(|s| s.nominee_id == id)
                .map(|s| s.trend)
        };
        assert_eq!(trend_of("rising"), Some(Trend::Up));
        assert_eq!(trend_of("falling"), Some(Trend::Down));
        assert_eq!(trend_of("flat"), Some(Trend::Stable));
        assert_eq!(trend_of("new"), Some(Trend::Stable));
    }
}

use crate::models::{CategoryRef, NomineeRef, UserRef, VoteRecord};
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// One consistent set of input collections. Never mutated after it is built.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub generation: u64,
    pub loaded_at: Option<DateTime<Utc>>,
    pub votes: Vec<VoteRecord>,
    pub categories: Vec<CategoryRef>,
    pub nominees: Vec<NomineeRef>,
    pub users: Vec<UserRef>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
            && self.categories.is_empty()
            && self.nominees.is_empty()
            && self.users.is_empty()
    }

    /// Latest `cast_at` among the votes; the reference point for trend windows.
    pub fn latest_vote_at(&self) -> Option<DateTime<Utc>> {
        self.votes.iter().map(|vote| vote.cast_at).max()
    }

    /// Copy of this snapshot with repeated vote ids dropped; the first
    /// occurrence of each id is kept. Generation and load time are unchanged.
    pub fn with_distinct_votes(&self) -> Snapshot {
        let mut seen = HashSet::new();
        let votes = self
            .votes
            .iter()
            .filter(|vote| seen.insert(vote.vote_id.as_str()))
            .cloned()
            .collect();
        Snapshot {
            votes,
            ..self.clone()
        }
    }
}

/// Holds the active snapshot behind a copy-on-write pointer.
///
/// `load` builds the replacement completely before swapping the `Arc`, so a
/// reader holding the result of `current()` keeps its generation intact for as
/// long as it needs it.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    active: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        &self,
        votes: Vec<VoteRecord>,
        categories: Vec<CategoryRef>,
        nominees: Vec<NomineeRef>,
        users: Vec<UserRef>,
    ) -> Arc<Snapshot> {
        let mut active = match self.active.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let snapshot = Arc::new(Snapshot {
            generation: active.generation + 1,
            loaded_at: Some(Utc::now()),
            votes,
            categories,
            nominees,
            users,
        });
        debug!(
            "Loaded snapshot generation {} ({} votes, {} categories, {} nominees, {} users)",
            snapshot.generation,
            snapshot.votes.len(),
            snapshot.categories.len(),
            snapshot.nominees.len(),
            snapshot.users.len()
        );

        *active = Arc::clone(&snapshot);
        snapshot
    }

    pub fn current(&self) -> Arc<Snapshot> {
        match self.active.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vote(id: &str) -> VoteRecord {
        VoteRecord {
            vote_id: id.to_string(),
            user_id: "u1".to_string(),
            category_id: "c1".to_string(),
            nominee_id: "n1".to_string(),
            cast_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn starts_empty_at_generation_zero() {
        let store = SnapshotStore::new();
        let snapshot = store.current();
        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.is_empty());
        assert!(snapshot.loaded_at.is_none());
    }

    #[test]
    fn empty_collections_are_a_valid_load() {
        let store = SnapshotStore::new();
        let snapshot = store.load(Vec::new(), Vec::new(), Vec::new(), Vec::new());
        assert_eq!(snapshot.generation, 1);
        assert!(snapshot.is_empty());
        assert!(snapshot.loaded_at.is_some());
    }

    #[test]
    fn readers_keep_their_generation_across_a_load() {
        let store = SnapshotStore::new();
        store.load(vec![vote("v1")], Vec::new(), Vec::new(), Vec::new());
        let held = store.current();

        store.load(
            vec![vote("v2"), vote("v3")],
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(held.generation, 1);
        assert_eq!(held.votes.len(), 1);
        let fresh = store.current();
        assert_eq!(fresh.generation, 2);
        assert_eq!(fresh.votes.len(), 2);
    }

    #[test]
    fn distinct_votes_keep_the_first_copy_of_each_id() {
        let store = SnapshotStore::new();
        let mut late = vote("v1");
        late.nominee_id = "n2".to_string();
        let snapshot = store.load(vec![vote("v1"), vote("v2"), late], Vec::new(), Vec::new(), Vec::new());

        let distinct = snapshot.with_distinct_votes();
        let ids: Vec<_> = distinct.votes.iter().map(|v| (v.vote_id.as_str(), v.nominee_id.as_str())).collect();
        assert_eq!(ids, vec![("v1", "n1"), ("v2", "n1")]);
        assert_eq!(distinct.generation, snapshot.generation);
        assert_eq!(snapshot.votes.len(), 3);
    }

    #[test]
    fn concurrent_readers_never_see_a_mixed_snapshot() {
        let store = Arc::new(SnapshotStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for n in 1..=200usize {
                    let votes = (0..n).map(|i| vote(&format!("v{i}"))).collect();
                    store.load(votes, Vec::new(), Vec::new(), Vec::new());
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = store.current();
                        // generation n always carries exactly n votes
                        assert_eq!(snapshot.votes.len() as u64, snapshot.generation);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.current().generation, 200);
    }
}

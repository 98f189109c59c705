use crate::error::TallyError;
use crate::models::{
    CategoryRef, CategoryStanding, Granularity, LocationBreakdown, NomineeRef, NomineeStanding, RecentVote, TrendSeries,
    UserRef, VoteRecord, VotingOverview,
};
use crate::store::{Snapshot, SnapshotStore};
use crate::tally::{demographics, overview, standings, trend, TallyReport, TallySettings};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// Every derived view computed from one snapshot generation. Published as a
/// whole; never updated in place.
#[derive(Debug)]
pub struct ResultSet {
    pub generation: u64,
    pub refreshed_at: DateTime<Utc>,
    pub snapshot: Arc<Snapshot>,
    pub tally: TallyReport,
    pub trends: HashMap<Granularity, TrendSeries>,
    pub locations: Vec<(String, u64)>,
    pub overview: VotingOverview,
}

impl ResultSet {
    pub fn compute(snapshot: Arc<Snapshot>, settings: &TallySettings) -> Self {
        let tally = standings::calculate_standings(&snapshot, settings);
        // Every later pass reads the same vote set the tally counted
        let snapshot = if tally.duplicate_votes > 0 {
            Arc::new(snapshot.with_distinct_votes())
        } else {
            snapshot
        };
        let trends = Granularity::ALL
            .into_iter()
            .map(|granularity| (granularity, trend::series(&snapshot.votes, granularity, None)))
            .collect();
        let locations = demographics::rank_locations(&snapshot.users);
        let overview = overview::overview(&snapshot, settings);

        Self {
            generation: snapshot.generation,
            refreshed_at: Utc::now(),
            snapshot,
            tally,
            trends,
            locations,
            overview,
        }
    }

    pub fn category_standings(&self, category_id: Option<&str>) -> Vec<CategoryStanding> {
        self.tally
            .standings
            .iter()
            .filter(|standing| category_id.is_none_or(|id| standing.category_id == id))
            .cloned()
            .collect()
    }

    pub fn trend_series(&self, granularity: Granularity, category_id: Option<&str>) -> TrendSeries {
        match category_id {
            None => match self.trends.get(&granularity) {
                Some(series) => series.clone(),
                None => trend::series(&self.snapshot.votes, granularity, None),
            },
            Some(id) => trend::series(&self.snapshot.votes, granularity, Some(id)),
        }
    }

    pub fn location_breakdown(&self, top_n: Option<usize>) -> Vec<LocationBreakdown> {
        demographics::breakdown(&self.locations, top_n)
    }
}

/// What subscribers are told after each cycle.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    Published {
        generation: u64,
        refreshed_at: DateTime<Utc>,
    },
    Failed {
        error: Arc<TallyError>,
        failed_at: DateTime<Utc>,
    },
}

pub type Subscriber = Arc<dyn Fn(&RefreshEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

#[derive(Debug, Default)]
struct CycleHealth {
    last_error: Option<Arc<TallyError>>,
    last_failed_at: Option<DateTime<Utc>>,
}

/// The one object presentation code talks to: it owns the snapshot store and
/// the latest published result set, and fans refresh events out to subscribers.
pub struct DashboardService {
    settings: TallySettings,
    store: SnapshotStore,
    // Held from load to swap so generations publish in order
    publishing: Mutex<()>,
    published: RwLock<Option<Arc<ResultSet>>>,
    health: RwLock<CycleHealth>,
    subscribers: Mutex<HashMap<SubscriptionHandle, Subscriber>>,
}

impl DashboardService {
    pub fn new(settings: TallySettings) -> Self {
        Self {
            settings,
            store: SnapshotStore::new(),
            publishing: Mutex::new(()),
            published: RwLock::new(None),
            health: RwLock::new(CycleHealth::default()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &TallySettings {
        &self.settings
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    /// Loads a fresh snapshot, recomputes every view from it and publishes the
    /// result set in one swap.
    pub fn publish(
        &self,
        votes: Vec<VoteRecord>,
        categories: Vec<CategoryRef>,
        nominees: Vec<NomineeRef>,
        users: Vec<UserRef>,
    ) -> Arc<ResultSet> {
        let results = {
            let _publishing = self.publishing.lock().unwrap_or_else(|e| e.into_inner());
            let snapshot = self.store.load(votes, categories, nominees, users);
            let results = Arc::new(ResultSet::compute(snapshot, &self.settings));
            let mut published = self.published.write().unwrap_or_else(|e| e.into_inner());
            *published = Some(Arc::clone(&results));
            results
        };
        {
            let mut health = self.health.write().unwrap_or_else(|e| e.into_inner());
            *health = CycleHealth::default();
        }

        info!(
            "Published generation {}: {} votes across {} categories",
            results.generation,
            results.overview.total_votes,
            results.tally.standings.len()
        );
        self.notify(&RefreshEvent::Published {
            generation: results.generation,
            refreshed_at: results.refreshed_at,
        });
        results
    }

    /// Records a failed cycle. The last good result set stays published.
    pub fn report_failure(&self, error: TallyError) {
        let error = Arc::new(error);
        let failed_at = Utc::now();
        error!("Refresh cycle failed: {}", error);
        {
            let mut health = self.health.write().unwrap_or_else(|e| e.into_inner());
            health.last_error = Some(Arc::clone(&error));
            health.last_failed_at = Some(failed_at);
        }
        self.notify(&RefreshEvent::Failed { error, failed_at });
    }

    // ---- Queries ----

    /// The latest result set, for callers that render several views and need
    /// them all from the same generation.
    pub fn results(&self) -> Option<Arc<ResultSet>> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Arc::clone)
    }

    pub fn category_standings(&self, category_id: Option<&str>) -> Vec<CategoryStanding> {
        self.results()
            .map(|results| results.category_standings(category_id))
            .unwrap_or_default()
    }

    pub fn trend_series(&self, granularity: Granularity, category_id: Option<&str>) -> TrendSeries {
        match self.results() {
            Some(results) => results.trend_series(granularity, category_id),
            None => trend::series(&[], granularity, None),
        }
    }

    /// `None` returns every location without an "Other" bucket.
    pub fn location_breakdown(&self, top_n: Option<usize>) -> Vec<LocationBreakdown> {
        self.results()
            .map(|results| results.location_breakdown(top_n))
            .unwrap_or_default()
    }

    pub fn default_location_breakdown(&self) -> Vec<LocationBreakdown> {
        self.location_breakdown(Some(self.settings.location_top_n))
    }

    pub fn overview(&self) -> Option<VotingOverview> {
        self.results().map(|results| results.overview.clone())
    }

    pub fn top_nominees(&self, limit: usize) -> Vec<NomineeStanding> {
        self.results()
            .map(|results| overview::top_nominees(&results.tally.standings, limit))
            .unwrap_or_default()
    }

    pub fn recent_votes(&self, limit: usize) -> Vec<RecentVote> {
        self.results()
            .map(|results| overview::recent_votes(&results.snapshot, limit))
            .unwrap_or_default()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.results().map(|results| results.refreshed_at)
    }

    /// True when the most recent cycle failed and the views show older data.
    pub fn is_stale(&self) -> bool {
        self.health
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last_error
            .is_some()
    }

    pub fn last_failure_at(&self) -> Option<DateTime<Utc>> {
        self.health
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last_failed_at
    }

    pub fn last_error(&self) -> Option<Arc<TallyError>> {
        self.health
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last_error
            .clone()
    }

    // ---- Subscriptions ----

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&RefreshEvent) + Send + Sync + 'static,
    {
        let handle = SubscriptionHandle(Uuid::new_v4());
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle, Arc::new(callback));
        debug!("Added subscriber {:?}", handle);
        handle
    }

    /// Returns false when the handle was not subscribed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle)
            .is_some()
    }

    fn notify(&self, event: &RefreshEvent) {
        // Callbacks run outside the lock so they may (un)subscribe.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        for subscriber in subscribers {
            (subscriber.as_ref())(event);
        }
    }
}

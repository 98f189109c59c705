use crate::error::{Collection, SourceError, SourceResult, TallyError};
use crate::models::{CategoryRef, NomineeRef, UserRef, VoteRecord};
use crate::service::DashboardService;
use crate::source::VoteSource;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Where the current cycle is. `Failed` is held only while the failure is being
/// reported, then the scheduler returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Aggregating,
    Failed,
}

type Collections = (Vec<VoteRecord>, Vec<CategoryRef>, Vec<NomineeRef>, Vec<UserRef>);

struct Shared {
    source: Arc<dyn VoteSource>,
    service: Arc<DashboardService>,
    fetch_timeout: Duration,
    state: Mutex<CycleState>,
}

/// Drives fetch-then-aggregate cycles, at most one at a time. Triggers that
/// arrive while a cycle is running are dropped, not queued.
pub struct RefreshScheduler {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn VoteSource>, service: Arc<DashboardService>, fetch_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                service,
                fetch_timeout,
                state: Mutex::new(CycleState::Idle),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &Arc<DashboardService> {
        &self.shared.service
    }

    pub fn state(&self) -> CycleState {
        self.shared.state()
    }

    /// Starts periodic triggering; the first tick fires immediately. Calling it
    /// again replaces the previous timer.
    pub fn start(&self, period: Duration) {
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            info!("Starting refresh timer every {:?}", period);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if !Shared::trigger(&shared) {
                    debug!("Timer tick dropped: cycle already in flight ({:?})", shared.state());
                }
            }
        });

        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
    }

    /// Runs a cycle now if idle. Returns false (and does nothing) when a cycle
    /// is already in flight or the calling thread has no tokio runtime.
    pub fn trigger_now(&self) -> bool {
        let started = Shared::trigger(&self.shared);
        if !started {
            debug!("trigger_now ignored: cycle already in flight ({:?})", self.state());
        }
        started
    }

    /// Cancels the timer. A cycle already in flight runs to completion.
    pub fn stop(&self) {
        let handle = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Stopped refresh timer");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn state(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: CycleState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    fn try_begin(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != CycleState::Idle {
            return false;
        }
        *state = CycleState::Fetching;
        true
    }

    fn trigger(shared: &Arc<Shared>) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!("Refresh trigger ignored: no tokio runtime on this thread");
            return false;
        };
        if !shared.try_begin() {
            return false;
        }
        let shared = Arc::clone(shared);
        // Spawned separately so stopping the timer never cuts a cycle short
        runtime.spawn(async move {
            let _idle = ReturnToIdle(&shared);
            shared.run_cycle().await;
        });
        true
    }

    async fn run_cycle(&self) {
        let started = Instant::now();
        info!("Refresh cycle started");
        match self.fetch_all().await {
            Ok((votes, categories, nominees, users)) => {
                debug!("Fetched collections in {:?}", started.elapsed());
                self.set_state(CycleState::Aggregating);
                let results = self.service.publish(votes, categories, nominees, users);
                info!(
                    "Refresh cycle finished in {:?} (generation {})",
                    started.elapsed(),
                    results.generation
                );
            }
            Err(e) => {
                self.set_state(CycleState::Failed);
                self.service.report_failure(e);
            }
        }
    }

    // All four reads run concurrently; the first failure aborts the cycle
    async fn fetch_all(&self) -> Result<Collections, TallyError> {
        let timeout = self.fetch_timeout;
        tokio::try_join!(
            fetch(Collection::Votes, timeout, self.source.fetch_votes()),
            fetch(Collection::Categories, timeout, self.source.fetch_categories()),
            fetch(Collection::Nominees, timeout, self.source.fetch_nominees()),
            fetch(Collection::Users, timeout, self.source.fetch_users()),
        )
    }
}

// Puts the scheduler back to Idle however the cycle ends, panics included.
struct ReturnToIdle<'a>(&'a Shared);

impl Drop for ReturnToIdle<'_> {
    fn drop(&mut self) {
        self.0.set_state(CycleState::Idle);
    }
}

async fn fetch<T, F>(collection: Collection, timeout: Duration, read: F) -> Result<T, TallyError>
where
    F: Future<Output = SourceResult<T>>,
{
    match tokio::time::timeout(timeout, read).await {
        Ok(Ok(items)) => Ok(items),
        Ok(Err(e)) => Err(TallyError::fetch(collection, e)),
        Err(_) => Err(TallyError::fetch(collection, SourceError::Timeout(timeout))),
    }
}

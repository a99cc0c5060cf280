//! Orchestration: cancellable background runs and snapshot publication.
//!
//! A [`MetricsService`] owns at most one active run. Starting a new run
//! cancels the previous one; a superseded run that still finishes is ignored
//! because publication is guarded by a generation counter checked under the
//! state lock. Completed runs publish an immutable [`MetricsSnapshot`] to the
//! service and to every subscriber. Failed runs record the error and leave the
//! last published snapshot in place.

pub mod executor;
pub mod snapshot;

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{FetchFailure, MetricsError};
use crate::metrics::engine::MetricsEngine;
use crate::model::ItemSnapshot;
use crate::timing;

pub use executor::{Executor, Job, ThreadExecutor};
pub use snapshot::{MetricsSnapshot, Subject, compute_snapshot, input_digest};

/// Lifecycle of the most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// How a single run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Arc<MetricsSnapshot>),
    Cancelled,
    Failed(MetricsError),
}

impl RunOutcome {
    #[must_use]
    pub const fn state(&self) -> RunState {
        match self {
            Self::Completed(_) => RunState::Completed,
            Self::Cancelled => RunState::Cancelled,
            Self::Failed(_) => RunState::Failed,
        }
    }
}

/// Caller's view of one started run.
#[derive(Debug)]
pub struct RunHandle {
    id: u64,
    cancel: CancelToken,
    outcome: mpsc::Receiver<RunOutcome>,
}

impl RunHandle {
    /// Generation number of the run; strictly increasing per service.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Request cooperative cancellation of this run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the run ends.
    ///
    /// A run whose job was dropped by the executor without running counts as
    /// cancelled.
    #[must_use]
    pub fn wait(self) -> RunOutcome {
        self.outcome.recv().unwrap_or(RunOutcome::Cancelled)
    }

    /// The outcome, if the run has already ended.
    #[must_use]
    pub fn try_outcome(&self) -> Option<RunOutcome> {
        self.outcome.try_recv().ok()
    }
}

#[derive(Debug, Default)]
struct ServiceState {
    generation: u64,
    state: RunState,
    active: Option<CancelToken>,
    current: Option<Arc<MetricsSnapshot>>,
    last_failure: Option<MetricsError>,
    subscribers: Vec<mpsc::Sender<Arc<MetricsSnapshot>>>,
}

/// Recalculates metrics in the background and publishes snapshots.
pub struct MetricsService<E: Executor = ThreadExecutor> {
    engine: Arc<MetricsEngine>,
    executor: E,
    shared: Arc<Mutex<ServiceState>>,
}

impl MetricsService<ThreadExecutor> {
    #[must_use]
    pub fn new(engine: MetricsEngine) -> Self {
        Self::with_executor(engine, ThreadExecutor)
    }
}

impl<E: Executor> MetricsService<E> {
    #[must_use]
    pub fn with_executor(engine: MetricsEngine, executor: E) -> Self {
        Self {
            engine: Arc::new(engine),
            executor,
            shared: Arc::new(Mutex::new(ServiceState::default())),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &MetricsEngine {
        &self.engine
    }

    /// Start a run for `subject` over a fetch result, superseding any run in
    /// flight.
    ///
    /// A failed fetch is not an error here: the run starts and ends
    /// [`RunState::Failed`] with [`MetricsError::Fetch`].
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Internal`] if the executor cannot schedule the
    /// run; the service is then left `Failed`.
    pub fn recalculate(
        &self,
        subject: Subject,
        fetched: Result<Arc<ItemSnapshot>, FetchFailure>,
    ) -> Result<RunHandle, MetricsError> {
        let token = CancelToken::new();
        let generation = {
            let mut state = self.lock();
            if let Some(previous) = state.active.replace(token.clone()) {
                previous.cancel();
                debug!(superseded = state.generation, "cancelled in-flight run");
            }
            state.generation += 1;
            state.state = RunState::Running;
            state.generation
        };
        debug!(run = generation, %subject, "run started");

        let (tx, rx) = mpsc::sync_channel(1);
        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(&self.shared);
        let run_token = token.clone();
        let job: Job = Box::new(move || {
            let result = timing::timed("service.run", || {
                let snapshot = fetched?;
                compute_snapshot(&engine, &subject, &snapshot, &run_token)
            });
            let outcome = finish(&shared, generation, &run_token, result);
            // The handle may have been dropped.
            let _ = tx.send(outcome);
        });

        if let Err(err) = self.executor.execute(job) {
            let error = MetricsError::Internal(format!("failed to schedule run: {err}"));
            let mut state = self.lock();
            if state.generation == generation {
                state.state = RunState::Failed;
                state.active = None;
                state.last_failure = Some(error.clone());
            }
            return Err(error);
        }

        Ok(RunHandle {
            id: generation,
            cancel: token,
            outcome: rx,
        })
    }

    /// Cancel the run in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = &self.lock().active {
            token.cancel();
        }
    }

    /// Receive every snapshot published from now on.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::Receiver<Arc<MetricsSnapshot>> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn current(&self) -> Option<Arc<MetricsSnapshot>> {
        self.lock().current.clone()
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.lock().state
    }

    /// Error of the most recent failed run, cleared by the next completion.
    #[must_use]
    pub fn last_failure(&self) -> Option<MetricsError> {
        self.lock().last_failure.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn finish(
    shared: &Mutex<ServiceState>,
    generation: u64,
    token: &CancelToken,
    result: Result<MetricsSnapshot, MetricsError>,
) -> RunOutcome {
    let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
    let current_run = state.generation == generation;

    if !current_run || token.is_cancelled() || matches!(result, Err(MetricsError::Cancelled)) {
        if current_run {
            state.state = RunState::Cancelled;
            state.active = None;
        }
        debug!(run = generation, "run cancelled, result dropped");
        return RunOutcome::Cancelled;
    }

    state.active = None;
    match result {
        Ok(snapshot) => {
            let snapshot = Arc::new(snapshot);
            state.current = Some(Arc::clone(&snapshot));
            state.state = RunState::Completed;
            state.last_failure = None;
            state
                .subscribers
                .retain(|subscriber| subscriber.send(Arc::clone(&snapshot)).is_ok());
            info!(
                run = generation,
                subject = %snapshot.subject,
                days = snapshot.daily.days.len(),
                digest = %snapshot.input_digest,
                "metrics snapshot published"
            );
            RunOutcome::Completed(snapshot)
        }
        Err(error) => {
            warn!(run = generation, code = %error.error_code(), %error, "run failed");
            state.state = RunState::Failed;
            state.last_failure = Some(error.clone());
            RunOutcome::Failed(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{TransitionHistory, TransitionRecord};
    use crate::model::{SprintSpec, TrackedItem, WorkItem};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn fixture() -> Arc<ItemSnapshot> {
        let done = Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap();
        Arc::new(
            ItemSnapshot::new(
                "demo",
                vec![TrackedItem::new(
                    WorkItem::new("a", "A", 5.0),
                    TransitionHistory::new(vec![TransitionRecord::new(done, "done")]).unwrap(),
                )],
            )
            .with_sprint(SprintSpec {
                name: "S1".into(),
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                total_points: Some(20.0),
            }),
        )
    }

    #[test]
    fn completed_run_publishes_snapshot() {
        let service = MetricsService::new(MetricsEngine::default());
        let updates = service.subscribe();
        assert_eq!(service.state(), RunState::Idle);

        let handle = service
            .recalculate(Subject::sprint("S1"), Ok(fixture()))
            .unwrap();
        assert_eq!(handle.id(), 1);
        let RunOutcome::Completed(snapshot) = handle.wait() else {
            panic!("run should complete");
        };

        assert_eq!(service.state(), RunState::Completed);
        assert_eq!(service.current(), Some(Arc::clone(&snapshot)));
        assert_eq!(updates.recv().unwrap(), snapshot);
        assert!(service.last_failure().is_none());
    }

    #[test]
    fn fetch_failure_fails_the_run() {
        let service = MetricsService::new(MetricsEngine::default());
        let handle = service
            .recalculate(
                Subject::sprint("S1"),
                Err(FetchFailure::new("tracker", "timed out")),
            )
            .unwrap();

        let outcome = handle.wait();
        assert_eq!(outcome.state(), RunState::Failed);
        assert_eq!(service.state(), RunState::Failed);
        assert!(matches!(service.last_failure(), Some(MetricsError::Fetch(_))));
        assert!(service.current().is_none());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let service = MetricsService::new(MetricsEngine::default());
        drop(service.subscribe());
        let live = service.subscribe();

        let outcome = service
            .recalculate(Subject::sprint("S1"), Ok(fixture()))
            .unwrap()
            .wait();
        assert_eq!(outcome.state(), RunState::Completed);
        assert!(live.try_recv().is_ok());
        assert_eq!(service.lock().subscribers.len(), 1);
    }
}

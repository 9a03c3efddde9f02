//! Background scheduling of collection and prediction cycles.
//!
//! Two independent tokio tasks:
//!
//! - **collection**: waits for the next clock-aligned boundary (e.g. the
//!   next quarter hour), then runs [`StationService::refresh_station_data`]
//!   on a fixed period aligned to that boundary.
//! - **prediction**: retries [`InferenceService::run_inference_with_results`]
//!   every check interval until it succeeds or the wait budget runs out,
//!   then runs it on a fixed period counted from the loop start.
//!
//! Neither loop ever fails the process. A slow or failing cycle in one loop
//! does not delay the other. Both observe one [`Shutdown`] signal while
//! waiting; a cycle already running is left to finish. Every finished cycle
//! is counted in [`crate::metrics`].

pub mod clock;
pub mod status;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::Instrument;

use crate::config::ScheduleConfig;
use crate::domain::{RunId, Shutdown, ShutdownListener};
use crate::metrics::{self, SUCCESS};
use crate::service::{
    InferenceError, InferenceService, InferenceSummary, RefreshError, RefreshSummary,
    StationService,
};

pub use clock::{Clock, SystemClock};
pub use status::{LoopState, Readiness, SchedulerStatus};

/// What started a cycle. Recorded on the cycle's tracing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The one-off collection at process start.
    Startup,
    /// A retry of the initial prediction wait.
    Initial,
    /// A regular timer tick.
    Scheduled,
    /// An API request.
    Manual,
}

impl Trigger {
    /// Lower-case name, as used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Initial => "initial",
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs one collection cycle inside a span carrying `run_id`, and logs
/// the outcome.
///
/// # Errors
///
/// Returns the cycle's [`RefreshError`] after logging it.
pub async fn collect(
    stations: &StationService,
    run_id: RunId,
    trigger: Trigger,
) -> Result<RefreshSummary, RefreshError> {
    let span = tracing::info_span!("collection", %run_id, %trigger);
    async {
        let started = Instant::now();
        let result = stations.refresh_station_data().await;
        let elapsed = started.elapsed();
        match &result {
            Ok(summary) => {
                metrics::record_skipped(summary.skipped);
                tracing::info!(
                    stations = summary.stations,
                    availabilities = summary.availabilities,
                    skipped = summary.skipped,
                    ?elapsed,
                    "collection completed"
                );
            }
            Err(e) => tracing::error!(stage = e.stage(), error = %e, "collection failed"),
        }
        let outcome = result.as_ref().map_or_else(RefreshError::stage, |_| SUCCESS);
        metrics::record_cycle("collection", trigger, outcome, elapsed);
        result
    }
    .instrument(span)
    .await
}

/// Runs one prediction cycle inside a span carrying `run_id`, logs the
/// outcome, and reports success to `status`.
///
/// # Errors
///
/// Returns the cycle's [`InferenceError`] after logging it.
pub async fn predict(
    inference: &InferenceService,
    status: &SchedulerStatus,
    run_id: RunId,
    trigger: Trigger,
) -> Result<InferenceSummary, InferenceError> {
    let span = tracing::info_span!("prediction", %run_id, %trigger);
    async {
        let started = Instant::now();
        let result = inference.run_inference_with_results().await;
        let elapsed = started.elapsed();
        match &result {
            Ok(summary) => {
                status.record_inference_success();
                tracing::info!(predictions = summary.predictions, "prediction completed");
            }
            // the initial wait expects failures while the service boots
            Err(e) if trigger == Trigger::Initial => {
                tracing::info!(stage = e.stage(), error = %e, "prediction service not ready yet");
            }
            Err(e) => tracing::error!(stage = e.stage(), error = %e, "prediction failed"),
        }
        metrics::record_cycle("prediction", trigger, prediction_outcome(&result), elapsed);
        result
    }
    .instrument(span)
    .await
}

/// Metric outcome of a prediction cycle. Contract violations are told apart
/// from an unreachable service.
fn prediction_outcome(result: &Result<InferenceSummary, InferenceError>) -> &'static str {
    match result {
        Ok(_) => SUCCESS,
        Err(InferenceError::Predict(e)) if e.is_contract_violation() => "contract",
        Err(e) => e.stage(),
    }
}

/// Owns the services the loops drive. Consumed by [`Scheduler::start`].
#[derive(Debug)]
pub struct Scheduler {
    config: ScheduleConfig,
    stations: Arc<StationService>,
    inference: Arc<InferenceService>,
    status: SchedulerStatus,
    clock: Arc<dyn Clock>,
    shutdown: Shutdown,
}

impl Scheduler {
    /// Creates a scheduler using the system clock.
    #[must_use]
    pub fn new(
        config: ScheduleConfig,
        stations: Arc<StationService>,
        inference: Arc<InferenceService>,
        status: SchedulerStatus,
    ) -> Self {
        Self {
            config,
            stations,
            inference,
            status,
            clock: Arc::new(SystemClock),
            shutdown: Shutdown::new(),
        }
    }

    /// Replaces the wall clock used for boundary alignment.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stops the loops on an externally owned signal, e.g. one the OS
    /// signal handler also triggers.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Spawns the loops (and the startup collection, if enabled) on the
    /// current tokio runtime.
    ///
    /// The startup collection only runs when collection is aligned; an
    /// unaligned loop already collects at once.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let shutdown = self.shutdown;
        let mut tasks = Vec::with_capacity(3);

        if self.config.refresh_on_startup && self.config.align_collection {
            let stations = Arc::clone(&self.stations);
            tasks.push((
                "startup-collection",
                tokio::spawn(async move {
                    let _ = collect(&stations, RunId::new(), Trigger::Startup).await;
                }),
            ));
        }

        let delay = if self.config.align_collection {
            let now = self.clock.now();
            let first_run_at = clock::next_boundary(now, self.config.collection_interval);
            tracing::info!(%first_run_at, "collection aligned to the wall clock");
            clock::until_next_boundary(now, self.config.collection_interval)
        } else {
            Duration::ZERO
        };
        tasks.push((
            "collection",
            tokio::spawn(collection_loop(
                Arc::clone(&self.stations),
                self.status.clone(),
                delay,
                self.config.collection_interval,
                shutdown.listener(),
            )),
        ));

        tasks.push((
            "prediction",
            tokio::spawn(prediction_loop(
                Arc::clone(&self.inference),
                self.status.clone(),
                self.config.clone(),
                shutdown.listener(),
            )),
        ));

        SchedulerHandle {
            shutdown,
            tasks,
            status: self.status,
        }
    }
}

/// Handle to the running loops.
///
/// Dropping the handle without calling [`SchedulerHandle::shutdown`] also
/// stops the loops at their next wait.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: Shutdown,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    status: SchedulerStatus,
}

impl SchedulerHandle {
    /// Loop states and readiness.
    #[must_use]
    pub fn status(&self) -> &SchedulerStatus {
        &self.status
    }

    /// Signals shutdown and joins every task, waiting at most `timeout` in
    /// total. Tasks still running after that are aborted.
    ///
    /// Returns the number of aborted tasks.
    pub async fn shutdown(self, timeout: Duration) -> usize {
        self.shutdown.trigger();
        let deadline = Instant::now() + timeout;
        let mut aborted = 0;

        for (name, mut task) in self.tasks {
            match time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => tracing::debug!(task = name, "task stopped"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "task ended abnormally"),
                Err(_) => {
                    tracing::warn!(task = name, ?timeout, "task did not stop in time, aborting");
                    task.abort();
                    aborted += 1;
                }
            }
        }

        aborted
    }
}

async fn collection_loop(
    stations: Arc<StationService>,
    status: SchedulerStatus,
    first_delay: Duration,
    period: Duration,
    mut shutdown: ShutdownListener,
) {
    tracing::info!(first_run_in = ?first_delay, ?period, "collection loop started");

    let mut ticker = time::interval_at(Instant::now() + first_delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        status.set_collection(LoopState::Waiting);
        tokio::select! {
            biased;
            () = shutdown.triggered() => break,
            _ = ticker.tick() => {}
        }

        status.set_collection(LoopState::Running);
        let _ = collect(&stations, RunId::new(), Trigger::Scheduled).await;
    }

    status.set_collection(LoopState::ShuttingDown);
    tracing::info!("collection loop stopped");
}

async fn prediction_loop(
    inference: Arc<InferenceService>,
    status: SchedulerStatus,
    config: ScheduleConfig,
    mut shutdown: ShutdownListener,
) {
    let started = Instant::now();
    let mut ticker = time::interval_at(started + config.prediction_interval, config.prediction_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        max_wait = ?config.prediction_max_wait,
        check_interval = ?config.prediction_check_interval,
        "waiting for prediction service"
    );

    let ready = loop {
        if started.elapsed() > config.prediction_max_wait {
            break false;
        }

        status.set_prediction(LoopState::Running);
        if predict(&inference, &status, RunId::new(), Trigger::Initial)
            .await
            .is_ok()
        {
            break true;
        }

        status.set_prediction(LoopState::Waiting);
        tokio::select! {
            biased;
            () = shutdown.triggered() => {
                status.set_prediction(LoopState::ShuttingDown);
                tracing::info!("prediction loop stopped during initial wait");
                return;
            }
            () = time::sleep(config.prediction_check_interval) => {}
        }
    };

    if ready {
        tracing::info!(elapsed = ?started.elapsed(), "initial predictions generated");
    } else {
        status.mark_degraded();
        tracing::warn!(
            max_wait = ?config.prediction_max_wait,
            "prediction service not ready in time, continuing on the regular interval"
        );
    }

    loop {
        status.set_prediction(LoopState::Waiting);
        tokio::select! {
            biased;
            () = shutdown.triggered() => break,
            _ = ticker.tick() => {}
        }

        status.set_prediction(LoopState::Running);
        let _ = predict(&inference, &status, RunId::new(), Trigger::Scheduled).await;
    }

    status.set_prediction(LoopState::ShuttingDown);
    tracing::info!("prediction loop stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::feed::FeedSnapshot;
    use crate::inference::{ContractViolation, PredictionError};
    use crate::persistence::PersistenceGateway;
    use crate::testing::{
        RecordingStore, Scripted, StubFeed, StubPredictionGateway, batch, raw_prediction,
        station_source, status_source,
    };

    #[derive(Debug)]
    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    const MINUTE: Duration = Duration::from_secs(60);

    fn good_batch() -> Scripted {
        Scripted::Batch(batch(vec![raw_prediction("1", "2023-01-01T12:00:00Z")], 1))
    }

    fn config() -> ScheduleConfig {
        ScheduleConfig {
            collection_interval: 15 * MINUTE,
            align_collection: true,
            refresh_on_startup: false,
            prediction_interval: 60 * MINUTE,
            prediction_max_wait: Duration::from_secs(30),
            prediction_check_interval: Duration::from_secs(10),
        }
    }

    struct Harness {
        feed: Arc<StubFeed>,
        gateway: Arc<StubPredictionGateway>,
        store: Arc<RecordingStore>,
        scheduler: Scheduler,
    }

    fn harness(config: ScheduleConfig, gateway: StubPredictionGateway) -> Harness {
        let feed = Arc::new(StubFeed::new(FeedSnapshot {
            stations: vec![station_source("1", "One")],
            statuses: vec![status_source("1", 3, 4)],
        }));
        let gateway = Arc::new(gateway);
        let store = Arc::new(RecordingStore::new());
        let store_dyn = Arc::clone(&store) as Arc<dyn PersistenceGateway>;

        let stations = Arc::new(StationService::new(
            Arc::clone(&feed) as Arc<dyn crate::feed::FeedSource>,
            Arc::clone(&store_dyn),
        ));
        let inference = Arc::new(InferenceService::new(
            Arc::clone(&gateway) as Arc<dyn crate::inference::PredictionGateway>,
            store_dyn,
        ));

        let Some(now) = Utc.with_ymd_and_hms(2024, 1, 1, 12, 7, 0).single() else {
            panic!("valid timestamp");
        };
        let scheduler = Scheduler::new(config, stations, inference, SchedulerStatus::new())
            .with_clock(Arc::new(FixedClock(now)));

        Harness {
            feed,
            gateway,
            store,
            scheduler,
        }
    }

    fn offsets(calls: &[Instant], start: Instant) -> Vec<Duration> {
        calls.iter().map(|t| t.duration_since(start)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn first_collection_waits_for_aligned_boundary() {
        let h = harness(config(), StubPredictionGateway::always(good_batch()));
        let start = Instant::now();
        let handle = h.scheduler.start();

        time::sleep(24 * MINUTE).await;

        // 12:07 -> first run at 12:15, then every quarter hour
        assert_eq!(
            offsets(&h.feed.calls().await, start),
            [8 * MINUTE, 23 * MINUTE]
        );
        assert_eq!(handle.shutdown(Duration::from_secs(1)).await, 0);
        assert_eq!(h.store.recorded().await.upserts.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unaligned_collection_runs_immediately() {
        let config = ScheduleConfig {
            align_collection: false,
            ..config()
        };
        let h = harness(config, StubPredictionGateway::always(good_batch()));
        let start = Instant::now();
        let handle = h.scheduler.start();

        time::sleep(16 * MINUTE).await;

        assert_eq!(
            offsets(&h.feed.calls().await, start),
            [Duration::ZERO, 15 * MINUTE]
        );
        let _ = handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn startup_collection_runs_before_first_boundary() {
        let config = ScheduleConfig {
            refresh_on_startup: true,
            ..config()
        };
        let h = harness(config, StubPredictionGateway::always(good_batch()));
        let start = Instant::now();
        let handle = h.scheduler.start();

        time::sleep(MINUTE).await;

        assert_eq!(offsets(&h.feed.calls().await, start), [Duration::ZERO]);
        let _ = handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn unaligned_startup_refresh_collects_once() {
        let config = ScheduleConfig {
            align_collection: false,
            refresh_on_startup: true,
            ..config()
        };
        let h = harness(config, StubPredictionGateway::always(good_batch()));
        let start = Instant::now();
        let handle = h.scheduler.start();

        time::sleep(16 * MINUTE).await;

        assert_eq!(
            offsets(&h.feed.calls().await, start),
            [Duration::ZERO, 15 * MINUTE]
        );
        assert_eq!(h.store.recorded().await.availability_inserts.len(), 2);
        assert_eq!(handle.shutdown(Duration::from_secs(1)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_wait_retries_until_success() {
        let gateway = StubPredictionGateway::new(
            vec![Scripted::Unavailable, Scripted::Unavailable],
            good_batch(),
        );
        let h = harness(config(), gateway);
        let start = Instant::now();
        let handle = h.scheduler.start();

        time::sleep(61 * MINUTE).await;

        let secs = Duration::from_secs;
        assert_eq!(
            offsets(&h.gateway.calls().await, start),
            [secs(0), secs(10), secs(20), 60 * MINUTE]
        );
        assert_eq!(handle.status().readiness(), Readiness::Ready);
        assert_eq!(h.store.recorded().await.prediction_inserts.len(), 2);
        let _ = handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_wait_degrades_without_stopping_the_loop() {
        let h = harness(config(), StubPredictionGateway::always(Scripted::Unavailable));
        let start = Instant::now();
        let handle = h.scheduler.start();

        time::sleep(Duration::from_secs(45)).await;

        let secs = Duration::from_secs;
        assert_eq!(
            offsets(&h.gateway.calls().await, start),
            [secs(0), secs(10), secs(20), secs(30)]
        );
        assert_eq!(handle.status().readiness(), Readiness::Degraded);
        assert_eq!(handle.status().prediction(), LoopState::Waiting);

        time::sleep(60 * MINUTE).await;
        assert_eq!(h.gateway.calls().await.len(), 5);
        assert_eq!(handle.status().readiness(), Readiness::Degraded);
        let _ = handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_both_loops() {
        let h = harness(config(), StubPredictionGateway::always(Scripted::Unavailable));
        let handle = h.scheduler.start();
        time::sleep(Duration::from_secs(5)).await;

        let status = handle.status().clone();
        assert_eq!(handle.shutdown(Duration::from_secs(1)).await, 0);

        assert_eq!(status.collection(), LoopState::ShuttingDown);
        assert_eq!(status.prediction(), LoopState::ShuttingDown);
        assert_eq!(status.readiness(), Readiness::Pending);
        assert!(h.feed.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn external_signal_stops_both_loops() {
        let h = harness(config(), StubPredictionGateway::always(Scripted::Unavailable));
        let shutdown = Shutdown::new();
        let handle = h.scheduler.with_shutdown(shutdown.clone()).start();
        time::sleep(Duration::from_secs(5)).await;

        shutdown.trigger();
        time::sleep(Duration::from_secs(1)).await;

        assert_eq!(handle.status().collection(), LoopState::ShuttingDown);
        assert_eq!(handle.status().prediction(), LoopState::ShuttingDown);
        assert_eq!(handle.shutdown(Duration::from_secs(1)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_prediction_does_not_delay_collection() {
        let h = harness(config(), StubPredictionGateway::always(Scripted::Hang));
        let start = Instant::now();
        let handle = h.scheduler.start();

        time::sleep(24 * MINUTE).await;

        assert_eq!(
            offsets(&h.feed.calls().await, start),
            [8 * MINUTE, 23 * MINUTE]
        );
        assert_eq!(h.gateway.calls().await.len(), 1);
        assert_eq!(handle.status().prediction(), LoopState::Running);
        // the stuck prediction cycle is the only task left to abort
        assert_eq!(handle.shutdown(Duration::from_secs(1)).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_collection_is_aborted_at_shutdown() {
        let mut h = harness(config(), StubPredictionGateway::always(good_batch()));
        let feed = Arc::new(StubFeed::hanging());
        h.scheduler.stations = Arc::new(StationService::new(
            Arc::clone(&feed) as Arc<dyn crate::feed::FeedSource>,
            Arc::clone(&h.store) as Arc<dyn PersistenceGateway>,
        ));
        let start = Instant::now();
        let handle = h.scheduler.start();

        time::sleep(9 * MINUTE).await;

        assert_eq!(offsets(&feed.calls().await, start), [8 * MINUTE]);
        assert_eq!(handle.status().collection(), LoopState::Running);
        assert_eq!(handle.status().readiness(), Readiness::Ready);

        let status = handle.status().clone();
        assert_eq!(handle.shutdown(Duration::from_secs(1)).await, 1);
        assert_eq!(status.prediction(), LoopState::ShuttingDown);
    }

    #[test]
    fn contract_violations_get_their_own_outcome() {
        let contract = InferenceError::Predict(PredictionError::from(
            ContractViolation::CountMismatch {
                declared: 5,
                actual: 1,
            },
        ));
        assert_eq!(prediction_outcome(&Err(contract)), "contract");

        let unavailable = InferenceError::Predict(PredictionError::Status {
            status: 503,
            body: String::new(),
        });
        assert_eq!(prediction_outcome(&Err(unavailable)), "predict");

        let ok = InferenceSummary {
            predictions: 1,
            substituted_times: 0,
        };
        assert_eq!(prediction_outcome(&Ok(ok)), SUCCESS);
    }

    #[tokio::test]
    async fn manual_prediction_marks_ready() {
        let h = harness(config(), StubPredictionGateway::always(good_batch()));
        let status = SchedulerStatus::new();
        let inference = Arc::clone(&h.scheduler.inference);

        let Ok(summary) = predict(&inference, &status, RunId::new(), Trigger::Manual).await else {
            panic!("prediction should succeed");
        };
        assert_eq!(summary.predictions, 1);
        assert_eq!(status.readiness(), Readiness::Ready);
    }
}

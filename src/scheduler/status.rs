//! Observable state of the background loops.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use utoipa::ToSchema;

/// Where a loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Idle until the next tick.
    Waiting,
    /// Executing a cycle.
    Running,
    /// Shutdown observed; the loop has exited or is about to.
    ShuttingDown,
}

/// Whether the prediction side has produced results yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// The initial wait for the prediction service is still running.
    Pending,
    /// At least one prediction run succeeded.
    Ready,
    /// The initial wait ran out without a successful run.
    Degraded,
}

#[derive(Debug)]
struct Channels {
    collection: watch::Sender<LoopState>,
    prediction: watch::Sender<LoopState>,
    readiness: watch::Sender<Readiness>,
}

/// Shared, cloneable view of both loops and the prediction readiness.
///
/// The loops write to it; the API reads from it. A manual inference run
/// also reports its success here.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    channels: Arc<Channels>,
}

impl SchedulerStatus {
    /// Both loops waiting, readiness pending.
    #[must_use]
    pub fn new() -> Self {
        let (collection, _) = watch::channel(LoopState::Waiting);
        let (prediction, _) = watch::channel(LoopState::Waiting);
        let (readiness, _) = watch::channel(Readiness::Pending);
        Self {
            channels: Arc::new(Channels {
                collection,
                prediction,
                readiness,
            }),
        }
    }

    /// Current state of the collection loop.
    #[must_use]
    pub fn collection(&self) -> LoopState {
        *self.channels.collection.borrow()
    }

    /// Current state of the prediction loop.
    #[must_use]
    pub fn prediction(&self) -> LoopState {
        *self.channels.prediction.borrow()
    }

    /// Current prediction readiness.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        *self.channels.readiness.borrow()
    }

    /// Records a successful prediction run, scheduled or manual.
    pub fn record_inference_success(&self) {
        self.channels.readiness.send_if_modified(|r| {
            let changed = *r != Readiness::Ready;
            *r = Readiness::Ready;
            changed
        });
    }

    /// Marks the initial wait as exhausted. No effect once ready.
    pub(crate) fn mark_degraded(&self) {
        self.channels.readiness.send_if_modified(|r| {
            if *r == Readiness::Pending {
                *r = Readiness::Degraded;
                return true;
            }
            false
        });
    }

    pub(crate) fn set_collection(&self, state: LoopState) {
        self.channels.collection.send_replace(state);
    }

    pub(crate) fn set_prediction(&self, state: LoopState) {
        self.channels.prediction.send_replace(state);
    }
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self::new()
    }
}

//! Progress reporting and cancellation for a detection run
//!

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, TryLockError};

use serde::Serialize;

/// Coarse state of a detection run
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DetectionStage {
    Init,
    ComputingClusters,
    ComputingStatistics,
    Done,
}

impl DetectionStage {
    /// Percent range covered by this stage
    fn percent_range(&self) -> (u32, u32) {
        match self {
            Self::Init => (0, 0),
            Self::ComputingClusters => (0, 80),
            Self::ComputingStatistics => (80, 99),
            Self::Done => (100, 100),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub percent: u32,
    pub stage: DetectionStage,
}

/// Caller-triggerable cancellation flag shared with the search workers
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct ProgressState {
    stage: DetectionStage,
    last_percent: u32,
    tx: Option<Sender<ProgressEvent>>,
}

impl ProgressState {
    fn emit(&mut self, percent: u32) {
        let percent = percent.max(self.last_percent);
        self.last_percent = percent;
        let event = ProgressEvent {
            percent,
            stage: self.stage,
        };
        // A closed receiver just means nobody listens anymore
        let is_closed = self.tx.as_ref().is_some_and(|tx| tx.send(event).is_err());
        if is_closed {
            self.tx = None;
        }
    }
}

/// Progress event source shared by all workers of a run
///
/// Percent values never decrease. Updates within a stage are skipped when another worker is
/// currently reporting, so workers never wait on the progress consumer.
///
pub struct ProgressSink {
    state: Mutex<ProgressState>,
}

impl ProgressSink {
    pub fn new(tx: Option<Sender<ProgressEvent>>) -> Self {
        Self {
            state: Mutex::new(ProgressState {
                stage: DetectionStage::Init,
                last_percent: 0,
                tx,
            }),
        }
    }

    /// Sink that drops every event
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Move to a new stage, always reported
    pub fn set_stage(&self, stage: DetectionStage) {
        let mut state = match self.state.lock() {
            Ok(x) => x,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.stage = stage;
        state.emit(stage.percent_range().0);
    }

    /// Report the completed fraction of the current stage
    ///
    /// Skipped when the sink is busy, or if the percent value would not change.
    ///
    pub fn update(&self, fraction: f64) {
        let mut state = match self.state.try_lock() {
            Ok(x) => x,
            Err(TryLockError::WouldBlock) => return,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let (start, end) = state.stage.percent_range();
        let percent = start + ((end - start) as f64 * fraction.clamp(0.0, 1.0)) as u32;
        if percent > state.last_percent {
            state.emit(percent);
        }
    }

    pub fn stage(&self) -> DetectionStage {
        match self.state.lock() {
            Ok(x) => x.stage,
            Err(poisoned) => poisoned.into_inner().stage,
        }
    }
}

//! Detection run as a cancellable background task
//!

use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use std::thread::JoinHandle;

use crate::breakpoint_distance::GenomeGrouping;
use crate::cluster_search::{DetectionOptions, DetectionOutcome, detect_clusters_with_options};
use crate::errors::{DetectionError, DetectionResult};
use crate::genome::DataSet;
use crate::parameter::Parameter;
use crate::progress::{CancellationToken, ProgressEvent, ProgressSink};
use crate::significance::WindowBinomialModel;

/// One detection run, configured before it is started
pub struct DetectionTask {
    dataset: Arc<DataSet>,
    parameter: Parameter,
    grouping: Option<GenomeGrouping>,
    debug: bool,
}

impl DetectionTask {
    pub fn new(dataset: Arc<DataSet>, parameter: Parameter) -> Self {
        Self {
            dataset,
            parameter,
            grouping: None,
            debug: false,
        }
    }

    /// Use a caller supplied genome grouping instead of breakpoint distance grouping
    pub fn with_grouping(mut self, grouping: GenomeGrouping) -> Self {
        self.grouping = Some(grouping);
        self
    }

    /// Print candidate cluster details to stderr during the search
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Start the run on its own thread
    pub fn start(self) -> DetectionHandle {
        let cancel = CancellationToken::new();
        let (tx, progress_rx) = channel();

        let task_cancel = cancel.clone();
        let thread = std::thread::spawn(move || {
            let progress = ProgressSink::new(Some(tx));
            let options = DetectionOptions {
                grouping: self.grouping,
                model: &WindowBinomialModel,
                progress: &progress,
                cancel: &task_cancel,
                debug: self.debug,
            };
            detect_clusters_with_options(&self.dataset, &self.parameter, options)
        });

        DetectionHandle {
            cancel,
            progress_rx,
            thread,
        }
    }
}

/// Control over a started detection run
pub struct DetectionHandle {
    cancel: CancellationToken,
    progress_rx: Receiver<ProgressEvent>,
    thread: JoinHandle<DetectionResult<DetectionOutcome>>,
}

impl DetectionHandle {
    /// Request cancellation, the run stops at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Progress events of the run, the stream ends when the run is finished
    pub fn progress(&self) -> &Receiver<ProgressEvent> {
        &self.progress_rx
    }

    /// Wait for the run to finish
    pub fn result(self) -> DetectionResult<DetectionOutcome> {
        match self.thread.join() {
            Ok(x) => x,
            Err(_) => Err(DetectionError::Internal(
                "Detection thread panicked".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;
    use crate::parameter::ParameterSettings;
    use crate::progress::DetectionStage;

    fn get_parameter() -> Parameter {
        let settings = ParameterSettings {
            max_distance: Some(0),
            thread_count: 1,
            ..Default::default()
        };
        Parameter::from_settings(&settings).unwrap()
    }

    #[test]
    fn test_completed_task() {
        let dataset = DataSet::new(vec![
            Genome::from_gene_lists("a", &[&[1, 2, 3, 4]]),
            Genome::from_gene_lists("b", &[&[5, 1, 2, 3]]),
        ]);
        let handle = DetectionTask::new(Arc::new(dataset), get_parameter()).start();
        let events = handle.progress().iter().collect::<Vec<_>>();
        let outcome = handle.result().unwrap();

        assert_eq!(outcome.clusters().unwrap().len(), 1);
        let last = events.last().unwrap();
        assert_eq!(last.stage, DetectionStage::Done);
        assert_eq!(last.percent, 100);
        assert!(events.windows(2).all(|x| x[0].percent <= x[1].percent));
    }

    #[test]
    fn test_cancelled_task() {
        // Identical genomes make every window a cluster, far more work than the cancel latency
        let genes = (1..=600).collect::<Vec<i32>>();
        let dataset = DataSet::new(vec![
            Genome::from_gene_lists("a", &[&genes]),
            Genome::from_gene_lists("b", &[&genes]),
        ]);
        let handle = DetectionTask::new(Arc::new(dataset), get_parameter()).start();
        handle.cancel();
        assert!(handle.result().unwrap().is_cancelled());
    }
}

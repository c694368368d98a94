//! Caller-owned state of an interactive detection workflow
//!

use std::sync::Arc;

use log::info;

use crate::breakpoint_distance::GenomeGrouping;
use crate::cluster_search::DetectionOutcome;
use crate::detection_task::{DetectionHandle, DetectionTask};
use crate::errors::DetectionResult;
use crate::genome::DataSet;
use crate::parameter::Parameter;
use crate::reference_cluster::ReferenceCluster;
use crate::run_stats::RunStats;

/// A loaded dataset together with the parameters and clusters of the last completed run
///
pub struct Session {
    dataset: Arc<DataSet>,
    parameter: Option<Parameter>,
    clusters: Vec<ReferenceCluster>,
}

impl Session {
    pub fn new(dataset: DataSet) -> Self {
        Self {
            dataset: Arc::new(dataset),
            parameter: None,
            clusters: Vec::new(),
        }
    }

    pub fn dataset(&self) -> &DataSet {
        &self.dataset
    }

    /// Parameters of the last completed run
    pub fn parameter(&self) -> Option<&Parameter> {
        self.parameter.as_ref()
    }

    pub fn clusters(&self) -> &[ReferenceCluster] {
        &self.clusters
    }

    /// Start a detection run on the session's dataset without changing the session
    pub fn start_detection(
        &self,
        parameter: Parameter,
        grouping: Option<GenomeGrouping>,
    ) -> DetectionHandle {
        let task = DetectionTask::new(self.dataset.clone(), parameter);
        match grouping {
            Some(grouping) => task.with_grouping(grouping),
            None => task,
        }
        .start()
    }

    /// Store the outcome of a finished run
    ///
    /// A cancelled run clears the clusters of any earlier run. Returns the run statistics of a
    /// completed run.
    ///
    pub fn apply_outcome(
        &mut self,
        parameter: Parameter,
        outcome: DetectionOutcome,
    ) -> Option<RunStats> {
        match outcome {
            DetectionOutcome::Completed {
                clusters,
                run_stats,
            } => {
                self.parameter = Some(parameter);
                self.clusters = clusters;
                Some(run_stats)
            }
            DetectionOutcome::Cancelled => {
                info!("Detection cancelled, clearing session clusters");
                self.parameter = None;
                self.clusters.clear();
                None
            }
        }
    }

    /// Run a detection to completion and store its outcome
    pub fn detect(
        &mut self,
        parameter: Parameter,
        grouping: Option<GenomeGrouping>,
    ) -> DetectionResult<Option<RunStats>> {
        let outcome = self.start_detection(parameter.clone(), grouping).result()?;
        Ok(self.apply_outcome(parameter, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;
    use crate::parameter::ParameterSettings;

    #[test]
    fn test_session_detect() {
        let dataset = DataSet::new(vec![
            Genome::from_gene_lists("a", &[&[1, 2, 3, 4]]),
            Genome::from_gene_lists("b", &[&[1, 2, 3, 5]]),
        ]);
        let mut session = Session::new(dataset);
        let settings = ParameterSettings {
            max_distance: Some(0),
            ..Default::default()
        };
        let parameter = Parameter::from_settings(&settings).unwrap();

        let run_stats = session.detect(parameter.clone(), None).unwrap().unwrap();
        assert_eq!(run_stats.cluster_count, 1);
        assert_eq!(session.clusters().len(), 1);
        assert_eq!(session.parameter(), Some(&parameter));

        assert!(
            session
                .apply_outcome(parameter, DetectionOutcome::Cancelled)
                .is_none()
        );
        assert!(session.clusters().is_empty());
    }
}

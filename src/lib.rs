//! Detection of conserved gene clusters across genomes
//!
//! Genomes are sequences of gene family ids. Each window of a reference genome is treated as a
//! candidate cluster and located approximately in all other genomes. Candidates found in enough
//! genome groups are reported as reference clusters and ranked by a significance score.
//!

mod log_utils;

pub mod breakpoint_distance;
pub mod cluster_search;
pub mod delta_location;
pub mod detection_task;
pub mod errors;
pub mod genome;
pub mod globals;
pub mod int_range;
pub mod memory_reduction;
pub mod num_table;
pub mod parameter;
pub mod prob_utils;
pub mod progress;
pub mod reference_cluster;
pub mod run_stats;
pub mod search_genome;
pub mod session;
pub mod significance;

pub use crate::breakpoint_distance::GenomeGrouping;
pub use crate::cluster_search::{
    DetectionOptions, DetectionOutcome, detect_clusters, detect_clusters_with_options,
};
pub use crate::detection_task::{DetectionHandle, DetectionTask};
pub use crate::errors::{DetectionError, DetectionResult, ParameterError};
pub use crate::genome::{Chromosome, DataSet, Genome};
pub use crate::parameter::{Parameter, ParameterSettings};
pub use crate::progress::{CancellationToken, DetectionStage, ProgressEvent, ProgressSink};
pub use crate::reference_cluster::ReferenceCluster;
pub use crate::session::Session;

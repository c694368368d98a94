//! Reference cluster detection over a whole dataset
//!
//! Every window of every anchor genome is a candidate gene set. Candidates are located in all
//! other genomes, accepted when enough genome groups are covered, merged into one deduplicated
//! list and finally scored.
//!

mod anchor_search;
mod merge_clusters;

use std::sync::atomic::AtomicUsize;
use std::sync::mpsc::channel;
use std::time::Instant;

use log::info;
use thousands::Separable;

use self::anchor_search::{AnchorSearchContext, search_anchor_genome};
use self::merge_clusters::merge_anchor_clusters;
use crate::breakpoint_distance::{GenomeGrouping, group_genomes};
use crate::delta_location::rank_delta_locations;
use crate::errors::{DetectionError, DetectionResult};
use crate::genome::DataSet;
use crate::memory_reduction::FamilyMapping;
use crate::parameter::Parameter;
use crate::progress::{CancellationToken, DetectionStage, ProgressSink};
use crate::reference_cluster::ReferenceCluster;
use crate::run_stats::RunStats;
use crate::search_genome::encode_genomes;
use crate::significance::{SignificanceModel, WindowBinomialModel, compute_cluster_statistics};

/// Result of a detection run that was not rejected
#[derive(Debug)]
pub enum DetectionOutcome {
    Completed {
        clusters: Vec<ReferenceCluster>,
        run_stats: RunStats,
    },

    /// The run was cancelled, no partial results are kept
    Cancelled,
}

impl DetectionOutcome {
    pub fn clusters(&self) -> Option<&[ReferenceCluster]> {
        match self {
            Self::Completed { clusters, .. } => Some(clusters),
            Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Optional inputs of a detection run
pub struct DetectionOptions<'a> {
    /// Replaces the grouping computed from breakpoint distances
    pub grouping: Option<GenomeGrouping>,

    pub model: &'a dyn SignificanceModel,
    pub progress: &'a ProgressSink,
    pub cancel: &'a CancellationToken,

    /// Print candidate debug messages directly to stderr
    pub debug: bool,
}

fn get_grouping(
    dataset: &DataSet,
    parameter: &Parameter,
    grouping: Option<GenomeGrouping>,
) -> DetectionResult<GenomeGrouping> {
    match grouping {
        Some(grouping) => {
            if grouping.genome_count() != dataset.genome_count() {
                return Err(DetectionError::configuration(
                    "genome_grouping",
                    grouping.genome_count(),
                    &format!(
                        "grouping covers a different number of genomes than the {} input genomes",
                        dataset.genome_count()
                    ),
                ));
            }
            Ok(grouping)
        }
        None => group_genomes(
            &dataset.genomes,
            parameter.grouping_factor,
            parameter.signed_grouping,
        ),
    }
}

/// Search every anchor genome on the worker pool
///
/// Returns the cluster lists in anchor order, or None if the run was cancelled.
///
fn search_all_anchors(
    context: &AnchorSearchContext,
    anchors: &[usize],
    thread_count: usize,
) -> DetectionResult<Option<Vec<Vec<ReferenceCluster>>>> {
    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|x| DetectionError::Internal(format!("Unable to start worker pool: {x}")))?;

    let (tx, rx) = channel();
    worker_pool.scope(move |scope| {
        for (anchor_index, &anchor) in anchors.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let clusters = search_anchor_genome(context, anchor);
                tx.send((anchor_index, clusters)).unwrap();
            });
        }
    });

    let mut anchor_clusters = rx.into_iter().collect::<Vec<_>>();
    anchor_clusters.sort_by_key(|x| x.0);
    Ok(anchor_clusters
        .into_iter()
        .map(|(_, clusters)| clusters)
        .collect())
}

/// Run the full cluster detection with the default significance model
///
pub fn detect_clusters(
    dataset: &DataSet,
    parameter: &Parameter,
    grouping: Option<GenomeGrouping>,
    progress: &ProgressSink,
    cancel: &CancellationToken,
) -> DetectionResult<DetectionOutcome> {
    let options = DetectionOptions {
        grouping,
        model: &WindowBinomialModel,
        progress,
        cancel,
        debug: false,
    };
    detect_clusters_with_options(dataset, parameter, options)
}

/// Run the full cluster detection
///
/// Parameters are checked against the dataset before any search starts. Clusters are returned
/// with ids assigned in output order, and the output is identical for identical input regardless
/// of the thread count.
///
pub fn detect_clusters_with_options(
    dataset: &DataSet,
    parameter: &Parameter,
    options: DetectionOptions,
) -> DetectionResult<DetectionOutcome> {
    let progress = options.progress;
    progress.set_stage(DetectionStage::Init);

    let anchors = parameter.resolve_anchors(dataset)?;
    let grouping = get_grouping(dataset, parameter, options.grouping)?;
    let quorum = parameter.get_quorum(grouping.group_count());

    let mapping = FamilyMapping::new(dataset, parameter.memory_reduction);
    let family_count = dataset.gene_families().len();
    if mapping.is_reduced() {
        info!(
            "Reduced gene family alphabet from {} to {} families shared by at least two genes",
            family_count.separate_with_commas(),
            mapping.alphabet_size().separate_with_commas()
        );
    }
    let search_genomes = encode_genomes(dataset, &mapping, parameter.max_budget().insertions);

    info!(
        "Searching clusters anchored in {} of {} genomes, quorum {quorum} of {} genome groups",
        anchors.len(),
        dataset.genome_count(),
        grouping.group_count()
    );
    progress.set_stage(DetectionStage::ComputingClusters);
    let search_start = Instant::now();

    let completed_borders = AtomicUsize::new(0);
    let context = AnchorSearchContext {
        dataset,
        search_genomes: &search_genomes,
        grouping: &grouping,
        parameter,
        quorum,
        cancel: options.cancel,
        progress,
        completed_borders: &completed_borders,
        total_borders: anchors
            .iter()
            .flat_map(|x| search_genomes[*x].chromosomes.iter())
            .map(|x| x.len())
            .sum(),
        debug: options.debug,
    };

    let anchor_clusters = match search_all_anchors(&context, &anchors, parameter.thread_count)? {
        Some(x) if !options.cancel.is_cancelled() => x,
        _ => {
            info!("Cluster detection cancelled");
            return Ok(DetectionOutcome::Cancelled);
        }
    };
    let candidate_cluster_count = anchor_clusters.iter().map(|x| x.len()).sum::<usize>();
    let mut clusters = merge_anchor_clusters(anchor_clusters);
    for cluster in clusters.iter_mut() {
        for locations in cluster.delta_locations.iter_mut() {
            rank_delta_locations(locations, parameter.strict_occurrences);
        }
    }
    let search_time = search_start.elapsed();
    info!(
        "Found {} clusters from {} candidates",
        clusters.len().separate_with_commas(),
        candidate_cluster_count.separate_with_commas()
    );

    let statistics_start = Instant::now();
    if parameter.compute_statistics {
        progress.set_stage(DetectionStage::ComputingStatistics);
        compute_cluster_statistics(
            &mut clusters,
            dataset,
            &grouping,
            &anchors,
            options.model,
            parameter.correction,
        );
        if options.cancel.is_cancelled() {
            info!("Cluster detection cancelled");
            return Ok(DetectionOutcome::Cancelled);
        }
    }
    let statistics_time = statistics_start.elapsed();

    for (id, cluster) in clusters.iter_mut().enumerate() {
        cluster.id = id;
        cluster.check_invariants(quorum, parameter.min_cluster_size)?;
    }
    progress.set_stage(DetectionStage::Done);

    let run_stats = RunStats {
        genome_count: dataset.genome_count(),
        genome_group_count: grouping.group_count(),
        anchor_genome_count: anchors.len(),
        family_count,
        search_alphabet_size: mapping.alphabet_size(),
        candidate_cluster_count,
        cluster_count: clusters.len(),
        search_time_secs: search_time.as_secs_f64(),
        statistics_time_secs: statistics_time.as_secs_f64(),
    };

    Ok(DetectionOutcome::Completed {
        clusters,
        run_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;
    use crate::int_range::IntRange;
    use crate::parameter::ParameterSettings;

    fn get_dataset(gene_lists: &[&[i32]]) -> DataSet {
        DataSet::new(
            gene_lists
                .iter()
                .enumerate()
                .map(|(i, x)| Genome::from_gene_lists(&format!("genome{i}"), &[x]))
                .collect(),
        )
    }

    fn get_parameter(max_distance: usize, min_covered_genomes: usize) -> Parameter {
        let settings = ParameterSettings {
            max_distance: Some(max_distance),
            min_cluster_size: Some(3),
            min_covered_genomes,
            thread_count: 2,
            ..Default::default()
        };
        Parameter::from_settings(&settings).unwrap()
    }

    fn run(dataset: &DataSet, parameter: &Parameter) -> Vec<ReferenceCluster> {
        let outcome = detect_clusters(
            dataset,
            parameter,
            None,
            &ProgressSink::disabled(),
            &CancellationToken::new(),
        )
        .unwrap();
        outcome.clusters().unwrap().to_vec()
    }

    fn get_quorum_dataset() -> DataSet {
        get_dataset(&[
            &[1, 2, 3, 10],
            &[11, 1, 2, 3],
            &[1, 2, 3, 12],
            &[13, 1, 2, 3],
            &[1, 14, 2, 15, 3],
        ])
    }

    #[test]
    fn test_quorum() {
        let dataset = get_quorum_dataset();
        let clusters = run(&dataset, &get_parameter(0, 4));
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.covered_genomes, 4);
        assert_eq!(cluster.gene_content, vec![1, 2, 3]);
        assert_eq!(cluster.reference_genome, 0);
        assert_eq!(cluster.reference_range, IntRange::from_pair(0, 3));
        assert_eq!(cluster.delta_locations[1][0].range, IntRange::from_pair(1, 4));
        assert!(cluster.delta_locations[4].is_empty());
        assert_eq!(cluster.min_distances[4], None);

        let clusters = run(&dataset, &get_parameter(0, 5));
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_two_genome_cluster() {
        let dataset = get_dataset(&[&[1, 2, 5, 3], &[1, 2, 5, 4]]);
        let clusters = run(&dataset, &get_parameter(0, 2));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].gene_content, vec![1, 2, 5]);
        assert_eq!(clusters[0].reference_range, IntRange::from_pair(0, 3));
        assert_eq!(clusters[0].max_distance, 0);
        assert!(clusters[0].best_combined_p_value_corrected >= clusters[0].best_combined_p_value);
    }

    #[test]
    fn test_cluster_with_distance() {
        let dataset = get_dataset(&[&[1, 2, 3, 4], &[1, 2, 6, 3, 4], &[4, 3, 2, 1]]);
        let clusters = run(&dataset, &get_parameter(1, 0));

        // The window with the inserted gene is an exact match only from the second genome
        assert_eq!(clusters.len(), 2);
        let cluster = &clusters[0];
        assert_eq!(cluster.content_key(), vec![1, 2, 3, 4]);
        assert_eq!(cluster.reference_genome, 0);
        assert_eq!(cluster.min_distances, vec![Some(0), Some(1), Some(0)]);
        assert_eq!(cluster.max_distance, 1);
        assert_eq!(cluster.covered_genome_groups, 3);
        assert_eq!(cluster.delta_locations[1][0].range, IntRange::from_pair(0, 5));

        let cluster = &clusters[1];
        assert_eq!(cluster.gene_content, vec![1, 2, 6, 3, 4]);
        assert_eq!(cluster.reference_genome, 1);
        assert_eq!(cluster.min_distances, vec![Some(1), Some(0), Some(1)]);
    }

    #[test]
    fn test_repeats_in_reference_genome() {
        let dataset = get_dataset(&[&[1, 2, 3, 9, 1, 2, 3], &[1, 2, 3, 8]]);
        let mut parameter = get_parameter(0, 2);
        let clusters = run(&dataset, &parameter);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].delta_locations[0].len(), 1);

        parameter.ref_in_ref = true;
        let clusters = run(&dataset, &parameter);
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.reference_genome, 0);
        assert_eq!(cluster.reference_range, IntRange::from_pair(0, 3));
        assert_eq!(cluster.covered_genomes, 2);
        assert_eq!(cluster.min_distances, vec![Some(0), Some(0)]);
        let mut ranges = cluster.delta_locations[0]
            .iter()
            .map(|x| x.range)
            .collect::<Vec<_>>();
        ranges.sort();
        assert_eq!(
            ranges,
            vec![IntRange::from_pair(0, 3), IntRange::from_pair(4, 7)]
        );
    }

    #[test]
    fn test_genome_grouping_quorum() {
        let dataset = get_dataset(&[&[1, 2, 3, 7, 8], &[1, 2, 3, 7, 8], &[9, 1, 2, 3]]);
        let grouping = GenomeGrouping::from_groups(vec![vec![0, 1], vec![2]], 3).unwrap();
        let outcome = detect_clusters(
            &dataset,
            &get_parameter(0, 3),
            Some(grouping.clone()),
            &ProgressSink::disabled(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(outcome.clusters().unwrap().is_empty());

        let outcome = detect_clusters(
            &dataset,
            &get_parameter(0, 2),
            Some(grouping),
            &ProgressSink::disabled(),
            &CancellationToken::new(),
        )
        .unwrap();
        let clusters = outcome.clusters().unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].content_key(), vec![1, 2, 3]);
        assert_eq!(clusters[0].covered_genomes, 3);
        assert_eq!(clusters[0].covered_genome_groups, 2);
    }

    #[test]
    fn test_memory_reduction_invariance() {
        let dataset = get_dataset(&[
            &[1, 20, 2, 3, 21, 22, 4, 5, 6],
            &[1, 2, 23, 3, 0, 4, 5, 6],
            &[24, 1, 2, 3, 6, 5, 4, 25],
        ]);
        let mut settings = ParameterSettings {
            max_distance: Some(1),
            thread_count: 1,
            ..Default::default()
        };
        let reduced = run(&dataset, &Parameter::from_settings(&settings).unwrap());
        settings.memory_reduction = false;
        let unreduced = run(&dataset, &Parameter::from_settings(&settings).unwrap());
        assert!(!reduced.is_empty());
        assert_eq!(reduced, unreduced);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let dataset = get_quorum_dataset();
        let parameter = get_parameter(1, 3);
        let first = run(&dataset, &parameter);

        let mut single_thread = parameter.clone();
        single_thread.thread_count = 1;
        assert_eq!(first, run(&dataset, &single_thread));
        assert_eq!(first, run(&dataset, &parameter));
        for (id, cluster) in first.iter().enumerate() {
            assert_eq!(cluster.id, id);
        }
    }

    #[test]
    fn test_disabled_statistics() {
        let dataset = get_quorum_dataset();
        let mut parameter = get_parameter(0, 4);
        parameter.compute_statistics = false;
        let clusters = run(&dataset, &parameter);
        assert_eq!(clusters[0].best_combined_p_value, 1.0);
        assert_eq!(clusters[0].best_combined_p_value_corrected, 1.0);
    }

    #[test]
    fn test_cancelled_run() {
        let dataset = get_quorum_dataset();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = detect_clusters(
            &dataset,
            &get_parameter(0, 4),
            None,
            &ProgressSink::disabled(),
            &cancel,
        )
        .unwrap();
        assert!(outcome.is_cancelled());
    }

    #[test]
    fn test_infeasible_quorum() {
        let dataset = get_quorum_dataset();
        let result = detect_clusters(
            &dataset,
            &get_parameter(0, 6),
            None,
            &ProgressSink::disabled(),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(DetectionError::InfeasibleParameter(_))));
    }
}

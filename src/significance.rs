//! Statistical ranking of the detected clusters
//!
//! Each cluster location gets a p-value from a [SignificanceModel]. The best value of each genome
//! group is combined into one cluster p-value given the number of covered groups, and a
//! multiple-testing correction is applied over all clusters of the run.
//!

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Binomial, DiscreteCDF};

use crate::breakpoint_distance::GenomeGrouping;
use crate::genome::{DataSet, FamilyId, Genome};
use crate::prob_utils::{get_any_success_prob, get_poisson_binomial_tail};
use crate::reference_cluster::ReferenceCluster;

/// Gene family composition of one genome, the input of the null model
pub struct GenomeComposition {
    pub gene_count: usize,
    pub longest_chromosome: usize,
    family_counts: HashMap<FamilyId, usize>,
}

impl GenomeComposition {
    pub fn new(genome: &Genome) -> Self {
        let mut family_counts = HashMap::new();
        for gene in genome.chromosomes.iter().flat_map(|x| x.genes.iter()) {
            if *gene != 0 {
                *family_counts.entry(gene.unsigned_abs()).or_insert(0) += 1;
            }
        }
        Self {
            gene_count: genome.total_gene_count(),
            longest_chromosome: genome.chromosomes.iter().map(|x| x.len()).max().unwrap_or(0),
            family_counts,
        }
    }

    pub fn family_count(&self, family: FamilyId) -> usize {
        self.family_counts.get(&family).copied().unwrap_or(0)
    }
}

/// Null model giving the chance of finding a cluster occurrence in a random genome
///
/// Implementations must return values in `[0, 1]` that never increase with match quality: a
/// lower distance for the same gene content, or a larger gene content at the same distance, gets
/// an equal or lower value. Coverage of more genome groups is accounted for when the location
/// values are combined.
///
pub trait SignificanceModel: Sync {
    fn location_p_value(
        &self,
        composition: &GenomeComposition,
        gene_content: &[FamilyId],
        distance: usize,
    ) -> f64;
}

/// Number of genes around a random genome position searched for each cluster gene
pub const NEIGHBORHOOD_SIZE: usize = 20;

/// Default null model based on random gene order
///
/// Each gene copy of the cluster contributes the binomial chance that a random neighborhood of
/// [NEIGHBORHOOD_SIZE] genes holds at least that many copies of its family, given the genome-wide
/// family frequency. A location at distance `d` may miss any `d` genes, so the `d` least likely
/// factors are left out of the product. The p-value is the chance that at least one genome
/// position qualifies.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowBinomialModel;

impl WindowBinomialModel {
    fn gene_factor(
        composition: &GenomeComposition,
        family: FamilyId,
        copy: usize,
        neighborhood: u64,
    ) -> f64 {
        let family_freq =
            (composition.family_count(family) as f64 / composition.gene_count as f64).min(1.0);
        match Binomial::new(family_freq, neighborhood) {
            Ok(x) => x.sf(copy as u64 - 1).clamp(0.0, 1.0),
            Err(_) => 1.0,
        }
    }
}

impl SignificanceModel for WindowBinomialModel {
    fn location_p_value(
        &self,
        composition: &GenomeComposition,
        gene_content: &[FamilyId],
        distance: usize,
    ) -> f64 {
        if distance >= gene_content.len() {
            return 1.0;
        }
        if composition.gene_count == 0 {
            return 0.0;
        }
        let neighborhood = NEIGHBORHOOD_SIZE.min(composition.longest_chromosome).max(1) as u64;

        let mut copies = HashMap::new();
        let mut factors = gene_content
            .iter()
            .map(|family| {
                let copy = copies.entry(*family).or_insert(0);
                *copy += 1;
                Self::gene_factor(composition, *family, *copy, neighborhood)
            })
            .collect::<Vec<_>>();
        factors.sort_by(f64::total_cmp);

        let window_prob = factors.iter().skip(distance).product::<f64>();
        get_any_success_prob(window_prob, composition.gene_count as f64).clamp(0.0, 1.0)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    Deserialize,
    Serialize,
    clap::ValueEnum,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MultipleTestingCorrection {
    /// Step-up false discovery rate correction over the tested intervals
    #[default]
    BenjaminiHochberg,

    /// Family-wise correction over the tested intervals
    Bonferroni,
}

/// Number of windows examined by the search, used as the number of tests
///
/// Every interval of every anchor genome counts once.
///
pub fn get_tested_interval_count(dataset: &DataSet, anchors: &[usize]) -> f64 {
    anchors
        .iter()
        .map(|x| {
            let n = dataset.genomes[*x].total_gene_count() as f64;
            n * (n + 1.0) / 2.0
        })
        .sum()
}

/// Correct p-values for multiple testing
///
/// Corrected values are always within `[raw, 1]`.
///
pub fn correct_p_values(
    raw_p_values: &[f64],
    tested_count: f64,
    correction: MultipleTestingCorrection,
) -> Vec<f64> {
    let tested_count = tested_count.max(1.0);
    let mut corrected = vec![0.0; raw_p_values.len()];
    match correction {
        MultipleTestingCorrection::Bonferroni => {
            for (c, raw) in corrected.iter_mut().zip(raw_p_values) {
                *c = raw * tested_count;
            }
        }
        MultipleTestingCorrection::BenjaminiHochberg => {
            let mut order = (0..raw_p_values.len()).collect::<Vec<_>>();
            order.sort_by(|a, b| raw_p_values[*a].total_cmp(&raw_p_values[*b]));
            let mut last_value = 0.0f64;
            for (rank_index, index) in order.into_iter().enumerate() {
                let value = raw_p_values[index] * tested_count / (rank_index + 1) as f64;
                last_value = last_value.max(value);
                corrected[index] = last_value;
            }
        }
    }
    for (c, raw) in corrected.iter_mut().zip(raw_p_values) {
        *c = c.min(1.0).max(*raw);
    }
    corrected
}

/// Smallest p-value among candidates, where an exact zero marks an impossible occurrence and is
/// only used if nothing else is available
fn get_best_p_value(p_values: impl Iterator<Item = f64>) -> f64 {
    let mut best: Option<f64> = None;
    let mut any_zero = false;
    for p in p_values {
        if p == 0.0 {
            any_zero = true;
        } else {
            best = Some(best.map_or(p, |x| x.min(p)));
        }
    }
    match best {
        Some(x) => x,
        None if any_zero => 0.0,
        None => 1.0,
    }
}

/// Compute location p-values and the combined cluster p-value of one cluster
///
fn score_cluster(
    cluster: &mut ReferenceCluster,
    compositions: &[GenomeComposition],
    grouping: &GenomeGrouping,
    model: &dyn SignificanceModel,
) {
    let anchor_genome = cluster.reference_genome;
    let mut genome_best = vec![1.0; compositions.len()];
    for (genome_index, locations) in cluster.delta_locations.iter_mut().enumerate() {
        let composition = &compositions[genome_index];
        if genome_index == anchor_genome {
            for location in locations.iter_mut() {
                location.p_value = 1.0;
            }
            continue;
        }
        if locations.is_empty() {
            genome_best[genome_index] =
                model.location_p_value(composition, &cluster.gene_content, cluster.max_distance);
        } else {
            for location in locations.iter_mut() {
                location.p_value =
                    model.location_p_value(composition, &cluster.gene_content, location.distance);
            }
            genome_best[genome_index] = get_best_p_value(locations.iter().map(|x| x.p_value));
        }
    }

    let anchor_group = grouping.group_of(anchor_genome);
    let group_best = grouping
        .groups()
        .iter()
        .enumerate()
        .map(|(group_index, members)| {
            if group_index == anchor_group {
                1.0
            } else {
                get_best_p_value(members.iter().map(|x| genome_best[*x]))
            }
        })
        .collect::<Vec<_>>();

    cluster.best_combined_p_value =
        get_poisson_binomial_tail(&group_best, cluster.covered_genome_groups).clamp(0.0, 1.0);
}

/// Score all clusters of a run in place
///
/// `anchors` lists the genomes used as search anchors, which determines the number of tests for
/// the correction.
///
pub fn compute_cluster_statistics(
    clusters: &mut [ReferenceCluster],
    dataset: &DataSet,
    grouping: &GenomeGrouping,
    anchors: &[usize],
    model: &dyn SignificanceModel,
    correction: MultipleTestingCorrection,
) {
    let compositions = dataset
        .genomes
        .iter()
        .map(GenomeComposition::new)
        .collect::<Vec<_>>();

    clusters
        .par_iter_mut()
        .for_each(|x| score_cluster(x, &compositions, grouping, model));

    let raw_p_values = clusters
        .iter()
        .map(|x| x.best_combined_p_value)
        .collect::<Vec<_>>();
    let tested_count = get_tested_interval_count(dataset, anchors);
    let corrected = correct_p_values(&raw_p_values, tested_count, correction);
    for (cluster, p) in clusters.iter_mut().zip(corrected) {
        cluster.best_combined_p_value_corrected = p;
    }
}

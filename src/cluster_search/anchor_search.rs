//! Cluster candidates grown from the windows of one anchor genome
//!

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::breakpoint_distance::GenomeGrouping;
use crate::delta_location::{DeltaLocation, DistanceBudget, TargetPattern, find_delta_locations};
use crate::genome::{DataSet, FamilyId, GeneSlot};
use crate::int_range::IntRange;
use crate::log_utils::debug_msg;
use crate::memory_reduction::slot_label;
use crate::parameter::Parameter;
use crate::progress::{CancellationToken, ProgressSink};
use crate::reference_cluster::ReferenceCluster;
use crate::search_genome::SearchGenome;

use super::merge_clusters::merge_cluster;

/// Read-only data shared by all anchor searches of one run
pub(super) struct AnchorSearchContext<'a> {
    pub dataset: &'a DataSet,
    pub search_genomes: &'a [SearchGenome],
    pub grouping: &'a GenomeGrouping,
    pub parameter: &'a Parameter,
    pub quorum: usize,
    pub cancel: &'a CancellationToken,
    pub progress: &'a ProgressSink,

    /// Left borders processed so far over all anchors, and the total
    pub completed_borders: &'a AtomicUsize,
    pub total_borders: usize,

    pub debug: bool,
}

impl AnchorSearchContext<'_> {
    fn report_border_done(&self) {
        let done = self.completed_borders.fetch_add(1, Ordering::Relaxed) + 1;
        self.progress
            .update(done as f64 / self.total_borders.max(1) as f64);
    }

    /// True if `family` occurs anywhere outside of the anchor genome, or repeatedly within it when
    /// the anchor genome is searched as well
    fn is_shared_family(&self, anchor: usize, family: FamilyId) -> bool {
        let is_shared = self
            .search_genomes
            .iter()
            .enumerate()
            .filter(|(genome_index, _)| *genome_index != anchor)
            .flat_map(|(_, x)| x.chromosomes.iter())
            .any(|x| x.num_table.occurrence_count(family) > 0);
        is_shared
            || (self.parameter.ref_in_ref
                && self.search_genomes[anchor]
                    .chromosomes
                    .iter()
                    .map(|x| x.num_table.occurrence_count(family))
                    .sum::<usize>()
                    > 1)
    }
}

/// Running lower bound on the target genes missing from each chromosome of each genome
///
/// The bound only grows as the anchor window is extended, so a genome that can no longer be
/// reached stays unreachable for every larger window from the same left border.
///
struct MissingLowerBound {
    anchor: usize,
    missing: Vec<Vec<usize>>,
}

impl MissingLowerBound {
    fn new(search_genomes: &[SearchGenome], anchor: usize) -> Self {
        Self {
            anchor,
            missing: search_genomes
                .iter()
                .map(|x| vec![0; x.chromosomes.len()])
                .collect(),
        }
    }

    /// Update the bound after a slot was added to the target, `need` is the family's new count
    fn add_slot(&mut self, search_genomes: &[SearchGenome], slot: &GeneSlot, need: usize) {
        for (genome_index, genome_missing) in self.missing.iter_mut().enumerate() {
            if genome_index == self.anchor {
                continue;
            }
            let chromosomes = &search_genomes[genome_index].chromosomes;
            for (chrom_index, missing) in genome_missing.iter_mut().enumerate() {
                match slot {
                    GeneSlot::Real { family, .. } => {
                        if need > chromosomes[chrom_index].num_table.occurrence_count(*family) {
                            *missing += 1;
                        }
                    }
                    GeneSlot::Anonymous(count) => {
                        *missing += *count as usize;
                    }
                    GeneSlot::Placeholder => {}
                }
            }
        }
    }

    fn is_reachable(&self, genome_index: usize, max_deletions: usize) -> bool {
        self.missing[genome_index]
            .iter()
            .any(|x| *x <= max_deletions)
    }

    /// Number of genome groups that may still be covered, the anchor's group included
    fn reachable_group_count(&self, grouping: &GenomeGrouping, max_deletions: usize) -> usize {
        let mut reachable = vec![false; grouping.group_count()];
        reachable[grouping.group_of(self.anchor)] = true;
        for genome_index in 0..self.missing.len() {
            if genome_index != self.anchor && self.is_reachable(genome_index, max_deletions) {
                reachable[grouping.group_of(genome_index)] = true;
            }
        }
        reachable.into_iter().filter(|x| *x).count()
    }
}

/// True if `family` occurs within any location found for the candidate window
///
/// The anchor window itself must not be part of `locations`.
///
fn is_family_located(
    search_genomes: &[SearchGenome],
    locations: &[Vec<DeltaLocation>],
    family: FamilyId,
) -> bool {
    locations
        .iter()
        .enumerate()
        .any(|(genome_index, genome_locations)| {
            genome_locations.iter().any(|x| {
                let chrom = &search_genomes[genome_index].chromosomes[x.chrom_index];
                chrom.slots[x.range.start..x.range.end]
                    .iter()
                    .any(|s| s.family() == Some(family))
            })
        })
}

/// Convert the locations of an accepted candidate window into a reported cluster
///
/// Location ranges are translated from search slots back to input gene coordinates, and the gene
/// content is read from the unreduced anchor genome.
///
fn build_cluster(
    context: &AnchorSearchContext,
    anchor: usize,
    anchor_location: DeltaLocation,
    mut locations: Vec<Vec<DeltaLocation>>,
) -> ReferenceCluster {
    for (genome_index, genome_locations) in locations.iter_mut().enumerate() {
        let chromosomes = &context.search_genomes[genome_index].chromosomes;
        for location in genome_locations.iter_mut() {
            location.range = chromosomes[location.chrom_index].to_gene_range(&location.range);
        }
    }

    let reference_chromosome = anchor_location.chrom_index;
    let reference_range = locations[anchor][0].range;
    let gene_content = context.dataset.genomes[anchor].chromosomes[reference_chromosome].genes
        [reference_range.start..reference_range.end]
        .iter()
        .filter(|x| **x != 0)
        .map(|x| x.unsigned_abs())
        .collect::<Vec<_>>();

    let min_distances = locations
        .iter()
        .map(|x| x.iter().map(|l| l.distance).min())
        .collect::<Vec<_>>();
    let covered_genomes = min_distances.iter().filter(|x| x.is_some()).count();

    let mut covered_genome_groups = 0;
    let mut max_distance = 0;
    for group in context.grouping.groups() {
        if let Some(group_distance) = group.iter().filter_map(|x| min_distances[*x]).min() {
            covered_genome_groups += 1;
            max_distance = max_distance.max(group_distance);
        }
    }

    ReferenceCluster {
        id: 0,
        size: gene_content.len(),
        gene_content,
        reference_genome: anchor,
        reference_chromosome,
        reference_range,
        min_distances,
        max_distance,
        covered_genomes,
        covered_genome_groups,
        best_combined_p_value: 1.0,
        best_combined_p_value_corrected: 1.0,
        delta_locations: locations,
    }
}

/// Locations of the candidate in its own anchor genome other than the anchor window
///
/// Locations containing the anchor window or contained in it are dropped.
///
fn find_anchor_repeats(
    anchor_genome: &SearchGenome,
    pattern: &TargetPattern,
    budget: &DistanceBudget,
    chrom_index: usize,
    window: &IntRange,
) -> Vec<DeltaLocation> {
    let mut locations = find_delta_locations(anchor_genome, pattern, budget);
    locations.retain(|x| {
        x.chrom_index != chrom_index
            || !(x.range.contains_range(window) || window.contains_range(&x.range))
    });
    locations
}

/// Search all windows of one anchor chromosome growing from left border `start`
///
/// Returns the accepted clusters in the order they were found, or None if the run was cancelled.
///
fn search_left_border(
    context: &AnchorSearchContext,
    anchor: usize,
    chrom_index: usize,
    start: usize,
) -> Option<Vec<ReferenceCluster>> {
    let mut clusters = Vec::new();

    let search_genomes = context.search_genomes;
    let slots = &search_genomes[anchor].chromosomes[chrom_index].slots;
    let Some(left_family) = slots[start].family() else {
        return Some(clusters);
    };
    if !context.is_shared_family(anchor, left_family) {
        return Some(clusters);
    }

    let max_budget = context.parameter.max_budget();
    let mut pattern = TargetPattern::default();
    let mut lower_bound = MissingLowerBound::new(search_genomes, anchor);
    let mut placeholder_count = 0;
    for end in start..slots.len() {
        if context.cancel.is_cancelled() {
            return None;
        }
        let slot = &slots[end];
        pattern.add_slot(slot);
        let need = slot.family().map_or(0, |x| pattern.need(x));
        lower_bound.add_slot(search_genomes, slot, need);
        if *slot == GeneSlot::Placeholder {
            placeholder_count += 1;
        }

        if placeholder_count > max_budget.insertions {
            break;
        }
        if lower_bound.reachable_group_count(context.grouping, max_budget.deletions)
            < context.quorum
        {
            break;
        }

        let Some(right_family) = slot.family() else {
            continue;
        };
        let cluster_size = pattern.size();
        if cluster_size < context.parameter.min_cluster_size {
            continue;
        }
        let budget = context.parameter.budget(cluster_size);
        if placeholder_count > budget.insertions {
            continue;
        }

        let window = IntRange::from_pair(start, end + 1);
        let mut locations = search_genomes
            .iter()
            .enumerate()
            .map(|(genome_index, genome)| {
                if genome_index == anchor {
                    if context.parameter.ref_in_ref {
                        find_anchor_repeats(genome, &pattern, &budget, chrom_index, &window)
                    } else {
                        Vec::new()
                    }
                } else if !lower_bound.is_reachable(genome_index, budget.deletions) {
                    Vec::new()
                } else {
                    find_delta_locations(genome, &pattern, &budget)
                }
            })
            .collect::<Vec<_>>();

        let mut covered = vec![false; context.grouping.group_count()];
        covered[context.grouping.group_of(anchor)] = true;
        for (genome_index, genome_locations) in locations.iter().enumerate() {
            if !genome_locations.is_empty() {
                covered[context.grouping.group_of(genome_index)] = true;
            }
        }
        if covered.iter().filter(|x| **x).count() < context.quorum {
            continue;
        }

        if !is_family_located(search_genomes, &locations, left_family)
            || !is_family_located(search_genomes, &locations, right_family)
        {
            continue;
        }

        let anchor_location =
            DeltaLocation::new(chrom_index, window, 0, placeholder_count, cluster_size);
        locations[anchor].insert(0, anchor_location.clone());

        let cluster = build_cluster(context, anchor, anchor_location, locations);
        debug_msg!(
            context.debug,
            "Candidate cluster at genome {anchor} chrom {chrom_index} {:?} slots [{}] covering {} genomes",
            cluster.reference_range,
            slots[start..=end].iter().map(slot_label).collect::<Vec<_>>().join(" "),
            cluster.covered_genomes
        );
        clusters.push(cluster);
    }
    Some(clusters)
}

/// Find and locally deduplicate all clusters anchored in one genome
///
/// Returns None if the run was cancelled during the search.
///
pub(super) fn search_anchor_genome(
    context: &AnchorSearchContext,
    anchor: usize,
) -> Option<Vec<ReferenceCluster>> {
    let mut clusters = Vec::new();
    for (chrom_index, chrom) in context.search_genomes[anchor].chromosomes.iter().enumerate() {
        for start in 0..chrom.len() {
            if context.cancel.is_cancelled() {
                return None;
            }
            for cluster in search_left_border(context, anchor, chrom_index, start)? {
                merge_cluster(&mut clusters, cluster);
            }
            context.report_border_done();
        }
    }
    Some(clusters)
}

//! Approximate occurrences of a target gene multiset on the chromosomes of one genome
//!

use std::cmp::Reverse;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::genome::{FamilyId, GeneSlot};
use crate::int_range::IntRange;
use crate::search_genome::{SearchChromosome, SearchGenome};

/// Minimum number of target genes a window must share with the target
pub const MIN_HIT_COUNT: usize = 2;

/// Allowed distance between a window and the target for one cluster size
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct DistanceBudget {
    /// Genes in the window beyond the target content
    pub insertions: usize,

    /// Target genes absent from the window
    pub deletions: usize,

    pub total: usize,
}

impl DistanceBudget {
    pub fn fixed(distance: usize) -> Self {
        Self {
            insertions: distance,
            deletions: distance,
            total: distance,
        }
    }

    pub fn accepts(&self, missing: usize, additional: usize) -> bool {
        missing <= self.deletions && additional <= self.insertions && missing + additional <= self.total
    }
}

/// Gene multiset searched for in the other genomes
///
/// Each copy of a family counts separately. Anonymous genes belong to the target but can never be
/// found anywhere else, placeholders are not part of the target at all.
///
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TargetPattern {
    need: HashMap<FamilyId, usize>,
    anonymous_units: usize,
    size: usize,
}

impl TargetPattern {
    pub fn from_slots(slots: &[GeneSlot]) -> Self {
        let mut pattern = Self::default();
        for slot in slots {
            pattern.add_slot(slot);
        }
        pattern
    }

    pub fn add_slot(&mut self, slot: &GeneSlot) {
        match slot {
            GeneSlot::Real { family, .. } => {
                *self.need.entry(*family).or_insert(0) += 1;
                self.size += 1;
            }
            GeneSlot::Anonymous(count) => {
                self.anonymous_units += *count as usize;
                self.size += *count as usize;
            }
            GeneSlot::Placeholder => {}
        }
    }

    /// Gene count of the target, each copy and each anonymous gene included
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn anonymous_units(&self) -> usize {
        self.anonymous_units
    }

    pub fn need(&self, family: FamilyId) -> usize {
        self.need.get(&family).copied().unwrap_or(0)
    }

    pub fn family_need(&self) -> impl Iterator<Item = (FamilyId, usize)> + '_ {
        self.need.iter().map(|(family, need)| (*family, *need))
    }

    /// True if the slot may delimit a matching window
    pub fn is_border_slot(&self, slot: &GeneSlot) -> bool {
        slot.family().is_some_and(|x| self.need(x) > 0)
    }
}

/// One maximal approximate occurrence of a target in one genome
///
/// The range is half-open. During the search it is given in slot coordinates, reported clusters
/// carry it in input gene coordinates.
///
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DeltaLocation {
    pub chrom_index: usize,
    pub range: IntRange,
    pub distance: usize,

    /// Target genes absent from the window
    pub missing: usize,

    /// Window genes beyond the target content
    pub additional: usize,

    pub hit_count: usize,

    pub p_value: f64,

    /// Set for every location of a genome except the best ranked one
    pub suboptimal: bool,
}

impl DeltaLocation {
    pub fn new(
        chrom_index: usize,
        range: IntRange,
        missing: usize,
        additional: usize,
        hit_count: usize,
    ) -> Self {
        Self {
            chrom_index,
            range,
            distance: missing + additional,
            missing,
            additional,
            hit_count,
            p_value: 1.0,
            suboptimal: false,
        }
    }

    /// True if this location lies within `other` on the same chromosome
    pub fn is_nested_in(&self, other: &DeltaLocation) -> bool {
        self.chrom_index == other.chrom_index && other.range.contains_range(&self.range)
    }
}

/// Drop every location contained in another location of equal or lower distance
///
fn remove_redundant_locations(candidates: Vec<DeltaLocation>) -> Vec<DeltaLocation> {
    candidates
        .iter()
        .filter(|x| {
            !candidates
                .iter()
                .any(|y| y.range != x.range && x.is_nested_in(y) && y.distance <= x.distance)
        })
        .cloned()
        .collect()
}

/// Find all maximal windows of one chromosome matching the target within the budget
///
/// Each window starts and ends with a target gene and shares at least [MIN_HIT_COUNT] genes
/// with the target. Windows are grown one slot at a time from each possible left border until the
/// insertion budget is exceeded.
///
pub fn find_chromosome_delta_locations(
    chrom_index: usize,
    chrom: &SearchChromosome,
    pattern: &TargetPattern,
    budget: &DistanceBudget,
) -> Vec<DeltaLocation> {
    let missing_lower_bound = chrom.num_table.get_missing_lower_bound(
        pattern.family_need(),
        pattern.anonymous_units(),
        pattern.size(),
        budget.insertions,
    );
    if missing_lower_bound > budget.deletions.min(budget.total) {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    let mut window_counts = HashMap::new();
    for start in 0..chrom.len() {
        if !pattern.is_border_slot(&chrom.slots[start]) {
            continue;
        }
        window_counts.clear();
        let mut hit_count = 0;
        let mut additional = 0;
        for end in start..chrom.len() {
            let slot = &chrom.slots[end];
            match slot.family() {
                Some(family) => {
                    let count = window_counts.entry(family).or_insert(0);
                    *count += 1;
                    if *count <= pattern.need(family) {
                        hit_count += 1;
                    } else {
                        additional += 1;
                    }
                }
                None => {
                    additional += slot.unit_count();
                }
            }
            if additional > budget.insertions {
                break;
            }
            if hit_count < MIN_HIT_COUNT || !pattern.is_border_slot(slot) {
                continue;
            }
            let missing = pattern.size() - hit_count;
            if budget.accepts(missing, additional) {
                candidates.push(DeltaLocation::new(
                    chrom_index,
                    IntRange::from_pair(start, end + 1),
                    missing,
                    additional,
                    hit_count,
                ));
            }
        }
    }
    remove_redundant_locations(candidates)
}

/// Find the maximal windows matching the target on every chromosome of a genome
///
pub fn find_delta_locations(
    genome: &SearchGenome,
    pattern: &TargetPattern,
    budget: &DistanceBudget,
) -> Vec<DeltaLocation> {
    genome
        .chromosomes
        .iter()
        .enumerate()
        .flat_map(|(chrom_index, chrom)| {
            find_chromosome_delta_locations(chrom_index, chrom, pattern, budget)
        })
        .collect()
}

/// Order the locations of one genome from best to worst and flag the alternatives
///
/// Locations are ranked by distance, then by decreasing hit count, then by position. All but the
/// first are flagged as sub-optimal. In strict mode, any location overlapping a better ranked
/// location is removed instead.
///
pub fn rank_delta_locations(locations: &mut Vec<DeltaLocation>, strict: bool) {
    locations.sort_by_key(|x| (x.distance, Reverse(x.hit_count), x.chrom_index, x.range));

    if strict {
        let mut kept: Vec<DeltaLocation> = Vec::with_capacity(locations.len());
        for location in locations.drain(..) {
            let overlaps_kept = kept.iter().any(|x| {
                x.chrom_index == location.chrom_index && x.range.intersect_range(&location.range)
            });
            if !overlaps_kept {
                kept.push(location);
            }
        }
        *locations = kept;
    }

    for (index, location) in locations.iter_mut().enumerate() {
        location.suboptimal = index > 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::{DataSet, Genome};
    use crate::memory_reduction::FamilyMapping;
    use crate::search_genome::encode_genomes;

    fn search_genomes(gene_lists: &[&[i32]], memory_reduction: bool) -> Vec<SearchGenome> {
        let genomes = gene_lists
            .iter()
            .enumerate()
            .map(|(i, x)| Genome::from_gene_lists(&format!("g{i}"), &[x]))
            .collect();
        let dataset = DataSet::new(genomes);
        let mapping = FamilyMapping::new(&dataset, memory_reduction);
        encode_genomes(&dataset, &mapping, 2)
    }

    fn pattern(genes: &[i32]) -> TargetPattern {
        TargetPattern::from_slots(
            &genes
                .iter()
                .map(|x| GeneSlot::from_signed_id(*x))
                .collect::<Vec<_>>(),
        )
    }

    fn ranges(locations: &[DeltaLocation]) -> Vec<(usize, usize, usize)> {
        locations
            .iter()
            .map(|x| (x.range.start, x.range.end, x.distance))
            .collect()
    }

    #[test]
    fn test_target_pattern() {
        let mut p = pattern(&[1, -2, 1, 0]);
        p.add_slot(&GeneSlot::Anonymous(2));
        assert_eq!(p.size(), 5);
        assert_eq!(p.need(1), 2);
        assert_eq!(p.anonymous_units(), 2);
        assert!(p.is_border_slot(&GeneSlot::from_signed_id(2)));
        assert!(!p.is_border_slot(&GeneSlot::from_signed_id(3)));
    }

    #[test]
    fn test_single_insertion() {
        let genomes = search_genomes(&[&[1, 2, 6, 5, 4]], false);
        let locations = find_delta_locations(&genomes[0], &pattern(&[1, 2, 5]), &DistanceBudget::fixed(1));
        assert_eq!(ranges(&locations), vec![(0, 4, 1)]);
        assert_eq!(locations[0].additional, 1);
        assert_eq!(locations[0].hit_count, 3);
    }

    #[test]
    fn test_exact_match_only() {
        let genomes = search_genomes(&[&[1, 2, 6, 5, 4]], false);
        let locations = find_delta_locations(&genomes[0], &pattern(&[1, 2, 5]), &DistanceBudget::fixed(0));
        assert!(locations.is_empty());
    }

    #[test]
    fn test_deletion() {
        let genomes = search_genomes(&[&[7, 1, 5, 8, 8]], false);
        let budget = DistanceBudget {
            insertions: 0,
            deletions: 1,
            total: 1,
        };
        let locations = find_delta_locations(&genomes[0], &pattern(&[1, 2, 5]), &budget);
        assert_eq!(ranges(&locations), vec![(1, 3, 1)]);
        assert_eq!(locations[0].missing, 1);
    }

    #[test]
    fn test_paralog_copies() {
        let genomes = search_genomes(&[&[1, 2, 1]], false);
        let mut locations =
            find_delta_locations(&genomes[0], &pattern(&[1, 2]), &DistanceBudget::fixed(1));
        rank_delta_locations(&mut locations, false);
        assert_eq!(ranges(&locations), vec![(0, 2, 0), (1, 3, 0), (0, 3, 1)]);
        assert!(!locations[0].suboptimal);
        assert!(locations[1].suboptimal);

        rank_delta_locations(&mut locations, true);
        assert_eq!(ranges(&locations), vec![(0, 2, 0)]);

        let locations =
            find_delta_locations(&genomes[0], &pattern(&[1, 2, 1]), &DistanceBudget::fixed(0));
        assert_eq!(ranges(&locations), vec![(0, 3, 0)]);
    }

    #[test]
    fn test_insertion_budget_stops_extension() {
        let genomes = search_genomes(&[&[1, 9, 9, 9, 2]], false);
        let locations = find_delta_locations(&genomes[0], &pattern(&[1, 2]), &DistanceBudget::fixed(2));
        assert!(locations.is_empty());
    }

    #[test]
    fn test_anonymous_run_distance() {
        // genes 8 and 9 occur once, so they collapse into one anonymous run when reduced
        let gene_lists: &[&[i32]] = &[&[1, 8, 9, 2], &[1, 2]];
        for memory_reduction in [false, true] {
            let genomes = search_genomes(gene_lists, memory_reduction);
            let target = TargetPattern::from_slots(&genomes[1].chromosomes[0].slots);
            let locations = find_delta_locations(&genomes[0], &target, &DistanceBudget::fixed(2));
            assert_eq!(locations.len(), 1);
            assert_eq!(locations[0].distance, 2);
            let chrom = &genomes[0].chromosomes[0];
            assert_eq!(
                chrom.to_gene_range(&locations[0].range),
                IntRange::from_pair(0, 4)
            );
        }
    }

    #[test]
    fn test_multiple_chromosomes() {
        let dataset = DataSet::new(vec![Genome::from_gene_lists(
            "a",
            &[&[3, 1, 2], &[2, 4, 1]],
        )]);
        let genomes = encode_genomes(&dataset, &FamilyMapping::identity(&dataset), 1);
        let mut locations =
            find_delta_locations(&genomes[0], &pattern(&[1, 2]), &DistanceBudget::fixed(1));
        rank_delta_locations(&mut locations, false);
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].chrom_index, 0);
        assert_eq!(locations[0].range, IntRange::from_pair(1, 3));
        assert_eq!(locations[1].chrom_index, 1);
        assert_eq!(locations[1].distance, 1);
    }
}

//! Breakpoint distance between genomes and the genome grouping built on it
//!

use std::collections::HashMap;

use itertools::Itertools;
use log::{debug, info};

use crate::errors::{DetectionError, DetectionResult};
use crate::genome::Genome;

/// Grouping factors above this value disable genome grouping
pub const MAX_GROUPING_FACTOR: f64 = 1.0;

type Adjacency = (i64, i64);

/// Canonical key of the adjacency `a` followed by `b`
///
/// Unsigned keys ignore strand and order. Signed keys treat the pair as equal to the pair read on
/// the opposite strand, so `(a, b)` and `(-b, -a)` share one key.
///
fn adjacency_key(a: i32, b: i32, signed: bool) -> Adjacency {
    // Widened so that negating any gene id is exact
    let (a, b) = (i64::from(a), i64::from(b));
    if signed {
        std::cmp::min((a, b), (-b, -a))
    } else {
        let (a, b) = (a.abs(), b.abs());
        (a.max(b), a.min(b))
    }
}

/// Count every adjacency of the genome, chromosome boundaries are breaks
fn get_adjacency_counts(genome: &Genome, signed: bool) -> HashMap<Adjacency, usize> {
    let mut counts = HashMap::new();
    for chrom in genome.chromosomes.iter() {
        for pair in chrom.genes.windows(2) {
            *counts
                .entry(adjacency_key(pair[0], pair[1], signed))
                .or_insert(0) += 1;
        }
    }
    counts
}

fn get_adjacency_count_distance(
    counts1: &HashMap<Adjacency, usize>,
    counts2: &HashMap<Adjacency, usize>,
) -> usize {
    let mut distance = 0;
    for (key, count1) in counts1.iter() {
        let count2 = counts2.get(key).copied().unwrap_or(0);
        distance += count1.abs_diff(count2);
    }
    for (key, count2) in counts2.iter() {
        if !counts1.contains_key(key) {
            distance += count2;
        }
    }
    distance
}

/// Breakpoint distance between two genomes
///
/// This is the number of adjacencies found in one genome but not the other, where repeated
/// adjacencies are compared by count.
///
pub fn get_breakpoint_distance(genome1: &Genome, genome2: &Genome, signed: bool) -> usize {
    get_adjacency_count_distance(
        &get_adjacency_counts(genome1, signed),
        &get_adjacency_counts(genome2, signed),
    )
}

/// Symmetric matrix of breakpoint distances between all genome pairs
///
pub fn get_breakpoint_distance_matrix(genomes: &[Genome], signed: bool) -> Vec<Vec<usize>> {
    let adjacency_counts = genomes
        .iter()
        .map(|x| get_adjacency_counts(x, signed))
        .collect::<Vec<_>>();

    let genome_count = genomes.len();
    let mut matrix = vec![vec![0; genome_count]; genome_count];
    for i in 0..genome_count {
        for j in (i + 1)..genome_count {
            let distance = get_adjacency_count_distance(&adjacency_counts[i], &adjacency_counts[j]);
            matrix[i][j] = distance;
            matrix[j][i] = distance;
        }
    }
    matrix
}

/// Breakpoint distance scaled by the number of adjacencies the two genomes could share
///
fn normalize_distance(distance: usize, gene_count1: usize, gene_count2: usize) -> f64 {
    let comparison_count = gene_count1.saturating_sub(1) + gene_count2.saturating_sub(1);
    if comparison_count == 0 {
        if distance == 0 { 0.0 } else { 1.0 }
    } else {
        distance as f64 / comparison_count as f64
    }
}

/// Partition of the genomes into groups of near-identical gene order
///
/// Quorum and significance are counted per group rather than per genome.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenomeGrouping {
    groups: Vec<Vec<usize>>,
    group_index: Vec<usize>,
}

impl GenomeGrouping {
    /// One group per genome
    pub fn ungrouped(genome_count: usize) -> Self {
        Self {
            groups: (0..genome_count).map(|x| vec![x]).collect(),
            group_index: (0..genome_count).collect(),
        }
    }

    /// Build a grouping from caller supplied groups
    ///
    /// Every genome index must occur in exactly one group.
    ///
    pub fn from_groups(mut groups: Vec<Vec<usize>>, genome_count: usize) -> DetectionResult<Self> {
        const NONE: usize = usize::MAX;
        let mut group_index = vec![NONE; genome_count];
        for group in groups.iter_mut() {
            group.sort_unstable();
        }
        groups.retain(|x| !x.is_empty());
        groups.sort_by_key(|x| x[0]);
        for (gi, group) in groups.iter().enumerate() {
            for &genome_index in group.iter() {
                if genome_index >= genome_count {
                    return Err(DetectionError::configuration(
                        "genome_grouping",
                        genome_index,
                        "genome index is out of range",
                    ));
                }
                if group_index[genome_index] != NONE {
                    return Err(DetectionError::configuration(
                        "genome_grouping",
                        genome_index,
                        "genome occurs in more than one group",
                    ));
                }
                group_index[genome_index] = gi;
            }
        }
        if let Some(missing) = group_index.iter().position(|x| *x == NONE) {
            return Err(DetectionError::configuration(
                "genome_grouping",
                missing,
                "genome is not assigned to any group",
            ));
        }
        Ok(Self {
            groups,
            group_index,
        })
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn genome_count(&self) -> usize {
        self.group_index.len()
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn group_of(&self, genome_index: usize) -> usize {
        self.group_index[genome_index]
    }

    pub fn is_grouped(&self) -> bool {
        self.group_count() < self.genome_count()
    }
}

/// Group genomes with small normalized breakpoint distance
///
/// Genomes are visited in index order. Each genome joins the first existing group in which its
/// normalized distance to every member is at most `grouping_factor`, otherwise it starts a new
/// group. Factors above 1.0 disable grouping.
///
pub fn group_genomes(
    genomes: &[Genome],
    grouping_factor: f64,
    signed: bool,
) -> DetectionResult<GenomeGrouping> {
    if !grouping_factor.is_finite() || grouping_factor <= 0.0 {
        return Err(DetectionError::configuration(
            "grouping_factor",
            grouping_factor,
            "must be greater than 0",
        ));
    }
    if grouping_factor > MAX_GROUPING_FACTOR {
        return Ok(GenomeGrouping::ungrouped(genomes.len()));
    }

    let matrix = get_breakpoint_distance_matrix(genomes, signed);
    let gene_counts = genomes
        .iter()
        .map(|x| x.total_gene_count())
        .collect::<Vec<_>>();
    let is_close = |i: usize, j: usize| {
        normalize_distance(matrix[i][j], gene_counts[i], gene_counts[j]) <= grouping_factor
    };

    let mut groups: Vec<Vec<usize>> = Vec::new();
    for genome_index in 0..genomes.len() {
        match groups
            .iter_mut()
            .find(|group| group.iter().all(|&member| is_close(member, genome_index)))
        {
            Some(group) => group.push(genome_index),
            None => groups.push(vec![genome_index]),
        }
    }

    info!(
        "Grouped {} genomes into {} groups with grouping factor {grouping_factor}",
        genomes.len(),
        groups.len()
    );
    debug!(
        "Genome groups: {}",
        groups
            .iter()
            .map(|x| format!("[{}]", x.iter().join(",")))
            .join(" ")
    );

    GenomeGrouping::from_groups(groups, genomes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distances(a: &[&[i32]], b: &[&[i32]]) -> (usize, usize) {
        let a = Genome::from_gene_lists("a", a);
        let b = Genome::from_gene_lists("b", b);
        (
            get_breakpoint_distance(&a, &b, false),
            get_breakpoint_distance(&a, &b, true),
        )
    }

    #[test]
    fn test_identical_genomes() {
        let genomes = vec![
            Genome::from_gene_lists("a", &[&[1, 2, 3, 4, 5, 6, 7]]),
            Genome::from_gene_lists("b", &[&[1, 2, 3, 4, 5, 6, 7]]),
        ];
        let expected = vec![vec![0, 0], vec![0, 0]];
        assert_eq!(get_breakpoint_distance_matrix(&genomes, false), expected);
        assert_eq!(get_breakpoint_distance_matrix(&genomes, true), expected);
    }

    #[test]
    fn test_reversed_genome() {
        assert_eq!(
            distances(&[&[1, 2, 3, 4, 5, 6, 7]], &[&[-7, -6, -5, -4, -3, -2, -1]]),
            (0, 0)
        );
        assert_eq!(distances(&[&[1, 2]], &[&[-2, -1]]), (0, 0));
    }

    #[test]
    fn test_order_reversal() {
        assert_eq!(distances(&[&[1, 2]], &[&[2, 1]]), (0, 2));
    }

    #[test]
    fn test_different_adjacency() {
        assert_eq!(distances(&[&[1, 2]], &[&[1, 3]]), (2, 2));
        assert_eq!(distances(&[&[1, 2]], &[&[-3, -1]]), (2, 2));
        assert_eq!(distances(&[&[1, 2, 3]], &[&[2, 3, 5]]), (2, 2));
    }

    #[test]
    fn test_repeated_adjacency() {
        assert_eq!(distances(&[&[1, 1]], &[&[1, 1, 1]]), (1, 1));
        assert_eq!(distances(&[&[2, 2, 2]], &[&[1, 1]]), (3, 3));
    }

    #[test]
    fn test_chromosome_split() {
        assert_eq!(
            distances(&[&[1, 2, 3, 4, 5, 6, 7]], &[&[1, 2, 3, 4], &[5, 6, 7]]),
            (1, 1)
        );
        assert_eq!(
            distances(&[&[1, 2, 3, 4], &[5, 6, 7]], &[&[1, 2, 3, 4], &[5, 6, 7]]),
            (0, 0)
        );
        assert_eq!(
            distances(&[&[1, 2, 3, 4], &[5, 6, 7]], &[&[5, 6, 7], &[1, 2, 3, 4]]),
            (0, 0)
        );
    }

    #[test]
    fn test_mixed_rearrangement() {
        assert_eq!(
            distances(
                &[&[1, 2, 3, 3, 5, 2, 5, 7, 9]],
                &[&[2, 3, 5, 5, 6, 2, 10, 7, 9, 20]]
            ),
            (11, 11)
        );
        assert_eq!(
            distances(
                &[&[1, 2, 3, 5, 5, 2, 5, 7, 9]],
                &[&[2, 3, -5, -5, 6, 2, 10, -9, -7, 20]]
            ),
            (9, 11)
        );
    }

    #[test]
    fn test_extreme_gene_ids() {
        let min = i64::from(i32::MIN);
        assert_eq!(adjacency_key(i32::MIN, 1, true), (min, 1));
        assert_eq!(adjacency_key(i32::MIN, 1, false), (-min, 1));
        assert_eq!(
            distances(&[&[i32::MIN, 1, 2]], &[&[-2, -1, i32::MIN]]),
            (0, 2)
        );
    }

    #[test]
    fn test_grouping_disabled() {
        let genomes = vec![
            Genome::from_gene_lists("a", &[&[1, 2, 3]]),
            Genome::from_gene_lists("b", &[&[1, 2, 3]]),
        ];
        let grouping = group_genomes(&genomes, 1.1, false).unwrap();
        assert_eq!(grouping, GenomeGrouping::ungrouped(2));
        assert!(!grouping.is_grouped());
    }

    #[test]
    fn test_grouping() {
        let genomes = vec![
            Genome::from_gene_lists("a", &[&[1, 2, 3, 4, 5, 6, 7, 8, 9]]),
            Genome::from_gene_lists("b", &[&[9, 8, 7, 6, 5, 4, 3, 2, 1]]),
            Genome::from_gene_lists("c", &[&[1, 7, 3, 9, 5, 2, 8, 4, 6]]),
            Genome::from_gene_lists("d", &[&[1, 2, 3, 4, 5, 6, 7, 9, 8]]),
        ];
        let grouping = group_genomes(&genomes, 0.2, false).unwrap();
        assert_eq!(grouping.groups(), &[vec![0, 1, 3], vec![2]]);
        assert_eq!(grouping.group_of(3), 0);
        assert_eq!(grouping.group_of(2), 1);
        assert!(grouping.is_grouped());
    }

    #[test]
    fn test_bad_grouping_factor() {
        let genomes = vec![Genome::from_gene_lists("a", &[&[1, 2, 3]])];
        let err = group_genomes(&genomes, 0.0, false).unwrap_err();
        assert_eq!(err.parameter().unwrap().name, "grouping_factor");
    }

    #[test]
    fn test_grouping_override() {
        let grouping = GenomeGrouping::from_groups(vec![vec![2], vec![1, 0]], 3).unwrap();
        assert_eq!(grouping.groups(), &[vec![0, 1], vec![2]]);
        assert!(GenomeGrouping::from_groups(vec![vec![0], vec![0, 1]], 2).is_err());
        assert!(GenomeGrouping::from_groups(vec![vec![0]], 2).is_err());
    }
}

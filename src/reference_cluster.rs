//! Gene clusters reported by a detection run
//!

use serde::{Deserialize, Serialize};

use crate::delta_location::DeltaLocation;
use crate::errors::{DetectionError, DetectionResult};
use crate::genome::FamilyId;
use crate::int_range::IntRange;

/// Gene cluster found by extending an anchor window of a reference genome
///
/// All ranges are half-open input gene ranges, genomes and chromosomes are given by index.
///
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ReferenceCluster {
    pub id: usize,

    /// Gene families of the anchor window in chromosome order, with one entry per gene copy
    pub gene_content: Vec<FamilyId>,

    /// Number of genes in `gene_content`
    pub size: usize,

    pub reference_genome: usize,
    pub reference_chromosome: usize,
    pub reference_range: IntRange,

    /// Smallest location distance in each genome, None for genomes without a location
    pub min_distances: Vec<Option<usize>>,

    /// Largest of the per-group minimum distances over all covered genome groups
    pub max_distance: usize,

    pub covered_genomes: usize,
    pub covered_genome_groups: usize,

    pub best_combined_p_value: f64,
    pub best_combined_p_value_corrected: f64,

    /// All locations of the cluster in each genome, best ranked first
    pub delta_locations: Vec<Vec<DeltaLocation>>,
}

/// One occurrence interval of a cluster
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Subsequence {
    pub chrom_index: usize,
    pub range: IntRange,
    pub distance: usize,
    pub p_value: f64,
}

impl Subsequence {
    fn from_location(location: &DeltaLocation) -> Self {
        Self {
            chrom_index: location.chrom_index,
            range: location.range,
            distance: location.distance,
            p_value: location.p_value,
        }
    }
}

/// Occurrences of one cluster grouped by genome
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GeneClusterOccurrence {
    pub id: usize,
    pub subsequences: Vec<Vec<Subsequence>>,

    /// Sum over the genomes of the smallest subsequence distance
    pub total_distance: usize,

    /// Number of genomes with at least one subsequence
    pub support: usize,

    pub best_p_value: f64,
}

impl GeneClusterOccurrence {
    fn new(id: usize, subsequences: Vec<Vec<Subsequence>>) -> Self {
        let total_distance = subsequences
            .iter()
            .filter_map(|x| x.iter().map(|s| s.distance).min())
            .sum();
        let support = subsequences.iter().filter(|x| !x.is_empty()).count();
        let best_p_value = subsequences
            .iter()
            .flatten()
            .map(|x| x.p_value)
            .fold(1.0, f64::min);
        Self {
            id,
            subsequences,
            total_distance,
            support,
            best_p_value,
        }
    }
}

impl ReferenceCluster {
    /// Locations with the smallest distance of each genome
    pub fn best_occurrence(&self) -> GeneClusterOccurrence {
        let subsequences = self
            .delta_locations
            .iter()
            .zip(self.min_distances.iter())
            .map(|(locations, min_distance)| {
                locations
                    .iter()
                    .filter(|x| Some(x.distance) == *min_distance)
                    .map(Subsequence::from_location)
                    .collect()
            })
            .collect();
        GeneClusterOccurrence::new(0, subsequences)
    }

    /// Every location of each genome, sub-optimal alternatives included
    pub fn all_occurrences(&self) -> GeneClusterOccurrence {
        let subsequences = self
            .delta_locations
            .iter()
            .map(|x| x.iter().map(Subsequence::from_location).collect())
            .collect();
        GeneClusterOccurrence::new(1, subsequences)
    }

    /// True if every location of this cluster lies within a location of `other` in the same genome,
    /// where the containing location has equal or lower distance
    ///
    pub fn is_nested_in(&self, other: &ReferenceCluster) -> bool {
        self.delta_locations
            .iter()
            .zip(other.delta_locations.iter())
            .all(|(locations, other_locations)| {
                locations.iter().all(|x| {
                    other_locations
                        .iter()
                        .any(|y| x.is_nested_in(y) && y.distance <= x.distance)
                })
            })
    }

    /// Gene content with order ignored, used to recognize the same cluster found from two anchors
    pub fn content_key(&self) -> Vec<FamilyId> {
        let mut key = self.gene_content.clone();
        key.sort_unstable();
        key
    }

    /// Verify the invariants every reported cluster must satisfy
    ///
    pub fn check_invariants(&self, quorum: usize, min_cluster_size: usize) -> DetectionResult<()> {
        let fail = |msg: &str| {
            Err(DetectionError::Internal(format!(
                "cluster {} anchored at genome {} {:?}: {msg}",
                self.id, self.reference_genome, self.reference_range
            )))
        };
        if self.covered_genome_groups < quorum {
            return fail("covered genome groups below quorum");
        }
        if self.size < min_cluster_size || self.size != self.gene_content.len() {
            return fail("invalid cluster size");
        }
        if self.delta_locations[self.reference_genome].is_empty() {
            return fail("reference genome has no location");
        }
        for location in self.delta_locations.iter().flatten() {
            if location.distance != location.missing + location.additional
                || location.range.start > location.range.end
            {
                return fail("inconsistent location");
            }
        }
        if !(0.0..=1.0).contains(&self.best_combined_p_value)
            || self.best_combined_p_value_corrected < self.best_combined_p_value
        {
            return fail("inconsistent p-value");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(chrom_index: usize, start: usize, end: usize, distance: usize) -> DeltaLocation {
        let mut x = DeltaLocation::new(chrom_index, IntRange::from_pair(start, end), 0, distance, 2);
        x.p_value = 0.1 * (distance + 1) as f64;
        x
    }

    fn cluster(delta_locations: Vec<Vec<DeltaLocation>>) -> ReferenceCluster {
        let min_distances = delta_locations
            .iter()
            .map(|x| x.iter().map(|l| l.distance).min())
            .collect();
        ReferenceCluster {
            id: 0,
            gene_content: vec![2, 1, 3],
            size: 3,
            reference_genome: 0,
            reference_chromosome: 0,
            reference_range: IntRange::from_pair(0, 3),
            min_distances,
            max_distance: 1,
            covered_genomes: 2,
            covered_genome_groups: 2,
            best_combined_p_value: 0.01,
            best_combined_p_value_corrected: 0.05,
            delta_locations,
        }
    }

    #[test]
    fn test_occurrences() {
        let c = cluster(vec![
            vec![location(0, 0, 3, 0)],
            vec![location(0, 4, 7, 1), location(1, 0, 4, 2)],
            vec![],
        ]);
        let best = c.best_occurrence();
        assert_eq!(best.support, 2);
        assert_eq!(best.total_distance, 1);
        assert_eq!(best.subsequences[1].len(), 1);
        approx::assert_ulps_eq!(best.best_p_value, 0.1, max_ulps = 4);

        let all = c.all_occurrences();
        assert_eq!(all.subsequences[1].len(), 2);
        assert_eq!(all.total_distance, 1);
        assert_eq!(c.content_key(), vec![1, 2, 3]);
    }

    #[test]
    fn test_is_nested_in() {
        let outer = cluster(vec![vec![location(0, 0, 5, 0)], vec![location(0, 2, 8, 1)]]);
        let inner = cluster(vec![vec![location(0, 1, 4, 0)], vec![location(0, 3, 6, 1)]]);
        assert!(inner.is_nested_in(&outer));
        assert!(!outer.is_nested_in(&inner));

        let better_inner = cluster(vec![vec![location(0, 1, 4, 0)], vec![location(0, 3, 6, 0)]]);
        assert!(!better_inner.is_nested_in(&outer));
    }

    #[test]
    fn test_check_invariants() {
        let mut c = cluster(vec![vec![location(0, 0, 3, 0)], vec![location(0, 4, 7, 1)]]);
        assert!(c.check_invariants(2, 3).is_ok());
        assert!(c.check_invariants(3, 3).is_err());
        c.best_combined_p_value_corrected = 0.001;
        assert!(matches!(
            c.check_invariants(2, 3),
            Err(DetectionError::Internal(_))
        ));
    }
}

//! Read-only genome representation shared by all search tasks of one detection run
//!

use crate::genome::{DataSet, GeneSlot, Genome};
use crate::int_range::IntRange;
use crate::memory_reduction::{FamilyMapping, map_gene_list};
use crate::num_table::NumTable;

pub struct SearchChromosome {
    pub slots: Vec<GeneSlot>,

    /// Index of the first input gene covered by each slot
    gene_offsets: Vec<usize>,

    pub num_table: NumTable,
}

impl SearchChromosome {
    fn new(mapping: &FamilyMapping, genes: &[i32], max_distance: usize) -> Self {
        let (slots, gene_offsets) = map_gene_list(mapping, genes);
        let num_table =
            NumTable::initialize_for_calculation(&slots, mapping.alphabet_size() as u32, max_distance);
        Self {
            slots,
            gene_offsets,
            num_table,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Translate a half-open slot range into the matching half-open input gene range
    ///
    pub fn to_gene_range(&self, slot_range: &IntRange) -> IntRange {
        if slot_range.size() == 0 {
            let start = self
                .gene_offsets
                .get(slot_range.start)
                .copied()
                .unwrap_or(self.num_table.unit_length());
            return IntRange::from_pair(start, start);
        }
        let last = slot_range.end - 1;
        IntRange::from_pair(
            self.gene_offsets[slot_range.start],
            self.gene_offsets[last] + self.slots[last].unit_count(),
        )
    }
}

pub struct SearchGenome {
    pub chromosomes: Vec<SearchChromosome>,
}

impl SearchGenome {
    fn new(mapping: &FamilyMapping, genome: &Genome, max_distance: usize) -> Self {
        let chromosomes = genome
            .chromosomes
            .iter()
            .map(|x| SearchChromosome::new(mapping, &x.genes, max_distance))
            .collect();
        Self { chromosomes }
    }
}

/// Encode every genome of the dataset for the search
///
/// `max_distance` is the largest insertion budget of the run, used to size the pruning windows
/// of each chromosome's occurrence index.
///
pub fn encode_genomes(
    dataset: &DataSet,
    mapping: &FamilyMapping,
    max_distance: usize,
) -> Vec<SearchGenome> {
    dataset
        .genomes
        .iter()
        .map(|x| SearchGenome::new(mapping, x, max_distance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_gene_range() {
        let dataset = DataSet::new(vec![
            Genome::from_gene_lists("a", &[&[1, 8, 9, 2, 1]]),
            Genome::from_gene_lists("b", &[&[1, 2]]),
        ]);
        let mapping = FamilyMapping::reduce_singletons(&dataset);
        let genomes = encode_genomes(&dataset, &mapping, 0);
        let chrom = &genomes[0].chromosomes[0];
        assert_eq!(chrom.len(), 4);
        assert_eq!(
            chrom.to_gene_range(&IntRange::from_pair(0, 3)),
            IntRange::from_pair(0, 4)
        );
        assert_eq!(
            chrom.to_gene_range(&IntRange::from_pair(1, 2)),
            IntRange::from_pair(1, 3)
        );
        assert_eq!(chrom.num_table.unit_length(), 5);
    }
}

//! Per-chromosome occurrence index used to prune the delta-location search
//!

use crate::genome::{FamilyId, GeneSlot};

/// Occurrence index of one chromosome
///
/// All positions and window sizes are measured in gene units, so an anonymous run of `k` genes
/// occupies `k` positions. This keeps lookups identical whether or not singleton genes were
/// collapsed before the search.
///
#[derive(Clone, Debug, Default)]
pub struct NumTable {
    /// Sorted gene unit positions of each family, indexed by family id
    positions: Vec<Vec<usize>>,

    /// Largest insertion count any search against this chromosome will use
    max_distance: usize,

    unit_length: usize,
}

impl NumTable {
    /// Build the index for one chromosome
    ///
    /// `max_gene_id` sizes the family lookup. Families above it are still indexed, the table is
    /// grown to fit them. `max_distance` is the default insertion bound used to size candidate
    /// windows for pruning.
    ///
    pub fn initialize_for_calculation(
        slots: &[GeneSlot],
        max_gene_id: FamilyId,
        max_distance: usize,
    ) -> Self {
        let observed_max = slots.iter().filter_map(|x| x.family()).max().unwrap_or(0);
        let table_size = max_gene_id.max(observed_max) as usize + 1;
        let mut positions = vec![Vec::new(); table_size];

        let mut unit_pos = 0;
        for slot in slots.iter() {
            if let Some(family) = slot.family() {
                positions[family as usize].push(unit_pos);
            }
            unit_pos += slot.unit_count();
        }

        Self {
            positions,
            max_distance,
            unit_length: unit_pos,
        }
    }

    /// Chromosome length in gene units
    pub fn unit_length(&self) -> usize {
        self.unit_length
    }

    /// Total occurrences of `gene` on the chromosome
    pub fn occurrence_count(&self, gene: FamilyId) -> usize {
        self.positions
            .get(gene as usize)
            .map(|x| x.len())
            .unwrap_or(0)
    }

    /// Largest number of occurrences of `gene` inside any window of `window_size` gene units
    ///
    /// Window sizes above the chromosome length are treated as the full chromosome. Values are
    /// not tabulated per window size, they are found with one sliding pass over the family's
    /// sorted positions, so memory stays linear in the chromosome length.
    ///
    pub fn get_num(&self, gene: FamilyId, window_size: usize) -> usize {
        let window_size = window_size.min(self.unit_length);
        if window_size == 0 {
            return 0;
        }
        let Some(positions) = self.positions.get(gene as usize) else {
            return 0;
        };

        let mut max_count = 0;
        let mut right = 0;
        for (left, left_pos) in positions.iter().enumerate() {
            while right < positions.len() && positions[right] < left_pos + window_size {
                right += 1;
            }
            max_count = max_count.max(right - left);
        }
        max_count
    }

    /// Lower bound on the deletions of any window matching a target multiset
    ///
    /// A matching window holds at most `pattern_size + insertions` gene units, so it can supply at
    /// most `get_num` copies of each needed family within that span. `unmatched_units` counts
    /// target genes that can never be found on any other chromosome.
    ///
    pub fn get_missing_lower_bound(
        &self,
        family_need: impl Iterator<Item = (FamilyId, usize)>,
        unmatched_units: usize,
        pattern_size: usize,
        insertions: usize,
    ) -> usize {
        let window_size = pattern_size + insertions.max(self.max_distance);
        let mut missing = unmatched_units;
        for (family, need) in family_need {
            missing += need.saturating_sub(self.get_num(family, window_size));
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_slots(genes: &[i32]) -> Vec<GeneSlot> {
        genes.iter().map(|x| GeneSlot::from_signed_id(*x)).collect()
    }

    #[test]
    fn test_get_num() {
        let table = NumTable::initialize_for_calculation(&to_slots(&[1, 2, 1, 3, 1]), 3, 2);
        assert_eq!(table.get_num(1, 5), 3);
        assert_eq!(table.get_num(1, 3), 2);
        assert_eq!(table.get_num(1, 1), 1);
        assert_eq!(table.get_num(1, 0), 0);
        assert_eq!(table.get_num(2, 5), 1);
        assert_eq!(table.get_num(4, 5), 0);
        assert_eq!(table.get_num(1, 50), 3);
    }

    #[test]
    fn test_reinitialization_is_consistent() {
        let slots = to_slots(&[1, 2, 1, 3, 1]);
        let table1 = NumTable::initialize_for_calculation(&slots, 3, 2);
        let table2 = NumTable::initialize_for_calculation(&slots, 10, 7);
        for gene in 0..5 {
            for size in 0..7 {
                assert_eq!(table1.get_num(gene, size), table2.get_num(gene, size));
            }
        }
    }

    #[test]
    fn test_anonymous_units() {
        let slots = vec![
            GeneSlot::from_signed_id(1),
            GeneSlot::Anonymous(3),
            GeneSlot::from_signed_id(-1),
        ];
        let table = NumTable::initialize_for_calculation(&slots, 1, 0);
        assert_eq!(table.unit_length(), 5);
        assert_eq!(table.get_num(1, 4), 1);
        assert_eq!(table.get_num(1, 5), 2);
    }

    #[test]
    fn test_missing_lower_bound() {
        let table = NumTable::initialize_for_calculation(&to_slots(&[1, 2, 5, 5, 5, 5, 1]), 5, 0);
        let need = vec![(1, 2), (2, 1)];
        assert_eq!(table.get_missing_lower_bound(need.iter().copied(), 0, 3, 0), 1);
        assert_eq!(table.get_missing_lower_bound(need.iter().copied(), 0, 3, 4), 0);
        assert_eq!(table.get_missing_lower_bound(need.iter().copied(), 2, 3, 4), 2);
    }
}

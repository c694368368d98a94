//! Alphabet reduction applied before the cluster search
//!
//! Families found only once in the whole dataset can never be shared by two genomes. With
//! reduction enabled these genes are replaced by anonymous slots, and the remaining families are
//! renumbered densely so that per-family tables only need to cover the informative alphabet.
//!

use std::collections::HashMap;

use crate::genome::{DataSet, FamilyId, GeneSlot, Strand};

/// Pure mapping from input family ids to the family ids used by the search
///
#[derive(Clone, Debug)]
pub struct FamilyMapping {
    /// Reduced id of every informative family, or None when no reduction is applied
    reduced_ids: Option<HashMap<FamilyId, FamilyId>>,

    alphabet_size: usize,
}

impl FamilyMapping {
    /// Map every family to itself
    pub fn identity(dataset: &DataSet) -> Self {
        Self {
            reduced_ids: None,
            alphabet_size: dataset.max_family_id() as usize,
        }
    }

    /// Renumber families occurring at least twice to `1..=n` and anonymize all singletons
    ///
    /// Ids are assigned in increasing order of the input family id, so the mapping only depends on
    /// the dataset content.
    ///
    pub fn reduce_singletons(dataset: &DataSet) -> Self {
        let reduced_ids = dataset
            .gene_families()
            .into_iter()
            .filter(|x| !x.is_singleton())
            .enumerate()
            .map(|(i, x)| (x.id, i as FamilyId + 1))
            .collect::<HashMap<_, _>>();
        let alphabet_size = reduced_ids.len();
        Self {
            reduced_ids: Some(reduced_ids),
            alphabet_size,
        }
    }

    pub fn new(dataset: &DataSet, memory_reduction: bool) -> Self {
        if memory_reduction {
            Self::reduce_singletons(dataset)
        } else {
            Self::identity(dataset)
        }
    }

    /// Largest family id produced by this mapping
    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    pub fn is_reduced(&self) -> bool {
        self.reduced_ids.is_some()
    }

    /// Translate one signed input gene into a search slot
    pub fn map_gene(&self, gene: i32) -> GeneSlot {
        match GeneSlot::from_signed_id(gene) {
            GeneSlot::Real { family, strand } => match &self.reduced_ids {
                None => GeneSlot::Real { family, strand },
                Some(ids) => match ids.get(&family) {
                    Some(reduced) => GeneSlot::Real {
                        family: *reduced,
                        strand,
                    },
                    None => GeneSlot::Anonymous(1),
                },
            },
            other => other,
        }
    }
}

/// Translate a gene list into search slots, merging consecutive anonymous genes into one run
///
/// Returns the slots and the index of the first input gene covered by each slot.
///
pub fn map_gene_list(mapping: &FamilyMapping, genes: &[i32]) -> (Vec<GeneSlot>, Vec<usize>) {
    let mut slots: Vec<GeneSlot> = Vec::new();
    let mut gene_offsets = Vec::new();
    for (gene_index, gene) in genes.iter().enumerate() {
        let slot = mapping.map_gene(*gene);
        if let (GeneSlot::Anonymous(count), Some(GeneSlot::Anonymous(last_count))) =
            (slot, slots.last_mut())
        {
            *last_count += count;
            continue;
        }
        slots.push(slot);
        gene_offsets.push(gene_index);
    }
    (slots, gene_offsets)
}

/// Signed id of a real slot, used for debug output
pub fn slot_label(slot: &GeneSlot) -> String {
    match slot {
        GeneSlot::Real {
            family,
            strand: Strand::Forward,
        } => format!("{family}"),
        GeneSlot::Real {
            family,
            strand: Strand::Reverse,
        } => format!("-{family}"),
        GeneSlot::Anonymous(count) => format!("*{count}"),
        GeneSlot::Placeholder => "0".to_string(),
    }
}

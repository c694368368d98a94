//! Genome model shared by every detection stage
//!
//! Genomes are loaded once and stay read-only for the whole detection run. Gene families are
//! given as signed integers on input: the absolute value is the family id, the sign gives the
//! strand and zero marks a gene without any family assignment.
//!

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type FamilyId = u32;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum Strand {
    Forward,
    Reverse,
}

/// One gene position of a chromosome as seen by the cluster search
///
/// `Anonymous` stands for a run of genes whose families occur only once in the whole dataset, so
/// that they can never be shared with another genome. Its count is the number of original genes in
/// the run. `Placeholder` is a single gene that never matches anything.
///
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum GeneSlot {
    Real { family: FamilyId, strand: Strand },
    Anonymous(u32),
    Placeholder,
}

impl GeneSlot {
    pub fn from_signed_id(id: i32) -> Self {
        if id == 0 {
            Self::Placeholder
        } else {
            let strand = if id > 0 {
                Strand::Forward
            } else {
                Strand::Reverse
            };
            Self::Real {
                family: id.unsigned_abs(),
                strand,
            }
        }
    }

    /// Number of original genes represented by this slot
    pub fn unit_count(&self) -> usize {
        match self {
            Self::Anonymous(count) => *count as usize,
            _ => 1,
        }
    }

    pub fn family(&self) -> Option<FamilyId> {
        match self {
            Self::Real { family, .. } => Some(*family),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct Chromosome {
    pub name: String,

    /// Signed gene family ids in chromosome order
    pub genes: Vec<i32>,
}

impl Chromosome {
    pub fn new(name: &str, genes: Vec<i32>) -> Self {
        Self {
            name: name.to_string(),
            genes,
        }
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct Genome {
    pub name: String,
    pub chromosomes: Vec<Chromosome>,
}

impl Genome {
    pub fn new(name: &str, chromosomes: Vec<Chromosome>) -> Self {
        Self {
            name: name.to_string(),
            chromosomes,
        }
    }

    /// Build a genome from plain gene lists, naming chromosomes by their index
    ///
    pub fn from_gene_lists(name: &str, gene_lists: &[&[i32]]) -> Self {
        let chromosomes = gene_lists
            .iter()
            .enumerate()
            .map(|(chrom_index, genes)| Chromosome::new(&format!("{chrom_index}"), genes.to_vec()))
            .collect();
        Self::new(name, chromosomes)
    }

    pub fn total_gene_count(&self) -> usize {
        self.chromosomes.iter().map(|x| x.len()).sum()
    }
}

/// A gene family and its occurrence count across the whole dataset
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct GeneFamily {
    pub id: FamilyId,
    pub occurrence_count: usize,
}

impl GeneFamily {
    /// Singleton families can never be part of a cluster shared by two genomes
    pub fn is_singleton(&self) -> bool {
        self.occurrence_count == 1
    }
}

/// All genomes of one detection run
///
/// Genome indices used throughout the engine are positions in `genomes`.
///
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct DataSet {
    pub genomes: Vec<Genome>,
}

impl DataSet {
    pub fn new(genomes: Vec<Genome>) -> Self {
        Self { genomes }
    }

    pub fn genome_count(&self) -> usize {
        self.genomes.len()
    }

    /// Gene families of the dataset sorted by id, placeholders excluded
    pub fn gene_families(&self) -> Vec<GeneFamily> {
        let mut counts = BTreeMap::new();
        for gene in self
            .genomes
            .iter()
            .flat_map(|x| x.chromosomes.iter())
            .flat_map(|x| x.genes.iter())
        {
            if *gene != 0 {
                *counts.entry(gene.unsigned_abs()).or_insert(0usize) += 1;
            }
        }
        counts
            .into_iter()
            .map(|(id, occurrence_count)| GeneFamily {
                id,
                occurrence_count,
            })
            .collect()
    }

    pub fn max_family_id(&self) -> FamilyId {
        self.genomes
            .iter()
            .flat_map(|x| x.chromosomes.iter())
            .flat_map(|x| x.genes.iter())
            .map(|x| x.unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    /// Find the index of the one genome whose name matches `name`
    ///
    /// An exact name match wins, otherwise the name may match as a substring of exactly one genome
    /// name. Returns all candidate indices when the match is not unique.
    ///
    pub fn find_genome_by_name(&self, name: &str) -> Result<usize, Vec<usize>> {
        let exact = self
            .genomes
            .iter()
            .enumerate()
            .filter(|(_, x)| x.name == name)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let candidates = if exact.is_empty() {
            self.genomes
                .iter()
                .enumerate()
                .filter(|(_, x)| x.name.contains(name))
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        } else {
            exact
        };
        if candidates.len() == 1 {
            Ok(candidates[0])
        } else {
            Err(candidates)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gene_slot_from_signed_id() {
        assert_eq!(
            GeneSlot::from_signed_id(-4),
            GeneSlot::Real {
                family: 4,
                strand: Strand::Reverse
            }
        );
        assert_eq!(GeneSlot::from_signed_id(0), GeneSlot::Placeholder);
        assert_eq!(GeneSlot::Anonymous(3).unit_count(), 3);
        assert_eq!(GeneSlot::from_signed_id(7).family(), Some(7));
    }

    #[test]
    fn test_gene_families() {
        let dataset = DataSet::new(vec![
            Genome::from_gene_lists("a", &[&[1, -2, 3], &[0, 5]]),
            Genome::from_gene_lists("b", &[&[2, 1, 1]]),
        ]);
        let families = dataset.gene_families();
        assert_eq!(families.len(), 4);
        assert_eq!(
            families[0],
            GeneFamily {
                id: 1,
                occurrence_count: 3
            }
        );
        assert!(families[2].is_singleton());
        assert_eq!(dataset.max_family_id(), 5);
        assert_eq!(dataset.genomes[0].total_gene_count(), 5);
    }

    #[test]
    fn test_find_genome_by_name() {
        let dataset = DataSet::new(vec![
            Genome::from_gene_lists("E. coli K12", &[&[1]]),
            Genome::from_gene_lists("E. coli O157", &[&[1]]),
            Genome::from_gene_lists("B. subtilis", &[&[1]]),
        ]);
        assert_eq!(dataset.find_genome_by_name("subtilis"), Ok(2));
        assert_eq!(dataset.find_genome_by_name("E. coli K12"), Ok(0));
        assert_eq!(dataset.find_genome_by_name("E. coli"), Err(vec![0, 1]));
        assert_eq!(dataset.find_genome_by_name("Vibrio"), Err(vec![]));
    }
}

//! Run configuration of the cluster detection
//!
//! [ParameterSettings] is the loose, serializable form supplied by callers. It is validated once
//! into an immutable [Parameter], which is then resolved against the dataset before a search
//! starts. All validation failures name the offending parameter and value.
//!

use log::warn;
use serde::{Deserialize, Serialize};

use crate::delta_location::DistanceBudget;
use crate::errors::{DetectionError, DetectionResult};
use crate::genome::DataSet;
use crate::significance::MultipleTestingCorrection;

pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 3;

/// Grouping factors above 1.0 disable genome grouping, so this default leaves it off
pub const DEFAULT_GROUPING_FACTOR: f64 = 1.1;

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
pub enum OperationMode {
    #[default]
    Reference,
    Median,
    Center,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Every genome is used as search anchor
    #[default]
    AllAgainstAll,

    /// Only the genome matching this name is used as search anchor
    Genome(String),
}

/// Built-in distance tables
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, clap::ValueEnum, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DistanceTablePreset {
    HighlyConserved,
    Relaxed,
    StatisticPaper,
}

impl DistanceTablePreset {
    /// Rows of `[insertions, deletions, total]`, indexed by cluster size
    pub fn rows(&self) -> Vec<[usize; 3]> {
        match self {
            Self::HighlyConserved => vec![
                [0, 0, 0],
                [0, 0, 0],
                [0, 0, 0],
                [0, 0, 0],
                [1, 0, 1],
                [2, 1, 2],
                [3, 2, 3],
                [4, 2, 4],
                [5, 3, 5],
                [6, 3, 6],
            ],
            Self::Relaxed => vec![
                [0, 0, 0],
                [0, 0, 0],
                [0, 0, 0],
                [1, 0, 1],
                [1, 1, 1],
                [2, 1, 2],
                [3, 2, 3],
                [4, 2, 4],
                [6, 3, 6],
                [8, 4, 8],
                [10, 5, 10],
            ],
            Self::StatisticPaper => vec![
                [0, 0, 0],
                [0, 0, 0],
                [0, 0, 0],
                [0, 0, 0],
                [0, 0, 0],
                [1, 1, 1],
                [2, 2, 2],
                [3, 3, 3],
                [5, 5, 5],
            ],
        }
    }

    pub fn min_cluster_size(&self) -> usize {
        match self {
            Self::HighlyConserved => 3,
            Self::Relaxed => 2,
            Self::StatisticPaper => 4,
        }
    }
}

/// Caller supplied detection settings before validation
///
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ParameterSettings {
    /// Fixed maximum distance for all cluster sizes
    pub max_distance: Option<usize>,

    /// Explicit distance table, rows of `[insertions, deletions, total]` indexed by cluster size
    pub distance_table: Option<Vec<[usize; 3]>>,

    pub distance_table_preset: Option<DistanceTablePreset>,

    /// Defaults to the preset's minimum size, or [DEFAULT_MIN_CLUSTER_SIZE]
    pub min_cluster_size: Option<usize>,

    /// Minimum number of covered genome groups, 0 requires all groups
    pub min_covered_genomes: usize,

    pub operation_mode: OperationMode,
    pub reference_type: ReferenceType,
    pub grouping_factor: f64,

    /// Use signed breakpoint distances for genome grouping
    pub signed_grouping: bool,

    pub memory_reduction: bool,

    /// Drop alternative locations overlapping a better location of the same genome
    pub strict_occurrences: bool,

    /// Also locate each candidate in its own anchor genome, outside of the anchor window
    pub ref_in_ref: bool,

    pub compute_statistics: bool,
    pub correction: MultipleTestingCorrection,

    /// Worker thread count, 0 selects the thread pool default
    pub thread_count: usize,
}

impl Default for ParameterSettings {
    fn default() -> Self {
        Self {
            max_distance: None,
            distance_table: None,
            distance_table_preset: None,
            min_cluster_size: None,
            min_covered_genomes: 0,
            operation_mode: OperationMode::Reference,
            reference_type: ReferenceType::AllAgainstAll,
            grouping_factor: DEFAULT_GROUPING_FACTOR,
            signed_grouping: false,
            memory_reduction: true,
            strict_occurrences: false,
            ref_in_ref: false,
            compute_statistics: true,
            correction: MultipleTestingCorrection::BenjaminiHochberg,
            thread_count: 0,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum DistanceSetting {
    Fixed(usize),

    /// Budgets indexed by cluster size, sizes beyond the table use the last entry
    Table(Vec<DistanceBudget>),
}

/// Validated, immutable detection parameters
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Parameter {
    pub distance: DistanceSetting,
    pub min_cluster_size: usize,
    pub min_covered_genomes: usize,
    pub operation_mode: OperationMode,
    pub reference_type: ReferenceType,
    pub grouping_factor: f64,
    pub signed_grouping: bool,
    pub memory_reduction: bool,
    pub strict_occurrences: bool,
    pub ref_in_ref: bool,
    pub compute_statistics: bool,
    pub correction: MultipleTestingCorrection,
    pub thread_count: usize,
}

fn check_distance_table(rows: &[[usize; 3]]) -> DetectionResult<Vec<DistanceBudget>> {
    if rows.is_empty() {
        return Err(DetectionError::infeasible(
            "distance_table",
            "[]",
            "table must have at least one row",
        ));
    }
    let mut last = DistanceBudget::default();
    let mut table = Vec::new();
    for (size, row) in rows.iter().enumerate() {
        let budget = DistanceBudget {
            insertions: row[0],
            deletions: row[1],
            total: row[2],
        };
        let row_label = format!("row {size} {row:?}");
        if budget.insertions < last.insertions
            || budget.deletions < last.deletions
            || budget.total < last.total
        {
            return Err(DetectionError::infeasible(
                "distance_table",
                row_label,
                "allowed distances must not decrease with cluster size",
            ));
        }
        if budget.total < budget.insertions || budget.total < budget.deletions {
            return Err(DetectionError::infeasible(
                "distance_table",
                row_label,
                "total distance must be at least the insertion and deletion distance",
            ));
        }
        last = budget;
        table.push(budget);
    }
    Ok(table)
}

impl Parameter {
    /// Validate all settings that do not depend on the dataset
    ///
    pub fn from_settings(settings: &ParameterSettings) -> DetectionResult<Self> {
        let table_rows = match (&settings.distance_table, settings.distance_table_preset) {
            (Some(_), Some(preset)) => {
                return Err(DetectionError::configuration(
                    "distance_table_preset",
                    preset,
                    "cannot be combined with an explicit distance table",
                ));
            }
            (Some(rows), None) => Some(rows.clone()),
            (None, Some(preset)) => Some(preset.rows()),
            (None, None) => None,
        };

        let distance = match (settings.max_distance, table_rows) {
            (Some(max_distance), Some(_)) => {
                return Err(DetectionError::configuration(
                    "max_distance",
                    max_distance,
                    "cannot be combined with a distance table",
                ));
            }
            (None, None) => {
                return Err(DetectionError::configuration(
                    "max_distance",
                    "none",
                    "either a maximum distance or a distance table is required",
                ));
            }
            (Some(max_distance), None) => DistanceSetting::Fixed(max_distance),
            (None, Some(rows)) => DistanceSetting::Table(check_distance_table(&rows)?),
        };

        let min_cluster_size = settings.min_cluster_size.unwrap_or(
            settings
                .distance_table_preset
                .map_or(DEFAULT_MIN_CLUSTER_SIZE, |x| x.min_cluster_size()),
        );
        if min_cluster_size == 0 {
            return Err(DetectionError::infeasible(
                "min_cluster_size",
                min_cluster_size,
                "must be at least 1",
            ));
        }

        if settings.min_covered_genomes == 1 {
            return Err(DetectionError::infeasible(
                "min_covered_genomes",
                settings.min_covered_genomes,
                "must be 0 (all genomes) or at least 2",
            ));
        }

        if settings.operation_mode != OperationMode::Reference {
            return Err(DetectionError::configuration(
                "operation_mode",
                settings.operation_mode,
                "only the reference mode is supported",
            ));
        }

        if !settings.grouping_factor.is_finite() || settings.grouping_factor <= 0.0 {
            return Err(DetectionError::configuration(
                "grouping_factor",
                settings.grouping_factor,
                "must be greater than 0",
            ));
        }

        if let ReferenceType::Genome(name) = &settings.reference_type {
            if name.is_empty() {
                return Err(DetectionError::configuration(
                    "reference_genome",
                    "''",
                    "reference genome name is empty",
                ));
            }
        }

        Ok(Self {
            distance,
            min_cluster_size,
            min_covered_genomes: settings.min_covered_genomes,
            operation_mode: settings.operation_mode,
            reference_type: settings.reference_type.clone(),
            grouping_factor: settings.grouping_factor,
            signed_grouping: settings.signed_grouping,
            memory_reduction: settings.memory_reduction,
            strict_occurrences: settings.strict_occurrences,
            ref_in_ref: settings.ref_in_ref,
            compute_statistics: settings.compute_statistics,
            correction: settings.correction,
            thread_count: settings.thread_count,
        })
    }

    /// Distance budget for clusters of the given size
    pub fn budget(&self, cluster_size: usize) -> DistanceBudget {
        match &self.distance {
            DistanceSetting::Fixed(distance) => DistanceBudget::fixed(*distance),
            DistanceSetting::Table(table) => table[cluster_size.min(table.len() - 1)],
        }
    }

    /// Largest budget used for any cluster size
    pub fn max_budget(&self) -> DistanceBudget {
        match &self.distance {
            DistanceSetting::Fixed(distance) => DistanceBudget::fixed(*distance),
            DistanceSetting::Table(table) => table[table.len() - 1],
        }
    }

    /// Check the parameters against the dataset and list the anchor genomes of the search
    ///
    pub fn resolve_anchors(&self, dataset: &DataSet) -> DetectionResult<Vec<usize>> {
        let genome_count = dataset.genome_count();
        if genome_count < 2 {
            return Err(DetectionError::infeasible(
                "genomes",
                genome_count,
                "at least two genomes are required",
            ));
        }
        if self.min_covered_genomes > genome_count {
            return Err(DetectionError::infeasible(
                "min_covered_genomes",
                self.min_covered_genomes,
                &format!("exceeds the genome count of {genome_count}"),
            ));
        }

        match &self.reference_type {
            ReferenceType::AllAgainstAll => Ok((0..genome_count).collect()),
            ReferenceType::Genome(name) => match dataset.find_genome_by_name(name) {
                Ok(genome_index) => Ok(vec![genome_index]),
                Err(candidates) if candidates.is_empty() => Err(DetectionError::configuration(
                    "reference_genome",
                    name,
                    "matches no genome name",
                )),
                Err(candidates) => Err(DetectionError::configuration(
                    "reference_genome",
                    name,
                    &format!("matches {} genome names", candidates.len()),
                )),
            },
        }
    }

    /// Quorum as a number of genome groups
    ///
    pub fn get_quorum(&self, group_count: usize) -> usize {
        if self.min_covered_genomes == 0 {
            group_count
        } else {
            if self.min_covered_genomes > group_count {
                warn!(
                    "Quorum of {} genomes exceeds the {group_count} genome groups, no cluster can be found",
                    self.min_covered_genomes
                );
            }
            self.min_covered_genomes
        }
    }
}

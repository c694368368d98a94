use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use const_format::concatcp;
use log::info;
use refclust::parameter::{
    DEFAULT_GROUPING_FACTOR, DistanceTablePreset, ParameterSettings, ReferenceType,
};
use refclust::significance::MultipleTestingCorrection;
use serde::{Deserialize, Serialize};
use simple_error::{SimpleResult, bail};
use unwrap::unwrap;

use super::utils::{check_optional_filename, check_required_filename};

pub const SETTINGS_FILENAME: &str = "refclust.settings.json";

#[derive(Args, Deserialize, Serialize)]
pub struct DetectSettings {
    /// Directory for all detection output (must not already exist)
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_output"))]
    pub output_dir: Utf8PathBuf,

    /// Input genomes in json format
    ///
    /// The file holds one object with a "genomes" list. Each genome has a "name" and a list of
    /// "chromosomes", each with a "name" and a list of signed gene family ids in "genes". The id 0
    /// marks a gene without family assignment.
    ///
    #[arg(long = "genomes", value_name = "FILE")]
    pub genomes_filename: String,

    /// Maximum distance allowed between a cluster and each of its occurrences
    #[arg(long, value_name = "DISTANCE")]
    pub max_distance: Option<usize>,

    /// Per cluster size distance limits in json format
    ///
    /// The file holds a list of [insertions, deletions, total] rows, where row i gives the limits
    /// for clusters of size i. Sizes beyond the last row use the last row.
    ///
    #[arg(long = "distance-table", value_name = "FILE")]
    pub distance_table_filename: Option<String>,

    /// Use a built-in distance table
    #[arg(long, value_enum)]
    pub distance_table_preset: Option<DistanceTablePreset>,

    /// Minimum cluster size. Defaults to the preset's minimum size, or 3.
    #[arg(long = "min-size", value_name = "SIZE")]
    pub min_cluster_size: Option<usize>,

    /// Minimum number of genome groups covered by a cluster, 0 requires all groups
    #[arg(long, default_value_t = 0)]
    pub quorum: usize,

    /// Only search clusters anchored in the genome matching this name
    #[arg(long, value_name = "NAME")]
    pub reference_genome: Option<String>,

    /// Group genomes with normalized breakpoint distance up to this value. Values above 1.0
    /// disable grouping.
    #[arg(long, default_value_t = DEFAULT_GROUPING_FACTOR)]
    pub grouping_factor: f64,

    /// Compare gene orientation when grouping genomes
    #[arg(long)]
    pub signed_grouping: bool,

    /// Search on the full gene family alphabet instead of collapsing singleton families
    #[arg(long)]
    pub no_memory_reduction: bool,

    /// Drop alternative occurrences overlapping a better occurrence in the same genome
    #[arg(long)]
    pub strict_occurrences: bool,

    /// Also report repeated occurrences of a cluster within its reference genome
    #[arg(long)]
    pub ref_in_ref: bool,

    /// Skip the significance computation, all p-values are reported as 1
    #[arg(long)]
    pub no_statistics: bool,

    /// Multiple testing correction of the cluster p-values
    #[arg(long, value_enum, default_value_t = MultipleTestingCorrection::BenjaminiHochberg)]
    pub correction: MultipleTestingCorrection,

    #[arg(hide = true, long)]
    pub disable_path_canonicalization: bool,
}

impl DetectSettings {
    /// Translate the command-line into detection parameter settings
    ///
    pub fn to_parameter_settings(
        &self,
        thread_count: usize,
        distance_table: Option<Vec<[usize; 3]>>,
    ) -> ParameterSettings {
        ParameterSettings {
            max_distance: self.max_distance,
            distance_table,
            distance_table_preset: self.distance_table_preset,
            min_cluster_size: self.min_cluster_size,
            min_covered_genomes: self.quorum,
            reference_type: match &self.reference_genome {
                Some(name) => ReferenceType::Genome(name.clone()),
                None => ReferenceType::AllAgainstAll,
            },
            grouping_factor: self.grouping_factor,
            signed_grouping: self.signed_grouping,
            memory_reduction: !self.no_memory_reduction,
            strict_occurrences: self.strict_occurrences,
            ref_in_ref: self.ref_in_ref,
            compute_statistics: !self.no_statistics,
            correction: self.correction,
            thread_count,
            ..Default::default()
        }
    }
}

pub fn validate_and_fix_detect_settings(settings: DetectSettings) -> SimpleResult<DetectSettings> {
    check_required_filename(&settings.genomes_filename, "genomes")?;

    check_optional_filename(settings.distance_table_filename.as_ref(), "distance table")?;

    let distance_option_count = [
        settings.max_distance.is_some(),
        settings.distance_table_filename.is_some(),
        settings.distance_table_preset.is_some(),
    ]
    .into_iter()
    .filter(|x| *x)
    .count();
    if distance_option_count != 1 {
        bail!(
            "Exactly one of --max-distance, --distance-table or --distance-table-preset must be given"
        );
    }

    if settings.quorum == 1 {
        bail!("--quorum must be 0 (all genomes) or at least 2");
    }

    if !settings.grouping_factor.is_finite() || settings.grouping_factor <= 0.0 {
        bail!("--grouping-factor must be greater than 0");
    }

    // Canonicalize file paths:
    fn canonicalize_string_path(s: &str) -> SimpleResult<String> {
        match Utf8PathBuf::from(s).canonicalize_utf8() {
            Ok(x) => Ok(x.to_string()),
            Err(e) => bail!("Can't canonicalize path '{s}': {e}"),
        }
    }

    let mut settings = settings;
    if !settings.disable_path_canonicalization {
        settings.genomes_filename = canonicalize_string_path(&settings.genomes_filename)?;
        settings.distance_table_filename = settings
            .distance_table_filename
            .map(|x| canonicalize_string_path(&x))
            .transpose()?;
    }

    Ok(settings)
}

pub fn read_distance_table(filename: &str) -> Vec<[usize; 3]> {
    use std::fs::File;
    use std::io::BufReader;

    let file = unwrap!(
        File::open(filename),
        "Unable to open distance table json file: `{filename}`"
    );
    let reader = BufReader::new(file);
    unwrap!(
        serde_json::from_reader(reader),
        "Unable to parse distance table from json file: `{filename}`"
    )
}

pub fn write_detect_settings(output_dir: &Utf8Path, settings: &DetectSettings) {
    let filename = output_dir.join(SETTINGS_FILENAME);

    info!("Writing detect settings to file: '{filename}'");

    let f = unwrap!(
        std::fs::File::create(&filename),
        "Unable to create detect settings json file: '{filename}'"
    );

    unwrap!(
        serde_json::to_writer_pretty(&f, &settings),
        "Unable to write detect settings json file: '{filename}'"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_settings() -> DetectSettings {
        DetectSettings {
            output_dir: Utf8PathBuf::from("out"),
            genomes_filename: String::new(),
            max_distance: Some(1),
            distance_table_filename: None,
            distance_table_preset: None,
            min_cluster_size: None,
            quorum: 3,
            reference_genome: Some("genome2".to_string()),
            grouping_factor: DEFAULT_GROUPING_FACTOR,
            signed_grouping: false,
            no_memory_reduction: true,
            strict_occurrences: false,
            ref_in_ref: false,
            no_statistics: false,
            correction: MultipleTestingCorrection::Bonferroni,
            disable_path_canonicalization: true,
        }
    }

    #[test]
    fn test_missing_genomes_file() {
        assert!(validate_and_fix_detect_settings(get_settings()).is_err());
    }

    #[test]
    fn test_to_parameter_settings() {
        let p = get_settings().to_parameter_settings(4, None);
        assert_eq!(p.max_distance, Some(1));
        assert_eq!(p.min_covered_genomes, 3);
        assert_eq!(p.reference_type, ReferenceType::Genome("genome2".to_string()));
        assert!(!p.memory_reduction);
        assert!(p.compute_statistics);
        assert_eq!(p.correction, MultipleTestingCorrection::Bonferroni);
        assert_eq!(p.thread_count, 4);
    }
}

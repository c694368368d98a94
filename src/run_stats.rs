//! Track stats for the whole detection run
//!

use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::{Deserialize, Serialize};
use unwrap::unwrap;

pub const RUN_STATS_FILENAME: &str = "run.stats.json";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RunStats {
    pub genome_count: usize,
    pub genome_group_count: usize,
    pub anchor_genome_count: usize,

    /// Distinct gene families of the input, placeholders excluded
    pub family_count: usize,

    /// Family alphabet used by the search after memory reduction
    pub search_alphabet_size: usize,

    /// Clusters accepted by the anchor searches before the merge
    pub candidate_cluster_count: usize,

    pub cluster_count: usize,

    pub search_time_secs: f64,
    pub statistics_time_secs: f64,
}

/// Write run_stats structure out in json format
pub fn write_run_stats(output_dir: &Utf8Path, run_stats: &RunStats) {
    let filename = output_dir.join(RUN_STATS_FILENAME);

    info!("Writing run statistics to file: '{filename}'");

    let f = unwrap!(
        File::create(&filename),
        "Unable to create run statistics json file: '{filename}'"
    );

    unwrap!(
        serde_json::to_writer_pretty(&f, &run_stats),
        "Unable to write run statistics json file: '{filename}'"
    );
}

use std::error;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use camino::Utf8Path;
use log::info;
use refclust::progress::DetectionStage;
use refclust::run_stats::write_run_stats;
use refclust::{DataSet, DetectionOutcome, DetectionTask, Parameter, ReferenceCluster};
use thousands::Separable;
use unwrap::unwrap;

use crate::cli;

pub const CLUSTERS_FILENAME: &str = "clusters.json";

fn read_dataset(filename: &str) -> DataSet {
    let file = unwrap!(
        File::open(filename),
        "Unable to open genomes json file: `{filename}`"
    );
    let reader = BufReader::new(file);
    unwrap!(
        serde_json::from_reader(reader),
        "Unable to parse genomes from json file: `{filename}`"
    )
}

fn write_clusters(output_dir: &Utf8Path, clusters: &[ReferenceCluster]) {
    let filename = output_dir.join(CLUSTERS_FILENAME);

    info!("Writing clusters to file: '{filename}'");

    let f = unwrap!(
        File::create(&filename),
        "Unable to create clusters json file: '{filename}'"
    );

    unwrap!(
        serde_json::to_writer_pretty(&f, &clusters),
        "Unable to write clusters json file: '{filename}'"
    );
}

pub fn run_detect(
    shared_settings: &cli::SharedSettings,
    settings: &cli::DetectSettings,
) -> Result<(), Box<dyn error::Error>> {
    cli::write_detect_settings(&settings.output_dir, settings);

    let distance_table = settings
        .distance_table_filename
        .as_deref()
        .map(cli::read_distance_table);
    let parameter = Parameter::from_settings(
        &settings.to_parameter_settings(shared_settings.thread_count, distance_table),
    )?;

    let dataset = read_dataset(&settings.genomes_filename);
    info!(
        "Read {} genomes with {} genes",
        dataset.genome_count(),
        dataset
            .genomes
            .iter()
            .map(|x| x.total_gene_count())
            .sum::<usize>()
            .separate_with_commas()
    );

    let handle = DetectionTask::new(Arc::new(dataset), parameter)
        .with_debug(shared_settings.debug_candidates)
        .start();

    let mut last_stage = DetectionStage::Init;
    let mut last_decile = 0;
    for event in handle.progress().iter() {
        if event.stage != last_stage {
            info!("Detection stage: {}", event.stage);
            last_stage = event.stage;
        }
        let decile = event.percent / 10;
        if decile > last_decile {
            info!("Detection progress: {}%", event.percent);
            last_decile = decile;
        }
    }

    match handle.result()? {
        DetectionOutcome::Completed {
            clusters,
            run_stats,
        } => {
            if let Some(best) = clusters.iter().min_by(|a, b| {
                a.best_combined_p_value_corrected
                    .total_cmp(&b.best_combined_p_value_corrected)
            }) {
                info!(
                    "Most significant cluster: id {} size {} found in {} genomes, corrected p-value {:.3e}",
                    best.id,
                    best.size,
                    best.best_occurrence().support,
                    best.best_combined_p_value_corrected
                );
            }
            write_clusters(&settings.output_dir, &clusters);
            write_run_stats(&settings.output_dir, &run_stats);
            Ok(())
        }
        DetectionOutcome::Cancelled => Err("Cluster detection was cancelled".into()),
    }
}

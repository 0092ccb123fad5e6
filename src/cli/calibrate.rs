use anyhow::{Context, Result};
use log::info;
use plateqc::qc::image::{removal_summary, stack_plates, RemovalSummary};
use plateqc::qc::{calibrate, detect_two_sided, Cutoffs};
use plateqc::table::{columns, ObservationTable};
use serde::Serialize;
use std::path::PathBuf;

use super::Config;

/// Per-image table written by the engine into each plate directory
const IMAGE_TABLE: &str = "Image.csv";

#[derive(Serialize)]
struct MetricReport {
    cutoffs: Cutoffs,
    outliers: RemovalSummary,
}

/// Calibrate whole-image cutoffs over every channel of every plate
pub fn run(
    config: &Config,
    plate_dirs: Vec<PathBuf>,
    blur_z: Option<f64>,
    saturation_z: Option<f64>,
    decimals: Option<u32>,
    json: bool,
) -> Result<()> {
    let channels = config.whole_image.channels();
    let metrics = config.whole_image.metrics(blur_z, saturation_z);
    let decimals = decimals.or(config.whole_image.decimals).unwrap_or(2);
    let metric_names: Vec<String> = metrics.iter().map(|m| m.name.clone()).collect();

    let mut plates = Vec::with_capacity(plate_dirs.len());
    for dir in &plate_dirs {
        let plate = dir
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Not a plate directory: {}", dir.display()))?
            .to_string();
        let path = dir.join(IMAGE_TABLE);
        let table = ObservationTable::from_csv(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        info!("Loaded plate: {}, {} image sets", plate, table.num_rows());
        plates.push((plate, table));
    }

    let stacked = stack_plates(&plates, &channels, &metric_names)
        .context("Failed to stack per-channel metrics")?;
    info!(
        "Stacked {} rows across {} plate(s) and {} channel(s)",
        stacked.num_rows(),
        plates.len(),
        channels.len()
    );

    let key_columns = [columns::PLATE, columns::WELL, columns::SITE, columns::CHANNEL];
    let mut reports = Vec::with_capacity(metrics.len());
    for metric in &metrics {
        let cutoffs = calibrate(&stacked, &metric.name, metric.z, metric.policy)
            .with_context(|| format!("Failed to calibrate {}", metric.name))?
            .rounded(decimals);
        let outliers = detect_two_sided(&stacked, &metric.name, metric.z, &key_columns)?;
        let summary = removal_summary(&stacked, &outliers)?;
        reports.push(MetricReport {
            cutoffs,
            outliers: summary,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!("Whole-image QC cutoffs");
    println!("======================");
    for report in &reports {
        println!("{}", report.cutoffs);
        println!(
            "  {} of {} image sets flagged ({:.2}%)",
            report.outliers.removed_combinations,
            report.outliers.total_combinations,
            report.outliers.percent_removed
        );
        for (channel, count) in &report.outliers.per_channel {
            println!("    {}: {}", channel, count);
        }
    }
    Ok(())
}

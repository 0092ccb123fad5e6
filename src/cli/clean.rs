use anyhow::{Context, Result};
use log::info;
use plateqc::qc::{find_outliers, CleanedProfileWriter, CleaningStats, OutlierSet, QcCondition};
use plateqc::table::{CompressionType, ObservationTable};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use super::Config;

/// Remove single-cell outliers from every plate and persist the rest
pub fn run(
    config: &Config,
    mut inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    compression_level: Option<i32>,
    json: bool,
) -> Result<()> {
    let conditions = config.single_cell.conditions()?;
    let metadata = config.single_cell.metadata_columns();
    let level = compression_level
        .or(config.single_cell.compression_level)
        .unwrap_or(3);
    let writer = CleanedProfileWriter::new(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?
        .with_compression(CompressionType::Zstd(level));

    inputs.sort_by_key(|path| plateqc::reconcile::plate_id::numeric_key(&plate_name(path)));

    #[cfg(feature = "parallel")]
    let stats: Vec<CleaningStats> = inputs
        .par_iter()
        .map(|path| clean_plate(path, &conditions, &metadata, &writer))
        .collect::<Result<_>>()?;

    #[cfg(not(feature = "parallel"))]
    let stats: Vec<CleaningStats> = inputs
        .iter()
        .map(|path| clean_plate(path, &conditions, &metadata, &writer))
        .collect::<Result<_>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for plate in &stats {
            println!("{}", plate);
        }
    }
    Ok(())
}

fn clean_plate(
    path: &Path,
    conditions: &[QcCondition],
    metadata: &[String],
    writer: &CleanedProfileWriter,
) -> Result<CleaningStats> {
    let plate = plate_name(path);
    let table = ObservationTable::open(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!("Loaded plate: {}, {} cells", plate, table.num_rows());
    let metadata: Vec<&str> = metadata
        .iter()
        .map(String::as_str)
        .filter(|name| table.has_column(name))
        .collect();

    let outliers = conditions
        .iter()
        .map(|condition| {
            let found = find_outliers(&table, &condition.features, &metadata)
                .with_context(|| format!("{}: condition {}", plate, condition.name))?;
            info!("{}: {} cells flagged as {}", plate, found.len(), condition.name);
            Ok(found)
        })
        .collect::<Result<Vec<OutlierSet>>>()?;
    let refs: Vec<&OutlierSet> = outliers.iter().collect();

    writer
        .write(&plate, &table, &refs)
        .with_context(|| format!("Failed to write cleaned profile for {}", plate))
}

/// Plate name: the file name up to the first `_`
fn plate_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split('_').next().unwrap_or_default().to_string()
}

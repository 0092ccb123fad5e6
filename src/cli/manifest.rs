use anyhow::{Context, Result};
use log::info;
use plateqc::manifest::{BarcodePlatemap, ProfileManifest};
use std::path::PathBuf;

/// Print (or write) the per-plate profile manifest as JSON
pub fn run(
    cleaned_dir: PathBuf,
    platemap_dir: PathBuf,
    barcodes: PathBuf,
    output: Option<PathBuf>,
) -> Result<()> {
    let barcodes = BarcodePlatemap::from_path(&barcodes)
        .with_context(|| format!("Failed to read {}", barcodes.display()))?;
    let manifest = ProfileManifest::build(&cleaned_dir, &platemap_dir, &barcodes)?;
    info!("{} plate(s) matched", manifest.len());

    let json = serde_json::to_string_pretty(&manifest)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Manifest written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

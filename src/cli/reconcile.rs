use anyhow::{Context, Result};
use log::{info, warn};
use plateqc::reconcile::plate_id::{DEFAULT_PLATE_PATTERN, DEFAULT_REIMAGED_MARKER};
use plateqc::reconcile::{PlateIdPattern, ReconcileVariant, Reconciler};
use std::path::PathBuf;

use super::Config;

/// Merge re-imaged LoadData CSVs into one CSV per plate
pub fn run(
    config: &Config,
    dir: PathBuf,
    output_dir: Option<PathBuf>,
    variant: Option<ReconcileVariant>,
    pattern: Option<String>,
    remove_sources: bool,
) -> Result<()> {
    let settings = &config.reconcile;
    let variant = variant.or(settings.variant).unwrap_or_default();
    let pattern = pattern
        .or_else(|| settings.pattern.clone())
        .unwrap_or_else(|| DEFAULT_PLATE_PATTERN.to_string());
    let marker = settings
        .reimaged_marker
        .as_deref()
        .unwrap_or(DEFAULT_REIMAGED_MARKER);
    let remove_sources = remove_sources || settings.remove_sources.unwrap_or(false);

    let pattern = PlateIdPattern::new(&pattern, marker)
        .with_context(|| format!("Invalid plate pattern: {}", pattern))?;
    let reconciler = Reconciler::new(output_dir.as_ref().unwrap_or(&dir), variant)
        .with_pattern(pattern)
        .with_expected_plates(settings.expected_plates.clone().unwrap_or_default());

    let inputs = reconciler
        .discover(&dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    info!("Found {} LoadData CSV(s) in {}", inputs.len(), dir.display());

    let outcome = reconciler.run(&inputs)?;

    // Use colorized output if available
    #[cfg(feature = "colorized_output")]
    {
        println!("{}", outcome.report.format_colored());
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        println!("{}", outcome.report);
    }

    if remove_sources {
        if outcome.data_loss.is_clean() {
            let removed = outcome.remove_sources()?;
            info!("Removed {} source CSV(s)", removed);
        } else {
            warn!("Source CSVs kept: some inputs were not reconciled");
        }
    }

    if outcome.report.has_failures() {
        anyhow::bail!(
            "{} plate(s) could not be reconciled",
            outcome.report.failure_count()
        );
    }
    Ok(())
}

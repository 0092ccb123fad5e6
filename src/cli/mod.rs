use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use plateqc::reconcile::ReconcileVariant;
use std::path::PathBuf;

mod calibrate;
mod clean;
mod config;
mod loaddata;
mod manifest;
mod reconcile;
mod run;

pub use config::Config;

/// plateqc - Quality control for high-content screening image analysis
#[derive(Parser)]
#[command(name = "plateqc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// LoadData CSV flavor to reconcile.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum VariantArg {
    /// Image paths only
    Original,
    /// Image paths plus illumination correction functions
    WithIllum,
}

impl From<VariantArg> for ReconcileVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Original => ReconcileVariant::Original,
            VariantArg::WithIllum => ReconcileVariant::WithIllum,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate whole-image blur and saturation cutoffs
    Calibrate {
        /// Per-plate engine output directories, each holding Image.csv
        #[arg(value_name = "PLATE_DIR", required = true)]
        plate_dirs: Vec<PathBuf>,

        /// Multiplier for the blur metric (two-sided)
        #[arg(long)]
        blur_z: Option<f64>,

        /// Multiplier for the saturation metric (upper only)
        #[arg(long)]
        saturation_z: Option<f64>,

        /// Decimal places of the reported cutoffs
        #[arg(long)]
        decimals: Option<u32>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove single-cell outliers and write cleaned profiles
    Clean {
        /// Converted per-plate profiles (Parquet or CSV)
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for <plate>_cleaned.parquet files
        #[arg(short, long, default_value = "cleaned_profiles")]
        output_dir: PathBuf,

        /// Compression level for ZSTD (1-22, default: 3)
        #[arg(short = 'c', long)]
        compression_level: Option<i32>,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge re-imaged LoadData CSVs into their original plates
    Reconcile {
        /// Directory of LoadData CSVs
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Directory for the reconciled CSVs (defaults to DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// LoadData CSV flavor
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,

        /// Plate identifier regular expression
        #[arg(long)]
        pattern: Option<String>,

        /// Delete the source CSVs when every file was used
        #[arg(long)]
        remove_sources: bool,
    },

    /// Generate LoadData CSVs for every acquisition folder
    Loaddata {
        /// Root of the acquisition export
        #[arg(value_name = "INDEX_ROOT")]
        index_root: PathBuf,

        /// Directory of generator configurations
        #[arg(long, value_name = "DIR")]
        config_dir: PathBuf,

        /// Directory for the generated CSVs
        #[arg(short, long, default_value = "loaddata_csvs")]
        output_dir: PathBuf,

        /// Root of per-plate illumination correction directories
        #[arg(long, value_name = "DIR")]
        illum_dir: Option<PathBuf>,
    },

    /// Run the image-processing engine on every plate in parallel
    Run {
        /// LoadData CSVs (or image directories with --images)
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Engine pipeline file
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Root of per-plate output directories
        #[arg(short, long, default_value = "outputs")]
        output_root: PathBuf,

        /// Inputs are image directories instead of LoadData CSVs
        #[arg(long)]
        images: bool,

        /// Tag of the run in log file names
        #[arg(long)]
        run_name: Option<String>,
    },

    /// Match cleaned profiles with their platemaps
    Manifest {
        /// Directory of cleaned profiles
        #[arg(value_name = "CLEANED_DIR")]
        cleaned_dir: PathBuf,

        /// Directory searched for platemap CSVs
        #[arg(long, value_name = "DIR")]
        platemap_dir: PathBuf,

        /// Barcode to platemap CSV
        #[arg(long, value_name = "FILE")]
        barcodes: PathBuf,

        /// Write the manifest here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Calibrate {
            plate_dirs,
            blur_z,
            saturation_z,
            decimals,
            json,
        } => calibrate::run(&config, plate_dirs, blur_z, saturation_z, decimals, json),
        Commands::Clean {
            inputs,
            output_dir,
            compression_level,
            json,
        } => clean::run(&config, inputs, output_dir, compression_level, json),
        Commands::Reconcile {
            dir,
            output_dir,
            variant,
            pattern,
            remove_sources,
        } => reconcile::run(
            &config,
            dir,
            output_dir,
            variant.map(ReconcileVariant::from),
            pattern,
            remove_sources,
        ),
        Commands::Loaddata {
            index_root,
            config_dir,
            output_dir,
            illum_dir,
        } => loaddata::run(&config, index_root, config_dir, output_dir, illum_dir),
        Commands::Run {
            inputs,
            pipeline,
            output_root,
            images,
            run_name,
        } => run::run(&config, inputs, pipeline, output_root, images, run_name),
        Commands::Manifest {
            cleaned_dir,
            platemap_dir,
            barcodes,
            output,
        } => manifest::run(cleaned_dir, platemap_dir, barcodes, output),
    }
}

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::info;
use scenealign::core::{FileNaming, MaskParams, MAX_CLOUD_COVER};
use scenealign::{align_directory, BatchConfig, Inventory, PlacementPolicy};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "scenealign")]
#[command(about = "Mask clouds and align satellite scenes onto a common reference canvas")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the metadata table for a directory of downloaded scenes
    Inventory(InventoryArgs),
    /// Mask and align scenes, then reconcile the metadata table
    Align(AlignArgs),
}

#[derive(Args, Debug)]
struct NamingArgs {
    /// Suffix identifying primary image files
    #[arg(long, default_value = "harmonized_clip_reproject.tif")]
    image_suffix: String,

    /// Suffix of the companion quality-mask files
    #[arg(long, default_value = "3B_udm2_clip_reproject.tif")]
    mask_suffix: String,

    /// Marker ending the scene prefix shared by companion files
    #[arg(long, default_value = "3B")]
    prefix_delimiter: String,
}

impl NamingArgs {
    fn into_naming(self) -> FileNaming {
        FileNaming {
            image_suffix: self.image_suffix,
            mask_suffix: self.mask_suffix,
            prefix_delimiter: self.prefix_delimiter,
            ..FileNaming::default()
        }
    }
}

#[derive(Args, Debug)]
struct InventoryArgs {
    /// Directory of downloaded scenes
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,

    /// Metadata table to write (CSV)
    #[arg(short, long, value_name = "FILE")]
    table: PathBuf,

    /// Copy pristine full-extent scenes into this directory
    #[arg(long, value_name = "DIR")]
    selected: Option<PathBuf>,

    #[command(flatten)]
    naming: NamingArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Placement {
    /// Keep the part of a scene that lands on the canvas
    Truncate,
    /// Fail scenes that do not fit on the canvas
    Reject,
}

#[derive(Args, Debug)]
struct AlignArgs {
    /// Directory of downloaded scenes
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,

    /// Scratch directory for transient masked files
    #[arg(long, value_name = "DIR")]
    temp: PathBuf,

    /// Directory receiving aligned scenes
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Metadata table produced by `inventory` (CSV)
    #[arg(short, long, value_name = "FILE")]
    table: PathBuf,

    /// Full-extent reference scene (default: first pristine scene in the table)
    #[arg(short, long, value_name = "FILE")]
    reference: Option<PathBuf>,

    /// Scenes with cloud cover at or above this fraction are skipped
    #[arg(long, default_value_t = MAX_CLOUD_COVER)]
    max_cloud_cover: f64,

    /// Number of worker threads (default: all available)
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// What to do with scenes that overhang the reference canvas
    #[arg(long, value_enum, default_value_t = Placement::Truncate)]
    placement: Placement,

    /// 0-indexed quality-mask bands that mark a pixel unusable
    #[arg(long, value_delimiter = ',', default_values_t = [3usize, 4, 5])]
    mask_bands: Vec<usize>,

    #[command(flatten)]
    naming: NamingArgs,
}

fn run_inventory(args: InventoryArgs) -> Result<()> {
    let inventory = Inventory::new(args.naming.into_naming());
    let table = inventory
        .scan(&args.input)
        .with_context(|| format!("Failed to scan {}", args.input.display()))?;
    let output = inventory
        .write(&table, &args.table, &args.input, args.selected.as_deref())
        .with_context(|| format!("Failed to write {}", args.table.display()))?;

    info!(
        "{} scenes, {} full extent, {} pristine",
        table.len(),
        table.iter().filter(|r| r.is_fullest()).count(),
        output.pristine.len()
    );
    Ok(())
}

fn run_align(args: AlignArgs) -> Result<()> {
    if !(0.0..=1.0).contains(&args.max_cloud_cover) {
        bail!("max cloud cover must be a fraction in [0, 1], got {}", args.max_cloud_cover);
    }

    let mut config = BatchConfig::new(args.input, args.temp, args.output);
    config.reference_path = args.reference;
    config.max_cloud_cover = args.max_cloud_cover;
    if let Some(n) = args.workers {
        config.num_workers = n;
    }
    config.placement = match args.placement {
        Placement::Truncate => PlacementPolicy::Truncate,
        Placement::Reject => PlacementPolicy::Reject,
    };
    config.mask = MaskParams {
        invalid_bands: args.mask_bands,
    };
    config.naming = args.naming.into_naming();
    info!("Using {} workers", config.num_workers);

    let summary = align_directory(config, &args.table)
        .with_context(|| format!("Alignment failed for table {}", args.table.display()))?;

    info!("Reconciled table: {}", summary.tables.expanded.display());
    info!("Reference candidates: {}", summary.tables.reference_candidates.display());
    if !summary.is_success() {
        bail!("{} of {} files failed", summary.batch.failed(), summary.batch.considered);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let start = Instant::now();
    match cli.command {
        Command::Inventory(args) => run_inventory(args)?,
        Command::Align(args) => run_align(args)?,
    }
    info!("Run Process Time: {:.2?}", start.elapsed());
    Ok(())
}

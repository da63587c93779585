//! Sequence loader benchmark.
//!
//! Discovers paired WRF / reanalysis files, splits them chronologically,
//! builds a windowed dataset over one split and iterates it in shuffled
//! batches, reporting shapes and throughput.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use sequence_loader::{
    split_train_val_test, DatasetConfig, DatasetSplit, ExtractorKind, FilePairs, LoaderConfig,
    NpyExtractor, SampleLoader, SequenceDataset, SplitFractions, VariableExtractor,
    WindowedDataset,
};

#[derive(Parser, Debug)]
#[command(name = "loader-bench")]
#[command(about = "Iterate windowed WRF/ERA training samples and report throughput")]
struct Args {
    /// Directory holding model-output files
    #[arg(long, env = "WRF_DIR")]
    wrf_dir: PathBuf,

    /// Directory holding reanalysis files
    #[arg(long, env = "ERA_DIR")]
    era_dir: PathBuf,

    /// Basename pattern for both directories
    #[arg(long, default_value = "*.npy")]
    pattern: String,

    /// Dataset configuration file (YAML); environment variables otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Train fraction
    #[arg(long, default_value_t = 0.7)]
    train: f64,

    /// Validation fraction
    #[arg(long, default_value_t = 0.1)]
    val: f64,

    /// Test fraction
    #[arg(long, default_value_t = 0.2)]
    test: f64,

    /// Split to iterate: train, val or test
    #[arg(long, default_value = "train")]
    split: String,

    /// Override time steps per sample
    #[arg(long)]
    seq_len: Option<usize>,

    /// Override the land mask path
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Override the extractor: npy or netcdf
    #[arg(long)]
    extractor: Option<String>,

    /// Samples per batch
    #[arg(short, long, default_value_t = 3)]
    batch_size: usize,

    /// Parallel sample workers (0 = sequential)
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Passes over the split
    #[arg(long, default_value_t = 1)]
    epochs: usize,

    /// Shuffle seed
    #[arg(long)]
    seed: Option<u64>,

    /// Keep chronological sample order
    #[arg(long)]
    no_shuffle: bool,

    /// Skip samples that fail to load instead of aborting
    #[arg(long)]
    skip_failed: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON logs and a JSON summary
    #[arg(long)]
    json: bool,
}

/// Result of a benchmark run.
#[derive(Debug, Serialize)]
struct RunSummary {
    split: String,
    files: usize,
    samples: usize,
    epochs: usize,
    batches: usize,
    samples_loaded: usize,
    input_shape: Option<Vec<usize>>,
    target_shape: Option<Vec<usize>>,
    elapsed_secs: f64,
    samples_per_sec: f64,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(&args.log_level, args.json)?;
    info!("Starting sequence loader benchmark");

    let config = dataset_config(&args)?;
    info!(
        seq_len = config.seq_len,
        file_len = config.file_len,
        extractor = %config.extractor,
        mask = %config.mask_path.display(),
        "Loaded configuration"
    );

    let fractions = SplitFractions::new(args.train, args.val, args.test);
    let split = split_train_val_test(&args.wrf_dir, &args.era_dir, &args.pattern, fractions)
        .context("Failed to discover and split input files")?;
    let pairs = select_split(split, &args.split)?;
    if pairs.is_empty() {
        bail!("Split '{}' has no files", args.split);
    }
    let files = pairs.len();

    let extractor = build_extractor(&config)?;
    let dataset = WindowedDataset::builder()
        .name(args.split.clone())
        .config(config)
        .input_files(pairs.wrf)
        .target_files(pairs.era)
        .extractor(extractor)
        .build()
        .context("Failed to build dataset")?;

    let summary = run(Arc::new(dataset), &args, files)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!(
            batches = summary.batches,
            samples = summary.samples_loaded,
            elapsed_secs = summary.elapsed_secs,
            samples_per_sec = summary.samples_per_sec,
            "Finished"
        );
    }
    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Dataset configuration from file or environment, with CLI overrides applied.
fn dataset_config(args: &Args) -> Result<DatasetConfig> {
    let mut config = match &args.config {
        Some(path) => DatasetConfig::from_yaml(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => DatasetConfig::from_env(),
    };

    if let Some(seq_len) = args.seq_len {
        config.seq_len = seq_len;
    }
    if let Some(mask) = &args.mask {
        config.mask_path = mask.clone();
    }
    if let Some(extractor) = &args.extractor {
        config.extractor = extractor.parse().context("Invalid --extractor")?;
    }

    config.validate().context("Invalid dataset configuration")?;
    Ok(config)
}

fn select_split(split: DatasetSplit, name: &str) -> Result<FilePairs> {
    match name.to_lowercase().as_str() {
        "train" => Ok(split.train),
        "val" | "validation" => Ok(split.val),
        "test" => Ok(split.test),
        other => bail!("Unknown split '{}' (expected train, val or test)", other),
    }
}

fn build_extractor(config: &DatasetConfig) -> Result<Arc<dyn VariableExtractor>> {
    match config.extractor {
        ExtractorKind::Npy => Ok(Arc::new(NpyExtractor::new().with_file_len(config.file_len))),
        #[cfg(feature = "native")]
        ExtractorKind::NetCdf => {
            netcdf_parser::silence_hdf5_errors();
            Ok(Arc::new(
                netcdf_parser::WrfNetCdfExtractor::new().with_file_len(config.file_len),
            ))
        }
        #[cfg(not(feature = "native"))]
        ExtractorKind::NetCdf => {
            bail!("NetCDF extraction requires building with the `native` feature")
        }
    }
}

fn run(dataset: Arc<dyn SequenceDataset>, args: &Args, files: usize) -> Result<RunSummary> {
    let mut loader_config = LoaderConfig::new()
        .batch_size(args.batch_size)
        .workers(args.workers)
        .shuffle(!args.no_shuffle)
        .skip_failed(args.skip_failed);
    if let Some(seed) = args.seed {
        loader_config = loader_config.seed(seed);
    }

    let samples = dataset.len();
    let mut loader = SampleLoader::new(dataset, loader_config).context("Failed to create loader")?;
    info!(
        split = %args.split,
        files = files,
        samples = samples,
        batches_per_epoch = loader.num_batches(),
        "Iterating"
    );

    let mut summary = RunSummary {
        split: args.split.clone(),
        files,
        samples,
        epochs: args.epochs,
        batches: 0,
        samples_loaded: 0,
        input_shape: None,
        target_shape: None,
        elapsed_secs: 0.0,
        samples_per_sec: 0.0,
    };

    let start = Instant::now();
    for epoch in 0..args.epochs {
        for batch in loader.epoch() {
            let batch = batch.with_context(|| format!("Failed to load batch in epoch {}", epoch))?;
            debug!(
                epoch = epoch,
                input = ?batch.inputs.shape(),
                target = ?batch.targets.shape(),
                "Batch"
            );
            summary.batches += 1;
            summary.samples_loaded += batch.len();
            summary.input_shape.get_or_insert_with(|| batch.inputs.shape().to_vec());
            summary.target_shape.get_or_insert_with(|| batch.targets.shape().to_vec());
        }
    }

    summary.elapsed_secs = start.elapsed().as_secs_f64();
    if summary.elapsed_secs > 0.0 {
        summary.samples_per_sec = summary.samples_loaded as f64 / summary.elapsed_secs;
    }
    Ok(summary)
}

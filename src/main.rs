//! episode-batcher CLI.
//!
//! Drains a JSON Lines episode file, runs one scheduling session per worker
//! and prints the running total of batched steps.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use episode_batcher::{
    Config, EpisodeLoader, EpisodeStore, HistoryTransformer, JsonlSource, TensorAssembler,
};

#[derive(Parser, Debug)]
#[command(name = "episode-batcher", version)]
#[command(about = "Stream fixed-width batches from an episodic JSONL file")]
struct Args {
    /// JSON Lines file with one step record per line
    #[arg(short, long)]
    episodes: PathBuf,

    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target batch width
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Number of worker partitions
    #[arg(short = 'w', long)]
    num_workers: Option<usize>,

    /// Base seed for backlog shuffling
    #[arg(long)]
    seed: Option<u64>,

    /// Start episodes in file order instead of shuffling
    #[arg(long)]
    no_shuffle: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(batch_size) = args.batch_size {
        config.loader.batch_size = batch_size;
    }
    if let Some(num_workers) = args.num_workers {
        config.loader.num_workers = num_workers;
    }
    if args.seed.is_some() {
        config.loader.seed = args.seed;
    }
    if args.no_shuffle {
        config.loader.shuffle = false;
    }

    let mut source = JsonlSource::open(&args.episodes)
        .with_context(|| format!("Failed to open {}", args.episodes.display()))?;
    let store = EpisodeStore::build(&mut source)
        .with_context(|| format!("Failed to read episodes from {}", args.episodes.display()))?;

    let loader = EpisodeLoader::new(Arc::new(store), config.loader.clone())?;
    let prototype = HistoryTransformer::new(config.history.clone())?;
    let assembler = TensorAssembler::new(&config.collate, candle_core::Device::Cpu);

    let mut stream = loader.spawn(&prototype, assembler)?;
    let mut total = 0usize;
    let mut batches = 0usize;
    for item in stream.by_ref() {
        let item = item?;
        total += item.inner.batch.batch_size;
        batches += 1;
        let (_, width) = item.inner.batch.input_ids.dims2()?;
        println!(
            "batch: {total} (worker {}, round {}, rows {}, max_len {width})",
            item.worker_id, item.inner.round, item.inner.batch.batch_size
        );
    }

    println!(
        "{batches} batches, {total} steps from {} episodes (seed {})",
        loader.store().len(),
        loader.seed()
    );
    for (worker_id, stats) in stream.stats() {
        println!(
            "worker {worker_id}: {} rounds, {} refills, {} retired",
            stats.rounds, stats.refills, stats.retired
        );
    }
    Ok(())
}

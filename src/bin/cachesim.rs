use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter},
    path::PathBuf,
};

use clap::Parser;
use log::info;
use set_assoc_cache::backing::{FlatMemory, SparseMemory};
use set_assoc_cache::replay::replay;
use set_assoc_cache::{CacheConfig, CacheController};

/// Replays a memory access trace through a set-associative cache and prints
/// the accesses that missed.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Trace file; reads stdin when absent
    trace: Option<PathBuf>,
    #[arg(long, default_value_t = 1 << 30)]
    memory_size: u64,
    #[arg(long, default_value_t = 1 << 20)]
    cache_size: u64,
    #[arg(long, default_value_t = 64)]
    line_size: u64,
    #[arg(long, default_value_t = 8)]
    ways: u64,
    /// Back the cache with one flat buffer instead of page-on-demand memory
    #[arg(long)]
    flat: bool,
    /// Only print the statistics summary
    #[arg(long)]
    stats_only: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = CacheConfig::new(args.memory_size, args.cache_size, args.line_size, args.ways)?;
    info!(
        "{} blocks x {} ways of {}-byte lines",
        config.num_blocks(),
        config.num_ways(),
        config.line_size()
    );

    let input: Box<dyn BufRead> = match &args.trace {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let misses = (!args.stats_only).then(|| BufWriter::new(io::stdout()));

    let stats = if args.flat {
        let mut cache = CacheController::new(config, FlatMemory::new(config.memory_size()))?;
        replay(&mut cache, input, misses)?;
        cache.stats()
    } else {
        let mut cache = CacheController::new(config, SparseMemory::new(config.memory_size()))?;
        replay(&mut cache, input, misses)?;
        info!("{} pages touched", cache.memory().allocated_pages().len());
        cache.stats()
    };
    eprintln!("{stats}");
    Ok(())
}

use std::error::Error;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use permute_cipher::{Cipher, CipherConfig, PartialBlockPolicy, Permutation};

#[derive(Parser, Debug)]
#[command(name = "permute-cipher")]
#[command(version, about = "Block transposition cipher with exhaustive key search", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `permute_cipher=trace`
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt text under a known key
    Encrypt(KeyedArgs),
    /// Decrypt text under a known key
    Decrypt(KeyedArgs),
    /// Print the decryption under every key of the block size
    Search(SearchArgs),
    /// Print a random key
    Keygen {
        #[arg(short, long)]
        block_size: usize,
    },
}

#[derive(Args, Debug)]
struct KeyedArgs {
    #[arg(short, long)]
    block_size: usize,

    /// Key such as `2,3,1`
    #[arg(short, long)]
    key: Permutation,

    /// Decrypt a short final block instead of rejecting it
    #[arg(long)]
    compact: bool,

    /// Input text; read from stdin when omitted
    text: Option<String>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(short, long)]
    block_size: usize,

    /// Spread the key space over the rayon thread pool
    #[arg(long)]
    parallel: bool,

    /// Stop after this many candidates
    #[arg(long)]
    limit: Option<u64>,

    /// Override the configured ceiling on keys searched
    #[arg(long)]
    max_keys: Option<u64>,

    #[arg(long)]
    compact: bool,

    /// Ciphertext; read from stdin when omitted
    text: Option<String>,
}

fn read_text(text: Option<String>) -> io::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let trimmed = input.strip_suffix('\n').unwrap_or(&input);
    let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
    Ok(trimmed.to_string())
}

fn with_policy(config: CipherConfig, compact: bool) -> CipherConfig {
    if compact {
        config.with_partial_block(PartialBlockPolicy::Compact)
    } else {
        config
    }
}

fn run_search(config: CipherConfig, args: SearchArgs) -> Result<(), Box<dyn Error>> {
    let mut config = with_policy(config, args.compact);
    if let Some(max_keys) = args.max_keys {
        config = config.with_max_search_keys(max_keys);
    }
    let ciphertext = read_text(args.text)?;
    let search = Cipher::new(config).search(&ciphertext, args.block_size)?;
    let limit = args.limit.unwrap_or(u64::MAX).min(search.total_keys());

    let start = Instant::now();
    let mut out = io::stdout().lock();
    if args.parallel {
        // Work through the ranges one pool-sized batch at a time so output
        // stays ordered and memory stays bounded.
        let batch = rayon::current_num_threads().max(1);
        let ranges = search.partition(batch * 64);
        let mut printed = 0u64;
        for group in ranges.chunks(batch) {
            let results: Vec<Vec<_>> = group
                .par_iter()
                .map(|range| {
                    search
                        .range(range.clone())
                        .map(|candidates| candidates.collect::<Vec<_>>())
                })
                .collect::<Result<_, _>>()?;
            for candidate in results.into_iter().flatten() {
                if printed == limit {
                    break;
                }
                writeln!(out, "{} -> {}", candidate.key, candidate.text)?;
                printed += 1;
            }
            if printed == limit {
                break;
            }
        }
    } else {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        for candidate in search.iter().take(limit) {
            writeln!(out, "{} -> {}", candidate.key, candidate.text)?;
        }
    }
    out.flush()?;
    info!(elapsed = ?start.elapsed(), keys = limit, "search finished");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => CipherConfig::from_file(path)?,
        None => CipherConfig::default(),
    };

    match cli.command {
        Command::Encrypt(args) => {
            let text = read_text(args.text)?;
            let start = Instant::now();
            let ct = Cipher::new(config).encrypt(&text, args.block_size, &args.key)?;
            info!(elapsed = ?start.elapsed(), len = ct.chars().count(), "encrypted");
            println!("{ct}");
        }
        Command::Decrypt(args) => {
            let text = read_text(args.text)?;
            let start = Instant::now();
            let cipher = Cipher::new(with_policy(config, args.compact));
            let pt = cipher.decrypt(&text, args.block_size, &args.key)?;
            info!(elapsed = ?start.elapsed(), len = pt.chars().count(), "decrypted");
            println!("{pt}");
        }
        Command::Search(args) => run_search(config, args)?,
        Command::Keygen { block_size } => {
            let key = Permutation::random(block_size, &mut rand::rng())?;
            println!("{key}");
        }
    }

    Ok(())
}

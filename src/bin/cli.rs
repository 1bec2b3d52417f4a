//! AtlasDB CLI
//!
//! Command-line interface for inspecting an AtlasDB store file.

use atlasdb::{ListOptions, Store};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasDB CLI
#[derive(Parser, Debug)]
#[command(name = "atlasdb-cli")]
#[command(about = "Inspect and maintain an AtlasDB store file")]
#[command(version)]
struct Args {
    /// Store file
    #[arg(short, long, default_value = "./atlas.db")]
    path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List bucket names
    Buckets,

    /// Print the records of a bucket
    Dump {
        /// The bucket to dump
        bucket: String,

        /// Maximum records to print (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Records to skip first
        #[arg(short, long, default_value = "0")]
        skip: usize,

        /// Newest keys first
        #[arg(short, long)]
        reverse: bool,
    },

    /// Count the records of a bucket
    Count {
        /// The bucket to count
        bucket: String,
    },

    /// Rewrite the store file with only live records
    Compact,

    /// Print store counters
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> atlasdb::Result<()> {
    let store = Store::open_path(&args.path)?;

    let report = store.recovery_report();
    if report.was_truncated() {
        eprintln!("recovered: {} torn bytes removed", report.bytes_truncated);
    }

    match args.command {
        Commands::Buckets => {
            for name in store.bucket_names() {
                println!("{}", name);
            }
        }
        Commands::Dump {
            bucket,
            limit,
            skip,
            reverse,
        } => {
            let mut options = ListOptions::new().limit(limit).skip(skip);
            if reverse {
                options = options.reverse();
            }
            for (key, document) in store.documents(&bucket, options)? {
                println!("{}\t{}", key, document);
            }
        }
        Commands::Count { bucket } => {
            println!("{}", store.count_in(&bucket)?);
        }
        Commands::Compact => {
            let before = store.stats();
            store.compact()?;
            let after = store.stats();
            println!(
                "compacted {} -> {} bytes ({} stale frames dropped)",
                before.file_bytes, after.file_bytes, before.stale_frames
            );
        }
        Commands::Stats => {
            let stats = store.stats();
            println!("buckets:      {}", stats.buckets);
            println!("records:      {}", stats.records);
            println!("file bytes:   {}", stats.file_bytes);
            println!("stale frames: {}", stats.stale_frames);
        }
    }

    store.close()
}

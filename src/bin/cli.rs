//! segstore CLI
//!
//! Opens a store directory, runs one command, and closes the store.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use segstore::{Config, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// segstore CLI
#[derive(Parser, Debug)]
#[command(name = "segstore-cli")]
#[command(about = "Inspect and modify a segstore working directory")]
#[command(version)]
struct Args {
    /// Working directory of the store
    #[arg(short, long, default_value = "./segstore_data")]
    dir: String,

    /// MemTable size in bytes that triggers a flush
    #[arg(short = 't', long, default_value_t = segstore::config::DEFAULT_FLUSH_THRESHOLD_BYTES)]
    flush_threshold: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// List live entries in key order
    Scan {
        /// First key (inclusive)
        #[arg(long)]
        from: Option<String>,

        /// Last key (exclusive)
        #[arg(long)]
        to: Option<String>,
    },

    /// Flush the memtable to a new segment
    Flush,

    /// Print store counters
    Stats,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,segstore=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .working_dir(&args.dir)
        .flush_threshold_bytes(args.flush_threshold)
        .build();

    let store = match Store::open(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = run(&store, args.command);
    let closed = store.close();

    match (outcome, closed) {
        (Ok(code), Ok(())) => code,
        (Err(e), _) | (Ok(_), Err(e)) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(store: &Store, command: Commands) -> segstore::Result<ExitCode> {
    match command {
        Commands::Get { key } => match store.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => {
                eprintln!("(not found)");
                return Ok(ExitCode::from(2));
            }
        },
        Commands::Put { key, value } => store.put(key.as_bytes(), value.as_bytes())?,
        Commands::Delete { key } => store.delete(key.as_bytes())?,
        Commands::Scan { from, to } => {
            let range = store.range(
                from.as_deref().map(str::as_bytes),
                to.as_deref().map(str::as_bytes),
            )?;
            for item in range {
                let (key, value) = item?;
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
        }
        Commands::Flush => store.flush()?,
        Commands::Stats => {
            let stats = store.stats();
            println!("segments:          {}", stats.segment_count);
            println!("segment entries:   {}", stats.segment_entries);
            println!("segment bytes:     {}", stats.segment_payload_bytes);
            println!("memtable entries:  {}", stats.memtable_entries);
            println!("memtable bytes:    {}", stats.memtable_bytes);
        }
    }
    Ok(ExitCode::SUCCESS)
}

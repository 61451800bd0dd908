//! Yardwatch CLI - sweeper telemetry replay and yard cleaning progress.
//!
//! Commands:
//! - `yardwatch run` - Replay messages over the simulated link
//! - `yardwatch batch` - Process messages directly, without the link
//! - `yardwatch generate` - Write a synthetic yard directory and message set

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{EngineArgs, InputArgs, LinkArgs};

#[derive(Parser)]
#[command(name = "yardwatch")]
#[command(about = "Track yard cleaning progress from sweeper telemetry")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay messages over the impaired link in real time
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        link: LinkArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Process messages directly, in timestamp order
    Batch {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Generate a synthetic dataset
    Generate {
        /// Directory for yards.txt and machine_messages.json
        #[arg(short, long, default_value = "data")]
        output: String,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of machines (random 5-8 if omitted)
        #[arg(long)]
        machines: Option<u32>,

        /// Number of yards (random 10-15 if omitted)
        #[arg(long)]
        yards: Option<u32>,

        /// Messages per machine (random 12-20 if omitted)
        #[arg(long)]
        messages_per_machine: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Commands::Run {
            input,
            link,
            engine,
        } => commands::run::run(&input, &link, &engine).await,
        Commands::Batch { input, engine } => commands::batch::run(&input, &engine),
        Commands::Generate {
            output,
            seed,
            machines,
            yards,
            messages_per_machine,
        } => commands::generate::run(&output, seed, machines, yards, messages_per_machine),
    }
}

pub mod detect;
pub mod scan;

use clap::{Parser, Subcommand};
use devscan_lib::{HashAlgorithm, SymlinkPolicy};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devscan")]
#[command(about = "Inventory every file on a mounted device with content digests", long_about = None)]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(long, short = 'v', global = true, help = "Print each file as it is processed")]
    pub verbose: bool,

    #[arg(long, short = 'q', global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Scan a device and write a CSV inventory")]
    Scan {
        #[arg(long, short = 'p', help = "Device mount point (auto-detected if omitted)")]
        path: Option<PathBuf>,

        #[arg(long, short = 'o', help = "Output CSV file (default: device_scan_TIMESTAMP.csv)")]
        output: Option<PathBuf>,

        #[arg(long, help = "Append to an existing report instead of replacing it")]
        append: bool,

        #[arg(long, value_enum, help = "Digest algorithm")]
        algorithm: Option<HashAlgorithm>,

        #[arg(long, value_enum, help = "Symbolic link handling")]
        symlinks: Option<SymlinkPolicy>,
    },

    #[command(about = "Show the auto-detected device mount point")]
    Detect,
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

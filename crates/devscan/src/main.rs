mod cli;

use anyhow::Context;
use clap::Parser;
use devscan_lib::Config;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbose);

    let config = Config::new(cli.config.clone()).context("Failed to load configuration")?;

    match cli.command {
        cli::Commands::Scan {
            path,
            output,
            append,
            algorithm,
            symlinks,
        } => {
            let args = cli::scan::ScanArgs {
                path,
                output,
                append,
                algorithm,
                symlinks,
            };
            cli::scan::handle_scan_command(&config, args, cli.verbose, cli.quiet)?;
        }

        cli::Commands::Detect => {
            cli::detect::handle_detect_command(cli.quiet)?;
        }
    }

    Ok(())
}

use chrono::Local;
use console::style;
use devscan_lib::util::{create_scan_spinner, format_bytes, format_duration};
use devscan_lib::{
    scan_directory, Config, DevscanError, FileRecord, HashAlgorithm, RecordSink, ReportWriter, Result,
    ScanContext, ScanSummary, SymlinkPolicy,
};
use std::path::PathBuf;

pub struct ScanArgs {
    pub path: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub append: bool,
    pub algorithm: Option<HashAlgorithm>,
    pub symlinks: Option<SymlinkPolicy>,
}

pub fn handle_scan_command(config: &Config, args: ScanArgs, verbose: bool, quiet: bool) -> Result<()> {
    let root = match args.path {
        Some(path) => path,
        None => {
            if !quiet {
                println!("{} Attempting to auto-detect device...", style(">>>").cyan());
            }
            let mount = super::detect::detect_or_explain()?;
            if !quiet {
                println!("Found {} device at: {}", mount.kind.as_str(), style(mount.path.display()).bold());
            }
            mount.path
        }
    };

    // Validate before the report is created so a bad root leaves no empty file behind.
    if !root.exists() {
        return Err(DevscanError::RootNotFound(root));
    }
    if !root.is_dir() {
        return Err(DevscanError::RootNotDirectory(root));
    }

    let output = match args.output {
        Some(path) if path.is_absolute() => path,
        Some(path) => std::env::current_dir()?.join(path),
        None => config.default_output_path(Local::now())?,
    };

    let mut options = config.scan_options();
    if let Some(algorithm) = args.algorithm {
        options.algorithm = algorithm;
    }
    if let Some(symlinks) = args.symlinks {
        options.symlinks = symlinks;
    }

    let mut writer = if args.append {
        ReportWriter::append(&output, options.algorithm)?
    } else {
        ReportWriter::create(&output, options.algorithm)?
    };

    if !quiet {
        println!(
            "{} Scanning {}",
            style(">>>").cyan(),
            style(root.display()).bold()
        );
        println!("  Output: {}", output.display());
        println!("{}", style("─".repeat(80)).dim());
    }

    let spinner = if !verbose && !quiet {
        Some(create_scan_spinner("processed"))
    } else {
        None
    };

    let mut ctx = ScanContext::new(options).excluding(&output);
    if verbose {
        ctx = ctx.with_callback(Box::new(|record: &FileRecord, summary: &ScanSummary| {
            let marker = if record.status.is_success() {
                style("✓").green()
            } else {
                style("×").red()
            };
            println!("{} [{}] {}", marker, summary.rows_written(), record.path.display());
        }));
    } else if let Some(pb) = &spinner {
        let pb = pb.clone();
        ctx = ctx.with_callback(Box::new(move |_: &FileRecord, _: &ScanSummary| pb.inc(1)));
    }

    let result = scan_directory(&root, &mut writer, &mut ctx);

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            // Keep whatever rows made it to disk.
            let _ = writer.flush();
            return Err(e);
        }
    };
    writer.finish()?;

    if !quiet {
        print_summary(&summary, &output);
    }

    Ok(())
}

fn print_summary(summary: &ScanSummary, output: &std::path::Path) {
    println!("{}", style("─".repeat(80)).dim());
    if summary.interrupted {
        println!("{} Scan interrupted, report holds a partial result", style("!").yellow());
    } else {
        println!("{} Scan complete", style("✓").green());
    }
    println!("  Files hashed: {}", style(summary.files_hashed).cyan());
    println!("  Total size: {}", style(format_bytes(summary.bytes_hashed)).cyan());
    println!("  Directories scanned: {}", style(summary.dirs_scanned).cyan());

    if summary.errors() > 0 {
        println!("  Errors: {}", style(summary.errors()).yellow());
    }

    if summary.entries_skipped > 0 {
        println!("  Skipped: {}", style(summary.entries_skipped).dim());
    }

    if summary.symlinks_followed > 0 {
        println!("  Symlinks followed: {}", style(summary.symlinks_followed).dim());
    }

    println!("  Elapsed: {}", format_duration(summary.elapsed));
    println!("  Results saved to: {}", output.display());
}

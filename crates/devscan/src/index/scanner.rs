use crate::error::{classify_walk_error, DevscanError, Fault, Result};
use crate::index::hasher::{digest_file, HashAlgorithm};
use crate::report::{FileRecord, RecordSink};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{self, FileType, Metadata};
use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::{DirEntry, WalkDir};

/// How symbolic links met during a scan are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SymlinkPolicy {
    /// Record the link itself as skipped.
    #[default]
    Never,
    /// Follow links whose target resolves inside the scan root.
    WithinRoot,
    /// Follow every link that resolves.
    Always,
}

impl SymlinkPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymlinkPolicy::Never => "never",
            SymlinkPolicy::WithinRoot => "within-root",
            SymlinkPolicy::Always => "always",
        }
    }

    pub fn follows(&self) -> bool {
        !matches!(self, SymlinkPolicy::Never)
    }
}

/// Options for a device scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub algorithm: HashAlgorithm,
    pub symlinks: SymlinkPolicy,
    pub sort_entries: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Md5,
            symlinks: SymlinkPolicy::Never,
            sort_entries: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub files_hashed: usize,
    pub files_failed: usize,
    pub entries_skipped: usize,
    pub dirs_scanned: usize,
    pub dir_errors: usize,
    pub bytes_hashed: u64,
    pub symlinks_followed: usize,
    pub revisits_skipped: usize,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl ScanSummary {
    pub fn rows_written(&self) -> usize {
        self.files_hashed + self.files_failed + self.entries_skipped
    }

    pub fn errors(&self) -> usize {
        self.files_failed + self.dir_errors
    }
}

/// Called after every row is written.
pub type RecordCallback = Box<dyn FnMut(&FileRecord, &ScanSummary)>;

/// State for one scan run: options, counters, cancellation and the set of
/// real (device, inode) identities already visited.
pub struct ScanContext {
    pub options: ScanOptions,
    summary: ScanSummary,
    cancel: Arc<AtomicBool>,
    visited: HashSet<(u64, u64)>,
    excluded: Option<(u64, u64)>,
    on_record: Option<RecordCallback>,
}

impl ScanContext {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            summary: ScanSummary::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            visited: HashSet::new(),
            excluded: None,
            on_record: None,
        }
    }

    pub fn with_callback(mut self, callback: RecordCallback) -> Self {
        self.on_record = Some(callback);
        self
    }

    /// Leaves `path` out of the scan, typically the report being written.
    pub fn excluding(mut self, path: &Path) -> Self {
        self.excluded = fs::metadata(path).ok().map(|m| (m.dev(), m.ino()));
        self
    }

    /// Shared flag; setting it stops the scan before the next entry.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    /// Returns false when this real entry was seen before.
    fn first_visit(&mut self, metadata: &Metadata) -> bool {
        self.visited.insert((metadata.dev(), metadata.ino()))
    }

    fn is_excluded(&self, metadata: &Metadata) -> bool {
        self.excluded == Some((metadata.dev(), metadata.ino()))
    }

    fn emit(&mut self, sink: &mut dyn RecordSink, record: FileRecord) -> Result<()> {
        sink.write_record(&record)?;
        if let Some(callback) = self.on_record.as_mut() {
            callback(&record, &self.summary);
        }
        Ok(())
    }

    fn record_fault(&mut self, sink: &mut dyn RecordSink, fault: Fault) -> Result<()> {
        match fault {
            Fault::Directory { path, reason } => {
                log::warn!("Cannot read directory {}: {}", path.display(), reason);
                self.summary.dir_errors += 1;
                Ok(())
            }
            Fault::File { path, reason } => {
                log::warn!("Error reading {}: {}", path.display(), reason);
                self.summary.files_failed += 1;
                self.emit(sink, FileRecord::failed(&path, reason))
            }
        }
    }

    fn record_skipped(&mut self, sink: &mut dyn RecordSink, path: &Path, reason: &str) -> Result<()> {
        log::debug!("Skipping {}: {}", path.display(), reason);
        self.summary.entries_skipped += 1;
        self.emit(sink, FileRecord::skipped(path, reason))
    }
}

enum Descend {
    Continue,
    Prune,
}

/// Scans a device tree and writes one record per file to `sink`
///
/// Walk roots are kept on an explicit work list: the scan root first, then
/// every symlinked directory the policy lets us follow. Each walk root is
/// traversed by `walkdir`, which keeps its own stack, so depth never grows
/// the call stack.
///
/// Per-file and per-directory failures are recorded and the walk continues.
/// Only a missing root or a failing sink end the scan with an error.
pub fn scan_directory<P: AsRef<Path>>(
    root: P,
    sink: &mut dyn RecordSink,
    ctx: &mut ScanContext,
) -> Result<ScanSummary> {
    let root = root.as_ref();
    let started = Instant::now();

    let metadata = fs::metadata(root).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DevscanError::RootNotFound(root.to_path_buf()),
        _ => DevscanError::Io(e),
    })?;
    if !metadata.is_dir() {
        return Err(DevscanError::RootNotDirectory(root.to_path_buf()));
    }

    let root = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()?.join(root)
    };
    let canonical_root = fs::canonicalize(&root)?;
    ctx.first_visit(&metadata);

    log::info!(
        "Scanning {} ({}, symlinks: {})",
        root.display(),
        ctx.options.algorithm.as_str(),
        ctx.options.symlinks.as_str()
    );

    let mut pending = vec![root];
    while let Some(walk_root) = pending.pop() {
        if ctx.is_cancelled() {
            break;
        }
        log::debug!("Walking {}", walk_root.display());
        walk_tree(&walk_root, &canonical_root, sink, ctx, &mut pending)?;
    }

    sink.flush()?;
    ctx.summary.elapsed = started.elapsed();
    ctx.summary.interrupted = ctx.is_cancelled();

    log::info!(
        "Scan finished: {} hashed, {} failed, {} skipped",
        ctx.summary.files_hashed,
        ctx.summary.files_failed,
        ctx.summary.entries_skipped
    );

    Ok(ctx.summary.clone())
}

fn walk_tree(
    walk_root: &Path,
    canonical_root: &Path,
    sink: &mut dyn RecordSink,
    ctx: &mut ScanContext,
    pending: &mut Vec<PathBuf>,
) -> Result<()> {
    let mut walker = WalkDir::new(walk_root).follow_links(false);
    if ctx.options.sort_entries {
        walker = walker.sort_by_file_name();
    }

    // Directory being listed at each depth, for attributing walk errors.
    let mut listing: Vec<PathBuf> = Vec::new();

    let mut entries = walker.into_iter();
    while let Some(entry) = entries.next() {
        if ctx.is_cancelled() {
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                ctx.record_fault(sink, classify_walk_error(&e, &listing))?;
                continue;
            }
        };

        match process_entry(&entry, canonical_root, sink, ctx, pending)? {
            Descend::Continue => {
                if entry.depth() == 0 || entry.file_type().is_dir() {
                    listing.truncate(entry.depth());
                    listing.push(entry.path().to_path_buf());
                }
            }
            Descend::Prune => entries.skip_current_dir(),
        }
    }

    Ok(())
}

fn process_entry(
    entry: &DirEntry,
    canonical_root: &Path,
    sink: &mut dyn RecordSink,
    ctx: &mut ScanContext,
    pending: &mut Vec<PathBuf>,
) -> Result<Descend> {
    let path = entry.path();
    let file_type = entry.file_type();

    // Walk roots were claimed when they were queued, and may be links.
    if entry.depth() == 0 {
        ctx.summary.dirs_scanned += 1;
        return Ok(Descend::Continue);
    }

    if file_type.is_dir() {
        if let Ok(metadata) = entry.metadata() {
            if !ctx.first_visit(&metadata) {
                log::debug!("Already visited {}", path.display());
                ctx.summary.revisits_skipped += 1;
                return Ok(Descend::Prune);
            }
        }
        ctx.summary.dirs_scanned += 1;
        return Ok(Descend::Continue);
    }

    if file_type.is_file() {
        if let Ok(metadata) = entry.metadata() {
            if ctx.is_excluded(&metadata) {
                log::debug!("Not scanning the report itself: {}", path.display());
                return Ok(Descend::Continue);
            }
            if ctx.options.symlinks.follows() && !ctx.first_visit(&metadata) {
                log::debug!("Already visited {}", path.display());
                ctx.summary.revisits_skipped += 1;
                return Ok(Descend::Continue);
            }
        }
        hash_file(path, sink, ctx)?;
    } else if file_type.is_symlink() {
        follow_symlink(path, canonical_root, sink, ctx, pending)?;
    } else {
        ctx.record_skipped(sink, path, special_kind(&file_type))?;
    }

    Ok(Descend::Continue)
}

fn hash_file(path: &Path, sink: &mut dyn RecordSink, ctx: &mut ScanContext) -> Result<()> {
    match digest_file(path, ctx.options.algorithm) {
        Ok(digest) => {
            ctx.summary.files_hashed += 1;
            ctx.summary.bytes_hashed += digest.size_bytes;
            ctx.emit(sink, FileRecord::success(path, digest.hex, digest.size_bytes))
        }
        Err(e) => ctx.record_fault(sink, Fault::from_read_error(path, &e)),
    }
}

fn follow_symlink(
    path: &Path,
    canonical_root: &Path,
    sink: &mut dyn RecordSink,
    ctx: &mut ScanContext,
    pending: &mut Vec<PathBuf>,
) -> Result<()> {
    let policy = ctx.options.symlinks;
    if !policy.follows() {
        return ctx.record_skipped(sink, path, "symbolic link");
    }

    let target = match fs::canonicalize(path) {
        Ok(target) => target,
        Err(e) => {
            let fault = Fault::File {
                path: path.to_path_buf(),
                reason: format!("broken symbolic link: {}", e),
            };
            return ctx.record_fault(sink, fault);
        }
    };

    if policy == SymlinkPolicy::WithinRoot && !target.starts_with(canonical_root) {
        return ctx.record_skipped(sink, path, "symbolic link points outside scan root");
    }

    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            let fault = Fault::File {
                path: path.to_path_buf(),
                reason: e.to_string(),
            };
            return ctx.record_fault(sink, fault);
        }
    };

    if ctx.is_excluded(&metadata) {
        log::debug!("Link {} leads to the report itself", path.display());
        return Ok(());
    }

    if !ctx.first_visit(&metadata) {
        log::debug!("Link {} leads to an entry already visited", path.display());
        ctx.summary.revisits_skipped += 1;
        return Ok(());
    }

    ctx.summary.symlinks_followed += 1;
    let file_type = metadata.file_type();
    if file_type.is_dir() {
        pending.push(path.to_path_buf());
        Ok(())
    } else if file_type.is_file() {
        hash_file(path, sink, ctx)
    } else {
        ctx.record_skipped(sink, path, special_kind(&file_type))
    }
}

fn special_kind(file_type: &FileType) -> &'static str {
    if file_type.is_socket() {
        "socket"
    } else if file_type.is_fifo() {
        "named pipe"
    } else if file_type.is_block_device() {
        "block device"
    } else if file_type.is_char_device() {
        "character device"
    } else {
        "unsupported file type"
    }
}

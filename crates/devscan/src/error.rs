use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort a scan before or while it runs.
#[derive(Error, Debug)]
pub enum DevscanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    RootNotDirectory(PathBuf),

    #[error("Cannot write output file {path}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not auto-detect a mounted device")]
    DeviceNotFound,

    #[error("Malformed report: {0}")]
    Report(String),

    #[error("Report {path} has header {found:?}, cannot append {expected:?} rows")]
    ReportHeaderMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },
}

pub type Result<T> = std::result::Result<T, DevscanError>;

/// Failure while streaming one file through the digest engine.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("{0}")]
    Open(#[source] std::io::Error),

    #[error("read failed after {bytes_read} bytes: {source}")]
    Read {
        bytes_read: u64,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    pub fn io_error(&self) -> &std::io::Error {
        match self {
            ReadError::Open(e) => e,
            ReadError::Read { source, .. } => source,
        }
    }
}

/// A recoverable problem met during traversal.
///
/// Directory faults skip a subtree and only reach the diagnostic stream.
/// File faults become a failed row in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Directory { path: PathBuf, reason: String },
    File { path: PathBuf, reason: String },
}

impl Fault {
    pub fn from_read_error(path: &Path, err: &ReadError) -> Self {
        Fault::File {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Maps a traversal error onto the fault taxonomy.
///
/// `listing[d]` is the directory most recently yielded at depth `d` of the
/// current walk. walkdir reports a failed directory open with the path of
/// that directory at its own depth, and a failed read of a listing with no
/// path at all, one level below the directory being listed. Both are
/// directory-level, as are loops and failures on the walk root. Any other
/// path-bearing error comes from inspecting a single entry.
pub fn classify_walk_error(err: &walkdir::Error, listing: &[PathBuf]) -> Fault {
    let reason = match err.io_error() {
        Some(io) => io.to_string(),
        None => err.to_string(),
    };

    if let Some(ancestor) = err.loop_ancestor() {
        return Fault::Directory {
            path: err.path().map(Path::to_path_buf).unwrap_or_default(),
            reason: format!("filesystem loop back to {}", ancestor.display()),
        };
    }

    match err.path() {
        Some(path) => {
            let opened_dir = listing.get(err.depth()).map(|d| d == path).unwrap_or(false);
            if opened_dir || err.depth() == 0 {
                Fault::Directory {
                    path: path.to_path_buf(),
                    reason,
                }
            } else {
                Fault::File {
                    path: path.to_path_buf(),
                    reason,
                }
            }
        }
        None => {
            let parent = err.depth().checked_sub(1).and_then(|d| listing.get(d));
            let path = parent
                .or_else(|| listing.last())
                .cloned()
                .unwrap_or_default();
            Fault::Directory { path, reason }
        }
    }
}

pub mod config;
pub mod error;
pub mod index;
pub mod report;
pub mod util;

pub use config::Config;
pub use error::{DevscanError, Fault, ReadError, Result};
pub use index::{
    detect_device_mount, digest_file, digest_reader, find_device_mount, scan_directory, DeviceMount,
    FileDigest, HashAlgorithm, MountKind, MountSearch, ScanContext, ScanOptions, ScanSummary,
    SymlinkPolicy,
};
pub use report::{read_report, FileRecord, RecordSink, RecordStatus, ReportWriter, NOT_AVAILABLE};

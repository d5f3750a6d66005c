pub mod device;
pub mod hasher;
pub mod scanner;

pub use device::{detect_device_mount, find_device_mount, DeviceMount, MountKind, MountSearch};
pub use hasher::{digest_file, digest_reader, FileDigest, HashAlgorithm, BUFFER_SIZE};
pub use scanner::{scan_directory, RecordCallback, ScanContext, ScanOptions, ScanSummary, SymlinkPolicy};

use crate::error::{DevscanError, Result};
use crate::index::HashAlgorithm;
use std::ffi::OsStr;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Digest placeholder for rows that could not be hashed.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    Success,
    Failed(String),
    Skipped(String),
}

impl RecordStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RecordStatus::Success)
    }

    fn parse(s: &str) -> Self {
        if s == "Success" {
            RecordStatus::Success
        } else if let Some(reason) = s.strip_prefix("Skipped - ") {
            RecordStatus::Skipped(reason.to_string())
        } else {
            RecordStatus::Failed(s.strip_prefix("Error - ").unwrap_or(s).to_string())
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Success => write!(f, "Success"),
            RecordStatus::Failed(reason) => write!(f, "Error - {}", reason),
            RecordStatus::Skipped(reason) => write!(f, "Skipped - {}", reason),
        }
    }
}

/// One report row. Built once per file, written, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub digest: String,
    pub size_bytes: u64,
    pub status: RecordStatus,
}

impl FileRecord {
    pub fn success(path: &Path, digest: String, size_bytes: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            digest,
            size_bytes,
            status: RecordStatus::Success,
        }
    }

    pub fn failed(path: &Path, reason: impl Into<String>) -> Self {
        Self::unhashed(path, RecordStatus::Failed(reason.into()))
    }

    pub fn skipped(path: &Path, reason: impl Into<String>) -> Self {
        Self::unhashed(path, RecordStatus::Skipped(reason.into()))
    }

    fn unhashed(path: &Path, status: RecordStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            digest: NOT_AVAILABLE.to_string(),
            size_bytes: 0,
            status,
        }
    }
}

/// Destination for scan rows.
pub trait RecordSink {
    fn write_record(&mut self, record: &FileRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<FileRecord> {
    fn write_record(&mut self, record: &FileRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

pub fn header(algorithm: HashAlgorithm) -> [&'static str; 4] {
    ["File Path", algorithm.column_label(), "File Size (bytes)", "Status"]
}

/// CSV report on disk.
///
/// Every row is flushed as soon as it is written, so the file always holds a
/// header plus complete rows even if the process dies mid-scan.
pub struct ReportWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows_written: u64,
}

impl ReportWriter {
    /// Creates (or truncates) the report and writes the header.
    pub fn create<P: AsRef<Path>>(path: P, algorithm: HashAlgorithm) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| DevscanError::OutputUnwritable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::start(path, file, algorithm, true)
    }

    /// Opens an existing report for appending.
    ///
    /// The header is only written when the file is new or empty. A non-empty
    /// report must already carry the header for `algorithm`.
    pub fn append<P: AsRef<Path>>(path: P, algorithm: HashAlgorithm) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|source| DevscanError::OutputUnwritable {
                path: path.to_path_buf(),
                source,
            })?;
        let is_empty = file.metadata()?.len() == 0;
        if !is_empty {
            check_header(path, algorithm)?;
        }
        Self::start(path, file, algorithm, is_empty)
    }

    fn start(path: &Path, file: File, algorithm: HashAlgorithm, write_header: bool) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(file);
        if write_header {
            writer.write_record(header(algorithm))?;
            writer.flush()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flushes and closes the report, returning the number of rows written.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }
}

impl RecordSink for ReportWriter {
    fn write_record(&mut self, record: &FileRecord) -> Result<()> {
        let size = record.size_bytes.to_string();
        let status = record.status.to_string();
        self.writer.write_record([
            record.path.as_os_str().as_bytes(),
            record.digest.as_bytes(),
            size.as_bytes(),
            status.as_bytes(),
        ])?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn check_header(path: &Path, algorithm: HashAlgorithm) -> Result<()> {
    let mut reader = csv::Reader::from_path(path)?;
    let found = reader.headers()?;
    let expected = header(algorithm);

    if found.iter().ne(expected) {
        return Err(DevscanError::ReportHeaderMismatch {
            path: path.to_path_buf(),
            found: found.iter().collect::<Vec<_>>().join(","),
            expected: expected.join(","),
        });
    }
    Ok(())
}

/// Reads a report back into records. Rows that fail to parse are errors.
///
/// Paths are taken as raw bytes so non-UTF-8 names come back unchanged.
pub fn read_report<P: AsRef<Path>>(path: P) -> Result<Vec<FileRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();

    for row in reader.byte_records() {
        let row = row?;
        if row.len() != 4 {
            return Err(DevscanError::Report(format!("row with {} fields", row.len())));
        }
        let text = |i: usize| {
            std::str::from_utf8(&row[i])
                .map_err(|_| DevscanError::Report(format!("field {} is not valid UTF-8", i + 1)))
        };
        let size = text(2)?;
        let size_bytes = size
            .parse()
            .map_err(|_| DevscanError::Report(format!("invalid size value: {}", size)))?;
        records.push(FileRecord {
            path: PathBuf::from(OsStr::from_bytes(&row[0])),
            digest: text(1)?.to_string(),
            size_bytes,
            status: RecordStatus::parse(text(3)?),
        });
    }

    Ok(records)
}

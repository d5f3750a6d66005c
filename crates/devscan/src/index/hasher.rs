use crate::error::ReadError;
use md5::{Digest as _, Md5};
use serde::Deserialize;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

pub const BUFFER_SIZE: usize = 8192;

/// Content digest algorithm used for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Blake3,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Report column title for the digest field.
    pub fn column_label(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5 Hash",
            HashAlgorithm::Blake3 => "BLAKE3 Hash",
        }
    }
}

/// Digest and exact byte count of one fully read file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub hex: String,
    pub size_bytes: u64,
}

enum Accumulator {
    Md5(Md5),
    Blake3(Box<blake3::Hasher>),
}

impl Accumulator {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Accumulator::Md5(Md5::new()),
            HashAlgorithm::Blake3 => Accumulator::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Accumulator::Md5(h) => h.update(chunk),
            Accumulator::Blake3(h) => {
                h.update(chunk);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Accumulator::Md5(h) => format!("{:x}", h.finalize()),
            Accumulator::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Computes the digest of a file
///
/// Streams the file in 8KB chunks, so memory use does not grow with file size.
/// The returned size is the number of bytes actually hashed, not the size
/// reported by metadata.
pub fn digest_file<P: AsRef<Path>>(path: P, algorithm: HashAlgorithm) -> Result<FileDigest, ReadError> {
    let file = File::open(path.as_ref()).map_err(ReadError::Open)?;
    digest_reader(file, algorithm)
}

/// Digest engine over any byte stream.
///
/// A failed read discards everything hashed so far; there is no partial digest.
pub fn digest_reader<R: Read>(mut reader: R, algorithm: HashAlgorithm) -> Result<FileDigest, ReadError> {
    let mut accumulator = Accumulator::new(algorithm);
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut size_bytes = 0u64;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(ReadError::Read {
                    bytes_read: size_bytes,
                    source,
                })
            }
        };
        accumulator.update(&buffer[..bytes_read]);
        size_bytes += bytes_read as u64;
    }

    Ok(FileDigest {
        hex: accumulator.finalize_hex(),
        size_bytes,
    })
}

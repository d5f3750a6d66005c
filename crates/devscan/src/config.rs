use crate::error::{DevscanError, Result};
use crate::index::{HashAlgorithm, ScanOptions, SymlinkPolicy};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    scan: ScanSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ScanSection {
    algorithm: HashAlgorithm,
    symlinks: SymlinkPolicy,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub config_path: Option<PathBuf>,
    pub algorithm: HashAlgorithm,
    pub symlinks: SymlinkPolicy,
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Loads settings from `--config`, then `DEVSCAN_CONFIG`, then the XDG
    /// config dir. Only an explicitly named file has to exist.
    pub fn new(config_override: Option<PathBuf>) -> Result<Self> {
        let explicit = config_override.or_else(|| std::env::var("DEVSCAN_CONFIG").ok().map(PathBuf::from));

        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(DevscanError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Some(path)
            }
            None => BaseDirectories::with_prefix("devscan")
                .ok()
                .and_then(|xdg| xdg.find_config_file("devscan.toml")),
        };

        match config_path {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        log::debug!("Loaded config from {}", path.display());
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(Self {
            config_path: None,
            algorithm: file.scan.algorithm,
            symlinks: file.scan.symlinks,
            output_dir: file.scan.output_dir,
        })
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            algorithm: self.algorithm,
            symlinks: self.symlinks,
            ..Default::default()
        }
    }

    /// Absolute path for a report started at `now` when no output was given.
    pub fn default_output_path(&self, now: DateTime<Local>) -> Result<PathBuf> {
        let cwd = std::env::current_dir()?;
        let dir = match &self.output_dir {
            Some(dir) => cwd.join(dir),
            None => cwd,
        };
        Ok(dir.join(default_output_filename(now)))
    }
}

pub fn default_output_filename(now: DateTime<Local>) -> String {
    format!("device_scan_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

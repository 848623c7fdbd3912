//! Configuration and data directory management.
//!
//! Built once at start-up and handed to each component's constructor.
//! Components take the sub-config they need (`ScanConfig`, `JobConfig`)
//! rather than the whole struct.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Paths to all Domus data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db: PathBuf,
    /// Uploaded search documents (`data/uploads/`).
    pub uploads: PathBuf,
    /// Generated reports (`data/exports/`).
    pub exports: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            uploads: root.join("uploads"),
            exports: root.join("exports"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.db)?;
        std::fs::create_dir_all(&self.uploads)?;
        std::fs::create_dir_all(&self.exports)?;
        Ok(())
    }
}

/// Settings for text extraction and the risk-scan pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Whether the external OCR fallback may run at all.
    pub ocr_enabled: bool,
    /// External OCR binary invoked as `<cmd> --quiet --force-ocr <in> <out>`.
    pub ocr_command: Option<String>,
    /// Native text shorter than this (trimmed chars) triggers OCR.
    pub ocr_min_chars: usize,
    /// Upper bound on a single uploaded document.
    pub max_upload_bytes: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            ocr_command: None,
            ocr_min_chars: 100,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Settings for the background job registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// A `started` job older than this is failed with a timeout error.
    pub max_processing_secs: u64,
    /// Terminal jobs are kept at least this long for polling clients.
    pub retention_secs: u64,
    /// Hard cap on retained terminal jobs.
    pub max_retained: usize,
}

impl JobConfig {
    pub fn max_processing(&self) -> Duration {
        Duration::from_secs(self.max_processing_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_processing_secs: 120,
            retention_secs: 3600,
            max_retained: 500,
        }
    }
}

/// Top-level Domus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomusConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    pub scan: ScanConfig,
    pub jobs: JobConfig,
    /// Shared directory for multiprocess metric snapshots.
    pub metrics_dir: Option<PathBuf>,
}

impl DomusConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let data_paths = DataPaths::new(data_dir)?;
        let scan_defaults = ScanConfig::default();
        let job_defaults = JobConfig::default();

        Ok(Self {
            port: env_parse("PORT").unwrap_or(8000),
            data_paths,
            scan: ScanConfig {
                ocr_enabled: env_bool("DOMUS_OCR_ENABLED").unwrap_or(scan_defaults.ocr_enabled),
                ocr_command: std::env::var("DOMUS_OCR_COMMAND")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                ocr_min_chars: env_parse("DOMUS_OCR_MIN_CHARS")
                    .unwrap_or(scan_defaults.ocr_min_chars),
                max_upload_bytes: env_parse("DOMUS_MAX_UPLOAD_BYTES")
                    .unwrap_or(scan_defaults.max_upload_bytes),
            },
            jobs: JobConfig {
                max_processing_secs: env_parse("DOMUS_JOB_MAX_PROCESSING_SECS")
                    .unwrap_or(job_defaults.max_processing_secs),
                retention_secs: env_parse("DOMUS_JOB_RETENTION_SECS")
                    .unwrap_or(job_defaults.retention_secs),
                max_retained: env_parse("DOMUS_JOB_MAX_RETAINED")
                    .unwrap_or(job_defaults.max_retained),
            },
            metrics_dir: std::env::var("DOMUS_METRICS_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Defaults rooted at `data_dir`, ignoring the environment (tests, CLI).
    pub fn with_defaults(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            port: 8000,
            data_paths: DataPaths::new(data_dir)?,
            scan: ScanConfig::default(),
            jobs: JobConfig::default(),
            metrics_dir: None,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

//! Persistence of the current signal list
//!
//! Every write replaces the previous files with the full list. Formats fail
//! independently: one broken writer never blocks the others.

pub mod csv;
pub mod excel;
pub mod json;

pub use self::csv::{write_mt4, write_mt5, MT4_HEADER};
pub use excel::write_workbook;
pub use json::{load_snapshot, write_snapshot, SignalSnapshot};

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use shared::{OutputConfig, Signal};
use tracing::{debug, warn};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Excel,
    Mt4Csv,
    Mt5Csv,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Excel,
        OutputFormat::Mt4Csv,
        OutputFormat::Mt5Csv,
        OutputFormat::Json,
    ];
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Excel => "excel",
            OutputFormat::Mt4Csv => "mt4",
            OutputFormat::Mt5Csv => "mt5",
            OutputFormat::Json => "json",
        };
        f.write_str(name)
    }
}

/// Result of one `write_all` call
#[derive(Debug, Default)]
pub struct OutputReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(OutputFormat, String)>,
}

impl OutputReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes the signal list into the configured directory
#[derive(Debug, Clone)]
pub struct OutputWriter {
    config: OutputConfig,
    directory: PathBuf,
}

impl OutputWriter {
    pub fn new(config: OutputConfig) -> Result<Self> {
        let directory = PathBuf::from(&config.directory);
        std::fs::create_dir_all(&directory)
            .with_context(|| format!("creating output directory {}", directory.display()))?;
        Ok(Self { config, directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, format: OutputFormat) -> PathBuf {
        let name = match format {
            OutputFormat::Excel => &self.config.excel_filename,
            OutputFormat::Mt4Csv => &self.config.mt4_filename,
            OutputFormat::Mt5Csv => &self.config.mt5_filename,
            OutputFormat::Json => &self.config.json_filename,
        };
        self.directory.join(name)
    }

    pub fn write(&self, format: OutputFormat, signals: &[Signal]) -> Result<PathBuf> {
        let path = self.path_for(format);
        let written = match format {
            OutputFormat::Excel => write_workbook(signals, &path),
            OutputFormat::Mt4Csv => write_mt4(signals, &path),
            OutputFormat::Mt5Csv => write_mt5(signals, &path),
            OutputFormat::Json => write_snapshot(signals, &path),
        };
        written.with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Write every format, collecting failures instead of stopping
    pub fn write_all(&self, signals: &[Signal]) -> OutputReport {
        let mut report = OutputReport::default();
        for format in OutputFormat::ALL {
            match self.write(format, signals) {
                Ok(path) => {
                    debug!("Wrote {} signals to {}", signals.len(), path.display());
                    report.written.push(path);
                }
                Err(e) => {
                    warn!("Failed to write {} output: {:#}", format, e);
                    report.failed.push((format, format!("{:#}", e)));
                }
            }
        }
        report
    }
}

//! JSON file sink
//!
//! Writes the result set as a pretty-printed JSON array, creating the output
//! directory when missing.

use crate::config::OutputConfig;
use crate::output::traits::{OutputError, OutputResult, PayloadSink};
use crate::record::ResultSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sink writing `<directory>/<filename>` as a JSON array
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    directory: PathBuf,
    filename: String,
}

impl JsonFileSink {
    pub fn new(directory: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.directory, &config.filename)
    }

    /// Full path of the output file
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    fn ensure_directory(&self) -> OutputResult<()> {
        if self.directory.as_os_str().is_empty() || self.directory.is_dir() {
            tracing::info!("Using existing directory {}", self.directory.display());
            return Ok(());
        }

        if self.directory.exists() {
            return Err(OutputError::Write(format!(
                "{} exists and is not a directory",
                self.directory.display()
            )));
        }

        fs::create_dir_all(&self.directory)?;
        tracing::info!("Created directory {}", self.directory.display());
        Ok(())
    }
}

impl PayloadSink for JsonFileSink {
    /// Writes to a temporary sibling first, then renames over the target,
    /// so a failed write never leaves a truncated file behind.
    fn emit(&mut self, results: &ResultSet) -> OutputResult<()> {
        self.ensure_directory()?;

        let path = self.path();
        let tmp_path = temp_path(&path);

        let write = || -> OutputResult<()> {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, results.records())?;
            writer.flush()?;
            Ok(())
        };

        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, &path)?;
        tracing::info!("Payloads saved to {} ({} rows)", path.display(), results.len());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path().display().to_string()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

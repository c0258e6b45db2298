//! Folder summary artifact.
//!
//! Writes `reading_report.json` next to the outputs of a folder run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ProcessError, Result};
use crate::pipeline::FileReport;

/// File name of the summary artifact.
pub const REPORT_FILE: &str = "reading_report.json";

/// Serialized summary.
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub generated_at: DateTime<Utc>,
    pub files: usize,
    pub with_footer: usize,
    pub patched: usize,
    pub rows: &'a [FileReport],
}

impl<'a> Summary<'a> {
    pub fn new(rows: &'a [FileReport]) -> Self {
        Self {
            generated_at: Utc::now(),
            files: rows.len(),
            with_footer: rows.iter().filter(|r| r.has_footer).count(),
            patched: rows.iter().filter(|r| r.patched).count(),
            rows,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write the summary for `rows` into `output_dir`.
pub fn write_summary(output_dir: &Path, rows: &[FileReport]) -> Result<PathBuf> {
    let path = output_dir.join(REPORT_FILE);
    let content = Summary::new(rows).to_json()?;
    std::fs::create_dir_all(output_dir).map_err(|source| ProcessError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;
    std::fs::write(&path, content).map_err(|source| ProcessError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

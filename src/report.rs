use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::engine::{PageRow, RunSummary, ViolationRow};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Write the per-page result rows, one file per run.
pub fn write_page_rows(path: &Path, rows: &[PageRow]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the per-violation detail rows, one file per run.
pub fn write_violation_rows(path: &Path, rows: &[ViolationRow]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Append one summary row per invocation so runs can be compared across
/// configurations; the header is written only when the file is new.
pub fn append_run_summary(path: &Path, summary: &RunSummary) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let write_header = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    writer.serialize(summary)?;
    writer.flush()?;
    Ok(())
}

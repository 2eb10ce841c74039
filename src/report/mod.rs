//! Rendering of the derived views.
//!
//! Markdown and JSON for the terminal or a file, XLSX for spreadsheets.

pub mod export;
pub mod generator;

pub use export::{build_workbook, export_xlsx};
pub use generator::*;

use crate::analysis::{Dashboard, SupervisionSummary};
use crate::context::{Role, Scope};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Who asked for a report, over which period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub period: String,
    pub role: Role,
    pub scope: Scope,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub dashboard: Dashboard,
    pub supervision: Vec<SupervisionSummary>,
}

/// Write `content` to `path` through a temporary file in the same
/// directory, so readers never see a partial file.
pub fn write_output(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(content)
        .context("Failed to write report contents")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;

    Ok(())
}

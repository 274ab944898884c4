use crate::error::AdvisorResult;
use crate::types::{QueryRecord, Report};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths of the artifacts written for one run
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub queries: PathBuf,
    pub report: PathBuf,
}

impl ExportPaths {
    /// `slow_queries_<stamp>.json` and `slow_query_report_<stamp>.json` under `dir`
    pub fn in_dir(dir: &Path, stamp: &str) -> Self {
        Self {
            queries: dir.join(format!("slow_queries_{}.json", stamp)),
            report: dir.join(format!("slow_query_report_{}.json", stamp)),
        }
    }
}

/// Timestamp used in artifact names
pub fn run_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AdvisorResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn save_queries(path: &Path, records: &[QueryRecord]) -> AdvisorResult<()> {
    write_json(path, records)?;
    info!("Saved {} queries to {}", records.len(), path.display());
    Ok(())
}

pub fn save_report(path: &Path, report: &Report) -> AdvisorResult<()> {
    write_json(path, report)?;
    info!("Saved analysis report to {}", path.display());
    Ok(())
}

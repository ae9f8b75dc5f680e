use crate::error::Result;
use crate::types::MigrationOutcome;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Aggregate of one run's outcomes plus the full per-item list, written to a
/// timestamped JSON artifact for later inspection.
#[derive(Debug, Serialize)]
pub struct MigrationReport {
    pub kind: String,
    pub generated_at: String,
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures_by_type: BTreeMap<String, usize>,
    pub outcomes: Vec<MigrationOutcome>,
}

static DUPLICATE_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)duplicate\s+slug|already exists|slug.+taken").unwrap());
static TIMEOUT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)time[d]?\s?out").unwrap());
static NOT_FOUND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b404\b|(?i)not found").unwrap());
static SERVER_ERROR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b5\d\d\b|(?i)internal server error").unwrap());

/// Coarse error-type classifier for grouping failures in the summary.
pub fn classify_error(message: &str) -> &'static str {
    if DUPLICATE_SLUG_RE.is_match(message) {
        "duplicate slug"
    } else if TIMEOUT_RE.is_match(message) {
        "timeout"
    } else if NOT_FOUND_RE.is_match(message) {
        "404"
    } else if SERVER_ERROR_RE.is_match(message) {
        "500"
    } else {
        "unknown"
    }
}

/// Aggregate per-item outcomes into a report.
pub fn summarize(kind: &str, outcomes: Vec<MigrationOutcome>) -> MigrationReport {
    let mut created = 0;
    let mut updated = 0;
    let mut skipped = 0;
    let mut failed = 0;
    let mut failures_by_type: BTreeMap<String, usize> = BTreeMap::new();

    for outcome in &outcomes {
        match outcome {
            MigrationOutcome::Created { .. } => created += 1,
            MigrationOutcome::Updated { .. } => updated += 1,
            MigrationOutcome::Skipped { .. } => skipped += 1,
            MigrationOutcome::Failed { error, .. } => {
                failed += 1;
                *failures_by_type
                    .entry(classify_error(error).to_string())
                    .or_insert(0) += 1;
            }
        }
    }

    MigrationReport {
        kind: kind.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        total: outcomes.len(),
        created,
        updated,
        skipped,
        failed,
        failures_by_type,
        outcomes,
    }
}

/// Write the report to `<kind>-report-<timestamp>.json` in `dir`, with `:`
/// and `.` in the timestamp replaced so the name is filesystem-safe.
pub fn write(report: &MigrationReport, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let timestamp = report.generated_at.replace([':', '.'], "-");
    let filename = format!("{}-report-{}.json", report.kind, timestamp);
    let filepath = dir.join(&filename);

    let json_content = serde_json::to_string_pretty(report)?;
    fs::write(&filepath, json_content)?;

    info!("Wrote report to {}", filepath.display());
    Ok(filepath)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(error: &str) -> MigrationOutcome {
        MigrationOutcome::Failed {
            source_id: "src-1".to_string(),
            slug: None,
            error: error.to_string(),
        }
    }

    #[test]
    fn classifies_error_messages() {
        assert_eq!(classify_error("duplicate slug: my-post"), "duplicate slug");
        assert_eq!(classify_error("download timeout after 30s"), "timeout");
        assert_eq!(classify_error("request timed out"), "timeout");
        assert_eq!(classify_error("download returned 404 Not Found"), "404");
        assert_eq!(classify_error("500 Internal Server Error"), "500");
        assert_eq!(classify_error("connection reset by peer"), "unknown");
    }

    #[test]
    fn summarize_counts_by_outcome() {
        let outcomes = vec![
            MigrationOutcome::Created {
                source_id: "a".into(),
                slug: "a".into(),
                new_id: "1".into(),
                image_failures: vec![],
            },
            MigrationOutcome::Skipped {
                source_id: "b".into(),
                slug: "b".into(),
                reason: "already exists".into(),
            },
            failed("duplicate slug: c"),
            failed("download timeout after 30s"),
        ];

        let report = summarize("post-migration", outcomes);
        assert_eq!(report.total, 4);
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures_by_type["duplicate slug"], 1);
        assert_eq!(report.failures_by_type["timeout"], 1);
    }

    #[test]
    fn report_file_name_is_timestamped_and_safe() {
        let dir = tempfile::tempdir().unwrap();
        let report = summarize("post-migration", vec![failed("oops")]);
        let path = write(&report, dir.path()).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("post-migration-report-"));
        assert!(name.ends_with(".json"));
        assert!(!name.contains(':'));

        let content = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["failed"], 1);
        assert_eq!(parsed["outcomes"].as_array().unwrap().len(), 1);
    }
}

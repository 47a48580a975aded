//! Export the reconciled timeline as a downloadable JSON document.
//!
//! The export is a pure projection of a [`Store`]; producing it never talks
//! to the backend.
//!
//! ```json
//! {
//!   "case_name": "Johnson v. Smith Motors",
//!   "export_date": "2024-03-15T10:00:00Z",
//!   "events": [{"date": "2024-01-10", "description": "...", "category": "medical", "confidence": 0.95}],
//!   "contradictions": [...],
//!   "facts_count": 12
//! }
//! ```

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;

use crate::models::Contradiction;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineExport {
    pub case_name: String,
    pub export_date: String,
    pub events: Vec<ExportEvent>,
    pub contradictions: Vec<Contradiction>,
    pub facts_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportEvent {
    pub date: String,
    pub description: String,
    pub category: Option<String>,
    pub confidence: Option<f64>,
}

/// Project `store` into the export document.
pub fn build_export(store: &Store, case_name: &str, exported_at: DateTime<Utc>) -> TimelineExport {
    TimelineExport {
        case_name: case_name.to_string(),
        export_date: exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        events: store
            .events()
            .iter()
            .map(|e| ExportEvent {
                date: format_date(&e.date),
                description: e.description.clone(),
                category: e.category.clone(),
                confidence: e.confidence_score,
            })
            .collect(),
        contradictions: store.contradictions().to_vec(),
        facts_count: store.fact_count(),
    }
}

/// Date-only when the time is midnight, full ISO timestamp otherwise.
fn format_date(date: &NaiveDateTime) -> String {
    if date.time() == NaiveTime::MIN {
        date.format("%Y-%m-%d").to_string()
    } else {
        date.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Write the export as pretty JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub fn write_export(export: &TimelineExport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(export)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} events, {} contradictions to {}",
                export.events.len(),
                export.contradictions.len(),
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

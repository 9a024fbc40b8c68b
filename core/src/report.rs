//! Job reporting types.
//!
//! A [`JobReport`] is the read-only summary of one pipeline run: every
//! unit's final status, per-file outcomes, and aggregate counts. Degraded
//! output is always explicit here, never silent.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Final status of a single translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Resolved from the translation memory without a provider call.
    Cached,
    /// Freshly translated by the provider during this run.
    Translated,
    /// Translation failed; the output keeps the source text.
    Failed,
    /// Screened out before translation (key, template, identifier).
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub unit_id: String,
    pub key: String,
    pub status: UnitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-file pipeline state. `Failed` is terminal and reachable from
/// extraction (format error), merging (alignment error), or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Extracting,
    LookupPending,
    Translating,
    Merging,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub state: FileState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub units: Vec<UnitOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub cached: usize,
    pub translated: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl JobCounts {
    pub fn total(&self) -> usize {
        self.cached + self.translated + self.failed + self.skipped
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub source_lang: String,
    pub target_lang: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
    pub counts: JobCounts,
    pub cancelled: bool,
    /// Set when cache persistence failed and the run continued in memory.
    pub cache_degraded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl JobReport {
    pub fn tally(files: &[FileReport]) -> JobCounts {
        let mut counts = JobCounts::default();
        for file in files {
            for unit in &file.units {
                match unit.status {
                    UnitStatus::Cached => counts.cached += 1,
                    UnitStatus::Translated => counts.translated += 1,
                    UnitStatus::Failed => counts.failed += 1,
                    UnitStatus::Skipped => counts.skipped += 1,
                }
            }
        }
        counts
    }

    /// True when every file reached `Done` and no unit failed.
    pub fn is_clean(&self) -> bool {
        self.files.iter().all(|f| f.state == FileState::Done) && self.counts.failed == 0
    }
}

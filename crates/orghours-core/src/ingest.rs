//! Loading report files.
//!
//! A malformed report rejects only its own source: [`load_sources`] keeps
//! going and records the failure so callers can emit partial results.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifacts::source_name_for;
use crate::error::{HoursError, Result};
use crate::obs;
use crate::record::SourceReport;

/// A source that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub path: Option<PathBuf>,
    pub reason: String,
}

/// Reports that loaded, plus the ones that did not.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub reports: Vec<SourceReport>,
    pub failures: Vec<SourceFailure>,
}

impl LoadOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Number of sources attempted.
    pub fn attempted(&self) -> usize {
        self.reports.len() + self.failures.len()
    }

    /// Fail when no source at all is usable.
    pub fn require_any(&self, searched: &[PathBuf]) -> Result<()> {
        if self.reports.is_empty() {
            return Err(HoursError::NoReport {
                searched: searched.to_vec(),
            });
        }
        Ok(())
    }

    /// Fail on any rejected source (strict mode).
    pub fn require_complete(&self) -> Result<()> {
        if self.is_partial() {
            return Err(HoursError::Partial {
                failed: self.failures.len(),
                total: self.attempted(),
            });
        }
        Ok(())
    }

    /// Record a source that succeeded elsewhere (e.g. a collector). A report
    /// whose totals overflow is recorded as a failure instead.
    pub fn push_report(&mut self, report: SourceReport) {
        let total = match report.recomputed_total() {
            Ok(total) => total,
            Err(reason) => {
                let error = HoursError::Rejected {
                    source_name: report.name().to_string(),
                    reason,
                };
                self.push_failure(report.name(), None, &error);
                return;
            }
        };
        obs::emit_source_loaded(report.name(), report.len(), total.hours);
        if let Some(declared) = report.declared_total() {
            if report.total_mismatch() {
                obs::emit_total_mismatch(report.name(), declared.hours, total.hours);
            }
        }
        self.reports.push(report);
    }

    pub fn push_failure(&mut self, source: &str, path: Option<PathBuf>, error: &HoursError) {
        obs::emit_source_rejected(source, error);
        self.failures.push(SourceFailure {
            source: source.to_string(),
            path,
            reason: error.to_string(),
        });
    }
}

/// Read and validate one report file. The source name comes from the file name.
pub fn load_source(path: &Path) -> Result<SourceReport> {
    let name = source_name_for(path);
    let text = std::fs::read_to_string(path).map_err(|e| HoursError::io(path, e))?;
    SourceReport::from_json(name.clone(), &text).map_err(|reason| HoursError::Rejected {
        source_name: name,
        reason,
    })
}

/// Load every path, collecting failures instead of stopping at the first.
pub fn load_sources(paths: &[PathBuf]) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    for path in paths {
        match load_source(path) {
            Ok(report) => outcome.push_report(report),
            Err(e) => outcome.push_failure(&source_name_for(path), Some(path.clone()), &e),
        }
    }
    outcome
}

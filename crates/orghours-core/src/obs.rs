//! Structured observability hooks for the hours pipeline.
//!
//! Every stage emits one named event (`event = "..."`) so runs can be
//! followed in JSON logs:
//! - `source.loaded` / `source.rejected` / `source.total_mismatch`
//! - `aggregate.merged`
//! - `region.injected` / `region.end_marker_missing`
//! - `artifact.written`
//! - `collect.finished`

use tracing::{info, warn};

/// RAII guard that enters a run-scoped span for the duration of a command.
///
/// ```ignore
/// let _span = PipelineSpan::enter("readme");
/// ```
pub struct PipelineSpan {
    _span: tracing::span::EnteredSpan,
}

impl PipelineSpan {
    pub fn enter(command: &str) -> Self {
        let span = tracing::info_span!("orghours.run", command = %command);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_source_loaded(source: &str, contributors: usize, hours: f64) {
    info!(
        event = "source.loaded",
        source = %source,
        contributors = contributors,
        hours = hours,
    );
}

pub fn emit_source_rejected(source: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "source.rejected", source = %source, reason = %reason);
}

/// The report's own `total` disagrees with its entries; the recomputed value wins.
pub fn emit_total_mismatch(source: &str, declared: f64, recomputed: f64) {
    warn!(
        event = "source.total_mismatch",
        source = %source,
        declared_hours = declared,
        recomputed_hours = recomputed,
    );
}

pub fn emit_aggregate_merged(sources: usize, contributors: usize, hours: f64, commits: u64) {
    info!(
        event = "aggregate.merged",
        sources = sources,
        contributors = contributors,
        hours = hours,
        commits = commits,
    );
}

pub fn emit_region_injected(document: &str, changed: bool) {
    info!(event = "region.injected", document = %document, changed = changed);
}

pub fn emit_end_marker_missing(marker: &str) {
    warn!(event = "region.end_marker_missing", marker = %marker);
}

pub fn emit_artifact_written(path: &str) {
    info!(event = "artifact.written", path = %path);
}

pub fn emit_collect_finished(repo: &str, success: bool, duration_ms: u64) {
    info!(
        event = "collect.finished",
        repo = %repo,
        success = success,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_span_create() {
        let _span = PipelineSpan::enter("test-command");
    }
}

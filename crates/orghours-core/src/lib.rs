//! orghours Core Library
//!
//! Merges per-repository `git-hours` reports into organization-wide totals,
//! reconciles contributor identities through explicit alias rules, and
//! republishes the result as a Markdown region or a static KPI page.
//!
//! Pipeline: [`ingest`] -> [`identity`] -> [`aggregate`] -> [`table`] /
//! [`page`] -> [`inject`] or [`artifacts`].

pub mod aggregate;
pub mod artifacts;
pub mod collect;
pub mod config;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod inject;
pub mod obs;
pub mod page;
pub mod record;
pub mod table;
pub mod telemetry;

pub use aggregate::{canonicalize_source, merge, AggregateReport};
pub use artifacts::{
    aggregate_file_name, latest_report, reports_for_date, source_file_name, source_name_for,
    write_json, write_run_artifacts,
};
pub use collect::{collect_all, GitHoursCollector, HoursCollector, RepoTarget};
pub use config::{HoursConfig, DEFAULT_END_MARKER, DEFAULT_START_MARKER};
pub use error::{HoursError, ReportError, Result};
pub use identity::{
    AliasProvider, AliasRuleSet, Identity, IdentityResolver, MailmapFile, Resolution,
    StaticAliases, YamlAliasFile, TOTAL_KEY,
};
pub use ingest::{load_source, load_sources, LoadOutcome, SourceFailure};
pub use inject::{inject_file, replace_region, InjectWarning, Injection};
pub use page::{assemble, render_html, PageModel, PageTotals, SourceTable, LATEST_DATA_FILE};
pub use record::{HourRecord, SourceReport};
pub use table::{escape_html, html_table, markdown_table, render, MarkdownOptions, Row, SortKey};

pub use obs::{
    emit_aggregate_merged, emit_artifact_written, emit_collect_finished,
    emit_end_marker_missing, emit_region_injected, emit_source_loaded, emit_source_rejected,
    emit_total_mismatch, PipelineSpan,
};
pub use telemetry::init_tracing;

/// orghours version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

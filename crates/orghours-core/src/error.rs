//! Error taxonomy for orghours.
//!
//! [`ReportError`] describes why a single source report was rejected; it never
//! aborts a multi-source run on its own. [`HoursError`] is the pipeline-level
//! error surfaced to callers, with a stable process exit code per class.

use std::path::PathBuf;

use thiserror::Error;

/// Reasons a raw git-hours report is rejected.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unparsable report: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("report must be a JSON object keyed by identity")]
    NotAnObject,

    #[error("invalid record for {identity}: {detail}")]
    InvalidRecord { identity: String, detail: String },

    #[error("negative hours for {identity}: {hours}")]
    NegativeHours { identity: String, hours: f64 },

    #[error("non-finite hours for {identity}")]
    NonFiniteHours { identity: String },

    #[error("negative commits for {identity}: {commits}")]
    NegativeCommits { identity: String, commits: f64 },

    #[error("{field} sum overflows at {identity}")]
    Overflow {
        identity: String,
        field: &'static str,
    },
}

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum HoursError {
    #[error("no git-hours report found{}", fmt_searched(.searched))]
    NoReport { searched: Vec<PathBuf> },

    #[error("report {source_name} rejected: {reason}")]
    Rejected {
        source_name: String,
        #[source]
        reason: ReportError,
    },

    #[error("alias file {path:?} is malformed: {detail}")]
    AliasFile { path: PathBuf, detail: String },

    #[error("start marker {marker:?} not found in document")]
    MarkerNotFound { marker: String },

    #[error("generated content contains marker line {marker:?}")]
    ContentContainsMarker { marker: String },

    #[error("merged {field} overflow for {identity}")]
    Overflow {
        identity: String,
        field: &'static str,
    },

    #[error("{which} marker is empty")]
    EmptyMarker { which: &'static str },

    #[error("{failed} of {total} sources failed; results are partial")]
    Partial { failed: usize, total: usize },

    #[error("collector failed for {repo}: {detail}")]
    Collect { repo: String, detail: String },

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn fmt_searched(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        String::new()
    } else {
        let dirs: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
        format!(" (searched: {})", dirs.join(", "))
    }
}

impl HoursError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HoursError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error class.
    ///
    /// `0` is success and `1` is reserved for errors outside this taxonomy.
    pub fn exit_code(&self) -> i32 {
        match self {
            HoursError::NoReport { .. } | HoursError::Rejected { .. } => 2,
            HoursError::MarkerNotFound { .. }
            | HoursError::ContentContainsMarker { .. }
            | HoursError::EmptyMarker { .. } => 3,
            HoursError::Io { .. } => 4,
            HoursError::Partial { .. } => 5,
            HoursError::AliasFile { .. }
            | HoursError::Overflow { .. }
            | HoursError::Collect { .. }
            | HoursError::Serialization(_) => 1,
        }
    }
}

/// Result type for orghours operations.
pub type Result<T> = std::result::Result<T, HoursError>;

//! Run configuration.
//!
//! Defaults come from environment variables, falling back to the conventional
//! repository layout. The CLI overrides individual fields from flags.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::{AliasProvider, AliasRuleSet, MailmapFile, YamlAliasFile};

pub const DEFAULT_START_MARKER: &str = "<!-- HOURS_START -->";
pub const DEFAULT_END_MARKER: &str = "<!-- HOURS_END -->";

/// Paths and markers used by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursConfig {
    /// Directories searched for `git-hours-*.json`, in order.
    pub report_dirs: Vec<PathBuf>,
    /// YAML alias map; highest alias priority.
    pub aliases_path: PathBuf,
    /// Git mailmap; consulted after the YAML map.
    pub mailmap_path: PathBuf,
    pub start_marker: String,
    pub end_marker: String,
    /// Passed to `git-hours -since` when set.
    pub window_start: Option<String>,
}

impl Default for HoursConfig {
    fn default() -> Self {
        let reports_dir =
            std::env::var("ORGHOURS_REPORTS_DIR").unwrap_or_else(|_| "reports".to_string());
        HoursConfig {
            report_dirs: vec![PathBuf::from(&reports_dir), PathBuf::from("site/data")],
            aliases_path: std::env::var("ORGHOURS_ALIASES")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(reports_dir).join("email-aliases.yaml")),
            mailmap_path: std::env::var("ORGHOURS_MAILMAP")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".mailmap")),
            start_marker: std::env::var("ORGHOURS_START_MARKER")
                .unwrap_or_else(|_| DEFAULT_START_MARKER.to_string()),
            end_marker: std::env::var("ORGHOURS_END_MARKER")
                .unwrap_or_else(|_| DEFAULT_END_MARKER.to_string()),
            window_start: std::env::var("WINDOW_START")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }
}

impl HoursConfig {
    /// Create a config from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_aliases(mut self, path: impl Into<PathBuf>) -> Self {
        self.aliases_path = path.into();
        self
    }

    pub fn with_mailmap(mut self, path: impl Into<PathBuf>) -> Self {
        self.mailmap_path = path.into();
        self
    }

    pub fn with_markers(mut self, start: &str, end: &str) -> Self {
        self.start_marker = start.to_string();
        self.end_marker = end.to_string();
        self
    }

    pub fn with_report_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.report_dirs = dirs;
        self
    }

    pub fn with_window_start(mut self, since: Option<String>) -> Self {
        self.window_start = since;
        self
    }

    /// Load the alias table: YAML map first, then mailmap.
    pub fn load_aliases(&self) -> Result<AliasRuleSet> {
        let yaml = YamlAliasFile::new(&self.aliases_path);
        let mailmap = MailmapFile::new(&self.mailmap_path);
        let providers: [&dyn AliasProvider; 2] = [&yaml, &mailmap];
        AliasRuleSet::load(&providers)
    }
}

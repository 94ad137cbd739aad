//! On-disk report artifacts.
//!
//! Naming convention, one file per source and one aggregate per date:
//! - `git-hours-<owner>_<repo>-<YYYY-MM-DD>.json`
//! - `git-hours-aggregated-<YYYY-MM-DD>.json`
//!
//! Both hold a mapping of identity to `{hours, commits}` plus `total`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{canonicalize_source, AggregateReport};
use crate::error::{HoursError, Result};
use crate::identity::AliasRuleSet;
use crate::inject::write_atomic;
use crate::obs;
use crate::record::SourceReport;

const PREFIX: &str = "git-hours-";
const AGGREGATED: &str = "aggregated";
const DATE_LEN: usize = "YYYY-MM-DD".len();

/// File name for one source's report.
pub fn source_file_name(source: &str, date: NaiveDate) -> String {
    format!("{PREFIX}{}-{}.json", source.replace('/', "_"), date.format("%Y-%m-%d"))
}

/// File name for the cross-source aggregate.
pub fn aggregate_file_name(date: NaiveDate) -> String {
    format!("{PREFIX}{AGGREGATED}-{}.json", date.format("%Y-%m-%d"))
}

/// Parsed pieces of an artifact file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    /// Source name with `_` decoded back to `/`; `None` for undated or
    /// single-repository files such as `git-hours-2024-01-01.json`.
    pub source: Option<String>,
    pub date: Option<NaiveDate>,
    pub aggregated: bool,
}

/// Split `git-hours-<source>-<date>.json` into its parts.
pub fn parse_artifact_name(path: &Path) -> Option<ArtifactName> {
    let file = path.file_name()?.to_str()?;
    let stem = file.strip_suffix(".json")?;
    let rest = stem.strip_prefix(PREFIX)?;

    let (name, date) = match rest.len().checked_sub(DATE_LEN) {
        Some(split) if rest.is_char_boundary(split) => {
            match NaiveDate::parse_from_str(&rest[split..], "%Y-%m-%d") {
                Ok(date) => (rest[..split].trim_end_matches('-'), Some(date)),
                Err(_) => (rest, None),
            }
        }
        _ => (rest, None),
    };

    let aggregated = name == AGGREGATED;
    let source = if name.is_empty() || aggregated {
        None
    } else {
        Some(name.replace('_', "/"))
    };
    Some(ArtifactName {
        source,
        date,
        aggregated,
    })
}

/// Display name for a report file: the decoded source, or the file stem.
pub fn source_name_for(path: &Path) -> String {
    match parse_artifact_name(path) {
        Some(ArtifactName {
            source: Some(source),
            ..
        }) => source,
        Some(ArtifactName {
            aggregated: true, ..
        }) => "all repositories".to_string(),
        _ => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    }
}

/// Write any serializable artifact as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, artifact: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(artifact)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HoursError::io(parent, e))?;
    }
    write_atomic(path, content.as_bytes())?;
    obs::emit_artifact_written(&path.display().to_string());
    Ok(())
}

/// Write one file per source (raw identities, recomputed totals) and the
/// aggregate. Returns the written paths, aggregate last.
pub fn write_run_artifacts(
    dir: &Path,
    date: NaiveDate,
    sources: &[SourceReport],
    aggregate: &AggregateReport,
) -> Result<Vec<PathBuf>> {
    let raw = AliasRuleSet::default();
    let mut written = Vec::with_capacity(sources.len() + 1);
    for source in sources {
        let path = dir.join(source_file_name(source.name(), date));
        write_json(&path, &canonicalize_source(source, &raw)?)?;
        written.push(path);
    }
    let path = dir.join(aggregate_file_name(date));
    write_json(&path, aggregate)?;
    written.push(path);
    Ok(written)
}

fn list_reports(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(HoursError::io(dir, e)),
    };
    let mut found = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| HoursError::io(dir, e))?.path();
        if path.is_file() && parse_artifact_name(&path).is_some() {
            found.push(path);
        }
    }
    Ok(found)
}

/// Most recent report across `dirs`.
///
/// Newest date wins; on the same date the aggregated file is preferred, then
/// the greatest file name. Undated files sort before every dated one.
pub fn latest_report(dirs: &[PathBuf]) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    for dir in dirs {
        candidates.extend(list_reports(dir)?);
    }
    candidates
        .into_iter()
        .filter_map(|path| {
            let name = parse_artifact_name(&path)?;
            let file = path.file_name()?.to_string_lossy().into_owned();
            Some(((name.date, name.aggregated, file), path))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
        .ok_or_else(|| HoursError::NoReport {
            searched: dirs.to_vec(),
        })
}

/// Per-source reports written on `date` in `dir`, aggregate excluded, sorted.
pub fn reports_for_date(dir: &Path, date: NaiveDate) -> Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = list_reports(dir)?
        .into_iter()
        .filter(|path| {
            matches!(
                parse_artifact_name(path),
                Some(ArtifactName {
                    source: Some(_),
                    date: Some(d),
                    aggregated: false,
                }) if d == date
            )
        })
        .collect();
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::merge;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn file_names_encode_source_and_date() {
        assert_eq!(
            source_file_name("acme/hours-site", date("2024-03-09")),
            "git-hours-acme_hours-site-2024-03-09.json"
        );
        assert_eq!(
            aggregate_file_name(date("2024-03-09")),
            "git-hours-aggregated-2024-03-09.json"
        );
    }

    #[test]
    fn parses_artifact_names() {
        let parsed =
            parse_artifact_name(Path::new("tmp/git-hours-org_api-2024-03-09.json")).unwrap();
        assert_eq!(parsed.source.as_deref(), Some("org/api"));
        assert_eq!(parsed.date, Some(date("2024-03-09")));
        assert!(!parsed.aggregated);

        let agg = parse_artifact_name(Path::new("git-hours-aggregated-2024-03-09.json")).unwrap();
        assert!(agg.aggregated);
        assert_eq!(agg.source, None);

        let single = parse_artifact_name(Path::new("git-hours-2024-03-09.json")).unwrap();
        assert_eq!(single.source, None);
        assert_eq!(single.date, Some(date("2024-03-09")));

        assert!(parse_artifact_name(Path::new("notes.json")).is_none());
        assert!(parse_artifact_name(Path::new("git-hours-x.txt")).is_none());
    }

    #[test]
    fn latest_report_prefers_newest_date_then_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "git-hours-org_a-2024-01-01.json",
            "git-hours-aggregated-2024-01-02.json",
            "git-hours-org_z-2024-01-02.json",
            "README.md",
        ] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let latest = latest_report(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(
            latest.file_name().unwrap(),
            "git-hours-aggregated-2024-01-02.json"
        );
    }

    #[test]
    fn latest_report_fails_when_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = latest_report(&[dir.path().join("missing")]).unwrap_err();
        assert!(matches!(err, HoursError::NoReport { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn write_run_artifacts_round_trips_through_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let d = date("2024-05-01");
        let sources = vec![
            SourceReport::new("org/a").with("x@x.com", 1.0, 1),
            SourceReport::new("org/b").with("y@x.com", 2.0, 3),
        ];
        let aggregate = merge(&sources, &AliasRuleSet::default()).unwrap();
        let written = write_run_artifacts(dir.path(), d, &sources, &aggregate).unwrap();
        assert_eq!(written.len(), 3);

        let per_source = reports_for_date(dir.path(), d).unwrap();
        let names: Vec<String> = per_source.iter().map(|p| source_name_for(p)).collect();
        assert_eq!(names, vec!["org/a", "org/b"]);

        let text = std::fs::read_to_string(dir.path().join(aggregate_file_name(d))).unwrap();
        let reread = SourceReport::from_json("agg", &text).unwrap();
        assert_eq!(reread.recomputed_total().unwrap().commits, 4);
        assert!(!reread.total_mismatch());
    }
}

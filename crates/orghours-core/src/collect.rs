//! Fetching raw reports by running `git-hours`.
//!
//! [`collect_all`] fans out one task per repository on a [`JoinSet`] and
//! returns results in input order; a failing repository never cancels the
//! others.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinSet;

use crate::error::{HoursError, Result};
use crate::obs;
use crate::record::SourceReport;

/// What to measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoTarget {
    /// `owner/name` on the configured remote host.
    Remote(String),
    /// A checkout already on disk.
    Local(PathBuf),
}

impl RepoTarget {
    /// Source name used in reports and file names.
    pub fn name(&self) -> String {
        match self {
            RepoTarget::Remote(repo) => repo.clone(),
            RepoTarget::Local(path) => path
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

/// Produces one [`SourceReport`] per repository.
///
/// Implement this to plug in a different estimator or a test stub.
#[async_trait]
pub trait HoursCollector: Send + Sync {
    async fn collect(&self, target: &RepoTarget) -> Result<SourceReport>;
}

/// Runs the `git-hours` binary, cloning remote repositories into a temp dir.
#[derive(Debug, Clone)]
pub struct GitHoursCollector {
    base_url: String,
    since: Option<String>,
    program: String,
}

impl Default for GitHoursCollector {
    fn default() -> Self {
        Self {
            base_url: "https://github.com".to_string(),
            since: None,
            program: "git-hours".to_string(),
        }
    }
}

impl GitHoursCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_since(mut self, since: Option<String>) -> Self {
        self.since = since;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    async fn run_git_hours(&self, repo: &str, dir: &Path) -> Result<SourceReport> {
        let mut cmd = Command::new(&self.program);
        if let Some(since) = &self.since {
            cmd.arg("-since").arg(since);
        }
        let output = cmd
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| collect_error(repo, format!("failed to run {}: {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(collect_error(
                repo,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        SourceReport::from_json(repo, &stdout).map_err(|reason| HoursError::Rejected {
            source_name: repo.to_string(),
            reason,
        })
    }
}

#[async_trait]
impl HoursCollector for GitHoursCollector {
    async fn collect(&self, target: &RepoTarget) -> Result<SourceReport> {
        let name = target.name();
        match target {
            RepoTarget::Local(path) => {
                let root = repo_root(path).await?;
                self.run_git_hours(&name, &root).await
            }
            RepoTarget::Remote(repo) => {
                let checkout = tempfile::tempdir().map_err(|e| HoursError::io("tempdir", e))?;
                let url = format!("{}/{}.git", self.base_url, repo);
                let output = Command::new("git")
                    .args(["clone", "--quiet", url.as_str()])
                    .arg(checkout.path())
                    .output()
                    .await
                    .map_err(|e| collect_error(repo, format!("failed to run git: {e}")))?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(collect_error(
                        repo,
                        format!("git clone {url} failed: {}", stderr.trim()),
                    ));
                }
                self.run_git_hours(&name, checkout.path()).await
            }
        }
    }
}

fn collect_error(repo: &str, detail: String) -> HoursError {
    HoursError::Collect {
        repo: repo.to_string(),
        detail,
    }
}

/// Top-level directory of the work tree containing `dir`.
async fn repo_root(dir: &Path) -> Result<PathBuf> {
    let label = dir.display().to_string();
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| collect_error(&label, format!("failed to run git: {e}")))?;
    if !output.status.success() {
        return Err(collect_error(&label, "not inside a git work tree".to_string()));
    }
    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if root.is_empty() {
        return Err(collect_error(
            &label,
            "git rev-parse --show-toplevel returned empty output".to_string(),
        ));
    }
    Ok(PathBuf::from(root))
}

/// Collect every target concurrently. Results keep the order of `targets`.
pub async fn collect_all(
    collector: Arc<dyn HoursCollector>,
    targets: &[RepoTarget],
) -> Vec<(String, Result<SourceReport>)> {
    let mut join_set = JoinSet::new();
    for (idx, target) in targets.iter().cloned().enumerate() {
        let collector = Arc::clone(&collector);
        join_set.spawn(async move {
            let started = Instant::now();
            let result = collector.collect(&target).await;
            let name = target.name();
            obs::emit_collect_finished(
                &name,
                result.is_ok(),
                started.elapsed().as_millis() as u64,
            );
            (idx, result)
        });
    }

    let mut slots: Vec<Option<Result<SourceReport>>> = targets.iter().map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, result)) => slots[idx] = Some(result),
            Err(e) => tracing::error!(error = %e, "collect task join error"),
        }
    }

    targets
        .iter()
        .zip(slots)
        .map(|(target, slot)| {
            let name = target.name();
            let result = slot.unwrap_or_else(|| {
                Err(collect_error(&name, "collect task did not complete".to_string()))
            });
            (name, result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    /// Stub collector backed by an in-memory map of repo -> JSON output.
    struct MockCollector {
        outputs: HashMap<String, String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockCollector {
        fn with(outputs: Vec<(&str, &str)>) -> Arc<Self> {
            Arc::new(Self {
                outputs: outputs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HoursCollector for MockCollector {
        async fn collect(&self, target: &RepoTarget) -> Result<SourceReport> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let name = target.name();
            let json = self
                .outputs
                .get(&name)
                .ok_or_else(|| collect_error(&name, "clone failed".to_string()))?;
            SourceReport::from_json(name.clone(), json).map_err(|reason| HoursError::Rejected {
                source_name: name,
                reason,
            })
        }
    }

    fn remote(repo: &str) -> RepoTarget {
        RepoTarget::Remote(repo.to_string())
    }

    #[tokio::test]
    async fn collect_all_keeps_input_order_and_isolates_failures() {
        let collector = MockCollector::with(vec![
            ("org/a", r#"{"a@x.com": {"hours": 1, "commits": 1}}"#),
            ("org/c", r#"{"c@x.com": {"hours": 3, "commits": 2}}"#),
        ]);
        let targets = vec![remote("org/a"), remote("org/b"), remote("org/c")];
        let results = collect_all(collector, &targets).await;

        let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["org/a", "org/b", "org/c"]);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(HoursError::Collect { .. })));
        assert_eq!(results[2].1.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn collect_all_runs_concurrently() {
        let collector = MockCollector::with(vec![]);
        let targets = vec![remote("org/a"), remote("org/b"), remote("org/c"), remote("org/d")];
        let results = collect_all(collector.clone(), &targets).await;
        assert_eq!(results.len(), 4);
        assert!(
            collector.max_in_flight.load(Ordering::SeqCst) > 1,
            "expected concurrent collection, max_in_flight={}",
            collector.max_in_flight.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_collect_error() {
        let dir = tempfile::tempdir().unwrap();
        let collector = GitHoursCollector::new().with_program("definitely-not-git-hours-binary");
        let err = collector
            .run_git_hours("org/a", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, HoursError::Collect { .. }));
    }

    #[test]
    fn remote_target_name_is_the_slug() {
        assert_eq!(remote("org/a").name(), "org/a");
    }
}

//! File-based workflow: alias files and report files on disk, through merge,
//! artifact writing, discovery and page assembly.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use orghours_core::{
    assemble, latest_report, load_sources, merge, render_html, reports_for_date,
    write_run_artifacts, HourRecord, HoursConfig, SortKey,
};

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn workspace() -> (tempfile::TempDir, HoursConfig, Vec<PathBuf>) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let aliases = write(
        root,
        "email-aliases.yaml",
        "dev@laptop.local: Dev@Example.com\n",
    );
    let mailmap = write(
        root,
        ".mailmap",
        "Dev <other@example.com> <dev@laptop.local>\nOps <ops@example.com> <ops@old.example.com>\n",
    );
    let reports = vec![
        write(
            root,
            "git-hours-org_api-2024-02-01.json",
            r#"{
                "total": {"name": "", "hours": 6, "commits": 4},
                "dev@example.com": {"name": "Dev", "hours": 2, "commits": 1},
                "dev@laptop.local": {"name": "Dev", "hours": 1, "commits": 1},
                "ops@old.example.com": {"name": "Ops", "hours": 3, "commits": 2}
            }"#,
        ),
        write(
            root,
            "git-hours-org_web-2024-02-01.json",
            r#"{"ops@example.com": {"name": "Ops", "hours": 0.5, "commits": 1}}"#,
        ),
        write(
            root,
            "git-hours-org_broken-2024-02-01.json",
            r#"{"x@example.com": {"hours": "lots", "commits": 1}}"#,
        ),
    ];
    let config = HoursConfig::from_env()
        .with_aliases(aliases)
        .with_mailmap(mailmap)
        .with_report_dirs(vec![root.to_path_buf()]);
    (dir, config, reports)
}

#[test]
fn partial_run_merges_good_sources_and_reports_the_bad_one() {
    let (_dir, config, reports) = workspace();
    let rules = config.load_aliases().unwrap();
    let outcome = load_sources(&reports);

    assert_eq!(outcome.reports.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].source, "org/broken");

    let aggregate = merge(&outcome.reports, &rules).unwrap();
    // Canonical side keeps its declared casing.
    assert_eq!(
        aggregate.get("Dev@Example.com"),
        Some(&HourRecord::new(1.0, 1))
    );
    assert_eq!(aggregate.get("dev@example.com"), Some(&HourRecord::new(2.0, 1)));
    assert_eq!(aggregate.get("ops@example.com"), Some(&HourRecord::new(3.5, 3)));
    assert_eq!(aggregate.total(), HourRecord::new(6.5, 5));

    let generated_at: DateTime<Utc> = DateTime::parse_from_rfc3339("2024-02-01T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let page = assemble(
        &aggregate,
        &outcome.reports,
        &outcome.failures,
        &rules,
        SortKey::Hours,
        generated_at,
    )
    .unwrap();
    assert!(page.partial);
    assert_eq!(page.totals.repositories, 2);
    assert_eq!(page.sources[0].name, "org/api");
    assert_eq!(page.sources[1].name, "org/web");

    let html = render_html(&page);
    assert!(html.contains("org/broken"));
    assert!(html.contains("<h2>org/api</h2>"));
}

#[test]
fn written_artifacts_are_discoverable() {
    let (dir, config, reports) = workspace();
    let rules = config.load_aliases().unwrap();
    let outcome = load_sources(&reports[..2]);
    let aggregate = merge(&outcome.reports, &rules).unwrap();

    let out = dir.path().join("out");
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    write_run_artifacts(&out, date, &outcome.reports, &aggregate).unwrap();

    let per_source = reports_for_date(&out, date).unwrap();
    assert_eq!(per_source.len(), 2);

    let latest = latest_report(&[out.clone(), dir.path().to_path_buf()]).unwrap();
    assert_eq!(
        latest.file_name().unwrap(),
        "git-hours-aggregated-2024-03-01.json"
    );

    let reloaded = load_sources(&[latest]);
    assert_eq!(reloaded.reports[0].name(), "all repositories");
    assert_eq!(reloaded.reports[0].recomputed_total().unwrap(), aggregate.total());
}

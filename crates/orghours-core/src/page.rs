//! KPI page model and its static HTML rendering.
//!
//! [`assemble`] is pure: it turns already-merged data into a [`PageModel`].
//! [`render_html`] formats that model; every identity and source name is
//! escaped before it reaches the markup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{canonicalize_source, AggregateReport};
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::ingest::SourceFailure;
use crate::record::SourceReport;
use crate::table::{escape_html, html_table, render, Row, SortKey};

/// Aggregate snapshot the page's hours chart loads, next to `index.html`.
pub const LATEST_DATA_FILE: &str = "git-hours-latest.json";

/// Headline counters for the whole organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTotals {
    pub hours: f64,
    pub commits: u64,
    pub contributors: usize,
    pub repositories: usize,
}

/// One repository section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTable {
    pub name: String,
    pub hours: f64,
    pub commits: u64,
    pub rows: Vec<Row>,
}

/// Everything the page renderer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageModel {
    pub generated_at: DateTime<Utc>,
    pub totals: PageTotals,
    pub combined: Vec<Row>,
    pub sources: Vec<SourceTable>,
    pub failed_sources: Vec<SourceFailure>,
    /// True when any source failed; totals then cover only `sources`.
    pub partial: bool,
}

/// Build the page model from a merged report and the sources behind it.
pub fn assemble(
    aggregate: &AggregateReport,
    sources: &[SourceReport],
    failures: &[SourceFailure],
    resolver: &dyn IdentityResolver,
    sort_key: SortKey,
    generated_at: DateTime<Utc>,
) -> Result<PageModel> {
    let total = aggregate.total();
    let mut tables = Vec::with_capacity(sources.len());
    for source in sources {
        let canonical = canonicalize_source(source, resolver)?;
        tables.push(SourceTable {
            name: source.name().to_string(),
            hours: canonical.total().hours,
            commits: canonical.total().commits,
            rows: render(&canonical, sort_key),
        });
    }

    Ok(PageModel {
        generated_at,
        totals: PageTotals {
            hours: total.hours,
            commits: total.commits,
            contributors: aggregate.contributor_count(),
            repositories: sources.len(),
        },
        combined: render(aggregate, sort_key),
        sources: tables,
        failed_sources: failures.to_vec(),
        partial: !failures.is_empty(),
    })
}

/// Render the standalone KPI page.
pub fn render_html(page: &PageModel) -> String {
    let mut html = String::new();
    html.push_str(
        "<!doctype html>\n<html lang='en'>\n<head>\n<meta charset='utf-8'>\n\
         <title>Collaborator KPIs</title>\n\
         <link rel='stylesheet' href='https://cdn.jsdelivr.net/npm/simpledotcss/simple.min.css'>\n\
         <script src='https://cdn.jsdelivr.net/npm/sortable-tablesort/sortable.min.js' defer></script>\n\
         <script src='https://cdn.jsdelivr.net/npm/chart.js'></script>\n\
         <style>canvas{max-height:400px}</style>\n\
         </head>\n<body>\n<main>\n<h1>Collaborator KPIs</h1>\n",
    );
    html.push_str(&format!(
        "<p><em>Last updated {}</em></p>\n",
        page.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    if page.partial {
        html.push_str("<p><strong>Partial data:</strong> the following sources failed and are not included in the totals.</p>\n<ul>\n");
        for failure in &page.failed_sources {
            html.push_str(&format!(
                "<li>{}: {}</li>\n",
                escape_html(&failure.source),
                escape_html(&failure.reason)
            ));
        }
        html.push_str("</ul>\n");
    }

    html.push_str("<h2>Totals (all repos)</h2>\n<ul>\n");
    html.push_str(&format!(
        "<li><strong>Hours</strong>: {:.1}</li>\n<li><strong>Commits</strong>: {}</li>\n\
         <li><strong>Contributors</strong>: {}</li>\n<li><strong>Repositories</strong>: {}</li>\n",
        page.totals.hours, page.totals.commits, page.totals.contributors, page.totals.repositories
    ));
    html.push_str("</ul>\n");

    html.push_str("<h2>Hours per contributor</h2>\n<canvas id='hoursChart'></canvas>\n");

    html.push_str("<h2>Detail table (all repos)</h2>\n");
    html.push_str(&html_table(&page.combined));

    for source in &page.sources {
        html.push_str(&format!(
            "<h2>{}</h2>\n<p>{:.1} hours, {} commits</p>\n",
            escape_html(&source.name),
            source.hours,
            source.commits
        ));
        html.push_str(&html_table(&source.rows));
    }

    html.push_str("<p>Historical JSON snapshots live in <code>/data</code>.</p>\n");
    html.push_str(&hours_chart_script());
    html.push_str("</main>\n</body>\n</html>\n");
    html
}

/// Bar chart of hours per contributor, fed from [`LATEST_DATA_FILE`].
fn hours_chart_script() -> String {
    format!(
        "<script>\n\
         fetch('{LATEST_DATA_FILE}')\n\
         .then(r => r.json())\n\
         .then(d => {{\n\
         const labels = Object.keys(d).filter(k => k !== 'total');\n\
         const hours = labels.map(l => d[l].hours);\n\
         new Chart(document.getElementById('hoursChart'), {{\n\
         type: 'bar',\n\
         data: {{ labels, datasets: [{{ label: 'Hours', data: hours }}] }},\n\
         options: {{ responsive: true, maintainAspectRatio: false, \
         plugins: {{ legend: {{ display: false }} }}, \
         scales: {{ y: {{ beginAtZero: true }} }} }}\n\
         }});\n\
         }});\n\
         </script>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::merge;
    use crate::identity::{AliasRuleSet, StaticAliases};

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:30:00Z")
            .expect("parse RFC3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn assemble_builds_per_source_and_combined_tables() {
        let a = SourceReport::new("org/a")
            .with("dev@x.com", 2.0, 1)
            .with("dev@laptop", 1.0, 1);
        let b = SourceReport::new("org/b").with("ops@x.com", 4.0, 2);
        let rules =
            AliasRuleSet::load(&[&StaticAliases::new().with("dev@laptop", "dev@x.com")]).unwrap();
        let sources = vec![a, b];
        let aggregate = merge(&sources, &rules).unwrap();

        let page =
            assemble(&aggregate, &sources, &[], &rules, SortKey::Hours, fixed_time())
                .unwrap();
        assert_eq!(page.totals.hours, 7.0);
        assert_eq!(page.totals.commits, 4);
        assert_eq!(page.totals.contributors, 2);
        assert_eq!(page.totals.repositories, 2);
        assert!(!page.partial);

        assert_eq!(page.combined[0].identity, "ops@x.com");
        assert_eq!(page.sources[0].name, "org/a");
        assert_eq!(page.sources[0].rows.len(), 1);
        assert_eq!(page.sources[0].rows[0].hours, 3.0);
    }

    #[test]
    fn partial_page_lists_failures() {
        let sources = vec![SourceReport::new("org/a").with("dev@x.com", 1.0, 1)];
        let rules = AliasRuleSet::default();
        let aggregate = merge(&sources, &rules).unwrap();
        let failures = vec![SourceFailure {
            source: "org/<b>".to_string(),
            path: None,
            reason: "unparsable report".to_string(),
        }];

        let page =
            assemble(&aggregate, &sources, &failures, &rules, SortKey::Hours, fixed_time())
                .unwrap();
        assert!(page.partial);

        let html = render_html(&page);
        assert!(html.contains("Partial data"));
        assert!(html.contains("org/&lt;b&gt;"));
        assert!(html.contains("Last updated 2024-06-01 12:30 UTC"));
    }

    #[test]
    fn page_charts_hours_from_latest_snapshot() {
        let sources = vec![SourceReport::new("org/a").with("dev@x.com", 1.0, 1)];
        let rules = AliasRuleSet::default();
        let aggregate = merge(&sources, &rules).unwrap();
        let page =
            assemble(&aggregate, &sources, &[], &rules, SortKey::Hours, fixed_time())
                .unwrap();
        let html = render_html(&page);
        assert!(html.contains("<canvas id='hoursChart'></canvas>"));
        assert!(html.contains("fetch('git-hours-latest.json')"));
        assert!(html.contains("cdn.jsdelivr.net/npm/chart.js"));
    }

    #[test]
    fn html_escapes_identities() {
        let sources = vec![SourceReport::new("org/a").with("<img src=x>", 1.0, 1)];
        let rules = AliasRuleSet::default();
        let aggregate = merge(&sources, &rules).unwrap();
        let page =
            assemble(&aggregate, &sources, &[], &rules, SortKey::Hours, fixed_time())
                .unwrap();
        let html = render_html(&page);
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img src=x&gt;"));
    }
}

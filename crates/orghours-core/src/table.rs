//! Ordered contributor tables and their Markdown / HTML renderings.
//!
//! Rows are sorted descending by the chosen [`SortKey`]; ties are broken by
//! ascending identity string so the same report always renders identically.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateReport;

/// Metric a table is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Hours,
    Commits,
}

/// One contributor line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub identity: String,
    pub hours: f64,
    pub commits: u64,
}

/// Rows of `report` (without `total`) in display order.
pub fn render(report: &AggregateReport, sort_key: SortKey) -> Vec<Row> {
    let mut rows: Vec<Row> = report
        .entries()
        .map(|(identity, record)| Row {
            identity: identity.as_str().to_string(),
            hours: record.hours,
            commits: record.commits,
        })
        .collect();

    rows.sort_by(|a, b| {
        let primary = match sort_key {
            SortKey::Hours => b.hours.total_cmp(&a.hours),
            SortKey::Commits => b.commits.cmp(&a.commits),
        };
        match primary {
            Ordering::Equal => a.identity.cmp(&b.identity),
            other => other,
        }
    });
    rows
}

/// Markdown table options.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownOptions {
    /// Add a Commits column after Hours.
    pub commits: bool,
}

/// Render rows as a GitHub-flavoured Markdown table (trailing newline included).
pub fn markdown_table(rows: &[Row], options: MarkdownOptions) -> String {
    let mut out = String::new();
    if options.commits {
        out.push_str("| Contributor | Hours | Commits |\n");
        out.push_str("|-------------|-------|---------|\n");
    } else {
        out.push_str("| Contributor | Hours |\n");
        out.push_str("|-------------|-------|\n");
    }
    for row in rows {
        let name = escape_markdown_cell(&row.identity);
        if options.commits {
            out.push_str(&format!(
                "| {} | {:.1} | {} |\n",
                name, row.hours, row.commits
            ));
        } else {
            out.push_str(&format!("| {} | {:.1} |\n", name, row.hours));
        }
    }
    out
}

/// Make cell text safe inside one Markdown table row.
///
/// Backslashes are doubled before pipes are escaped, so an existing `\|`
/// cannot turn into an escaped backslash followed by a bare pipe. Line breaks
/// become spaces.
pub fn escape_markdown_cell(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.push(' ');
                }
            }
            '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render rows as an HTML `<table>` with a sortable class.
pub fn html_table(rows: &[Row]) -> String {
    let mut out = String::from(
        "<table class='sortable'>\n<thead><tr><th>Contributor</th><th>Hours</th><th>Commits</th></tr></thead>\n<tbody>\n",
    );
    for row in rows {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{:.1}</td><td>{}</td></tr>\n",
            escape_html(&row.identity),
            row.hours,
            row.commits
        ));
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

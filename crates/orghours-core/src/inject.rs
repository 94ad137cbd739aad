//! Marker-delimited region replacement inside hand-maintained documents.
//!
//! A region is the span of lines strictly between the first line whose
//! trimmed text equals the start marker and the next line whose trimmed text
//! equals the end marker. Everything outside that span, marker lines
//! included, is copied through byte for byte, line endings and all.
//!
//! Injection is idempotent: running it on its own output with the same
//! content yields the same bytes.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{HoursError, Result};
use crate::obs;

/// Non-fatal conditions noticed while injecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectWarning {
    /// The start marker had no matching end marker; everything after the
    /// start marker was replaced and no end marker was written.
    EndMarkerMissing { marker: String },
}

/// Result of a region replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub document: String,
    pub warnings: Vec<InjectWarning>,
    /// Whether `document` differs from the input.
    pub changed: bool,
}

/// Replace the marked region of `document` with `new_content`.
///
/// The region is written as a blank line, the content, and a blank line.
/// Fails with [`HoursError::MarkerNotFound`] when the start marker is absent
/// and with [`HoursError::ContentContainsMarker`] when `new_content` itself
/// holds a marker line. Blank markers are rejected with
/// [`HoursError::EmptyMarker`] since they would match any empty line.
pub fn replace_region(
    document: &str,
    start_marker: &str,
    end_marker: &str,
    new_content: &str,
) -> Result<Injection> {
    let start_marker = start_marker.trim();
    let end_marker = end_marker.trim();
    if start_marker.is_empty() {
        return Err(HoursError::EmptyMarker { which: "start" });
    }
    if end_marker.is_empty() {
        return Err(HoursError::EmptyMarker { which: "end" });
    }

    for line in new_content.lines() {
        let trimmed = line.trim();
        if trimmed == start_marker || trimmed == end_marker {
            return Err(HoursError::ContentContainsMarker {
                marker: trimmed.to_string(),
            });
        }
    }

    let lines: Vec<&str> = document.split_inclusive('\n').collect();
    let start = lines
        .iter()
        .position(|l| l.trim() == start_marker)
        .ok_or_else(|| HoursError::MarkerNotFound {
            marker: start_marker.to_string(),
        })?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.trim() == end_marker)
        .map(|offset| start + 1 + offset);

    let newline = if lines[start].ends_with("\r\n") {
        "\r\n"
    } else {
        "\n"
    };

    let mut out = String::with_capacity(document.len() + new_content.len() + 8);
    for line in &lines[..start] {
        out.push_str(line);
    }
    out.push_str(lines[start]);
    if !lines[start].ends_with('\n') {
        out.push_str(newline);
    }

    out.push_str(newline);
    let body = new_content.trim_end_matches(['\n', '\r']);
    if !body.is_empty() {
        for line in body.lines() {
            out.push_str(line);
            out.push_str(newline);
        }
    }
    out.push_str(newline);

    let mut warnings = Vec::new();
    match end {
        Some(end) => {
            for line in &lines[end..] {
                out.push_str(line);
            }
        }
        None => {
            obs::emit_end_marker_missing(end_marker);
            warnings.push(InjectWarning::EndMarkerMissing {
                marker: end_marker.to_string(),
            });
        }
    }

    let changed = out != document;
    Ok(Injection {
        document: out,
        warnings,
        changed,
    })
}

/// Inject into the file at `path`, rewriting it atomically only when the
/// bytes change.
pub fn inject_file(
    path: &Path,
    start_marker: &str,
    end_marker: &str,
    new_content: &str,
) -> Result<Injection> {
    let document = std::fs::read_to_string(path).map_err(|e| HoursError::io(path, e))?;
    let injection = replace_region(&document, start_marker, end_marker, new_content)?;

    if injection.changed {
        write_atomic(path, injection.document.as_bytes())?;
    }
    obs::emit_region_injected(&path.display().to_string(), injection.changed);
    Ok(injection)
}

/// Write via a temp file in the same directory, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir: PathBuf = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| HoursError::io(&dir, e))?;
    tmp.write_all(data).map_err(|e| HoursError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| HoursError::io(path, e.error))?;
    Ok(())
}

//! Per-source hour/commit records as produced by `git-hours`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::ReportError;
use crate::identity::{Identity, TOTAL_KEY};

/// Hours and commits attributed to one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourRecord {
    pub hours: f64,
    pub commits: u64,
}

impl HourRecord {
    pub fn new(hours: f64, commits: u64) -> Self {
        Self { hours, commits }
    }
}

/// Wire shape of one entry; `git-hours` also emits a `name` field we ignore.
#[derive(Debug, Deserialize)]
struct RawRecord {
    hours: f64,
    commits: Number,
}

impl RawRecord {
    fn validate(self, identity: &str) -> Result<HourRecord, ReportError> {
        if !self.hours.is_finite() {
            return Err(ReportError::NonFiniteHours {
                identity: identity.to_string(),
            });
        }
        if self.hours < 0.0 {
            return Err(ReportError::NegativeHours {
                identity: identity.to_string(),
                hours: self.hours,
            });
        }
        let commits = parse_commits(identity, &self.commits)?;
        Ok(HourRecord::new(self.hours, commits))
    }
}

/// Commits must be a JSON integer that fits `u64`; floats are never rounded.
fn parse_commits(identity: &str, commits: &Number) -> Result<u64, ReportError> {
    if let Some(n) = commits.as_u64() {
        return Ok(n);
    }
    match commits.as_f64() {
        Some(n) if n < 0.0 => Err(ReportError::NegativeCommits {
            identity: identity.to_string(),
            commits: n,
        }),
        _ => Err(ReportError::InvalidRecord {
            identity: identity.to_string(),
            detail: format!("commits must be a whole number within u64, got {commits}"),
        }),
    }
}

/// One repository's report for one window.
///
/// The `total` entry of the input is kept aside as `declared_total` and is
/// never used for arithmetic; see [`SourceReport::recomputed_total`].
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    name: String,
    entries: BTreeMap<Identity, HourRecord>,
    declared_total: Option<HourRecord>,
}

impl SourceReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
            declared_total: None,
        }
    }

    /// Builder-style insert. A `total` identity becomes the declared total.
    pub fn with(mut self, identity: &str, hours: f64, commits: u64) -> Self {
        self.insert(Identity::new(identity), HourRecord::new(hours, commits));
        self
    }

    pub fn insert(&mut self, identity: Identity, record: HourRecord) {
        if identity.is_total() {
            self.declared_total = Some(record);
        } else {
            self.entries.insert(identity, record);
        }
    }

    /// Parse a `git-hours` JSON document.
    pub fn from_json(name: impl Into<String>, text: &str) -> Result<Self, ReportError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(map) = value else {
            return Err(ReportError::NotAnObject);
        };

        let mut report = Self::new(name);
        for (key, raw) in map {
            let parsed: RawRecord =
                serde_json::from_value(raw).map_err(|e| ReportError::InvalidRecord {
                    identity: key.clone(),
                    detail: e.to_string(),
                })?;
            let record = parsed.validate(&key)?;
            report.insert(Identity::new(key), record);
        }
        report.recomputed_total()?;
        Ok(report)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Identity, &HourRecord)> {
        self.entries.iter()
    }

    pub fn get(&self, identity: &str) -> Option<&HourRecord> {
        self.entries.get(&Identity::new(identity))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn declared_total(&self) -> Option<HourRecord> {
        self.declared_total
    }

    /// Sum over itemized entries. Fails when the sum leaves the range of
    /// the record fields.
    pub fn recomputed_total(&self) -> Result<HourRecord, ReportError> {
        let mut commits: u64 = 0;
        for (identity, record) in &self.entries {
            commits = commits
                .checked_add(record.commits)
                .ok_or_else(|| ReportError::Overflow {
                    identity: identity.to_string(),
                    field: "commits",
                })?;
        }
        let hours = stable_sum(self.entries.values().map(|r| r.hours));
        if !hours.is_finite() {
            return Err(ReportError::Overflow {
                identity: TOTAL_KEY.to_string(),
                field: "hours",
            });
        }
        Ok(HourRecord::new(hours, commits))
    }

    /// Whether the input's own `total` disagrees with its entries.
    pub fn total_mismatch(&self) -> bool {
        match (self.declared_total, self.recomputed_total()) {
            (None, _) => false,
            (Some(_), Err(_)) => true,
            (Some(declared), Ok(actual)) => {
                declared.commits != actual.commits
                    || (declared.hours - actual.hours).abs() > 1e-6
            }
        }
    }
}

/// Order-independent float sum: values are added smallest first.
pub(crate) fn stable_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.into_iter().collect();
    values.sort_by(f64::total_cmp);
    values.into_iter().fold(0.0, |acc, v| acc + v)
}

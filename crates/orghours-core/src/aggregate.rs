//! Cross-source aggregation of hour records.
//!
//! [`merge`] folds any number of [`SourceReport`]s into one
//! [`AggregateReport`] keyed by canonical identity. Records that canonicalize
//! to the same identity are accumulated, never overwritten, and the grand
//! total is always recomputed from the itemized entries.
//!
//! Hours are summed over the sorted list of contributions, so the result is
//! bit-identical for every ordering of the input sources.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{HoursError, Result};
use crate::identity::{Identity, IdentityResolver, TOTAL_KEY};
use crate::record::{stable_sum, HourRecord, SourceReport};

/// Merged hours per canonical identity plus the grand total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateReport {
    entries: BTreeMap<Identity, HourRecord>,
    total: HourRecord,
}

impl AggregateReport {
    pub fn total(&self) -> HourRecord {
        self.total
    }

    pub fn get(&self, identity: &str) -> Option<&HourRecord> {
        self.entries.get(&Identity::new(identity))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Identity, &HourRecord)> {
        self.entries.iter()
    }

    /// Number of distinct canonical contributors.
    pub fn contributor_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serializes as `{identity: {hours, commits}, ..., "total": {hours, commits}}`,
/// the same shape `git-hours` emits.
impl Serialize for AggregateReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len() + 1))?;
        for (identity, record) in &self.entries {
            map.serialize_entry(identity.as_str(), record)?;
        }
        map.serialize_entry(TOTAL_KEY, &self.total)?;
        map.end()
    }
}

#[derive(Default)]
struct Accumulator {
    hours: Vec<f64>,
    commits: u64,
}

impl Accumulator {
    fn add(&mut self, identity: &Identity, record: &HourRecord) -> Result<()> {
        self.commits = self
            .commits
            .checked_add(record.commits)
            .ok_or_else(|| HoursError::Overflow {
                identity: identity.to_string(),
                field: "commits",
            })?;
        self.hours.push(record.hours);
        Ok(())
    }

    fn finish(self, identity: &str) -> Result<HourRecord> {
        let hours = stable_sum(self.hours);
        if !hours.is_finite() {
            return Err(HoursError::Overflow {
                identity: identity.to_string(),
                field: "hours",
            });
        }
        Ok(HourRecord::new(hours, self.commits))
    }
}

/// Merge every source into one report keyed by canonical identity.
///
/// Fails only when a merged commit count or hour sum leaves the range of
/// [`HourRecord`].
pub fn merge<'a, I>(sources: I, resolver: &dyn IdentityResolver) -> Result<AggregateReport>
where
    I: IntoIterator<Item = &'a SourceReport>,
{
    let mut buckets: BTreeMap<Identity, Accumulator> = BTreeMap::new();
    let mut grand = Accumulator::default();
    let total_key = Identity::new(TOTAL_KEY);

    for source in sources {
        for (identity, record) in source.entries() {
            let mut canonical = resolver.canonicalize(identity);
            // An alias pointing at the sentinel would collide with the grand total.
            if canonical.is_total() {
                canonical = identity.clone();
            }
            let bucket = buckets.entry(canonical.clone()).or_default();
            bucket.add(&canonical, record)?;
            grand.add(&total_key, record)?;
        }
    }

    let mut entries = BTreeMap::new();
    for (identity, acc) in buckets {
        let record = acc.finish(identity.as_str())?;
        entries.insert(identity, record);
    }
    Ok(AggregateReport {
        entries,
        total: grand.finish(TOTAL_KEY)?,
    })
}

/// Canonicalize a single source for per-repository display.
pub fn canonicalize_source(
    source: &SourceReport,
    resolver: &dyn IdentityResolver,
) -> Result<AggregateReport> {
    merge(std::iter::once(source), resolver)
}

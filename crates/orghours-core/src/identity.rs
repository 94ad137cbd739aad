//! Contributor identities and alias reconciliation.
//!
//! An [`AliasRuleSet`] is built once per run from an ordered list of
//! [`AliasProvider`]s and passed explicitly into aggregation. Lookup is
//! case-insensitive on the raw identity; the canonical side keeps the casing
//! it was declared with.
//!
//! Provider order is priority order: when two providers declare the same
//! alias, the first one seen wins and later declarations are ignored.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HoursError, Result};

/// Key of the synthetic per-report sum; never a contributor.
pub const TOTAL_KEY: &str = "total";

/// Opaque contributor key, usually an email address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl Into<String>) -> Self {
        Identity(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded form used for alias lookup.
    pub fn lookup_key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Whether this is the report-level `total` sentinel.
    pub fn is_total(&self) -> bool {
        self.0 == TOTAL_KEY
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(raw: &str) -> Self {
        Identity::new(raw)
    }
}

/// Maps a raw identity to its canonical form. Never fails.
pub trait IdentityResolver {
    fn canonicalize(&self, identity: &Identity) -> Identity;
}

/// Source of `(alias, canonical)` pairs.
///
/// A provider backed by a missing file yields no pairs; a file that exists
/// but cannot be parsed is an error.
pub trait AliasProvider {
    /// Label used in logs.
    fn label(&self) -> String;

    fn pairs(&self) -> Result<Vec<(Identity, Identity)>>;
}

/// YAML mapping of `alias: canonical`, conventionally `reports/email-aliases.yaml`.
pub struct YamlAliasFile {
    path: PathBuf,
}

impl YamlAliasFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AliasProvider for YamlAliasFile {
    fn label(&self) -> String {
        format!("yaml:{}", self.path.display())
    }

    fn pairs(&self) -> Result<Vec<(Identity, Identity)>> {
        let Some(text) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        // serde_yaml::Mapping keeps document order, which is the priority order.
        let map: serde_yaml::Mapping =
            serde_yaml::from_str(&text).map_err(|e| HoursError::AliasFile {
                path: self.path.clone(),
                detail: e.to_string(),
            })?;

        let mut pairs = Vec::with_capacity(map.len());
        for (alias, canonical) in map {
            match (alias.as_str(), canonical.as_str()) {
                (Some(a), Some(c)) => pairs.push((Identity::new(a), Identity::new(c))),
                _ => {
                    return Err(HoursError::AliasFile {
                        path: self.path.clone(),
                        detail: format!("expected string pair, got {alias:?}: {canonical:?}"),
                    })
                }
            }
        }
        Ok(pairs)
    }
}

/// Git `.mailmap` file.
///
/// Every line carrying at least two `<email>` tokens maps the second email to
/// the first one. Comment lines and lines with a single email are skipped.
pub struct MailmapFile {
    path: PathBuf,
}

impl MailmapFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AliasProvider for MailmapFile {
    fn label(&self) -> String {
        format!("mailmap:{}", self.path.display())
    }

    fn pairs(&self) -> Result<Vec<(Identity, Identity)>> {
        let Some(text) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };
        parse_mailmap(&text).map_err(|detail| HoursError::AliasFile {
            path: self.path.clone(),
            detail,
        })
    }
}

fn parse_mailmap(text: &str) -> std::result::Result<Vec<(Identity, Identity)>, String> {
    let email = Regex::new(r"<([^>]+)>").map_err(|e| e.to_string())?;
    let mut pairs = Vec::new();
    for line in text.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let emails: Vec<&str> = email
            .captures_iter(line)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if let [canonical, alias, ..] = emails.as_slice() {
            pairs.push((Identity::new(*alias), Identity::new(*canonical)));
        }
    }
    Ok(pairs)
}

/// In-memory pairs.
#[derive(Debug, Clone, Default)]
pub struct StaticAliases {
    pairs: Vec<(Identity, Identity)>,
}

impl StaticAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, alias: &str, canonical: &str) -> Self {
        self.pairs.push((Identity::new(alias), Identity::new(canonical)));
        self
    }
}

impl AliasProvider for StaticAliases {
    fn label(&self) -> String {
        "static".to_string()
    }

    fn pairs(&self) -> Result<Vec<(Identity, Identity)>> {
        Ok(self.pairs.clone())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "alias file absent");
            Ok(None)
        }
        Err(e) => Err(HoursError::io(path, e)),
    }
}

/// How many alias hops [`AliasRuleSet`] follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// One lookup: with `a -> b` and `b -> c`, `a` resolves to `b`.
    #[default]
    SingleHop,
    /// Follow the chain until an identity has no alias, a cycle is hit, or
    /// `max_hops` lookups were made.
    FixedPoint { max_hops: usize },
}

/// Alias table: case-folded alias -> canonical identity.
#[derive(Debug, Clone, Default)]
pub struct AliasRuleSet {
    rules: HashMap<String, Identity>,
    resolution: Resolution,
}

impl AliasRuleSet {
    /// Build a rule set from providers in priority order.
    pub fn load(providers: &[&dyn AliasProvider]) -> Result<Self> {
        let mut set = Self::default();
        for provider in providers {
            let pairs = provider.pairs()?;
            let offered = pairs.len();
            let accepted = set.extend(pairs);
            debug!(
                provider = %provider.label(),
                offered = offered,
                accepted = accepted,
                "alias provider loaded"
            );
        }
        Ok(set)
    }

    /// Add pairs, keeping any alias already present. Returns how many were new.
    pub fn extend(&mut self, pairs: impl IntoIterator<Item = (Identity, Identity)>) -> usize {
        let mut accepted = 0;
        for (alias, canonical) in pairs {
            if let std::collections::hash_map::Entry::Vacant(slot) =
                self.rules.entry(alias.lookup_key())
            {
                slot.insert(canonical);
                accepted += 1;
            }
        }
        accepted
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn lookup(&self, identity: &Identity) -> Option<&Identity> {
        self.rules.get(&identity.lookup_key())
    }
}

impl IdentityResolver for AliasRuleSet {
    fn canonicalize(&self, identity: &Identity) -> Identity {
        match self.resolution {
            Resolution::SingleHop => self
                .lookup(identity)
                .cloned()
                .unwrap_or_else(|| identity.clone()),
            Resolution::FixedPoint { max_hops } => {
                let mut current = identity.clone();
                let mut seen = HashSet::from([current.lookup_key()]);
                for _ in 0..max_hops {
                    let Some(next) = self.lookup(&current) else {
                        break;
                    };
                    if !seen.insert(next.lookup_key()) {
                        break;
                    }
                    current = next.clone();
                }
                current
            }
        }
    }
}

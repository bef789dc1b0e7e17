//! Identity resolution: maps a normalized country name to its canonical
//! code.
//!
//! Resolution is an ordered chain of [`Matcher`] strategies; the first one
//! that answers wins:
//!
//! 1. exact key in the registry index
//! 2. alias table (exact, then containment in either direction)
//! 3. containment in either direction against the registry index
//!
//! Containment on short names can pick the wrong country ("congo" sits
//! inside "democratic republic of the congo"). The order is kept as is and
//! the current behavior is pinned by tests.

use crate::model::CountryRecord;
use crate::normalize::{collapse_whitespace, normalize};
use crate::tables::Alias;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Unmatched names printed in a diagnostic line.
pub const UNMATCHED_PREVIEW: usize = 10;

static FILLER_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:mainland|see summaries)\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Alias,
    Containment,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Alias => "alias",
            Self::Containment => "containment",
        })
    }
}

/// A single resolution strategy.
pub trait Matcher {
    fn tier(&self) -> MatchTier;
    fn try_match(&self, key: &str) -> Option<&str>;
}

fn contains_either(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Exact lookup in the registry's name index.
struct ExactIndex {
    by_key: HashMap<String, String>,
}

impl Matcher for ExactIndex {
    fn tier(&self) -> MatchTier {
        MatchTier::Exact
    }

    fn try_match(&self, key: &str) -> Option<&str> {
        self.by_key.get(key).map(String::as_str)
    }
}

/// Alias table: a full exact pass first, containment only if that fails.
struct AliasTable {
    aliases: Vec<Alias>,
}

impl Matcher for AliasTable {
    fn tier(&self) -> MatchTier {
        MatchTier::Alias
    }

    fn try_match(&self, key: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|a| a.name == key)
            .or_else(|| self.aliases.iter().find(|a| contains_either(key, &a.name)))
            .map(|a| a.code.as_str())
    }
}

/// Containment against registry names, in registry order.
struct ContainmentIndex {
    entries: Vec<(String, String)>,
}

impl Matcher for ContainmentIndex {
    fn tier(&self) -> MatchTier {
        MatchTier::Containment
    }

    fn try_match(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| contains_either(key, name))
            .map(|(_, code)| code.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub code: String,
    pub tier: MatchTier,
}

/// Resolver over one registry snapshot.
pub struct Resolver {
    chain: Vec<Box<dyn Matcher>>,
}

impl Resolver {
    /// Build the chain. Aliases pointing at codes the registry does not
    /// know are left out so every answer is a registry code.
    pub fn new(registry: &[CountryRecord], aliases: &[Alias]) -> Self {
        let mut by_key = HashMap::new();
        let mut entries = Vec::with_capacity(registry.len());
        for country in registry {
            let key = normalize(&country.name);
            if key.is_empty() {
                continue;
            }
            if !by_key.contains_key(&key) {
                by_key.insert(key.clone(), country.code.clone());
                entries.push((key, country.code.clone()));
            }
        }

        let known: HashSet<&str> = registry.iter().map(|c| c.code.as_str()).collect();
        let aliases = aliases
            .iter()
            .filter(|a| known.contains(a.code.as_str()))
            .cloned()
            .collect();

        Self {
            chain: vec![
                Box::new(ExactIndex { by_key }),
                Box::new(AliasTable { aliases }),
                Box::new(ContainmentIndex { entries }),
            ],
        }
    }

    /// Resolve an already-normalized name. Multi-region names are reduced to
    /// their first region before matching.
    pub fn resolve(&self, normalized: &str) -> Option<Resolution> {
        let key = reduce_multi_region(normalized);
        if key.is_empty() {
            return None;
        }
        self.chain.iter().find_map(|matcher| {
            matcher.try_match(&key).map(|code| Resolution {
                code: code.to_string(),
                tier: matcher.tier(),
            })
        })
    }

    /// Normalize then resolve.
    pub fn resolve_name(&self, raw: &str) -> Option<Resolution> {
        let resolution = self.resolve(&normalize(raw));
        if let Some(r) = &resolution {
            if r.tier != MatchTier::Exact {
                debug!("Resolved {:?} to {} via {} match", raw, r.code, r.tier);
            }
        }
        resolution
    }
}

/// Key name-labelled values by resolved code. The first value per code is
/// kept; names that do not resolve are collected in `Unmatched`.
pub fn index_by_code<T, I>(
    items: I,
    resolver: &Resolver,
    source: &str,
) -> (BTreeMap<String, T>, Unmatched)
where
    I: IntoIterator<Item = (String, T)>,
{
    let mut keyed = BTreeMap::new();
    let mut unmatched = Unmatched::default();
    for (name, value) in items {
        match resolver.resolve_name(&name) {
            Some(resolution) => {
                keyed.entry(resolution.code).or_insert(value);
            }
            None => unmatched.record(name),
        }
    }
    info!("Matched {} {} records to countries", keyed.len(), source);
    unmatched.log(source);
    (keyed, unmatched)
}

/// "mainland china, hong kong & macau" → "china".
///
/// Only the text before the first comma or ampersand is kept, with filler
/// words removed; if that leaves nothing the input is returned unchanged.
pub fn reduce_multi_region(normalized: &str) -> String {
    if !normalized.contains(',') && !normalized.contains('&') {
        return normalized.to_string();
    }
    let first = normalized
        .split(',')
        .next()
        .unwrap_or_default()
        .split('&')
        .next()
        .unwrap_or_default();
    let cleaned = collapse_whitespace(&FILLER_WORDS.replace_all(first, ""));
    if cleaned.is_empty() {
        normalized.to_string()
    } else {
        cleaned
    }
}

/// Names no tier could resolve, kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unmatched {
    names: Vec<String>,
}

impl Unmatched {
    pub fn record(&mut self, raw: impl Into<String>) {
        self.names.push(raw.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// First few names for display.
    pub fn preview(&self) -> &[String] {
        &self.names[..self.names.len().min(UNMATCHED_PREVIEW)]
    }

    pub fn log(&self, source: &str) {
        if !self.is_empty() {
            warn!(
                "Unmatched {} names ({}): {}",
                source,
                self.len(),
                self.preview().join(", ")
            );
        }
    }
}

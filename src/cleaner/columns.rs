//! Canonical column lookup.
//!
//! Source extracts rename their columns between portal versions, so every
//! canonical column is described by an ordered list of header patterns
//! instead of a fixed name.

use std::collections::HashMap;

use crate::loader::RawTable;

#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    /// Normalized header equals this name.
    Exact(&'static str),
    /// Normalized header contains every token.
    AllOf(&'static [&'static str]),
}

impl Pattern {
    fn matches(&self, header: &str) -> bool {
        match self {
            Pattern::Exact(name) => header == *name,
            Pattern::AllOf(tokens) => tokens.iter().all(|t| header.contains(t)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnRule {
    pub canonical: &'static str,
    pub patterns: &'static [Pattern],
}

/// Uppercases a header and turns every non-alphanumeric run into `_`.
pub fn normalize_header(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut sep = false;
    for c in header.trim().chars() {
        if c.is_alphanumeric() {
            if sep && !out.is_empty() {
                out.push('_');
            }
            sep = false;
            out.extend(c.to_uppercase());
        } else {
            sep = true;
        }
    }
    out
}

/// Resolved mapping from canonical column names to header positions.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    indices: HashMap<&'static str, usize>,
    pub unmatched: Vec<String>,
}

impl ColumnMap {
    /// Resolves `rules` against `headers`.
    ///
    /// Rules are applied in order and, within a rule, patterns in order. The
    /// first unclaimed header that matches wins; a header is claimed once.
    pub fn resolve(headers: &[String], rules: &[ColumnRule]) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut claimed = vec![false; headers.len()];
        let mut indices = HashMap::new();

        for rule in rules {
            let found = rule.patterns.iter().find_map(|pattern| {
                normalized
                    .iter()
                    .enumerate()
                    .find(|(i, h)| !claimed[*i] && pattern.matches(h))
                    .map(|(i, _)| i)
            });
            if let Some(i) = found {
                claimed[i] = true;
                indices.insert(rule.canonical, i);
            }
        }

        let unmatched = headers
            .iter()
            .zip(&claimed)
            .filter(|(_, c)| !**c)
            .map(|(h, _)| h.clone())
            .collect();

        Self { indices, unmatched }
    }

    pub fn get(&self, canonical: &str) -> Option<usize> {
        self.indices.get(canonical).copied()
    }

    pub fn has(&self, canonical: &str) -> bool {
        self.indices.contains_key(canonical)
    }

    /// Cell value for a canonical column in `row`.
    pub fn value<'a>(&self, table: &'a RawTable, row: usize, canonical: &str) -> Option<&'a str> {
        self.get(canonical).and_then(|col| table.cell(row, col))
    }
}

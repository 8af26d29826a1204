//! Token substitution over a paragraph's reconstructed text.
//!
//! Editors split text into runs at arbitrary points, so `{{NOM}}` may sit in
//! one run or be spread over three. Matching is therefore done on the
//! concatenation of all runs, never on individual runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::Paragraph;

/// Token → replacement value. Iterates in lexicographic token order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMap(BTreeMap<String, String>);

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.0.insert(token.into(), value.into());
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.0.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Tokens whose values always render bold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedBoldSet(BTreeSet<String>);

impl ForcedBoldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn insert(&mut self, token: impl Into<String>) {
        self.0.insert(token.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ForcedBoldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Outcome of substituting one paragraph's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    /// `(token, value)` pairs that matched, in application order.
    pub applied: Vec<(String, String)>,
}

impl Substitution {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Concatenate the text of every run of a paragraph, in order.
pub fn reconcile(paragraph: &Paragraph) -> String {
    paragraph.text()
}

/// Replace every occurrence of every known token in a single pass.
///
/// Tokens are checked once each, in map order, against the text as it
/// stands at that moment. Values are never re-scanned for tokens of their
/// own beyond that single pass, and unknown tokens stay literal.
pub fn substitute(text: &str, variables: &VariableMap) -> Substitution {
    let mut current = text.to_string();
    let mut applied = Vec::new();
    for (token, value) in variables.iter() {
        if token.is_empty() || !current.contains(token) {
            continue;
        }
        current = current.replace(token, value);
        applied.push((token.to_string(), value.to_string()));
    }
    Substitution {
        text: current,
        applied,
    }
}

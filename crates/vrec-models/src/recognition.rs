//! Recognition results and their aggregation.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::rules::RuleSet;

/// Outcome of classifying one frame, or the merge of many.
///
/// Flags only ever go from `false` to `true`, and merging is a per-key OR
/// plus a set union, so partial results can be combined in any order or
/// grouping. Ordered collections keep the serialized form deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    /// Text blocks that matched a search phrase, verbatim.
    pub found_phrases: BTreeSet<String>,
    /// One flag per `urlContains` key.
    pub url_flags: BTreeMap<String, bool>,
    /// One flag per `textContains` key.
    pub text_flags: BTreeMap<String, bool>,
}

impl RecognitionResult {
    /// Fresh result with every key of `rules` present and unset.
    pub fn empty_for(rules: &RuleSet) -> Self {
        Self {
            found_phrases: BTreeSet::new(),
            url_flags: rules.url_contains.iter().map(|k| (k.clone(), false)).collect(),
            text_flags: rules.text_contains.iter().map(|k| (k.clone(), false)).collect(),
        }
    }

    /// Merge two results.
    pub fn merge(mut self, other: Self) -> Self {
        self.absorb(other);
        self
    }

    /// Merge `other` into `self`.
    ///
    /// A key present on only one side is treated as `false` on the other.
    pub fn absorb(&mut self, other: Self) {
        self.found_phrases.extend(other.found_phrases);
        for (key, flag) in other.url_flags {
            *self.url_flags.entry(key).or_insert(false) |= flag;
        }
        for (key, flag) in other.text_flags {
            *self.text_flags.entry(key).or_insert(false) |= flag;
        }
    }

    pub fn mark_url(&mut self, key: &str) {
        self.url_flags.insert(key.to_string(), true);
    }

    pub fn mark_text(&mut self, key: &str) {
        self.text_flags.insert(key.to_string(), true);
    }

    pub fn is_url_marked(&self, key: &str) -> bool {
        self.url_flags.get(key).copied().unwrap_or(false)
    }

    pub fn is_text_marked(&self, key: &str) -> bool {
        self.text_flags.get(key).copied().unwrap_or(false)
    }

    /// Record a text block that matched a search phrase.
    pub fn insert_phrase(&mut self, block: impl Into<String>) {
        self.found_phrases.insert(block.into());
    }

    /// True when nothing was found and no flag is set.
    pub fn is_blank(&self) -> bool {
        self.found_phrases.is_empty()
            && !self.url_flags.values().any(|f| *f)
            && !self.text_flags.values().any(|f| *f)
    }

    /// Text persisted as the job's recognition output.
    ///
    /// Found blocks joined by `"\n "`, followed by one line per flag kind
    /// listing the keys that matched.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = self.found_phrases.iter().cloned().collect();

        let urls: Vec<&str> = marked_keys(&self.url_flags).collect();
        if !urls.is_empty() {
            parts.push(format!("url: {}", urls.join(", ")));
        }
        let texts: Vec<&str> = marked_keys(&self.text_flags).collect();
        if !texts.is_empty() {
            parts.push(format!("text: {}", texts.join(", ")));
        }

        parts.join("\n ")
    }
}

fn marked_keys(flags: &BTreeMap<String, bool>) -> impl Iterator<Item = &str> {
    flags.iter().filter(|(_, f)| **f).map(|(k, _)| k.as_str())
}

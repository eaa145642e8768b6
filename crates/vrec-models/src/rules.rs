//! Rule sets evaluated against recognised screen text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Keys a recording is classified against.
///
/// A rule set is immutable once a job starts; workers receive a shared
/// snapshot and build their own flag maps from its keys (see
/// [`RecognitionResult::empty_for`](crate::RecognitionResult::empty_for)).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Phrases whose surrounding text block is reported verbatim.
    #[serde(default)]
    pub search_phrases: Vec<String>,
    /// Keys looked for in the URL band (top of the screen).
    #[serde(default)]
    pub url_contains: Vec<String>,
    /// Keys looked for in the page body.
    #[serde(default)]
    pub text_contains: Vec<String>,
}

impl RuleSet {
    /// Create a rule set from its three key collections.
    pub fn new(
        search_phrases: impl IntoIterator<Item = impl Into<String>>,
        url_contains: impl IntoIterator<Item = impl Into<String>>,
        text_contains: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            search_phrases: search_phrases.into_iter().map(Into::into).collect(),
            url_contains: url_contains.into_iter().map(Into::into).collect(),
            text_contains: text_contains.into_iter().map(Into::into).collect(),
        }
    }

    /// Rules applied to stored jobs that carry no identifiers of their own.
    pub fn default_triage() -> Self {
        Self::new(
            ["error", "exception"],
            ["wpadmin", "wordpress.com"],
            ["MySQL", "MariaDB"],
        )
    }

    /// True when no rule of any kind is configured.
    pub fn is_empty(&self) -> bool {
        self.search_phrases.is_empty() && self.url_contains.is_empty() && self.text_contains.is_empty()
    }

    /// Parse the identifier document stored alongside a job.
    ///
    /// `None` or a blank column yields [`RuleSet::default_triage`].
    pub fn from_stored_json(raw: Option<&str>) -> Result<Self, serde_json::Error> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default_triage()),
            Some(raw) => {
                let stored: StoredRuleSet = serde_json::from_str(raw)?;
                Ok(stored.into())
            }
        }
    }

    /// Serialize into the stored identifier document.
    pub fn to_stored_json(&self) -> String {
        // Serializing plain string vectors cannot fail.
        serde_json::to_string(&StoredRuleSet::from(self.clone())).unwrap_or_default()
    }
}

/// Identifier document persisted in the job store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRuleSet {
    #[serde(rename = "searchPhraseIdentifiers", default)]
    pub search_phrase_identifiers: Vec<String>,
    #[serde(rename = "caseClasificationRules", default)]
    pub case_classification_rules: StoredCaseRules,
}

/// URL/page key lists of the stored identifier document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCaseRules {
    #[serde(default)]
    pub url: Vec<String>,
    #[serde(default)]
    pub page: Vec<String>,
}

impl From<StoredRuleSet> for RuleSet {
    fn from(stored: StoredRuleSet) -> Self {
        Self {
            search_phrases: stored.search_phrase_identifiers,
            url_contains: stored.case_classification_rules.url,
            text_contains: stored.case_classification_rules.page,
        }
    }
}

impl From<RuleSet> for StoredRuleSet {
    fn from(rules: RuleSet) -> Self {
        Self {
            search_phrase_identifiers: rules.search_phrases,
            case_classification_rules: StoredCaseRules {
                url: rules.url_contains,
                page: rules.text_contains,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_identifiers_fall_back_to_defaults() {
        assert_eq!(RuleSet::from_stored_json(None).unwrap(), RuleSet::default_triage());
        assert_eq!(RuleSet::from_stored_json(Some("  ")).unwrap(), RuleSet::default_triage());
    }

    #[test]
    fn test_stored_document_layout() {
        let raw = r#"{
            "caseClasificationRules": {"url": ["wp-admin"], "page": ["PostgreSQL"]},
            "searchPhraseIdentifiers": ["fatal"]
        }"#;
        let rules = RuleSet::from_stored_json(Some(raw)).unwrap();
        assert_eq!(rules.search_phrases, vec!["fatal"]);
        assert_eq!(rules.url_contains, vec!["wp-admin"]);
        assert_eq!(rules.text_contains, vec!["PostgreSQL"]);

        let reparsed = RuleSet::from_stored_json(Some(&rules.to_stored_json())).unwrap();
        assert_eq!(reparsed, rules);
    }

    #[test]
    fn test_partial_document_keeps_missing_lists_empty() {
        let rules = RuleSet::from_stored_json(Some(r#"{"searchPhraseIdentifiers": ["x"]}"#)).unwrap();
        assert!(rules.url_contains.is_empty());
        assert!(rules.text_contains.is_empty());
        assert!(!rules.is_empty());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(RuleSet::from_stored_json(Some("{not json")).is_err());
    }
}

//! HTTP request/response schemas for synchronous recognition.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::recognition::RecognitionResult;
use crate::rules::RuleSet;
use crate::settings::RecognitionSettings;

/// Body of `POST /process/`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ProcessRequest {
    /// Base64-encoded video container.
    #[serde(rename = "VideoBody")]
    #[validate(length(min = 1))]
    pub video_body: String,

    #[serde(rename = "SearchPhraseIdentifiers", default)]
    pub search_phrase_identifiers: Vec<String>,

    #[serde(rename = "URLContains", default)]
    pub url_contains: Vec<String>,

    #[serde(rename = "TextContains", default)]
    pub text_contains: Vec<String>,

    #[serde(rename = "RecognitionSettings", default)]
    #[validate(nested)]
    pub recognition_settings: RecognitionSettings,
}

impl ProcessRequest {
    pub fn rule_set(&self) -> RuleSet {
        RuleSet::new(
            self.search_phrase_identifiers.iter().cloned(),
            self.url_contains.iter().cloned(),
            self.text_contains.iter().cloned(),
        )
    }
}

/// Response of `POST /process/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessResponse {
    #[serde(rename = "SearchPhrasesFound")]
    pub search_phrases_found: Vec<String>,

    #[serde(rename = "URLContainsResults")]
    pub url_contains_results: BTreeMap<String, bool>,

    #[serde(rename = "TextContainsResults")]
    pub text_contains_results: BTreeMap<String, bool>,
}

impl From<RecognitionResult> for ProcessResponse {
    fn from(result: RecognitionResult) -> Self {
        Self {
            search_phrases_found: result.found_phrases.into_iter().collect(),
            url_contains_results: result.url_flags,
            text_contains_results: result.text_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_names() {
        let request: ProcessRequest = serde_json::from_str(
            r#"{"VideoBody": "AAAA", "SearchPhraseIdentifiers": ["error"],
                "URLContains": ["wpadmin"], "TextContains": ["MySQL"],
                "RecognitionSettings": {"useGrayColors": true}}"#,
        )
        .unwrap();

        let rules = request.rule_set();
        assert_eq!(rules.search_phrases, vec!["error"]);
        assert_eq!(rules.url_contains, vec!["wpadmin"]);
        assert_eq!(rules.text_contains, vec!["MySQL"]);
        assert!(request.recognition_settings.use_gray_colors);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_settings_and_rules_are_optional() {
        let request: ProcessRequest = serde_json::from_str(r#"{"VideoBody": "AAAA"}"#).unwrap();
        assert!(request.rule_set().is_empty());
        assert_eq!(request.recognition_settings, RecognitionSettings::default());
    }

    #[test]
    fn test_response_wire_names() {
        let mut result = RecognitionResult::empty_for(&RuleSet::new(["error"], ["wpadmin"], ["MySQL"]));
        result.insert_phrase("System Error");
        result.mark_text("MySQL");

        let json = serde_json::to_value(ProcessResponse::from(result)).unwrap();
        assert_eq!(json["SearchPhrasesFound"][0], "System Error");
        assert_eq!(json["URLContainsResults"]["wpadmin"], false);
        assert_eq!(json["TextContainsResults"]["MySQL"], true);
    }
}

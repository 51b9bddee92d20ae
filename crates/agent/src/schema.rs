//! JSON Schema the runtime enforces on the agent's final answer.
//!
//! Mirrors `callbrief_core::domain::summary::StructuredSummary`; both reject
//! unknown fields.

use serde_json::{json, Value};

pub fn output_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "StructuredSummary",
        "type": "object",
        "additionalProperties": false,
        "required": ["summary", "keyPoints", "objections", "actionItems", "overallAssessment"],
        "properties": {
            "summary": { "type": "string", "minLength": 1 },
            "keyPoints": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["topic", "detail"],
                    "properties": {
                        "topic": { "type": "string" },
                        "detail": { "type": "string" }
                    }
                }
            },
            "objections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["objection", "response", "resolved"],
                    "properties": {
                        "objection": { "type": "string" },
                        "response": { "type": ["string", "null"] },
                        "resolved": { "type": "boolean" }
                    }
                }
            },
            "actionItems": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["owner", "task", "dueDate"],
                    "properties": {
                        "owner": { "type": "string" },
                        "task": { "type": "string" },
                        "dueDate": { "type": ["string", "null"] }
                    }
                }
            },
            "overallAssessment": {
                "type": "object",
                "additionalProperties": false,
                "required": ["sentiment", "dealHealth", "nextSteps"],
                "properties": {
                    "sentiment": {
                        "type": "string",
                        "enum": ["positive", "neutral", "negative", "mixed"]
                    },
                    "dealHealth": {
                        "type": "string",
                        "enum": ["strong", "moderate", "at_risk", "unknown"]
                    },
                    "nextSteps": { "type": "string" }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use callbrief_core::StructuredSummary;
    use serde_json::{json, Value};

    use super::output_schema;

    fn conforming() -> Value {
        json!({
            "summary": "Globex wants SSO before signing.",
            "keyPoints": [{ "topic": "Security", "detail": "Okta SSO required" }],
            "objections": [{ "objection": "Price", "response": null, "resolved": false }],
            "actionItems": [{ "owner": "Ada", "task": "Send docs", "dueDate": null }],
            "overallAssessment": {
                "sentiment": "mixed",
                "dealHealth": "at_risk",
                "nextSteps": "Security review"
            }
        })
    }

    #[test]
    fn top_level_required_fields_match_the_summary_type() {
        let schema = output_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .expect("required list")
            .iter()
            .filter_map(Value::as_str)
            .collect();

        let decoded = StructuredSummary::from_value(conforming()).expect("decodes");
        let encoded = serde_json::to_value(decoded).expect("encodes");
        let mut keys: Vec<&str> =
            encoded.as_object().expect("object").keys().map(String::as_str).collect();
        keys.sort_unstable();

        let mut expected = required.clone();
        expected.sort_unstable();
        assert_eq!(keys, expected);
    }

    #[test]
    fn enum_values_decode_into_the_summary_type() {
        let schema = output_schema();
        let health = schema["properties"]["overallAssessment"]["properties"]["dealHealth"]["enum"]
            .as_array()
            .expect("enum")
            .clone();

        for value in health {
            let mut candidate = conforming();
            candidate["overallAssessment"]["dealHealth"] = value.clone();
            assert!(StructuredSummary::from_value(candidate).is_ok(), "{value} should decode");
        }
    }
}

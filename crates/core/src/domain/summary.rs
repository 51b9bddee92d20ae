//! Structured call summary returned by the agent runtime.
//!
//! Decoding is strict: unknown fields and out-of-vocabulary enum values are
//! rejected so a non-conforming model output is never partially accepted.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StructuredSummary {
    pub summary: String,
    pub key_points: Vec<KeyPoint>,
    pub objections: Vec<Objection>,
    pub action_items: Vec<ActionItem>,
    pub overall_assessment: OverallAssessment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyPoint {
    pub topic: String,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Objection {
    pub objection: String,
    pub response: Option<String>,
    pub resolved: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionItem {
    pub owner: String,
    pub task: String,
    pub due_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OverallAssessment {
    pub sentiment: Sentiment,
    pub deal_health: DealHealth,
    pub next_steps: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealHealth {
    Strong,
    Moderate,
    AtRisk,
    Unknown,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
            Self::Mixed => "mixed",
        }
    }
}

impl DealHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::AtRisk => "at risk",
            Self::Unknown => "unknown",
        }
    }
}

impl StructuredSummary {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn open_objections(&self) -> usize {
        self.objections.iter().filter(|objection| !objection.resolved).count()
    }

    /// Plain-text rendering for sinks that do not support rich formatting.
    pub fn to_plain_text(&self) -> String {
        let mut lines = vec![self.summary.trim().to_string(), String::new()];

        lines.push("Key points:".to_string());
        if self.key_points.is_empty() {
            lines.push("- none recorded".to_string());
        }
        for point in &self.key_points {
            lines.push(format!("- {}: {}", point.topic, point.detail));
        }

        lines.push(String::new());
        lines.push("Objections:".to_string());
        if self.objections.is_empty() {
            lines.push("- none raised".to_string());
        }
        for objection in &self.objections {
            let state = if objection.resolved { "resolved" } else { "open" };
            match objection.response.as_deref().filter(|text| !text.trim().is_empty()) {
                Some(response) => lines.push(format!(
                    "- [{state}] {} (response: {response})",
                    objection.objection
                )),
                None => lines.push(format!("- [{state}] {}", objection.objection)),
            }
        }

        lines.push(String::new());
        lines.push("Action items:".to_string());
        if self.action_items.is_empty() {
            lines.push("- none agreed".to_string());
        }
        for item in &self.action_items {
            match item.due_date.as_deref().filter(|text| !text.trim().is_empty()) {
                Some(due) => lines.push(format!("- {}: {} (due {due})", item.owner, item.task)),
                None => lines.push(format!("- {}: {}", item.owner, item.task)),
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "Assessment: sentiment {}, deal health {}.",
            self.overall_assessment.sentiment.as_str(),
            self.overall_assessment.deal_health.as_str()
        ));
        lines.push(format!("Next steps: {}", self.overall_assessment.next_steps));

        lines.join("\n")
    }
}

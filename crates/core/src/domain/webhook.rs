//! Inbound call event as delivered by the call-intelligence provider.
//!
//! The wire format is camelCase JSON. Only `callData.metaData.id` is required;
//! every other field may be absent and unknown fields are ignored so provider
//! additions never break decoding.

use serde::{Deserialize, Serialize};

use crate::errors::WebhookValidationError;

const MAX_CALL_ID_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub is_test: bool,
    pub call_data: CallData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallData {
    pub meta_data: CallMetadata,
    #[serde(default)]
    pub parties: Vec<Party>,
    #[serde(default)]
    pub context: Vec<CrmContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptSegment>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scheduled: Option<String>,
    #[serde(default)]
    pub started: Option<String>,
    /// Call length in seconds.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Affiliation {
    Internal,
    External,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub affiliation: Option<Affiliation>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmContext {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub objects: Vec<CrmObjectRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmObjectRef {
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub object_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// Offset from call start, in milliseconds.
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
    #[serde(default)]
    pub text: String,
}

/// Transcript content resolved for one call, inline or fetched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self { segments }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_content(&self) -> bool {
        self.segments
            .iter()
            .flat_map(|segment| segment.sentences.iter())
            .any(|sentence| !sentence.text.trim().is_empty())
    }

    pub fn sentence_count(&self) -> usize {
        self.segments.iter().map(|segment| segment.sentences.len()).sum()
    }
}

impl WebhookPayload {
    /// Decodes and validates a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, WebhookValidationError> {
        let payload: Self = serde_json::from_slice(body)
            .map_err(|error| WebhookValidationError::Malformed(error.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn validate(&self) -> Result<(), WebhookValidationError> {
        let id = self.call_id();
        if id.is_empty() {
            return Err(WebhookValidationError::MissingCallId);
        }
        if id.len() > MAX_CALL_ID_LEN {
            return Err(WebhookValidationError::InvalidField {
                field: "callData.metaData.id",
                reason: format!("must be at most {MAX_CALL_ID_LEN} characters"),
            });
        }
        if id.chars().any(|ch| ch.is_control() || ch == '/') {
            return Err(WebhookValidationError::InvalidField {
                field: "callData.metaData.id",
                reason: "must not contain control characters or `/`".to_string(),
            });
        }
        Ok(())
    }

    pub fn call_id(&self) -> &str {
        self.call_data.meta_data.id.trim()
    }

    pub fn metadata(&self) -> &CallMetadata {
        &self.call_data.meta_data
    }

    pub fn parties(&self) -> &[Party] {
        &self.call_data.parties
    }

    /// First Salesforce account attached to the call, if any.
    pub fn crm_account_id(&self) -> Option<&str> {
        self.call_data
            .context
            .iter()
            .filter(|context| {
                context
                    .system
                    .as_deref()
                    .map(|system| system.trim().eq_ignore_ascii_case("salesforce"))
                    .unwrap_or(false)
            })
            .flat_map(|context| context.objects.iter())
            .filter(|object| {
                object
                    .object_type
                    .as_deref()
                    .map(|kind| kind.trim().eq_ignore_ascii_case("account"))
                    .unwrap_or(false)
            })
            .filter_map(|object| object.object_id.as_deref().map(str::trim))
            .find(|id| !id.is_empty())
    }

    /// Transcript delivered inline with the webhook, if the provider sent one.
    pub fn inline_transcript(&self) -> Option<Transcript> {
        self.call_data.transcript.clone().map(Transcript::new)
    }

    /// Resolves a transcript speaker id to the matching party.
    pub fn speaker(&self, speaker_id: Option<&str>) -> Option<&Party> {
        let speaker_id = speaker_id?;
        self.call_data.parties.iter().find(|party| party.speaker_id.as_deref() == Some(speaker_id))
    }
}

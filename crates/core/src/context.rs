//! Turns a webhook payload into the files written to the sandbox.
//!
//! Building never fails: missing optional data is rendered through
//! [`crate::render`] rather than omitted.

use crate::domain::crm::CrmAccountSnapshot;
use crate::domain::files::{CallContext, VirtualFile};
use crate::domain::webhook::{Transcript, WebhookPayload};
use crate::render::{
    duration_or_unknown, offset_or_unknown, or_unknown, party_label, timestamp_or_unknown, UNKNOWN,
};

pub const METADATA_PATH: &str = "call/metadata.md";
pub const PARTICIPANTS_PATH: &str = "call/participants.md";
pub const TRANSCRIPT_PATH: &str = "call/transcript.md";
pub const CRM_ACCOUNT_PATH: &str = "crm/account.md";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextBuilder {
    crm_enabled: bool,
}

impl ContextBuilder {
    pub fn new(crm_enabled: bool) -> Self {
        Self { crm_enabled }
    }

    pub fn build(
        &self,
        payload: &WebhookPayload,
        transcript: &Transcript,
        crm_account: Option<&CrmAccountSnapshot>,
    ) -> CallContext {
        let mut context = CallContext::default();

        context.push(VirtualFile::new(METADATA_PATH, render_metadata(payload)));
        context.push(VirtualFile::new(PARTICIPANTS_PATH, render_participants(payload)));

        if transcript.has_content() {
            let content = render_transcript(payload, transcript);
            context.push(VirtualFile::new(TRANSCRIPT_PATH, content));
        }

        if self.crm_enabled {
            if let Some(account) = crm_account {
                context.push(VirtualFile::new(CRM_ACCOUNT_PATH, render_crm_account(account)));
            }
        }

        context
    }
}

fn render_metadata(payload: &WebhookPayload) -> String {
    let meta = payload.metadata();
    let rows = [
        ("Title", or_unknown(meta.title.as_deref())),
        ("Call ID", payload.call_id().to_string()),
        ("URL", or_unknown(meta.url.as_deref())),
        ("Scheduled", timestamp_or_unknown(meta.scheduled.as_deref())),
        ("Started", timestamp_or_unknown(meta.started.as_deref())),
        ("Duration", duration_or_unknown(meta.duration)),
        ("System", or_unknown(meta.system.as_deref())),
        ("Direction", or_unknown(meta.direction.as_deref())),
        ("Language", or_unknown(meta.language.as_deref())),
    ];

    let mut lines = vec!["# Call metadata".to_string(), String::new()];
    lines.extend(rows.iter().map(|(label, value)| format!("- {label}: {value}")));
    if payload.is_test {
        lines.push("- Test call: yes".to_string());
    }
    lines.push(String::new());
    lines.join("\n")
}

fn render_participants(payload: &WebhookPayload) -> String {
    let mut lines = vec!["# Participants".to_string(), String::new()];

    if payload.parties().is_empty() {
        lines.push(format!("- No participants were listed for this call ({UNKNOWN})"));
    }
    for party in payload.parties() {
        let email = or_unknown(party.email_address.as_deref());
        lines.push(format!("- {} <{email}>", party_label(party)));
    }

    lines.push(String::new());
    lines.join("\n")
}

fn render_transcript(payload: &WebhookPayload, transcript: &Transcript) -> String {
    let mut lines = vec!["# Transcript".to_string()];
    let mut current_topic: Option<&str> = None;

    for segment in &transcript.segments {
        let topic = segment.topic.as_deref().map(str::trim).filter(|topic| !topic.is_empty());
        if topic.is_some() && topic != current_topic {
            lines.push(String::new());
            lines.push(format!("## {}", or_unknown(topic)));
            current_topic = topic;
        }

        let speaker = payload
            .speaker(segment.speaker_id.as_deref())
            .map(party_label)
            .unwrap_or_else(|| UNKNOWN.to_string());

        for sentence in segment.sentences.iter().filter(|sentence| !sentence.text.trim().is_empty())
        {
            lines.push(format!(
                "{} {speaker}: {}",
                offset_or_unknown(sentence.start),
                sentence.text.trim()
            ));
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

fn render_crm_account(account: &CrmAccountSnapshot) -> String {
    let heading = format!("# CRM account {}", or_unknown(Some(account.account_id.as_str())));
    let mut lines = vec![heading, String::new()];

    match &account.fields {
        Some(fields) if !fields.is_empty() => {
            lines.extend(fields.iter().map(|(key, value)| {
                format!("{key}: {}", or_unknown(Some(value.as_str())))
            }));
        }
        _ => lines.push(format!("record: {UNKNOWN}")),
    }

    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{
        ContextBuilder, CRM_ACCOUNT_PATH, METADATA_PATH, PARTICIPANTS_PATH, TRANSCRIPT_PATH,
    };
    use crate::domain::crm::CrmAccountSnapshot;
    use crate::domain::webhook::{
        Affiliation, CallData, CallMetadata, Party, Sentence, Transcript, TranscriptSegment,
        WebhookPayload,
    };

    fn payload(parties: Vec<Party>) -> WebhookPayload {
        WebhookPayload {
            is_test: false,
            call_data: CallData {
                meta_data: CallMetadata {
                    id: "call-1".to_string(),
                    title: Some("Acme / Globex discovery".to_string()),
                    duration: Some(1_834),
                    ..CallMetadata::default()
                },
                parties,
                context: Vec::new(),
                transcript: None,
            },
        }
    }

    fn ada() -> Party {
        Party {
            speaker_id: Some("s-1".to_string()),
            name: Some("Ada Lovelace".to_string()),
            title: Some("AE".to_string()),
            affiliation: Some(Affiliation::Internal),
            ..Party::default()
        }
    }

    fn transcript() -> Transcript {
        Transcript::new(vec![
            TranscriptSegment {
                speaker_id: Some("s-1".to_string()),
                topic: Some("Pricing".to_string()),
                sentences: vec![Sentence {
                    start: Some(460_230),
                    end: Some(462_343),
                    text: "Thanks for joining.".to_string(),
                }],
            },
            TranscriptSegment {
                speaker_id: Some("s-9".to_string()),
                topic: Some("Pricing".to_string()),
                sentences: vec![Sentence { start: None, end: None, text: "Sure.".to_string() }],
            },
        ])
    }

    #[test]
    fn builds_metadata_participants_and_transcript_in_order() {
        let context = ContextBuilder::new(false).build(&payload(vec![ada()]), &transcript(), None);

        let paths: Vec<&str> = context.files().iter().map(|file| file.path.as_str()).collect();
        assert_eq!(paths, vec![METADATA_PATH, PARTICIPANTS_PATH, TRANSCRIPT_PATH]);
        assert_eq!(context.tree().paths().len(), context.len());

        let metadata = &context.files()[0].content;
        assert!(metadata.contains("- Title: Acme / Globex discovery"));
        assert!(metadata.contains("- Duration: 30m 34s"));
        assert!(metadata.contains("- System: Unknown"));

        let transcript = &context.files()[2].content;
        assert_eq!(transcript.matches("## Pricing").count(), 1);
        assert!(transcript.contains("[07:40] Ada Lovelace, AE (Internal): Thanks for joining."));
        assert!(transcript.contains("[Unknown] Unknown: Sure."));
    }

    #[test]
    fn missing_party_fields_render_unknown_without_dropping_the_party() {
        let sparse = Party { name: Some("Grace".to_string()), ..Party::default() };
        let parties = vec![sparse, Party::default()];
        let context =
            ContextBuilder::new(false).build(&payload(parties), &Transcript::empty(), None);

        let participants = &context.get(PARTICIPANTS_PATH).expect("participants file").content;
        assert!(participants.contains("- Grace, Unknown (Unknown) <Unknown>"));
        assert!(participants.contains("- Unknown, Unknown (Unknown) <Unknown>"));
        assert_eq!(participants.lines().filter(|line| line.starts_with("- ")).count(), 2);
    }

    #[test]
    fn empty_party_list_is_called_out() {
        let context =
            ContextBuilder::new(false).build(&payload(Vec::new()), &Transcript::empty(), None);
        let participants = &context.get(PARTICIPANTS_PATH).expect("participants file").content;
        assert!(participants.contains("No participants were listed"));
    }

    #[test]
    fn transcript_file_is_skipped_without_content() {
        let blank = Transcript::new(vec![TranscriptSegment {
            sentences: vec![Sentence { text: "   ".to_string(), ..Sentence::default() }],
            ..TranscriptSegment::default()
        }]);
        let context = ContextBuilder::new(false).build(&payload(vec![ada()]), &blank, None);

        assert!(!context.contains(TRANSCRIPT_PATH));
        assert!(!context.is_empty());
    }

    #[test]
    fn crm_file_requires_the_integration_to_be_enabled() {
        let account = CrmAccountSnapshot::fetched(
            "0013t00001AbCdE",
            BTreeMap::from([
                ("Name".to_string(), "Globex".to_string()),
                ("Industry".to_string(), "".to_string()),
            ]),
        );

        let disabled =
            ContextBuilder::new(false).build(&payload(vec![ada()]), &transcript(), Some(&account));
        assert!(!disabled.contains(CRM_ACCOUNT_PATH));
        assert!(disabled.directories().iter().all(|dir| dir != "crm"));

        let enabled =
            ContextBuilder::new(true).build(&payload(vec![ada()]), &transcript(), Some(&account));
        let crm = &enabled.get(CRM_ACCOUNT_PATH).expect("crm file").content;
        assert!(crm.starts_with("# CRM account 0013t00001AbCdE"));
        assert!(crm.find("Industry: Unknown") < crm.find("Name: Globex"));
    }

    #[test]
    fn unavailable_crm_record_renders_unknown() {
        let account = CrmAccountSnapshot::unavailable("0013t00001AbCdE");
        let context = ContextBuilder::new(true).build(
            &payload(vec![ada()]),
            &Transcript::empty(),
            Some(&account),
        );

        let crm = &context.get(CRM_ACCOUNT_PATH).expect("crm file").content;
        assert!(crm.contains("record: Unknown"));
    }
}

//! System prompt composition.
//!
//! The template is compiled once per process with `tera`. Every interpolated
//! value goes through [`crate::render`], so a template never sees an absent
//! field. `current_time` is the only value that varies between runs for the
//! same payload; callers inject it.

use chrono::{DateTime, SecondsFormat, Utc};
use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::files::FileTree;
use crate::domain::webhook::{CallData, CallMetadata, Party, WebhookPayload};
use crate::render::{duration_or_unknown, or_unknown, party_label, timestamp_or_unknown};

const TEMPLATE_NAME: &str = "instructions";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a sales call analyst working for {{ company_name }}.

A recorded call has been written to the sandbox under `{{ workdir }}`. Use the
available tools to read the files before answering; do not guess at content
you have not read.

## Call
- Title: {{ call_title }}
- Date: {{ call_date }}
- Duration: {{ call_duration }}
- System: {{ call_system }}

## Participants
{% for participant in participants %}- {{ participant }}
{% else %}- No participants were listed for this call.
{% endfor %}
## Files
{{ file_tree }}

## Task
Produce a structured summary of the call for the {{ company_name }} account team:
1. A short narrative summary of what happened.
2. The key discussion points, each with a topic and the supporting detail.
3. Every objection the prospect raised, how it was answered, and whether it was resolved.
4. Concrete action items with an owner and, when one was stated, a due date.
5. An overall assessment of sentiment and deal health, plus the agreed next steps.

Only report what the transcript supports. When something is not covered, say so
rather than inventing it.

Current time: {{ current_time }}
"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("system prompt template is invalid: {0}")]
    Template(String),
    #[error("system prompt could not be rendered: {0}")]
    Render(String),
}

pub struct PromptComposer {
    company_name: String,
    templates: Tera,
}

impl PromptComposer {
    pub fn new(
        company_name: impl Into<String>,
        template: Option<&str>,
    ) -> Result<Self, PromptError> {
        let mut templates = Tera::default();
        templates
            .add_raw_template(TEMPLATE_NAME, template.unwrap_or(DEFAULT_SYSTEM_PROMPT))
            .map_err(|error| PromptError::Template(describe(&error)))?;

        Ok(Self { company_name: company_name.into(), templates })
    }

    /// Compiles a template and renders it once against a sample call, so
    /// unknown variables surface during config validation.
    pub fn check_template(template: &str) -> Result<(), PromptError> {
        let composer = Self::new("check", Some(template))?;
        let sample = WebhookPayload {
            is_test: false,
            call_data: CallData {
                meta_data: CallMetadata { id: "check".to_string(), ..CallMetadata::default() },
                parties: vec![Party::default()],
                context: Vec::new(),
                transcript: None,
            },
        };
        composer
            .compose(&sample, &FileTree::default(), "/workspace", DateTime::default())
            .map(|_| ())
    }

    pub fn compose(
        &self,
        payload: &WebhookPayload,
        tree: &FileTree,
        workdir: &str,
        now: DateTime<Utc>,
    ) -> Result<String, PromptError> {
        let meta = payload.metadata();
        let call_date = meta.scheduled.as_deref().or(meta.started.as_deref());
        let participants: Vec<String> = payload.parties().iter().map(party_label).collect();

        let mut context = Context::new();
        context.insert("company_name", &or_unknown(Some(self.company_name.as_str())));
        context.insert("call_title", &or_unknown(meta.title.as_deref()));
        context.insert("call_date", &timestamp_or_unknown(call_date));
        context.insert("call_duration", &duration_or_unknown(meta.duration));
        context.insert("call_system", &or_unknown(meta.system.as_deref()));
        context.insert("participants", &participants);
        context.insert("file_tree", &tree.render());
        context.insert("workdir", &or_unknown(Some(workdir)));
        context.insert("current_time", &now.to_rfc3339_opts(SecondsFormat::Secs, true));

        self.templates
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| PromptError::Render(describe(&error)))
    }
}

// tera nests the useful message in the error source chain.
fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{PromptComposer, PromptError};
    use crate::context::ContextBuilder;
    use crate::domain::webhook::{
        Affiliation, CallData, CallMetadata, Party, Transcript, WebhookPayload,
    };

    fn payload(parties: Vec<Party>, metadata: CallMetadata) -> WebhookPayload {
        WebhookPayload {
            is_test: false,
            call_data: CallData {
                meta_data: metadata,
                parties,
                context: Vec::new(),
                transcript: None,
            },
        }
    }

    fn full_metadata() -> CallMetadata {
        CallMetadata {
            id: "call-1".to_string(),
            title: Some("Acme / Globex discovery".to_string()),
            scheduled: Some("2026-10-01T15:00:00Z".to_string()),
            duration: Some(1_834),
            system: Some("Zoom".to_string()),
            ..CallMetadata::default()
        }
    }

    fn compose(payload: &WebhookPayload, minute: u32) -> String {
        let composer = PromptComposer::new("Acme", None).expect("default template compiles");
        let tree = ContextBuilder::new(false).build(payload, &Transcript::empty(), None).tree();
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 9, minute, 0).single().expect("valid time");
        composer.compose(payload, &tree, "/workspace", now).expect("prompt renders")
    }

    #[test]
    fn interpolates_call_metadata_and_file_tree() {
        let ada = Party {
            name: Some("Ada Lovelace".to_string()),
            title: Some("AE".to_string()),
            affiliation: Some(Affiliation::Internal),
            ..Party::default()
        };
        let prompt = compose(&payload(vec![ada], full_metadata()), 0);

        assert!(prompt.starts_with("You are a sales call analyst working for Acme."));
        assert!(prompt.contains("- Title: Acme / Globex discovery"));
        assert!(prompt.contains("- Date: 2026-10-01 15:00 UTC"));
        assert!(prompt.contains("- Duration: 30m 34s"));
        assert!(prompt.contains("- Ada Lovelace, AE (Internal)"));
        assert!(prompt.contains("- call/metadata.md\n- call/participants.md"));
        assert!(prompt.contains("under `/workspace`"));
        assert!(prompt.contains("Current time: 2026-10-14T09:00:00Z"));
    }

    #[test]
    fn missing_fields_render_unknown_and_keep_every_participant() {
        let sparse = Party { name: Some("Grace".to_string()), ..Party::default() };
        let metadata = CallMetadata { id: "call-2".to_string(), ..CallMetadata::default() };
        let prompt = compose(&payload(vec![sparse, Party::default()], metadata), 0);

        assert!(prompt.contains("- Title: Unknown"));
        assert!(prompt.contains("- Date: Unknown"));
        assert!(prompt.contains("- Duration: Unknown"));
        assert!(prompt.contains("- System: Unknown"));
        assert!(prompt.contains("- Grace, Unknown (Unknown)"));
        assert!(prompt.contains("- Unknown, Unknown (Unknown)"));
    }

    #[test]
    fn empty_participant_list_renders_explicit_line() {
        let prompt = compose(&payload(Vec::new(), full_metadata()), 0);
        assert!(prompt.contains("- No participants were listed for this call."));
    }

    #[test]
    fn output_only_varies_in_the_timestamp() {
        let payload = payload(Vec::new(), full_metadata());
        let first = compose(&payload, 0);
        let again = compose(&payload, 0);
        let later = compose(&payload, 30);

        assert_eq!(first, again);
        assert_ne!(first, later);

        fn strip(prompt: &str) -> Vec<&str> {
            prompt.lines().filter(|line| !line.starts_with("Current time:")).collect()
        }
        assert_eq!(strip(&first), strip(&later));
    }

    #[test]
    fn custom_template_is_used() {
        let template = "{{ company_name }} :: {{ call_title }}";
        let composer = PromptComposer::new("Acme", Some(template)).expect("compiles");
        let payload = payload(Vec::new(), full_metadata());
        let tree = ContextBuilder::new(false).build(&payload, &Transcript::empty(), None).tree();

        let prompt = composer.compose(&payload, &tree, "/workspace", Utc::now()).expect("renders");
        assert_eq!(prompt, "Acme :: Acme / Globex discovery");
    }

    #[test]
    fn broken_template_is_rejected_up_front() {
        let result = PromptComposer::check_template("{% for x in participants %}");
        assert!(matches!(result, Err(PromptError::Template(_))));
    }

    #[test]
    fn undefined_variable_is_rejected_by_check_template() {
        let result = PromptComposer::check_template("Summarize {{ call_titel }}");
        assert!(matches!(result, Err(PromptError::Render(_))));
    }

    #[test]
    fn every_documented_variable_passes_check_template() {
        let template = "{{ company_name }} {{ call_title }} {{ call_date }} {{ call_duration }} \
            {{ call_system }} {{ participants | join(sep=\", \") }} {{ participants[0] }} \
            {{ file_tree }} {{ workdir }} {{ current_time }}";
        assert!(PromptComposer::check_template(template).is_ok());
        assert!(PromptComposer::check_template(super::DEFAULT_SYSTEM_PROMPT).is_ok());
    }
}

//! Offline dry run: the files and instructions a payload would produce,
//! without creating a sandbox or calling any provider.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use callbrief_core::config::{AppConfig, LoadOptions};
use callbrief_core::{ContextBuilder, PromptComposer, Transcript, WebhookPayload};
use chrono::{DateTime, Utc};

use super::CommandResult;

pub fn run(payload_path: &Path, now: Option<&str>) -> CommandResult {
    let now = match parse_now(now) {
        Ok(now) => now,
        Err(error) => return CommandResult::failure("render", "invalid_argument", error, 2),
    };

    let body = match fs::read(payload_path) {
        Ok(body) => body,
        Err(error) => {
            let message = format!("could not read `{}`: {error}", payload_path.display());
            return CommandResult::failure("render", "io", message, 2);
        }
    };

    let payload = match WebhookPayload::from_slice(&body) {
        Ok(payload) => payload,
        Err(error) => {
            return CommandResult::failure("render", "payload_validation", error.to_string(), 3)
        }
    };

    match AppConfig::load_unvalidated(LoadOptions::default())
        .context("configuration could not be loaded")
        .and_then(|config| render(&config, &payload, now))
    {
        Ok(output) => CommandResult::text(output),
        Err(error) => CommandResult::failure("render", "render", format!("{error:#}"), 4),
    }
}

/// Renders every virtual file followed by the composed instructions.
pub fn render(config: &AppConfig, payload: &WebhookPayload, now: DateTime<Utc>) -> Result<String> {
    let transcript = payload.inline_transcript().unwrap_or_else(Transcript::empty);
    // CRM records are never fetched here, so the account file is omitted.
    let context = ContextBuilder::new(false).build(payload, &transcript, None);

    let tree = context.tree();
    let company_name = config.agent.company_name.clone().unwrap_or_default();
    let composer = PromptComposer::new(company_name, config.agent.system_prompt.as_deref())
        .context("system prompt template is invalid")?;
    let workdir = config.sandbox.workdir.trim_end_matches('/');
    let instructions = composer
        .compose(payload, &tree, workdir, now)
        .context("system prompt could not be rendered")?;

    let mut sections = vec![format!("== file tree ({} files) ==\n{}", tree.len(), tree.render())];
    if !transcript.has_content() {
        sections.push(
            "note: payload has no inline transcript; the server would fetch it from the provider"
                .to_string(),
        );
    }
    for file in context.files() {
        sections.push(format!("== {workdir}/{} ==\n{}", file.path, file.content.trim_end()));
    }
    sections.push(format!("== instructions ==\n{}", instructions.trim_end()));

    Ok(sections.join("\n\n"))
}

fn parse_now(now: Option<&str>) -> std::result::Result<DateTime<Utc>, String> {
    match now {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|error| format!("--now must be an RFC 3339 timestamp: {error}")),
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use callbrief_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

const UNSET: &str = "<unset>";

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load_unvalidated(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config could not be loaded: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.push(match config.validate() {
        Ok(()) => "validation: ok".to_string(),
        Err(error) => format!("validation: failed ({error})"),
    });

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["CALLBRIEF_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["CALLBRIEF_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["CALLBRIEF_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "webhook.signing_secret",
            redact_optional(config.webhook.signing_secret.as_ref()),
            &["CALLBRIEF_WEBHOOK_SIGNING_SECRET"],
        ),
        Field::new(
            "webhook.tolerance_secs",
            config.webhook.tolerance_secs.to_string(),
            &["CALLBRIEF_WEBHOOK_TOLERANCE_SECS"],
        ),
        Field::new(
            "provider.base_url",
            config.provider.base_url.as_deref().unwrap_or(UNSET),
            &["CALLBRIEF_PROVIDER_BASE_URL"],
        ),
        Field::new(
            "provider.access_key",
            redact_optional(config.provider.access_key.as_ref()),
            &["CALLBRIEF_PROVIDER_ACCESS_KEY"],
        ),
        Field::new(
            "provider.access_key_secret",
            redact_optional(config.provider.access_key_secret.as_ref()),
            &["CALLBRIEF_PROVIDER_ACCESS_KEY_SECRET"],
        ),
        Field::new(
            "agent.base_url",
            config.agent.base_url.as_deref().unwrap_or(UNSET),
            &["CALLBRIEF_AGENT_BASE_URL"],
        ),
        Field::new(
            "agent.api_key",
            redact_optional(config.agent.api_key.as_ref()),
            &["CALLBRIEF_AGENT_API_KEY"],
        ),
        Field::new("agent.model", &config.agent.model, &["CALLBRIEF_AGENT_MODEL"]),
        Field::new(
            "agent.company_name",
            config.agent.company_name.as_deref().unwrap_or(UNSET),
            &["CALLBRIEF_AGENT_COMPANY_NAME"],
        ),
        Field::new(
            "agent.system_prompt",
            if config.agent.system_prompt.is_some() { "<custom>" } else { "<built-in>" },
            &["CALLBRIEF_AGENT_SYSTEM_PROMPT"],
        ),
        Field::new(
            "agent.reasoning_effort",
            config.agent.reasoning_effort.as_str(),
            &["CALLBRIEF_AGENT_REASONING_EFFORT"],
        ),
        Field::new(
            "agent.thinking_budget_tokens",
            config.agent.thinking_budget_tokens.to_string(),
            &["CALLBRIEF_AGENT_THINKING_BUDGET_TOKENS"],
        ),
        Field::new(
            "agent.max_steps",
            config.agent.max_steps.to_string(),
            &["CALLBRIEF_AGENT_MAX_STEPS"],
        ),
        Field::new(
            "agent.request_timeout_secs",
            config.agent.request_timeout_secs.to_string(),
            &["CALLBRIEF_AGENT_REQUEST_TIMEOUT_SECS"],
        ),
        Field::new(
            "sandbox.base_url",
            config.sandbox.base_url.as_deref().unwrap_or(UNSET),
            &["CALLBRIEF_SANDBOX_BASE_URL"],
        ),
        Field::new(
            "sandbox.api_key",
            redact_optional(config.sandbox.api_key.as_ref()),
            &["CALLBRIEF_SANDBOX_API_KEY"],
        ),
        Field::new(
            "sandbox.timeout_secs",
            config.sandbox.timeout_secs.to_string(),
            &["CALLBRIEF_SANDBOX_TIMEOUT_SECS"],
        ),
        Field::new("sandbox.workdir", &config.sandbox.workdir, &["CALLBRIEF_SANDBOX_WORKDIR"]),
        Field::new(
            "slack.enabled",
            config.slack.enabled.to_string(),
            &["CALLBRIEF_SLACK_ENABLED"],
        ),
        Field::new(
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            &["CALLBRIEF_SLACK_BOT_TOKEN"],
        ),
        Field::new(
            "slack.channel_id",
            config.slack.channel_id.as_deref().unwrap_or(UNSET),
            &["CALLBRIEF_SLACK_CHANNEL_ID"],
        ),
        Field::new(
            "slack.api_base_url",
            &config.slack.api_base_url,
            &["CALLBRIEF_SLACK_API_BASE_URL"],
        ),
        Field::new("crm.enabled", config.crm.enabled.to_string(), &["CALLBRIEF_CRM_ENABLED"]),
        Field::new(
            "crm.instance_url",
            config.crm.instance_url.as_deref().unwrap_or(UNSET),
            &["CALLBRIEF_CRM_INSTANCE_URL"],
        ),
        Field::new(
            "crm.access_token",
            redact_optional(config.crm.access_token.as_ref()),
            &["CALLBRIEF_CRM_ACCESS_TOKEN"],
        ),
        Field::new("crm.api_version", &config.crm.api_version, &["CALLBRIEF_CRM_API_VERSION"]),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["CALLBRIEF_LOGGING_LEVEL", "CALLBRIEF_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["CALLBRIEF_LOGGING_FORMAT", "CALLBRIEF_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) => redact_token(secret.expose_secret()),
        None => UNSET.to_string(),
    }
}

/// Keeps a vendor prefix such as `xoxb-` and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        if prefix.len() <= 5 && prefix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}

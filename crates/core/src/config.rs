use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompt::PromptComposer;

pub const DEFAULT_CONFIG_FILE: &str = "callbrief.toml";
pub const NESTED_CONFIG_FILE: &str = "config/callbrief.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub provider: ProviderConfig,
    pub agent: AgentConfig,
    pub sandbox: SandboxConfig,
    pub slack: SlackConfig,
    pub crm: CrmConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub signing_secret: Option<SecretString>,
    pub tolerance_secs: u64,
}

/// Call-intelligence provider API, used to fetch transcripts that the webhook
/// does not carry inline.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub access_key: Option<SecretString>,
    pub access_key_secret: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub company_name: Option<String>,
    pub system_prompt: Option<String>,
    pub reasoning_effort: ReasoningEffort,
    pub thinking_budget_tokens: u32,
    pub max_steps: u32,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SandboxConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub workdir: String,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub enabled: bool,
    pub bot_token: SecretString,
    pub channel_id: Option<String>,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub enabled: bool,
    pub instance_url: Option<String>,
    pub access_token: Option<SecretString>,
    pub api_version: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Which optional integrations the loaded configuration turns on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct IntegrationStatus {
    pub slack: bool,
    pub crm: bool,
    pub transcript_fetch: bool,
    pub signature_verification: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub port: Option<u16>,
    pub agent_base_url: Option<String>,
    pub agent_api_key: Option<String>,
    pub agent_model: Option<String>,
    pub company_name: Option<String>,
    pub sandbox_base_url: Option<String>,
    pub sandbox_api_key: Option<String>,
    pub sandbox_timeout_secs: Option<u64>,
    pub slack_enabled: Option<bool>,
    pub slack_bot_token: Option<String>,
    pub slack_channel_id: Option<String>,
    pub crm_enabled: Option<bool>,
    pub crm_instance_url: Option<String>,
    pub crm_access_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            webhook: WebhookConfig { signing_secret: None, tolerance_secs: 300 },
            provider: ProviderConfig { base_url: None, access_key: None, access_key_secret: None },
            agent: AgentConfig {
                base_url: None,
                api_key: None,
                model: "anthropic/claude-sonnet-4.5".to_string(),
                company_name: None,
                system_prompt: None,
                reasoning_effort: ReasoningEffort::Medium,
                thinking_budget_tokens: 8_000,
                max_steps: 30,
                request_timeout_secs: 900,
            },
            sandbox: SandboxConfig {
                base_url: None,
                api_key: None,
                timeout_secs: 600,
                workdir: "/workspace".to_string(),
            },
            slack: SlackConfig {
                enabled: false,
                bot_token: String::new().into(),
                channel_id: None,
                api_base_url: "https://slack.com/api".to_string(),
            },
            crm: CrmConfig {
                enabled: false,
                instance_url: None,
                access_token: None,
                api_version: "v60.0".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for ReasoningEffort {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ConfigError::Validation(format!(
                "unsupported reasoning effort `{other}` (expected low|medium|high)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let config = Self::load_unvalidated(options)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves defaults, file, env and overrides without running validation.
    ///
    /// The server uses this to keep serving its status page and health
    /// endpoint when the configuration is invalid.
    pub fn load_unvalidated(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);

        Ok(config)
    }

    pub fn integrations(&self) -> IntegrationStatus {
        IntegrationStatus {
            slack: self.slack.enabled,
            crm: self.crm.enabled,
            transcript_fetch: self.provider.base_url.is_some(),
            signature_verification: self.webhook.signing_secret.is_some(),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(webhook) = patch.webhook {
            if let Some(signing_secret_value) = webhook.signing_secret {
                self.webhook.signing_secret = Some(secret_value(signing_secret_value));
            }
            if let Some(tolerance_secs) = webhook.tolerance_secs {
                self.webhook.tolerance_secs = tolerance_secs;
            }
        }

        if let Some(provider) = patch.provider {
            if let Some(base_url) = provider.base_url {
                self.provider.base_url = Some(base_url);
            }
            if let Some(access_key_value) = provider.access_key {
                self.provider.access_key = Some(secret_value(access_key_value));
            }
            if let Some(access_key_secret_value) = provider.access_key_secret {
                self.provider.access_key_secret = Some(secret_value(access_key_secret_value));
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(base_url) = agent.base_url {
                self.agent.base_url = Some(base_url);
            }
            if let Some(agent_api_key_value) = agent.api_key {
                self.agent.api_key = Some(secret_value(agent_api_key_value));
            }
            if let Some(model) = agent.model {
                self.agent.model = model;
            }
            if let Some(company_name) = agent.company_name {
                self.agent.company_name = Some(company_name);
            }
            if let Some(system_prompt) = agent.system_prompt {
                self.agent.system_prompt = Some(system_prompt);
            }
            if let Some(reasoning_effort) = agent.reasoning_effort {
                self.agent.reasoning_effort = reasoning_effort;
            }
            if let Some(thinking_budget_tokens) = agent.thinking_budget_tokens {
                self.agent.thinking_budget_tokens = thinking_budget_tokens;
            }
            if let Some(max_steps) = agent.max_steps {
                self.agent.max_steps = max_steps;
            }
            if let Some(request_timeout_secs) = agent.request_timeout_secs {
                self.agent.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(sandbox) = patch.sandbox {
            if let Some(base_url) = sandbox.base_url {
                self.sandbox.base_url = Some(base_url);
            }
            if let Some(sandbox_api_key_value) = sandbox.api_key {
                self.sandbox.api_key = Some(secret_value(sandbox_api_key_value));
            }
            if let Some(timeout_secs) = sandbox.timeout_secs {
                self.sandbox.timeout_secs = timeout_secs;
            }
            if let Some(workdir) = sandbox.workdir {
                self.sandbox.workdir = workdir;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(enabled) = slack.enabled {
                self.slack.enabled = enabled;
            }
            if let Some(slack_bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(slack_bot_token_value);
            }
            if let Some(channel_id) = slack.channel_id {
                self.slack.channel_id = Some(channel_id);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(enabled) = crm.enabled {
                self.crm.enabled = enabled;
            }
            if let Some(instance_url) = crm.instance_url {
                self.crm.instance_url = Some(instance_url);
            }
            if let Some(crm_access_token_value) = crm.access_token {
                self.crm.access_token = Some(secret_value(crm_access_token_value));
            }
            if let Some(api_version) = crm.api_version {
                self.crm.api_version = api_version;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CALLBRIEF_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CALLBRIEF_SERVER_PORT") {
            self.server.port = parse_u16("CALLBRIEF_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CALLBRIEF_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CALLBRIEF_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CALLBRIEF_WEBHOOK_SIGNING_SECRET") {
            self.webhook.signing_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("CALLBRIEF_WEBHOOK_TOLERANCE_SECS") {
            self.webhook.tolerance_secs = parse_u64("CALLBRIEF_WEBHOOK_TOLERANCE_SECS", &value)?;
        }

        if let Some(value) = read_env("CALLBRIEF_PROVIDER_BASE_URL") {
            self.provider.base_url = Some(value);
        }
        if let Some(value) = read_env("CALLBRIEF_PROVIDER_ACCESS_KEY") {
            self.provider.access_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CALLBRIEF_PROVIDER_ACCESS_KEY_SECRET") {
            self.provider.access_key_secret = Some(secret_value(value));
        }

        if let Some(value) = read_env("CALLBRIEF_AGENT_BASE_URL") {
            self.agent.base_url = Some(value);
        }
        if let Some(value) = read_env("CALLBRIEF_AGENT_API_KEY") {
            self.agent.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CALLBRIEF_AGENT_MODEL") {
            self.agent.model = value;
        }
        if let Some(value) = read_env("CALLBRIEF_AGENT_COMPANY_NAME") {
            self.agent.company_name = Some(value);
        }
        if let Some(value) = read_env("CALLBRIEF_AGENT_SYSTEM_PROMPT") {
            self.agent.system_prompt = Some(value);
        }
        if let Some(value) = read_env("CALLBRIEF_AGENT_REASONING_EFFORT") {
            self.agent.reasoning_effort = value.parse()?;
        }
        if let Some(value) = read_env("CALLBRIEF_AGENT_THINKING_BUDGET_TOKENS") {
            self.agent.thinking_budget_tokens =
                parse_u32("CALLBRIEF_AGENT_THINKING_BUDGET_TOKENS", &value)?;
        }
        if let Some(value) = read_env("CALLBRIEF_AGENT_MAX_STEPS") {
            self.agent.max_steps = parse_u32("CALLBRIEF_AGENT_MAX_STEPS", &value)?;
        }
        if let Some(value) = read_env("CALLBRIEF_AGENT_REQUEST_TIMEOUT_SECS") {
            self.agent.request_timeout_secs =
                parse_u64("CALLBRIEF_AGENT_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CALLBRIEF_SANDBOX_BASE_URL") {
            self.sandbox.base_url = Some(value);
        }
        if let Some(value) = read_env("CALLBRIEF_SANDBOX_API_KEY") {
            self.sandbox.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CALLBRIEF_SANDBOX_TIMEOUT_SECS") {
            self.sandbox.timeout_secs = parse_u64("CALLBRIEF_SANDBOX_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CALLBRIEF_SANDBOX_WORKDIR") {
            self.sandbox.workdir = value;
        }

        if let Some(value) = read_env("CALLBRIEF_SLACK_ENABLED") {
            self.slack.enabled = parse_bool("CALLBRIEF_SLACK_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CALLBRIEF_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("CALLBRIEF_SLACK_CHANNEL_ID") {
            self.slack.channel_id = Some(value);
        }
        if let Some(value) = read_env("CALLBRIEF_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }

        if let Some(value) = read_env("CALLBRIEF_CRM_ENABLED") {
            self.crm.enabled = parse_bool("CALLBRIEF_CRM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CALLBRIEF_CRM_INSTANCE_URL") {
            self.crm.instance_url = Some(value);
        }
        if let Some(value) = read_env("CALLBRIEF_CRM_ACCESS_TOKEN") {
            self.crm.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("CALLBRIEF_CRM_API_VERSION") {
            self.crm.api_version = value;
        }

        let log_level =
            read_env("CALLBRIEF_LOGGING_LEVEL").or_else(|| read_env("CALLBRIEF_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CALLBRIEF_LOGGING_FORMAT").or_else(|| read_env("CALLBRIEF_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(agent_base_url) = overrides.agent_base_url {
            self.agent.base_url = Some(agent_base_url);
        }
        if let Some(agent_api_key) = overrides.agent_api_key {
            self.agent.api_key = Some(secret_value(agent_api_key));
        }
        if let Some(agent_model) = overrides.agent_model {
            self.agent.model = agent_model;
        }
        if let Some(company_name) = overrides.company_name {
            self.agent.company_name = Some(company_name);
        }
        if let Some(sandbox_base_url) = overrides.sandbox_base_url {
            self.sandbox.base_url = Some(sandbox_base_url);
        }
        if let Some(sandbox_api_key) = overrides.sandbox_api_key {
            self.sandbox.api_key = Some(secret_value(sandbox_api_key));
        }
        if let Some(sandbox_timeout_secs) = overrides.sandbox_timeout_secs {
            self.sandbox.timeout_secs = sandbox_timeout_secs;
        }

        if let Some(enabled) = overrides.slack_enabled {
            self.slack.enabled = enabled;
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(channel_id) = overrides.slack_channel_id {
            self.slack.channel_id = Some(channel_id);
        }

        if let Some(enabled) = overrides.crm_enabled {
            self.crm.enabled = enabled;
        }
        if let Some(instance_url) = overrides.crm_instance_url {
            self.crm.instance_url = Some(instance_url);
        }
        if let Some(crm_access_token) = overrides.crm_access_token {
            self.crm.access_token = Some(secret_value(crm_access_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_webhook(&self.webhook)?;
        validate_provider(&self.provider)?;
        validate_agent(&self.agent)?;
        validate_sandbox(&self.sandbox)?;
        validate_slack(&self.slack)?;
        validate_crm(&self.crm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn missing_secret(value: Option<&SecretString>) -> bool {
    value.map(|secret| secret.expose_secret().trim().is_empty()).unwrap_or(true)
}

fn missing_text(value: Option<&String>) -> bool {
    value.map(|text| text.trim().is_empty()).unwrap_or(true)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_webhook(webhook: &WebhookConfig) -> Result<(), ConfigError> {
    if webhook.tolerance_secs == 0 || webhook.tolerance_secs > 3600 {
        return Err(ConfigError::Validation(
            "webhook.tolerance_secs must be in range 1..=3600".to_string(),
        ));
    }

    if let Some(secret) = &webhook.signing_secret {
        if secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "webhook.signing_secret must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), ConfigError> {
    let Some(base_url) = &provider.base_url else {
        return Ok(());
    };

    if !is_http_url(base_url) {
        return Err(ConfigError::Validation(
            "provider.base_url must start with http:// or https://".to_string(),
        ));
    }

    if missing_secret(provider.access_key.as_ref())
        || missing_secret(provider.access_key_secret.as_ref())
    {
        return Err(ConfigError::Validation(
            "provider.access_key and provider.access_key_secret are required when provider.base_url is set".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    match agent.base_url.as_deref() {
        None => {
            return Err(ConfigError::Validation(
                "agent.base_url is required (the hosted tool-loop runtime endpoint)".to_string(),
            ))
        }
        Some(url) if !is_http_url(url) => {
            return Err(ConfigError::Validation(
                "agent.base_url must start with http:// or https://".to_string(),
            ))
        }
        Some(_) => {}
    }

    if missing_secret(agent.api_key.as_ref()) {
        return Err(ConfigError::Validation("agent.api_key is required".to_string()));
    }

    let model_valid = agent
        .model
        .split_once('/')
        .map(|(family, name)| !family.trim().is_empty() && !name.trim().is_empty())
        .unwrap_or(false);
    if !model_valid {
        return Err(ConfigError::Validation(format!(
            "agent.model must look like `<family>/<model>` (got `{}`)",
            agent.model
        )));
    }

    if missing_text(agent.company_name.as_ref()) {
        return Err(ConfigError::Validation(
            "agent.company_name is required; it is interpolated into the system prompt".to_string(),
        ));
    }

    if let Some(template) = &agent.system_prompt {
        PromptComposer::check_template(template).map_err(|error| {
            ConfigError::Validation(format!("agent.system_prompt is not a valid template: {error}"))
        })?;
    }

    if !(1_024..=64_000).contains(&agent.thinking_budget_tokens) {
        return Err(ConfigError::Validation(
            "agent.thinking_budget_tokens must be in range 1024..=64000".to_string(),
        ));
    }

    if agent.max_steps == 0 || agent.max_steps > 200 {
        return Err(ConfigError::Validation(
            "agent.max_steps must be in range 1..=200".to_string(),
        ));
    }

    if agent.request_timeout_secs == 0 || agent.request_timeout_secs > 3600 {
        return Err(ConfigError::Validation(
            "agent.request_timeout_secs must be in range 1..=3600".to_string(),
        ));
    }

    Ok(())
}

fn validate_sandbox(sandbox: &SandboxConfig) -> Result<(), ConfigError> {
    match sandbox.base_url.as_deref() {
        None => {
            return Err(ConfigError::Validation(
                "sandbox.base_url is required (the ephemeral sandbox service endpoint)".to_string(),
            ))
        }
        Some(url) if !is_http_url(url) => {
            return Err(ConfigError::Validation(
                "sandbox.base_url must start with http:// or https://".to_string(),
            ))
        }
        Some(_) => {}
    }

    if missing_secret(sandbox.api_key.as_ref()) {
        return Err(ConfigError::Validation("sandbox.api_key is required".to_string()));
    }

    if !(60..=2_700).contains(&sandbox.timeout_secs) {
        return Err(ConfigError::Validation(
            "sandbox.timeout_secs must be in range 60..=2700".to_string(),
        ));
    }

    if !sandbox.workdir.starts_with('/') {
        return Err(ConfigError::Validation(
            "sandbox.workdir must be an absolute path".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if !is_http_url(&slack.api_base_url) {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if !slack.enabled {
        return Ok(());
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required when slack.enabled is true. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if missing_text(slack.channel_id.as_ref()) {
        return Err(ConfigError::Validation(
            "slack.channel_id is required when slack.enabled is true".to_string(),
        ));
    }

    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    if !valid_api_version(&crm.api_version) {
        return Err(ConfigError::Validation(format!(
            "crm.api_version must look like `v60.0` (got `{}`)",
            crm.api_version
        )));
    }

    if !crm.enabled {
        return Ok(());
    }

    match crm.instance_url.as_deref() {
        None => {
            return Err(ConfigError::Validation(
                "crm.enabled is true but crm.instance_url is not configured".to_string(),
            ))
        }
        Some(url) if !url.starts_with("https://") => {
            return Err(ConfigError::Validation(
                "crm.instance_url must start with https://".to_string(),
            ))
        }
        Some(_) => {}
    }

    if missing_secret(crm.access_token.as_ref()) {
        return Err(ConfigError::Validation(
            "crm.enabled is true but crm.access_token is missing".to_string(),
        ));
    }

    Ok(())
}

fn valid_api_version(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('v') else {
        return false;
    };
    let Some((major, minor)) = rest.split_once('.') else {
        return false;
    };
    let digits = |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit());
    digits(major) && digits(minor)
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    webhook: Option<WebhookPatch>,
    provider: Option<ProviderPatch>,
    agent: Option<AgentPatch>,
    sandbox: Option<SandboxPatch>,
    slack: Option<SlackPatch>,
    crm: Option<CrmPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPatch {
    signing_secret: Option<String>,
    tolerance_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderPatch {
    base_url: Option<String>,
    access_key: Option<String>,
    access_key_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    company_name: Option<String>,
    system_prompt: Option<String>,
    reasoning_effort: Option<ReasoningEffort>,
    thinking_budget_tokens: Option<u32>,
    max_steps: Option<u32>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SandboxPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    workdir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    enabled: Option<bool>,
    bot_token: Option<String>,
    channel_id: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    enabled: Option<bool>,
    instance_url: Option<String>,
    access_token: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

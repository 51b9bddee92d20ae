//! Per-family reasoning options forwarded to the model provider.

use callbrief_core::config::{AgentConfig, ReasoningEffort};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFamily {
    Anthropic,
    OpenAi,
    Google,
    Other,
}

impl ModelFamily {
    /// Reads the `<family>/` prefix of a model id such as `anthropic/claude-sonnet-4.5`.
    pub fn of(model: &str) -> Self {
        let family = model.split_once('/').map(|(family, _)| family).unwrap_or_default();
        match family.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Self::Anthropic,
            "openai" => Self::OpenAi,
            "google" => Self::Google,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProviderOptions(Value);

impl ProviderOptions {
    pub fn for_model(model: &str, effort: ReasoningEffort, thinking_budget_tokens: u32) -> Self {
        let value = match ModelFamily::of(model) {
            ModelFamily::Anthropic => json!({
                "anthropic": {
                    "thinking": { "type": "enabled", "budgetTokens": thinking_budget_tokens }
                }
            }),
            ModelFamily::OpenAi => json!({ "openai": { "reasoningEffort": effort.as_str() } }),
            ModelFamily::Google => json!({
                "google": { "thinkingConfig": { "thinkingBudget": thinking_budget_tokens } }
            }),
            ModelFamily::Other => Value::Object(Map::new()),
        };
        Self(value)
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::for_model(&config.model, config.reasoning_effort, config.thinking_budget_tokens)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

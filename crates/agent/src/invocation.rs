use callbrief_core::WebhookPayload;
use serde::Serialize;
use serde_json::Value;

use crate::tools::ToolDefinition;

/// Request body for one tool-loop run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInvocation {
    pub model: String,
    pub provider_options: Value,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
    pub output_schema: Value,
    pub input: InvocationInput,
    pub sandbox: SandboxBinding,
    pub max_steps: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationInput {
    pub webhook: WebhookPayload,
    pub crm_account_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxBinding {
    pub session_id: String,
    pub workdir: String,
}

#[cfg(test)]
mod tests {
    use callbrief_core::WebhookPayload;
    use serde_json::json;

    use super::{AgentInvocation, InvocationInput, SandboxBinding};
    use crate::schema::output_schema;
    use crate::tools::ToolSet;

    #[test]
    fn serializes_with_the_runtime_field_names() {
        let body = br#"{"callData":{"metaData":{"id":"c-1"}}}"#;
        let webhook = WebhookPayload::from_slice(body).expect("valid");
        let invocation = AgentInvocation {
            model: "openai/gpt-5".to_string(),
            provider_options: json!({ "openai": { "reasoningEffort": "medium" } }),
            instructions: "Summarize.".to_string(),
            tools: ToolSet::sandbox_defaults().definitions(),
            output_schema: output_schema(),
            input: InvocationInput { webhook, crm_account_id: None },
            sandbox: SandboxBinding {
                session_id: "sbx-1".to_string(),
                workdir: "/workspace".to_string(),
            },
            max_steps: 30,
        };

        let value = serde_json::to_value(&invocation).expect("json");
        assert_eq!(value["providerOptions"]["openai"]["reasoningEffort"], "medium");
        assert_eq!(value["sandbox"], json!({ "sessionId": "sbx-1", "workdir": "/workspace" }));
        assert_eq!(value["input"]["webhook"]["callData"]["metaData"]["id"], "c-1");
        assert_eq!(value["input"]["crmAccountId"], json!(null));
        assert_eq!(value["maxSteps"], 30);
        assert_eq!(value["tools"].as_array().map(Vec::len), Some(3));
        assert!(value.get("outputSchema").is_some());
    }
}

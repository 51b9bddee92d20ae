use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

/// A tool the remote runtime executes against the sandbox session.
///
/// Only the declaration travels with the invocation; the platform owns the
/// execution.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self { name: name.into(), description: description.into(), input_schema }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolSet {
    /// `bash`, `read_file` and `list_files`, scoped to the session workdir.
    pub fn sandbox_defaults() -> Self {
        let mut tools = Self::default();
        tools.register(ToolDefinition::new(
            "bash",
            "Run a shell command inside the sandbox and return stdout, stderr and the exit code.",
            json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Command line to execute." }
                },
                "required": ["command"],
                "additionalProperties": false
            }),
        ));
        tools.register(ToolDefinition::new(
            "read_file",
            "Read a UTF-8 text file from the sandbox.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Absolute or workdir-relative path." }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        ));
        tools.register(ToolDefinition::new(
            "list_files",
            "List files under a sandbox directory.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory to list." },
                    "recursive": { "type": "boolean", "default": true }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        ));
        tools
    }

    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

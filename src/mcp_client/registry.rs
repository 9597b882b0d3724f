//! Tool catalog: the snapshot of tools advertised by the provider.
//!
//! Provides:
//! - Lookup by tool name
//! - Validation that call arguments carry the schema's required fields
//! - Conversion into the backend's function-calling format
//!
//! The catalog is immutable once built; a reconnect replaces it wholesale.

use std::collections::HashMap;

use crate::inference::types::{FunctionDefinition, ToolDefinition};

use super::errors::McpError;
use super::types::{ToolArguments, ToolDescriptor};

// ─── ToolCatalog ─────────────────────────────────────────────────────────────

/// Tools advertised by one provider, in advertised order.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
    /// `tool_name → index into tools`.
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Build a catalog from a `list_tools` response.
    ///
    /// Duplicate names keep the first occurrence.
    pub fn new(descriptors: Vec<ToolDescriptor>) -> Self {
        let mut tools = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());
        for tool in descriptors {
            if index.contains_key(&tool.name) {
                tracing::warn!(tool = %tool.name, "duplicate tool name in catalog, keeping first");
                continue;
            }
            index.insert(tool.name.clone(), tools.len());
            tools.push(tool);
        }
        Self { tools, index }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check that `name` exists and `arguments` carries every required field.
    ///
    /// Only presence is checked. Types and nested schemas are left to the
    /// provider.
    pub fn validate_arguments(&self, name: &str, arguments: &ToolArguments) -> Result<(), McpError> {
        let def = self.get(name).ok_or_else(|| McpError::UnknownTool {
            name: name.to_string(),
        })?;

        let missing: Vec<&str> = def
            .required_fields()
            .into_iter()
            .filter(|field| !arguments.contains_key(*field))
            .collect();

        if !missing.is_empty() {
            return Err(McpError::InvalidArguments {
                tool: name.to_string(),
                reason: format!("missing required field(s): {}", missing.join(", ")),
            });
        }
        Ok(())
    }

    /// Serialize all tools into the backend's function-calling format.
    pub fn to_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(to_definition).collect()
    }
}

/// Convert one descriptor into a function definition.
///
/// The parameters object is rebuilt as
/// `{"type": "object", "properties": …, "required": […]}`. A schema without
/// `properties` becomes an empty-object schema.
fn to_definition(tool: &ToolDescriptor) -> ToolDefinition {
    let properties = tool
        .input_schema
        .get("properties")
        .filter(|p| !p.is_null())
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    let required = tool
        .input_schema
        .get("required")
        .filter(|r| r.is_array())
        .cloned()
        .unwrap_or_else(|| serde_json::json!([]));

    ToolDefinition {
        r#type: "function".to_string(),
        function: FunctionDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        },
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

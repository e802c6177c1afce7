//! Tool calling definitions (OpenAI function-calling shape)

use serde::{Deserialize, Serialize};

/// Tool definition (for function calling)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String, // "function"
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: Some(description.into()),
                parameters: Some(parameters),
            },
        }
    }

    /// Declared JSON schema, or an empty object schema when none was given.
    pub fn parameters_or_empty(&self) -> serde_json::Value {
        self.function
            .parameters
            .clone()
            .unwrap_or_else(|| serde_json::json!({ "type": "object", "properties": {} }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>, // JSON Schema
}

/// Tool call (invocation from model)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String, // "function"
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Parse the accumulated argument string. An empty string parses as `{}`.
    pub fn arguments_json(&self) -> crate::Result<serde_json::Value> {
        let trimmed = self.function.arguments.trim();
        if trimmed.is_empty() {
            return Ok(serde_json::json!({}));
        }
        Ok(serde_json::from_str(trimmed)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definition_wire_shape() {
        let t = ToolDefinition::function(
            "get_weather",
            "Weather lookup",
            serde_json::json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        );
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["name"], "get_weather");
    }

    #[test]
    fn test_missing_parameters_default_to_empty_object_schema() {
        let t = ToolDefinition {
            tool_type: "function".into(),
            function: FunctionDefinition {
                name: "noop".into(),
                description: None,
                parameters: None,
            },
        };
        assert_eq!(t.parameters_or_empty()["type"], "object");
    }

    #[test]
    fn test_arguments_json() {
        let call = ToolCall::new("call_1", "f", r#"{"x":1}"#);
        assert_eq!(call.arguments_json().unwrap()["x"], 1);
        assert_eq!(ToolCall::new("c", "f", "").arguments_json().unwrap(), serde_json::json!({}));
        assert!(ToolCall::new("c", "f", "{bad").arguments_json().is_err());
    }
}

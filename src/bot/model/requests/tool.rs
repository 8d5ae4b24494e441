//! 工具类型定义
//!
//! 定义函数调用协议中工具相关的类型

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 工具定义
///
/// 用于在请求中声明可用的工具
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// 工具类型，固定为 "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// 创建函数工具
    pub fn function(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters: ParametersDefinition::default(),
            },
        }
    }

    /// 设置参数模式
    pub fn with_parameters(mut self, parameters: ParametersDefinition) -> Self {
        self.function.parameters = parameters;
        self
    }

    /// 获取工具名称
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// 函数定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParametersDefinition,
}

/// 参数模式（JSON Schema 子集）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersDefinition {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Default for ParametersDefinition {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

impl ParametersDefinition {
    /// 添加属性
    pub fn with_property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }
}

/// 已聚合的工具调用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCallDefinition,
}

/// 函数调用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallDefinition {
    pub name: String,
    /// 累积的参数 JSON 文本
    pub arguments: String,
}

/// 工具执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultDefinition {
    /// 固定为 "tool"
    pub role: String,
    pub name: String,
    pub tool_call_id: String,
    pub content: String,
}

impl ToolResultDefinition {
    /// 为指定调用创建结果
    pub fn for_call(call: &ToolCallDefinition, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            name: call.function.name.clone(),
            tool_call_id: call.id.clone(),
            content: content.into(),
        }
    }
}

/// 流式工具调用片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(default)]
    pub function: FunctionCallDelta,
}

/// 流式函数调用片段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `null` 视为空片段
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ToolCallDelta {
    /// 首个片段需携带 id、type 与函数名，返回据此创建的调用
    pub fn start_call(&self) -> Option<ToolCallDefinition> {
        let id = self.id.as_ref()?;
        let call_type = self.call_type.as_ref()?;
        let name = self.function.name.as_ref()?;

        Some(ToolCallDefinition {
            id: id.clone(),
            call_type: call_type.clone(),
            function: FunctionCallDefinition {
                name: name.clone(),
                arguments: self.function.arguments.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_serialize() {
        let tool = ToolDefinition::function("get_weather", "Get the weather").with_parameters(
            ParametersDefinition::default().with_property(
                "city",
                json!({"type": "string"}),
                true,
            ),
        );
        let value = serde_json::to_value(&tool).unwrap();

        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "get_weather");
        assert_eq!(value["function"]["parameters"]["type"], "object");
        assert_eq!(value["function"]["parameters"]["properties"]["city"]["type"], "string");
        assert_eq!(value["function"]["parameters"]["required"], json!(["city"]));
    }

    #[test]
    fn test_delta_deserialize() {
        let delta: ToolCallDelta = serde_json::from_value(json!({
            "index": 0,
            "id": "call_1",
            "type": "function",
            "function": {"name": "f", "arguments": "{\"a\""}
        }))
        .unwrap();
        assert_eq!(delta.index, 0);
        assert_eq!(delta.id.as_deref(), Some("call_1"));
        assert_eq!(delta.function.arguments, "{\"a\"");

        let fragment: ToolCallDelta =
            serde_json::from_value(json!({"index": 0, "function": {"arguments": ":1}"}}))
                .unwrap();
        assert!(fragment.id.is_none());
        assert!(fragment.function.name.is_none());
    }

    #[test]
    fn test_delta_null_arguments() {
        let delta: ToolCallDelta = serde_json::from_value(json!({
            "index": 0,
            "id": "call_1",
            "type": "function",
            "function": {"name": "f", "arguments": null}
        }))
        .unwrap();
        assert_eq!(delta.function.arguments, "");
        assert_eq!(delta.start_call().unwrap().function.arguments, "");
    }

    #[test]
    fn test_start_call_requires_identity() {
        let fragment: ToolCallDelta =
            serde_json::from_value(json!({"index": 1, "function": {"arguments": "{}"}})).unwrap();
        assert!(fragment.start_call().is_none());

        let first: ToolCallDelta = serde_json::from_value(json!({
            "index": 1,
            "id": "c",
            "type": "function",
            "function": {"name": "n", "arguments": ""}
        }))
        .unwrap();
        let call = first.start_call().unwrap();
        assert_eq!(call.id, "c");
        assert_eq!(call.function.name, "n");
        assert_eq!(call.function.arguments, "");
    }

    #[test]
    fn test_tool_result_for_call() {
        let call = ToolCallDefinition {
            id: "call_9".to_string(),
            call_type: "function".to_string(),
            function: FunctionCallDefinition {
                name: "sum".to_string(),
                arguments: "{}".to_string(),
            },
        };
        let result = ToolResultDefinition::for_call(&call, "3");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"role": "tool", "name": "sum", "tool_call_id": "call_9", "content": "3"})
        );
    }
}

//! 请求体构建
//!
//! 将 [`QueryRequest`] 与可选的工具字段合并为发送的 JSON 对象

use std::sync::Arc;

use serde_json::{Map, Value};

use super::query::QueryRequest;
use super::tool::{ToolCallDefinition, ToolDefinition, ToolResultDefinition};

/// 附加到请求体的工具字段
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolPayload<'a> {
    pub tools: Option<&'a [ToolDefinition]>,
    pub tool_calls: Option<&'a [ToolCallDefinition]>,
    pub tool_results: Option<&'a [ToolResultDefinition]>,
}

/// 可替换的请求体构建函数
pub type PayloadBuilder =
    Arc<dyn Fn(&QueryRequest, &ToolPayload<'_>) -> serde_json::Result<Map<String, Value>> + Send + Sync>;

/// 构建请求体
///
/// 先序列化请求，再写入存在的工具字段。
pub fn build_payload(
    request: &QueryRequest,
    tools: &ToolPayload<'_>,
) -> serde_json::Result<Map<String, Value>> {
    let mut payload = match serde_json::to_value(request)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if let Some(defs) = tools.tools {
        payload.insert("tools".to_string(), serde_json::to_value(defs)?);
    }
    if let Some(calls) = tools.tool_calls {
        payload.insert("tool_calls".to_string(), serde_json::to_value(calls)?);
    }
    if let Some(results) = tools.tool_results {
        payload.insert("tool_results".to_string(), serde_json::to_value(results)?);
    }

    Ok(payload)
}

/// 默认构建函数
pub fn default_payload_builder() -> PayloadBuilder {
    Arc::new(build_payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::model::requests::{FunctionCallDefinition, ProtocolMessage};

    #[test]
    fn test_build_payload_without_tools() {
        let request = QueryRequest::new(vec![ProtocolMessage::user("hi")]);
        let payload = build_payload(&request, &ToolPayload::default()).unwrap();

        assert_eq!(payload["type"], "query");
        assert!(!payload.contains_key("tools"));
        assert!(!payload.contains_key("tool_calls"));
        assert!(!payload.contains_key("tool_results"));
    }

    #[test]
    fn test_build_payload_with_tools() {
        let request = QueryRequest::new(vec![ProtocolMessage::user("hi")]);
        let tools = vec![ToolDefinition::function("f", "does f")];
        let calls = vec![ToolCallDefinition {
            id: "c1".to_string(),
            call_type: "function".to_string(),
            function: FunctionCallDefinition {
                name: "f".to_string(),
                arguments: "{}".to_string(),
            },
        }];
        let results = vec![ToolResultDefinition::for_call(&calls[0], "ok")];

        let payload = build_payload(
            &request,
            &ToolPayload {
                tools: Some(&tools),
                tool_calls: Some(&calls),
                tool_results: Some(&results),
            },
        )
        .unwrap();

        assert_eq!(payload["tools"][0]["function"]["name"], "f");
        assert_eq!(payload["tool_calls"][0]["id"], "c1");
        assert_eq!(payload["tool_results"][0]["content"], "ok");
    }

    #[test]
    fn test_default_builder_matches_build_payload() {
        let request = QueryRequest::new(vec![ProtocolMessage::user("hi")]);
        let builder = default_payload_builder();
        assert_eq!(
            builder(&request, &ToolPayload::default()).unwrap(),
            build_payload(&request, &ToolPayload::default()).unwrap()
        );
    }
}

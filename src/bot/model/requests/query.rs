//! 查询请求类型定义
//!
//! 定义发送到 bot 端点的查询请求结构

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 协议版本
pub const PROTOCOL_VERSION: &str = "1.2";

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Bot,
    Tool,
}

/// 附件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub content_type: String,
    pub name: String,
    /// 内联引用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_ref: Option<String>,
    /// 服务端解析出的文本内容
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_content: Option<String>,
}

/// 会话中的一条消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// 毫秒时间戳，0 表示未设置
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl ProtocolMessage {
    /// 创建消息
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            content_type: None,
            message_type: None,
            sender_id: None,
            timestamp: 0,
            message_id: String::new(),
            attachments: Vec::new(),
            parameters: Map::new(),
            metadata: None,
        }
    }

    /// 创建用户消息
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// 创建系统消息
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// 创建 bot 消息
    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Role::Bot, content)
    }

    /// 设置消息 ID
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    /// 添加附件
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// 查询请求
///
/// 工具相关字段（tools / tool_calls / tool_results）不在此结构中，
/// 由 [`build_payload`](super::build_payload) 在发送前写入。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub version: String,
    #[serde(rename = "type")]
    pub request_type: String,
    pub query: Vec<ProtocolMessage>,
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metadata: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_system_prompt: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bot_query_id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_params: Map<String, Value>,
}

impl QueryRequest {
    /// 以默认版本创建查询请求
    pub fn new(query: Vec<ProtocolMessage>) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            request_type: "query".to_string(),
            query,
            user_id: String::new(),
            conversation_id: String::new(),
            message_id: String::new(),
            metadata: String::new(),
            access_key: String::new(),
            temperature: None,
            skip_system_prompt: false,
            stop_sequences: Vec::new(),
            language_code: String::new(),
            bot_query_id: String::new(),
            extra_params: Map::new(),
        }
    }

    /// 设置会话标识
    pub fn with_ids(
        mut self,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        self.user_id = user_id.into();
        self.conversation_id = conversation_id.into();
        self.message_id = message_id.into();
        self
    }

    /// 设置温度
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

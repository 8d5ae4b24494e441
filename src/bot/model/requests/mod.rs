//! 请求类型模块
//!
//! 包含 bot 查询请求相关的类型定义

pub mod payload;
pub mod query;
pub mod tool;

// 重新导出主要类型
pub use payload::{PayloadBuilder, ToolPayload, build_payload, default_payload_builder};
pub use query::{Attachment, PROTOCOL_VERSION, ProtocolMessage, QueryRequest, Role};
pub use tool::{
    FunctionCallDefinition, FunctionCallDelta, FunctionDefinition, ParametersDefinition,
    ToolCallDefinition, ToolCallDelta, ToolDefinition, ToolResultDefinition,
};

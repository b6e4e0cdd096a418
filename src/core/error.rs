//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 Retry / Skip / Abort。

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误（配置、外部能力、超时、必填字段缺失）
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    /// 构造期即可发现的问题（如缺少 API Key），不可重试
    #[error("Config error: {0}")]
    Configuration(String),

    /// 外部文本/图像生成能力的单次失败（网络、限流、格式错误）
    #[error("Capability error: {0}")]
    Capability(#[from] LlmError),

    #[error("Agent '{agent}' timed out after {timeout_secs}s")]
    Timeout { agent: String, timeout_secs: f64 },

    /// 必填输入缺失：不重试、不计入调用，由包装器转为跳过标记
    #[error("Required field missing: {0}")]
    RequiredFieldMissing(String),
}

impl AgentError {
    /// 审计日志里使用的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Configuration(_) => "configuration",
            AgentError::Capability(_) => "capability",
            AgentError::Timeout { .. } => "timeout",
            AgentError::RequiredFieldMissing(_) => "required_field_missing",
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 等待指定时长后再试一次
    Retry(Duration),
    /// 输入不满足契约：跳过本步骤
    Skip(String),
    /// 终止重试，把最后的错误交给包装器收口
    Abort,
}

//! 错误恢复引擎
//!
//! 根据 AgentError 类型与当前尝试次数返回 RecoveryAction，供执行包装器决定是重试、跳过还是放弃。
//! 退避为线性：第 n 次失败后等待 retry_delay * n；限流时至少等待服务端给出的 retry_after。

use std::time::Duration;

use crate::core::{AgentConfig, AgentError, RecoveryAction};
use crate::llm::LlmError;

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// attempt 从 1 开始，表示刚刚失败的是第几次尝试
    pub fn handle(&self, err: &AgentError, attempt: u32, config: &AgentConfig) -> RecoveryAction {
        match err {
            AgentError::RequiredFieldMissing(field) => RecoveryAction::Skip(field.clone()),
            AgentError::Configuration(_) => RecoveryAction::Abort,
            _ if attempt > config.retry_count => RecoveryAction::Abort,
            AgentError::Capability(LlmError::RateLimited { retry_after_ms }) => {
                let backoff = config.backoff(attempt);
                RecoveryAction::Retry(backoff.max(Duration::from_millis(*retry_after_ms)))
            }
            AgentError::Capability(_) | AgentError::Timeout { .. } => {
                RecoveryAction::Retry(config.backoff(attempt))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(retry_count: u32, delay: f64) -> AgentConfig {
        AgentConfig {
            retry_count,
            retry_delay_secs: delay,
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_recovery_linear_backoff() {
        let engine = RecoveryEngine::new();
        let cfg = config(3, 1.0);
        let err = AgentError::Capability(LlmError::Network("reset".into()));
        assert_eq!(engine.handle(&err, 1, &cfg), RecoveryAction::Retry(Duration::from_secs(1)));
        assert_eq!(engine.handle(&err, 2, &cfg), RecoveryAction::Retry(Duration::from_secs(2)));
        assert_eq!(engine.handle(&err, 3, &cfg), RecoveryAction::Retry(Duration::from_secs(3)));
    }

    #[test]
    fn test_recovery_exhausted() {
        let engine = RecoveryEngine::new();
        let cfg = config(2, 1.0);
        let err = AgentError::Timeout {
            agent: "trend_analysis".into(),
            timeout_secs: 30.0,
        };
        assert!(matches!(engine.handle(&err, 2, &cfg), RecoveryAction::Retry(_)));
        assert_eq!(engine.handle(&err, 3, &cfg), RecoveryAction::Abort);
    }

    #[test]
    fn test_recovery_rate_limited_waits_at_least_retry_after() {
        let engine = RecoveryEngine::new();
        let cfg = config(3, 0.5);
        let err = AgentError::Capability(LlmError::RateLimited { retry_after_ms: 4000 });
        assert_eq!(engine.handle(&err, 1, &cfg), RecoveryAction::Retry(Duration::from_secs(4)));
    }

    #[test]
    fn test_recovery_missing_field_skips() {
        let engine = RecoveryEngine::new();
        let err = AgentError::RequiredFieldMissing("topic".into());
        assert_eq!(
            engine.handle(&err, 1, &AgentConfig::default()),
            RecoveryAction::Skip("topic".into())
        );
    }

    #[test]
    fn test_recovery_configuration_aborts() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Configuration("GROQ_API_KEY not set".into());
        assert_eq!(engine.handle(&err, 1, &AgentConfig::default()), RecoveryAction::Abort);
    }
}

//! Agent 能力契约
//!
//! 每个 Agent 以 key 标识，声明自己读取哪些状态字段（StateContract），
//! 在 execute 中构造提示词、调用外部能力、解析结果并返回新增字段。
//! 重试、超时、指标与错误收口都不在这一层，由 ManagedAgent 负责。

use async_trait::async_trait;

use crate::core::{AgentConfig, AgentError, WorkflowState};

/// Agent 对输入状态的约定：必填字段缺失时不调用外部能力，直接跳过
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateContract {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl StateContract {
    pub const fn new(required: &'static [&'static str], optional: &'static [&'static str]) -> Self {
        Self { required, optional }
    }

    /// 返回缺失（或为空）的必填字段
    pub fn missing(&self, state: &WorkflowState) -> Vec<&'static str> {
        self.required
            .iter()
            .copied()
            .filter(|key| !state.has_value(key))
            .collect()
    }
}

/// 跳过原因文案，契约检查与执行期发现缺失共用
pub fn skip_reason(fields: &[&str]) -> String {
    format!("missing required field(s): {}", fields.join(", "))
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// snake_case 标识，同时是状态标记字段的前缀
    fn key(&self) -> &str;

    /// 展示名，写入错误标记与指标报告
    fn name(&self) -> &str;

    fn contract(&self) -> StateContract;

    /// 只返回本 Agent 产出的字段；输入合并由调用方完成
    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError>;

    /// 契约检查 + 执行 + 合并。必填字段缺失时返回带跳过标记的输入状态，不调用外部能力
    async fn run(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let missing = self.contract().missing(state);
        if !missing.is_empty() {
            let mut skipped = state.clone();
            skipped.mark_skipped(self.key(), &skip_reason(&missing));
            return Ok(skipped);
        }
        let output = self.execute(state, config).await?;
        Ok(state.merged(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Agent for Echo {
        fn key(&self) -> &str {
            "echo"
        }

        fn name(&self) -> &str {
            "Echo Agent"
        }

        fn contract(&self) -> StateContract {
            StateContract::new(&["topic"], &["platforms"])
        }

        async fn execute(
            &self,
            state: &WorkflowState,
            _config: &AgentConfig,
        ) -> Result<WorkflowState, AgentError> {
            let topic = state.get_text("topic").unwrap_or_default();
            Ok(WorkflowState::new().with("echo", format!("echo: {topic}")))
        }
    }

    #[test]
    fn test_contract_reports_missing_and_blank() {
        let contract = StateContract::new(&["topic", "content"], &[]);
        let state = WorkflowState::new().with("topic", "").with("other", 1.0);
        assert_eq!(contract.missing(&state), vec!["topic", "content"]);
    }

    #[tokio::test]
    async fn test_run_merges_output_over_input() {
        let state = WorkflowState::new().with("topic", "AI").with("budget", 500.0);
        let out = Echo.run(&state, &AgentConfig::default()).await.unwrap();
        assert_eq!(out.get_text("echo"), Some("echo: AI"));
        assert_eq!(out.get_number("budget"), Some(500.0));
    }

    #[tokio::test]
    async fn test_run_skips_without_required_input() {
        let out = Echo
            .run(&WorkflowState::new(), &AgentConfig::default())
            .await
            .unwrap();
        assert!(out.was_skipped("echo"));
        assert_eq!(out.skipped_steps(), vec!["echo".to_string()]);
        assert!(!out.contains("echo"));
    }
}

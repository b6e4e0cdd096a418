//! 流水线构建器
//!
//! 提供流畅的 API 来定义按顺序执行的 Agent 流水线

use serde::{Deserialize, Serialize};

use crate::workflow::types::WorkflowError;

/// 非空、有序的 Agent key 列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    name: String,
    steps: Vec<String>,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        steps: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, WorkflowError> {
        let steps: Vec<String> = steps.into_iter().map(Into::into).collect();
        if steps.is_empty() {
            return Err(WorkflowError::EmptyPipeline);
        }
        if let Some(blank) = steps.iter().find(|s| s.trim().is_empty()) {
            return Err(WorkflowError::InvalidConfiguration(format!(
                "blank step name {blank:?}"
            )));
        }
        Ok(Self {
            name: name.into(),
            steps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }
}

/// 流水线构建器
pub struct PipelineBuilder {
    name: String,
    steps: Vec<String>,
}

impl PipelineBuilder {
    /// 创建新的流水线构建器
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// 追加一个步骤
    pub fn step(mut self, agent_key: impl Into<String>) -> Self {
        self.steps.push(agent_key.into());
        self
    }

    /// 追加多个步骤
    pub fn steps(mut self, agent_keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.steps.extend(agent_keys.into_iter().map(Into::into));
        self
    }

    /// 构建流水线；没有步骤时返回 EmptyPipeline
    pub fn build(self) -> Result<Pipeline, WorkflowError> {
        Pipeline::new(self.name, self.steps)
    }
}

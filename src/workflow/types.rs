//! 工作流类型定义
//!
//! 运行记录（WorkflowRecord）、阶段记录、汇总、活动请求与工作流错误。
//! 记录一旦写入历史即以 Arc 共享，不提供任何修改接口。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{AgentMetricsReport, RunOutcome, WorkflowState};

pub type WorkflowId = String;

/// 工作流终态；记录只在运行结束后写入历史
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// 已完成（允许部分 Agent 失败）
    Completed,
    /// 编排本身失败（未知步骤、空流水线、结果汇总失败）
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// 六阶段营销活动
    Campaign,
    /// 按 key 顺序执行的流水线
    Pipeline,
}

/// 单个阶段的执行记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output: WorkflowState,
    /// 本阶段涉及的 Agent 在阶段结束时的指标
    pub metrics: Vec<AgentMetricsReport>,
    pub succeeded: bool,
}

impl PhaseRecord {
    /// 阶段成功：本阶段至少运行了一次，且每次运行的终态都是 Completed。
    /// 只看本阶段自己的运行结果，输入状态里已有的标记不影响判断
    pub fn succeeded_from(outcomes: &[RunOutcome]) -> bool {
        !outcomes.is_empty() && outcomes.iter().all(|o| *o == RunOutcome::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub total_phases: usize,
    pub successful_phases: usize,
    pub success_rate: f64,
    pub content_pieces_created: usize,
    pub content_pieces_planned: usize,
    pub visuals_created: usize,
}

/// 一次运行的完整记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub workflow_id: WorkflowId,
    pub kind: WorkflowKind,
    pub status: WorkflowStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub phases: Vec<PhaseRecord>,
    pub summary: Option<WorkflowSummary>,
    pub final_state: WorkflowState,
    pub error: Option<String>,
}

impl WorkflowRecord {
    /// 编排失败时的记录：无阶段、无汇总，只带错误信息
    pub fn failed(
        workflow_id: WorkflowId,
        kind: WorkflowKind,
        started_at: DateTime<Utc>,
        final_state: WorkflowState,
        error: &WorkflowError,
    ) -> Self {
        let finished_at = Utc::now();
        Self {
            workflow_id,
            kind,
            status: WorkflowStatus::Failed,
            started_at,
            finished_at,
            duration_seconds: seconds_between(started_at, finished_at),
            phases: Vec::new(),
            summary: None,
            final_state,
            error: Some(error.to_string()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseRecord> {
        self.phases.iter().find(|p| p.name == name)
    }
}

pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}

pub fn new_workflow_id() -> WorkflowId {
    format!("wf_{}", uuid::Uuid::new_v4())
}

/// 活动请求：主题必填，其余字段有默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignRequest {
    pub topic: String,
    pub target_audience: String,
    pub content_goals: Vec<String>,
    pub platforms: Vec<String>,
    /// 活动天数
    pub duration: u32,
    pub budget: f64,
}

impl Default for CampaignRequest {
    fn default() -> Self {
        Self {
            topic: String::new(),
            target_audience: "general".to_string(),
            content_goals: vec!["engagement".to_string()],
            platforms: vec!["instagram".to_string(), "facebook".to_string()],
            duration: 30,
            budget: 1000.0,
        }
    }
}

impl CampaignRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn target_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = audience.into();
        self
    }

    pub fn content_goals(mut self, goals: Vec<String>) -> Self {
        self.content_goals = goals;
        self
    }

    pub fn platforms(mut self, platforms: Vec<String>) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn duration(mut self, days: u32) -> Self {
        self.duration = days;
        self
    }

    pub fn budget(mut self, budget: f64) -> Self {
        self.budget = budget;
        self
    }

    /// 活动的初始状态
    pub fn initial_state(&self, workflow_id: &str, start_time: DateTime<Utc>) -> WorkflowState {
        WorkflowState::new()
            .with("workflow_id", workflow_id)
            .with("start_time", start_time)
            .with("topic", self.topic.as_str())
            .with("target_audience", self.target_audience.as_str())
            .with("content_goals", self.content_goals.clone())
            .with("platforms", self.platforms.clone())
            .with("duration", f64::from(self.duration))
            .with("budget", self.budget)
    }
}

/// 工作流错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),
    #[error("Pipeline has no steps")]
    EmptyPipeline,
    #[error("Invalid workflow configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Result compilation failed: {0}")]
    Compilation(String),
}

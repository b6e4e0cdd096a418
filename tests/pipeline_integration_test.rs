//! 流水线集成测试：顺序执行、跳过、错误收口与历史

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use muse::config::AppConfig;
use muse::core::{Agent, AgentConfig, AgentError, Orchestrator, StateContract, WorkflowState};
use muse::llm::LlmError;
use muse::workflow::{Pipeline, PipelineBuilder, WorkflowStatus};

/// 固定输出的桩 Agent，记录 execute 被调用的次数
struct StubAgent {
    key: &'static str,
    contract: StateContract,
    output: WorkflowState,
    calls: AtomicU32,
}

impl StubAgent {
    fn new(key: &'static str, required: &'static [&'static str], output: WorkflowState) -> Arc<Self> {
        Arc::new(Self {
            key,
            contract: StateContract::new(required, &[]),
            output,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn key(&self) -> &str {
        self.key
    }

    fn name(&self) -> &str {
        self.key
    }

    fn contract(&self) -> StateContract {
        self.contract
    }

    async fn execute(&self, _state: &WorkflowState, _config: &AgentConfig) -> Result<WorkflowState, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// 每次都失败的 Agent
struct BrokenAgent;

#[async_trait]
impl Agent for BrokenAgent {
    fn key(&self) -> &str {
        "broken"
    }

    fn name(&self) -> &str {
        "Broken Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(&[], &[])
    }

    async fn execute(&self, _state: &WorkflowState, _config: &AgentConfig) -> Result<WorkflowState, AgentError> {
        Err(LlmError::Network("connection refused".into()).into())
    }
}

/// 第一次调用失败，之后每次都成功
struct FlakyAgent {
    calls: AtomicU32,
}

#[async_trait]
impl Agent for FlakyAgent {
    fn key(&self) -> &str {
        "flaky"
    }

    fn name(&self) -> &str {
        "Flaky Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(&[], &[])
    }

    async fn execute(&self, _state: &WorkflowState, _config: &AgentConfig) -> Result<WorkflowState, AgentError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(LlmError::Network("connection reset".into()).into());
        }
        Ok(WorkflowState::new().with("flaky_output", "recovered"))
    }
}

fn flaky() -> Arc<FlakyAgent> {
    Arc::new(FlakyAgent {
        calls: AtomicU32::new(0),
    })
}

fn fast() -> AgentConfig {
    AgentConfig {
        retry_count: 1,
        retry_delay_secs: 0.0,
        timeout_secs: 1.0,
        ..AgentConfig::default()
    }
}

fn trend_stub() -> Arc<StubAgent> {
    StubAgent::new(
        "trend_analysis",
        &["topic"],
        WorkflowState::new().with("trend_analysis_report", "eco trends rising"),
    )
}

fn strategy_stub() -> Arc<StubAgent> {
    StubAgent::new(
        "content_strategy",
        &["trend_analysis_report"],
        WorkflowState::new().with("ideas", vec!["idea1".to_string(), "idea2".to_string()]),
    )
}

#[tokio::test]
async fn test_two_stage_pipeline_final_state() {
    let orchestrator = Orchestrator::builder(AppConfig::default())
        .with_agent_config(trend_stub(), fast())
        .with_agent_config(strategy_stub(), fast())
        .build();
    let pipeline = PipelineBuilder::new("trend-to-strategy")
        .step("trend_analysis")
        .step("content_strategy")
        .build()
        .unwrap();

    let record = orchestrator
        .run_pipeline(&pipeline, WorkflowState::new().with("topic", "Sustainable Fashion"))
        .await;

    assert_eq!(record.status, WorkflowStatus::Completed);
    assert_eq!(
        record.final_state.to_json(),
        serde_json::json!({
            "topic": "Sustainable Fashion",
            "trend_analysis_report": "eco trends rising",
            "ideas": ["idea1", "idea2"]
        })
    );
    let summary = record.summary.as_ref().unwrap();
    assert_eq!(summary.total_phases, 2);
    assert_eq!(summary.success_rate, 1.0);
}

#[tokio::test]
async fn test_empty_state_is_skipped_without_call() {
    let trend = trend_stub();
    let orchestrator = Orchestrator::builder(AppConfig::default())
        .with_agent_config(trend.clone(), fast())
        .build();

    let out = orchestrator
        .execute_single_phase("trend_analysis", WorkflowState::new())
        .await
        .unwrap();

    assert_eq!(trend.calls.load(Ordering::SeqCst), 0);
    assert!(out.was_skipped("trend_analysis"));
    assert!(!out.has_error());
    assert_eq!(out.skipped_steps(), vec!["trend_analysis".to_string()]);
    let metrics = orchestrator.get_agent_metrics();
    assert_eq!(metrics["trend_analysis"].metrics.total_calls, 0);
}

#[tokio::test]
async fn test_failing_phase_is_contained() {
    let orchestrator = Orchestrator::builder(AppConfig::default())
        .with_agent_config(Arc::new(BrokenAgent), fast())
        .with_agent_config(trend_stub(), fast())
        .build();
    let pipeline = Pipeline::new("contained", ["broken", "trend_analysis"]).unwrap();

    let record = orchestrator
        .run_pipeline(&pipeline, WorkflowState::new().with("topic", "AI"))
        .await;

    assert_eq!(record.status, WorkflowStatus::Completed);
    assert!(record.final_state.has_error());
    assert_eq!(record.final_state.get_text("trend_analysis_report"), Some("eco trends rising"));
    let summary = record.summary.as_ref().unwrap();
    assert_eq!(summary.successful_phases, 1);
    assert!(summary.success_rate < 1.0);
    assert!(!record.phase("broken").unwrap().succeeded);
    assert!(record.phase("trend_analysis").unwrap().succeeded);

    let broken = &orchestrator.get_agent_metrics()["broken"].metrics;
    assert_eq!(broken.total_attempts, 2);
    assert_eq!(broken.error_count, 1);
}

#[tokio::test]
async fn test_unknown_step_fails_before_running_anything() {
    let trend = trend_stub();
    let orchestrator = Orchestrator::builder(AppConfig::default())
        .with_agent_config(trend.clone(), fast())
        .build();
    let pipeline = Pipeline::new("bad", ["trend_analysis", "does_not_exist"]).unwrap();

    let record = orchestrator
        .run_pipeline(&pipeline, WorkflowState::new().with("topic", "AI"))
        .await;

    assert_eq!(record.status, WorkflowStatus::Failed);
    assert!(record.error.as_deref().unwrap().contains("does_not_exist"));
    assert!(record.summary.is_none());
    assert_eq!(trend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_key_disappears_across_agents() {
    let orchestrator = Orchestrator::builder(AppConfig::default())
        .with_agent_config(trend_stub(), fast())
        .with_agent_config(strategy_stub(), fast())
        .with_agent_config(Arc::new(BrokenAgent), fast())
        .build();
    let start = WorkflowState::new()
        .with("topic", "AI")
        .with("budget", 500.0)
        .with("ideas", vec!["old".to_string()]);

    for key in ["trend_analysis", "content_strategy", "broken"] {
        let out = orchestrator.execute_single_phase(key, start.clone()).await.unwrap();
        for existing in start.keys() {
            assert!(out.contains(existing), "{key} dropped {existing}");
        }
    }
}

#[tokio::test]
async fn test_history_is_append_only_in_order() {
    let orchestrator = Orchestrator::builder(AppConfig::default())
        .with_agent_config(trend_stub(), fast())
        .build();
    let pipeline = Pipeline::new("trend", ["trend_analysis"]).unwrap();

    let mut ids = Vec::new();
    for topic in ["a", "b", "c"] {
        let record = orchestrator
            .run_pipeline(&pipeline, WorkflowState::new().with("topic", topic))
            .await;
        ids.push(record.workflow_id.clone());
    }
    let first = orchestrator.get_workflow_history(3)[0].clone();

    orchestrator
        .run_pipeline(&pipeline, WorkflowState::new().with("topic", "d"))
        .await;

    let history = orchestrator.get_workflow_history(3);
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].workflow_id, ids[1]);
    assert_eq!(history[1].workflow_id, ids[2]);
    assert_eq!(orchestrator.get_workflow_history(10).len(), 4);
    assert_eq!(orchestrator.get_workflow_history(10)[0].workflow_id, first.workflow_id);
    assert_eq!(first.final_state.get_text("topic"), Some("a"));

    let status = orchestrator.get_system_status();
    assert_eq!(status.total_workflows, 4);
    assert_eq!(status.last_workflow.as_deref(), Some(history[2].workflow_id.as_str()));
}

#[tokio::test]
async fn test_repeated_step_success_is_judged_per_run() {
    let no_retry = AgentConfig {
        retry_count: 0,
        ..fast()
    };
    let orchestrator = Orchestrator::builder(AppConfig::default())
        .with_agent_config(flaky(), no_retry)
        .build();
    let pipeline = Pipeline::new("twice", ["flaky", "flaky"]).unwrap();

    let record = orchestrator.run_pipeline(&pipeline, WorkflowState::new()).await;

    assert!(!record.phases[0].succeeded);
    assert!(record.phases[1].succeeded);
    // 第一步的错误标记保留在累积状态里，但不算到第二步头上
    assert!(record.final_state.contains("flaky_error"));
    assert_eq!(record.final_state.get_text("flaky_output"), Some("recovered"));
    assert_eq!(record.summary.as_ref().unwrap().successful_phases, 1);
}

#[tokio::test]
async fn test_markers_in_initial_state_do_not_fail_phases() {
    let orchestrator = Orchestrator::builder(AppConfig::default())
        .with_agent_config(trend_stub(), fast())
        .build();
    let mut initial = WorkflowState::new().with("topic", "AI");
    initial.mark_error("trend_analysis", "Trend Analysis Agent", "earlier run failed");
    initial.mark_skipped("trend_analysis", "missing required field(s): topic");
    let pipeline = Pipeline::new("rerun", ["trend_analysis"]).unwrap();

    let record = orchestrator.run_pipeline(&pipeline, initial).await;

    assert!(record.phase("trend_analysis").unwrap().succeeded);
    assert_eq!(record.summary.as_ref().unwrap().success_rate, 1.0);
}

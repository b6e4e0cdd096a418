//! Agent 执行包装器
//!
//! ManagedAgent 持有一个 Agent 及其配置与指标，对每次运行施加：
//! 契约检查、单次尝试超时、线性退避重试、指标更新、结构化日志（含 JSON 审计），
//! 以及错误收口：`run` 永不返回错误，终态失败以 `error` 字段写回状态。

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};

use crate::core::agent::skip_reason;
use crate::core::{Agent, AgentError, RecoveryAction, RecoveryEngine, WorkflowState};
use crate::llm::{GenerationRequest, GROQ_DEFAULT_MODEL};

/// 单个 Agent 的调用参数；运行开始时取快照，运行中修改不影响本次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: f64,
    pub retry_count: u32,
    pub retry_delay_secs: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: GROQ_DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 30.0,
            retry_count: 3,
            retry_delay_secs: 1.0,
        }
    }
}

impl AgentConfig {
    /// 拒绝非有限或为负的时长参数
    pub fn validate(&self) -> Result<(), AgentError> {
        for (field, value) in [
            ("timeout_secs", self.timeout_secs),
            ("retry_delay_secs", self.retry_delay_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AgentError::Configuration(format!(
                    "{field} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        secs(self.retry_delay_secs)
    }

    /// 第 attempt 次失败后的等待时长：retry_delay * attempt（溢出时饱和）
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay()
            .checked_mul(attempt)
            .unwrap_or(Duration::MAX)
    }

    /// 以本配置的模型参数构造一次生成请求
    pub fn request(&self, prompt: impl Into<String>) -> GenerationRequest {
        GenerationRequest::new(prompt, self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

/// 负数与 NaN 取零，超出范围取 Duration::MAX
fn secs(value: f64) -> Duration {
    if value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// 运行指标。total_calls 只统计到达外部能力的运行（每次运行计一次，不论重试几次），
/// 每次尝试计入 total_attempts；跳过只计入 skipped_count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub total_calls: u64,
    pub error_count: u64,
    pub success_rate: f64,
    /// 最近一次运行中最后一次尝试的耗时（秒），不含此前的重试与退避
    pub execution_time_secs: f64,
    pub last_execution: Option<DateTime<Utc>>,
    pub total_attempts: u64,
    pub skipped_count: u64,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            total_calls: 0,
            error_count: 0,
            success_rate: 1.0,
            execution_time_secs: 0.0,
            last_execution: None,
            total_attempts: 0,
            skipped_count: 0,
        }
    }
}

impl AgentMetrics {
    fn record_call(&mut self, ok: bool, attempts: u32, elapsed: Duration) {
        self.total_calls += 1;
        if !ok {
            self.error_count += 1;
        }
        self.total_attempts += u64::from(attempts);
        self.success_rate =
            (self.total_calls - self.error_count) as f64 / self.total_calls as f64;
        self.execution_time_secs = elapsed.as_secs_f64();
        self.last_execution = Some(Utc::now());
    }

    fn record_skip(&mut self, attempts: u32) {
        self.skipped_count += 1;
        self.total_attempts += u64::from(attempts);
    }
}

/// 指标报告：指标 + Agent 名称 + 当前配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetricsReport {
    pub agent_name: String,
    pub key: String,
    pub metrics: AgentMetrics,
    pub config: AgentConfig,
}

/// 一次运行的终态，供阶段记录判断成败
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Skipped,
    Failed,
}

enum Outcome {
    Completed(WorkflowState),
    Skipped(String),
    Failed(AgentError),
}

/// 带超时、重试、指标与错误收口的 Agent 运行器
pub struct ManagedAgent {
    agent: Arc<dyn Agent>,
    config: RwLock<AgentConfig>,
    metrics: Mutex<AgentMetrics>,
    recovery: RecoveryEngine,
}

impl ManagedAgent {
    pub fn new(agent: Arc<dyn Agent>, config: AgentConfig) -> Self {
        Self {
            agent,
            config: RwLock::new(config),
            metrics: Mutex::new(AgentMetrics::default()),
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn key(&self) -> &str {
        self.agent.key()
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    /// 当前配置快照
    pub fn config(&self) -> AgentConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 替换配置；已在运行中的调用继续使用旧快照
    pub fn update_config(&self, config: AgentConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn metrics(&self) -> AgentMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn metrics_report(&self) -> AgentMetricsReport {
        AgentMetricsReport {
            agent_name: self.name().to_string(),
            key: self.key().to_string(),
            metrics: self.metrics(),
            config: self.config(),
        }
    }

    /// 运行一次；永不失败。终态失败时返回输入状态 + `error` + `<key>_error`
    pub async fn run(&self, state: &WorkflowState) -> WorkflowState {
        self.run_with_outcome(state).await.0
    }

    /// 与 run 相同，并报告本次运行的终态
    pub async fn run_with_outcome(&self, state: &WorkflowState) -> (WorkflowState, RunOutcome) {
        match self.try_run_outcome(state).await {
            Ok(done) => done,
            Err(err) => {
                let mut failed = state.clone();
                failed.mark_error(self.key(), self.name(), &err.to_string());
                (failed, RunOutcome::Failed)
            }
        }
    }

    /// 与 run 相同的执行流程与指标，但把终态错误原样返回给调用方
    pub async fn try_run(&self, state: &WorkflowState) -> Result<WorkflowState, AgentError> {
        self.try_run_outcome(state).await.map(|(next, _)| next)
    }

    /// Ok 时终态为 Completed 或 Skipped；失败以 Err 返回
    pub async fn try_run_outcome(
        &self,
        state: &WorkflowState,
    ) -> Result<(WorkflowState, RunOutcome), AgentError> {
        let config = self.config();
        let key = self.key();

        if let Err(err) = config.validate() {
            tracing::error!(agent = %key, error = %err, "agent config rejected");
            return Err(err);
        }

        let contract = self.agent.contract();
        let missing = contract.missing(state);
        if !missing.is_empty() {
            let reason = skip_reason(&missing);
            tracing::info!(agent = %key, reason = %reason, "agent run skipped");
            self.lock_metrics().record_skip(0);
            return Ok((self.skipped(state, &reason), RunOutcome::Skipped));
        }

        let state_keys: Vec<&str> = state.keys().collect();
        let optional_present: Vec<&str> = contract
            .optional
            .iter()
            .copied()
            .filter(|field| state.has_value(field))
            .collect();
        tracing::info!(
            agent = %key,
            state_keys = ?state_keys,
            optional_present = ?optional_present,
            "agent run started"
        );

        let start = Instant::now();
        let (outcome, attempts, last_attempt) = self.attempt_loop(state, &config).await;
        let elapsed = start.elapsed();

        let (ok, label) = match &outcome {
            Outcome::Completed(_) => (true, "ok"),
            Outcome::Skipped(_) => (true, "skipped"),
            Outcome::Failed(AgentError::Timeout { .. }) => (false, "timeout"),
            Outcome::Failed(_) => (false, "error"),
        };
        let audit = serde_json::json!({
            "event": "agent_audit",
            "agent": key,
            "ok": ok,
            "outcome": label,
            "attempts": attempts,
            "duration_ms": elapsed.as_millis() as u64,
            "last_attempt_ms": last_attempt.as_millis() as u64,
        });
        tracing::info!(audit = %audit.to_string(), "agent");

        match outcome {
            Outcome::Completed(next) => {
                self.lock_metrics().record_call(true, attempts, last_attempt);
                tracing::info!(
                    agent = %key,
                    attempts,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "agent run completed"
                );
                Ok((next, RunOutcome::Completed))
            }
            Outcome::Skipped(reason) => {
                self.lock_metrics().record_skip(attempts);
                tracing::info!(agent = %key, reason = %reason, "agent run skipped");
                Ok((self.skipped(state, &reason), RunOutcome::Skipped))
            }
            Outcome::Failed(err) => {
                self.lock_metrics().record_call(false, attempts, last_attempt);
                tracing::error!(agent = %key, attempts, error = %err, "agent run failed");
                Err(err)
            }
        }
    }

    /// 返回终态、尝试次数与最后一次尝试的耗时
    async fn attempt_loop(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> (Outcome, u32, Duration) {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let result = match timeout(config.timeout(), self.agent.execute(state, config)).await {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout {
                    agent: self.key().to_string(),
                    timeout_secs: config.timeout_secs,
                }),
            };
            let took = started.elapsed();

            let err = match result {
                Ok(output) => return (Outcome::Completed(state.merged(&output)), attempt, took),
                Err(err) => err,
            };

            match self.recovery.handle(&err, attempt, config) {
                RecoveryAction::Retry(delay) => {
                    tracing::warn!(
                        agent = %self.key(),
                        attempt,
                        kind = err.kind(),
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "agent attempt failed, retrying"
                    );
                    sleep(delay).await;
                }
                RecoveryAction::Skip(field) => {
                    return (Outcome::Skipped(skip_reason(&[field.as_str()])), attempt, took)
                }
                RecoveryAction::Abort => return (Outcome::Failed(err), attempt, took),
            }
        }
    }

    fn skipped(&self, state: &WorkflowState, reason: &str) -> WorkflowState {
        let mut next = state.clone();
        next.mark_skipped(self.key(), reason);
        next
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, AgentMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! 工作流引擎
//!
//! 顺序执行：先校验所有步骤都已注册，再在累积状态上逐个运行 Agent。
//! 批处理：同一阶段的子任务经 BatchScheduler 限流后并发执行，结果保持输入顺序。

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;

use crate::core::{AgentRegistry, BatchScheduler, ManagedAgent, WorkflowState};
use crate::workflow::builder::Pipeline;
use crate::workflow::types::{PhaseRecord, WorkflowError};

/// 按 key 取出全部 Agent；任一缺失即失败，此时不会运行任何 Agent
pub fn resolve_agents<S: AsRef<str>>(
    registry: &AgentRegistry,
    keys: &[S],
) -> Result<Vec<Arc<ManagedAgent>>, WorkflowError> {
    keys.iter()
        .map(|key| {
            registry
                .get(key.as_ref())
                .ok_or_else(|| WorkflowError::AgentNotFound(key.as_ref().to_string()))
        })
        .collect()
}

/// 运行一个单 Agent 阶段并生成阶段记录
pub async fn run_phase(
    name: &str,
    agent: &ManagedAgent,
    input: &WorkflowState,
) -> (WorkflowState, PhaseRecord) {
    let started_at = Utc::now();
    tracing::info!(phase = name, agent = agent.key(), "phase started");
    let (output, outcome) = agent.run_with_outcome(input).await;
    let succeeded = PhaseRecord::succeeded_from(&[outcome]);
    tracing::info!(phase = name, succeeded, "phase finished");

    let record = PhaseRecord {
        name: name.to_string(),
        started_at,
        finished_at: Utc::now(),
        output: output.clone(),
        metrics: vec![agent.metrics_report()],
        succeeded,
    };
    (output, record)
}

/// 顺序执行流水线，返回累积状态与每一步的阶段记录
pub async fn run_sequential(
    registry: &AgentRegistry,
    pipeline: &Pipeline,
    initial: WorkflowState,
) -> Result<(WorkflowState, Vec<PhaseRecord>), WorkflowError> {
    let agents = resolve_agents(registry, pipeline.steps())?;

    let mut state = initial;
    let mut phases = Vec::with_capacity(agents.len());
    for agent in agents {
        let (next, record) = run_phase(agent.key(), &agent, &state).await;
        phases.push(record);
        state = next;
    }
    Ok((state, phases))
}

/// 并发执行一批子任务（受调度器并发上限约束），结果与输入顺序一致
pub async fn run_batch<I, F, Fut, R>(scheduler: &BatchScheduler, items: I, task: F) -> Vec<R>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = R>,
{
    join_all(items.into_iter().map(|item| scheduler.run(task(item)))).await
}

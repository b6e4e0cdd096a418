//! 核心编排层：Agent 契约、执行包装、状态、恢复策略、批处理调度与编排器

pub mod agent;
pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod registry;
pub mod runner;
pub mod state;
pub mod task_scheduler;

pub use agent::{Agent, StateContract};
pub use builder::OrchestratorBuilder;
pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{create_generators_from_config, Orchestrator, SystemHealth, SystemStatus};
pub use recovery::RecoveryEngine;
pub use registry::AgentRegistry;
pub use runner::{AgentConfig, AgentMetrics, AgentMetricsReport, ManagedAgent, RunOutcome};
pub use state::{Value, WorkflowState};
pub use task_scheduler::BatchScheduler;

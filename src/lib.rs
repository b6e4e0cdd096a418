//! Muse - 营销内容智能体流水线
//!
//! 模块划分：
//! - **agents**: 七个营销 Agent（趋势、策略、文案、视觉建议、图像、社媒、简报）、三个顾问 Agent、
//!   可选的内容分析 Agent 与输出解析
//! - **cli**: 命令行参数
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: Agent 契约、执行包装（超时/重试/指标）、状态、注册表与编排器
//! - **llm**: 文本/图像生成能力抽象与实现（OpenAI 兼容 / Groq / Mock）
//! - **memory**: 活动、创意、草稿与平台改写稿的 SQLite 持久化，同类活动表现检索
//! - **observability**: tracing 初始化
//! - **workflow**: 流水线、六阶段活动、运行记录与历史

pub mod agents;
pub mod cli;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod workflow;

pub use crate::core::{Orchestrator, OrchestratorBuilder, WorkflowState};
pub use workflow::{CampaignRequest, Pipeline, PipelineBuilder, WorkflowRecord, WorkflowStatus};

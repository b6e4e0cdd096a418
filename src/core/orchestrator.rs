//! 编排器：持有 Agent 注册表、运行历史与可选的活动存储
//!
//! 对外入口：六阶段活动 `execute_workflow`、顺序流水线 `run_pipeline`、单阶段 `execute_single_phase`，
//! 以及历史、指标、token 用量与系统状态查询，和可选的内容表现分析。编排失败（未知步骤、汇总失败）只体现在记录的 Failed 状态上，
//! 单个 Agent 的失败由包装器收口，不会让活动中断。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::CONTENT_ANALYTICS;
use crate::config::{AppConfig, WorkflowSection};
use crate::core::{
    AgentError, AgentMetricsReport, AgentRegistry, BatchScheduler, ManagedAgent,
    OrchestratorBuilder, WorkflowState,
};
use crate::llm::{
    create_groq_client, ImageGenerator, MockImageGenerator, MockTextGenerator, OpenAiClient,
    OpenAiImageClient, TextGenerator, TokenUsage, GROQ_API_KEY_ENV, OPENAI_BASE_URL,
};
use crate::memory::persistence::strip_numbering;
use crate::memory::{CampaignHistory, CampaignStore, StoreError};
use crate::workflow::engine::run_sequential;
use crate::workflow::{
    compile_summary, new_workflow_id, CampaignRequest, CampaignRunner, Pipeline, PhaseRecord,
    WorkflowError, WorkflowHistory, WorkflowKind, WorkflowRecord, WorkflowStatus,
};

const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemHealth {
    Healthy,
    Degraded,
}

/// 系统状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub agents_initialized: usize,
    pub total_workflows: usize,
    pub last_workflow: Option<String>,
    pub agent_metrics: BTreeMap<String, AgentMetricsReport>,
    pub system_health: SystemHealth,
    pub memory_enabled: bool,
    /// 文本生成能力的累计用量；未登记文本生成能力时为全零
    pub token_usage: TokenUsage,
}

pub struct Orchestrator {
    registry: AgentRegistry,
    history: WorkflowHistory,
    store: Option<Arc<dyn CampaignStore>>,
    text: Option<Arc<dyn TextGenerator>>,
    scheduler: BatchScheduler,
    settings: WorkflowSection,
}

fn api_key(env_override: Option<&str>, default_env: &str) -> Result<String, AgentError> {
    let name = env_override.unwrap_or(default_env);
    std::env::var(name)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AgentError::Configuration(format!("{name} is not set")))
}

/// 按配置创建文本与图像生成能力；缺少 API Key 或后端未知属于配置错误
pub fn create_generators_from_config(
    cfg: &AppConfig,
) -> Result<(Arc<dyn TextGenerator>, Arc<dyn ImageGenerator>), AgentError> {
    let text: Arc<dyn TextGenerator> = match cfg.llm.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::warn!("Using mock text generator");
            Arc::new(MockTextGenerator::new())
        }
        "groq" => {
            let key = api_key(cfg.llm.api_key_env.as_deref(), GROQ_API_KEY_ENV)?;
            tracing::info!("Using Groq text generator");
            Arc::new(create_groq_client(&key, cfg.llm.base_url.as_deref()))
        }
        "openai" => {
            let key = api_key(cfg.llm.api_key_env.as_deref(), OPENAI_API_KEY_ENV)?;
            tracing::info!("Using OpenAI text generator");
            let base = cfg.llm.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
            Arc::new(OpenAiClient::new(Some(base), &key))
        }
        other => {
            return Err(AgentError::Configuration(format!(
                "unknown llm provider '{other}'"
            )))
        }
    };

    let image: Arc<dyn ImageGenerator> = match cfg.image.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::warn!("Using mock image generator");
            Arc::new(MockImageGenerator::default())
        }
        "openai" => {
            let key = api_key(cfg.image.api_key_env.as_deref(), OPENAI_API_KEY_ENV)?;
            tracing::info!(model = %cfg.image.model, "Using OpenAI image generator");
            Arc::new(OpenAiImageClient::new(
                cfg.image.base_url.as_deref(),
                &key,
                &cfg.image.model,
            ))
        }
        other => {
            return Err(AgentError::Configuration(format!(
                "unknown image provider '{other}'"
            )))
        }
    };

    Ok((text, image))
}

impl Orchestrator {
    pub(crate) fn from_parts(
        registry: AgentRegistry,
        history: WorkflowHistory,
        store: Option<Arc<dyn CampaignStore>>,
        text: Option<Arc<dyn TextGenerator>>,
        scheduler: BatchScheduler,
        settings: WorkflowSection,
    ) -> Self {
        Self {
            registry,
            history,
            store,
            text,
            scheduler,
            settings,
        }
    }

    pub fn builder(config: AppConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// 按配置创建生成能力、注册全部 Agent、打开存储（失败则降级）
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        cfg.agents.validate()?;
        let (text, image) = create_generators_from_config(cfg)?;
        let mut builder = OrchestratorBuilder::new(cfg.clone()).with_default_agents(text, image);
        if cfg.storage.enabled {
            builder = builder.with_store_path(&cfg.storage.path);
        }
        Ok(builder.build())
    }

    /// 只读编排器：不创建生成能力、不注册 Agent，只打开存储；查询类命令无需 API Key
    pub fn read_only(cfg: &AppConfig) -> Self {
        let mut config = cfg.clone();
        config.analytics.enabled = false;
        let mut builder = OrchestratorBuilder::new(config);
        if cfg.storage.enabled {
            builder = builder.with_store_path(&cfg.storage.path);
        }
        builder.build()
    }

    pub fn agent(&self, key: &str) -> Option<Arc<ManagedAgent>> {
        self.registry.get(key)
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// 执行六阶段营销活动；总是返回一条记录（Completed 或 Failed）并写入历史
    pub async fn execute_workflow(&self, request: CampaignRequest) -> Arc<WorkflowRecord> {
        let workflow_id = new_workflow_id();
        let started_at = Utc::now();
        let initial = request.initial_state(&workflow_id, started_at);
        tracing::info!(
            workflow_id = %workflow_id,
            kind = "campaign",
            topic = %request.topic,
            status = "running",
            "workflow started"
        );

        let runner = CampaignRunner::new(&self.registry, &self.scheduler, &self.settings);
        let record = match runner.run(initial.clone()).await {
            Ok(outcome) => compile(
                workflow_id,
                WorkflowKind::Campaign,
                started_at,
                outcome.phases,
                outcome.final_state,
            ),
            Err(e) => WorkflowRecord::failed(workflow_id, WorkflowKind::Campaign, started_at, initial, &e),
        };

        if record.is_completed() {
            self.persist_campaign(&request.topic, &record.final_state).await;
        }
        self.finish(record)
    }

    /// 按顺序执行流水线；任一步骤未注册时不运行任何 Agent，记录为 Failed
    pub async fn run_pipeline(&self, pipeline: &Pipeline, initial: WorkflowState) -> Arc<WorkflowRecord> {
        let workflow_id = new_workflow_id();
        let started_at = Utc::now();
        tracing::info!(
            workflow_id = %workflow_id,
            kind = "pipeline",
            pipeline = pipeline.name(),
            steps = ?pipeline.steps(),
            status = "running",
            "workflow started"
        );

        let record = match run_sequential(&self.registry, pipeline, initial.clone()).await {
            Ok((state, phases)) => compile(workflow_id, WorkflowKind::Pipeline, started_at, phases, state),
            Err(e) => WorkflowRecord::failed(workflow_id, WorkflowKind::Pipeline, started_at, initial, &e),
        };
        self.finish(record)
    }

    /// 由 key 列表直接执行流水线；空列表或空白 key 同样得到 Failed 记录
    pub async fn run_steps<S: AsRef<str>>(&self, steps: &[S], initial: WorkflowState) -> Arc<WorkflowRecord> {
        match Pipeline::new("adhoc", steps.iter().map(|s| s.as_ref().to_string())) {
            Ok(pipeline) => self.run_pipeline(&pipeline, initial).await,
            Err(e) => {
                let record = WorkflowRecord::failed(
                    new_workflow_id(),
                    WorkflowKind::Pipeline,
                    Utc::now(),
                    initial,
                    &e,
                );
                self.finish(record)
            }
        }
    }

    /// 运行单个 Agent（与活动中的阶段相同的包装），不写入历史
    pub async fn execute_single_phase(
        &self,
        agent_key: &str,
        state: WorkflowState,
    ) -> Result<WorkflowState, WorkflowError> {
        let agent = self
            .registry
            .get(agent_key)
            .ok_or_else(|| WorkflowError::AgentNotFound(agent_key.to_string()))?;
        Ok(agent.run(&state).await)
    }

    /// 最近 limit 条记录，按执行顺序
    pub fn get_workflow_history(&self, limit: usize) -> Vec<Arc<WorkflowRecord>> {
        self.history.recent(limit)
    }

    pub fn get_agent_metrics(&self) -> BTreeMap<String, AgentMetricsReport> {
        self.registry.metrics()
    }

    /// 所有 Agent 成功率都严格高于阈值时为 healthy
    pub fn get_system_status(&self) -> SystemStatus {
        let agent_metrics = self.registry.metrics();
        let healthy = agent_metrics
            .values()
            .all(|r| r.metrics.success_rate > self.settings.health_threshold);
        SystemStatus {
            agents_initialized: self.registry.len(),
            total_workflows: self.history.len(),
            last_workflow: self.history.last_id(),
            agent_metrics,
            system_health: if healthy {
                SystemHealth::Healthy
            } else {
                SystemHealth::Degraded
            },
            memory_enabled: self.store.is_some(),
            token_usage: self.token_usage(),
        }
    }

    pub fn token_usage(&self) -> TokenUsage {
        self.text
            .as_ref()
            .map(|text| text.token_usage())
            .unwrap_or_default()
    }

    /// 内容表现分析；未启用（没有注册分析 Agent）时为 None。
    /// 与单阶段相同的包装：缺少 final_content 时得到跳过标记
    pub async fn analyze_content_performance(&self, state: &WorkflowState) -> Option<WorkflowState> {
        let agent = self.registry.get(CONTENT_ANALYTICS)?;
        Some(agent.run(state).await)
    }

    /// 回填活动互动得分；未启用持久化时为 None
    pub async fn record_engagement(
        &self,
        campaign_id: i64,
        score: f64,
    ) -> Option<Result<(), StoreError>> {
        let store = self.store.clone()?;
        let result = tokio::task::spawn_blocking(move || store.record_engagement(campaign_id, score))
            .await
            .unwrap_or_else(|e| Err(StoreError::Io(std::io::Error::other(e))));
        Some(result)
    }

    /// 存储中的活动历史；未启用持久化时为 None
    pub fn campaign_history(&self) -> Option<Result<Vec<CampaignHistory>, StoreError>> {
        self.store.as_ref().map(|store| store.get_history())
    }

    fn finish(&self, record: WorkflowRecord) -> Arc<WorkflowRecord> {
        match record.status {
            WorkflowStatus::Failed => tracing::error!(
                workflow_id = %record.workflow_id,
                status = "failed",
                error = record.error.as_deref().unwrap_or_default(),
                "workflow failed"
            ),
            _ => tracing::info!(
                workflow_id = %record.workflow_id,
                status = "completed",
                duration_secs = record.duration_seconds,
                success_rate = record.summary.as_ref().map(|s| s.success_rate).unwrap_or_default(),
                "workflow completed"
            ),
        }
        self.history.append(record)
    }

    /// 尽力而为：创意取各内容条目的 idea，草稿取 content，社媒各平台改写稿挂在第一份草稿下；
    /// 失败只记日志
    async fn persist_campaign(&self, topic: &str, final_state: &WorkflowState) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let pieces: Vec<(String, String)> = final_state
            .get_list("content")
            .unwrap_or_default()
            .iter()
            .filter_map(|piece| {
                let idea = piece.field_text("idea")?;
                if strip_numbering(idea).trim().is_empty() {
                    return None;
                }
                Some((idea.to_string(), piece.field_text("content").unwrap_or_default().to_string()))
            })
            .collect();
        let social_posts: Vec<(String, String)> = final_state
            .get_map("social_posts")
            .map(|posts| {
                posts
                    .iter()
                    .filter_map(|(platform, text)| Some((platform.clone(), text.as_text()?.to_string())))
                    .filter(|(_, text)| !text.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let topic = topic.to_string();

        let result = tokio::task::spawn_blocking(move || -> Result<i64, StoreError> {
            let ideas: Vec<String> = pieces.iter().map(|(idea, _)| idea.clone()).collect();
            let ids = store.save_campaign(&topic, &ideas)?;
            let mut lead_draft = None;
            for ((idea_id, _), (_, draft)) in ids.ideas.iter().zip(&pieces) {
                if !draft.trim().is_empty() {
                    let draft_id = store.save_draft(*idea_id, draft)?;
                    lead_draft.get_or_insert(draft_id);
                }
            }
            match lead_draft {
                Some(draft_id) => {
                    for (platform, text) in &social_posts {
                        store.save_specialized_draft(draft_id, platform, text)?;
                    }
                }
                None if !social_posts.is_empty() => {
                    tracing::warn!("no draft to attach social posts to, skipping them");
                }
                None => {}
            }
            Ok(ids.campaign_id)
        })
        .await;

        match result {
            Ok(Ok(campaign_id)) => tracing::info!(campaign_id, "campaign persisted"),
            Ok(Err(e)) => tracing::warn!(error = %e, "campaign persistence failed"),
            Err(e) => tracing::warn!(error = %e, "campaign persistence task failed"),
        }
    }
}

/// 汇总阶段记录；汇总失败时整条记录为 Failed
fn compile(
    workflow_id: String,
    kind: WorkflowKind,
    started_at: DateTime<Utc>,
    phases: Vec<PhaseRecord>,
    final_state: WorkflowState,
) -> WorkflowRecord {
    let finished_at = Utc::now();
    match compile_summary(&phases, &final_state, finished_at) {
        Ok((summary, duration_seconds)) => WorkflowRecord {
            workflow_id,
            kind,
            status: WorkflowStatus::Completed,
            started_at,
            finished_at,
            duration_seconds,
            phases,
            summary: Some(summary),
            final_state,
            error: None,
        },
        Err(e) => WorkflowRecord::failed(workflow_id, kind, started_at, final_state, &e),
    }
}

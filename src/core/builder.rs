//! 编排器构建器：统一的 Agent 注册与存储初始化
//!
//! 每个 Agent 的配置取自 `[agents]` 段（defaults + 按 key 覆盖）。
//! `[analytics].enabled` 时，build 用已登记的文本生成能力与存储注册内容分析 Agent。

use std::path::Path;
use std::sync::Arc;

use crate::agents::{advisory_agents, default_agents, AnalyticsAgent, ImageOptions, CONTENT_ANALYTICS};
use crate::config::AppConfig;
use crate::core::{Agent, AgentConfig, AgentRegistry, BatchScheduler, Orchestrator};
use crate::llm::{ImageGenerator, TextGenerator};
use crate::memory::{CampaignStore, SqliteCampaignStore};
use crate::workflow::WorkflowHistory;

/// 编排器构建器
pub struct OrchestratorBuilder {
    config: AppConfig,
    registry: AgentRegistry,
    store: Option<Arc<dyn CampaignStore>>,
    text: Option<Arc<dyn TextGenerator>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: AgentRegistry::new(),
            store: None,
            text: None,
        }
    }

    /// 注册 Agent，配置按其 key 从 `[agents]` 段解析
    pub fn with_agent(self, agent: Arc<dyn Agent>) -> Self {
        let config = self.config.agents.config_for(agent.key());
        self.with_agent_config(agent, config)
    }

    /// 以显式配置注册 Agent；同 key 的旧实例被替换
    pub fn with_agent_config(mut self, agent: Arc<dyn Agent>, config: AgentConfig) -> Self {
        let key = agent.key().to_string();
        if self.registry.register(agent, config).is_some() {
            tracing::warn!(agent = %key, "agent re-registered, previous instance replaced");
        }
        self
    }

    /// 注册七个营销 Agent 与三个顾问 Agent，并登记文本生成能力
    pub fn with_default_agents(
        self,
        text: Arc<dyn TextGenerator>,
        image: Arc<dyn ImageGenerator>,
    ) -> Self {
        let options = ImageOptions {
            size: self.config.image.size.clone(),
            output_dir: self.config.image.output_dir.clone(),
        };
        let agents = default_agents(text.clone(), image, options)
            .into_iter()
            .chain(advisory_agents(text.clone()));
        agents
            .fold(self, |builder, agent| builder.with_agent(agent))
            .with_text_generator(text)
    }

    /// 登记文本生成能力：用于 token 统计与内容分析 Agent
    pub fn with_text_generator(mut self, text: Arc<dyn TextGenerator>) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CampaignStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 打开 SQLite 存储；失败时记录警告并在无持久化的情况下继续
    pub fn with_store_path(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match SqliteCampaignStore::open(path) {
            Ok(store) => {
                tracing::info!(path = %path.display(), "campaign store opened");
                self.store = Some(Arc::new(store));
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "campaign store unavailable, persistence disabled");
                self.store = None;
            }
        }
        self
    }

    pub fn build(mut self) -> Orchestrator {
        self.register_analytics();
        let settings = self.config.workflow;
        tracing::info!(
            agents = ?self.registry.keys(),
            memory_enabled = self.store.is_some(),
            batch_concurrency = settings.batch_concurrency,
            "orchestrator initialized"
        );
        Orchestrator::from_parts(
            self.registry,
            WorkflowHistory::new(),
            self.store,
            self.text,
            BatchScheduler::new(settings.batch_concurrency),
            settings,
        )
    }

    /// 调用方已注册同 key Agent 时保留调用方的实例
    fn register_analytics(&mut self) {
        if !self.config.analytics.enabled || self.registry.contains(CONTENT_ANALYTICS) {
            return;
        }
        let Some(text) = self.text.clone() else {
            tracing::warn!("analytics enabled but no text generator registered, analytics disabled");
            return;
        };
        let agent = AnalyticsAgent::new(
            text,
            self.store.clone(),
            self.config.analytics.similar_campaigns_limit,
        );
        let config = self.config.agents.config_for(CONTENT_ANALYTICS);
        self.registry.register(Arc::new(agent), config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockImageGenerator, MockTextGenerator};

    #[test]
    fn test_default_agents_use_per_key_config() {
        let mut config = AppConfig::default();
        config.agents.overrides.insert(
            "content_writer".into(),
            crate::config::AgentOverride {
                temperature: Some(0.8),
                ..Default::default()
            },
        );
        let orchestrator = OrchestratorBuilder::new(config)
            .with_default_agents(
                Arc::new(MockTextGenerator::new()),
                Arc::new(MockImageGenerator::default()),
            )
            .build();

        let status = orchestrator.get_system_status();
        assert_eq!(status.agents_initialized, 10);
        assert!(orchestrator.agent("brand_voice").is_some());
        assert!(orchestrator.agent("content_analytics").is_none());
        assert!(!status.memory_enabled);
        let writer = orchestrator.agent("content_writer").unwrap();
        assert_eq!(writer.config().temperature, 0.8);
        assert_eq!(orchestrator.agent("trend_analysis").unwrap().config().temperature, 0.7);
    }

    #[test]
    fn test_unopenable_store_degrades() {
        let dir = tempfile::tempdir().unwrap();
        // 目录本身不能作为数据库文件打开
        let orchestrator = OrchestratorBuilder::new(AppConfig::default())
            .with_store_path(dir.path())
            .build();
        assert!(!orchestrator.get_system_status().memory_enabled);
    }

    #[test]
    fn test_analytics_registered_only_when_enabled_with_text() {
        let mut config = AppConfig::default();
        config.analytics.enabled = true;

        let without_text = OrchestratorBuilder::new(config.clone()).build();
        assert!(without_text.agent("content_analytics").is_none());

        let with_text = OrchestratorBuilder::new(config)
            .with_text_generator(Arc::new(MockTextGenerator::new()))
            .build();
        assert!(with_text.agent("content_analytics").is_some());
    }
}

//! Agent 注册表
//!
//! 每个 key 对应一个 ManagedAgent（同一实例的指标在多次运行间累积）。
//! 同 key 重复注册时后注册者替换先注册者。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::{Agent, AgentConfig, AgentMetricsReport, ManagedAgent};

#[derive(Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<ManagedAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 包装并注册；返回被替换的旧实例（若有）
    pub fn register(
        &mut self,
        agent: Arc<dyn Agent>,
        config: AgentConfig,
    ) -> Option<Arc<ManagedAgent>> {
        let key = agent.key().to_string();
        self.agents
            .insert(key, Arc::new(ManagedAgent::new(agent, config)))
    }

    pub fn get(&self, key: &str) -> Option<Arc<ManagedAgent>> {
        self.agents.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.agents.contains_key(key)
    }

    /// 已注册的 key，按字典序
    pub fn keys(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// key -> 指标报告
    pub fn metrics(&self) -> BTreeMap<String, AgentMetricsReport> {
        self.agents
            .iter()
            .map(|(k, a)| (k.clone(), a.metrics_report()))
            .collect()
    }
}

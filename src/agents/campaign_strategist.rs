//! 活动策略 Agent：受众分析、信息框架、渠道与时间线

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::agents::parsing::clean_response;
use crate::agents::CAMPAIGN_STRATEGIST;
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::{LlmError, TextGenerator};

pub struct CampaignStrategistAgent {
    llm: Arc<dyn TextGenerator>,
}

impl CampaignStrategistAgent {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn prompt(topic: &str, trends: Option<&str>) -> String {
        let mut prompt = format!(
            "You are a world-class marketing strategist with 15+ years of experience.\n\
             Create a comprehensive campaign strategy for the topic: '{topic}'.\n\n"
        );
        if let Some(trends) = trends {
            prompt.push_str(&format!("Context from trend analysis:\n{trends}\n\n"));
        }
        prompt.push_str(
            "Include these sections:\n\
             ## Campaign Goal\nPrimary objective and measurable KPIs\n\n\
             ## Audience Analysis\nPrimary and secondary audience, pain points, motivations\n\n\
             ## Messaging Strategy\nCore message, tone, key talking points\n\n\
             ## Distribution Channels\nRecommended channels and resource allocation\n\n\
             ## Timeline\nExecution phases and milestones\n\n\
             Keep it structured and actionable.",
        );
        prompt
    }
}

#[async_trait]
impl Agent for CampaignStrategistAgent {
    fn key(&self) -> &str {
        CAMPAIGN_STRATEGIST
    }

    fn name(&self) -> &str {
        "Campaign Strategist Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(&["topic"], &["trend_analysis_report"])
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let topic = state.get_text("topic").unwrap_or_default();
        let trends = state
            .get_text("trend_analysis_report")
            .filter(|t| !t.trim().is_empty());

        let raw = self.llm.generate(&config.request(Self::prompt(topic, trends))).await?;
        let strategy = clean_response(&raw);
        if strategy.is_empty() {
            return Err(LlmError::MalformedResponse("empty campaign strategy".into()).into());
        }

        Ok(WorkflowState::new()
            .with("campaign_strategy", strategy)
            .with("campaign_strategy_timestamp", Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockTextGenerator;

    #[tokio::test]
    async fn test_strategy_uses_trend_context() {
        let llm = Arc::new(MockTextGenerator::from_fn(|req| {
            assert!(req.prompt.contains("eco trends rising"));
            Ok("<think>plan</think>## Campaign Goal\n- Awareness".to_string())
        }));
        let agent = CampaignStrategistAgent::new(llm);
        let state = WorkflowState::new()
            .with("topic", "Sustainable Fashion")
            .with("trend_analysis_report", "eco trends rising");

        let out = agent.execute(&state, &AgentConfig::default()).await.unwrap();
        assert_eq!(out.get_text("campaign_strategy"), Some("## Campaign Goal\n- Awareness"));
    }
}

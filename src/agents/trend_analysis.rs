//! 趋势分析 Agent：生成趋势报告并提取计数摘要

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::agents::parsing::{clean_response, extract_insights};
use crate::agents::TREND_ANALYSIS;
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::{LlmError, TextGenerator};

pub struct TrendAnalysisAgent {
    llm: Arc<dyn TextGenerator>,
}

impl TrendAnalysisAgent {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn prompt(topic: &str) -> String {
        format!(
            "You are a world-class marketing analyst specializing in trend analysis.\n\n\
             Analyze the topic: \"{topic}\"\n\n\
             Structure the analysis as:\n\
             ## Current Trends\n3-5 key current trends related to this topic\n\n\
             ## Emerging Trends\n2-3 trends likely to gain traction\n\n\
             ## Seasonal Patterns\nOptimal timing opportunities\n\n\
             ## Content Opportunities\n5-7 specific content formats and ideas\n\n\
             ## Success Metrics\nKey metrics to track\n\n\
             ## Warnings\nRisks or declining trends to avoid\n\n\
             Use bullet points and keep it actionable."
        )
    }
}

#[async_trait]
impl Agent for TrendAnalysisAgent {
    fn key(&self) -> &str {
        TREND_ANALYSIS
    }

    fn name(&self) -> &str {
        "Trend Analysis Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(&["topic"], &[])
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let topic = state.get_text("topic").unwrap_or_default();
        tracing::debug!(topic, "analyzing trends");

        let raw = self.llm.generate(&config.request(Self::prompt(topic))).await?;
        let report = clean_response(&raw);
        if report.is_empty() {
            return Err(LlmError::MalformedResponse("empty trend report".into()).into());
        }

        Ok(WorkflowState::new()
            .with("trend_insights", extract_insights(&report))
            .with("trend_analysis_report", report)
            .with("analysis_timestamp", Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockTextGenerator;

    #[tokio::test]
    async fn test_report_is_cleaned_and_counted() {
        let llm = Arc::new(MockTextGenerator::fixed(
            "<think>hmm</think>\n## Current Trends\n- Trend: reels\n## Warnings\n- Risk: fatigue",
        ));
        let agent = TrendAnalysisAgent::new(llm);
        let out = agent
            .execute(&WorkflowState::new().with("topic", "AI"), &AgentConfig::default())
            .await
            .unwrap();

        let report = out.get_text("trend_analysis_report").unwrap();
        assert!(report.starts_with("## Current Trends"));
        let insights = out.get("trend_insights").unwrap();
        assert_eq!(insights.as_map().unwrap()["trend_count"].as_number(), Some(1.0));
        assert!(out.contains("analysis_timestamp"));
    }

    #[tokio::test]
    async fn test_empty_report_is_retryable_error() {
        let agent = TrendAnalysisAgent::new(Arc::new(MockTextGenerator::fixed("<think>only</think>")));
        let err = agent
            .execute(&WorkflowState::new().with("topic", "AI"), &AgentConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Capability(LlmError::MalformedResponse(_))));
    }
}

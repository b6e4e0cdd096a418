//! 表现优化 Agent：针对互动与转化给出改进建议

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::parsing::clean_response;
use crate::agents::PERFORMANCE_OPTIMIZER;
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::{LlmError, TextGenerator};

pub struct PerformanceOptimizerAgent {
    llm: Arc<dyn TextGenerator>,
}

impl PerformanceOptimizerAgent {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn prompt(content: &str) -> String {
        format!(
            "You are a top conversion rate and engagement specialist.\n\
             Analyze the content below and recommend how to improve its performance.\n\n\
             Content: {content}\n\n\
             ## Performance Metrics\nExpected engagement and conversion rate\n\n\
             ## Optimization Suggestions\nEngagement changes, CTA best practices, visual enhancements\n\n\
             ## Landing Page Optimization\nHeadline revisions, image or video ideas, tracking improvements\n\n\
             Include specific, measurable examples."
        )
    }
}

#[async_trait]
impl Agent for PerformanceOptimizerAgent {
    fn key(&self) -> &str {
        PERFORMANCE_OPTIMIZER
    }

    fn name(&self) -> &str {
        "Performance Optimizer Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(&["final_content"], &[])
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let content = state.get_text("final_content").unwrap_or_default();
        let raw = self.llm.generate(&config.request(Self::prompt(content))).await?;
        let recommendations = clean_response(&raw);
        if recommendations.is_empty() {
            return Err(LlmError::MalformedResponse("empty performance recommendations".into()).into());
        }
        Ok(WorkflowState::new().with("performance_recommendations", recommendations))
    }
}

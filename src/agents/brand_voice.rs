//! 品牌语调 Agent：为后续文案生成统一的语调指南

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::parsing::clean_response;
use crate::agents::BRAND_VOICE;
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::{LlmError, TextGenerator};

pub struct BrandVoiceAgent {
    llm: Arc<dyn TextGenerator>,
}

impl BrandVoiceAgent {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn prompt(topic: &str, strategy: Option<&str>) -> String {
        format!(
            "You are a senior brand strategist specializing in voice and personality.\n\
             Create a brand voice guide for a campaign about: '{topic}'.\n\n\
             Campaign strategy context:\n{}\n\n\
             ## Brand Personality\n5 core traits, what we are and are not, brand archetype\n\n\
             ## Tone of Voice\nOverall tone and per-channel adjustments\n\n\
             ## Language Guidelines\nVocabulary to use and avoid, sentence structure\n\n\
             ## Messaging Framework\nOne-sentence value proposition, 3 messaging pillars, CTA style\n\n\
             ## Do's & Don'ts\n3 good and 3 bad examples",
            strategy.unwrap_or("none provided")
        )
    }
}

#[async_trait]
impl Agent for BrandVoiceAgent {
    fn key(&self) -> &str {
        BRAND_VOICE
    }

    fn name(&self) -> &str {
        "Brand Voice Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(&["topic"], &["campaign_strategy"])
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let topic = state.get_text("topic").unwrap_or_default();
        let strategy = state.get_text("campaign_strategy").filter(|s| !s.trim().is_empty());

        let raw = self.llm.generate(&config.request(Self::prompt(topic, strategy))).await?;
        let guide = clean_response(&raw);
        if guide.is_empty() {
            return Err(LlmError::MalformedResponse("empty brand voice guide".into()).into());
        }
        Ok(WorkflowState::new().with("brand_voice_guide", guide))
    }
}

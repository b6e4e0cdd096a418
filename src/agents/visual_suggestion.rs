//! 视觉建议 Agent：为一段文案给出 3 个视觉概念（描述 + 图像提示词）

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::parsing::{clean_response, parse_visual_suggestions, Parsed, VisualSuggestion};
use crate::agents::VISUAL_SUGGESTION;
use crate::core::state::Value;
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::TextGenerator;

pub struct VisualSuggestionAgent {
    llm: Arc<dyn TextGenerator>,
}

impl VisualSuggestionAgent {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn prompt(content: &str) -> String {
        format!(
            "You are an expert creative director for social media.\n\
             Read the post below and propose exactly 3 distinct visual concepts.\n\
             Write each concept on its own line, strictly in this format:\n\
             description: <what the visual shows>||prompt: <ready-to-use prompt for an image model>\n\n\
             --- POST TEXT ---\n{content}\n\n--- VISUAL IDEAS ---"
        )
    }
}

#[async_trait]
impl Agent for VisualSuggestionAgent {
    fn key(&self) -> &str {
        VISUAL_SUGGESTION
    }

    fn name(&self) -> &str {
        "Visual Suggestion Agent"
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

        let mut out = WorkflowState::new();
        match parse_visual_suggestions(&clean_response(&raw)) {
            Parsed::Structured(suggestions) => {
                // 第一个概念的提示词交给图像 Agent
                if let Some(first) = suggestions.first() {
                    out.insert("image_prompt", first.prompt.clone());
                }
                out.insert(
                    "visual_suggestions",
                    suggestions.iter().map(VisualSuggestion::to_value).collect::<Vec<_>>(),
                );
            }
            Parsed::Unstructured { raw } => {
                tracing::warn!(agent = VISUAL_SUGGESTION, "no parsable visual suggestions");
                out.insert("visual_suggestions", Vec::<Value>::new());
                out.insert("visual_suggestions_raw", raw);
            }
        }
        Ok(out)
    }
}

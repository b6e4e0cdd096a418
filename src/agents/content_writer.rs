//! 文案 Agent：围绕选定创意写一条社媒帖子

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::parsing::clean_response;
use crate::agents::CONTENT_WRITER;
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::{LlmError, TextGenerator};

pub struct ContentWriterAgent {
    llm: Arc<dyn TextGenerator>,
}

impl ContentWriterAgent {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn prompt(state: &WorkflowState, topic: &str, idea: &str) -> String {
        let mut prompt = format!(
            "You are a creative content writer. Write a short, engaging social media post.\n\
             Main topic: '{topic}'.\n\
             Focus on this specific idea: '{idea}'.\n"
        );
        for (key, label) in [
            ("platform", "Platform"),
            ("content_type", "Format"),
            ("theme", "Theme"),
            ("target_audience", "Audience"),
        ] {
            if let Some(value) = state.get_text(key).filter(|v| !v.trim().is_empty()) {
                prompt.push_str(&format!("{label}: {value}\n"));
            }
        }
        prompt.push_str("Keep it to 2-3 short paragraphs and end with a relevant emoji.");
        prompt
    }
}

#[async_trait]
impl Agent for ContentWriterAgent {
    fn key(&self) -> &str {
        CONTENT_WRITER
    }

    fn name(&self) -> &str {
        "Content Writer Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(
            &["topic", "selected_idea"],
            &["platform", "content_type", "theme", "target_audience"],
        )
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let topic = state.get_text("topic").unwrap_or_default();
        let idea = state.get_text("selected_idea").unwrap_or_default();

        let raw = self
            .llm
            .generate(&config.request(Self::prompt(state, topic, idea)))
            .await?;
        let content = clean_response(&raw);
        if content.is_empty() {
            return Err(LlmError::MalformedResponse("empty draft".into()).into());
        }
        Ok(WorkflowState::new().with("final_content", content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockTextGenerator;

    #[tokio::test]
    async fn test_prompt_includes_optional_context() {
        let llm = Arc::new(MockTextGenerator::from_fn(|req| Ok(req.prompt.clone())));
        let agent = ContentWriterAgent::new(llm);
        let state = WorkflowState::new()
            .with("topic", "Coffee")
            .with("selected_idea", "Latte art basics")
            .with("platform", "instagram");
        let out = agent.execute(&state, &AgentConfig::default()).await.unwrap();
        let text = out.get_text("final_content").unwrap();
        assert!(text.contains("Latte art basics"));
        assert!(text.contains("Platform: instagram"));
        assert!(!text.contains("Theme:"));
    }
}

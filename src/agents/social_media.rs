//! 社媒优化 Agent：把已创作的内容按平台改写，并给出发布建议

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::parsing::{clean_response, parse_platform_sections, sections_to_value, Parsed};
use crate::agents::SOCIAL_MEDIA;
use crate::core::state::Value;
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::TextGenerator;

pub struct SocialMediaAgent {
    llm: Arc<dyn TextGenerator>,
}

impl SocialMediaAgent {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn prompt(topic: &str, platforms: &[String], pieces: &[String], visuals: usize) -> String {
        let mut prompt = format!(
            "You are a social media optimization expert.\n\
             Topic: {topic}\n\
             Target platforms: {}\n\
             Visual assets available: {visuals}\n\n\
             Adapt the content below for each platform (length, tone, hashtags, call to action)\n\
             and suggest posting times. Start each platform with a '## <platform>' heading.\n",
            platforms.join(", ")
        );
        for (i, piece) in pieces.iter().enumerate() {
            prompt.push_str(&format!("\n--- CONTENT {} ---\n{piece}\n", i + 1));
        }
        prompt
    }
}

/// `content` 既可以是单段文本，也可以是内容条目列表（取每条的 content 字段）
fn content_texts(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(|item| item.field_text("content").or_else(|| item.as_text()))
            .filter(|text| !text.trim().is_empty())
            .map(String::from)
            .collect(),
        Some(other) => other
            .to_text_list()
            .into_iter()
            .filter(|text| !text.trim().is_empty())
            .collect(),
        None => Vec::new(),
    }
}

#[async_trait]
impl Agent for SocialMediaAgent {
    fn key(&self) -> &str {
        SOCIAL_MEDIA
    }

    fn name(&self) -> &str {
        "Social Media Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(&["content"], &["topic", "platforms", "visuals"])
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let pieces = content_texts(state.get("content"));
        if pieces.is_empty() {
            return Err(AgentError::RequiredFieldMissing("content".into()));
        }
        let topic = state.get_text("topic").unwrap_or("the campaign");
        let mut platforms = state.get_text_list("platforms");
        if platforms.is_empty() {
            platforms = vec!["instagram".to_string(), "facebook".to_string()];
        }
        let visuals = state.get_list("visuals").map_or(0, <[Value]>::len);

        let raw = self
            .llm
            .generate(&config.request(Self::prompt(topic, &platforms, &pieces, visuals)))
            .await?;
        let text = clean_response(&raw);

        let mut out = WorkflowState::new();
        match parse_platform_sections(&text) {
            Parsed::Structured(sections) => out.insert("social_posts", sections_to_value(&sections)),
            Parsed::Unstructured { raw } => out.insert("social_posts_raw", raw),
        }
        out.insert("social_optimization", text);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::map;
    use crate::llm::MockTextGenerator;

    #[tokio::test]
    async fn test_posts_split_by_platform() {
        let agent = SocialMediaAgent::new(Arc::new(MockTextGenerator::new()));
        let content = vec![map([("day", Value::from("1")), ("content", Value::from("Post body"))])];
        let state = WorkflowState::new().with("topic", "Coffee").with("content", content);
        let out = agent.execute(&state, &AgentConfig::default()).await.unwrap();
        let posts = out.get_map("social_posts").unwrap();
        assert!(posts.contains_key("instagram"));
        assert!(posts.contains_key("facebook"));
        assert!(out.has_value("social_optimization"));
    }

    #[tokio::test]
    async fn test_list_without_text_is_missing_input() {
        let agent = SocialMediaAgent::new(Arc::new(MockTextGenerator::new()));
        let content = vec![map([("day", Value::from("1"))])];
        let state = WorkflowState::new().with("content", content);
        let err = agent.execute(&state, &AgentConfig::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::RequiredFieldMissing(_)));
    }
}

//! 客户简报 Agent：汇总策略、内容、视觉与社媒计划，生成一份创意简报

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::parsing::clean_response;
use crate::agents::CLIENT_BRIEFING;
use crate::core::state::{map, Value};
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::{LlmError, TextGenerator};

pub struct ClientBriefingAgent {
    llm: Arc<dyn TextGenerator>,
}

impl ClientBriefingAgent {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn prompt(state: &WorkflowState, topic: &str) -> String {
        let mut prompt = format!(
            "You are a client briefing specialist at a marketing agency.\n\
             Write a concise creative brief for the campaign on '{topic}' with sections:\n\
             Objective, Audience, Key Message, Deliverables, Timeline, Budget.\n\n"
        );
        if let Some(audience) = state.get_text("target_audience") {
            prompt.push_str(&format!("Audience: {audience}\n"));
        }
        let goals = state.get_text_list("content_goals");
        if !goals.is_empty() {
            prompt.push_str(&format!("Goals: {}\n", goals.join(", ")));
        }
        if let Some(name) = state.get("campaign_brief").and_then(|b| b.field_text("campaign_name")) {
            prompt.push_str(&format!("Campaign: {name}\n"));
        }
        prompt.push_str(&format!(
            "Content pieces ready: {}\nVisual assets ready: {}\n",
            count(state, "content"),
            count(state, "visuals")
        ));
        if let Some(plan) = state.get_text("social_optimization") {
            prompt.push_str(&format!("\nSocial media plan:\n{plan}\n"));
        }
        prompt
    }
}

fn count(state: &WorkflowState, key: &str) -> usize {
    state.get_list(key).map_or(0, <[Value]>::len)
}

#[async_trait]
impl Agent for ClientBriefingAgent {
    fn key(&self) -> &str {
        CLIENT_BRIEFING
    }

    fn name(&self) -> &str {
        "Client Briefing Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(
            &["topic"],
            &["target_audience", "content_goals", "campaign_brief", "content", "visuals", "social_optimization"],
        )
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let topic = state.get_text("topic").unwrap_or_default();
        let raw = self
            .llm
            .generate(&config.request(Self::prompt(state, topic)))
            .await?;
        let brief = clean_response(&raw);
        if brief.is_empty() {
            return Err(LlmError::MalformedResponse("empty creative brief".into()).into());
        }

        let summary = map([
            ("topic", Value::from(topic)),
            ("content_pieces", Value::from(count(state, "content"))),
            ("visuals", Value::from(count(state, "visuals"))),
            ("platforms", Value::from(state.get_text_list("platforms"))),
            ("has_social_plan", Value::from(state.has_value("social_optimization"))),
        ]);

        Ok(WorkflowState::new()
            .with("creative_brief", brief)
            .with("briefing_summary", summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockTextGenerator;

    #[tokio::test]
    async fn test_brief_and_summary() {
        let agent = ClientBriefingAgent::new(Arc::new(MockTextGenerator::new()));
        let state = WorkflowState::new()
            .with("topic", "Coffee")
            .with("content", vec![Value::from("a"), Value::from("b")])
            .with("social_optimization", "## instagram\nx");
        let out = agent.execute(&state, &AgentConfig::default()).await.unwrap();
        assert!(out.get_text("creative_brief").unwrap().starts_with("Creative Brief"));
        let summary = out.get("briefing_summary").unwrap();
        assert_eq!(summary.as_map().unwrap()["content_pieces"].as_number(), Some(2.0));
        assert_eq!(summary.as_map().unwrap()["has_social_plan"], Value::Bool(true));
    }
}

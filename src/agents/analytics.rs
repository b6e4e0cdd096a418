//! 内容分析 Agent：互动预测、平台优化、A/B 测试、发布时间、话题标签与改进建议，
//! 并用存储中同类活动的互动得分给出表现基准
//!
//! 各分析项独立调用文本生成，单项失败只写入该项的 `error`；全部失败时才返回错误交给重试。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;

use crate::agents::parsing::clean_response;
use crate::agents::CONTENT_ANALYTICS;
use crate::core::state::{map, Value};
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::{LlmError, TextGenerator};
use crate::memory::{CampaignPerformance, CampaignStore};

const MAX_SUGGESTIONS: usize = 5;

pub struct AnalyticsAgent {
    llm: Arc<dyn TextGenerator>,
    store: Option<Arc<dyn CampaignStore>>,
    similar_limit: usize,
}

/// 一个分析项：报告中的字段名、文本结果的字段名（None 表示解析为建议列表）与提示词
struct Section {
    report_key: &'static str,
    text_key: Option<&'static str>,
    prompt: String,
}

impl AnalyticsAgent {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        store: Option<Arc<dyn CampaignStore>>,
        similar_limit: usize,
    ) -> Self {
        Self {
            llm,
            store,
            similar_limit,
        }
    }

    fn sections(content: &str, topic: &str, audience: &str) -> Vec<Section> {
        vec![
            Section {
                report_key: "engagement_prediction",
                text_key: Some("raw_analysis"),
                prompt: format!(
                    "You are an advanced social media analytics expert.\n\
                     Predict the engagement potential of this content: \"{content}\"\n\
                     Give engagement rate (0-100%), reach potential (Low/Medium/High), virality score (1-10),\n\
                     best performing platform, key engagement drivers and potential weaknesses."
                ),
            },
            Section {
                report_key: "platform_optimization",
                text_key: Some("platform_recommendations"),
                prompt: format!(
                    "As a platform optimization specialist, suggest optimizations of this content\n\
                     for Instagram, Facebook, Twitter, TikTok and LinkedIn: \"{content}\"\n\
                     Cover content changes, post format, hashtag strategy, visuals and engagement tactics."
                ),
            },
            Section {
                report_key: "ab_test_suggestions",
                text_key: Some("ab_test_suggestions"),
                prompt: format!(
                    "You are an A/B testing strategist. Create 5 A/B test ideas for: \"{content}\"\n\
                     For each give the hypothesis, the variable, the alternative version and success metrics.\n\
                     Focus on headlines, CTAs, emojis, tone, length and timing."
                ),
            },
            Section {
                report_key: "timing_recommendations",
                text_key: Some("timing_recommendations"),
                prompt: format!(
                    "As a social media timing expert, suggest optimal posting times.\n\
                     Topic: \"{topic}\"\nTarget audience: \"{audience}\"\n\
                     Cover best days, hours per platform, time zones, seasonal factors and audience behavior."
                ),
            },
            Section {
                report_key: "hashtag_analysis",
                text_key: Some("hashtag_strategy"),
                prompt: format!(
                    "As a hashtag optimization expert, build a hashtag strategy for: \"{content}\"\n\
                     Cover current hashtags, trending and niche suggestions, the popular/niche mix\n\
                     and platform-specific recommendations."
                ),
            },
            Section {
                report_key: "improvement_suggestions",
                text_key: None,
                prompt: format!(
                    "As a content optimization consultant, give 5 specific, actionable improvements for:\n\
                     \"{content}\"\n\
                     Focus on engagement, call to action, emotional appeal, clarity and brand voice.\n\
                     Number them 1. to 5."
                ),
            },
        ]
    }

    async fn similar_campaigns(&self, topic: &str) -> Vec<CampaignPerformance> {
        let Some(store) = self.store.clone() else {
            return Vec::new();
        };
        let topic = topic.to_string();
        let limit = self.similar_limit;
        match tokio::task::spawn_blocking(move || store.similar_campaigns(&topic, limit)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                tracing::warn!(agent = CONTENT_ANALYTICS, error = %e, "similar campaign lookup failed");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(agent = CONTENT_ANALYTICS, error = %e, "similar campaign lookup task failed");
                Vec::new()
            }
        }
    }
}

/// 同类活动的平均互动得分与 1.2 / 1.5 倍基准线
pub fn performance_benchmarks(similar: &[CampaignPerformance]) -> Value {
    let Some(top) = similar
        .iter()
        .max_by(|a, b| a.engagement_score.total_cmp(&b.engagement_score))
    else {
        return map([("message", Value::from("No historical data available for benchmarking"))]);
    };
    let average = similar.iter().map(|c| c.engagement_score).sum::<f64>() / similar.len() as f64;
    map([
        ("similar_campaigns_count", Value::from(similar.len())),
        ("average_engagement", Value::from(average)),
        (
            "top_performing_campaign",
            map([
                ("id", Value::from(top.id as f64)),
                ("topic", Value::from(top.topic.as_str())),
                ("engagement_score", Value::from(top.engagement_score)),
            ]),
        ),
        (
            "benchmarks",
            map([
                ("good_engagement", Value::from(average * 1.2)),
                ("excellent_engagement", Value::from(average * 1.5)),
            ]),
        ),
    ])
}

/// 取以 "1." ~ "5." 或 "-" 开头的行，最多 5 条
pub fn improvement_suggestions(text: &str) -> Vec<String> {
    const MARKERS: [&str; 6] = ["1.", "2.", "3.", "4.", "5.", "-"];
    text.lines()
        .map(str::trim)
        .filter(|line| MARKERS.iter().any(|m| line.starts_with(m)))
        .take(MAX_SUGGESTIONS)
        .map(String::from)
        .collect()
}

#[async_trait]
impl Agent for AnalyticsAgent {
    fn key(&self) -> &str {
        CONTENT_ANALYTICS
    }

    fn name(&self) -> &str {
        "Analytics & Optimization Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(&["final_content"], &["topic", "target_audience"])
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let content = state.get_text("final_content").unwrap_or_default();
        let topic = state.get_text("topic").unwrap_or_default();
        let audience = state.get_text("target_audience").unwrap_or("general");

        let sections = Self::sections(content, topic, audience);
        let requests: Vec<_> = sections
            .iter()
            .map(|section| config.request(section.prompt.clone()))
            .collect();
        let responses = join_all(requests.iter().map(|request| self.llm.generate(request))).await;

        let mut report = std::collections::BTreeMap::new();
        let mut first_error: Option<LlmError> = None;
        let mut succeeded = 0usize;
        for (section, response) in sections.iter().zip(responses) {
            let value = match response.map(|raw| clean_response(&raw)) {
                Ok(text) => {
                    succeeded += 1;
                    match section.text_key {
                        Some(field) => map([
                            (field, Value::from(text)),
                            ("generated_at", Value::from(Utc::now())),
                        ]),
                        None => Value::from(improvement_suggestions(&text)),
                    }
                }
                Err(e) => {
                    tracing::warn!(agent = CONTENT_ANALYTICS, section = section.report_key, error = %e, "analysis section failed");
                    let value = map([("error", Value::from(format!("{} failed: {e}", section.report_key)))]);
                    first_error.get_or_insert(e);
                    value
                }
            };
            report.insert(section.report_key.to_string(), value);
        }
        if succeeded == 0 {
            if let Some(err) = first_error {
                return Err(err.into());
            }
        }

        let similar = self.similar_campaigns(topic).await;
        report.insert("performance_benchmarks".to_string(), performance_benchmarks(&similar));

        Ok(WorkflowState::new().with("analytics", report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockTextGenerator;
    use crate::memory::SqliteCampaignStore;

    fn input() -> WorkflowState {
        WorkflowState::new()
            .with("topic", "Coffee")
            .with("final_content", "Try our new cold brew ☕")
    }

    #[test]
    fn test_benchmarks_without_history() {
        let value = performance_benchmarks(&[]);
        assert_eq!(
            value.field_text("message"),
            Some("No historical data available for benchmarking")
        );
    }

    #[test]
    fn test_benchmarks_scale_average() {
        let similar: Vec<CampaignPerformance> = [(1, 4.0), (2, 8.0)]
            .into_iter()
            .map(|(id, score)| CampaignPerformance {
                id,
                topic: "coffee".into(),
                engagement_score: score,
                created_at: Utc::now(),
            })
            .collect();
        let value = performance_benchmarks(&similar);
        let fields = value.as_map().unwrap();
        assert_eq!(fields["average_engagement"].as_number(), Some(6.0));
        assert_eq!(fields["top_performing_campaign"].field_text("topic"), Some("coffee"));
        let bench = fields["benchmarks"].as_map().unwrap();
        assert!((bench["good_engagement"].as_number().unwrap() - 7.2).abs() < 1e-9);
        assert!((bench["excellent_engagement"].as_number().unwrap() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_suggestions_keep_numbered_and_bulleted_lines() {
        let text = "Here you go:\n1. Open with a question\n2. Add a CTA\n- Use one emoji\n6. ignored number\n3. Shorter\n4. Warmer\n5. Clearer";
        let got = improvement_suggestions(text);
        assert_eq!(got.len(), 5);
        assert_eq!(got[0], "1. Open with a question");
        assert_eq!(got[2], "- Use one emoji");
    }

    #[tokio::test]
    async fn test_report_has_every_section_and_store_benchmarks() {
        let store = Arc::new(SqliteCampaignStore::in_memory().unwrap());
        let id = store.save_campaign("Coffee", &[]).unwrap().campaign_id;
        store.record_engagement(id, 5.0).unwrap();
        let agent = AnalyticsAgent::new(Arc::new(MockTextGenerator::new()), Some(store), 5);

        let out = agent.execute(&input(), &AgentConfig::default()).await.unwrap();
        let report = out.get_map("analytics").unwrap();
        for key in [
            "engagement_prediction",
            "platform_optimization",
            "ab_test_suggestions",
            "timing_recommendations",
            "hashtag_analysis",
            "performance_benchmarks",
            "improvement_suggestions",
        ] {
            assert!(report.contains_key(key), "missing {key}");
        }
        assert_eq!(
            report["performance_benchmarks"].as_map().unwrap()["similar_campaigns_count"].as_number(),
            Some(1.0)
        );
        assert!(report["engagement_prediction"].field_text("raw_analysis").is_some());
    }

    #[tokio::test]
    async fn test_single_failed_section_is_contained() {
        let llm = MockTextGenerator::from_fn(|req| {
            if req.prompt.starts_with("As a hashtag") {
                Err(LlmError::Network("reset".into()))
            } else {
                Ok("1. fine".to_string())
            }
        });
        let agent = AnalyticsAgent::new(Arc::new(llm), None, 5);
        let out = agent.execute(&input(), &AgentConfig::default()).await.unwrap();
        let report = out.get_map("analytics").unwrap();
        assert!(report["hashtag_analysis"].field_text("error").is_some());
        assert!(report["platform_optimization"].field_text("error").is_none());
    }

    #[tokio::test]
    async fn test_all_sections_failing_is_retryable() {
        let agent = AnalyticsAgent::new(Arc::new(MockTextGenerator::always_failing()), None, 5);
        let err = agent.execute(&input(), &AgentConfig::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::Capability(LlmError::Network(_))));
    }
}

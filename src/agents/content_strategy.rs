//! 内容策略 Agent
//!
//! 两次文本生成：策略正文（按标题分段）与 30 天内容日历（表格）。
//! 日历生成失败不影响策略结果：写入空日历与 `content_calendar_error`。
//! 活动简报（覆盖估算、预算拆分）由本地规则计算，不调用模型。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::agents::parsing::{
    clean_response, parse_calendar, parse_strategy, CalendarEntry, Parsed, StrategySections,
};
use crate::agents::CONTENT_STRATEGY;
use crate::core::state::{map, Value};
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::{LlmError, TextGenerator};

/// 每条帖子的保守覆盖估算
const REACH_PER_POST: usize = 1000;
const ENGAGEMENT_RATE: f64 = 0.05;
const DEFAULT_BUDGET: f64 = 1000.0;
const CALENDAR_TEMPERATURE: f32 = 0.6;
const CALENDAR_MAX_TOKENS: u32 = 2000;

pub struct ContentStrategyAgent {
    llm: Arc<dyn TextGenerator>,
}

impl ContentStrategyAgent {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn strategy_prompt(topic: &str, audience: &str, goals: &[String], trends: Option<&str>) -> String {
        let trends = trends
            .map(|t| format!("Trend analysis context:\n{t}\n\n"))
            .unwrap_or_default();
        format!(
            "You are a world-class content strategist with expertise in data-driven marketing.\n\n\
             Create a content strategy for:\n\
             Topic: {topic}\n\
             Target audience: {audience}\n\
             Goals: {}\n\n\
             {trends}\
             Structure the response as:\n\
             ## Targeting Strategy\n- audience personas, messaging pillars, brand voice\n\n\
             ## Content Pillars\n- 5-7 distinct content themes\n\n\
             ## Content Formats & Channels\n- one bullet per platform\n\n\
             ## KPIs & Metrics\n- success metrics and benchmark targets\n\n\
             Use bullet points under every heading.",
            goals.join(", ")
        )
    }

    fn calendar_prompt(strategy: &str) -> String {
        format!(
            "Create a 30-day content calendar based on the following content strategy.\n\n\
             {strategy}\n\n\
             Mix formats, rotate themes and consider special dates.\n\
             Format every day as one table row:\n\
             Day | Content Type | Platform | Theme | Brief Description"
        )
    }

    /// 日历生成失败返回 Err(消息)，由调用方写入错误字段而不是让整个 Agent 失败
    async fn calendar(&self, strategy: &str, config: &AgentConfig) -> Result<Parsed<CalendarEntry>, LlmError> {
        let request = config
            .request(Self::calendar_prompt(strategy))
            .with_temperature(CALENDAR_TEMPERATURE)
            .with_max_tokens(CALENDAR_MAX_TOKENS);
        let raw = self.llm.generate(&request).await?;
        Ok(parse_calendar(&clean_response(&raw)))
    }
}

/// 活动简报：名称、周期、目标、覆盖估算与预算拆分
pub fn campaign_brief(
    topic: &str,
    state: &WorkflowState,
    strategy: &StrategySections,
    calendar: &[CalendarEntry],
) -> Value {
    let duration = state.get_number("duration").unwrap_or(30.0);
    let audience = state.get_text("target_audience").unwrap_or("general");

    let total_posts = calendar.len();
    let reach = total_posts * REACH_PER_POST;
    let engagement = (reach as f64 * ENGAGEMENT_RATE).floor();

    map([
        ("campaign_name", Value::from(format!("{topic} Content Campaign"))),
        ("duration", Value::from(format!("{duration} days"))),
        ("objectives", Value::from(strategy.objectives.clone())),
        ("target_audience", Value::from(audience)),
        ("content_pillars", Value::from(strategy.content_pillars.clone())),
        ("total_posts", Value::from(total_posts)),
        (
            "estimated_reach",
            map([
                ("total_posts", Value::from(total_posts)),
                ("estimated_reach", Value::from(reach)),
                ("estimated_engagement", Value::from(engagement)),
            ]),
        ),
        ("budget_allocation", budget_allocation(state, strategy)),
    ])
}

/// 预算按 40/50/10 拆为内容制作 / 推广 / 工具，并在平台间平均分配
pub fn budget_allocation(state: &WorkflowState, strategy: &StrategySections) -> Value {
    let total = state.get_number("budget").unwrap_or(DEFAULT_BUDGET);
    let platforms = if strategy.platforms.is_empty() {
        state.get_text_list("platforms")
    } else {
        strategy.platforms.clone()
    };

    let allocation: BTreeMap<String, Value> = if platforms.is_empty() {
        BTreeMap::new()
    } else {
        let per_platform = total / platforms.len() as f64;
        platforms
            .into_iter()
            .map(|p| (p, Value::from(per_platform)))
            .collect()
    };

    map([
        ("total", Value::from(total)),
        ("allocation", Value::from(allocation)),
        (
            "breakdown",
            map([
                ("content_creation", Value::from(total * 0.4)),
                ("promotion", Value::from(total * 0.5)),
                ("tools", Value::from(total * 0.1)),
            ]),
        ),
    ])
}

#[async_trait]
impl Agent for ContentStrategyAgent {
    fn key(&self) -> &str {
        CONTENT_STRATEGY
    }

    fn name(&self) -> &str {
        "Content Strategy Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(
            &["topic"],
            &["trend_analysis_report", "target_audience", "content_goals", "platforms", "budget", "duration"],
        )
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let topic = state.get_text("topic").unwrap_or_default();
        let audience = state.get_text("target_audience").unwrap_or("general");
        let mut goals = state.get_text_list("content_goals");
        if goals.is_empty() {
            goals = vec!["engagement".to_string(), "brand_awareness".to_string()];
        }
        let trends = state
            .get_text("trend_analysis_report")
            .filter(|t| !t.trim().is_empty());

        let raw = self
            .llm
            .generate(&config.request(Self::strategy_prompt(topic, audience, &goals, trends)))
            .await?;
        let strategy_text = clean_response(&raw);
        if strategy_text.is_empty() {
            return Err(LlmError::MalformedResponse("empty content strategy".into()).into());
        }
        let strategy = parse_strategy(&strategy_text);

        let mut out = WorkflowState::new();
        let entries = match self.calendar(&strategy_text, config).await {
            Ok(Parsed::Structured(entries)) => entries,
            Ok(Parsed::Unstructured { raw }) => {
                tracing::warn!(agent = CONTENT_STRATEGY, "calendar response had no table rows");
                out.insert("content_calendar_raw", raw);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(agent = CONTENT_STRATEGY, error = %e, "calendar generation failed");
                out.insert("content_calendar_error", e.to_string());
                Vec::new()
            }
        };

        let ideas: Vec<String> = entries
            .iter()
            .map(|e| e.description.clone())
            .filter(|d| !d.is_empty())
            .collect();

        out.insert("campaign_brief", campaign_brief(topic, state, &strategy, &entries));
        out.insert("content_strategy", strategy.to_value());
        out.insert(
            "content_calendar",
            entries.iter().map(CalendarEntry::to_value).collect::<Vec<_>>(),
        );
        out.insert("ideas", ideas);
        out.insert("strategy_timestamp", Utc::now());
        Ok(out)
    }
}

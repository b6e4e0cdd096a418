//! Mock 生成器（用于测试与离线运行，无需 API）
//!
//! MockTextGenerator 默认按提示词首行识别任务类型，返回结构合理的示例输出
//! （趋势报告、策略分段、日历表格、视觉建议、平台分段），便于本地跑通整条活动流程。

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::openai::UsageCounter;
use crate::llm::{GenerationRequest, ImageGenerator, LlmError, TextGenerator, TokenUsage};

type ResponseFn = dyn Fn(&GenerationRequest) -> Result<String, LlmError> + Send + Sync;

enum Behavior {
    ByTask,
    Fixed(String),
    Custom(Arc<ResponseFn>),
    AlwaysFail,
}

/// Mock 文本生成器：可配置固定回复、前 N 次失败、恒失败与人为延迟
pub struct MockTextGenerator {
    behavior: Behavior,
    fail_first: u32,
    delay: Option<Duration>,
    calls: AtomicU32,
    usage: UsageCounter,
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::with_behavior(Behavior::ByTask)
    }
}

impl MockTextGenerator {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            fail_first: 0,
            delay: None,
            calls: AtomicU32::new(0),
            usage: UsageCounter::default(),
        }
    }

    /// 按任务类型返回示例输出
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed(text: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fixed(text.into()))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self::with_behavior(Behavior::Custom(Arc::new(f)))
    }

    /// 前 n 次返回网络错误，之后返回 text
    pub fn failing_first(n: u32, text: impl Into<String>) -> Self {
        Self {
            fail_first: n,
            ..Self::fixed(text)
        }
    }

    pub fn always_failing() -> Self {
        Self::with_behavior(Behavior::AlwaysFail)
    }

    /// 每次调用前等待 delay（用于超时测试）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 已收到的调用次数（含失败与被超时取消的调用）
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    /// 按空白分词近似计数，只统计成功的调用
    fn token_usage(&self) -> TokenUsage {
        self.usage.snapshot()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if index < self.fail_first {
            return Err(LlmError::Network(format!("mock transient failure #{}", index + 1)));
        }
        let response = match &self.behavior {
            Behavior::ByTask => task_response(&request.prompt),
            Behavior::Fixed(text) => text.clone(),
            Behavior::Custom(f) => f(request)?,
            Behavior::AlwaysFail => return Err(LlmError::Network("mock connection refused".into())),
        };
        self.usage.add(
            request.prompt.split_whitespace().count() as u64,
            response.split_whitespace().count() as u64,
        );
        Ok(response)
    }
}

/// 按提示词首行中的任务关键词返回示例输出
pub fn task_response(prompt: &str) -> String {
    let head = prompt.lines().next().unwrap_or_default().to_lowercase();

    if head.contains("content calendar") {
        let mut table = String::from(
            "Day | Content Type | Platform | Theme | Brief Description\n---|---|---|---|---\n",
        );
        let platforms = ["instagram", "facebook", "tiktok"];
        let themes = ["education", "behind the scenes", "community", "product", "tips"];
        for day in 1..=30 {
            table.push_str(&format!(
                "{day} | post | {} | {} | Idea for day {day}\n",
                platforms[day % platforms.len()],
                themes[day % themes.len()],
            ));
        }
        return table;
    }
    if head.contains("trend analysis") {
        return "<think>collecting signals</think>\n## Current Trends\n- Trend: short-form video keeps growing\n- Trend: authenticity over polish\n\n## Content Opportunities\n- Opportunity: creator collaborations\n\n## Warnings\n- Risk: greenwashing backlash".to_string();
    }
    if head.contains("content strategist") {
        return "## Targeting Strategy\n- Grow awareness among the target audience\n- Build a loyal community\n\n## Content Pillars\n- Education\n- Behind the scenes\n- Community stories\n\n## Content Formats & Channels\n- instagram\n- facebook\n\n## KPIs & Metrics\n- Engagement rate above 5%\n- Follower growth".to_string();
    }
    if head.contains("creative director") {
        return "description: A bright flat-lay of the product||prompt: flat lay photo, natural light, minimal\ndescription: A close-up of hands at work||prompt: close-up of hands crafting, warm tones\ndescription: A community group shot||prompt: diverse group smiling outdoors, golden hour".to_string();
    }
    if head.contains("social media optimization") {
        return "## instagram\nShort caption with #hashtags and a call to action.\n\n## facebook\nLonger story-driven post with a question for the community.".to_string();
    }
    if head.contains("optimization consultant") {
        return "1. Open with a question\n2. End with a clear call to action\n3. Add a customer quote\n- Keep sentences short\n- Match the brand voice".to_string();
    }
    if head.contains("client briefing") {
        return "Creative Brief\n\nObjective: raise awareness.\nAudience: as defined.\nKey message: authenticity.\nDeliverables: posts, visuals, social copy.".to_string();
    }
    format!("Mock draft ({} chars of prompt). Engaging copy goes here. ✨", prompt.len())
}

/// Mock 图像生成器：返回固定 URL 或恒失败
pub struct MockImageGenerator {
    url: Option<String>,
    calls: AtomicU32,
}

impl MockImageGenerator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            url: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockImageGenerator {
    fn default() -> Self {
        Self::new("http://127.0.0.1:9/mock-image.png")
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate_image(&self, _prompt: &str, _size: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.url
            .clone()
            .ok_or_else(|| LlmError::Api("mock image generation disabled".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_first_then_fixed() {
        let mock = MockTextGenerator::failing_first(1, "ok");
        let req = GenerationRequest::new("hi", "m");
        assert!(mock.generate(&req).await.is_err());
        assert_eq!(mock.generate(&req).await.unwrap(), "ok");
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_calendar_response_has_thirty_rows() {
        let mock = MockTextGenerator::new();
        let req = GenerationRequest::new("Create a 30-day content calendar\n...", "m");
        let text = mock.generate(&req).await.unwrap();
        assert_eq!(text.lines().filter(|l| l.contains("Idea for day")).count(), 30);
    }

    #[tokio::test]
    async fn test_usage_counts_successful_calls_only() {
        let mock = MockTextGenerator::failing_first(1, "three word reply");
        let req = GenerationRequest::new("two words", "m");
        let _ = mock.generate(&req).await;
        mock.generate(&req).await.unwrap();

        let usage = mock.token_usage();
        assert_eq!(usage.prompt_tokens, 2);
        assert_eq!(usage.completion_tokens, 3);
        assert_eq!(usage.total_tokens, 5);
    }
}

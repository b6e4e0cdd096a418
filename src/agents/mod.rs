//! 营销 Agent：趋势分析、内容策略、文案、视觉建议、图像生成、社媒优化、客户简报
//!
//! 活动之外还有三个顾问 Agent（活动策略、品牌语调、表现优化，可在流水线中按 key 调用）
//! 与可选的内容分析 Agent。
//! 各 Agent 只负责构造提示词与解析输出；重试、超时、指标由 core::runner 统一处理。

pub mod analytics;
pub mod brand_voice;
pub mod campaign_strategist;
pub mod client_briefing;
pub mod content_strategy;
pub mod content_writer;
pub mod image_generation;
pub mod parsing;
pub mod performance_optimizer;
pub mod social_media;
pub mod trend_analysis;
pub mod visual_suggestion;

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::Agent;
use crate::llm::{ImageGenerator, TextGenerator};

pub use analytics::AnalyticsAgent;
pub use brand_voice::BrandVoiceAgent;
pub use campaign_strategist::CampaignStrategistAgent;
pub use client_briefing::ClientBriefingAgent;
pub use content_strategy::ContentStrategyAgent;
pub use content_writer::ContentWriterAgent;
pub use image_generation::ImageGenerationAgent;
pub use performance_optimizer::PerformanceOptimizerAgent;
pub use social_media::SocialMediaAgent;
pub use trend_analysis::TrendAnalysisAgent;
pub use visual_suggestion::VisualSuggestionAgent;

pub const TREND_ANALYSIS: &str = "trend_analysis";
pub const CONTENT_STRATEGY: &str = "content_strategy";
pub const CONTENT_WRITER: &str = "content_writer";
pub const VISUAL_SUGGESTION: &str = "visual_suggestion";
pub const IMAGE_GENERATION: &str = "image_generation";
pub const SOCIAL_MEDIA: &str = "social_media";
pub const CLIENT_BRIEFING: &str = "client_briefing";
pub const CAMPAIGN_STRATEGIST: &str = "campaign_strategist";
pub const BRAND_VOICE: &str = "brand_voice";
pub const PERFORMANCE_OPTIMIZER: &str = "performance_optimizer";
pub const CONTENT_ANALYTICS: &str = "content_analytics";

/// 图像 Agent 的输出参数
#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub size: String,
    pub output_dir: PathBuf,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            size: "1024x1024".to_string(),
            output_dir: PathBuf::from("output/images"),
        }
    }
}

/// 七个 Agent 各一个实例，共享同一组生成能力
pub fn default_agents(
    text: Arc<dyn TextGenerator>,
    image: Arc<dyn ImageGenerator>,
    image_options: ImageOptions,
) -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(TrendAnalysisAgent::new(text.clone())),
        Arc::new(ContentStrategyAgent::new(text.clone())),
        Arc::new(ContentWriterAgent::new(text.clone())),
        Arc::new(VisualSuggestionAgent::new(text.clone())),
        Arc::new(ImageGenerationAgent::new(image, image_options)),
        Arc::new(SocialMediaAgent::new(text.clone())),
        Arc::new(ClientBriefingAgent::new(text)),
    ]
}

/// 顾问 Agent：不参与六阶段活动，供流水线与单阶段调用
pub fn advisory_agents(text: Arc<dyn TextGenerator>) -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(CampaignStrategistAgent::new(text.clone())),
        Arc::new(BrandVoiceAgent::new(text.clone())),
        Arc::new(PerformanceOptimizerAgent::new(text)),
    ]
}

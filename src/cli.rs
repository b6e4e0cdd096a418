//! 命令行参数

use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;
use crate::workflow::CampaignRequest;

#[derive(Parser, Debug)]
#[command(name = "muse")]
#[command(about = "Marketing content agent pipeline: trends, strategy, copy, visuals and briefing")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Extra config file layered over config/default.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the built-in mock text and image generators
    #[arg(long, global = true)]
    pub mock: bool,

    /// Disable campaign persistence
    #[arg(long, global = true)]
    pub no_store: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the six-phase marketing campaign
    Campaign {
        topic: String,

        #[arg(long, default_value = "general")]
        audience: String,

        /// Content goal (repeatable)
        #[arg(long = "goal")]
        goals: Vec<String>,

        /// Target platform (repeatable)
        #[arg(long = "platform")]
        platforms: Vec<String>,

        /// Campaign length in days
        #[arg(long, default_value_t = 30)]
        duration: u32,

        #[arg(long, default_value_t = 1000.0)]
        budget: f64,

        /// Skip image generation in the visual assets phase
        #[arg(long)]
        no_images: bool,
    },
    /// Run agents in order on an initial JSON state
    Pipeline {
        /// Comma separated agent keys, e.g. trend_analysis,content_strategy
        #[arg(long, value_delimiter = ',', required = true)]
        steps: Vec<String>,

        /// Initial state as a JSON object
        #[arg(long, default_value = "{}")]
        input: String,
    },
    /// Print agent metrics and system health
    Status,
    /// Print stored campaigns with their ideas, drafts and platform versions
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Analyze content performance for a JSON state carrying final_content
    Analyze {
        /// State as a JSON object, e.g. {"topic": "Coffee", "final_content": "..."}
        #[arg(long)]
        input: String,
    },
    /// Record the measured engagement score of a stored campaign
    Score {
        campaign_id: i64,
        score: f64,
    },
}

impl Args {
    /// 把命令行开关叠加到已加载的配置上
    pub fn apply(&self, cfg: &mut AppConfig) {
        if self.mock {
            cfg.llm.provider = "mock".to_string();
            cfg.image.provider = "mock".to_string();
        }
        if self.no_store {
            cfg.storage.enabled = false;
        }
        if let Commands::Campaign { no_images: true, .. } = self.command {
            cfg.workflow.generate_images = false;
        }
        if let Commands::Analyze { .. } = self.command {
            cfg.analytics.enabled = true;
        }
    }
}

impl Commands {
    /// 需要文本/图像生成能力（因而需要 API Key）的子命令；其余只读存储与状态
    pub fn needs_generators(&self) -> bool {
        matches!(
            self,
            Commands::Campaign { .. } | Commands::Pipeline { .. } | Commands::Analyze { .. }
        )
    }

    /// campaign 子命令对应的活动请求；未给出的目标与平台沿用默认值
    pub fn campaign_request(&self) -> Option<CampaignRequest> {
        let Commands::Campaign {
            topic,
            audience,
            goals,
            platforms,
            duration,
            budget,
            ..
        } = self
        else {
            return None;
        };
        let mut request = CampaignRequest::new(topic.as_str())
            .target_audience(audience.as_str())
            .duration(*duration)
            .budget(*budget);
        if !goals.is_empty() {
            request = request.content_goals(goals.clone());
        }
        if !platforms.is_empty() {
            request = request.platforms(platforms.clone());
        }
        Some(request)
    }
}

//! 工作流：流水线定义、顺序/批处理引擎、六阶段活动与运行历史

pub mod builder;
pub mod campaign;
pub mod engine;
pub mod history;
pub mod types;

pub use builder::{Pipeline, PipelineBuilder};
pub use campaign::{compile_summary, CampaignOutcome, CampaignRunner};
pub use history::WorkflowHistory;
pub use types::*;

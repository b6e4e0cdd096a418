//! 记忆层：活动（campaign）→ 创意（idea）→ 草稿（draft）→ 平台改写稿的可选持久化，
//! 以及按主题检索同类活动的表现记录
//!
//! 持久化是尽力而为的旁路：打开失败时编排器降级运行，写入失败只记日志。

pub mod persistence;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use persistence::SqliteCampaignStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("campaign {0} not found")]
    CampaignNotFound(i64),
}

/// save_campaign 的返回：活动 id 与按输入顺序排列的 (idea_id, 创意文本)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignIds {
    pub campaign_id: i64,
    pub ideas: Vec<(i64, String)>,
}

/// 某一平台的改写稿，挂在原始草稿下
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecializedDraftRecord {
    pub id: i64,
    pub platform: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub specialized: Vec<SpecializedDraftRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaHistory {
    pub id: i64,
    pub text: String,
    pub drafts: Vec<DraftRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignHistory {
    pub id: i64,
    pub topic: String,
    pub engagement_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub ideas: Vec<IdeaHistory>,
}

/// 已打分活动的表现记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignPerformance {
    pub id: i64,
    pub topic: String,
    pub engagement_score: f64,
    pub created_at: DateTime<Utc>,
}

/// 活动存储（同步接口；异步调用方经 spawn_blocking 使用）
pub trait CampaignStore: Send + Sync {
    /// 保存活动及其创意；创意文本会去掉前导编号（"1. "）并忽略空行
    fn save_campaign(&self, topic: &str, ideas: &[String]) -> Result<CampaignIds, StoreError>;

    fn save_draft(&self, idea_id: i64, text: &str) -> Result<i64, StoreError>;

    /// 保存某平台的改写稿，关联到原始草稿
    fn save_specialized_draft(
        &self,
        draft_id: i64,
        platform: &str,
        text: &str,
    ) -> Result<i64, StoreError>;

    /// 回填活动的互动得分；活动不存在时返回 CampaignNotFound
    fn record_engagement(&self, campaign_id: i64, score: f64) -> Result<(), StoreError>;

    /// 主题互相包含（不区分大小写）且已打分的活动，得分高的在前，最多 limit 条
    fn similar_campaigns(&self, topic: &str, limit: usize)
        -> Result<Vec<CampaignPerformance>, StoreError>;

    /// 全部活动（新的在前），每个活动内的创意与草稿按写入顺序
    fn get_history(&self) -> Result<Vec<CampaignHistory>, StoreError>;
}

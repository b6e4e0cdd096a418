//! SQLite 活动存储
//!
//! 四张表：campaigns / ideas / drafts / specialized_drafts，外键逐级关联；连接由 Mutex 保护。
//! campaigns.engagement_score 由外部回填，用于同类活动的表现基准。

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::memory::{
    CampaignHistory, CampaignIds, CampaignPerformance, CampaignStore, DraftRecord, IdeaHistory,
    SpecializedDraftRecord, StoreError,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS campaigns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic TEXT NOT NULL,
    engagement_score REAL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS ideas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id INTEGER NOT NULL REFERENCES campaigns (id),
    idea_text TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS drafts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    idea_id INTEGER NOT NULL REFERENCES ideas (id),
    draft_text TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS specialized_drafts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_draft_id INTEGER NOT NULL REFERENCES drafts (id),
    platform TEXT NOT NULL,
    specialized_text TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

pub struct SqliteCampaignStore {
    conn: Mutex<Connection>,
}

/// 去掉创意前的编号："1. 标题" / "2 标题" -> "标题"
pub(crate) fn strip_numbering(idea: &str) -> &str {
    let rest = idea.trim().trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == idea.trim().len() {
        return rest;
    }
    rest.strip_prefix('.').unwrap_or(rest).trim_start()
}

impl SqliteCampaignStore {
    /// 打开（必要时创建）数据库文件并建表
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("campaign store schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CampaignStore for SqliteCampaignStore {
    fn save_campaign(&self, topic: &str, ideas: &[String]) -> Result<CampaignIds, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now();

        tx.execute(
            "INSERT INTO campaigns (topic, created_at) VALUES (?1, ?2)",
            params![topic, now],
        )?;
        let campaign_id = tx.last_insert_rowid();

        let mut saved = Vec::new();
        for idea in ideas {
            let text = strip_numbering(idea).trim().to_string();
            if text.is_empty() {
                continue;
            }
            tx.execute(
                "INSERT INTO ideas (campaign_id, idea_text, created_at) VALUES (?1, ?2, ?3)",
                params![campaign_id, text, now],
            )?;
            saved.push((tx.last_insert_rowid(), text));
        }
        tx.commit()?;

        tracing::info!(campaign_id, ideas = saved.len(), "campaign saved");
        Ok(CampaignIds {
            campaign_id,
            ideas: saved,
        })
    }

    fn save_draft(&self, idea_id: i64, text: &str) -> Result<i64, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO drafts (idea_id, draft_text, created_at) VALUES (?1, ?2, ?3)",
            params![idea_id, text, Utc::now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn save_specialized_draft(
        &self,
        draft_id: i64,
        platform: &str,
        text: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO specialized_drafts (original_draft_id, platform, specialized_text, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![draft_id, platform, text, Utc::now()],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(draft_id, platform, "specialized draft saved");
        Ok(id)
    }

    fn record_engagement(&self, campaign_id: i64, score: f64) -> Result<(), StoreError> {
        let updated = self.conn().execute(
            "UPDATE campaigns SET engagement_score = ?1 WHERE id = ?2",
            params![score, campaign_id],
        )?;
        if updated == 0 {
            return Err(StoreError::CampaignNotFound(campaign_id));
        }
        Ok(())
    }

    fn similar_campaigns(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<CampaignPerformance>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, topic, engagement_score, created_at FROM campaigns \
             WHERE engagement_score IS NOT NULL \
               AND (topic LIKE '%' || ?1 || '%' OR ?1 LIKE '%' || topic || '%') \
             ORDER BY engagement_score DESC, id DESC LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![topic.trim(), limit], |row| {
                Ok(CampaignPerformance {
                    id: row.get(0)?,
                    topic: row.get(1)?,
                    engagement_score: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_history(&self) -> Result<Vec<CampaignHistory>, StoreError> {
        let conn = self.conn();

        let mut campaigns_stmt = conn.prepare(
            "SELECT id, topic, engagement_score, created_at FROM campaigns ORDER BY id DESC",
        )?;
        let mut ideas_stmt = conn
            .prepare("SELECT id, idea_text FROM ideas WHERE campaign_id = ?1 ORDER BY id")?;
        let mut drafts_stmt = conn.prepare(
            "SELECT id, draft_text, created_at FROM drafts WHERE idea_id = ?1 ORDER BY id",
        )?;
        let mut specialized_stmt = conn.prepare(
            "SELECT id, platform, specialized_text, created_at FROM specialized_drafts \
             WHERE original_draft_id = ?1 ORDER BY id",
        )?;

        let campaigns = campaigns_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<Result<Vec<(i64, String, Option<f64>, chrono::DateTime<Utc>)>, _>>()?;

        let mut history = Vec::with_capacity(campaigns.len());
        for (id, topic, engagement_score, created_at) in campaigns {
            let ideas = ideas_stmt
                .query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<(i64, String)>, _>>()?;

            let mut idea_entries = Vec::with_capacity(ideas.len());
            for (idea_id, text) in ideas {
                let mut drafts = drafts_stmt
                    .query_map(params![idea_id], |row| {
                        Ok(DraftRecord {
                            id: row.get(0)?,
                            text: row.get(1)?,
                            created_at: row.get(2)?,
                            specialized: Vec::new(),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                for draft in &mut drafts {
                    draft.specialized = specialized_stmt
                        .query_map(params![draft.id], |row| {
                            Ok(SpecializedDraftRecord {
                                id: row.get(0)?,
                                platform: row.get(1)?,
                                text: row.get(2)?,
                                created_at: row.get(3)?,
                            })
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                }
                idea_entries.push(IdeaHistory {
                    id: idea_id,
                    text,
                    drafts,
                });
            }

            history.push(CampaignHistory {
                id,
                topic,
                engagement_score,
                created_at,
                ideas: idea_entries,
            });
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_ideas_drafts_round_trip() {
        let store = SqliteCampaignStore::in_memory().unwrap();
        let ids = store
            .save_campaign(
                "Sustainable Fashion",
                &["1. Upcycling tips".to_string(), "  ".to_string(), "2 Thrift haul".to_string()],
            )
            .unwrap();
        assert_eq!(ids.ideas.len(), 2);
        assert_eq!(ids.ideas[0].1, "Upcycling tips");
        assert_eq!(ids.ideas[1].1, "Thrift haul");

        store.save_draft(ids.ideas[0].0, "draft one").unwrap();
        store.save_draft(ids.ideas[0].0, "draft two").unwrap();

        let history = store.get_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].topic, "Sustainable Fashion");
        let drafts: Vec<&str> = history[0].ideas[0].drafts.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(drafts, vec!["draft one", "draft two"]);
        assert!(history[0].ideas[1].drafts.is_empty());
    }

    #[test]
    fn test_history_newest_first_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("campaigns.db");
        {
            let store = SqliteCampaignStore::open(&path).unwrap();
            store.save_campaign("first", &[]).unwrap();
            store.save_campaign("second", &[]).unwrap();
        }
        let reopened = SqliteCampaignStore::open(&path).unwrap();
        let topics: Vec<String> = reopened
            .get_history()
            .unwrap()
            .into_iter()
            .map(|c| c.topic)
            .collect();
        assert_eq!(topics, vec!["second".to_string(), "first".to_string()]);
    }

    #[test]
    fn test_specialized_drafts_nest_under_their_draft() {
        let store = SqliteCampaignStore::in_memory().unwrap();
        let ids = store.save_campaign("Coffee", &["Latte art".to_string()]).unwrap();
        let draft_id = store.save_draft(ids.ideas[0].0, "base copy").unwrap();
        store.save_specialized_draft(draft_id, "instagram", "short + #latte").unwrap();
        store.save_specialized_draft(draft_id, "facebook", "longer story").unwrap();

        let history = store.get_history().unwrap();
        let draft = &history[0].ideas[0].drafts[0];
        let platforms: Vec<&str> = draft.specialized.iter().map(|s| s.platform.as_str()).collect();
        assert_eq!(platforms, vec!["instagram", "facebook"]);
        assert_eq!(draft.specialized[0].text, "short + #latte");
    }

    #[test]
    fn test_similar_campaigns_ranked_by_engagement() {
        let store = SqliteCampaignStore::in_memory().unwrap();
        let low = store.save_campaign("Coffee beans", &[]).unwrap().campaign_id;
        let high = store.save_campaign("coffee", &[]).unwrap().campaign_id;
        let unrelated = store.save_campaign("Running shoes", &[]).unwrap().campaign_id;
        store.save_campaign("Coffee unscored", &[]).unwrap();
        store.record_engagement(low, 2.0).unwrap();
        store.record_engagement(high, 7.5).unwrap();
        store.record_engagement(unrelated, 9.0).unwrap();

        let similar = store.similar_campaigns("Coffee", 5).unwrap();
        let found: Vec<i64> = similar.iter().map(|c| c.id).collect();
        assert_eq!(found, vec![high, low]);
        assert_eq!(similar[0].engagement_score, 7.5);
        assert_eq!(store.similar_campaigns("Coffee", 1).unwrap().len(), 1);
        assert_eq!(store.get_history().unwrap()[2].engagement_score, Some(7.5));
    }

    #[test]
    fn test_engagement_for_unknown_campaign_is_rejected() {
        let store = SqliteCampaignStore::in_memory().unwrap();
        assert!(matches!(
            store.record_engagement(42, 1.0),
            Err(StoreError::CampaignNotFound(42))
        ));
    }
}

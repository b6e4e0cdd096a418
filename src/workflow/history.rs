//! 工作流历史：只追加、按执行顺序保存运行记录

use std::sync::{Arc, PoisonError, RwLock};

use crate::workflow::types::WorkflowRecord;

#[derive(Default)]
pub struct WorkflowHistory {
    records: RwLock<Vec<Arc<WorkflowRecord>>>,
}

impl WorkflowHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条记录并返回共享引用；追加之间串行
    pub fn append(&self, record: WorkflowRecord) -> Arc<WorkflowRecord> {
        let record = Arc::new(record);
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        record
    }

    /// 最近 limit 条，按执行顺序（旧的在前）
    pub fn recent(&self, limit: usize) -> Vec<Arc<WorkflowRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let start = records.len().saturating_sub(limit);
        records[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_id(&self) -> Option<String> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|r| r.workflow_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorkflowState;
    use crate::workflow::types::{WorkflowError, WorkflowKind};
    use chrono::Utc;

    fn record(id: &str) -> WorkflowRecord {
        WorkflowRecord::failed(
            id.to_string(),
            WorkflowKind::Pipeline,
            Utc::now(),
            WorkflowState::new(),
            &WorkflowError::EmptyPipeline,
        )
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let history = WorkflowHistory::new();
        for id in ["a", "b", "c"] {
            history.append(record(id));
        }
        let ids: Vec<String> = history.recent(2).iter().map(|r| r.workflow_id.clone()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(history.recent(10).len(), 3);
        assert!(history.recent(0).is_empty());
        assert_eq!(history.last_id().as_deref(), Some("c"));
    }
}

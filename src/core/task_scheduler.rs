//! 批处理调度：同一阶段内的子任务并发执行，用 Semaphore 限制同时在途的数量

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// 批处理调度器（默认并发 3，上限为 Semaphore::MAX_PERMITS）
#[derive(Clone)]
pub struct BatchScheduler {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl BatchScheduler {
    pub fn new(max_concurrent: usize) -> Self {
        let limit = max_concurrent.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 在许可内运行一个子任务；信号量永不关闭，取许可失败时直接运行
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.semaphore.clone().acquire_owned().await.ok();
        task.await
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(3)
    }
}

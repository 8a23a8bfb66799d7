use async_trait::async_trait;

use crate::{models::JobExecution, SchedulerResult};

/// 作业入队接口
///
/// 结果通过队列创建时返回的通道异步送达，这里只负责接收作业。
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 入队并返回作业id；同一队列名已有未结束的作业时返回 `DuplicateJob`
    async fn enqueue(&self, job: JobExecution) -> SchedulerResult<u64>;
}

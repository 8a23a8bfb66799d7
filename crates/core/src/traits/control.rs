use async_trait::async_trait;

use crate::{models::CreateTaskRequest, SchedulerResult};

/// 对外暴露的两个控制操作，传输层只依赖这个接口
#[async_trait]
pub trait TaskControlService: Send + Sync {
    /// 创建或覆盖任务并布置触发器
    async fn create_task(&self, request: CreateTaskRequest) -> SchedulerResult<()>;

    /// 取消触发器；`only_trigger` 为 false 时同时停用任务
    async fn cancel_task(&self, code: &str, only_trigger: bool) -> SchedulerResult<()>;
}

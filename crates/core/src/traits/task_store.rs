//! 任务状态存储接口
//!
//! 任务定义记录和两张目录表（调度类型、优先级）的读写抽象。
//! 一个任务编码对应的记录只由调度服务修改。

use async_trait::async_trait;

use crate::{
    models::{CronType, PriorityTask, TaskDefinition, TaskOutcomeUpdate},
    SchedulerResult,
};

#[async_trait]
pub trait TaskStateStore: Send + Sync {
    async fn get_cron_type(&self, id: i64) -> SchedulerResult<Option<CronType>>;

    async fn get_priority(&self, id: i64) -> SchedulerResult<Option<PriorityTask>>;

    /// 读取任务定义，同时关联出调度类型和优先级
    async fn get_by_code(&self, code: &str) -> SchedulerResult<Option<TaskDefinition>>;

    /// 按 `code` 插入或更新任务定义
    async fn save(&self, definition: &TaskDefinition) -> SchedulerResult<()>;

    /// 修改启用状态，返回记录是否存在
    async fn set_active(&self, code: &str, is_active: bool) -> SchedulerResult<bool>;

    /// 写回一次终态执行结果，返回记录是否存在
    async fn save_outcome(&self, code: &str, update: TaskOutcomeUpdate) -> SchedulerResult<bool>;

    async fn get_active_tasks(&self) -> SchedulerResult<Vec<TaskDefinition>>;
}

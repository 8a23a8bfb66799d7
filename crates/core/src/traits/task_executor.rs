//! 任务执行器接口定义
//!
//! 每种任务类型对应一个执行器，执行队列按任务编码找到执行器并运行作业。
//!
//! ## 执行器钩子
//!
//! 作业的终态结果写回任务定义之后，调度服务按顺序调用执行器的钩子：
//!
//! - `on_completed` 作业成功
//! - `on_failed_attempt` 单次尝试失败，之后还会重试
//! - `on_failed` 尝试次数耗尽
//!
//! 钩子默认什么都不做。
//!
//! ## 示例
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use task_scheduler_core::{models::JobExecution, traits::TaskExecutor, SchedulerResult};
//!
//! struct CleanupExecutor;
//!
//! #[async_trait]
//! impl TaskExecutor for CleanupExecutor {
//!     fn name(&self) -> &str {
//!         "cleanup"
//!     }
//!
//!     async fn execute(&self, job: &JobExecution) -> SchedulerResult<serde_json::Value> {
//!         Ok(serde_json::json!({ "removed": 0 }))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    models::{ExecutionOptions, JobExecution},
    SchedulerResult,
};

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn name(&self) -> &str;

    /// 该任务类型自己的执行参数，None 时使用全局默认值
    fn execution_options(&self) -> Option<ExecutionOptions> {
        None
    }

    async fn execute(&self, job: &JobExecution) -> SchedulerResult<serde_json::Value>;

    async fn on_completed(&self, _task_code: &str, _result: &serde_json::Value) {}

    async fn on_failed_attempt(&self, _task_code: &str, _attempt: u32, _error: &str) {}

    async fn on_failed(&self, _task_code: &str, _error: &str) {}
}

/// 执行器注册表，以任务类型为键
#[async_trait]
pub trait ExecutorRegistry: Send + Sync {
    async fn register(
        &mut self,
        task_type: String,
        executor: Arc<dyn TaskExecutor>,
    ) -> SchedulerResult<()>;

    async fn get(&self, task_type: &str) -> Option<Arc<dyn TaskExecutor>>;

    async fn contains(&self, task_type: &str) -> bool;

    async fn list_executors(&self) -> Vec<String>;

    async fn unregister(&mut self, task_type: &str) -> SchedulerResult<bool>;
}

//! 基础设施实现：任务状态存储和作业执行队列

pub mod database;
pub mod queue;

pub use database::{default_cron_types, default_priorities, InMemoryTaskStateStore, SqliteTaskStateStore};
pub use queue::{ExecutionQueue, ExecutionQueueConfig};

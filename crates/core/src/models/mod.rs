//! # 数据模型
//!
//! 调度系统的核心数据结构：
//!
//! - [`TaskDefinition`] 以 `code` 为键的持久化任务定义
//! - [`CronType`] / [`PriorityTask`] 调度类型和优先级目录
//! - [`JobExecution`] 入队执行的作业，及其结果 [`JobOutcome`]
//! - [`TriggerExpression`] / [`TriggerPlan`] 由调度描述计算出的触发器
//!
//! 所有时间字段都使用 `DateTime<Utc>`。

pub mod job;
pub mod task;
pub mod trigger;

pub use job::*;
pub use task::*;
pub use trigger::*;

//! 任务状态存储实现
//!
//! - [`InMemoryTaskStateStore`] 进程内存储，进程退出后数据丢失
//! - [`SqliteTaskStateStore`] SQLite持久化存储

pub mod in_memory_store;
pub mod sqlite;

pub use in_memory_store::InMemoryTaskStateStore;
pub use sqlite::SqliteTaskStateStore;

use task_scheduler_core::models::{CronType, PriorityTask, ScheduleKind};

/// 调度类型目录的初始数据
pub fn default_cron_types() -> Vec<CronType> {
    vec![
        CronType::new(1, ScheduleKind::Once, "单次执行"),
        CronType::new(2, ScheduleKind::OnceADay, "每天执行"),
        CronType::new(3, ScheduleKind::Interval, "固定间隔"),
        CronType::new(4, ScheduleKind::IntervalWithStartDate, "指定开始时间的固定间隔"),
    ]
}

/// 任务优先级目录的初始数据
pub fn default_priorities() -> Vec<PriorityTask> {
    vec![
        PriorityTask::new(1, "low", 1),
        PriorityTask::new(2, "normal", 5),
        PriorityTask::new(3, "high", 10),
        PriorityTask::new(4, "critical", 20),
    ]
}

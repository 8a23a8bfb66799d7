use std::time::Duration;

use task_scheduler_core::config::QueueConfig;

#[derive(Debug, Clone)]
pub struct ExecutionQueueConfig {
    /// 只清理属于该命名空间的作业
    pub environment: String,
    /// 工作池大小
    pub concurrency: usize,
    pub completed_retention: Duration,
    pub failed_retention: Duration,
}

impl ExecutionQueueConfig {
    pub fn new(environment: impl Into<String>, queue: &QueueConfig) -> Self {
        Self {
            environment: environment.into(),
            concurrency: queue.concurrency.max(1),
            completed_retention: Duration::from_millis(queue.completed_retention_ms),
            failed_retention: Duration::from_millis(queue.failed_retention_ms),
        }
    }

    /// 作业队列名的命名空间前缀
    pub fn namespace_prefix(&self) -> String {
        format!("{}:", self.environment)
    }
}

impl Default for ExecutionQueueConfig {
    fn default() -> Self {
        Self::new("develop", &QueueConfig::default())
    }
}

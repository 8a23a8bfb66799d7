use std::sync::Arc;
use std::time::Instant;

use task_scheduler_core::{
    traits::TaskStateStore, LogContext, SchedulerResult, StructuredLogger,
};

use crate::scheduler::SchedulerService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryReport {
    pub armed: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// 进程启动时恢复所有启用任务的触发器
pub struct Supervisor {
    service: Arc<SchedulerService>,
    store: Arc<dyn TaskStateStore>,
}

impl Supervisor {
    pub fn new(service: Arc<SchedulerService>, store: Arc<dyn TaskStateStore>) -> Self {
        Self { service, store }
    }

    /// 单个任务恢复失败只记录日志，不影响其他任务
    pub async fn recover(&self) -> SchedulerResult<RecoveryReport> {
        let started = Instant::now();
        let definitions = self.store.get_active_tasks().await?;

        let mut report = RecoveryReport::default();
        for definition in &definitions {
            match self.service.start(definition).await {
                Ok(()) => report.armed += 1,
                Err(e) => {
                    report.failed += 1;
                    let err = e.into_task_start(&definition.code);
                    let ctx = LogContext::for_task(&definition.code).with("operation", "recover");
                    StructuredLogger::log_error(&ctx, &err);
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        StructuredLogger::log_recovery_complete(report.armed, report.failed, report.duration_ms);
        Ok(report)
    }
}

//! Structured logging utilities
//!
//! Every scheduling event is emitted as a `tracing` event with an `event`
//! field so log pipelines can filter on it.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::{log_context::LogContext, log_level::LogType};
use crate::errors::SchedulerError;

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_task_created(
        ctx: &LogContext,
        kind: &str,
        cron_value: &str,
        date_next: DateTime<Utc>,
    ) {
        info!(
            event = "task_created",
            task.code = ctx.get("task_code").unwrap_or_default(),
            task.kind = kind,
            task.cron_value = cron_value,
            task.date_next = %date_next,
            context = %ctx.render(LogType::Info),
            "Task created and armed"
        );
    }

    pub fn log_task_cancelled(code: &str, only_trigger: bool, existed: bool) {
        info!(
            event = "task_cancelled",
            task.code = code,
            task.only_trigger = only_trigger,
            task.existed = existed,
            "Task trigger cancelled"
        );
    }

    pub fn log_task_rearmed(code: &str, kind: &str, cron_value: &str) {
        info!(
            event = "task_rearmed",
            task.code = code,
            task.kind = kind,
            task.cron_value = cron_value,
            "Task trigger re-armed from stored definition"
        );
    }

    pub fn log_trigger_armed(code: &str, generation: u64, primary: &str, secondary: Option<&str>) {
        debug!(
            event = "trigger_armed",
            task.code = code,
            trigger.generation = generation,
            trigger.primary = primary,
            trigger.secondary = secondary.unwrap_or("-"),
            "Trigger armed"
        );
    }

    pub fn log_trigger_fired(code: &str, generation: u64, scheduled_for: DateTime<Utc>) {
        debug!(
            event = "trigger_fired",
            task.code = code,
            trigger.generation = generation,
            trigger.scheduled_for = %scheduled_for,
            "Trigger fired"
        );
    }

    pub fn log_fire_skipped(code: &str, reason: &str) {
        warn!(
            event = "fire_skipped",
            task.code = code,
            reason = reason,
            "Trigger fire skipped"
        );
    }

    pub fn log_job_enqueued(code: &str, job_id: u64, queue_name: &str, priority: i32) {
        info!(
            event = "job_enqueued",
            task.code = code,
            job.id = job_id,
            job.queue_name = queue_name,
            job.priority = priority,
            "Job enqueued"
        );
    }

    pub fn log_job_completed(code: &str, job_id: u64, date_next: DateTime<Utc>) {
        info!(
            event = "job_completed",
            task.code = code,
            job.id = job_id,
            task.date_next = %date_next,
            "Job completed"
        );
    }

    pub fn log_job_failed_attempt(code: &str, job_id: u64, attempt: u32, error_message: &str) {
        warn!(
            event = "job_failed_attempt",
            task.code = code,
            job.id = job_id,
            job.attempt = attempt,
            job.error = error_message,
            "Job attempt failed, will retry"
        );
    }

    pub fn log_job_failed(code: &str, job_id: u64, attempts: u32, error_message: &str) {
        error!(
            event = "job_failed",
            task.code = code,
            job.id = job_id,
            job.attempts = attempts,
            job.error = error_message,
            "Job failed after exhausting attempts"
        );
    }

    pub fn log_jobs_swept(environment: &str, state: &str, removed: usize) {
        if removed > 0 {
            debug!(
                event = "jobs_swept",
                queue.environment = environment,
                job.state = state,
                removed = removed,
                "Terminal jobs removed by retention sweep"
            );
        }
    }

    pub fn log_recovery_complete(armed: usize, failed: usize, duration_ms: u64) {
        info!(
            event = "recovery_complete",
            recovery.armed = armed,
            recovery.failed = failed,
            recovery.duration_ms = duration_ms,
            "Active tasks re-armed after startup"
        );
    }

    /// 输出带机器错误码和双语描述的错误日志
    pub fn log_error(ctx: &LogContext, err: &SchedulerError) {
        let message = err.localized();
        error!(
            event = "scheduler_error",
            error.code = err.code().as_str(),
            error.message_en = message.en,
            error.message_zh = message.zh,
            error.detail = %err,
            context = %ctx.render(LogType::Error),
            "Scheduler operation failed"
        );
    }
}

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use task_scheduler_core::{
    models::{
        CreateTaskRequest, ExecutionOptions, JobExecution, JobOutcome, ScheduleKind,
        TaskDefinition, TaskOutcomeUpdate, TriggerFired,
    },
    traits::{ExecutorRegistry, JobQueue, TaskControlService, TaskStateStore},
    LogContext, SchedulerError, SchedulerResult, StructuredLogger,
};

use crate::schedule_translator::{
    compute_following_fire, compute_initial_next_fire, normalize_interval, restore_trigger_plan,
    to_trigger_plan,
};
use crate::trigger_registry::TriggerRegistry;

#[derive(Debug, Clone)]
pub struct SchedulerServiceConfig {
    /// 队列命名空间
    pub environment: String,
    /// 执行器没有提供执行参数时使用
    pub default_options: ExecutionOptions,
}

impl Default for SchedulerServiceConfig {
    fn default() -> Self {
        Self {
            environment: "develop".to_string(),
            default_options: ExecutionOptions::default(),
        }
    }
}

/// 调度服务
///
/// 每个任务编码的状态流转：未启用 → 已布置 → 执行中 → 已布置（重复任务）
/// 或 未启用（一次性任务、显式取消）。
///
/// 触发事件和执行结果都在 [`SchedulerService::run`] 中按顺序处理，
/// 同一编码在上一次执行结果写回之前不会再次入队。
pub struct SchedulerService {
    store: Arc<dyn TaskStateStore>,
    triggers: Arc<TriggerRegistry>,
    queue: Arc<dyn JobQueue>,
    executors: Arc<dyn ExecutorRegistry>,
    config: SchedulerServiceConfig,
    in_flight: Mutex<HashSet<String>>,
}

impl SchedulerService {
    pub fn new(
        store: Arc<dyn TaskStateStore>,
        triggers: Arc<TriggerRegistry>,
        queue: Arc<dyn JobQueue>,
        executors: Arc<dyn ExecutorRegistry>,
        config: SchedulerServiceConfig,
    ) -> Self {
        Self {
            store,
            triggers,
            queue,
            executors,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn environment(&self) -> &str {
        &self.config.environment
    }

    pub fn triggers(&self) -> &Arc<TriggerRegistry> {
        &self.triggers
    }

    /// 编码当前是否有执行中的作业
    pub fn is_running(&self, code: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(code)
    }

    fn release(&self, code: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(code);
    }

    /// 创建或覆盖任务
    ///
    /// 总是先取消同一编码已有的触发器。任何一步失败时任务都保持未启用，
    /// 包括已经存在的旧记录。
    pub async fn create_task(&self, request: CreateTaskRequest) -> SchedulerResult<()> {
        let code = request.task_type.clone();
        let ctx = LogContext::for_task(&code)
            .with("operation", "create_task")
            .with("task_type", &request.task_type);
        let ctx = match &request.data.specific_task_data {
            Some(payload) => ctx.with_payload(payload),
            None => ctx,
        };

        self.cancel_task(&code, true).await?;

        match self.create_inner(&request, &ctx).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // 旧触发器已取消，旧记录不能继续保持启用
                if let Err(deactivate_err) = self.store.set_active(&code, false).await {
                    warn!(task.code = %code, "创建失败后停用旧任务也失败: {deactivate_err}");
                }
                let err = e.into_task_creation(&code);
                StructuredLogger::log_error(&ctx, &err);
                Err(err)
            }
        }
    }

    async fn create_inner(&self, request: &CreateTaskRequest, ctx: &LogContext) -> SchedulerResult<()> {
        let code = request.task_type.as_str();
        let data = &request.data;

        if !self.executors.contains(code).await {
            return Err(SchedulerError::ExecutorNotFound {
                task_type: code.to_string(),
            });
        }

        let cron_type = self
            .store
            .get_cron_type(data.cron_type_id)
            .await?
            .ok_or(SchedulerError::CronTypeNotFound {
                id: data.cron_type_id,
            })?;
        let priority = self
            .store
            .get_priority(data.priority_id)
            .await?
            .ok_or(SchedulerError::PriorityNotFound {
                id: data.priority_id,
            })?;
        let kind = cron_type.kind()?;

        let interval = data.interval.map(normalize_interval).transpose()?;
        let time = data.time.as_deref();
        let plan = to_trigger_plan(kind, time, interval)?;
        TriggerRegistry::validate(&plan)?;
        let date_next = compute_initial_next_fire(kind, time, interval, self.triggers.now())?;

        let previous = self.store.get_by_code(code).await?;
        let definition = TaskDefinition {
            code: code.to_string(),
            cron_type: Some(cron_type),
            priority: Some(priority),
            cron_value: Some(plan.primary.to_string()),
            interval,
            is_active: true,
            date_next: Some(date_next),
            date_end: previous.as_ref().and_then(|p| p.date_end),
            status: previous.as_ref().and_then(|p| p.status),
            data: data.specific_task_data.as_ref().map(|v| v.to_string()),
        };
        self.store.save(&definition).await?;

        self.triggers.arm(code, &plan)?;

        StructuredLogger::log_task_created(
            ctx,
            kind.as_str(),
            definition.cron_value.as_deref().unwrap_or_default(),
            date_next,
        );
        Ok(())
    }

    /// 取消任务
    ///
    /// 触发器总是先被取消；之后的状态写入失败时返回错误，
    /// 此时触发器已停止但记录仍是启用状态。
    pub async fn cancel_task(&self, code: &str, only_trigger: bool) -> SchedulerResult<()> {
        let had_trigger = self.triggers.cancel(code);
        if only_trigger {
            if had_trigger {
                debug!(task.code = code, "已取消旧的触发器");
            }
            return Ok(());
        }

        match self.store.set_active(code, false).await {
            Ok(existed) => {
                StructuredLogger::log_task_cancelled(code, only_trigger, existed);
                Ok(())
            }
            Err(e) => {
                let err = e.into_task_cancellation(code);
                let ctx = LogContext::for_task(code).with("operation", "cancel_task");
                StructuredLogger::log_error(&ctx, &err);
                Err(err)
            }
        }
    }

    /// 按持久化的定义重新布置触发器
    pub async fn start(&self, definition: &TaskDefinition) -> SchedulerResult<()> {
        let kind = definition.schedule_kind()?;
        let plan = restore_trigger_plan(
            kind,
            definition.cron_value.as_deref(),
            definition.interval,
        )?;
        self.triggers.arm(&definition.code, &plan)?;
        StructuredLogger::log_task_rearmed(
            &definition.code,
            kind.as_str(),
            definition.cron_value.as_deref().unwrap_or_default(),
        );
        Ok(())
    }

    /// 处理一次触发：构建作业并入队
    pub async fn handle_fire(&self, fired: TriggerFired) -> SchedulerResult<()> {
        let code = fired.code.as_str();
        if !self.triggers.is_current(code, fired.generation) {
            debug!(
                task.code = code,
                trigger.generation = fired.generation,
                "丢弃过期触发器的事件"
            );
            return Ok(());
        }

        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code.to_string());
        if !inserted {
            metrics::counter!("scheduler_fires_skipped_total").increment(1);
            StructuredLogger::log_fire_skipped(code, "上一次执行尚未结束");
            return Ok(());
        }

        match self.dispatch(code, fired.generation).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.release(code);
                Ok(())
            }
            Err(e) => {
                self.release(code);
                Err(e)
            }
        }
    }

    async fn dispatch(&self, code: &str, generation: u64) -> SchedulerResult<bool> {
        let definition = match self.store.get_by_code(code).await? {
            Some(definition) if definition.is_active => definition,
            _ => {
                StructuredLogger::log_fire_skipped(code, "任务不存在或未启用");
                return Ok(false);
            }
        };

        let options = self
            .executors
            .get(code)
            .await
            .and_then(|executor| executor.execution_options())
            .unwrap_or(self.config.default_options);

        let job = JobExecution::new(&self.config.environment, code, definition.priority_weight())
            .with_options(options, definition.interval)
            .with_payload(definition.payload())
            .with_generation(generation);
        let queue_name = job.queue_name.clone();
        let priority = job.priority_weight;

        let job_id = self.queue.enqueue(job).await?;
        metrics::counter!("scheduler_jobs_enqueued_total").increment(1);
        StructuredLogger::log_job_enqueued(code, job_id, &queue_name, priority);
        Ok(true)
    }

    /// 处理一次作业结果
    ///
    /// 终态结果写回 `date_end`、`status`、`date_next`，一次性任务随后停用，
    /// 最后调用执行器的钩子。结果所属的触发器代数已不是当前代数时
    /// （任务被取消或重新创建）不写任何状态。无论哪种情况都会释放该编码的执行中标记。
    pub async fn handle_outcome(&self, outcome: JobOutcome) -> SchedulerResult<()> {
        match &outcome {
            JobOutcome::FailedAttempt {
                job_id,
                task_code,
                attempt,
                error,
                ..
            } => {
                metrics::counter!("scheduler_job_attempts_failed_total").increment(1);
                StructuredLogger::log_job_failed_attempt(task_code, *job_id, *attempt, error);
                if let Some(executor) = self.executors.get(task_code).await {
                    executor.on_failed_attempt(task_code, *attempt, error).await;
                }
                Ok(())
            }
            JobOutcome::Completed { .. } | JobOutcome::FailedFinal { .. } => {
                let code = outcome.task_code();
                let result = if self.triggers.is_current(code, outcome.generation()) {
                    self.record_terminal(&outcome).await
                } else {
                    info!(
                        task.code = code,
                        job.id = outcome.job_id(),
                        trigger.generation = outcome.generation(),
                        "触发器已被取消或替换，忽略过期作业的执行结果"
                    );
                    Ok(())
                };
                self.release(code);
                result
            }
        }
    }

    async fn record_terminal(&self, outcome: &JobOutcome) -> SchedulerResult<()> {
        let code = outcome.task_code();
        let definition = match self.store.get_by_code(code).await? {
            Some(definition) if definition.is_active => definition,
            _ => {
                info!(task.code = code, "任务不存在或已停用，忽略执行结果");
                return Ok(());
            }
        };

        let kind = definition.schedule_kind()?;
        let now = self.triggers.now();
        let date_next =
            compute_following_fire(kind, definition.date_next.unwrap_or(now), definition.interval)?;
        let status = outcome.status().unwrap_or(false);

        self.store
            .save_outcome(
                code,
                TaskOutcomeUpdate {
                    date_end: now,
                    date_next,
                    status,
                },
            )
            .await
            .map_err(|e| SchedulerError::Persistence(format!("保存任务 {code} 的执行结果失败: {e}")))?;

        if kind == ScheduleKind::Once {
            self.triggers.cancel(code);
            self.store
                .set_active(code, false)
                .await
                .map_err(|e| SchedulerError::JobShutdown {
                    code: code.to_string(),
                    message: e.to_string(),
                })?;
        }

        let executor = self.executors.get(code).await;
        match outcome {
            JobOutcome::Completed { job_id, result, .. } => {
                metrics::counter!("scheduler_jobs_completed_total").increment(1);
                StructuredLogger::log_job_completed(code, *job_id, date_next);
                if let Some(executor) = executor {
                    executor.on_completed(code, result).await;
                }
            }
            JobOutcome::FailedFinal {
                job_id,
                attempts,
                error,
                ..
            } => {
                metrics::counter!("scheduler_jobs_failed_total").increment(1);
                StructuredLogger::log_job_failed(code, *job_id, *attempts, error);
                if let Some(executor) = executor {
                    executor.on_failed(code, error).await;
                }
            }
            JobOutcome::FailedAttempt { .. } => {}
        }
        Ok(())
    }

    /// 事件循环：顺序处理执行结果和触发事件，直到收到关闭信号
    ///
    /// 同时就绪时优先处理执行结果，单个事件的错误只记录日志。
    pub async fn run(
        &self,
        mut fire_rx: mpsc::UnboundedReceiver<TriggerFired>,
        mut outcome_rx: mpsc::UnboundedReceiver<JobOutcome>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(environment = %self.config.environment, "调度服务事件循环启动");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("调度服务收到关闭信号");
                    break;
                }
                Some(outcome) = outcome_rx.recv() => {
                    let code = outcome.task_code().to_string();
                    if let Err(e) = self.handle_outcome(outcome).await {
                        let ctx = LogContext::for_task(&code).with("operation", "handle_outcome");
                        StructuredLogger::log_error(&ctx, &e);
                    }
                }
                Some(fired) = fire_rx.recv() => {
                    let code = fired.code.clone();
                    if let Err(e) = self.handle_fire(fired).await {
                        let ctx = LogContext::for_task(&code).with("operation", "handle_fire");
                        StructuredLogger::log_error(&ctx, &e);
                    }
                }
                else => {
                    info!("事件通道已全部关闭");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl TaskControlService for SchedulerService {
    async fn create_task(&self, request: CreateTaskRequest) -> SchedulerResult<()> {
        SchedulerService::create_task(self, request).await
    }

    async fn cancel_task(&self, code: &str, only_trigger: bool) -> SchedulerResult<()> {
        SchedulerService::cancel_task(self, code, only_trigger).await
    }
}

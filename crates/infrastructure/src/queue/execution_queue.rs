//! 进程内执行队列
//!
//! 按优先级权重出队（权重高的先执行，相同权重先进先出），工作池大小由
//! 信号量限制。每次尝试受TTL约束，失败后按固定间隔重试，
//! 结果按顺序通过通道送给调度服务：
//!
//! - `Completed` 每个作业最多一次
//! - `FailedAttempt` 每次非最终的失败一次，只做记录
//! - `FailedFinal` 尝试次数耗尽时一次
//!
//! 每个终态结果都会触发一次后台的保留期清理，清理不阻塞结果通知。

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use task_scheduler_core::{
    models::{JobExecution, JobOutcome, JobRecord, JobState},
    traits::{ExecutorRegistry, JobQueue, TaskExecutor},
    SchedulerError, SchedulerResult, StructuredLogger,
};

use super::config::ExecutionQueueConfig;

#[derive(Debug, PartialEq, Eq)]
struct PendingJob {
    priority: i32,
    sequence: u64,
    job_id: u64,
}

impl Ord for PendingJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PendingJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueState {
    pending: BinaryHeap<PendingJob>,
    jobs: HashMap<u64, JobRecord>,
    next_id: u64,
    next_sequence: u64,
}

impl QueueState {
    fn push_pending(&mut self, job_id: u64, priority: i32) {
        self.next_sequence += 1;
        self.pending.push(PendingJob {
            priority,
            sequence: self.next_sequence,
            job_id,
        });
    }
}

struct QueueInner {
    config: ExecutionQueueConfig,
    state: Mutex<QueueState>,
    notify: Notify,
    workers: Arc<Semaphore>,
    executors: Arc<dyn ExecutorRegistry>,
    outcome_tx: mpsc::UnboundedSender<JobOutcome>,
    shutdown_tx: broadcast::Sender<()>,
    stopped: AtomicBool,
}

pub struct ExecutionQueue {
    inner: Arc<QueueInner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionQueue {
    /// 创建队列，返回的接收端按顺序产出作业结果
    pub fn new(
        config: ExecutionQueueConfig,
        executors: Arc<dyn ExecutorRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<JobOutcome>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);
        let workers = Arc::new(Semaphore::new(config.concurrency.max(1)));
        let queue = Self {
            inner: Arc::new(QueueInner {
                config,
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                workers,
                executors,
                outcome_tx,
                shutdown_tx,
                stopped: AtomicBool::new(false),
            }),
            dispatcher: Mutex::new(None),
        };
        (queue, outcome_rx)
    }

    /// 启动分发循环；重复调用无效果
    pub fn start(&self) {
        let mut dispatcher = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner);
        if dispatcher.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        *dispatcher = Some(tokio::spawn(QueueInner::dispatch_loop(inner, shutdown_rx)));
        info!(
            environment = %self.inner.config.environment,
            concurrency = self.inner.config.concurrency,
            "执行队列已启动"
        );
    }

    /// 停止分发新作业，已经开始的尝试继续执行到结束
    pub async fn stop(&self) {
        self.inner.stopped.store(true, AtomicOrdering::SeqCst);
        let _ = self.inner.shutdown_tx.send(());
        let handle = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("执行队列分发循环异常退出: {e}");
                }
            }
        }
        info!("执行队列已停止");
    }

    pub fn job(&self, job_id: u64) -> Option<JobRecord> {
        self.inner.lock().jobs.get(&job_id).cloned()
    }

    pub fn jobs_in_state(&self, state: JobState) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self
            .inner
            .lock()
            .jobs
            .values()
            .filter(|record| record.state == state)
            .cloned()
            .collect();
        jobs.sort_by_key(|record| record.id);
        jobs
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 删除本命名空间内指定终态、且终态时间不晚于 `now - window` 的作业，返回删除数量
    pub fn sweep_terminal_jobs(&self, state: JobState, window: Duration, now: DateTime<Utc>) -> usize {
        self.inner.sweep_terminal_jobs(state, window, now)
    }
}

#[async_trait]
impl JobQueue for ExecutionQueue {
    async fn enqueue(&self, job: JobExecution) -> SchedulerResult<u64> {
        if self.inner.stopped.load(AtomicOrdering::SeqCst) {
            return Err(SchedulerError::Queue("执行队列已停止".to_string()));
        }

        let job_id = {
            let mut state = self.inner.lock();
            let duplicate = state
                .jobs
                .values()
                .any(|record| record.job.queue_name == job.queue_name && !record.state.is_terminal());
            if duplicate {
                return Err(SchedulerError::DuplicateJob {
                    queue_name: job.queue_name,
                });
            }

            state.next_id += 1;
            let job_id = state.next_id;
            let priority = job.priority_weight;
            state.jobs.insert(
                job_id,
                JobRecord {
                    id: job_id,
                    job,
                    state: JobState::Inactive,
                    attempts_made: 0,
                    created_at: Utc::now(),
                    terminal_at: None,
                    last_error: None,
                },
            );
            state.push_pending(job_id, priority);
            job_id
        };

        self.inner.notify.notify_one();
        Ok(job_id)
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn dispatch_loop(inner: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            let permit = tokio::select! {
                _ = shutdown_rx.recv() => break,
                permit = Arc::clone(&inner.workers).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job_id = loop {
                if let Some(job_id) = inner.pop_next() {
                    break Some(job_id);
                }
                tokio::select! {
                    _ = shutdown_rx.recv() => break None,
                    _ = inner.notify.notified() => {}
                }
            };
            let Some(job_id) = job_id else {
                break;
            };

            let worker = Arc::clone(&inner);
            tokio::spawn(async move {
                worker.run_attempt(job_id).await;
                drop(permit);
            });
        }
        debug!("执行队列分发循环退出");
    }

    fn pop_next(&self) -> Option<u64> {
        let mut state = self.lock();
        while let Some(pending) = state.pending.pop() {
            if state.jobs.contains_key(&pending.job_id) {
                return Some(pending.job_id);
            }
        }
        None
    }

    async fn run_attempt(self: Arc<Self>, job_id: u64) {
        let (job, attempt) = {
            let mut state = self.lock();
            let Some(record) = state.jobs.get_mut(&job_id) else {
                return;
            };
            record.state = JobState::Active;
            record.attempts_made += 1;
            (record.job.clone(), record.attempts_made)
        };

        let result = match self.executors.get(&job.task_code).await {
            Some(executor) => Self::execute_once(executor, job.clone()).await,
            None => Err(SchedulerError::ExecutorNotFound {
                task_type: job.task_code.clone(),
            }),
        };

        match result {
            Ok(value) => {
                self.mark_terminal(job_id, JobState::Complete, None);
                self.spawn_sweep(JobState::Complete);
                self.send(JobOutcome::Completed {
                    job_id,
                    generation: job.generation,
                    task_code: job.task_code,
                    result: value,
                });
            }
            Err(e) if attempt < job.max_attempts => {
                let error = e.to_string();
                {
                    let mut state = self.lock();
                    if let Some(record) = state.jobs.get_mut(&job_id) {
                        record.state = JobState::Delayed;
                        record.last_error = Some(error.clone());
                    }
                }
                self.send(JobOutcome::FailedAttempt {
                    job_id,
                    task_code: job.task_code.clone(),
                    generation: job.generation,
                    attempt,
                    error,
                });
                self.schedule_retry(job_id, job.priority_weight, job.backoff_delay_millis);
            }
            Err(e) => {
                let error = e.to_string();
                self.mark_terminal(job_id, JobState::Failed, Some(error.clone()));
                self.spawn_sweep(JobState::Failed);
                self.send(JobOutcome::FailedFinal {
                    job_id,
                    generation: job.generation,
                    task_code: job.task_code,
                    attempts: attempt,
                    error,
                });
            }
        }
    }

    /// 在独立任务中执行，超时后中止执行任务，执行器崩溃视为一次失败
    async fn execute_once(
        executor: Arc<dyn TaskExecutor>,
        job: JobExecution,
    ) -> SchedulerResult<serde_json::Value> {
        let ttl = job.ttl_millis;
        let mut handle = tokio::spawn(async move { executor.execute(&job).await });

        let joined = match ttl {
            Some(ttl_ms) => {
                match tokio::time::timeout(Duration::from_millis(ttl_ms), &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        handle.abort();
                        return Err(SchedulerError::ExecutionTimeout { ttl_ms });
                    }
                }
            }
            None => handle.await,
        };

        joined.map_err(|e| SchedulerError::TaskExecution(format!("执行器异常退出: {e}")))?
    }

    fn schedule_retry(self: &Arc<Self>, job_id: u64, priority: i32, backoff_ms: u64) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            if inner.stopped.load(AtomicOrdering::SeqCst) {
                return;
            }
            {
                let mut state = inner.lock();
                match state.jobs.get_mut(&job_id) {
                    Some(record) if record.state == JobState::Delayed => {
                        record.state = JobState::Inactive;
                    }
                    _ => return,
                }
                state.push_pending(job_id, priority);
            }
            inner.notify.notify_one();
        });
    }

    fn mark_terminal(&self, job_id: u64, state: JobState, error: Option<String>) {
        let mut queue = self.lock();
        if let Some(record) = queue.jobs.get_mut(&job_id) {
            record.state = state;
            record.terminal_at = Some(Utc::now());
            if error.is_some() {
                record.last_error = error;
            }
        }
    }

    fn send(&self, outcome: JobOutcome) {
        if self.outcome_tx.send(outcome).is_err() {
            warn!("作业结果接收端已关闭，结果被丢弃");
        }
    }

    fn spawn_sweep(self: &Arc<Self>, state: JobState) {
        let window = match state {
            JobState::Complete => self.config.completed_retention,
            JobState::Failed => self.config.failed_retention,
            _ => return,
        };
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.sweep_terminal_jobs(state, window, Utc::now());
        });
    }

    fn sweep_terminal_jobs(&self, state: JobState, window: Duration, now: DateTime<Utc>) -> usize {
        let prefix = self.config.namespace_prefix();
        let cutoff = now - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());

        let removed = {
            let mut queue = self.lock();
            let before = queue.jobs.len();
            queue.jobs.retain(|_, record| {
                let expired = record.state == state
                    && record.job.queue_name.starts_with(&prefix)
                    && record.terminal_at.is_some_and(|at| at <= cutoff);
                !expired
            });
            before - queue.jobs.len()
        };

        if removed > 0 {
            metrics::counter!("scheduler_jobs_swept_total").increment(removed as u64);
        }
        StructuredLogger::log_jobs_swept(&self.config.environment, &format!("{state:?}"), removed);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_order_is_priority_then_fifo() {
        let mut heap = BinaryHeap::new();
        heap.push(PendingJob { priority: 1, sequence: 1, job_id: 1 });
        heap.push(PendingJob { priority: 10, sequence: 2, job_id: 2 });
        heap.push(PendingJob { priority: 10, sequence: 3, job_id: 3 });
        heap.push(PendingJob { priority: 5, sequence: 4, job_id: 4 });

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|p| p.job_id)).collect();
        assert_eq!(order, vec![2, 3, 4, 1]);
    }
}

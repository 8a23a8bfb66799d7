//! 测试替身
//!
//! 所有替身都记录收到的调用，测试通过访问方法读取记录并断言。

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use task_scheduler_core::{
    models::{
        CreateTaskRequest, CronType, ExecutionOptions, JobExecution, PriorityTask,
        TaskDefinition, TaskOutcomeUpdate,
    },
    traits::{JobQueue, TaskControlService, TaskExecutor, TaskStateStore},
    SchedulerError, SchedulerResult,
};

/// 记录每次执行和钩子调用的执行器
///
/// 默认立即成功，可以配置前N次失败、始终失败、执行耗时或直接panic。
pub struct RecordingExecutor {
    name: String,
    options: Option<ExecutionOptions>,
    delay: Option<Duration>,
    fail_first: u32,
    always_fail: bool,
    panic_on_execute: bool,
    result: Value,
    calls: AtomicU32,
    active: AtomicUsize,
    max_active: AtomicUsize,
    executions: Mutex<Vec<JobExecution>>,
    completed: Mutex<Vec<(String, Value)>>,
    failed_attempts: Mutex<Vec<(String, u32, String)>>,
    failed: Mutex<Vec<(String, String)>>,
}

impl RecordingExecutor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            options: None,
            delay: None,
            fail_first: 0,
            always_fail: false,
            panic_on_execute: false,
            result: json!({ "ok": true }),
            calls: AtomicU32::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            executions: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            failed_attempts: Mutex::new(Vec::new()),
            failed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 前 `count` 次执行失败，之后成功
    pub fn failing_first(mut self, count: u32) -> Self {
        self.fail_first = count;
        self
    }

    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_execute = true;
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 同时执行的最大数量
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> Vec<JobExecution> {
        self.executions.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<(String, Value)> {
        self.completed.lock().unwrap().clone()
    }

    pub fn failed_attempts(&self) -> Vec<(String, u32, String)> {
        self.failed_attempts.lock().unwrap().clone()
    }

    pub fn failed(&self) -> Vec<(String, String)> {
        self.failed.lock().unwrap().clone()
    }
}

struct ActiveGuard<'a> {
    active: &'a AtomicUsize,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execution_options(&self) -> Option<ExecutionOptions> {
        self.options
    }

    async fn execute(&self, job: &JobExecution) -> SchedulerResult<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.executions.lock().unwrap().push(job.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard {
            active: &self.active,
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on_execute {
            panic!("executor {} panicked", self.name);
        }
        if self.always_fail || call <= self.fail_first {
            return Err(SchedulerError::TaskExecution(format!(
                "{} 第{call}次执行失败",
                self.name
            )));
        }
        Ok(self.result.clone())
    }

    async fn on_completed(&self, task_code: &str, result: &Value) {
        self.completed
            .lock()
            .unwrap()
            .push((task_code.to_string(), result.clone()));
    }

    async fn on_failed_attempt(&self, task_code: &str, attempt: u32, error: &str) {
        self.failed_attempts
            .lock()
            .unwrap()
            .push((task_code.to_string(), attempt, error.to_string()));
    }

    async fn on_failed(&self, task_code: &str, error: &str) {
        self.failed
            .lock()
            .unwrap()
            .push((task_code.to_string(), error.to_string()));
    }
}

/// 只记录入队作业的队列
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<JobExecution>>,
    next_id: AtomicU64,
    fail: AtomicBool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn jobs(&self) -> Vec<JobExecution> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: JobExecution) -> SchedulerResult<u64> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SchedulerError::Queue("injected enqueue failure".to_string()));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// 包装真实存储，可按操作注入故障
pub struct FailingTaskStore {
    inner: Arc<dyn TaskStateStore>,
    fail_save: AtomicBool,
    fail_set_active: AtomicBool,
    fail_save_outcome: AtomicBool,
    fail_get_active: AtomicBool,
}

impl FailingTaskStore {
    pub fn new(inner: Arc<dyn TaskStateStore>) -> Self {
        Self {
            inner,
            fail_save: AtomicBool::new(false),
            fail_set_active: AtomicBool::new(false),
            fail_save_outcome: AtomicBool::new(false),
            fail_get_active: AtomicBool::new(false),
        }
    }

    pub fn fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set_active(&self, fail: bool) {
        self.fail_set_active.store(fail, Ordering::SeqCst);
    }

    pub fn fail_save_outcome(&self, fail: bool) {
        self.fail_save_outcome.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get_active(&self, fail: bool) {
        self.fail_get_active.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, operation: &str) -> SchedulerResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(SchedulerError::Internal(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStateStore for FailingTaskStore {
    async fn get_cron_type(&self, id: i64) -> SchedulerResult<Option<CronType>> {
        self.inner.get_cron_type(id).await
    }

    async fn get_priority(&self, id: i64) -> SchedulerResult<Option<PriorityTask>> {
        self.inner.get_priority(id).await
    }

    async fn get_by_code(&self, code: &str) -> SchedulerResult<Option<TaskDefinition>> {
        self.inner.get_by_code(code).await
    }

    async fn save(&self, definition: &TaskDefinition) -> SchedulerResult<()> {
        Self::check(&self.fail_save, "save")?;
        self.inner.save(definition).await
    }

    async fn set_active(&self, code: &str, is_active: bool) -> SchedulerResult<bool> {
        Self::check(&self.fail_set_active, "set_active")?;
        self.inner.set_active(code, is_active).await
    }

    async fn save_outcome(&self, code: &str, update: TaskOutcomeUpdate) -> SchedulerResult<bool> {
        Self::check(&self.fail_save_outcome, "save_outcome")?;
        self.inner.save_outcome(code, update).await
    }

    async fn get_active_tasks(&self) -> SchedulerResult<Vec<TaskDefinition>> {
        Self::check(&self.fail_get_active, "get_active_tasks")?;
        self.inner.get_active_tasks().await
    }
}

type ErrorFactory = Box<dyn Fn(&str) -> SchedulerError + Send + Sync>;

/// 记录请求的控制服务，用于HTTP层测试
#[derive(Default)]
pub struct MockTaskControlService {
    created: Mutex<Vec<CreateTaskRequest>>,
    cancelled: Mutex<Vec<(String, bool)>>,
    error: Mutex<Option<ErrorFactory>>,
}

impl MockTaskControlService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的每次调用都返回 `factory` 生成的错误
    pub fn fail_with<F>(&self, factory: F)
    where
        F: Fn(&str) -> SchedulerError + Send + Sync + 'static,
    {
        *self.error.lock().unwrap() = Some(Box::new(factory));
    }

    pub fn created(&self) -> Vec<CreateTaskRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<(String, bool)> {
        self.cancelled.lock().unwrap().clone()
    }

    fn injected(&self, code: &str) -> SchedulerResult<()> {
        match self.error.lock().unwrap().as_ref() {
            Some(factory) => Err(factory(code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TaskControlService for MockTaskControlService {
    async fn create_task(&self, request: CreateTaskRequest) -> SchedulerResult<()> {
        self.injected(&request.task_type)?;
        self.created.lock().unwrap().push(request);
        Ok(())
    }

    async fn cancel_task(&self, code: &str, only_trigger: bool) -> SchedulerResult<()> {
        self.injected(code)?;
        self.cancelled
            .lock()
            .unwrap()
            .push((code.to_string(), only_trigger));
        Ok(())
    }
}

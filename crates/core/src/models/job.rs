use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单个任务类型的执行参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// 最大尝试次数，包含首次执行
    pub attempts: u32,
    /// 单次尝试的超时时间，None 时按任务间隔推导
    pub ttl_ms: Option<u64>,
    /// 两次尝试之间的固定等待时间
    pub backoff_ms: u64,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            ttl_ms: None,
            backoff_ms: 5_000,
        }
    }
}

/// 一次待执行的作业
///
/// 由调度服务在触发器触发时构建，从入队到终态结果都归执行队列所有。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobExecution {
    pub task_code: String,
    /// `<environment>:<task_code>`
    pub queue_name: String,
    pub priority_weight: i32,
    pub ttl_millis: Option<u64>,
    pub max_attempts: u32,
    pub backoff_delay_millis: u64,
    pub payload: Option<serde_json::Value>,
    /// 触发本次作业的触发器代数
    #[serde(default)]
    pub generation: u64,
}

impl JobExecution {
    pub fn new(environment: &str, task_code: &str, priority_weight: i32) -> Self {
        let defaults = ExecutionOptions::default();
        Self {
            task_code: task_code.to_string(),
            queue_name: Self::queue_name_for(environment, task_code),
            priority_weight,
            ttl_millis: defaults.ttl_ms,
            max_attempts: defaults.attempts,
            backoff_delay_millis: defaults.backoff_ms,
            payload: None,
            generation: 0,
        }
    }

    pub fn queue_name_for(environment: &str, task_code: &str) -> String {
        format!("{environment}:{task_code}")
    }

    /// 应用执行参数；未配置TTL时使用任务间隔（分钟）作为TTL
    pub fn with_options(mut self, options: ExecutionOptions, interval_minutes: Option<i64>) -> Self {
        self.max_attempts = options.attempts.max(1);
        self.backoff_delay_millis = options.backoff_ms;
        self.ttl_millis = options.ttl_ms.or_else(|| {
            interval_minutes
                .filter(|minutes| *minutes > 0)
                .map(|minutes| (minutes as u64).saturating_mul(60_000))
        });
        self
    }

    pub fn with_payload(mut self, payload: Option<serde_json::Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn environment(&self) -> &str {
        self.queue_name
            .split_once(':')
            .map(|(env, _)| env)
            .unwrap_or_default()
    }
}

/// 队列内作业状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// 等待执行
    Inactive,
    Active,
    /// 失败后等待重试
    Delayed,
    Complete,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

/// 作业生命周期结果，由执行队列按顺序发送给调度服务
///
/// `generation` 原样取自 [`JobExecution::generation`]。
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        job_id: u64,
        task_code: String,
        generation: u64,
        result: serde_json::Value,
    },
    /// 非最后一次尝试失败，只做记录
    FailedAttempt {
        job_id: u64,
        task_code: String,
        generation: u64,
        attempt: u32,
        error: String,
    },
    FailedFinal {
        job_id: u64,
        task_code: String,
        generation: u64,
        attempts: u32,
        error: String,
    },
}

impl JobOutcome {
    pub fn task_code(&self) -> &str {
        match self {
            JobOutcome::Completed { task_code, .. }
            | JobOutcome::FailedAttempt { task_code, .. }
            | JobOutcome::FailedFinal { task_code, .. } => task_code,
        }
    }

    pub fn job_id(&self) -> u64 {
        match self {
            JobOutcome::Completed { job_id, .. }
            | JobOutcome::FailedAttempt { job_id, .. }
            | JobOutcome::FailedFinal { job_id, .. } => *job_id,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            JobOutcome::Completed { generation, .. }
            | JobOutcome::FailedAttempt { generation, .. }
            | JobOutcome::FailedFinal { generation, .. } => *generation,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobOutcome::FailedAttempt { .. })
    }

    /// 终态结果对应的任务状态；非终态返回 None
    pub fn status(&self) -> Option<bool> {
        match self {
            JobOutcome::Completed { .. } => Some(true),
            JobOutcome::FailedFinal { .. } => Some(false),
            JobOutcome::FailedAttempt { .. } => None,
        }
    }
}

/// 队列中作业的簿记信息
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: u64,
    pub job: JobExecution,
    pub state: JobState,
    pub attempts_made: u32,
    pub created_at: DateTime<Utc>,
    pub terminal_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

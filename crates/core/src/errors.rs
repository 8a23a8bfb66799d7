use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("调度类型未找到: {id}")]
    CronTypeNotFound { id: i64 },

    #[error("任务优先级未找到: {id}")]
    PriorityNotFound { id: i64 },

    #[error("任务类型没有注册执行器: {task_type}")]
    ExecutorNotFound { task_type: String },

    #[error("无效的调度配置: {0}")]
    InvalidSchedule(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("任务创建失败: {code} ({source})")]
    TaskCreation {
        code: String,
        #[source]
        source: Box<SchedulerError>,
    },

    #[error("任务取消失败: {code} ({source})")]
    TaskCancellation {
        code: String,
        #[source]
        source: Box<SchedulerError>,
    },

    #[error("任务触发器恢复失败: {code} ({source})")]
    TaskStart {
        code: String,
        #[source]
        source: Box<SchedulerError>,
    },

    #[error("停用任务失败: {code} ({message})")]
    JobShutdown { code: String, message: String },

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("任务执行超时: {ttl_ms}ms")]
    ExecutionTimeout { ttl_ms: u64 },

    #[error("任务已在队列中: {queue_name}")]
    DuplicateJob { queue_name: String },

    #[error("持久化错误: {0}")]
    Persistence(String),

    #[error("执行队列错误: {0}")]
    Queue(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误分类
///
/// 调用方根据分类决定如何响应错误，例如传输层据此选择HTTP状态码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    InvalidSchedule,
    TaskCreation,
    TaskCancellation,
    Execution,
    Internal,
}

/// 机器可读的错误码，写入日志和接口响应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    TaskSchedulerNotFound,
    TaskPriorityNotFound,
    TaskTypeNotFound,
    ErrorSettingStartTime,
    InvalidSchedule,
    ErrorTaskCreating,
    ErrorTaskCanceling,
    ErrorSavingResultTask,
    JobShutdownError,
    JobExecutionFailed,
    UnhandledException,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TaskSchedulerNotFound => "TASK_SCHEDULER_NOT_FOUND",
            ErrorCode::TaskPriorityNotFound => "TASK_PRIORITY_NOT_FOUND",
            ErrorCode::TaskTypeNotFound => "TASK_TYPE_NOT_FOUND",
            ErrorCode::ErrorSettingStartTime => "ERROR_SETTING_START_TIME",
            ErrorCode::InvalidSchedule => "INVALID_SCHEDULE",
            ErrorCode::ErrorTaskCreating => "ERROR_TASK_CREATING",
            ErrorCode::ErrorTaskCanceling => "ERROR_TASK_CANCELING",
            ErrorCode::ErrorSavingResultTask => "ERROR_SAVING_RESULT_TASK",
            ErrorCode::JobShutdownError => "JOB_SHUTDOWN_ERROR",
            ErrorCode::JobExecutionFailed => "JOB_EXECUTION_FAILED",
            ErrorCode::UnhandledException => "UNHANDLED_EXCEPTION",
        }
    }

    /// 错误码对应的双语描述
    pub fn message(&self) -> LocalizedMessage {
        let (en, zh) = match self {
            ErrorCode::TaskSchedulerNotFound => ("Task scheduler not found", "未找到任务调度类型"),
            ErrorCode::TaskPriorityNotFound => ("Task priority not found", "未找到任务优先级"),
            ErrorCode::TaskTypeNotFound => ("Task type not found", "未找到任务类型"),
            ErrorCode::ErrorSettingStartTime => ("Error setting start time", "设置初始执行时间失败"),
            ErrorCode::InvalidSchedule => ("Invalid schedule", "无效的调度配置"),
            ErrorCode::ErrorTaskCreating => ("Error task creating", "创建任务失败"),
            ErrorCode::ErrorTaskCanceling => ("Error task canceling", "取消任务失败"),
            ErrorCode::ErrorSavingResultTask => (
                "Error saving the result of the task",
                "保存任务执行结果失败",
            ),
            ErrorCode::JobShutdownError => ("Job shutdown error", "停用任务失败"),
            ErrorCode::JobExecutionFailed => ("Job execution failed", "任务执行失败"),
            ErrorCode::UnhandledException => ("Unhandled exception", "未处理的异常"),
        };
        LocalizedMessage { en, zh }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 双语错误描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalizedMessage {
    pub en: &'static str,
    pub zh: &'static str,
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::CronTypeNotFound { .. }
            | SchedulerError::PriorityNotFound { .. }
            | SchedulerError::ExecutorNotFound { .. } => ErrorKind::NotFound,
            SchedulerError::InvalidSchedule(_) | SchedulerError::InvalidCron { .. } => {
                ErrorKind::InvalidSchedule
            }
            SchedulerError::TaskCreation { .. } => ErrorKind::TaskCreation,
            SchedulerError::TaskCancellation { .. } => ErrorKind::TaskCancellation,
            SchedulerError::TaskExecution(_)
            | SchedulerError::ExecutionTimeout { .. }
            | SchedulerError::DuplicateJob { .. } => ErrorKind::Execution,
            _ => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SchedulerError::CronTypeNotFound { .. } => ErrorCode::TaskSchedulerNotFound,
            SchedulerError::PriorityNotFound { .. } => ErrorCode::TaskPriorityNotFound,
            SchedulerError::ExecutorNotFound { .. } => ErrorCode::TaskTypeNotFound,
            SchedulerError::InvalidSchedule(_) | SchedulerError::InvalidCron { .. } => {
                ErrorCode::InvalidSchedule
            }
            SchedulerError::TaskCreation { .. } => ErrorCode::ErrorTaskCreating,
            SchedulerError::TaskCancellation { .. } => ErrorCode::ErrorTaskCanceling,
            SchedulerError::TaskStart { .. } => ErrorCode::ErrorSettingStartTime,
            SchedulerError::JobShutdown { .. } => ErrorCode::JobShutdownError,
            SchedulerError::Persistence(_) => ErrorCode::ErrorSavingResultTask,
            SchedulerError::TaskExecution(_)
            | SchedulerError::ExecutionTimeout { .. }
            | SchedulerError::DuplicateJob { .. } => ErrorCode::JobExecutionFailed,
            _ => ErrorCode::UnhandledException,
        }
    }

    pub fn localized(&self) -> LocalizedMessage {
        self.code().message()
    }

    /// 包装为任务创建失败；未找到和调度无效两类错误保持原样返回给调用方
    pub fn into_task_creation(self, code: &str) -> Self {
        match self.kind() {
            ErrorKind::NotFound | ErrorKind::InvalidSchedule | ErrorKind::TaskCreation => self,
            _ => SchedulerError::TaskCreation {
                code: code.to_string(),
                source: Box::new(self),
            },
        }
    }

    pub fn into_task_start(self, code: &str) -> Self {
        SchedulerError::TaskStart {
            code: code.to_string(),
            source: Box::new(self),
        }
    }

    pub fn into_task_cancellation(self, code: &str) -> Self {
        SchedulerError::TaskCancellation {
            code: code.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, SchedulerError>;

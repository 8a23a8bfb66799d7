pub mod config;
pub mod errors;
pub mod executor_registry;
pub mod logging;
pub mod models;
pub mod traits;

pub use errors::*;
pub use executor_registry::DefaultExecutorRegistry;
pub use logging::{init_logging, LogContext, LogType, StructuredLogger};
pub use traits::{ExecutorRegistry, JobQueue, TaskControlService, TaskExecutor, TaskStateStore};

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod scheduler_queue;

pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use database::{DatabaseConfig, BACKEND_MEMORY, BACKEND_SQLITE};
pub use scheduler_queue::{
    ExecutionConfig, ExecutorBinding, ExecutorKind, QueueConfig, SchedulerConfig,
    DEFAULT_ENVIRONMENT,
};

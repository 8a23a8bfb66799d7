//! 配置管理
//!
//! 配置按以下顺序叠加，后者覆盖前者：
//!
//! 1. 内置默认值
//! 2. TOML配置文件（`--config` 指定，或 `config/scheduler.toml`）
//! 3. 环境变量，前缀 `SCHEDULER_`，层级分隔符 `__`
//!
//! ```toml
//! [scheduler]
//! environment = "production"
//!
//! [queue]
//! concurrency = 8
//!
//! [[executors]]
//! task_type = "cleanup"
//! kind = "shell"
//! attempts = 2
//! ```

pub mod models;

pub use models::*;

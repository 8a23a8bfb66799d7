//! 内置任务执行器
//!
//! 任务类型在配置文件中绑定到 [`ShellExecutor`] 或 [`HttpExecutor`]，
//! 由 [`ExecutorFactory`] 创建并注册。

pub mod executor_factory;
pub mod executors;

pub use executor_factory::ExecutorFactory;
pub use executors::{HttpExecutor, HttpTaskParams, ShellExecutor, ShellTaskParams};

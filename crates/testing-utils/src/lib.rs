//! # Task Scheduler Testing Utils
//!
//! 各crate共用的测试工具：
//!
//! - **Mocks**: 记录调用的执行器、队列、控制服务，以及可注入故障的任务存储
//! - **Builders**: 创建请求和任务定义的构建器
//! - **Helpers**: 异步条件等待等通用辅助函数
//!
//! ```toml
//! [dev-dependencies]
//! task-scheduler-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;

//! 周期任务调度系统
//!
//! 把各个crate装配成一个进程：任务存储、执行器注册表、执行队列、
//! 触发器注册表、调度服务和HTTP接口。

pub mod app;
pub mod shutdown;

pub use app::Application;
pub use shutdown::ShutdownManager;

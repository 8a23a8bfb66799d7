//! 作业执行队列

pub mod config;
pub mod execution_queue;

pub use config::ExecutionQueueConfig;
pub use execution_queue::ExecutionQueue;

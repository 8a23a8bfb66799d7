pub mod control;
pub mod job_queue;
pub mod task_executor;
pub mod task_store;

pub use control::*;
pub use job_queue::*;
pub use task_executor::*;
pub use task_store::*;

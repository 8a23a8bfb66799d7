//! 调度引擎
//!
//! - [`schedule_translator`] 调度描述到触发表达式的纯函数转换
//! - [`trigger_registry`] 按任务编码管理已布置的定时器
//! - [`scheduler`] 创建、取消任务，处理触发事件和执行结果
//! - [`supervisor`] 启动时恢复启用任务的触发器

pub mod cron_utils;
pub mod schedule_translator;
pub mod scheduler;
pub mod supervisor;
pub mod trigger_registry;

pub use cron_utils::CronScheduler;
pub use scheduler::{SchedulerService, SchedulerServiceConfig};
pub use supervisor::{RecoveryReport, Supervisor};
pub use trigger_registry::{secondary_key, TriggerRegistry};

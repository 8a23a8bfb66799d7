use serde::{Deserialize, Serialize};

use crate::models::ExecutionOptions;

pub const DEFAULT_ENVIRONMENT: &str = "develop";

/// Scheduler section: the namespace every queue name is prefixed with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub environment: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let environment = std::env::var("APP_ENV")
            .ok()
            .filter(|env| !env.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        Self { environment }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.environment.trim().is_empty() {
            return Err(anyhow::anyhow!("环境名称不能为空"));
        }
        if self.environment.contains(':') {
            return Err(anyhow::anyhow!("环境名称不能包含 ':'"));
        }
        Ok(())
    }
}

/// Execution queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// 工作池大小
    pub concurrency: usize,
    /// 成功作业的保留时间
    pub completed_retention_ms: u64,
    /// 最终失败作业的保留时间
    pub failed_retention_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            completed_retention_ms: 24 * 60 * 60 * 1000,
            failed_retention_ms: 60 * 60 * 1000,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("工作池大小必须大于0"));
        }
        Ok(())
    }
}

/// Default execution options applied when a task type brings none
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub attempts: u32,
    pub ttl_ms: Option<u64>,
    pub backoff_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let defaults = ExecutionOptions::default();
        Self {
            attempts: defaults.attempts,
            ttl_ms: defaults.ttl_ms,
            backoff_ms: defaults.backoff_ms,
        }
    }
}

impl ExecutionConfig {
    pub fn options(&self) -> ExecutionOptions {
        ExecutionOptions {
            attempts: self.attempts,
            ttl_ms: self.ttl_ms,
            backoff_ms: self.backoff_ms,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.attempts == 0 {
            return Err(anyhow::anyhow!("最大尝试次数必须大于0"));
        }
        if self.ttl_ms == Some(0) {
            return Err(anyhow::anyhow!("执行超时时间必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Shell,
    Http,
}

/// Binds a task type to one of the built-in executors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorBinding {
    pub task_type: String,
    pub kind: ExecutorKind,
    #[serde(default)]
    pub attempts: Option<u32>,
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    #[serde(default)]
    pub backoff_ms: Option<u64>,
}

impl ExecutorBinding {
    /// 该绑定自己的执行参数；没有任何覆盖时返回 None
    pub fn options(&self, defaults: &ExecutionConfig) -> Option<ExecutionOptions> {
        if self.attempts.is_none() && self.ttl_ms.is_none() && self.backoff_ms.is_none() {
            return None;
        }
        Some(ExecutionOptions {
            attempts: self.attempts.unwrap_or(defaults.attempts),
            ttl_ms: self.ttl_ms.or(defaults.ttl_ms),
            backoff_ms: self.backoff_ms.unwrap_or(defaults.backoff_ms),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.task_type.trim().is_empty() {
            return Err(anyhow::anyhow!("执行器绑定的任务类型不能为空"));
        }
        if self.attempts == Some(0) {
            return Err(anyhow::anyhow!(
                "任务类型 {} 的最大尝试次数必须大于0",
                self.task_type
            ));
        }
        Ok(())
    }
}

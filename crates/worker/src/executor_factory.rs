use std::sync::Arc;

use tracing::info;

use task_scheduler_core::{
    config::{ExecutionConfig, ExecutorBinding, ExecutorKind},
    traits::{ExecutorRegistry, TaskExecutor},
    DefaultExecutorRegistry, SchedulerResult,
};

use crate::executors::{HttpExecutor, ShellExecutor};

/// 按配置中的执行器绑定创建执行器
pub struct ExecutorFactory;

impl ExecutorFactory {
    pub fn create(binding: &ExecutorBinding, defaults: &ExecutionConfig) -> Arc<dyn TaskExecutor> {
        let options = binding.options(defaults);
        match binding.kind {
            ExecutorKind::Shell => {
                Arc::new(ShellExecutor::new(&binding.task_type).with_options(options))
            }
            ExecutorKind::Http => {
                Arc::new(HttpExecutor::new(&binding.task_type).with_options(options))
            }
        }
    }

    /// 把所有绑定注册到注册表中
    pub async fn register_all(
        registry: &mut DefaultExecutorRegistry,
        bindings: &[ExecutorBinding],
        defaults: &ExecutionConfig,
    ) -> SchedulerResult<usize> {
        for binding in bindings {
            info!(
                task.task_type = %binding.task_type,
                "注册执行器: kind={:?}",
                binding.kind
            );
            registry
                .register(binding.task_type.clone(), Self::create(binding, defaults))
                .await?;
        }
        Ok(bindings.len())
    }
}

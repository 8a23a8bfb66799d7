use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    traits::{ExecutorRegistry, TaskExecutor},
    SchedulerResult,
};

pub struct DefaultExecutorRegistry {
    executors: Arc<RwLock<HashMap<String, Arc<dyn TaskExecutor>>>>,
}

impl DefaultExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register_batch(
        &mut self,
        executors: Vec<(String, Arc<dyn TaskExecutor>)>,
    ) -> SchedulerResult<()> {
        let mut registry = self.executors.write().await;
        for (task_type, executor) in executors {
            registry.insert(task_type, executor);
        }
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.executors.read().await.len()
    }
}

impl Default for DefaultExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutorRegistry for DefaultExecutorRegistry {
    async fn register(
        &mut self,
        task_type: String,
        executor: Arc<dyn TaskExecutor>,
    ) -> SchedulerResult<()> {
        let mut registry = self.executors.write().await;
        if registry.insert(task_type.clone(), executor).is_some() {
            tracing::warn!(task.task_type = %task_type, "执行器已存在，被新的注册覆盖");
        }
        Ok(())
    }

    async fn get(&self, task_type: &str) -> Option<Arc<dyn TaskExecutor>> {
        let registry = self.executors.read().await;
        registry.get(task_type).cloned()
    }

    async fn contains(&self, task_type: &str) -> bool {
        let registry = self.executors.read().await;
        registry.contains_key(task_type)
    }

    async fn list_executors(&self) -> Vec<String> {
        let registry = self.executors.read().await;
        let mut names: Vec<String> = registry.keys().cloned().collect();
        names.sort();
        names
    }

    async fn unregister(&mut self, task_type: &str) -> SchedulerResult<bool> {
        let mut registry = self.executors.write().await;
        Ok(registry.remove(task_type).is_some())
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use task_scheduler_core::{
    models::{CronType, PriorityTask, TaskDefinition, TaskOutcomeUpdate},
    traits::TaskStateStore,
    SchedulerResult,
};

use super::{default_cron_types, default_priorities};

/// 内存任务状态存储
///
/// 任务定义只保存目录条目的 id，读取时重新关联当前目录，
/// 行为与SQLite实现的 LEFT JOIN 一致。
pub struct InMemoryTaskStateStore {
    cron_types: RwLock<HashMap<i64, CronType>>,
    priorities: RwLock<HashMap<i64, PriorityTask>>,
    tasks: RwLock<HashMap<String, StoredTask>>,
}

#[derive(Debug, Clone)]
struct StoredTask {
    definition: TaskDefinition,
    cron_type_id: Option<i64>,
    priority_id: Option<i64>,
}

impl InMemoryTaskStateStore {
    /// 带默认目录数据的存储
    pub fn new() -> Self {
        Self::with_catalogs(default_cron_types(), default_priorities())
    }

    pub fn empty() -> Self {
        Self::with_catalogs(Vec::new(), Vec::new())
    }

    pub fn with_catalogs(cron_types: Vec<CronType>, priorities: Vec<PriorityTask>) -> Self {
        Self {
            cron_types: RwLock::new(cron_types.into_iter().map(|c| (c.id, c)).collect()),
            priorities: RwLock::new(priorities.into_iter().map(|p| (p.id, p)).collect()),
            tasks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert_cron_type(&self, cron_type: CronType) {
        self.cron_types.write().await.insert(cron_type.id, cron_type);
    }

    pub async fn insert_priority(&self, priority: PriorityTask) {
        self.priorities.write().await.insert(priority.id, priority);
    }

    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    async fn resolve(&self, stored: &StoredTask) -> TaskDefinition {
        let mut definition = stored.definition.clone();
        definition.cron_type = match stored.cron_type_id {
            Some(id) => self.cron_types.read().await.get(&id).cloned(),
            None => None,
        };
        definition.priority = match stored.priority_id {
            Some(id) => self.priorities.read().await.get(&id).cloned(),
            None => None,
        };
        definition
    }
}

impl Default for InMemoryTaskStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStateStore for InMemoryTaskStateStore {
    async fn get_cron_type(&self, id: i64) -> SchedulerResult<Option<CronType>> {
        Ok(self.cron_types.read().await.get(&id).cloned())
    }

    async fn get_priority(&self, id: i64) -> SchedulerResult<Option<PriorityTask>> {
        Ok(self.priorities.read().await.get(&id).cloned())
    }

    async fn get_by_code(&self, code: &str) -> SchedulerResult<Option<TaskDefinition>> {
        let stored = self.tasks.read().await.get(code).cloned();
        match stored {
            Some(stored) => Ok(Some(self.resolve(&stored).await)),
            None => Ok(None),
        }
    }

    async fn save(&self, definition: &TaskDefinition) -> SchedulerResult<()> {
        debug!(task.code = %definition.code, "保存任务定义");
        let stored = StoredTask {
            cron_type_id: definition.cron_type_id(),
            priority_id: definition.priority_id(),
            definition: TaskDefinition {
                cron_type: None,
                priority: None,
                ..definition.clone()
            },
        };
        self.tasks
            .write()
            .await
            .insert(definition.code.clone(), stored);
        Ok(())
    }

    async fn set_active(&self, code: &str, is_active: bool) -> SchedulerResult<bool> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(code) {
            Some(stored) => {
                stored.definition.is_active = is_active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_outcome(&self, code: &str, update: TaskOutcomeUpdate) -> SchedulerResult<bool> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(code) {
            Some(stored) => {
                stored.definition.date_end = Some(update.date_end);
                stored.definition.date_next = Some(update.date_next);
                stored.definition.status = Some(update.status);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_active_tasks(&self) -> SchedulerResult<Vec<TaskDefinition>> {
        let active: Vec<StoredTask> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|stored| stored.definition.is_active)
            .cloned()
            .collect();

        let mut definitions = Vec::with_capacity(active.len());
        for stored in &active {
            definitions.push(self.resolve(stored).await);
        }
        definitions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(definitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_catalog_is_rejoined_on_read() {
        let store = InMemoryTaskStateStore::new();
        let mut definition = TaskDefinition::new("report");
        definition.priority = Some(PriorityTask::new(2, "stale-copy", 0));
        store.save(&definition).await.unwrap();

        let loaded = store.get_by_code("report").await.unwrap().unwrap();
        assert_eq!(loaded.priority.unwrap().weight, 5);
        assert!(loaded.cron_type.is_none());
    }

    #[tokio::test]
    async fn test_updates_on_missing_code_report_absence() {
        let store = InMemoryTaskStateStore::empty();
        assert!(!store.set_active("ghost", false).await.unwrap());
        let update = TaskOutcomeUpdate {
            date_end: Utc::now(),
            date_next: Utc::now(),
            status: true,
        };
        assert!(!store.save_outcome("ghost", update).await.unwrap());
    }
}

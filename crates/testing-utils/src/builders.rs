//! 测试数据构建器
//!
//! 目录 id 与默认目录数据一致：调度类型 1-4 依次为
//! ONCE、ONCE_A_DAY、INTERVAL、INTERVAL_WITH_START_DATE，优先级 2 为 normal。

use chrono::{DateTime, Utc};
use task_scheduler_core::models::{
    CreateTaskRequest, CronType, PriorityTask, ScheduleDescription, ScheduleKind, TaskDefinition,
};

pub const ONCE_ID: i64 = 1;
pub const ONCE_A_DAY_ID: i64 = 2;
pub const INTERVAL_ID: i64 = 3;
pub const INTERVAL_WITH_START_DATE_ID: i64 = 4;
pub const NORMAL_PRIORITY_ID: i64 = 2;

/// 构建创建任务请求
pub struct CreateRequestBuilder {
    request: CreateTaskRequest,
}

impl CreateRequestBuilder {
    pub fn new(task_type: &str) -> Self {
        Self {
            request: CreateTaskRequest::new(
                task_type,
                ScheduleDescription {
                    time: None,
                    cron_type_id: INTERVAL_ID,
                    priority_id: NORMAL_PRIORITY_ID,
                    interval: Some(5),
                    specific_task_data: None,
                },
            ),
        }
    }

    pub fn once_at(mut self, at: DateTime<Utc>) -> Self {
        self.request.data.cron_type_id = ONCE_ID;
        self.request.data.time = Some(at.to_rfc3339());
        self.request.data.interval = None;
        self
    }

    pub fn daily_at(mut self, time: &str) -> Self {
        self.request.data.cron_type_id = ONCE_A_DAY_ID;
        self.request.data.time = Some(time.to_string());
        self.request.data.interval = None;
        self
    }

    pub fn every(mut self, minutes: i64) -> Self {
        self.request.data.cron_type_id = INTERVAL_ID;
        self.request.data.time = None;
        self.request.data.interval = Some(minutes);
        self
    }

    pub fn every_from(mut self, start: DateTime<Utc>, minutes: i64) -> Self {
        self.request.data.cron_type_id = INTERVAL_WITH_START_DATE_ID;
        self.request.data.time = Some(start.to_rfc3339());
        self.request.data.interval = Some(minutes);
        self
    }

    pub fn with_cron_type_id(mut self, id: i64) -> Self {
        self.request.data.cron_type_id = id;
        self
    }

    pub fn with_priority_id(mut self, id: i64) -> Self {
        self.request.data.priority_id = id;
        self
    }

    pub fn with_time(mut self, time: &str) -> Self {
        self.request.data.time = Some(time.to_string());
        self
    }

    pub fn with_interval(mut self, interval: Option<i64>) -> Self {
        self.request.data.interval = interval;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.request.data.specific_task_data = Some(data);
        self
    }

    pub fn build(self) -> CreateTaskRequest {
        self.request
    }
}

/// 构建持久化的任务定义
pub struct TaskDefinitionBuilder {
    definition: TaskDefinition,
}

impl TaskDefinitionBuilder {
    pub fn new(code: &str, kind: ScheduleKind) -> Self {
        let cron_type_id = match kind {
            ScheduleKind::Once => ONCE_ID,
            ScheduleKind::OnceADay => ONCE_A_DAY_ID,
            ScheduleKind::Interval => INTERVAL_ID,
            ScheduleKind::IntervalWithStartDate => INTERVAL_WITH_START_DATE_ID,
        };
        let mut definition = TaskDefinition::new(code);
        definition.cron_type = Some(CronType::new(cron_type_id, kind, kind.as_str()));
        definition.priority = Some(PriorityTask::new(NORMAL_PRIORITY_ID, "normal", 5));
        definition.is_active = true;
        Self { definition }
    }

    pub fn with_cron_value(mut self, cron_value: &str) -> Self {
        self.definition.cron_value = Some(cron_value.to_string());
        self
    }

    pub fn with_interval(mut self, minutes: i64) -> Self {
        self.definition.interval = Some(minutes);
        self
    }

    pub fn with_date_next(mut self, date_next: DateTime<Utc>) -> Self {
        self.definition.date_next = Some(date_next);
        self
    }

    pub fn with_priority(mut self, priority: PriorityTask) -> Self {
        self.definition.priority = Some(priority);
        self
    }

    pub fn with_data(mut self, data: &str) -> Self {
        self.definition.data = Some(data.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.definition.is_active = false;
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.definition
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SchedulerError, SchedulerResult};

/// 调度类型
///
/// 与调度类型目录中的 `code` 一一对应。
///
/// - `Once`: 在指定的时间点执行一次
/// - `OnceADay`: 每天在 `HH:MM` 执行
/// - `Interval`: 按固定间隔（分钟）重复执行
/// - `IntervalWithStartDate`: 从指定的开始时间起按固定间隔重复执行
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScheduleKind {
    #[serde(rename = "ONCE")]
    Once,
    #[serde(rename = "ONCE_A_DAY")]
    OnceADay,
    #[serde(rename = "INTERVAL")]
    Interval,
    #[serde(rename = "INTERVAL_WITH_START_DATE")]
    IntervalWithStartDate,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Once => "ONCE",
            ScheduleKind::OnceADay => "ONCE_A_DAY",
            ScheduleKind::Interval => "INTERVAL",
            ScheduleKind::IntervalWithStartDate => "INTERVAL_WITH_START_DATE",
        }
    }

    /// 是否为重复执行的调度类型
    pub fn is_recurring(&self) -> bool {
        !matches!(self, ScheduleKind::Once)
    }

    pub fn requires_interval(&self) -> bool {
        matches!(
            self,
            ScheduleKind::Interval | ScheduleKind::IntervalWithStartDate
        )
    }
}

impl FromStr for ScheduleKind {
    type Err = SchedulerError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "ONCE" => Ok(ScheduleKind::Once),
            "ONCE_A_DAY" => Ok(ScheduleKind::OnceADay),
            "INTERVAL" => Ok(ScheduleKind::Interval),
            "INTERVAL_WITH_START_DATE" => Ok(ScheduleKind::IntervalWithStartDate),
            other => Err(SchedulerError::InvalidSchedule(format!(
                "未知的调度类型: {other}"
            ))),
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 调度类型目录条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CronType {
    pub id: i64,
    pub code: String,
    pub name: String,
}

impl CronType {
    pub fn new(id: i64, kind: ScheduleKind, name: &str) -> Self {
        Self {
            id,
            code: kind.as_str().to_string(),
            name: name.to_string(),
        }
    }

    /// 将目录中的编码解析为调度类型，未知编码视为无效调度
    pub fn kind(&self) -> SchedulerResult<ScheduleKind> {
        self.code.parse()
    }
}

/// 任务优先级目录条目，`weight` 越大越先执行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityTask {
    pub id: i64,
    pub code: String,
    pub weight: i32,
}

impl PriorityTask {
    pub fn new(id: i64, code: &str, weight: i32) -> Self {
        Self {
            id,
            code: code.to_string(),
            weight,
        }
    }
}

/// 任务定义
///
/// 以 `code` 为唯一标识的调度任务记录。`cron_type` 和 `priority`
/// 是读取时关联出的目录条目，持久化时只保存它们的 id。
///
/// `is_active == true` 时，触发器注册表中必须恰好有一个以 `code`
/// 为键的触发器（`IntervalWithStartDate` 另有 `code-interval`）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDefinition {
    pub code: String,
    pub cron_type: Option<CronType>,
    pub priority: Option<PriorityTask>,
    /// 计算出的触发表达式，仅用于观察和排查
    pub cron_value: Option<String>,
    /// 归一化后的间隔（分钟）
    pub interval: Option<i64>,
    pub is_active: bool,
    pub date_next: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    /// 最近一次执行结果：true 成功，false 失败
    pub status: Option<bool>,
    /// 序列化后的任务数据
    pub data: Option<String>,
}

impl TaskDefinition {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            cron_type: None,
            priority: None,
            cron_value: None,
            interval: None,
            is_active: false,
            date_next: None,
            date_end: None,
            status: None,
            data: None,
        }
    }

    pub fn cron_type_id(&self) -> Option<i64> {
        self.cron_type.as_ref().map(|c| c.id)
    }

    pub fn priority_id(&self) -> Option<i64> {
        self.priority.as_ref().map(|p| p.id)
    }

    pub fn priority_weight(&self) -> i32 {
        self.priority.as_ref().map(|p| p.weight).unwrap_or_default()
    }

    pub fn schedule_kind(&self) -> SchedulerResult<ScheduleKind> {
        self.cron_type
            .as_ref()
            .ok_or_else(|| {
                SchedulerError::InvalidSchedule(format!("任务 {} 没有调度类型", self.code))
            })?
            .kind()
    }

    /// 任务数据解析为JSON；无法解析时按原始字符串传递
    pub fn payload(&self) -> Option<serde_json::Value> {
        self.data.as_ref().map(|raw| {
            serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.clone()))
        })
    }
}

/// 调度描述，对应创建接口中的 `data` 字段
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDescription {
    /// `HH:MM` 或完整的日期时间，取决于调度类型
    pub time: Option<String>,
    pub cron_type_id: i64,
    pub priority_id: i64,
    /// 原始间隔（分钟），创建时归一化
    pub interval: Option<i64>,
    pub specific_task_data: Option<serde_json::Value>,
}

/// 创建任务请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// 任务类型，同时作为任务编码
    pub task_type: String,
    pub data: ScheduleDescription,
}

impl CreateTaskRequest {
    pub fn new(task_type: impl Into<String>, data: ScheduleDescription) -> Self {
        Self {
            task_type: task_type.into(),
            data,
        }
    }
}

/// 一次终态执行结果写回任务定义的内容
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskOutcomeUpdate {
    pub date_end: DateTime<Utc>,
    pub date_next: DateTime<Utc>,
    pub status: bool,
}

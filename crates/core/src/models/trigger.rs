use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 触发表达式
///
/// `At` 是一次性的绝对时间点，`Cron` 是5字段（可选第6个年份字段）的
/// 标准cron表达式，例如 `30 14 * * *`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TriggerExpression {
    At(DateTime<Utc>),
    Cron(String),
}

impl TriggerExpression {
    pub fn cron(expr: impl Into<String>) -> Self {
        TriggerExpression::Cron(expr.into())
    }

    pub fn is_one_shot(&self) -> bool {
        matches!(self, TriggerExpression::At(_))
    }
}

impl fmt::Display for TriggerExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerExpression::At(at) => f.write_str(&at.to_rfc3339()),
            TriggerExpression::Cron(expr) => f.write_str(expr),
        }
    }
}

/// 一个任务需要布置的触发器
///
/// 存在 `secondary` 时，`primary` 只触发一次，触发后布置重复执行的 `secondary`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPlan {
    pub primary: TriggerExpression,
    pub secondary: Option<TriggerExpression>,
}

impl TriggerPlan {
    pub fn single(primary: TriggerExpression) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn two_stage(start: DateTime<Utc>, repeating: TriggerExpression) -> Self {
        Self {
            primary: TriggerExpression::At(start),
            secondary: Some(repeating),
        }
    }
}

/// 触发器到期时发给调度服务的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerFired {
    pub code: String,
    /// 布置时分配的代次，用于丢弃已被取消或重建的触发器产生的事件
    pub generation: u64,
    pub scheduled_for: DateTime<Utc>,
}

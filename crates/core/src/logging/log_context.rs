//! 显式传递的日志上下文
//!
//! 调用方构建一个 [`LogContext`] 并沿调用链传下去，不依赖请求级的全局存储。
//! 输出时按 [`FIELD_ACCESS`] 过滤：某个字段只出现在允许它的日志类型中，
//! 比如任务数据只在调试和错误日志里出现。

use std::fmt::Write as _;

use super::log_level::LogType;

const ALL: &[LogType] = &[LogType::Debug, LogType::Info, LogType::Warn, LogType::Error];

/// 字段名到允许输出该字段的日志类型
pub const FIELD_ACCESS: &[(&str, &[LogType])] = &[
    ("request_id", ALL),
    ("task_code", ALL),
    ("task_type", ALL),
    ("operation", ALL),
    ("payload", &[LogType::Debug, LogType::Error]),
    ("detail", &[LogType::Debug, LogType::Warn, LogType::Error]),
];

/// 字段是否允许出现在该类型的日志中；未登记的字段一律不输出
pub fn field_allowed(field: &str, log_type: LogType) -> bool {
    FIELD_ACCESS
        .iter()
        .find(|(name, _)| *name == field)
        .is_some_and(|(_, allowed)| allowed.contains(&log_type))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogContext {
    fields: Vec<(&'static str, String)>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_task(task_code: &str) -> Self {
        Self::new().with("task_code", task_code)
    }

    /// 同名字段会被覆盖
    pub fn with(mut self, field: &'static str, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((field, value)),
        }
        self
    }

    pub fn with_request_id(self, request_id: impl ToString) -> Self {
        self.with("request_id", request_id)
    }

    pub fn with_payload(self, payload: &serde_json::Value) -> Self {
        self.with("payload", payload)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn visible_fields(&self, log_type: LogType) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields
            .iter()
            .filter(move |(name, _)| field_allowed(name, log_type))
            .map(|(name, value)| (*name, value.as_str()))
    }

    /// 渲染为 `key=value` 形式，字段顺序与添加顺序一致
    pub fn render(&self, log_type: LogType) -> String {
        let mut out = String::new();
        for (name, value) in self.visible_fields(log_type) {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{name}={value}");
        }
        out
    }
}

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::str::FromStr;

use task_scheduler_core::{Result, SchedulerError};

/// CRON表达式解析和调度工具
///
/// 接受标准的5字段表达式（分 时 日 月 周），可带第6个年份字段。
/// 内部转换为 `cron` crate 的格式（在最前面补一个秒字段 `0`）。
pub struct CronScheduler {
    schedule: Schedule,
}

impl CronScheduler {
    pub fn new(cron_expr: &str) -> Result<Self> {
        let schedule = Schedule::from_str(&Self::to_engine_format(cron_expr)?).map_err(|e| {
            SchedulerError::InvalidCron {
                expr: cron_expr.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self { schedule })
    }

    fn to_engine_format(cron_expr: &str) -> Result<String> {
        let fields = cron_expr.split_whitespace().count();
        if !(5..=6).contains(&fields) {
            return Err(SchedulerError::InvalidCron {
                expr: cron_expr.to_string(),
                message: format!("需要5或6个字段，实际为{fields}个"),
            });
        }
        Ok(format!("0 {}", cron_expr.trim()))
    }

    /// 获取严格晚于 `from` 的下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> Result<()> {
        Self::new(cron_expr).map(|_| ())
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_execution_time(now).map(|next| next - now)
    }
}

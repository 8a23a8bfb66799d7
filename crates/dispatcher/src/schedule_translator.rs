//! 调度描述到触发器的转换
//!
//! 纯函数，不持有状态。间隔的单位是分钟，当前时间由调用方传入。

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Timelike, Utc};

use task_scheduler_core::{
    models::{ScheduleKind, TriggerExpression, TriggerPlan},
    SchedulerError, SchedulerResult,
};

pub const HOUR_UNIT: i64 = 60;
pub const DAY_UNIT: i64 = 1_440;
pub const MONTH_UNIT: i64 = 43_200;
pub const YEAR_UNIT: i64 = 15_768_000;
/// 允许的最大间隔：一百年
pub const MAX_INTERVAL: i64 = 100 * YEAR_UNIT;

/// 间隔所属的粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalBucket {
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl IntervalBucket {
    pub fn of(minutes: i64) -> Self {
        if minutes >= YEAR_UNIT {
            IntervalBucket::Year
        } else if minutes >= MONTH_UNIT {
            IntervalBucket::Month
        } else if minutes >= DAY_UNIT {
            IntervalBucket::Day
        } else if minutes >= HOUR_UNIT {
            IntervalBucket::Hour
        } else {
            IntervalBucket::Minute
        }
    }

    pub fn unit(&self) -> i64 {
        match self {
            IntervalBucket::Minute => 1,
            IntervalBucket::Hour => HOUR_UNIT,
            IntervalBucket::Day => DAY_UNIT,
            IntervalBucket::Month => MONTH_UNIT,
            IntervalBucket::Year => YEAR_UNIT,
        }
    }
}

/// 将间隔四舍五入到所属粒度的整数倍；不足一小时的间隔原样返回
///
/// 超过 [`MAX_INTERVAL`] 的间隔返回 `InvalidSchedule`。
pub fn normalize_interval(raw: i64) -> SchedulerResult<i64> {
    if raw > MAX_INTERVAL {
        return Err(SchedulerError::InvalidSchedule(format!(
            "间隔超出上限 {MAX_INTERVAL} 分钟: {raw}"
        )));
    }
    let normalized = match IntervalBucket::of(raw) {
        IntervalBucket::Minute => raw,
        bucket => {
            let unit = bucket.unit();
            (raw + unit / 2) / unit * unit
        }
    };
    Ok(normalized)
}

/// 由归一化后的间隔生成步进cron表达式
pub fn interval_cron(normalized: i64) -> SchedulerResult<TriggerExpression> {
    if normalized <= 0 {
        return Err(SchedulerError::InvalidSchedule(format!(
            "间隔必须大于0: {normalized}"
        )));
    }

    let bucket = IntervalBucket::of(normalized);
    let step = normalized / bucket.unit();
    let expr = match bucket {
        IntervalBucket::Minute => format!("*/{step} * * * *"),
        IntervalBucket::Hour => format!("0 */{step} * * *"),
        IntervalBucket::Day => format!("0 0 */{step} * *"),
        IntervalBucket::Month => format!("0 0 1 */{step} *"),
        IntervalBucket::Year => format!("0 0 1 1 * */{step}"),
    };
    Ok(TriggerExpression::Cron(expr))
}

/// 解析 `HH:MM`，返回 (时, 分)
pub fn parse_time_of_day(time: &str) -> SchedulerResult<(u32, u32)> {
    let parsed = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|e| {
        SchedulerError::InvalidSchedule(format!("无法解析时间 '{time}': {e}"))
    })?;
    Ok((parsed.hour(), parsed.minute()))
}

/// 解析完整的日期时间；不带时区的写法按UTC处理
pub fn parse_date_time(value: &str) -> SchedulerResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SchedulerError::InvalidSchedule(format!("无法解析日期时间 '{value}'")))
}

fn require_time<'a>(kind: ScheduleKind, time: Option<&'a str>) -> SchedulerResult<&'a str> {
    time.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
        SchedulerError::InvalidSchedule(format!("调度类型 {kind} 需要指定时间"))
    })
}

fn require_interval(kind: ScheduleKind, interval: Option<i64>) -> SchedulerResult<i64> {
    interval.filter(|i| *i > 0).ok_or_else(|| {
        SchedulerError::InvalidSchedule(format!("调度类型 {kind} 需要大于0的间隔"))
    })
}

/// 计算任务需要布置的触发器
pub fn to_trigger_plan(
    kind: ScheduleKind,
    time: Option<&str>,
    interval: Option<i64>,
) -> SchedulerResult<TriggerPlan> {
    match kind {
        ScheduleKind::Interval => Ok(TriggerPlan::single(interval_cron(require_interval(
            kind, interval,
        )?)?)),
        ScheduleKind::Once => Ok(TriggerPlan::single(TriggerExpression::At(parse_date_time(
            require_time(kind, time)?,
        )?))),
        ScheduleKind::OnceADay => {
            let (hour, minute) = parse_time_of_day(require_time(kind, time)?)?;
            Ok(TriggerPlan::single(TriggerExpression::Cron(format!(
                "{minute} {hour} * * *"
            ))))
        }
        ScheduleKind::IntervalWithStartDate => {
            let start = parse_date_time(require_time(kind, time)?)?;
            let repeating = interval_cron(require_interval(kind, interval)?)?;
            Ok(TriggerPlan::two_stage(start, repeating))
        }
    }
}

/// 由持久化的 `cron_value` 和间隔还原触发器，用于重启后恢复
pub fn restore_trigger_plan(
    kind: ScheduleKind,
    cron_value: Option<&str>,
    interval: Option<i64>,
) -> SchedulerResult<TriggerPlan> {
    let stored = cron_value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SchedulerError::InvalidSchedule("任务没有保存触发表达式".to_string()))?;

    match kind {
        ScheduleKind::Once => Ok(TriggerPlan::single(TriggerExpression::At(parse_date_time(
            stored,
        )?))),
        ScheduleKind::OnceADay | ScheduleKind::Interval => {
            Ok(TriggerPlan::single(TriggerExpression::cron(stored.trim())))
        }
        ScheduleKind::IntervalWithStartDate => Ok(TriggerPlan::two_stage(
            parse_date_time(stored)?,
            interval_cron(require_interval(kind, interval)?)?,
        )),
    }
}

/// 创建任务时的首次执行时间
pub fn compute_initial_next_fire(
    kind: ScheduleKind,
    time: Option<&str>,
    interval: Option<i64>,
    now: DateTime<Utc>,
) -> SchedulerResult<DateTime<Utc>> {
    match kind {
        ScheduleKind::Interval => Ok(now + Duration::minutes(require_interval(kind, interval)?)),
        ScheduleKind::OnceADay => {
            let (hour, minute) = parse_time_of_day(require_time(kind, time)?)?;
            let today = now
                .date_naive()
                .and_hms_opt(hour, minute, 0)
                .map(|naive| naive.and_utc())
                .ok_or_else(|| {
                    SchedulerError::InvalidSchedule(format!("无效的时间 {hour}:{minute}"))
                })?;
            if now > today {
                Ok(today + Duration::days(1))
            } else {
                Ok(today)
            }
        }
        ScheduleKind::Once | ScheduleKind::IntervalWithStartDate => {
            parse_date_time(require_time(kind, time)?)
        }
    }
}

/// 一次终态结果之后的下一次执行时间
pub fn compute_following_fire(
    kind: ScheduleKind,
    previous_next: DateTime<Utc>,
    interval: Option<i64>,
) -> SchedulerResult<DateTime<Utc>> {
    match kind {
        ScheduleKind::Interval | ScheduleKind::IntervalWithStartDate => {
            Ok(previous_next + Duration::minutes(require_interval(kind, interval)?))
        }
        ScheduleKind::OnceADay => Ok(previous_next + Duration::days(1)),
        ScheduleKind::Once => Ok(previous_next),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(IntervalBucket::of(59), IntervalBucket::Minute);
        assert_eq!(IntervalBucket::of(60), IntervalBucket::Hour);
        assert_eq!(IntervalBucket::of(1_440), IntervalBucket::Day);
        assert_eq!(IntervalBucket::of(43_200), IntervalBucket::Month);
        assert_eq!(IntervalBucket::of(15_768_000), IntervalBucket::Year);
    }

    #[test]
    fn test_naive_date_time_is_utc() {
        let expected = parse_date_time("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(parse_date_time("2024-05-01T10:00").unwrap(), expected);
        assert_eq!(parse_date_time("2024-05-01 10:00:00").unwrap(), expected);
        assert_eq!(parse_date_time("2024-05-01T12:00:00+02:00").unwrap(), expected);
    }
}

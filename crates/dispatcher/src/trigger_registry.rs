//! 触发器注册表
//!
//! 每个任务编码最多对应一个已布置的触发器（两阶段调度另有 `<code>-interval`）。
//! 每次布置分配一个新的代次，触发事件携带代次，调度服务据此丢弃
//! 已被取消或重建的触发器产生的事件。
//!
//! 布置和取消在同一把锁下完成，同一编码的两次操作不会交错。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use task_scheduler_core::{
    models::{TriggerExpression, TriggerFired, TriggerPlan},
    SchedulerResult, StructuredLogger,
};

use crate::cron_utils::CronScheduler;

pub const SECONDARY_SUFFIX: &str = "-interval";

pub fn secondary_key(code: &str) -> String {
    format!("{code}{SECONDARY_SUFFIX}")
}

/// 把UTC时间映射到tokio的单调时钟上
///
/// 定时器都通过 `tokio::time` 等待，测试中暂停时间后也能按预期推进。
#[derive(Debug, Clone, Copy)]
struct TriggerClock {
    anchor_utc: DateTime<Utc>,
    anchor_instant: Instant,
}

impl TriggerClock {
    fn start() -> Self {
        Self {
            anchor_utc: Utc::now(),
            anchor_instant: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.anchor_instant);
        self.anchor_utc + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }

    /// 早于锚点的时间映射为锚点本身，等待会立即结束
    fn instant_for(&self, at: DateTime<Utc>) -> Instant {
        match (at - self.anchor_utc).to_std() {
            Ok(offset) => self.anchor_instant + offset,
            Err(_) => self.anchor_instant,
        }
    }
}

struct ArmedTrigger {
    generation: u64,
    expression: TriggerExpression,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct RegistryState {
    handles: HashMap<String, ArmedTrigger>,
    generations: HashMap<String, u64>,
    next_generation: u64,
}

pub struct TriggerRegistry {
    state: Mutex<RegistryState>,
    fire_tx: mpsc::UnboundedSender<TriggerFired>,
    clock: TriggerClock,
    self_ref: Weak<TriggerRegistry>,
}

impl TriggerRegistry {
    /// 创建注册表，返回的接收端交给调度服务的事件循环
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TriggerFired>) {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        let registry = Arc::new_cyclic(|weak| Self {
            state: Mutex::new(RegistryState::default()),
            fire_tx,
            clock: TriggerClock::start(),
            self_ref: weak.clone(),
        });
        (registry, fire_rx)
    }

    /// 与定时器使用同一时钟的当前时间
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn validate(plan: &TriggerPlan) -> SchedulerResult<()> {
        for expression in std::iter::once(&plan.primary).chain(plan.secondary.as_ref()) {
            if let TriggerExpression::Cron(expr) = expression {
                CronScheduler::validate_cron_expression(expr)?;
            }
        }
        Ok(())
    }

    /// 布置触发器，先取消同一编码下已有的触发器，返回新的代次
    pub fn arm(&self, code: &str, plan: &TriggerPlan) -> SchedulerResult<u64> {
        Self::validate(plan)?;

        let mut state = self.lock();
        Self::abort_code(&mut state, code);

        state.next_generation += 1;
        let generation = state.next_generation;
        state.generations.insert(code.to_string(), generation);

        let handle = match &plan.secondary {
            Some(secondary) => {
                self.spawn_two_stage(code, generation, plan.primary.clone(), secondary.clone())
            }
            None => self.spawn_timer(code, generation, plan.primary.clone(), None),
        };
        state.handles.insert(
            code.to_string(),
            ArmedTrigger {
                generation,
                expression: plan.primary.clone(),
                handle,
            },
        );
        drop(state);

        let secondary = plan.secondary.as_ref().map(|s| s.to_string());
        StructuredLogger::log_trigger_armed(
            code,
            generation,
            &plan.primary.to_string(),
            secondary.as_deref(),
        );
        Ok(generation)
    }

    /// 取消 `code` 和 `code-interval`，返回之前是否布置过；重复取消不是错误
    pub fn cancel(&self, code: &str) -> bool {
        let mut state = self.lock();
        let had_trigger = Self::abort_code(&mut state, code);
        state.generations.remove(code);
        had_trigger
    }

    pub fn cancel_all(&self) -> usize {
        let mut state = self.lock();
        let count = state.handles.len();
        for (_, armed) in state.handles.drain() {
            armed.handle.abort();
        }
        state.generations.clear();
        count
    }

    pub fn is_armed(&self, code: &str) -> bool {
        let state = self.lock();
        state.handles.contains_key(code) || state.handles.contains_key(&secondary_key(code))
    }

    /// 事件的代次是否仍是该编码当前的代次
    pub fn is_current(&self, code: &str, generation: u64) -> bool {
        self.lock().generations.get(code) == Some(&generation)
    }

    pub fn generation(&self, code: &str) -> Option<u64> {
        self.lock().generations.get(code).copied()
    }

    pub fn armed_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.lock().handles.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn armed_expression(&self, key: &str) -> Option<TriggerExpression> {
        self.lock().handles.get(key).map(|armed| armed.expression.clone())
    }

    fn abort_code(state: &mut RegistryState, code: &str) -> bool {
        let mut had_trigger = false;
        for key in [code.to_string(), secondary_key(code)] {
            if let Some(armed) = state.handles.remove(&key) {
                armed.handle.abort();
                had_trigger = true;
            }
        }
        had_trigger
    }

    fn emit(&self, code: &str, generation: u64, scheduled_for: DateTime<Utc>) -> bool {
        metrics::counter!("scheduler_triggers_fired_total").increment(1);
        StructuredLogger::log_trigger_fired(code, generation, scheduled_for);
        self.fire_tx
            .send(TriggerFired {
                code: code.to_string(),
                generation,
                scheduled_for,
            })
            .is_ok()
    }

    /// 一次性触发器触发后移除自己的句柄，代次保留到取消或重建为止
    fn finish_one_shot(&self, code: &str, generation: u64) {
        let mut state = self.lock();
        if state.handles.get(code).map(|armed| armed.generation) == Some(generation) {
            state.handles.remove(code);
        }
    }

    /// 两阶段调度的第一阶段结束：布置重复执行的第二阶段触发器
    fn promote(
        &self,
        code: &str,
        generation: u64,
        started_at: DateTime<Utc>,
        secondary: TriggerExpression,
    ) {
        let mut state = self.lock();
        if state.generations.get(code) != Some(&generation) {
            return;
        }
        state.handles.remove(code);

        let key = secondary_key(code);
        if let Some(previous) = state.handles.remove(&key) {
            previous.handle.abort();
        }
        let handle = self.spawn_timer(code, generation, secondary.clone(), Some(started_at));
        state.handles.insert(
            key,
            ArmedTrigger {
                generation,
                expression: secondary,
                handle,
            },
        );
        tracing::debug!(task.code = code, "起始时间已到，布置间隔触发器");
    }

    fn spawn_timer(
        &self,
        code: &str,
        generation: u64,
        expression: TriggerExpression,
        start_from: Option<DateTime<Utc>>,
    ) -> JoinHandle<()> {
        let registry = self.self_ref.clone();
        let code = code.to_string();
        match expression {
            TriggerExpression::At(at) => tokio::spawn(async move {
                let Some(deadline) = registry.upgrade().map(|r| r.clock.instant_for(at)) else {
                    return;
                };
                sleep_until(deadline).await;
                if let Some(registry) = registry.upgrade() {
                    registry.emit(&code, generation, at);
                    registry.finish_one_shot(&code, generation);
                }
            }),
            TriggerExpression::Cron(expr) => {
                tokio::spawn(Self::repeat(registry, code, generation, expr, start_from))
            }
        }
    }

    fn spawn_two_stage(
        &self,
        code: &str,
        generation: u64,
        primary: TriggerExpression,
        secondary: TriggerExpression,
    ) -> JoinHandle<()> {
        let registry = self.self_ref.clone();
        let code = code.to_string();
        tokio::spawn(async move {
            let Some(clock) = registry.upgrade().map(|r| r.clock) else {
                return;
            };
            let started_at = match &primary {
                TriggerExpression::At(at) => *at,
                TriggerExpression::Cron(expr) => {
                    match CronScheduler::new(expr)
                        .ok()
                        .and_then(|cron| cron.next_execution_time(clock.now()))
                    {
                        Some(next) => next,
                        None => return,
                    }
                }
            };
            sleep_until(clock.instant_for(started_at)).await;
            if let Some(registry) = registry.upgrade() {
                registry.promote(&code, generation, started_at, secondary);
            }
        })
    }

    /// 按cron重复触发；游标只前进，同一个计划时间不会触发两次
    async fn repeat(
        registry: Weak<Self>,
        code: String,
        generation: u64,
        expr: String,
        start_from: Option<DateTime<Utc>>,
    ) {
        let cron = match CronScheduler::new(&expr) {
            Ok(cron) => cron,
            Err(e) => {
                tracing::error!(task.code = %code, "无法解析触发表达式: {e}");
                return;
            }
        };
        let Some(clock) = registry.upgrade().map(|r| r.clock) else {
            return;
        };

        let now = clock.now();
        let mut cursor = start_from.map_or(now, |start| start.max(now));
        while let Some(next) = cron.next_execution_time(cursor) {
            sleep_until(clock.instant_for(next)).await;
            let Some(registry) = registry.upgrade() else {
                break;
            };
            if !registry.emit(&code, generation, next) {
                break;
            }
            cursor = next.max(clock.now());
        }
    }
}

impl Drop for TriggerRegistry {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, armed) in state.handles.drain() {
            armed.handle.abort();
        }
    }
}

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use task_scheduler_core::{
    models::{CronType, PriorityTask, TaskDefinition, TaskOutcomeUpdate},
    traits::TaskStateStore,
    SchedulerResult,
};

use crate::database::{default_cron_types, default_priorities};

const SELECT_DEFINITION: &str = r#"
    SELECT d.code, d.cron_value, d.interval_minutes, d.is_active, d.date_next,
           d.date_end, d.status, d.data,
           c.id AS cron_type_id, c.code AS cron_type_code, c.name AS cron_type_name,
           p.id AS priority_id, p.code AS priority_code, p.weight AS priority_weight
    FROM scheduler_data d
    LEFT JOIN cron_types c ON c.id = d.cron_type_id
    LEFT JOIN priorities_task p ON p.id = d.priority_id
"#;

pub struct SqliteTaskStateStore {
    pool: SqlitePool,
}

impl SqliteTaskStateStore {
    /// 使用已有连接池，调用方负责执行 [`Self::run_migrations`]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 连接数据库并初始化表结构和目录数据
    pub async fn connect(url: &str, max_connections: u32) -> SchedulerResult<Self> {
        debug!("连接SQLite任务存储: {}", url);

        let connect_options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .min_connections(1)
            .connect_with(connect_options)
            .await?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
        debug!("执行SQLite数据库迁移");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cron_types (
                id INTEGER PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS priorities_task (
                id INTEGER PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                weight INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scheduler_data (
                code TEXT PRIMARY KEY,
                cron_type_id INTEGER REFERENCES cron_types(id),
                priority_id INTEGER REFERENCES priorities_task(id),
                cron_value TEXT,
                interval_minutes INTEGER,
                is_active BOOLEAN NOT NULL DEFAULT 0,
                date_next DATETIME,
                date_end DATETIME,
                status BOOLEAN,
                data TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_scheduler_data_active ON scheduler_data(is_active)")
            .execute(pool)
            .await?;

        for cron_type in default_cron_types() {
            sqlx::query("INSERT OR IGNORE INTO cron_types (id, code, name) VALUES (?, ?, ?)")
                .bind(cron_type.id)
                .bind(&cron_type.code)
                .bind(&cron_type.name)
                .execute(pool)
                .await?;
        }

        for priority in default_priorities() {
            sqlx::query("INSERT OR IGNORE INTO priorities_task (id, code, weight) VALUES (?, ?, ?)")
                .bind(priority.id)
                .bind(&priority.code)
                .bind(priority.weight)
                .execute(pool)
                .await?;
        }

        debug!("SQLite数据库迁移完成");
        Ok(())
    }

    pub async fn insert_cron_type(&self, cron_type: &CronType) -> SchedulerResult<()> {
        sqlx::query("INSERT OR REPLACE INTO cron_types (id, code, name) VALUES (?, ?, ?)")
            .bind(cron_type.id)
            .bind(&cron_type.code)
            .bind(&cron_type.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_priority(&self, priority: &PriorityTask) -> SchedulerResult<()> {
        sqlx::query("INSERT OR REPLACE INTO priorities_task (id, code, weight) VALUES (?, ?, ?)")
            .bind(priority.id)
            .bind(&priority.code)
            .bind(priority.weight)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_definition(row: &SqliteRow) -> SchedulerResult<TaskDefinition> {
        let cron_type = match row.try_get::<Option<i64>, _>("cron_type_id")? {
            Some(id) => Some(CronType {
                id,
                code: row.try_get("cron_type_code")?,
                name: row.try_get("cron_type_name")?,
            }),
            None => None,
        };
        let priority = match row.try_get::<Option<i64>, _>("priority_id")? {
            Some(id) => Some(PriorityTask {
                id,
                code: row.try_get("priority_code")?,
                weight: row.try_get("priority_weight")?,
            }),
            None => None,
        };

        Ok(TaskDefinition {
            code: row.try_get("code")?,
            cron_type,
            priority,
            cron_value: row.try_get("cron_value")?,
            interval: row.try_get("interval_minutes")?,
            is_active: row.try_get("is_active")?,
            date_next: row.try_get::<Option<DateTime<Utc>>, _>("date_next")?,
            date_end: row.try_get::<Option<DateTime<Utc>>, _>("date_end")?,
            status: row.try_get("status")?,
            data: row.try_get("data")?,
        })
    }
}

#[async_trait]
impl TaskStateStore for SqliteTaskStateStore {
    async fn get_cron_type(&self, id: i64) -> SchedulerResult<Option<CronType>> {
        let row = sqlx::query("SELECT id, code, name FROM cron_types WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(CronType {
                id: row.try_get("id")?,
                code: row.try_get("code")?,
                name: row.try_get("name")?,
            })),
            None => Ok(None),
        }
    }

    async fn get_priority(&self, id: i64) -> SchedulerResult<Option<PriorityTask>> {
        let row = sqlx::query("SELECT id, code, weight FROM priorities_task WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(PriorityTask {
                id: row.try_get("id")?,
                code: row.try_get("code")?,
                weight: row.try_get("weight")?,
            })),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn get_by_code(&self, code: &str) -> SchedulerResult<Option<TaskDefinition>> {
        let sql = format!("{SELECT_DEFINITION} WHERE d.code = ?");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_definition).transpose()
    }

    #[instrument(skip(self, definition), fields(task.code = %definition.code))]
    async fn save(&self, definition: &TaskDefinition) -> SchedulerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduler_data
                (code, cron_type_id, priority_id, cron_value, interval_minutes,
                 is_active, date_next, date_end, status, data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET
                cron_type_id = excluded.cron_type_id,
                priority_id = excluded.priority_id,
                cron_value = excluded.cron_value,
                interval_minutes = excluded.interval_minutes,
                is_active = excluded.is_active,
                date_next = excluded.date_next,
                date_end = excluded.date_end,
                status = excluded.status,
                data = excluded.data
            "#,
        )
        .bind(&definition.code)
        .bind(definition.cron_type_id())
        .bind(definition.priority_id())
        .bind(&definition.cron_value)
        .bind(definition.interval)
        .bind(definition.is_active)
        .bind(definition.date_next)
        .bind(definition.date_end)
        .bind(definition.status)
        .bind(&definition.data)
        .execute(&self.pool)
        .await?;

        debug!("任务定义已保存");
        Ok(())
    }

    async fn set_active(&self, code: &str, is_active: bool) -> SchedulerResult<bool> {
        let result = sqlx::query("UPDATE scheduler_data SET is_active = ? WHERE code = ?")
            .bind(is_active)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_outcome(&self, code: &str, update: TaskOutcomeUpdate) -> SchedulerResult<bool> {
        let result = sqlx::query(
            "UPDATE scheduler_data SET date_end = ?, date_next = ?, status = ? WHERE code = ?",
        )
        .bind(update.date_end)
        .bind(update.date_next)
        .bind(update.status)
        .bind(code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_active_tasks(&self) -> SchedulerResult<Vec<TaskDefinition>> {
        let sql = format!("{SELECT_DEFINITION} WHERE d.is_active = 1 ORDER BY d.code");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_definition).collect()
    }
}

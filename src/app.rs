use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

use task_scheduler_api::create_app;
use task_scheduler_core::{
    config::AppConfig,
    models::{JobOutcome, TriggerFired},
    traits::{ExecutorRegistry, TaskStateStore},
    DefaultExecutorRegistry,
};
use task_scheduler_dispatcher::{
    RecoveryReport, SchedulerService, SchedulerServiceConfig, Supervisor, TriggerRegistry,
};
use task_scheduler_infrastructure::{
    ExecutionQueue, ExecutionQueueConfig, InMemoryTaskStateStore, SqliteTaskStateStore,
};
use task_scheduler_worker::ExecutorFactory;

/// 主应用程序
///
/// 持有装配好的各个组件，[`Application::run`] 消费自身直到收到关闭信号。
pub struct Application {
    config: AppConfig,
    store: Arc<dyn TaskStateStore>,
    sqlite: Option<Arc<SqliteTaskStateStore>>,
    triggers: Arc<TriggerRegistry>,
    queue: Arc<ExecutionQueue>,
    service: Arc<SchedulerService>,
    supervisor: Supervisor,
    fire_rx: mpsc::UnboundedReceiver<TriggerFired>,
    outcome_rx: mpsc::UnboundedReceiver<JobOutcome>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        Self::with_registry(config, DefaultExecutorRegistry::new()).await
    }

    /// 在已有注册表的基础上注册配置中的执行器绑定
    pub async fn with_registry(config: AppConfig, mut registry: DefaultExecutorRegistry) -> Result<Self> {
        let environment = config.scheduler.environment.clone();
        info!(environment = %environment, "初始化应用程序");

        let (store, sqlite) = create_store(&config).await?;

        let bound = ExecutorFactory::register_all(&mut registry, &config.executors, &config.execution)
            .await
            .context("注册执行器失败")?;
        info!("已注册 {} 个配置的执行器，共 {} 个", bound, registry.count().await);
        let executors: Arc<dyn ExecutorRegistry> = Arc::new(registry);

        let (triggers, fire_rx) = TriggerRegistry::new();
        let (queue, outcome_rx) = ExecutionQueue::new(
            ExecutionQueueConfig::new(environment.clone(), &config.queue),
            executors.clone(),
        );
        let queue = Arc::new(queue);

        let service = Arc::new(SchedulerService::new(
            store.clone(),
            triggers.clone(),
            queue.clone(),
            executors,
            SchedulerServiceConfig {
                environment,
                default_options: config.execution.options(),
            },
        ));
        let supervisor = Supervisor::new(service.clone(), store.clone());

        Ok(Self {
            config,
            store,
            sqlite,
            triggers,
            queue,
            service,
            supervisor,
            fire_rx,
            outcome_rx,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn service(&self) -> Arc<SchedulerService> {
        self.service.clone()
    }

    pub fn store(&self) -> Arc<dyn TaskStateStore> {
        self.store.clone()
    }

    pub fn triggers(&self) -> Arc<TriggerRegistry> {
        self.triggers.clone()
    }

    pub fn queue(&self) -> Arc<ExecutionQueue> {
        self.queue.clone()
    }

    /// 恢复启用任务的触发器
    pub async fn recover(&self) -> Result<RecoveryReport> {
        self.supervisor.recover().await.context("恢复任务触发器失败")
    }

    /// 运行直到收到关闭信号
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let report = self.recover().await?;
        info!(
            "任务触发器恢复完成: armed={}, failed={}",
            report.armed, report.failed
        );

        self.queue.start();

        let event_loop = {
            let service = self.service.clone();
            let shutdown_rx = shutdown_rx.resubscribe();
            let (fire_rx, outcome_rx) = (self.fire_rx, self.outcome_rx);
            tokio::spawn(async move { service.run(fire_rx, outcome_rx, shutdown_rx).await })
        };

        let server = if self.config.api.enabled {
            let listener = TcpListener::bind(&self.config.api.bind_address)
                .await
                .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;
            info!("API服务器启动在 http://{}", self.config.api.bind_address);

            let app = create_app(self.service.clone());
            let mut server_shutdown = shutdown_rx.resubscribe();
            Some(tokio::spawn(async move {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = server_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    error!("API服务器运行失败: {e}");
                }
            }))
        } else {
            None
        };

        let _ = shutdown_rx.recv().await;
        info!("应用程序收到关闭信号");

        let cancelled = self.triggers.cancel_all();
        info!("已取消 {cancelled} 个触发器");
        self.queue.stop().await;

        if let Err(e) = event_loop.await {
            error!("调度服务事件循环异常退出: {e}");
        }
        if let Some(server) = server {
            if let Err(e) = server.await {
                error!("API服务器异常退出: {e}");
            }
        }
        if let Some(sqlite) = &self.sqlite {
            sqlite.close().await;
        }

        info!("应用程序已停止");
        Ok(())
    }
}

async fn create_store(
    config: &AppConfig,
) -> Result<(Arc<dyn TaskStateStore>, Option<Arc<SqliteTaskStateStore>>)> {
    if config.database.is_sqlite() {
        info!("连接SQLite数据库: {}", config.database.url);
        let store = SqliteTaskStateStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("连接数据库失败")?;
        let store = Arc::new(store);
        let shared: Arc<dyn TaskStateStore> = store.clone();
        Ok((shared, Some(store)))
    } else {
        info!("使用内存任务存储，重启后任务不会保留");
        Ok((Arc::new(InMemoryTaskStateStore::new()), None))
    }
}

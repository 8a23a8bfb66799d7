use std::sync::Arc;
use std::time::Duration;

use task_scheduler::{Application, ShutdownManager};
use task_scheduler_core::{
    config::{AppConfig, ExecutorBinding, ExecutorKind, BACKEND_SQLITE},
    models::JobExecution,
    traits::{ExecutorRegistry, JobQueue, TaskStateStore},
    DefaultExecutorRegistry, ErrorKind,
};
use task_scheduler_testing_utils::{CreateRequestBuilder, RecordingExecutor};

fn memory_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.scheduler.environment = "develop".to_string();
    config.api.enabled = false;
    config
}

async fn registry_with(task_type: &str) -> DefaultExecutorRegistry {
    let mut registry = DefaultExecutorRegistry::new();
    registry
        .register(task_type.to_string(), RecordingExecutor::new(task_type).into_arc())
        .await
        .unwrap();
    registry
}

#[tokio::test]
async fn test_configured_executor_bindings_accept_tasks() {
    let mut config = memory_config();
    config.executors.push(ExecutorBinding {
        task_type: "cleanup".to_string(),
        kind: ExecutorKind::Shell,
        attempts: Some(1),
        ttl_ms: None,
        backoff_ms: None,
    });

    let app = Application::new(config).await.unwrap();
    let service = app.service();

    service
        .create_task(CreateRequestBuilder::new("cleanup").every(10).build())
        .await
        .unwrap();
    assert!(app.triggers().is_armed("cleanup"));

    let err = service
        .create_task(CreateRequestBuilder::new("unbound").every(10).build())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_sqlite_tasks_are_recovered_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = memory_config();
    config.database.backend = BACKEND_SQLITE.to_string();
    config.database.url = format!("sqlite://{}", dir.path().join("scheduler.db").display());

    {
        let app = Application::with_registry(config.clone(), registry_with("sync").await)
            .await
            .unwrap();
        let service = app.service();
        service
            .create_task(CreateRequestBuilder::new("sync").every(90).build())
            .await
            .unwrap();
    }

    let app = Application::with_registry(config, registry_with("sync").await)
        .await
        .unwrap();
    assert!(!app.triggers().is_armed("sync"));

    let report = app.recover().await.unwrap();
    assert_eq!(report.armed, 1);
    assert_eq!(report.failed, 0);
    assert!(app.triggers().is_armed("sync"));

    let definition = app.store().get_by_code("sync").await.unwrap().unwrap();
    assert_eq!(definition.interval, Some(120));
    assert_eq!(definition.cron_value.as_deref(), Some("0 */2 * * *"));
}

#[tokio::test]
async fn test_shutdown_cancels_triggers_and_stops_queue() {
    let app = Application::with_registry(memory_config(), registry_with("sync").await)
        .await
        .unwrap();
    app.service()
        .create_task(CreateRequestBuilder::new("sync").every(5).build())
        .await
        .unwrap();

    let triggers = app.triggers();
    let queue = app.queue();
    let shutdown = ShutdownManager::new();
    let shutdown_rx = shutdown.subscribe().await;
    let handle = tokio::spawn(app.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(triggers.is_armed("sync"));

    shutdown.shutdown().await;
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(triggers.armed_codes().is_empty());
    let queue: Arc<dyn JobQueue> = queue;
    assert!(queue
        .enqueue(JobExecution::new("develop", "sync", 5))
        .await
        .is_err());
}

use task_scheduler_core::{
    config::{ExecutionConfig, ExecutorBinding, ExecutorKind},
    models::ExecutionOptions,
    traits::ExecutorRegistry,
    DefaultExecutorRegistry,
};
use task_scheduler_worker::ExecutorFactory;

fn binding(task_type: &str, kind: ExecutorKind) -> ExecutorBinding {
    ExecutorBinding {
        task_type: task_type.to_string(),
        kind,
        attempts: None,
        ttl_ms: None,
        backoff_ms: None,
    }
}

#[tokio::test]
async fn test_register_all_binds_each_task_type() {
    let bindings = vec![
        binding("cleanup", ExecutorKind::Shell),
        binding("ping", ExecutorKind::Http),
    ];
    let mut registry = DefaultExecutorRegistry::new();
    let count = ExecutorFactory::register_all(&mut registry, &bindings, &ExecutionConfig::default())
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(registry.list_executors().await, vec!["cleanup", "ping"]);
    let executor = registry.get("ping").await.unwrap();
    assert_eq!(executor.name(), "ping");
    assert!(executor.execution_options().is_none());
}

#[test]
fn test_binding_overrides_fill_from_defaults() {
    let defaults = ExecutionConfig {
        attempts: 3,
        ttl_ms: Some(30_000),
        backoff_ms: 1_000,
    };
    let mut custom = binding("report", ExecutorKind::Shell);
    custom.attempts = Some(5);

    let executor = ExecutorFactory::create(&custom, &defaults);
    assert_eq!(
        executor.execution_options(),
        Some(ExecutionOptions {
            attempts: 5,
            ttl_ms: Some(30_000),
            backoff_ms: 1_000,
        })
    );
}

use std::fs;

use task_scheduler_core::config::*;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    assert_eq!(config.queue.concurrency, 4);
    assert_eq!(config.execution.attempts, 3);
    assert_eq!(config.database.backend, BACKEND_MEMORY);
    assert!(config.api.enabled);
    assert!(!config.observability.metrics_enabled);
    assert!(config.executors.is_empty());
}

#[test]
fn test_config_from_toml() {
    let toml_content = r#"
[scheduler]
environment = "staging"

[queue]
concurrency = 2
completed_retention_ms = 1000
failed_retention_ms = 2000

[execution]
attempts = 5
ttl_ms = 30000
backoff_ms = 100

[database]
backend = "sqlite"
url = "sqlite::memory:"
max_connections = 1

[api]
bind_address = "127.0.0.1:9000"

[[executors]]
task_type = "cleanup"
kind = "shell"

[[executors]]
task_type = "report"
kind = "http"
attempts = 1
"#;

    let config = AppConfig::from_toml(toml_content).unwrap();

    assert_eq!(config.scheduler.environment, "staging");
    assert_eq!(config.queue.concurrency, 2);
    assert_eq!(config.execution.ttl_ms, Some(30_000));
    assert!(config.database.is_sqlite());
    assert_eq!(config.api.bind_address, "127.0.0.1:9000");
    assert_eq!(config.executors.len(), 2);
    assert_eq!(config.executors[1].kind, ExecutorKind::Http);

    let cleanup = config.executors[0].options(&config.execution);
    assert_eq!(cleanup, None);
    let report = config.executors[1].options(&config.execution).unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(report.ttl_ms, Some(30_000));
    assert_eq!(report.backoff_ms, 100);
}

#[test]
fn test_invalid_configs_are_rejected() {
    let cases = [
        "[scheduler]\nenvironment = \"\"",
        "[scheduler]\nenvironment = \"a:b\"",
        "[queue]\nconcurrency = 0",
        "[execution]\nattempts = 0",
        "[database]\nbackend = \"postgres\"",
        "[observability]\nlog_format = \"xml\"",
        "[[executors]]\ntask_type = \"a\"\nkind = \"shell\"\n[[executors]]\ntask_type = \"a\"\nkind = \"http\"",
    ];
    for toml_content in cases {
        assert!(
            AppConfig::from_toml(toml_content).is_err(),
            "应该拒绝配置: {toml_content}"
        );
    }
}

#[test]
fn test_toml_round_trip() {
    let mut config = AppConfig::default();
    config.scheduler.environment = "production".to_string();
    config.executors.push(ExecutorBinding {
        task_type: "cleanup".to_string(),
        kind: ExecutorKind::Shell,
        attempts: Some(2),
        ttl_ms: None,
        backoff_ms: None,
    });

    let serialized = config.to_toml().unwrap();
    assert_eq!(AppConfig::from_toml(&serialized).unwrap(), config);
}

#[test]
fn test_load_from_file() {
    let file = NamedTempFile::with_suffix(".toml").unwrap();
    fs::write(
        file.path(),
        "[scheduler]\nenvironment = \"file-env\"\n\n[api]\nenabled = false\n",
    )
    .unwrap();

    let config = AppConfig::load(file.path().to_str()).unwrap();
    assert_eq!(config.scheduler.environment, "file-env");
    assert!(!config.api.enabled);
}

#[test]
fn test_load_missing_file_fails() {
    assert!(AppConfig::load(Some("/nonexistent/scheduler.toml")).is_err());
}

#[test]
fn test_environment_overrides_file() {
    let file = NamedTempFile::with_suffix(".toml").unwrap();
    fs::write(file.path(), "[execution]\nbackoff_ms = 10\n").unwrap();

    std::env::set_var("SCHEDULER_EXECUTION__BACKOFF_MS", "1234");
    let config = AppConfig::load(file.path().to_str());
    std::env::remove_var("SCHEDULER_EXECUTION__BACKOFF_MS");

    assert_eq!(config.unwrap().execution.backoff_ms, 1234);
}

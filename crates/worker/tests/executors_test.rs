use axum::{http::StatusCode, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use task_scheduler_core::{models::JobExecution, traits::TaskExecutor, SchedulerError};
use task_scheduler_worker::{HttpExecutor, ShellExecutor};

fn job_with(payload: Value) -> JobExecution {
    JobExecution::new("develop", "task", 5).with_payload(Some(payload))
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_executor_captures_output() {
    let executor = ShellExecutor::new("echo");
    let result = executor
        .execute(&job_with(json!({ "command": "echo", "args": ["hello", "world"] })))
        .await
        .unwrap();

    assert_eq!(result["exit_code"], 0);
    assert_eq!(result["stdout"], "hello world");
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_executor_honors_working_dir_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ShellExecutor::new("env");
    let result = executor
        .execute(&job_with(json!({
            "command": "sh",
            "args": ["-c", "pwd; echo $GREETING"],
            "working_dir": dir.path().to_string_lossy(),
            "env_vars": { "GREETING": "hi" },
        })))
        .await
        .unwrap();

    let stdout = result["stdout"].as_str().unwrap();
    assert!(stdout.ends_with("hi"));
    let canonical = dir.path().canonicalize().unwrap();
    assert!(stdout.contains(canonical.file_name().unwrap().to_str().unwrap()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_executor_fails_on_non_zero_exit() {
    let executor = ShellExecutor::new("fail");
    let err = executor
        .execute(&job_with(json!({ "command": "sh", "args": ["-c", "echo broken >&2; exit 3"] })))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Some(3)"));
    assert!(message.contains("broken"));
}

#[tokio::test]
async fn test_missing_or_invalid_params_fail() {
    let executor = ShellExecutor::new("shell");
    let err = executor
        .execute(&JobExecution::new("develop", "shell", 5))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::TaskExecution(_)));

    let err = executor
        .execute(&job_with(json!({ "args": ["no command"] })))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("解析Shell任务参数失败"));
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/ok", get(|| async { "pong" }))
        .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_http_executor_returns_status_and_body() {
    let base = spawn_server().await;
    let executor = HttpExecutor::new("ping");

    let result = executor
        .execute(&job_with(json!({ "url": format!("{base}/ok") })))
        .await
        .unwrap();
    assert_eq!(result["status"], 200);
    assert_eq!(result["body"], "pong");

    let result = executor
        .execute(&job_with(json!({
            "url": format!("{base}/echo"),
            "method": "post",
            "body": { "id": 7 },
        })))
        .await
        .unwrap();
    assert_eq!(result["body"], r#"{"id":7}"#);
}

#[tokio::test]
async fn test_http_executor_fails_on_error_status() {
    let base = spawn_server().await;
    let executor = HttpExecutor::new("ping");

    let err = executor
        .execute(&job_with(json!({ "url": format!("{base}/broken") })))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));

    let err = executor
        .execute(&job_with(json!({ "url": format!("{base}/ok"), "method": "TRACE" })))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("TRACE"));
}

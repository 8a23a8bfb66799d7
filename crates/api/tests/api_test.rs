use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use task_scheduler_api::create_app;
use task_scheduler_core::SchedulerError;
use task_scheduler_testing_utils::MockTaskControlService;
use tower::ServiceExt;

fn app() -> (Router, Arc<MockTaskControlService>) {
    let service = Arc::new(MockTaskControlService::new());
    (create_app(service.clone()), service)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_create_forwards_camel_case_request() {
    let (app, service) = app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/create",
            json!({
                "taskType": "cleanup",
                "data": {
                    "cronTypeId": 3,
                    "priorityId": 2,
                    "interval": 5,
                    "specificTaskData": { "command": "true" }
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    let created = service.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].task_type, "cleanup");
    assert_eq!(created[0].data.cron_type_id, 3);
    assert_eq!(created[0].data.interval, Some(5));
    assert_eq!(created[0].data.time, None);
}

#[tokio::test]
async fn test_stop_deactivates_the_task() {
    let (app, service) = app();
    let response = app
        .oneshot(json_request("DELETE", "/stop", json!({ "taskType": "cleanup" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(service.cancelled(), vec![("cleanup".to_string(), false)]);
}

#[tokio::test]
async fn test_error_kinds_map_to_status_codes() {
    let cases: Vec<(Box<dyn Fn(&str) -> SchedulerError + Send + Sync>, StatusCode, &str)> = vec![
        (
            Box::new(|_| SchedulerError::CronTypeNotFound { id: 9 }),
            StatusCode::NOT_FOUND,
            "TASK_SCHEDULER_NOT_FOUND",
        ),
        (
            Box::new(|_| SchedulerError::InvalidSchedule("bad time".to_string())),
            StatusCode::BAD_REQUEST,
            "INVALID_SCHEDULE",
        ),
        (
            Box::new(|code| SchedulerError::TaskCreation {
                code: code.to_string(),
                source: Box::new(SchedulerError::Internal("disk full".to_string())),
            }),
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERROR_TASK_CREATING",
        ),
    ];

    for (factory, status, code) in cases {
        let (app, service) = app();
        service.fail_with(factory);
        let response = app
            .oneshot(json_request(
                "POST",
                "/create",
                json!({ "taskType": "report", "data": { "cronTypeId": 1, "priorityId": 1 } }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), status);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], code);
        assert!(body["error"]["message"]["en"].is_string());
        assert!(body["error"]["message"]["zh"].is_string());
    }
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (app, service) = app();
    let response = app
        .oneshot(json_request("POST", "/create", json!({ "data": {} })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
    assert!(service.created().is_empty());
}

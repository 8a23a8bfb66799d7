//! # Task Scheduler API
//!
//! 把任务控制操作暴露为HTTP接口：
//!
//! - `POST /create` 创建或覆盖任务
//! - `DELETE /stop` 停用任务
//! - `GET /health` 健康检查
//!
//! 错误按分类映射HTTP状态码，响应体携带机器可读的错误码和双语描述。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};
use task_scheduler_core::traits::TaskControlService;

/// 创建完整的API应用
pub fn create_app(task_controller: Arc<dyn TaskControlService>) -> Router {
    let state = AppState { task_controller };

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{
    health::health_check,
    tasks::{create_task, stop_task},
};
use task_scheduler_core::traits::TaskControlService;

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub task_controller: Arc<dyn TaskControlService>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/create", post(create_task))
        .route("/stop", delete(stop_task))
        .with_state(state)
}

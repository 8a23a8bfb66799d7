use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use task_scheduler_core::models::CreateTaskRequest;

use crate::{error::ApiResult, response::ApiResponse, routes::AppState};

/// 停用任务请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTaskRequest {
    pub task_type: String,
}

/// 创建或覆盖任务
pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(request) = payload?;
    let code = request.task_type.clone();
    state.task_controller.create_task(request).await?;
    Ok(ApiResponse::success_empty_with_message(format!("任务 {code} 已创建")))
}

/// 停用任务：取消触发器并把记录标记为未启用
pub async fn stop_task(
    State(state): State<AppState>,
    payload: Result<Json<StopTaskRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(request) = payload?;
    state
        .task_controller
        .cancel_task(&request.task_type, false)
        .await?;
    Ok(ApiResponse::success_empty_with_message(format!(
        "任务 {} 已停用",
        request.task_type
    )))
}

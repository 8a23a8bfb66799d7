use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use task_scheduler_core::{ErrorKind, SchedulerError};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Scheduler(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidSchedule => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Scheduler(err) => {
                let message = err.localized();
                json!({
                    "success": false,
                    "error": {
                        "code": err.code().as_str(),
                        "message": { "en": message.en, "zh": message.zh },
                        "detail": err.to_string(),
                    }
                })
            }
            ApiError::BadRequest(detail) => json!({
                "success": false,
                "error": {
                    "code": "BAD_REQUEST",
                    "message": { "en": "Bad request", "zh": "请求参数错误" },
                    "detail": detail,
                }
            }),
        };

        if status.is_server_error() {
            warn!(http.status = status.as_u16(), "请求处理失败: {self}");
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

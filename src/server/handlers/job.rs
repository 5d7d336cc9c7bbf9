// 任务 API 处理器

use crate::job::Job;
use crate::server::AppState;
use crate::worker::{self, WorkerContext};
use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// API 响应结构
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// 业务响应码
pub mod error_codes {
    /// 输入文本为空
    pub const EMPTY_TEXT: i32 = 1001;
    /// 任务不存在（可能已过期，服务重启也会丢失任务）
    pub const JOB_NOT_FOUND: i32 = 1002;
}

/// 创建任务请求
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// 包含分享链接的原始文本
    pub text: String,
}

/// 创建任务响应
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
}

/// POST /api/v1/jobs
/// 创建转链任务，后台执行，立即返回任务 ID
pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Json<ApiResponse<CreateJobResponse>> {
    if req.text.trim().is_empty() {
        return Json(ApiResponse::error(error_codes::EMPTY_TEXT, "请输入内容"));
    }

    let job_id = state.job_store.create();
    info!("收到转链请求: job_id={}, 文本 {} 字节", job_id, req.text.len());

    let ctx = Arc::new(WorkerContext {
        store: state.job_store.clone(),
        quark: state.config.quark.clone(),
        baidu: state.config.baidu.clone(),
        notify: state.config.notify.clone(),
    });
    tokio::spawn(worker::run_job(ctx, job_id.clone(), req.text));

    Json(ApiResponse::success(CreateJobResponse { job_id }))
}

/// GET /api/v1/jobs/:id
/// 查询任务状态、日志、进度与结果（前端每 2~3 秒轮询一次直到 done）
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<ApiResponse<Job>> {
    match state.job_store.get(&job_id) {
        Some(job) => Json(ApiResponse::success(job)),
        None => Json(ApiResponse::error(
            error_codes::JOB_NOT_FOUND,
            "任务不存在或已过期",
        )),
    }
}

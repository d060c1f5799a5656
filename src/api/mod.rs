use actix_web::{
    error::{InternalError, JsonPayloadError},
    http::StatusCode,
    web, HttpResponse, ResponseError,
};
use log::{error, warn};
use serde::Serialize;
use serde_json::Value;

use crate::vfs::VfsError;

mod files;
mod items;

// JSON 响应结构体
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

impl ResponseError for VfsError {
    fn status_code(&self) -> StatusCode {
        match self {
            VfsError::InvalidInput(_) | VfsError::PathError(_) | VfsError::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            VfsError::NotFound(_) => StatusCode::NOT_FOUND,
            VfsError::AlreadyExists(_) => StatusCode::CONFLICT,
            VfsError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            VfsError::StorageError(_) | VfsError::BlobError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // 内部错误只记录日志，不把细节返回给客户端
        let message = if status.is_server_error() {
            error!("请求处理失败: {}", self);
            "服务器内部错误".to_string()
        } else {
            warn!("请求被拒绝: {}", self);
            self.to_string()
        };
        HttpResponse::build(status).json(ApiResponse::error(message))
    }
}

/// JSON 请求体配置，上传内容为 base64，需要按编码后的大小放宽限制
pub fn json_config(max_upload_bytes: usize) -> web::JsonConfig {
    let limit = max_upload_bytes / 3 * 4 + 64 * 1024;
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let status = match &err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                _ => StatusCode::BAD_REQUEST,
            };
            warn!("请求体解析失败: {}", err);
            let response =
                HttpResponse::build(status).json(ApiResponse::error(format!("请求体无效: {}", err)));
            InternalError::from_response(err, response).into()
        })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        warn!("查询参数解析失败: {}", err);
        let response = HttpResponse::BadRequest()
            .json(ApiResponse::error(format!("查询参数无效: {}", err)));
        InternalError::from_response(err, response).into()
    })
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(ApiResponse::error("Method not allowed"))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok("ok", Value::Null))
}

/// 注册全部路由
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/health")
                    .route(web::get().to(health))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/items/tree")
                    .route(web::get().to(items::tree))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/items/create")
                    .route(web::post().to(items::create))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/items/delete")
                    .route(web::post().to(items::delete))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/items/rename")
                    .route(web::post().to(items::rename))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/files/upload")
                    .route(web::post().to(files::upload))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/files/{id}/stream")
                    .route(web::get().to(files::stream))
                    .default_service(web::to(method_not_allowed)),
            ),
    );
}

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::ApiResponse;
use crate::vfs::VfsError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1))]
    pub data_url: String,
}

pub async fn upload(
    body: web::Json<UploadRequest>,
    data: web::Data<crate::AppState>,
) -> Result<HttpResponse, VfsError> {
    body.validate()?;

    let stored = data
        .vfs_manager
        .upload(&body.file_name, &body.data_url)
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok(
        format!("{} 上传成功", body.file_name),
        json!(stored),
    )))
}

/// If-None-Match 使用弱比较：`*` 或去掉 `W/` 前缀后相同即命中
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|tag| {
        tag == "*" || tag.strip_prefix("W/").unwrap_or(tag) == etag
    })
}

pub async fn stream(
    id: web::Path<String>,
    req: HttpRequest,
    data: web::Data<crate::AppState>,
) -> Result<HttpResponse, VfsError> {
    let content = data.vfs_manager.stream(&id).await?;
    let etag = format!("\"{}\"", content.etag);

    let not_modified = req
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| etag_matches(v, &etag));
    if not_modified {
        return Ok(HttpResponse::NotModified()
            .insert_header((header::ETAG, etag))
            .finish());
    }

    Ok(HttpResponse::Ok()
        .content_type(content.content_type)
        .insert_header((header::ETAG, etag))
        .insert_header((header::CACHE_CONTROL, "private, max-age=0, must-revalidate"))
        .body(content.bytes))
}

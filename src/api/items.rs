use actix_web::{web, HttpResponse};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::ApiResponse;
use crate::vfs::{CreateItem, ItemKind, StoragePointer, VfsError};

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[validate(length(min = 1))]
    pub parent_path: String,
    pub storage_path: Option<String>,
    pub mime_type: Option<String>,
    #[validate(range(min = 0))]
    pub size_bytes: Option<i64>,
    pub public_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteItemRequest {
    #[validate(length(min = 1))]
    pub path: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenameItemRequest {
    #[validate(length(min = 1))]
    pub old_path: String,
    #[validate(length(min = 1, max = 255))]
    pub new_name: String,
}

pub async fn tree(
    query: web::Query<TreeQuery>,
    data: web::Data<crate::AppState>,
) -> Result<HttpResponse, VfsError> {
    let listing = data.vfs_manager.tree(query.path.as_deref()).await?;
    debug!(
        "目录 {} 返回 {} 个节点",
        listing.folder.path,
        listing.items.len()
    );

    Ok(HttpResponse::Ok().json(ApiResponse::ok(
        "目录内容获取成功",
        json!(listing),
    )))
}

pub async fn create(
    body: web::Json<CreateItemRequest>,
    data: web::Data<crate::AppState>,
) -> Result<HttpResponse, VfsError> {
    body.validate()?;
    let body = body.into_inner();

    let req = CreateItem {
        kind: ItemKind::parse(&body.kind)?,
        name: body.name,
        parent_path: body.parent_path,
        storage: StoragePointer {
            storage_path: body.storage_path,
            public_url: body.public_url,
            mime_type: body.mime_type,
            size_bytes: body.size_bytes,
        },
    };
    let item = data.vfs_manager.create(req).await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok(
        format!("{} 创建成功", item.path),
        json!({ "path": item.path, "item": item }),
    )))
}

pub async fn delete(
    body: web::Json<DeleteItemRequest>,
    data: web::Data<crate::AppState>,
) -> Result<HttpResponse, VfsError> {
    body.validate()?;

    let removed = data.vfs_manager.delete(&body.path).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(
        format!("{} 已删除", body.path),
        json!({ "removed": removed }),
    )))
}

pub async fn rename(
    body: web::Json<RenameItemRequest>,
    data: web::Data<crate::AppState>,
) -> Result<HttpResponse, VfsError> {
    body.validate()?;

    let (path, updated) = data
        .vfs_manager
        .rename(&body.old_path, &body.new_name)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(
        format!("已重命名为 {}", path),
        json!({ "path": path, "updated": updated }),
    )))
}

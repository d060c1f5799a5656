use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type ItemId = i64;

pub const ROOT_PATH: &str = "/";

/// 名字的最大字节数
pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Folder,
    File,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Folder => "folder",
            ItemKind::File => "file",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, VfsError> {
        match raw {
            "folder" => Ok(ItemKind::Folder),
            "file" => Ok(ItemKind::File),
            other => Err(VfsError::InvalidInput(format!("无效的类型: {}", other))),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 文件节点指向 blob 的存储指针
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoragePointer {
    pub storage_path: Option<String>,
    pub public_url: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

impl StoragePointer {
    pub fn is_empty(&self) -> bool {
        self.storage_path.is_none()
            && self.public_url.is_none()
            && self.mime_type.is_none()
            && self.size_bytes.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub path: String,
    pub parent_path: String,
    pub children: Vec<String>,
    #[serde(flatten)]
    pub storage: StoragePointer,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}

/// 待插入的节点，路径已规范化
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub kind: ItemKind,
    pub path: String,
    pub parent_path: String,
    pub storage: StoragePointer,
}

impl NewItem {
    pub fn folder(name: &str, path: &str, parent_path: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ItemKind::Folder,
            path: path.to_string(),
            parent_path: parent_path.to_string(),
            storage: StoragePointer::default(),
        }
    }

    pub fn file(name: &str, path: &str, parent_path: &str, storage: StoragePointer) -> Self {
        Self {
            name: name.to_string(),
            kind: ItemKind::File,
            path: path.to_string(),
            parent_path: parent_path.to_string(),
            storage,
        }
    }
}

/// 目录列表中返回的目录头信息
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FolderSummary {
    pub name: String,
    pub path: String,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeListing {
    pub folder: FolderSummary,
    pub items: Vec<Item>,
}

/// 上传 blob 后的结果
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub file_id: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct BlobContent {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub etag: String,
}

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("参数错误: {0}")]
    InvalidInput(String),

    #[error("路径错误: {0}")]
    PathError(String),

    #[error("节点不存在: {0}")]
    NotFound(String),

    #[error("节点已存在: {0}")]
    AlreadyExists(String),

    #[error("无效操作: {0}")]
    InvalidOperation(String),

    #[error("上传内容过大: {size} 字节，上限 {limit} 字节")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("存储错误: {0}")]
    StorageError(String),

    #[error("文件存储错误: {0}")]
    BlobError(String),
}

impl From<sqlx::Error> for VfsError {
    fn from(e: sqlx::Error) -> Self {
        VfsError::StorageError(e.to_string())
    }
}

impl From<std::io::Error> for VfsError {
    fn from(e: std::io::Error) -> Self {
        VfsError::BlobError(e.to_string())
    }
}

impl From<validator::ValidationErrors> for VfsError {
    fn from(e: validator::ValidationErrors) -> Self {
        VfsError::InvalidInput(e.to_string())
    }
}

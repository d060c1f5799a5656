use crate::vfs::model::VfsError;
use async_trait::async_trait;
use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 10;

/// 文件内容存储，blob id 形如 "<uuid>.<ext>"
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 保存内容，返回新的 blob id
    async fn put(&self, content: Vec<u8>, original_name: &str) -> Result<String, VfsError>;

    async fn get(&self, id: &str) -> Result<Vec<u8>, VfsError>;

    /// 删除 blob，不存在时返回 false
    async fn delete(&self, id: &str) -> Result<bool, VfsError>;

    async fn exists(&self, id: &str) -> Result<bool, VfsError>;
}

/// 提取扩展名，只保留短的字母数字扩展名
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// 校验 blob id，防止路径穿越
pub fn validate_blob_id(id: &str) -> Result<(), VfsError> {
    let invalid = || VfsError::NotFound(format!("无效的文件 ID: {}", id));
    let (stem, ext) = id.split_once('.').ok_or_else(invalid)?;
    Uuid::parse_str(stem).map_err(|_| invalid())?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(invalid());
    }
    Ok(())
}

/// 本地磁盘 blob 存储，按 uuid 前两位分片:
///
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-90ab-cdef-123456789012.pdf
/// └── cd/
///     └── cd90ab12-3456-7890-abcd-ef1234567890.bin
/// ```
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// 目录不存在时自动创建
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, VfsError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        let shard = &id[..2.min(id.len())];
        self.base_path.join(shard).join(id)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, content: Vec<u8>, original_name: &str) -> Result<String, VfsError> {
        let id = format!("{}.{}", Uuid::new_v4(), extension_of(original_name));
        let path = self.blob_path(&id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &content).await?;
        debug!("写入 blob {} ({} 字节)", id, content.len());
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, VfsError> {
        validate_blob_id(id)?;
        match tokio::fs::read(self.blob_path(id)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VfsError::NotFound(format!("文件不存在: {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, VfsError> {
        validate_blob_id(id)?;
        match tokio::fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, VfsError> {
        if validate_blob_id(id).is_err() {
            return Ok(false);
        }
        Ok(tokio::fs::try_exists(self.blob_path(id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn extension_falls_back_to_bin() {
        assert_eq!(extension_of("Report.PDF"), "pdf");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "bin");
        assert_eq!(extension_of("weird.p d f"), "bin");
    }

    #[test]
    fn blob_ids_must_be_uuid_with_extension() {
        assert!(validate_blob_id("0b8f6a36-3c4e-4f7b-9d2a-1c5e7f9a0b1d.pdf").is_ok());
        assert!(validate_blob_id("../../etc/passwd").is_err());
        assert!(validate_blob_id("0b8f6a36-3c4e-4f7b-9d2a-1c5e7f9a0b1d").is_err());
        assert!(validate_blob_id("0b8f6a36-3c4e-4f7b-9d2a-1c5e7f9a0b1d.p/f").is_err());
    }

    #[tokio::test]
    async fn put_get_delete_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).unwrap();

        let id = store.put(b"%PDF-1.7".to_vec(), "cv.pdf").await.unwrap();
        assert!(id.ends_with(".pdf"));
        assert!(dir.path().join(&id[..2]).join(&id).exists());
        assert!(store.exists(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap(), b"%PDF-1.7");

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(!store.exists(&id).await.unwrap());
        assert!(matches!(store.get(&id).await, Err(VfsError::NotFound(_))));
    }

    #[tokio::test]
    async fn malformed_ids_never_exist() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).unwrap();
        assert!(!store.exists("../secret").await.unwrap());
    }
}

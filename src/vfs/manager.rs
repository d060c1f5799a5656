use crate::vfs::{
    blob::{validate_blob_id, BlobStore},
    model::{
        BlobContent, FolderSummary, Item, ItemKind, NewItem, StoragePointer, StoredBlob,
        TreeListing, VfsError, ROOT_PATH,
    },
    path_normalizer::PathNormalizer,
    storage::ItemStore,
    upload::decode_data_url,
};
use futures::future::join_all;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// 未指定路径时列出的目录
    pub default_folder: String,
    /// 初始目录结构中的用户名
    pub seed_user: String,
    /// 列目录时是否过滤掉 blob 已丢失的文件
    pub verify_blobs: bool,
    pub max_upload_bytes: usize,
}

/// 创建节点的参数
#[derive(Debug, Clone)]
pub struct CreateItem {
    pub name: String,
    pub kind: ItemKind,
    pub parent_path: String,
    pub storage: StoragePointer,
}

pub struct VfsManager {
    store: Arc<dyn ItemStore>,
    blobs: Arc<dyn BlobStore>,
    options: ManagerOptions,
}

impl VfsManager {
    pub fn new(
        store: impl ItemStore + 'static,
        blobs: impl BlobStore + 'static,
        options: ManagerOptions,
    ) -> Self {
        Self {
            store: Arc::new(store),
            blobs: Arc::new(blobs),
            options,
        }
    }

    /// 存储为空时写入初始目录结构
    pub async fn seed_if_empty(&self) -> Result<bool, VfsError> {
        if self.store.count().await? > 0 {
            return Ok(false);
        }

        info!("节点表为空，写入初始目录结构");
        let home = PathNormalizer::join("/home", &self.options.seed_user);
        let documents = PathNormalizer::join(&home, "Documents");
        let projects = PathNormalizer::join(&documents, "Projects");

        let layout = vec![
            NewItem::folder(ROOT_PATH, ROOT_PATH, ROOT_PATH),
            NewItem::folder("home", "/home", ROOT_PATH),
            NewItem::folder(&self.options.seed_user, &home, "/home"),
            NewItem::folder("Documents", &documents, &home),
            NewItem::file(
                "README.txt",
                &PathNormalizer::join(&documents, "README.txt"),
                &documents,
                StoragePointer::default(),
            ),
            NewItem::folder("Projects", &projects, &documents),
            NewItem::file(
                "portfolio-notes.txt",
                &PathNormalizer::join(&projects, "portfolio-notes.txt"),
                &projects,
                StoragePointer::default(),
            ),
        ];

        for item in layout {
            match self.store.insert(item).await {
                Ok(node) => debug!("初始化节点: {}", node.path),
                // 并发请求可能已经写入
                Err(VfsError::AlreadyExists(path)) => debug!("节点已存在，跳过: {}", path),
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// 列出目录内容
    pub async fn tree(&self, raw_path: Option<&str>) -> Result<TreeListing, VfsError> {
        self.seed_if_empty().await?;

        let raw_path = raw_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(self.options.default_folder.as_str());
        let path = PathNormalizer::normalize(raw_path, ROOT_PATH)?;
        info!("列出目录内容: {}", path);

        let folder = self
            .store
            .get(&path)
            .await?
            .filter(Item::is_folder)
            .ok_or_else(|| VfsError::NotFound(format!("目录不存在: {}", path)))?;

        let children = self.store.list_children(&path).await?;
        debug!("目录 {} 共有 {} 个子节点", path, children.len());

        let items = if self.options.verify_blobs {
            let checks = children.into_iter().map(|item| self.keep_if_present(item));
            join_all(checks).await.into_iter().flatten().collect()
        } else {
            children
        };

        Ok(TreeListing {
            folder: FolderSummary {
                name: folder.name,
                path: folder.path,
                children: folder.children,
            },
            items,
        })
    }

    /// 文件的 blob 已不存在时返回 None
    async fn keep_if_present(&self, item: Item) -> Option<Item> {
        if item.kind != ItemKind::File {
            return Some(item);
        }
        let blob_id = match item.storage.storage_path.clone() {
            Some(id) => id,
            None => return Some(item),
        };
        match self.blobs.exists(&blob_id).await {
            Ok(true) => Some(item),
            Ok(false) => {
                debug!("文件 {} 的 blob {} 已丢失，不再列出", item.path, blob_id);
                None
            }
            Err(e) => {
                warn!("检查 blob {} 失败: {}", blob_id, e);
                None
            }
        }
    }

    /// 创建节点
    pub async fn create(&self, req: CreateItem) -> Result<Item, VfsError> {
        info!("创建{}: {} (父目录 {})", req.kind, req.name, req.parent_path);

        PathNormalizer::validate_name(&req.name)?;
        let parent_path = PathNormalizer::normalize(&req.parent_path, ROOT_PATH)?;
        let path = PathNormalizer::join(&parent_path, &req.name);
        debug!("规范化后的路径: {}", path);

        self.store
            .get(&parent_path)
            .await?
            .filter(Item::is_folder)
            .ok_or_else(|| VfsError::NotFound(format!("父目录不存在: {}", parent_path)))?;

        if self.store.get(&path).await?.is_some() {
            warn!("节点已存在: {}", path);
            return Err(VfsError::AlreadyExists(path));
        }

        let new_item = match req.kind {
            ItemKind::Folder => {
                if !req.storage.is_empty() {
                    debug!("忽略目录 {} 的存储指针", path);
                }
                NewItem::folder(&req.name, &path, &parent_path)
            }
            ItemKind::File => NewItem::file(&req.name, &path, &parent_path, req.storage),
        };

        let item = self.store.insert(new_item).await?;
        info!("成功创建节点: {}", item.path);
        Ok(item)
    }

    /// 删除节点，目录会连同全部子孙一起删除。返回删除的节点数
    pub async fn delete(&self, raw_path: &str) -> Result<usize, VfsError> {
        info!("删除节点: {}", raw_path);

        let path = PathNormalizer::normalize(raw_path, ROOT_PATH)?;
        if path == ROOT_PATH {
            return Err(VfsError::InvalidOperation("不能删除根目录".to_string()));
        }

        if self.store.get(&path).await?.is_none() {
            return Err(VfsError::NotFound(format!("节点不存在: {}", path)));
        }

        let removed = self.store.delete_subtree(&path).await?;
        info!("成功删除节点 {}，共 {} 个", path, removed.len());

        self.release_blobs(&removed).await;
        Ok(removed.len())
    }

    /// 尽力清理被删文件的 blob，失败只记录日志。仍被其他节点引用的 blob 保留
    async fn release_blobs(&self, removed: &[Item]) {
        let blob_ids: BTreeSet<&str> = removed
            .iter()
            .filter(|item| item.kind == ItemKind::File)
            .filter_map(|item| item.storage.storage_path.as_deref())
            .filter(|id| validate_blob_id(id).is_ok())
            .collect();

        for id in blob_ids {
            match self.store.count_by_storage_path(id).await {
                Ok(0) => {}
                Ok(refs) => {
                    debug!("blob {} 仍被 {} 个节点引用，保留", id, refs);
                    continue;
                }
                Err(e) => {
                    warn!("查询 blob {} 的引用失败，保留: {}", id, e);
                    continue;
                }
            }
            match self.blobs.delete(id).await {
                Ok(true) => debug!("已删除 blob {}", id),
                Ok(false) => debug!("blob {} 不存在", id),
                Err(e) => warn!("删除 blob {} 失败: {}", id, e),
            }
        }
    }

    /// 重命名节点，返回新路径和受影响的节点数
    pub async fn rename(&self, old_path: &str, new_name: &str) -> Result<(String, u64), VfsError> {
        info!("重命名节点: {} -> {}", old_path, new_name);

        PathNormalizer::validate_name(new_name)?;
        let old_path = PathNormalizer::normalize(old_path, ROOT_PATH)?;
        if old_path == ROOT_PATH {
            return Err(VfsError::InvalidOperation("不能重命名根目录".to_string()));
        }

        let item = self
            .store
            .get(&old_path)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("节点不存在: {}", old_path)))?;

        let new_path = PathNormalizer::join(&item.parent_path, new_name);
        if self.store.get(&new_path).await?.is_some() {
            warn!("目标已存在: {}", new_path);
            return Err(VfsError::AlreadyExists(new_path));
        }

        let updated = self
            .store
            .rename_subtree(&old_path, &new_path, new_name)
            .await?;
        info!(
            "成功重命名节点: {} -> {}，共更新 {} 个节点",
            old_path, new_path, updated
        );
        Ok((new_path, updated))
    }

    /// 保存上传的文件内容
    pub async fn upload(&self, file_name: &str, data_url: &str) -> Result<StoredBlob, VfsError> {
        info!("上传文件: {}", file_name);

        PathNormalizer::validate_name(file_name)?;
        let decoded = decode_data_url(data_url, self.options.max_upload_bytes)?;
        let mime_type = decoded.mime_type.unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .to_string()
        });
        let size_bytes = decoded.bytes.len() as i64;

        let file_id = self.blobs.put(decoded.bytes, file_name).await?;
        info!("文件 {} 已保存为 {} ({} 字节)", file_name, file_id, size_bytes);

        Ok(StoredBlob {
            public_url: format!("/api/files/{}/stream", file_id),
            file_id,
            size_bytes,
            mime_type,
        })
    }

    /// 读取文件内容
    pub async fn stream(&self, id: &str) -> Result<BlobContent, VfsError> {
        debug!("读取文件: {}", id);
        validate_blob_id(id)?;

        let bytes = self.blobs.get(id).await?;
        let content_type = mime_guess::from_path(id)
            .first_or_octet_stream()
            .to_string();
        let etag = format!("{:x}", Sha256::digest(&bytes));

        Ok(BlobContent {
            bytes,
            content_type,
            etag,
        })
    }
}

use crate::vfs::model::{Item, NewItem, VfsError};
use async_trait::async_trait;

/// 节点元数据存储。涉及多行的写操作必须在单个事务内完成
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// 节点总数
    async fn count(&self) -> Result<i64, VfsError>;

    /// 按路径获取节点
    async fn get(&self, path: &str) -> Result<Option<Item>, VfsError>;

    /// 列出目录下的直接子节点，目录在前，同类按名称升序
    async fn list_children(&self, parent_path: &str) -> Result<Vec<Item>, VfsError>;

    /// 引用该 blob 的文件数
    async fn count_by_storage_path(&self, storage_path: &str) -> Result<i64, VfsError>;

    /// 插入节点，并把名称加入父目录的 children
    async fn insert(&self, item: NewItem) -> Result<Item, VfsError>;

    /// 删除节点及其全部子孙，并从父目录 children 中移除，返回被删除的节点
    async fn delete_subtree(&self, path: &str) -> Result<Vec<Item>, VfsError>;

    /// 重命名节点，同时改写所有子孙的 path / parent_path，返回受影响的行数
    async fn rename_subtree(
        &self,
        old_path: &str,
        new_path: &str,
        new_name: &str,
    ) -> Result<u64, VfsError>;
}

pub mod postgres_backend;

#[cfg(test)]
pub mod memory;

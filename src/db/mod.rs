use crate::vfs::model::VfsError;
use log::{error, info};
use sqlx::PgPool;

pub struct DbInitializer {
    pool: PgPool,
}

impl DbInitializer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 初始化节点表
    pub async fn init_item_tables(&self) -> Result<(), VfsError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('folder', 'file')),
                path TEXT NOT NULL UNIQUE,
                parent_path TEXT NOT NULL,
                children TEXT[] NOT NULL DEFAULT '{}',
                storage_path TEXT,
                public_url TEXT,
                mime_type TEXT,
                size_bytes BIGINT CHECK (size_bytes IS NULL OR size_bytes >= 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| VfsError::StorageError(format!("创建节点表失败: {}", e)))?;

        // 列目录按 parent_path 查询
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_parent_path ON items(parent_path)")
            .execute(&self.pool)
            .await
            .map_err(|e| VfsError::StorageError(format!("创建索引失败: {}", e)))?;

        // 子树查询使用 path LIKE '<prefix>/%'
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_items_path_prefix ON items(path text_pattern_ops)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| VfsError::StorageError(format!("创建索引失败: {}", e)))?;

        // 删除文件时统计 blob 引用
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_items_storage_path ON items(storage_path) \
             WHERE storage_path IS NOT NULL",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| VfsError::StorageError(format!("创建索引失败: {}", e)))?;

        Ok(())
    }
}

/// 初始化所有数据库表
pub async fn initialize_db(pool: PgPool) -> Result<(), VfsError> {
    info!("开始初始化数据库...");
    let initializer = DbInitializer::new(pool);

    initializer.init_item_tables().await.map_err(|e| {
        error!("节点表初始化失败: {:?}", e);
        e
    })?;

    info!("数据库初始化完成");
    Ok(())
}

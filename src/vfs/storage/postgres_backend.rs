use crate::vfs::{
    model::{Item, ItemKind, NewItem, StoragePointer, VfsError},
    path_normalizer::PathNormalizer,
    storage::ItemStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use sqlx::PgPool;

const ITEM_COLUMNS: &str = "id, name, kind, path, parent_path, children, storage_path, \
     public_url, mime_type, size_bytes, created_at, updated_at";

// 唯一约束冲突
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    name: String,
    kind: String,
    path: String,
    parent_path: String,
    children: Vec<String>,
    storage_path: Option<String>,
    public_url: Option<String>,
    mime_type: Option<String>,
    size_bytes: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = VfsError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Item {
            id: row.id,
            name: row.name,
            kind: ItemKind::parse(&row.kind)?,
            path: row.path,
            parent_path: row.parent_path,
            children: row.children,
            storage: StoragePointer {
                storage_path: row.storage_path,
                public_url: row.public_url,
                mime_type: row.mime_type,
                size_bytes: row.size_bytes,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_items(rows: Vec<ItemRow>) -> Result<Vec<Item>, VfsError> {
    rows.into_iter().map(Item::try_from).collect()
}

/// 子树的 LIKE 模式，转义路径中的通配符，可走 text_pattern_ops 索引
fn subtree_pattern(path: &str) -> String {
    let mut pattern = String::with_capacity(path.len() + 2);
    for ch in path.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    if !pattern.ends_with('/') {
        pattern.push('/');
    }
    pattern.push('%');
    pattern
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == UNIQUE_VIOLATION)
}

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemStore for PostgresBackend {
    async fn count(&self) -> Result<i64, VfsError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VfsError::StorageError(format!("统计节点失败: {}", e)))?;
        Ok(count)
    }

    async fn get(&self, path: &str) -> Result<Option<Item>, VfsError> {
        let sql = format!("SELECT {} FROM items WHERE path = $1", ITEM_COLUMNS);
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VfsError::StorageError(format!("查询节点失败: {}", e)))?;

        row.map(Item::try_from).transpose()
    }

    async fn list_children(&self, parent_path: &str) -> Result<Vec<Item>, VfsError> {
        // 根目录的 parent_path 指向自身，需要排除
        let sql = format!(
            r#"
            SELECT {} FROM items
            WHERE parent_path = $1 AND path <> $1
            ORDER BY CASE kind WHEN 'folder' THEN 0 ELSE 1 END, name COLLATE "C"
            "#,
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(parent_path)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VfsError::StorageError(format!("查询子节点失败: {}", e)))?;

        into_items(rows)
    }

    async fn count_by_storage_path(&self, storage_path: &str) -> Result<i64, VfsError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE storage_path = $1")
                .bind(storage_path)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| VfsError::StorageError(format!("统计 blob 引用失败: {}", e)))?;
        Ok(count)
    }

    async fn insert(&self, item: NewItem) -> Result<Item, VfsError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO items
                (name, kind, path, parent_path, storage_path, public_url, mime_type, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(&item.name)
            .bind(item.kind.as_str())
            .bind(&item.path)
            .bind(&item.parent_path)
            .bind(&item.storage.storage_path)
            .bind(&item.storage.public_url)
            .bind(&item.storage.mime_type)
            .bind(item.storage.size_bytes)
            .fetch_one(&mut tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    VfsError::AlreadyExists(item.path.clone())
                } else {
                    VfsError::StorageError(format!("插入节点失败: {}", e))
                }
            })?;

        if item.path != item.parent_path {
            let linked = sqlx::query(
                r#"
                UPDATE items
                SET children = array_append(children, $1), updated_at = NOW()
                WHERE path = $2 AND kind = 'folder' AND NOT ($1 = ANY(children))
                "#,
            )
            .bind(&item.name)
            .bind(&item.parent_path)
            .execute(&mut tx)
            .await
            .map_err(|e| VfsError::StorageError(format!("更新父目录失败: {}", e)))?;
            debug!(
                "父目录 {} children 更新行数: {}",
                item.parent_path,
                linked.rows_affected()
            );
        }

        tx.commit().await?;
        Item::try_from(row)
    }

    async fn delete_subtree(&self, path: &str) -> Result<Vec<Item>, VfsError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            DELETE FROM items
            WHERE path = $1 OR path LIKE $2
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(path)
            .bind(subtree_pattern(path))
            .fetch_all(&mut tx)
            .await
            .map_err(|e| VfsError::StorageError(format!("删除节点失败: {}", e)))?;

        let removed = into_items(rows)?;
        let target = removed
            .iter()
            .find(|item| item.path == path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;

        sqlx::query(
            r#"
            UPDATE items
            SET children = array_remove(children, $1), updated_at = NOW()
            WHERE path = $2 AND kind = 'folder'
            "#,
        )
        .bind(&target.name)
        .bind(&target.parent_path)
        .execute(&mut tx)
        .await
        .map_err(|e| VfsError::StorageError(format!("更新父目录失败: {}", e)))?;

        tx.commit().await?;
        Ok(removed)
    }

    async fn rename_subtree(
        &self,
        old_path: &str,
        new_path: &str,
        new_name: &str,
    ) -> Result<u64, VfsError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM items WHERE path = $1 FOR UPDATE", ITEM_COLUMNS);
        let target = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(old_path)
            .fetch_optional(&mut tx)
            .await
            .map_err(|e| VfsError::StorageError(format!("查询节点失败: {}", e)))?
            .ok_or_else(|| VfsError::NotFound(old_path.to_string()))?;

        let sql = format!(
            r#"
            SELECT {} FROM items
            WHERE path LIKE $1
            FOR UPDATE
            "#,
            ITEM_COLUMNS
        );
        let descendants = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(subtree_pattern(old_path))
            .fetch_all(&mut tx)
            .await
            .map_err(|e| VfsError::StorageError(format!("查询子孙节点失败: {}", e)))?;

        let rename_err = |e: sqlx::Error| {
            if is_unique_violation(&e) {
                VfsError::AlreadyExists(new_path.to_string())
            } else {
                VfsError::StorageError(format!("重命名节点失败: {}", e))
            }
        };

        sqlx::query("UPDATE items SET name = $1, path = $2, updated_at = NOW() WHERE id = $3")
            .bind(new_name)
            .bind(new_path)
            .bind(target.id)
            .execute(&mut tx)
            .await
            .map_err(rename_err)?;

        for row in &descendants {
            let path = PathNormalizer::rebase(&row.path, old_path, new_path);
            let parent_path = PathNormalizer::rebase(&row.parent_path, old_path, new_path);
            sqlx::query(
                "UPDATE items SET path = $1, parent_path = $2, updated_at = NOW() WHERE id = $3",
            )
            .bind(&path)
            .bind(&parent_path)
            .bind(row.id)
            .execute(&mut tx)
            .await
            .map_err(rename_err)?;
        }

        let relinked = sqlx::query(
            r#"
            UPDATE items
            SET children = array_replace(children, $1, $2), updated_at = NOW()
            WHERE path = $3 AND kind = 'folder'
            "#,
        )
        .bind(&target.name)
        .bind(new_name)
        .bind(&target.parent_path)
        .execute(&mut tx)
        .await
        .map_err(|e| VfsError::StorageError(format!("更新父目录失败: {}", e)))?;
        if relinked.rows_affected() == 0 {
            warn!("父目录 {} 不存在，跳过 children 更新", target.parent_path);
        }

        tx.commit().await?;
        Ok(1 + descendants.len() as u64)
    }
}

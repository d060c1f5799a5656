use crate::vfs::{
    model::{Item, ItemKind, NewItem, VfsError},
    path_normalizer::PathNormalizer,
    storage::ItemStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// 测试用的内存存储，语义与 PostgresBackend 保持一致
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, Item>>,
    next_id: Mutex<i64>,
}

fn in_subtree(path: &str, root: &str) -> bool {
    path == root
        || path
            .strip_prefix(root)
            .map_or(false, |rest| rest.starts_with('/'))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.items.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn count(&self) -> Result<i64, VfsError> {
        Ok(self.items.lock().unwrap().len() as i64)
    }

    async fn get(&self, path: &str) -> Result<Option<Item>, VfsError> {
        Ok(self.items.lock().unwrap().get(path).cloned())
    }

    async fn list_children(&self, parent_path: &str) -> Result<Vec<Item>, VfsError> {
        let items = self.items.lock().unwrap();
        let mut children: Vec<Item> = items
            .values()
            .filter(|item| item.parent_path == parent_path && item.path != parent_path)
            .cloned()
            .collect();
        children.sort_by(|a, b| {
            let rank = |item: &Item| if item.kind == ItemKind::Folder { 0 } else { 1 };
            rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
        });
        Ok(children)
    }

    async fn count_by_storage_path(&self, storage_path: &str) -> Result<i64, VfsError> {
        let items = self.items.lock().unwrap();
        let count = items
            .values()
            .filter(|item| item.storage.storage_path.as_deref() == Some(storage_path))
            .count();
        Ok(count as i64)
    }

    async fn insert(&self, new: NewItem) -> Result<Item, VfsError> {
        let mut items = self.items.lock().unwrap();
        if items.contains_key(&new.path) {
            return Err(VfsError::AlreadyExists(new.path));
        }

        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let now = Utc::now();
        let item = Item {
            id: *next_id,
            name: new.name,
            kind: new.kind,
            path: new.path,
            parent_path: new.parent_path,
            children: Vec::new(),
            storage: new.storage,
            created_at: now,
            updated_at: now,
        };

        if item.path != item.parent_path {
            if let Some(parent) = items.get_mut(&item.parent_path) {
                if parent.is_folder() && !parent.children.contains(&item.name) {
                    parent.children.push(item.name.clone());
                }
            }
        }
        items.insert(item.path.clone(), item.clone());
        Ok(item)
    }

    async fn delete_subtree(&self, path: &str) -> Result<Vec<Item>, VfsError> {
        let mut items = self.items.lock().unwrap();
        let target = items
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;

        let doomed: Vec<String> = items
            .keys()
            .filter(|p| in_subtree(p, path))
            .cloned()
            .collect();
        let removed = doomed
            .iter()
            .filter_map(|p| items.remove(p))
            .collect::<Vec<_>>();

        if let Some(parent) = items.get_mut(&target.parent_path) {
            parent.children.retain(|name| name != &target.name);
        }
        Ok(removed)
    }

    async fn rename_subtree(
        &self,
        old_path: &str,
        new_path: &str,
        new_name: &str,
    ) -> Result<u64, VfsError> {
        let mut items = self.items.lock().unwrap();
        if items.contains_key(new_path) {
            return Err(VfsError::AlreadyExists(new_path.to_string()));
        }
        let target = items
            .get(old_path)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(old_path.to_string()))?;

        let moved: Vec<String> = items
            .keys()
            .filter(|p| in_subtree(p, old_path))
            .cloned()
            .collect();
        for path in &moved {
            if let Some(mut item) = items.remove(path) {
                item.path = PathNormalizer::rebase(&item.path, old_path, new_path);
                if item.path == new_path {
                    item.name = new_name.to_string();
                } else {
                    item.parent_path =
                        PathNormalizer::rebase(&item.parent_path, old_path, new_path);
                }
                item.updated_at = Utc::now();
                items.insert(item.path.clone(), item);
            }
        }

        if let Some(parent) = items.get_mut(&target.parent_path) {
            for name in parent.children.iter_mut() {
                if name == &target.name {
                    *name = new_name.to_string();
                }
            }
        }
        Ok(moved.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(store: &MemoryStore) {
        tokio_test::block_on(async {
            store.insert(NewItem::folder("/", "/", "/")).await.unwrap();
            store.insert(NewItem::folder("docs", "/docs", "/")).await.unwrap();
            store
                .insert(NewItem::folder("a", "/docs/a", "/docs"))
                .await
                .unwrap();
            store
                .insert(NewItem::file("b.txt", "/docs/a/b.txt", "/docs/a", Default::default()))
                .await
                .unwrap();
            store
                .insert(NewItem::folder("docs2", "/docs2", "/"))
                .await
                .unwrap();
        });
    }

    #[test]
    fn rename_leaves_sibling_prefixes_alone() {
        let store = MemoryStore::new();
        seed(&store);

        let moved =
            tokio_test::block_on(store.rename_subtree("/docs", "/papers", "papers")).unwrap();
        assert_eq!(moved, 3);
        assert_eq!(
            store.paths(),
            vec!["/", "/docs2", "/papers", "/papers/a", "/papers/a/b.txt"]
        );

        let root = tokio_test::block_on(store.get("/")).unwrap().unwrap();
        assert_eq!(root.children, vec!["papers", "docs2"]);
    }

    #[test]
    fn children_sort_by_raw_bytes() {
        let store = MemoryStore::new();
        seed(&store);
        tokio_test::block_on(async {
            store.insert(NewItem::folder("apple", "/apple", "/")).await.unwrap();
            store.insert(NewItem::folder("Banana", "/Banana", "/")).await.unwrap();
        });

        let children = tokio_test::block_on(store.list_children("/")).unwrap();
        let names: Vec<&str> = children.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Banana", "apple", "docs", "docs2"]);
    }

    #[test]
    fn delete_unlinks_from_parent() {
        let store = MemoryStore::new();
        seed(&store);

        let removed = tokio_test::block_on(store.delete_subtree("/docs")).unwrap();
        assert_eq!(removed.len(), 3);
        let root = tokio_test::block_on(store.get("/")).unwrap().unwrap();
        assert_eq!(root.children, vec!["docs2"]);
    }
}

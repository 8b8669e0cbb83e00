use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::external::DocumentStore;
use crate::external::store::path_segments;

/// 进程内文档树，本地开发与测试使用；条件写入在写锁内完成
#[derive(Default)]
pub struct MemoryStore {
    root: RwLock<Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_document(Value::Object(Map::new()))
    }

    pub fn with_document(document: Value) -> Self {
        Self {
            root: RwLock::new(document),
        }
    }

    pub fn from_seed_file(path: &str) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("无法读取种子数据 {path}: {e}")))?;
        let document: Value = serde_json::from_str(&raw)
            .map_err(|e| AppError::ConfigError(format!("种子数据不是合法 JSON {path}: {e}")))?;
        log::info!("Memory store seeded from {path}");
        Ok(Self::with_document(document))
    }

    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }
}

fn lookup<'a>(node: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments.iter().try_fold(node, |node, seg| match node {
        Value::Object(map) => map.get(*seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn assign(node: &mut Value, segments: &[&str], new: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = new;
        return;
    };

    if let Value::Array(items) = node
        && let Ok(i) = head.parse::<usize>()
    {
        if i >= items.len() {
            items.resize(i + 1, Value::Null);
        }
        assign(&mut items[i], rest, new);
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        assign(child, rest, new);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> AppResult<Option<Value>> {
        let root = self.root.read().await;
        Ok(lookup(&root, &path_segments(path))
            .filter(|v| !v.is_null())
            .cloned())
    }

    async fn put(&self, path: &str, value: &Value) -> AppResult<()> {
        let mut root = self.root.write().await;
        assign(&mut root, &path_segments(path), value.clone());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        path: &str,
        expected: Option<&Value>,
        new: &Value,
    ) -> AppResult<bool> {
        let segments = path_segments(path);
        let mut root = self.root.write().await;
        let current = lookup(&root, &segments).filter(|v| !v.is_null());
        if current != expected {
            return Ok(false);
        }
        assign(&mut root, &segments, new.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_navigates_arrays_and_objects() {
        let store = MemoryStore::with_document(json!({
            "Prizes": [{ "PrizeId": "A", "Remaining": 2 }],
            "GameStats": { "2025-01-01": { "TotalSpins": 9 } }
        }));
        assert_eq!(store.get("Prizes/0/Remaining").await.unwrap(), Some(json!(2)));
        assert_eq!(
            store.get("/GameStats/2025-01-01/TotalSpins").await.unwrap(),
            Some(json!(9))
        );
        assert_eq!(store.get("Prizes/3/Remaining").await.unwrap(), None);
        assert_eq!(store.get("Settings").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_creates_intermediate_nodes() {
        let store = MemoryStore::new();
        store
            .put("GameStats/2025-01-01/Prizes/A", &json!(1))
            .await
            .unwrap();
        assert_eq!(
            store.snapshot().await,
            json!({ "GameStats": { "2025-01-01": { "Prizes": { "A": 1 } } } })
        );
    }

    #[tokio::test]
    async fn test_put_overwrites_array_element_field_only() {
        let store = MemoryStore::with_document(json!({
            "Prizes": [{ "PrizeId": "A", "Remaining": 2, "Quantity": 5 }]
        }));
        store.put("Prizes/0/Remaining", &json!(1)).await.unwrap();
        assert_eq!(
            store.get("Prizes/0").await.unwrap(),
            Some(json!({ "PrizeId": "A", "Remaining": 1, "Quantity": 5 }))
        );
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryStore::with_document(json!({ "Prizes": [{ "Remaining": 2 }] }));
        assert!(
            !store
                .compare_and_swap("Prizes/0/Remaining", Some(&json!(3)), &json!(2))
                .await
                .unwrap()
        );
        assert!(
            store
                .compare_and_swap("Prizes/0/Remaining", Some(&json!(2)), &json!(1))
                .await
                .unwrap()
        );
        assert_eq!(store.get("Prizes/0/Remaining").await.unwrap(), Some(json!(1)));

        // 不存在的计数器：期望值为 None
        assert!(
            store
                .compare_and_swap("GameStats/d/TotalSpins", None, &json!(1))
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_swap("GameStats/d/TotalSpins", None, &json!(1))
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_seed_file_missing() {
        assert!(matches!(
            MemoryStore::from_seed_file("/definitely/not/here.json"),
            Err(AppError::ConfigError(_))
        ));
    }
}

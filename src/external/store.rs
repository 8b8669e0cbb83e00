use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::AppResult;
use crate::external::{FirebaseStore, MemoryStore};

/// 远程文档存储 (Firebase Realtime Database 语义)。
///
/// 路径为斜杠分隔的键，例如 `Prizes/0/Remaining`；JSON `null` 视为不存在。
/// 没有多键事务，唯一的原子原语是单路径的条件写入。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 读取整个路径下的文档
    async fn get(&self, path: &str) -> AppResult<Option<Value>>;

    /// 覆盖写入 (不是合并)
    async fn put(&self, path: &str, value: &Value) -> AppResult<()>;

    /// 仅当当前值等于 `expected` 时写入 `new`；丢失竞争返回 `false`
    async fn compare_and_swap(
        &self,
        path: &str,
        expected: Option<&Value>,
        new: &Value,
    ) -> AppResult<bool>;
}

pub type SharedStore = Arc<dyn DocumentStore>;

pub fn build_store(cfg: &StoreConfig) -> AppResult<SharedStore> {
    match cfg.backend {
        StoreBackend::Firebase => Ok(Arc::new(FirebaseStore::new(cfg)?)),
        StoreBackend::Memory => {
            let store = match &cfg.seed_path {
                Some(path) => MemoryStore::from_seed_file(path)?,
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}

pub(crate) fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

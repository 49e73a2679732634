use super::{
    apply_write, check_precondition, DocPath, DocumentStore, Snapshot, StoreResult, WriteBatch,
    WriteOp,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredDocument {
    data: Value,
    version: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    docs: BTreeMap<DocPath, StoredDocument>,
    clock: u64,
}

/// 进程内文档存储，用于开发环境与测试
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Snapshot>> {
        let state = self.state.read();
        Ok(state.docs.get(path).map(|doc| Snapshot {
            path: path.clone(),
            data: doc.data.clone(),
            version: doc.version,
        }))
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Snapshot>> {
        let state = self.state.read();
        Ok(state
            .docs
            .iter()
            .filter(|(path, _)| path.collection_path() == collection)
            .map(|(path, doc)| Snapshot {
                path: path.clone(),
                data: doc.data.clone(),
                version: doc.version,
            })
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut state = self.state.write();

        // 先校验全部前置条件，再应用
        for write in batch.writes() {
            let current = state.docs.get(&write.path).map(|doc| doc.version);
            check_precondition(&write.path, current, write.precondition)?;
        }

        let mut staged: HashMap<DocPath, Option<Value>> = HashMap::new();
        for write in batch.writes() {
            if matches!(write.op, WriteOp::Verify) {
                continue;
            }
            let current = match staged.get(&write.path) {
                Some(pending) => pending.clone(),
                None => state.docs.get(&write.path).map(|doc| doc.data.clone()),
            };
            let next = apply_write(&write.path, current.as_ref(), &write.op)?;
            staged.insert(write.path.clone(), next);
        }

        if staged.is_empty() {
            return Ok(());
        }

        state.clock += 1;
        let version = state.clock;
        for (path, data) in staged {
            match data {
                Some(data) => {
                    state.docs.insert(path, StoredDocument { data, version });
                }
                None => {
                    state.docs.remove(&path);
                }
            }
        }
        debug!("Committed batch of {} writes at version {}", batch.len(), version);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{FieldTransform, Precondition, StoreError, Write};
    use serde_json::json;

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = DocPath::user("a").unwrap();
        let b = DocPath::user("b").unwrap();
        store
            .commit(WriteBatch::new().set(a.clone(), json!({"id": "a"})))
            .await
            .unwrap();

        // 第二个写操作更新不存在的文档，整个批次都不应生效
        let batch = WriteBatch::new()
            .update(a.clone(), vec![FieldTransform::set("bio", json!("hello"))])
            .update(b.clone(), vec![FieldTransform::set("bio", json!("ghost"))]);
        let err = store.commit(batch).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("users/b".to_string()));

        let snapshot = store.get(&a).await.unwrap().unwrap();
        assert!(snapshot.field("bio").is_none());
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let a = DocPath::user("a").unwrap();
        store
            .commit(WriteBatch::new().set(a.clone(), json!({"id": "a"})))
            .await
            .unwrap();
        let first = store.get(&a).await.unwrap().unwrap();

        store
            .commit(WriteBatch::new().update(a.clone(), vec![FieldTransform::set("bio", json!("x"))]))
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch.push(Write {
            path: a.clone(),
            op: WriteOp::Update(vec![FieldTransform::set("bio", json!("y"))]),
            precondition: Precondition::Version(first.version),
        });
        assert!(matches!(store.commit(batch).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.get(&a).await.unwrap().unwrap().data["bio"], json!("x"));
    }

    #[tokio::test]
    async fn list_only_returns_direct_children() {
        let store = MemoryStore::new();
        let owner = DocPath::user("owner").unwrap();
        let batch = WriteBatch::new()
            .set(owner.clone(), json!({"id": "owner"}))
            .set(DocPath::follow_request("owner", "r1").unwrap(), json!({"requesterId": "r1"}))
            .set(DocPath::follow_request("owner", "r2").unwrap(), json!({"requesterId": "r2"}));
        store.commit(batch).await.unwrap();

        assert_eq!(store.list("users").await.unwrap().len(), 1);
        assert_eq!(store.list("users/owner/followRequests").await.unwrap().len(), 2);
        assert_eq!(store.len(), 3);
    }
}

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::store::{
    DocPath, DocumentStore, FieldTransform, MemoryStore, Precondition, Snapshot, SurrealStore,
    Write, WriteBatch, WriteOp,
};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    pub store: Arc<dyn DocumentStore>,
    pub config: Config,
}

impl Database {
    /// 根据配置创建数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = if config.uses_memory_backend() {
            info!("Using in-memory document store");
            Arc::new(MemoryStore::new())
        } else {
            info!("Initializing database connection to {}", config.database_url);
            Arc::new(SurrealStore::connect(config).await?)
        };

        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.store.ping().await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    pub async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>> {
        Ok(self.store.get(path).await?)
    }

    /// 读取并反序列化单个文档
    pub async fn get_as<T: DeserializeOwned>(&self, path: &DocPath) -> Result<Option<T>> {
        match self.store.get(path).await? {
            Some(snapshot) => Ok(Some(snapshot.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<Snapshot>> {
        Ok(self.store.list(collection).await?)
    }

    pub async fn commit(&self, batch: WriteBatch) -> Result<()> {
        Ok(self.store.commit(batch).await?)
    }

    /// 运行乐观事务
    ///
    /// 闭包通过 [`Transaction`] 读取文档并登记写操作；提交时所有读过的
    /// 文档都以读取时的版本作为前置条件。版本冲突时整体重试，
    /// 最多 `transaction_max_attempts` 次。
    pub async fn run_transaction<T, F, Fut>(&self, label: &str, operation: F) -> Result<T>
    where
        F: Fn(Transaction) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.transaction_max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let tx = Transaction::new(self.store.clone());
            let value = operation(tx.clone()).await?;
            let batch = tx.into_batch();

            if batch.is_empty() {
                return Ok(value);
            }

            match self.store.commit(batch).await {
                Ok(()) => {
                    debug!("Transaction {} committed on attempt {}", label, attempt);
                    return Ok(value);
                }
                Err(e) => {
                    let err = AppError::from(e);
                    if !err.is_store_conflict() {
                        return Err(err);
                    }
                    warn!("Transaction {} conflicted (attempt {}/{})", label, attempt, max_attempts);
                }
            }
        }

        Err(AppError::Conflict(format!(
            "Transaction {} aborted after {} attempts",
            label, max_attempts
        )))
    }
}

#[derive(Default)]
struct TransactionState {
    reads: BTreeMap<DocPath, Option<u64>>,
    writes: Vec<(DocPath, WriteOp)>,
}

/// 事务句柄：读操作记录版本，写操作延迟到提交
#[derive(Clone)]
pub struct Transaction {
    store: Arc<dyn DocumentStore>,
    state: Arc<Mutex<TransactionState>>,
}

impl Transaction {
    fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(TransactionState::default())),
        }
    }

    pub async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>> {
        let snapshot = self.store.get(path).await?;
        self.state
            .lock()
            .reads
            .entry(path.clone())
            .or_insert(snapshot.as_ref().map(|s| s.version));
        Ok(snapshot)
    }

    pub async fn get_as<T: DeserializeOwned>(&self, path: &DocPath) -> Result<Option<T>> {
        match self.get(path).await? {
            Some(snapshot) => Ok(Some(snapshot.decode()?)),
            None => Ok(None),
        }
    }

    pub fn set(&self, path: &DocPath, value: Value) {
        self.state.lock().writes.push((path.clone(), WriteOp::Set(value)));
    }

    pub fn set_document<T: Serialize>(&self, path: &DocPath, document: &T) -> Result<()> {
        let value = serde_json::to_value(document)?;
        self.set(path, value);
        Ok(())
    }

    pub fn update(&self, path: &DocPath, transforms: Vec<FieldTransform>) {
        if transforms.is_empty() {
            return;
        }
        self.state.lock().writes.push((path.clone(), WriteOp::Update(transforms)));
    }

    pub fn delete(&self, path: &DocPath) {
        self.state.lock().writes.push((path.clone(), WriteOp::Delete));
    }

    fn into_batch(self) -> WriteBatch {
        let state = std::mem::take(&mut *self.state.lock());
        let mut batch = WriteBatch::new();
        if state.writes.is_empty() {
            return batch;
        }

        let precondition_for = |path: &DocPath| match state.reads.get(path) {
            Some(Some(version)) => Precondition::Version(*version),
            Some(None) => Precondition::Missing,
            None => Precondition::None,
        };

        for (path, op) in &state.writes {
            batch.push(Write {
                path: path.clone(),
                op: op.clone(),
                precondition: precondition_for(path),
            });
        }

        // 只读未写的文档也要校验版本
        for path in state.reads.keys() {
            if !state.writes.iter().any(|(written, _)| written == path) {
                batch.push(Write {
                    path: path.clone(),
                    op: WriteOp::Verify,
                    precondition: precondition_for(path),
                });
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{MockDocumentStore, StoreError};
    use serde_json::json;

    fn test_db(store: Arc<dyn DocumentStore>) -> Database {
        Database::with_store(store, &Config::default())
    }

    #[tokio::test]
    async fn test_memory_database_connection() {
        let config = Config::default();
        let db = Database::new(&config).await.unwrap();
        assert!(db.verify_connection().await.is_ok());
    }

    #[tokio::test]
    async fn transaction_reads_are_pinned() {
        let db = test_db(Arc::new(MemoryStore::new()));
        let path = DocPath::user("a").unwrap();
        db.commit(WriteBatch::new().set(path.clone(), json!({"id": "a", "bio": ""})))
            .await
            .unwrap();

        let result = db
            .run_transaction("bio", |tx| {
                let path = path.clone();
                let db = db.clone();
                async move {
                    tx.get(&path).await?;
                    // 模拟并发写入
                    db.commit(WriteBatch::new().update(
                        path.clone(),
                        vec![FieldTransform::set("bio", json!("other"))],
                    ))
                    .await?;
                    tx.update(&path, vec![FieldTransform::set("bio", json!("mine"))]);
                    Ok(())
                }
            })
            .await;

        // 每次尝试都被并发写入打断，最终放弃
        assert!(matches!(result, Err(AppError::Conflict(_))));
        let snapshot = db.get(&path).await.unwrap().unwrap();
        assert_eq!(snapshot.data["bio"], json!("other"));
    }

    #[tokio::test]
    async fn transaction_retries_until_attempts_exhausted() {
        let mut store = MockDocumentStore::new();
        store.expect_get().returning(|path| {
            Ok(Some(Snapshot {
                path: path.clone(),
                data: json!({"id": path.id()}),
                version: 1,
            }))
        });
        store
            .expect_commit()
            .times(5)
            .returning(|_| Err(StoreError::Conflict("users/a".to_string())));

        let db = test_db(Arc::new(store));
        let path = DocPath::user("a").unwrap();
        let result = db
            .run_transaction("noop", |tx| {
                let path = path.clone();
                async move {
                    tx.get(&path).await?;
                    tx.update(&path, vec![FieldTransform::set("bio", json!("x"))]);
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn read_only_transaction_does_not_commit() {
        let mut store = MockDocumentStore::new();
        store.expect_get().returning(|_| Ok(None));
        store.expect_commit().never();

        let db = test_db(Arc::new(store));
        let path = DocPath::user("a").unwrap();
        let found = db
            .run_transaction("read", |tx| {
                let path = path.clone();
                async move { Ok(tx.get(&path).await?.is_some()) }
            })
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn backend_errors_are_not_retried() {
        let mut store = MockDocumentStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_commit()
            .times(1)
            .returning(|_| Err(StoreError::Backend("connection reset".to_string())));

        let db = test_db(Arc::new(store));
        let path = DocPath::user("a").unwrap();
        let result = db
            .run_transaction("create", |tx| {
                let path = path.clone();
                async move {
                    tx.get(&path).await?;
                    tx.set(&path, json!({"id": "a"}));
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::Store(StoreError::Backend(_)))));
    }
}

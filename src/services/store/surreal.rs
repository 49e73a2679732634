use super::{
    apply_write, check_precondition, DocPath, DocumentStore, Snapshot, StoreError, StoreResult,
    WriteBatch, WriteOp,
};
use crate::config::Config;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use surrealdb::engine::remote::http::{Client, Http};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{debug, info, warn};

const TABLE: &str = "document";
const CONFLICT_MARKER: &str = "version conflict";
/// SurrealDB 自身的事务冲突，同样可以重试
const RETRYABLE_MARKER: &str = "can be retried";

/// SurrealDB 中的一行：文档内容以 JSON 字符串保存，避免类型转换问题
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Row {
    path: String,
    collection: String,
    body: String,
    version: u64,
}

impl Row {
    fn into_snapshot(self) -> StoreResult<Snapshot> {
        let path = DocPath::parse(&self.path)?;
        let data = serde_json::from_str(&self.body).map_err(|e| StoreError::Decode {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Snapshot { path, data, version: self.version })
    }
}

/// 基于 SurrealDB HTTP 协议的文档存储
///
/// 批量提交采用比较并交换：先读取涉及的文档，在本地应用变更，
/// 再在一个数据库事务中校验版本号并写回。版本号不一致时事务抛错，
/// 整个批次回滚并返回 [`StoreError::Conflict`]。
#[derive(Clone)]
pub struct SurrealStore {
    client: Surreal<Client>,
}

fn backend(err: surrealdb::Error) -> StoreError {
    let message = err.to_string();
    if message.contains(CONFLICT_MARKER) || message.contains(RETRYABLE_MARKER) {
        StoreError::Conflict(message)
    } else {
        StoreError::Backend(message)
    }
}

/// 新版本号：至少比旧版本大 1，且不小于当前微秒时间戳。
/// 文档删除后重建也不会复用旧版本号。
fn next_version(expected: Option<u64>, now_micros: u64) -> u64 {
    expected.unwrap_or(0).saturating_add(1).max(now_micros)
}

fn now_micros() -> u64 {
    u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0)
}

impl SurrealStore {
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        info!("Connecting to SurrealDB at {}", config.database_url);

        let client = Surreal::new::<Http>(config.database_url.as_str())
            .await
            .map_err(backend)?;
        client
            .signin(Root {
                username: &config.database_username,
                password: &config.database_password,
            })
            .await
            .map_err(backend)?;
        client
            .use_ns(&config.database_namespace)
            .use_db(&config.database_name)
            .await
            .map_err(backend)?;

        client
            .query(format!(
                "DEFINE INDEX document_collection ON TABLE {} COLUMNS collection",
                TABLE
            ))
            .await
            .map_err(backend)?;

        Ok(Self { client })
    }

    async fn fetch_many(&self, paths: &[String]) -> StoreResult<BTreeMap<String, Row>> {
        let mut response = self
            .client
            .query("SELECT path, collection, body, version FROM type::table($tb) WHERE path IN $paths")
            .bind(("tb", TABLE))
            .bind(("paths", paths.to_vec()))
            .await
            .map_err(backend)?;
        let rows: Vec<Row> = response.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(|row| (row.path.clone(), row)).collect())
    }
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Snapshot>> {
        let mut response = self
            .client
            .query("SELECT path, collection, body, version FROM type::thing($tb, $id)")
            .bind(("tb", TABLE))
            .bind(("id", path.as_str()))
            .await
            .map_err(backend)?;
        let rows: Vec<Row> = response.take(0).map_err(backend)?;
        rows.into_iter().next().map(Row::into_snapshot).transpose()
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Snapshot>> {
        let mut response = self
            .client
            .query("SELECT path, collection, body, version FROM type::table($tb) WHERE collection = $collection")
            .bind(("tb", TABLE))
            .bind(("collection", collection))
            .await
            .map_err(backend)?;
        let rows: Vec<Row> = response.take(0).map_err(backend)?;
        rows.into_iter().map(Row::into_snapshot).collect()
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut paths: Vec<String> = batch.writes().iter().map(|w| w.path.to_string()).collect();
        paths.sort();
        paths.dedup();
        let existing = self.fetch_many(&paths).await?;

        for write in batch.writes() {
            let current = existing.get(write.path.as_str()).map(|row| row.version);
            check_precondition(&write.path, current, write.precondition)?;
        }

        // 在本地计算每个文档的最终内容
        let mut staged: BTreeMap<String, Option<Value>> = BTreeMap::new();
        for write in batch.writes() {
            if matches!(write.op, WriteOp::Verify) {
                continue;
            }
            let key = write.path.to_string();
            let current = match staged.get(&key) {
                Some(pending) => pending.clone(),
                None => match existing.get(&key) {
                    Some(row) => Some(row.clone().into_snapshot()?.data),
                    None => None,
                },
            };
            let next = apply_write(&write.path, current.as_ref(), &write.op)?;
            staged.insert(key, next);
        }

        let now = now_micros();
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        let mut query_params: Vec<(String, serde_json::Value)> = vec![("tb".to_string(), Value::from(TABLE))];

        for (idx, path) in paths.iter().enumerate() {
            let expected = existing.get(path).map(|row| row.version);
            sql.push_str(&format!(
                "IF ((SELECT VALUE version FROM type::thing($tb, $p{idx}))[0] ?? 0) != $v{idx} {{ THROW \"{} on \" + $p{idx} }};\n",
                CONFLICT_MARKER
            ));
            query_params.push((format!("p{}", idx), Value::from(path.clone())));
            query_params.push((format!("v{}", idx), Value::from(expected.unwrap_or(0))));

            let Some(next) = staged.get(path) else {
                continue;
            };
            match next {
                Some(data) => {
                    let row = Row {
                        path: path.clone(),
                        collection: DocPath::parse(path)?.collection_path().to_string(),
                        body: data.to_string(),
                        version: next_version(expected, now),
                    };
                    sql.push_str(&format!("UPDATE type::thing($tb, $p{idx}) CONTENT $r{idx};\n"));
                    let row = serde_json::to_value(row).map_err(|e| StoreError::Backend(e.to_string()))?;
                    query_params.push((format!("r{}", idx), row));
                }
                None => {
                    sql.push_str(&format!("DELETE type::thing($tb, $p{idx});\n"));
                }
            }
        }
        sql.push_str("COMMIT TRANSACTION;");

        debug!("Committing batch of {} writes over {} documents", batch.len(), paths.len());
        let mut query = self.client.query(sql);
        for param in query_params {
            query = query.bind(param);
        }
        let response = query.await.map_err(backend)?;
        response.check().map_err(|e| {
            let err = backend(e);
            if matches!(err, StoreError::Conflict(_)) {
                warn!("Batch commit lost a version race");
            }
            err
        })?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.client
            .query("INFO FOR DB")
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;
        Ok(())
    }
}

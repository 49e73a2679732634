//! 文档存储抽象
//!
//! 按 `collection/document[/collection/document...]` 路径寻址的文档数据库。
//! 所有写操作通过 [`WriteBatch`] 原子提交，每个写操作可以携带前置条件
//! （文档版本），服务层据此实现乐观事务。

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub mod memory;
pub mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

pub const USERS: &str = "users";
pub const FOLLOW_REQUESTS: &str = "followRequests";
pub const VIDEOS: &str = "videos";
pub const POSTS: &str = "posts";
pub const COLLECTIONS: &str = "collections";

/// 旧版数据路径，仅由迁移逻辑读取
pub mod legacy {
    pub const FOLLOWING_MARKERS: &str = "following";
    pub const FOLLOWER_MARKERS: &str = "followers";
    pub const FOLLOWERS_LOG: &str = "followers";
    pub const FOLLOW_REQUESTS_FIELD: &str = "followRequests";
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("precondition failed for {0}")]
    Conflict(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid field operation on {path}: {reason}")]
    InvalidOperation { path: String, reason: String },

    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 文档路径，段数为偶数：集合/文档/子集合/文档...
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath(String);

impl DocPath {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments: Vec<&str> = raw.split('/').collect();
        if segments.len() < 2 || segments.len() % 2 != 0 {
            return Err(StoreError::InvalidPath(raw.to_string()));
        }
        for segment in &segments {
            validate_segment(segment).map_err(|_| StoreError::InvalidPath(raw.to_string()))?;
        }
        Ok(Self(raw.to_string()))
    }

    pub fn new(collection: &str, id: &str) -> StoreResult<Self> {
        validate_segment(collection)?;
        validate_segment(id)?;
        Ok(Self(format!("{}/{}", collection, id)))
    }

    pub fn child(&self, collection: &str, id: &str) -> StoreResult<Self> {
        validate_segment(collection)?;
        validate_segment(id)?;
        Ok(Self(format!("{}/{}/{}", self.0, collection, id)))
    }

    pub fn user(uid: &str) -> StoreResult<Self> {
        Self::new(USERS, uid)
    }

    /// `users/{owner}/followRequests/{requester}`
    pub fn follow_request(owner_id: &str, requester_id: &str) -> StoreResult<Self> {
        Self::user(owner_id)?.child(FOLLOW_REQUESTS, requester_id)
    }

    pub fn video(id: &str) -> StoreResult<Self> {
        Self::new(VIDEOS, id)
    }

    pub fn post(id: &str) -> StoreResult<Self> {
        Self::new(POSTS, id)
    }

    pub fn collection(id: &str) -> StoreResult<Self> {
        Self::new(COLLECTIONS, id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 最后一段，即文档 ID
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// 所属集合路径（去掉最后一段）
    pub fn collection_path(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocPath {
    type Error = StoreError;

    fn try_from(value: String) -> StoreResult<Self> {
        Self::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(path: DocPath) -> Self {
        path.0
    }
}

/// `users/{uid}/followRequests` 之类的集合路径
pub fn subcollection(parent: &DocPath, collection: &str) -> StoreResult<String> {
    validate_segment(collection)?;
    Ok(format!("{}/{}", parent, collection))
}

fn validate_segment(segment: &str) -> StoreResult<()> {
    if segment.is_empty() || segment.contains('/') || segment.trim() != segment {
        return Err(StoreError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

/// 读取到的文档快照
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocPath,
    pub data: Value,
    pub version: u64,
}

impl Snapshot {
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| StoreError::Decode {
            path: self.path.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// 字段级变更
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    /// 幂等追加：已存在的元素不会重复加入
    ArrayUnion(Vec<Value>),
    /// 幂等删除：移除所有相等的元素
    ArrayRemove(Vec<Value>),
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldTransform {
    /// 以点分隔的字段路径，例如 `stats.followers`
    pub field: String,
    pub op: FieldOp,
}

impl FieldTransform {
    pub fn set(field: &str, value: Value) -> Self {
        Self { field: field.to_string(), op: FieldOp::Set(value) }
    }

    pub fn array_union(field: &str, values: Vec<Value>) -> Self {
        Self { field: field.to_string(), op: FieldOp::ArrayUnion(values) }
    }

    pub fn array_remove(field: &str, values: Vec<Value>) -> Self {
        Self { field: field.to_string(), op: FieldOp::ArrayRemove(values) }
    }

    pub fn delete(field: &str) -> Self {
        Self { field: field.to_string(), op: FieldOp::Delete }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// 整体写入（不存在则创建）
    Set(Value),
    /// 部分更新，文档必须存在
    Update(Vec<FieldTransform>),
    Delete,
    /// 仅校验前置条件，不修改文档
    Verify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    Missing,
    Version(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub path: DocPath,
    pub op: WriteOp,
    pub precondition: Precondition,
}

/// 原子提交的一组写操作
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn set(mut self, path: DocPath, value: Value) -> Self {
        self.push(Write { path, op: WriteOp::Set(value), precondition: Precondition::None });
        self
    }

    pub fn update(mut self, path: DocPath, transforms: Vec<FieldTransform>) -> Self {
        self.push(Write { path, op: WriteOp::Update(transforms), precondition: Precondition::None });
        self
    }

    pub fn delete(mut self, path: DocPath) -> Self {
        self.push(Write { path, op: WriteOp::Delete, precondition: Precondition::None });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Snapshot>>;

    /// 列出某个集合（不含子集合）下的全部文档
    async fn list(&self, collection: &str) -> StoreResult<Vec<Snapshot>>;

    /// 原子提交：要么全部生效，要么全部不生效
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}

/// 检查前置条件，`current` 为批次开始前的文档版本
pub(crate) fn check_precondition(
    path: &DocPath,
    current: Option<u64>,
    precondition: Precondition,
) -> StoreResult<()> {
    let satisfied = match (precondition, current) {
        (Precondition::None, _) => true,
        (Precondition::Missing, found) => found.is_none(),
        (Precondition::Version(expected), Some(found)) => expected == found,
        (Precondition::Version(_), None) => false,
    };

    if satisfied {
        Ok(())
    } else {
        Err(StoreError::Conflict(path.to_string()))
    }
}

/// 在内存中对文档应用一次写操作，返回新内容（`None` 表示删除）
pub(crate) fn apply_write(
    path: &DocPath,
    current: Option<&Value>,
    op: &WriteOp,
) -> StoreResult<Option<Value>> {
    match op {
        WriteOp::Set(value) => {
            if !value.is_object() {
                return Err(StoreError::InvalidOperation {
                    path: path.to_string(),
                    reason: "document body must be an object".to_string(),
                });
            }
            Ok(Some(value.clone()))
        }
        WriteOp::Update(transforms) => {
            let mut doc = current
                .cloned()
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            for transform in transforms {
                apply_transform(path, &mut doc, transform)?;
            }
            Ok(Some(doc))
        }
        WriteOp::Delete => Ok(None),
        WriteOp::Verify => Ok(current.cloned()),
    }
}

fn apply_transform(path: &DocPath, doc: &mut Value, transform: &FieldTransform) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidOperation {
        path: path.to_string(),
        reason: format!("{} ({})", reason, transform.field),
    };

    let parts: Vec<&str> = transform.field.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(invalid("empty field segment"));
    }
    let (last, parents) = parts.split_last().ok_or_else(|| invalid("empty field path"))?;

    let mut cursor = doc;
    for part in parents {
        let object = cursor.as_object_mut().ok_or_else(|| invalid("parent is not an object"))?;
        let entry = object
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            if matches!(transform.op, FieldOp::Delete) {
                return Ok(());
            }
            *entry = Value::Object(Map::new());
        }
        cursor = entry;
    }

    let object = cursor.as_object_mut().ok_or_else(|| invalid("parent is not an object"))?;
    match &transform.op {
        FieldOp::Set(value) => {
            object.insert(last.to_string(), value.clone());
        }
        FieldOp::Delete => {
            object.remove(*last);
        }
        FieldOp::ArrayUnion(values) => {
            let entry = object.entry(last.to_string()).or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Value::Array(items) = entry {
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
            }
        }
        FieldOp::ArrayRemove(values) => {
            let entry = object.entry(last.to_string()).or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Array(items) => items.retain(|item| !values.contains(item)),
                other => *other = Value::Array(Vec::new()),
            }
        }
    }
    Ok(())
}

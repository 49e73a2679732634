use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::follow::FollowStatus;

/// 缓存项
#[derive(Debug, Clone)]
struct CacheItem<T> {
    value: T,
    expires_at: Instant,
}

/// 简单的内存 TTL 缓存
#[derive(Debug, Clone)]
pub struct Cache<K: Eq + Hash, T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<K, CacheItem<T>>>>,
    default_ttl: Duration,
}

impl<K: Eq + Hash, T: Clone + Send + Sync> Cache<K, T> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    pub fn set(&self, key: K, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: K, value: T, ttl: Duration) {
        let item = CacheItem {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.data.write().insert(key, item);
    }

    /// 获取未过期的缓存项
    pub fn get(&self, key: &K) -> Option<T> {
        let data = self.data.read();
        data.get(key)
            .filter(|item| item.expires_at > Instant::now())
            .map(|item| item.value.clone())
    }

    pub fn delete(&self, key: &K) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// 清理过期项，返回删除的数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, item| item.expires_at > now);
        before - data.len()
    }
}

/// 关注状态缓存，键为 (actor, target)
#[derive(Debug, Clone)]
pub struct FollowStatusCache {
    inner: Cache<(String, String), FollowStatus>,
}

impl FollowStatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self { inner: Cache::new(ttl) }
    }

    fn key(actor_id: &str, target_id: &str) -> (String, String) {
        (actor_id.to_string(), target_id.to_string())
    }

    pub fn get(&self, actor_id: &str, target_id: &str) -> Option<FollowStatus> {
        self.inner.get(&Self::key(actor_id, target_id))
    }

    pub fn put(&self, actor_id: &str, target_id: &str, status: FollowStatus) {
        self.inner.set(Self::key(actor_id, target_id), status);
    }

    /// 两个方向一起失效
    pub fn invalidate_pair(&self, a: &str, b: &str) {
        self.inner.delete(&Self::key(a, b));
        self.inner.delete(&Self::key(b, a));
    }

    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }
}

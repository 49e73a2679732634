use crate::{
    error::{AppError, Result},
    models::follow::*,
    models::user::UserDocument,
    services::database::{Database, Transaction},
    services::store::{legacy, subcollection, DocPath, FieldTransform, FOLLOW_REQUESTS},
    utils::cache::FollowStatusCache,
};
use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_PAGE_SIZE: usize = 100;

/// 关注关系的两个方向
#[derive(Debug, Clone, Copy)]
enum Relation {
    Followers,
    Following,
}

impl Relation {
    fn field(self) -> &'static str {
        match self {
            Relation::Followers => "followers",
            Relation::Following => "following",
        }
    }

    fn counter(self) -> &'static str {
        match self {
            Relation::Followers => "stats.followers",
            Relation::Following => "stats.following",
        }
    }

    fn members(self, user: &UserDocument) -> &[String] {
        match self {
            Relation::Followers => &user.followers,
            Relation::Following => &user.following,
        }
    }
}

/// 加入成员，计数器与数组长度在同一写操作中更新
fn add_member(tx: &Transaction, user: &UserDocument, relation: Relation, member_id: &str) -> Result<()> {
    let members = relation.members(user);
    let len = members.len() + usize::from(!members.iter().any(|m| m == member_id));
    tx.update(
        &DocPath::user(&user.id)?,
        vec![
            FieldTransform::array_union(relation.field(), vec![json!(member_id)]),
            FieldTransform::set(relation.counter(), json!(len)),
        ],
    );
    Ok(())
}

fn remove_member(tx: &Transaction, user: &UserDocument, relation: Relation, member_id: &str) -> Result<()> {
    let len = relation.members(user).iter().filter(|m| *m != member_id).count();
    tx.update(
        &DocPath::user(&user.id)?,
        vec![
            FieldTransform::array_remove(relation.field(), vec![json!(member_id)]),
            FieldTransform::set(relation.counter(), json!(len)),
        ],
    );
    Ok(())
}

async fn read_user(tx: &Transaction, user_id: &str) -> Result<Option<UserDocument>> {
    let path = DocPath::user(user_id)?;
    Ok(tx
        .get_as::<UserDocument>(&path)
        .await?
        .map(|user| user.with_id(user_id)))
}

async fn follow_in(tx: &Transaction, actor_id: &str, target_id: &str) -> Result<FollowOutcome> {
    let target = read_user(tx, target_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let actor = match read_user(tx, actor_id).await? {
        Some(actor) => actor,
        None => {
            let actor = UserDocument::new(actor_id, "", "");
            tx.set_document(&DocPath::user(actor_id)?, &actor)?;
            actor
        }
    };

    if target.has_follower(actor_id) && actor.follows(target_id) {
        return Ok(FollowOutcome::AlreadyFollowing);
    }

    let request_path = DocPath::follow_request(target_id, actor_id)?;
    let has_request = tx.get(&request_path).await?.is_some();

    if target.is_private() {
        if has_request {
            return Ok(FollowOutcome::AlreadyRequested);
        }
        tx.set_document(&request_path, &FollowRequest::from_requester(&actor))?;
        return Ok(FollowOutcome::Requested);
    }

    if has_request {
        tx.delete(&request_path);
    }
    add_member(tx, &target, Relation::Followers, actor_id)?;
    add_member(tx, &actor, Relation::Following, target_id)?;
    Ok(FollowOutcome::Followed)
}

async fn unfollow_in(tx: &Transaction, actor_id: &str, target_id: &str) -> Result<UnfollowOutcome> {
    let target = read_user(tx, target_id).await?;
    let actor = read_user(tx, actor_id).await?;

    let request_path = DocPath::follow_request(target_id, actor_id)?;
    let has_request = tx.get(&request_path).await?.is_some();

    let mut was_following = false;
    if let Some(target) = target.as_ref().filter(|t| t.has_follower(actor_id)) {
        remove_member(tx, target, Relation::Followers, actor_id)?;
        was_following = true;
    }
    if let Some(actor) = actor.as_ref().filter(|a| a.follows(target_id)) {
        remove_member(tx, actor, Relation::Following, target_id)?;
        was_following = true;
    }
    if has_request {
        tx.delete(&request_path);
    }

    Ok(if was_following {
        UnfollowOutcome::Unfollowed
    } else if has_request {
        UnfollowOutcome::RequestCancelled
    } else {
        UnfollowOutcome::NotFollowing
    })
}

fn status_after_follow(outcome: FollowOutcome) -> FollowStatus {
    let following = matches!(outcome, FollowOutcome::Followed | FollowOutcome::AlreadyFollowing);
    FollowStatus {
        is_following: following,
        is_pending: !following,
        checked_at: Utc::now(),
    }
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[derive(Clone)]
pub struct FollowService {
    db: Arc<Database>,
    cache: FollowStatusCache,
}

impl FollowService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        let ttl = Duration::from_secs(db.config.follow_status_ttl_secs);
        Ok(Self {
            db,
            cache: FollowStatusCache::new(ttl),
        })
    }

    pub fn status_cache(&self) -> &FollowStatusCache {
        &self.cache
    }

    /// 关注用户；私密账号只创建关注请求
    pub async fn follow(&self, actor_id: &str, target_id: &str) -> Result<FollowOutcome> {
        debug!("User {} following user {}", actor_id, target_id);

        if actor_id == target_id {
            return Err(AppError::BadRequest("Non puoi seguire te stesso".to_string()));
        }

        let outcome = self
            .db
            .run_transaction("follow", |tx| async move { follow_in(&tx, actor_id, target_id).await })
            .await?;

        self.cache.invalidate_pair(actor_id, target_id);
        info!("User {} -> {}: {:?}", actor_id, target_id, outcome);
        Ok(outcome)
    }

    /// 取消关注，同时撤回未处理的关注请求
    pub async fn unfollow(&self, actor_id: &str, target_id: &str) -> Result<UnfollowOutcome> {
        debug!("User {} unfollowing user {}", actor_id, target_id);

        if actor_id == target_id {
            return Err(AppError::BadRequest("Non puoi smettere di seguire te stesso".to_string()));
        }

        let outcome = self
            .db
            .run_transaction("unfollow", |tx| async move { unfollow_in(&tx, actor_id, target_id).await })
            .await?;

        self.cache.invalidate_pair(actor_id, target_id);
        info!("User {} -> {}: {:?}", actor_id, target_id, outcome);
        Ok(outcome)
    }

    /// 关注按钮点击：已关注或待处理时取消，否则关注
    pub async fn toggle_follow(&self, actor_id: &str, target_id: &str) -> Result<FollowStatus> {
        debug!("User {} toggling follow on {}", actor_id, target_id);

        if actor_id == target_id {
            return Err(AppError::BadRequest("Non puoi seguire te stesso".to_string()));
        }

        let status = self
            .db
            .run_transaction("toggle_follow", |tx| async move {
                let target = read_user(&tx, target_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("User"))?;
                let pending = tx
                    .get(&DocPath::follow_request(target_id, actor_id)?)
                    .await?
                    .is_some();

                if target.has_follower(actor_id) || pending {
                    unfollow_in(&tx, actor_id, target_id).await?;
                    Ok(FollowStatus::none())
                } else {
                    let outcome = follow_in(&tx, actor_id, target_id).await?;
                    Ok(status_after_follow(outcome))
                }
            })
            .await?;

        self.cache.invalidate_pair(actor_id, target_id);
        self.cache.put(actor_id, target_id, status);
        Ok(status)
    }

    /// 关注状态，带 TTL 缓存；`checkedAt` 标明读取时间
    pub async fn follow_status(&self, actor_id: &str, target_id: &str) -> Result<FollowStatus> {
        if actor_id == target_id {
            return Ok(FollowStatus::none());
        }

        if let Some(status) = self.cache.get(actor_id, target_id) {
            debug!("Follow status cache hit for {} -> {}", actor_id, target_id);
            return Ok(status);
        }

        let target = self.db.get_as::<UserDocument>(&DocPath::user(target_id)?).await?;
        let status = match target {
            Some(target) => FollowStatus {
                is_following: target.has_follower(actor_id),
                is_pending: self
                    .db
                    .get(&DocPath::follow_request(target_id, actor_id)?)
                    .await?
                    .is_some(),
                checked_at: Utc::now(),
            },
            None => FollowStatus::none(),
        };

        self.cache.put(actor_id, target_id, status);
        Ok(status)
    }

    /// 关注按钮状态：未登录或查看自己时隐藏
    pub async fn follow_button(&self, actor_id: Option<&str>, target_id: &str) -> Result<FollowButtonState> {
        match actor_id {
            Some(actor_id) if actor_id != target_id => {
                let status = self.follow_status(actor_id, target_id).await?;
                Ok(FollowButtonState::for_status(status))
            }
            _ => Ok(FollowButtonState::hidden()),
        }
    }

    pub async fn list_followers(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<FollowList> {
        debug!("Getting followers for user: {}", user_id);
        let user = self.load_user(user_id).await?.ok_or_else(|| AppError::not_found("User"))?;
        self.list_members(&user.followers, viewer_id, page, limit).await
    }

    pub async fn list_following(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<FollowList> {
        debug!("Getting following for user: {}", user_id);
        let user = self.load_user(user_id).await?.ok_or_else(|| AppError::not_found("User"))?;
        self.list_members(&user.following, viewer_id, page, limit).await
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<UserDocument>> {
        Ok(self
            .db
            .get_as::<UserDocument>(&DocPath::user(user_id)?)
            .await?
            .map(|user| user.with_id(user_id)))
    }

    async fn list_members(
        &self,
        ids: &[String],
        viewer_id: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<FollowList> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(self.db.config.default_page_size).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(limit);

        let viewer = match viewer_id {
            Some(id) => self.load_user(id).await?,
            None => None,
        };

        let slice: Vec<&String> = ids.iter().skip(offset).take(limit).collect();
        let lookups = slice.iter().map(|id| self.load_user(id));
        let mut users = Vec::with_capacity(slice.len());
        for (id, result) in slice.iter().zip(join_all(lookups).await) {
            match result? {
                Some(user) => users.push(FollowUserInfo::from_user(&user, viewer.as_ref())),
                None => debug!("Skipping dangling follow entry {}", id),
            }
        }

        Ok(FollowList {
            users,
            total: ids.len(),
            page,
            limit,
            has_more: offset.saturating_add(limit) < ids.len(),
        })
    }

    /// 待处理的关注请求，请求者资料在读取时解析
    pub async fn list_requests(&self, owner_id: &str) -> Result<Vec<FollowRequestView>> {
        debug!("Listing follow requests for user: {}", owner_id);

        let collection = subcollection(&DocPath::user(owner_id)?, FOLLOW_REQUESTS)?;
        let snapshots = self.db.list(&collection).await?;

        let mut requests = Vec::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            let mut request: FollowRequest = snapshot.decode()?;
            if request.requester_id.is_empty() {
                request.requester_id = snapshot.path.id().to_string();
            }
            requests.push(request);
        }

        let profiles = join_all(requests.iter().map(|r| self.load_user(&r.requester_id))).await;

        let mut views = Vec::with_capacity(requests.len());
        for (request, profile) in requests.into_iter().zip(profiles) {
            let view = match profile? {
                Some(user) => FollowRequestView {
                    id: request.requester_id,
                    display_name: if user.display_name.is_empty() { request.requester_name } else { user.display_name },
                    photo_url: if user.photo_url.is_empty() { request.requester_photo } else { user.photo_url },
                    requested_at: request.requested_at,
                },
                None => FollowRequestView {
                    id: request.requester_id,
                    display_name: request.requester_name,
                    photo_url: request.requester_photo,
                    requested_at: request.requested_at,
                },
            };
            views.push(view);
        }

        views.sort_by_key(|view| view.requested_at);
        Ok(views)
    }

    /// 接受关注请求：删除请求并建立双向关系
    pub async fn accept_request(&self, owner_id: &str, requester_id: &str) -> Result<RequestOutcome> {
        debug!("User {} accepting follow request from {}", owner_id, requester_id);

        let outcome = self
            .db
            .run_transaction("accept_request", |tx| async move {
                let request_path = DocPath::follow_request(owner_id, requester_id)?;
                if tx.get(&request_path).await?.is_none() {
                    return Ok(RequestOutcome::Missing);
                }

                let owner = read_user(&tx, owner_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("User"))?;
                tx.delete(&request_path);

                let Some(requester) = read_user(&tx, requester_id).await? else {
                    return Ok(RequestOutcome::Discarded);
                };

                add_member(&tx, &owner, Relation::Followers, requester_id)?;
                add_member(&tx, &requester, Relation::Following, owner_id)?;
                Ok(RequestOutcome::Accepted)
            })
            .await?;

        self.cache.invalidate_pair(owner_id, requester_id);
        info!("Follow request {} -> {}: {:?}", requester_id, owner_id, outcome);
        Ok(outcome)
    }

    /// 拒绝关注请求：只删除请求
    pub async fn reject_request(&self, owner_id: &str, requester_id: &str) -> Result<RequestOutcome> {
        debug!("User {} rejecting follow request from {}", owner_id, requester_id);

        let outcome = self
            .db
            .run_transaction("reject_request", |tx| async move {
                let request_path = DocPath::follow_request(owner_id, requester_id)?;
                if tx.get(&request_path).await?.is_none() {
                    return Ok(RequestOutcome::Missing);
                }
                tx.delete(&request_path);
                Ok(RequestOutcome::Rejected)
            })
            .await?;

        self.cache.invalidate_pair(owner_id, requester_id);
        Ok(outcome)
    }

    /// 把旧版关注数据合并进数组表示，删除旧数据并重算计数器
    pub async fn migrate_legacy(&self, user_id: &str) -> Result<MigrationReport> {
        info!("Migrating legacy follow data for user: {}", user_id);

        let user_path = DocPath::user(user_id)?;
        let following_markers = self
            .db
            .list(&subcollection(&user_path, legacy::FOLLOWING_MARKERS)?)
            .await?;
        let follower_markers = self
            .db
            .list(&subcollection(&user_path, legacy::FOLLOWER_MARKERS)?)
            .await?;
        let log_entries: Vec<_> = self
            .db
            .list(legacy::FOLLOWERS_LOG)
            .await?
            .into_iter()
            .filter(|entry| {
                let field = |name: &str| entry.field(name).and_then(Value::as_str) == Some(user_id);
                field("followerId") || field("followedId")
            })
            .collect();

        // 迁移后：user 关注的人 / 关注 user 的人
        let mut legacy_following: BTreeSet<String> =
            following_markers.iter().map(|s| s.path.id().to_string()).collect();
        let mut legacy_followers: BTreeSet<String> =
            follower_markers.iter().map(|s| s.path.id().to_string()).collect();
        for entry in &log_entries {
            let follower = entry.field("followerId").and_then(Value::as_str).unwrap_or_default();
            let followed = entry.field("followedId").and_then(Value::as_str).unwrap_or_default();
            if follower == user_id && !followed.is_empty() {
                legacy_following.insert(followed.to_string());
            } else if followed == user_id && !follower.is_empty() {
                legacy_followers.insert(follower.to_string());
            }
        }
        legacy_following.remove(user_id);
        legacy_followers.remove(user_id);

        let mut legacy_paths: Vec<DocPath> = following_markers
            .iter()
            .chain(follower_markers.iter())
            .chain(log_entries.iter())
            .map(|s| s.path.clone())
            .collect();
        legacy_paths.sort();
        legacy_paths.dedup();

        let counterparts: BTreeSet<String> =
            legacy_following.union(&legacy_followers).cloned().collect();

        let report = self
            .db
            .run_transaction("migrate_legacy", |tx| {
                let user_path = user_path.clone();
                let legacy_paths = legacy_paths.clone();
                let legacy_following = legacy_following.clone();
                let legacy_followers = legacy_followers.clone();
                let counterparts = counterparts.clone();
                async move {
                    let snapshot = tx.get(&user_path).await?.ok_or_else(|| AppError::not_found("User"))?;
                    let user: UserDocument = snapshot.decode::<UserDocument>()?.with_id(user_id);
                    let mut report = MigrationReport::default();

                    let mut following = dedup(&user.following);
                    let mut followers = dedup(&user.followers);

                    for other_id in &counterparts {
                        let Some(other) = read_user(&tx, other_id).await? else {
                            debug!("Dropping legacy relation with missing user {}", other_id);
                            continue;
                        };

                        let mut other_following = dedup(&other.following);
                        let mut other_followers = dedup(&other.followers);

                        if legacy_following.contains(other_id) {
                            if !following.contains(other_id) {
                                following.push(other_id.clone());
                                report.following_merged += 1;
                            }
                            if !other_followers.iter().any(|id| id == user_id) {
                                other_followers.push(user_id.to_string());
                            }
                        }
                        if legacy_followers.contains(other_id) {
                            if !followers.contains(other_id) {
                                followers.push(other_id.clone());
                                report.followers_merged += 1;
                            }
                            if !other_following.iter().any(|id| id == user_id) {
                                other_following.push(user_id.to_string());
                            }
                        }

                        if other_following != other.following || other_followers != other.followers {
                            tx.update(
                                &DocPath::user(other_id)?,
                                vec![
                                    FieldTransform::set("following", json!(other_following)),
                                    FieldTransform::set("followers", json!(other_followers)),
                                    FieldTransform::set("stats.following", json!(other_following.len())),
                                    FieldTransform::set("stats.followers", json!(other_followers.len())),
                                ],
                            );
                        }
                    }

                    // followRequests[] 数组字段 -> 请求文档
                    let legacy_requests: Vec<String> = snapshot
                        .field(legacy::FOLLOW_REQUESTS_FIELD)
                        .and_then(Value::as_array)
                        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
                        .unwrap_or_default();
                    for requester_id in dedup(&legacy_requests) {
                        if requester_id == user_id || followers.contains(&requester_id) {
                            continue;
                        }
                        let request_path = DocPath::follow_request(user_id, &requester_id)?;
                        if tx.get(&request_path).await?.is_some() {
                            continue;
                        }
                        let request = match read_user(&tx, &requester_id).await? {
                            Some(requester) => FollowRequest::from_requester(&requester),
                            None => continue,
                        };
                        tx.set_document(&request_path, &request)?;
                        report.requests_migrated += 1;
                    }

                    report.counters_repaired = user.stats.following != following.len() as u64
                        || user.stats.followers != followers.len() as u64
                        || following.len() != user.following.len()
                        || followers.len() != user.followers.len();

                    let mut transforms = vec![
                        FieldTransform::set("following", json!(following)),
                        FieldTransform::set("followers", json!(followers)),
                        FieldTransform::set("stats.following", json!(following.len())),
                        FieldTransform::set("stats.followers", json!(followers.len())),
                    ];
                    if snapshot.field(legacy::FOLLOW_REQUESTS_FIELD).is_some() {
                        transforms.push(FieldTransform::delete(legacy::FOLLOW_REQUESTS_FIELD));
                    }
                    tx.update(&user_path, transforms);

                    for path in &legacy_paths {
                        tx.delete(path);
                    }
                    report.legacy_documents_removed = legacy_paths.len();

                    Ok(report)
                }
            })
            .await?;

        for other_id in &counterparts {
            self.cache.invalidate_pair(user_id, other_id);
        }
        if report.legacy_documents_removed > 0 || report.requests_migrated > 0 {
            warn!(
                "Migrated legacy follow data for {}: {} markers removed, {} requests converted",
                user_id, report.legacy_documents_removed, report.requests_migrated
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::privacy::AccountType;
    use crate::services::store::{MemoryStore, WriteBatch};

    async fn setup(config: Config) -> (FollowService, Arc<Database>) {
        let db = Arc::new(Database::with_store(Arc::new(MemoryStore::new()), &config));
        let service = FollowService::new(db.clone()).await.unwrap();
        (service, db)
    }

    async fn create_user(db: &Database, id: &str, private: bool) {
        let mut user = UserDocument::new(id, &format!("User {}", id), "");
        if private {
            user.privacy.account_type = AccountType::Private;
        }
        db.commit(WriteBatch::new().set(DocPath::user(id).unwrap(), serde_json::to_value(&user).unwrap()))
            .await
            .unwrap();
    }

    async fn user(db: &Database, id: &str) -> UserDocument {
        db.get_as(&DocPath::user(id).unwrap()).await.unwrap().unwrap()
    }

    fn assert_counters(user: &UserDocument) {
        assert_eq!(user.stats.followers, user.followers.len() as u64);
        assert_eq!(user.stats.following, user.following.len() as u64);
    }

    #[tokio::test]
    async fn follow_public_account() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", false).await;

        assert_eq!(service.follow("a", "b").await.unwrap(), FollowOutcome::Followed);
        assert_eq!(service.follow("a", "b").await.unwrap(), FollowOutcome::AlreadyFollowing);

        let a = user(&db, "a").await;
        let b = user(&db, "b").await;
        assert_eq!(a.following, vec!["b".to_string()]);
        assert_eq!(b.followers, vec!["a".to_string()]);
        assert_counters(&a);
        assert_counters(&b);

        let button = service.follow_button(Some("a"), "b").await.unwrap();
        assert_eq!(button.label, Some(FollowLabel::Unfollow));
    }

    #[tokio::test]
    async fn unfollow_restores_documents() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", false).await;
        let before_a = user(&db, "a").await;
        let before_b = user(&db, "b").await;

        service.follow("a", "b").await.unwrap();
        assert_eq!(service.unfollow("a", "b").await.unwrap(), UnfollowOutcome::Unfollowed);
        assert_eq!(service.unfollow("a", "b").await.unwrap(), UnfollowOutcome::NotFollowing);

        let a = user(&db, "a").await;
        let b = user(&db, "b").await;
        assert_eq!(a.following, before_a.following);
        assert_eq!(b.followers, before_b.followers);
        assert_eq!(a.stats, before_a.stats);
        assert_eq!(b.stats, before_b.stats);
    }

    #[tokio::test]
    async fn private_account_gets_request() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", true).await;

        assert_eq!(service.follow("a", "b").await.unwrap(), FollowOutcome::Requested);
        assert_eq!(service.follow("a", "b").await.unwrap(), FollowOutcome::AlreadyRequested);

        let b = user(&db, "b").await;
        assert!(b.followers.is_empty());

        let status = service.follow_status("a", "b").await.unwrap();
        assert!(status.is_pending);
        assert!(!status.is_following);

        let requests = service.list_requests("b").await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "a");
        assert_eq!(requests[0].display_name, "User a");
    }

    #[tokio::test]
    async fn unfollow_cancels_pending_request() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", true).await;

        service.follow("a", "b").await.unwrap();
        assert_eq!(service.unfollow("a", "b").await.unwrap(), UnfollowOutcome::RequestCancelled);
        assert!(service.list_requests("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accept_creates_mutual_membership() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", true).await;

        service.follow("a", "b").await.unwrap();
        assert_eq!(service.accept_request("b", "a").await.unwrap(), RequestOutcome::Accepted);
        assert_eq!(service.accept_request("b", "a").await.unwrap(), RequestOutcome::Missing);

        let a = user(&db, "a").await;
        let b = user(&db, "b").await;
        assert!(a.follows("b"));
        assert!(b.has_follower("a"));
        assert_counters(&a);
        assert_counters(&b);
        assert!(service.list_requests("b").await.unwrap().is_empty());

        let status = service.follow_status("a", "b").await.unwrap();
        assert!(status.is_following);
        assert!(!status.is_pending);
    }

    #[tokio::test]
    async fn reject_only_removes_request() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", true).await;

        service.follow("a", "b").await.unwrap();
        assert_eq!(service.reject_request("b", "a").await.unwrap(), RequestOutcome::Rejected);

        let a = user(&db, "a").await;
        let b = user(&db, "b").await;
        assert!(a.following.is_empty());
        assert!(b.followers.is_empty());
        assert!(service.list_requests("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accept_from_deleted_requester_is_discarded() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", true).await;
        service.follow("a", "b").await.unwrap();
        db.commit(WriteBatch::new().delete(DocPath::user("a").unwrap())).await.unwrap();

        assert_eq!(service.accept_request("b", "a").await.unwrap(), RequestOutcome::Discarded);
        assert!(user(&db, "b").await.followers.is_empty());
        assert!(service.list_requests("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn follow_rules() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;

        assert!(matches!(service.follow("a", "a").await, Err(AppError::BadRequest(_))));
        assert!(matches!(service.follow("a", "ghost").await, Err(AppError::NotFound(_))));

        // 关注者文档不存在时自动创建
        create_user(&db, "b", false).await;
        assert_eq!(service.follow("new", "b").await.unwrap(), FollowOutcome::Followed);
        let created = user(&db, "new").await;
        assert_eq!(created.following, vec!["b".to_string()]);
        assert_counters(&created);
    }

    #[tokio::test]
    async fn toggle_switches_between_states() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", false).await;
        create_user(&db, "p", true).await;

        assert!(service.toggle_follow("a", "b").await.unwrap().is_following);
        assert!(!service.toggle_follow("a", "b").await.unwrap().is_following);

        assert!(service.toggle_follow("a", "p").await.unwrap().is_pending);
        let cancelled = service.toggle_follow("a", "p").await.unwrap();
        assert!(!cancelled.is_pending);
        assert!(service.list_requests("p").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_cache_is_invalidated_by_mutations() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", false).await;

        assert!(!service.follow_status("a", "b").await.unwrap().is_following);
        service.follow("a", "b").await.unwrap();
        assert!(service.follow_status("a", "b").await.unwrap().is_following);
        service.unfollow("a", "b").await.unwrap();
        assert!(!service.follow_status("a", "b").await.unwrap().is_following);
    }

    #[tokio::test]
    async fn status_cache_keeps_colon_ids_apart() {
        let (service, db) = setup(Config::default()).await;
        for id in ["a", "b:c", "a:b", "c"] {
            create_user(&db, id, false).await;
        }

        service.follow("a", "b:c").await.unwrap();
        assert!(service.follow_status("a", "b:c").await.unwrap().is_following);
        assert!(!service.follow_status("a:b", "c").await.unwrap().is_following);
        assert!(user(&db, "c").await.followers.is_empty());
    }

    #[tokio::test]
    async fn button_hidden_for_self_and_anonymous() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        assert!(!service.follow_button(None, "a").await.unwrap().visible);
        assert!(!service.follow_button(Some("a"), "a").await.unwrap().visible);
    }

    #[tokio::test]
    async fn followers_are_paginated() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "star", false).await;
        for i in 0..5 {
            let id = format!("f{}", i);
            create_user(&db, &id, false).await;
            service.follow(&id, "star").await.unwrap();
        }

        let page = service.list_followers("star", Some("f0"), Some(2), Some(2)).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.users.len(), 2);
        assert_eq!(page.users[0].user_id, "f2");
        assert!(page.has_more);

        let following = service.list_following("f0", None, None, None).await.unwrap();
        assert_eq!(following.users[0].user_id, "star");
    }

    #[tokio::test]
    async fn huge_page_returns_empty_list() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "star", false).await;
        create_user(&db, "fan", false).await;
        service.follow("fan", "star").await.unwrap();

        let page = service.list_followers("star", None, Some(usize::MAX), Some(100)).await.unwrap();
        assert_eq!(page.total, 1);
        assert!(page.users.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_follows_do_not_lose_updates() {
        let config = Config { transaction_max_attempts: 64, ..Config::default() };
        let (service, db) = setup(config).await;
        create_user(&db, "target", false).await;
        for i in 0..8 {
            create_user(&db, &format!("u{}", i), false).await;
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move { service.follow(&format!("u{}", i), "target").await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), FollowOutcome::Followed);
        }

        let target = user(&db, "target").await;
        assert_eq!(target.followers.len(), 8);
        assert_counters(&target);
    }

    #[tokio::test]
    async fn migrate_folds_legacy_data() {
        let (service, db) = setup(Config::default()).await;
        create_user(&db, "a", false).await;
        create_user(&db, "b", false).await;
        create_user(&db, "c", false).await;
        create_user(&db, "d", false).await;

        let a_path = DocPath::user("a").unwrap();
        db.commit(
            WriteBatch::new()
                .set(a_path.child("following", "b").unwrap(), json!({"timestamp": 1}))
                .set(a_path.child("followers", "c").unwrap(), json!({"timestamp": 1}))
                .set(
                    DocPath::new("followers", "log1").unwrap(),
                    json!({"followerId": "d", "followedId": "a", "timestamp": 1}),
                )
                .update(
                    a_path.clone(),
                    vec![
                        FieldTransform::set("followRequests", json!(["b", "d", "c"])),
                        FieldTransform::set("stats.followers", json!(42)),
                    ],
                ),
        )
        .await
        .unwrap();

        let report = service.migrate_legacy("a").await.unwrap();
        assert_eq!(report.following_merged, 1);
        assert_eq!(report.followers_merged, 2);
        assert_eq!(report.legacy_documents_removed, 3);
        assert_eq!(report.requests_migrated, 1);
        assert!(report.counters_repaired);

        let a = user(&db, "a").await;
        assert!(a.follows("b"));
        assert!(a.has_follower("c"));
        assert!(a.has_follower("d"));
        assert_counters(&a);
        assert!(user(&db, "b").await.has_follower("a"));
        assert!(user(&db, "c").await.follows("a"));
        assert!(user(&db, "d").await.follows("a"));

        let raw = db.get(&a_path).await.unwrap().unwrap();
        assert!(raw.field("followRequests").is_none());
        assert!(db.list("users/a/following").await.unwrap().is_empty());
        assert!(db.list("followers").await.unwrap().is_empty());

        let requests = service.list_requests("a").await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "b");

        // 再次迁移无变化
        let again = service.migrate_legacy("a").await.unwrap();
        assert_eq!(again, MigrationReport::default());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const USERS: [&str; 3] = ["u0", "u1", "u2"];

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn arrays_stay_symmetric(ops in prop::collection::vec((0usize..3, 0usize..3, any::<bool>()), 1..20)) {
                let runtime = tokio::runtime::Runtime::new().unwrap();
                runtime.block_on(async {
                    let (service, db) = setup(Config::default()).await;
                    for id in USERS {
                        create_user(&db, id, false).await;
                    }

                    for (actor, target, follow) in ops {
                        if actor == target {
                            continue;
                        }
                        if follow {
                            service.follow(USERS[actor], USERS[target]).await.unwrap();
                        } else {
                            service.unfollow(USERS[actor], USERS[target]).await.unwrap();
                        }
                    }

                    for id in USERS {
                        let doc = user(&db, id).await;
                        assert_counters(&doc);
                        for followed in &doc.following {
                            assert!(user(&db, followed).await.has_follower(id));
                        }
                        for follower in &doc.followers {
                            assert!(user(&db, follower).await.follows(id));
                        }
                    }
                });
            }

            #[test]
            fn unfollow_undoes_follow(actor in 0usize..3, target in 0usize..3) {
                prop_assume!(actor != target);
                let runtime = tokio::runtime::Runtime::new().unwrap();
                runtime.block_on(async {
                    let (service, db) = setup(Config::default()).await;
                    for id in USERS {
                        create_user(&db, id, false).await;
                    }
                    let before = user(&db, USERS[actor]).await;

                    service.follow(USERS[actor], USERS[target]).await.unwrap();
                    service.unfollow(USERS[actor], USERS[target]).await.unwrap();

                    let after = user(&db, USERS[actor]).await;
                    assert_eq!(before.following, after.following);
                    assert_eq!(before.stats, after.stats);
                });
            }
        }
    }
}

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::user::UserDocument;

/// `users/{owner}/followRequests/{requester}` 文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub requester_id: String,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub requester_name: String,
    #[serde(default)]
    pub requester_photo: String,
}

impl FollowRequest {
    pub fn from_requester(requester: &UserDocument) -> Self {
        Self {
            requester_id: requester.id.clone(),
            requested_at: Utc::now(),
            requester_name: requester.display_name.clone(),
            requester_photo: requester.photo_url.clone(),
        }
    }
}

/// 待处理请求列表中的一项，资料在读取时解析
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequestView {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStatus {
    pub is_following: bool,
    pub is_pending: bool,
    pub checked_at: DateTime<Utc>,
}

impl FollowStatus {
    pub fn none() -> Self {
        Self {
            is_following: false,
            is_pending: false,
            checked_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowOutcome {
    Followed,
    Requested,
    AlreadyFollowing,
    AlreadyRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfollowOutcome {
    Unfollowed,
    RequestCancelled,
    NotFollowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Accepted,
    Rejected,
    /// 请求不存在，无操作
    Missing,
    /// 请求者账号已不存在，请求被丢弃
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowLabel {
    Follow,
    Unfollow,
    Pending,
}

impl FollowLabel {
    pub fn from_status(status: &FollowStatus) -> Self {
        if status.is_following {
            FollowLabel::Unfollow
        } else if status.is_pending {
            FollowLabel::Pending
        } else {
            FollowLabel::Follow
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            FollowLabel::Follow => "Segui",
            FollowLabel::Unfollow => "Non seguire più",
            FollowLabel::Pending => "Richiesta inviata",
        }
    }
}

/// 关注按钮的渲染状态
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowButtonState {
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<FollowLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FollowStatus>,
}

impl FollowButtonState {
    pub fn hidden() -> Self {
        Self { visible: false, label: None, text: None, status: None }
    }

    pub fn for_status(status: FollowStatus) -> Self {
        let label = FollowLabel::from_status(&status);
        Self {
            visible: true,
            label: Some(label),
            text: Some(label.text()),
            status: Some(status),
        }
    }
}

/// 关注者/关注列表中的一项
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUserInfo {
    pub user_id: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub is_private: bool,
    /// 当前查看者是否关注了此用户
    pub is_following: bool,
}

impl FollowUserInfo {
    pub fn from_user(user: &UserDocument, viewer: Option<&UserDocument>) -> Self {
        Self {
            user_id: user.id.clone(),
            display_name: user.display_name.clone(),
            photo_url: user.photo_url.clone(),
            is_private: user.is_private(),
            is_following: viewer.map(|v| v.follows(&user.id)).unwrap_or(false),
        }
    }
}

/// 分页的关注者/关注列表
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowList {
    pub users: Vec<FollowUserInfo>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub has_more: bool,
}

/// 旧版关注数据迁移结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub following_merged: usize,
    pub followers_merged: usize,
    pub requests_migrated: usize,
    pub legacy_documents_removed: usize,
    pub counters_repaired: bool,
}

use crate::{
    error::Result,
    models::follow::*,
    models::response::ApiResponse,
    services::auth::User,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct FollowQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeResponse<T> {
    pub outcome: T,
    pub status: FollowStatus,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/:user_id/follow", post(follow_user).delete(unfollow_user))
        .route("/user/:user_id/toggle", post(toggle_follow))
        .route("/user/:user_id/status", get(follow_status))
        .route("/user/:user_id/button", get(follow_button))
        .route("/user/:user_id/followers", get(get_followers))
        .route("/user/:user_id/following", get(get_following))
        .route("/requests", get(list_requests))
        .route("/requests/:requester_id/accept", post(accept_request))
        .route("/requests/:requester_id/reject", post(reject_request))
        .route("/migrate", post(migrate_legacy))
}

/// 关注用户
/// POST /api/social/follows/user/:user_id/follow
async fn follow_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<OutcomeResponse<FollowOutcome>>>> {
    let outcome = state.follow_service.follow(&user.id, &user_id).await?;
    let status = state.follow_service.follow_status(&user.id, &user_id).await?;

    Ok(Json(ApiResponse::success(OutcomeResponse { outcome, status })))
}

/// 取消关注用户（或撤回关注请求）
/// DELETE /api/social/follows/user/:user_id/follow
async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<OutcomeResponse<UnfollowOutcome>>>> {
    let outcome = state.follow_service.unfollow(&user.id, &user_id).await?;
    let status = state.follow_service.follow_status(&user.id, &user_id).await?;

    Ok(Json(ApiResponse::success(OutcomeResponse { outcome, status })))
}

/// 关注按钮点击
/// POST /api/social/follows/user/:user_id/toggle
async fn toggle_follow(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<FollowButtonState>>> {
    let status = state.follow_service.toggle_follow(&user.id, &user_id).await?;
    Ok(Json(ApiResponse::success(FollowButtonState::for_status(status))))
}

/// 关注状态
/// GET /api/social/follows/user/:user_id/status
async fn follow_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<FollowStatus>>> {
    let status = state.follow_service.follow_status(&user.id, &user_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// 关注按钮状态，未登录时隐藏
/// GET /api/social/follows/user/:user_id/button
async fn follow_button(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<FollowButtonState>>> {
    let button = state.follow_service.follow_button(auth.user_id(), &user_id).await?;
    Ok(Json(ApiResponse::success(button)))
}

/// 获取用户的关注者列表
/// GET /api/social/follows/user/:user_id/followers
async fn get_followers(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<FollowQuery>,
    auth: OptionalAuth,
) -> Result<Json<ApiResponse<FollowList>>> {
    debug!("Getting followers for user: {}", user_id);

    let followers = state
        .follow_service
        .list_followers(&user_id, auth.user_id(), query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(followers)))
}

/// 获取用户关注的人列表
/// GET /api/social/follows/user/:user_id/following
async fn get_following(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<FollowQuery>,
    auth: OptionalAuth,
) -> Result<Json<ApiResponse<FollowList>>> {
    debug!("Getting following for user: {}", user_id);

    let following = state
        .follow_service
        .list_following(&user_id, auth.user_id(), query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(following)))
}

/// 待处理的关注请求
/// GET /api/social/follows/requests
async fn list_requests(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ApiResponse<Vec<FollowRequestView>>>> {
    let requests = state.follow_service.list_requests(&user.id).await?;
    Ok(Json(ApiResponse::success(requests)))
}

/// 接受关注请求
/// POST /api/social/follows/requests/:requester_id/accept
async fn accept_request(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(requester_id): Path<String>,
) -> Result<Json<ApiResponse<RequestOutcome>>> {
    let outcome = state.follow_service.accept_request(&user.id, &requester_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// 拒绝关注请求
/// POST /api/social/follows/requests/:requester_id/reject
async fn reject_request(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(requester_id): Path<String>,
) -> Result<Json<ApiResponse<RequestOutcome>>> {
    let outcome = state.follow_service.reject_request(&user.id, &requester_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// 迁移当前用户的旧版关注数据
/// POST /api/social/follows/migrate
async fn migrate_legacy(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ApiResponse<MigrationReport>>> {
    let report = state.follow_service.migrate_legacy(&user.id).await?;
    Ok(Json(ApiResponse::success(report)))
}

use crate::{
    error::Result,
    models::media::*,
    models::response::ApiResponse,
    services::auth::User,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id", get(get_video).put(update_video).delete(delete_video))
        .route("/:id/like", post(toggle_like))
        .route("/:id/comments", post(add_comment))
}

/// 视频详情
/// GET /api/social/videos/:id
async fn get_video(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<VideoDetail>>> {
    debug!("Getting video: {}", id);
    let detail = state.media_service.video_detail(auth.user_id(), &id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// 修改视频
/// PUT /api/social/videos/:id
async fn update_video(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(request): Json<UpdateVideoRequest>,
) -> Result<Json<ApiResponse<Video>>> {
    let video = state.media_service.update_video(&user.id, &id, request).await?;
    Ok(Json(ApiResponse::success_with_message(video, "Video aggiornato")))
}

/// 删除视频
/// DELETE /api/social/videos/:id
async fn delete_video(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    state.media_service.delete_video(&user.id, &id).await?;
    Ok(Json(ApiResponse::success_with_message((), "Video eliminato")))
}

/// 点赞/取消点赞
/// POST /api/social/videos/:id/like
async fn toggle_like(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LikeState>>> {
    let like = state.media_service.toggle_like(&user.id, &id).await?;
    Ok(Json(ApiResponse::success(like)))
}

/// 发表评论
/// POST /api/social/videos/:id/comments
async fn add_comment(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(request): Json<AddCommentRequest>,
) -> Result<Json<ApiResponse<Comment>>> {
    let comment = state.media_service.add_comment(&user, &id, request).await?;
    Ok(Json(ApiResponse::success(comment)))
}

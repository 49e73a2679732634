use crate::{
    error::Result,
    models::privacy::{PrivacyPanel, PrivacySettings, PrivacyUpdate},
    models::response::ApiResponse,
    models::user::{ProfileData, ProfileView},
    services::auth::User,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(get_my_profile).put(save_my_profile))
        .route("/me/privacy", get(get_privacy).patch(update_privacy))
        .route("/:user_id", get(view_profile))
}

/// 个人资料编辑页数据
/// GET /api/social/profile/me
async fn get_my_profile(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ApiResponse<ProfileData>>> {
    let profile = state.profile_service.load_profile(&user.id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// 保存个人资料
/// PUT /api/social/profile/me
async fn save_my_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(data): Json<ProfileData>,
) -> Result<Json<ApiResponse<ProfileData>>> {
    let saved = state.profile_service.save_profile(&user, data).await?;
    Ok(Json(ApiResponse::success_with_message(saved, "Profilo aggiornato")))
}

/// 隐私设置面板
/// GET /api/social/profile/me/privacy
async fn get_privacy(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ApiResponse<PrivacyPanel>>> {
    let panel = state.profile_service.get_privacy(&user.id).await?;
    Ok(Json(ApiResponse::success(panel)))
}

/// 部分更新隐私设置
/// PATCH /api/social/profile/me/privacy
async fn update_privacy(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(update): Json<PrivacyUpdate>,
) -> Result<Json<ApiResponse<PrivacySettings>>> {
    let settings = state.profile_service.update_privacy(&user.id, update).await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// 查看用户主页
/// GET /api/social/profile/:user_id
async fn view_profile(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<ProfileView>>> {
    debug!("Viewing profile: {}", user_id);
    let view = state.profile_service.profile_view(auth.user_id(), &user_id).await?;
    Ok(Json(ApiResponse::success(view)))
}

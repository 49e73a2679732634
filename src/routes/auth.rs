use crate::{
    error::Result,
    models::navigation::LogoutResponse,
    models::response::ApiResponse,
    services::auth::User,
    state::AppState,
};
use axum::{extract::State, response::Json, routing::post, Router};
use std::sync::Arc;
use tracing::info;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/logout", post(logout))
}

/// 退出登录：注销当前令牌直到过期
/// POST /api/social/auth/logout
async fn logout(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ApiResponse<LogoutResponse>>> {
    state.auth_service.revoke(&user);
    info!("User {} logged out", user.id);
    Ok(Json(ApiResponse::success(LogoutResponse::default())))
}

use crate::{
    models::navigation::{sidebar_menu, SidebarEntry},
    models::response::ApiResponse,
    state::AppState,
};
use axum::{response::Json, routing::get, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/sidebar", get(get_sidebar))
}

/// 个人主页侧边栏菜单
/// GET /api/social/navigation/sidebar
async fn get_sidebar() -> Json<ApiResponse<Vec<SidebarEntry>>> {
    Json(ApiResponse::success(sidebar_menu()))
}

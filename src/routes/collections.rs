use crate::{error::Result, models::media::CollectionDetail, models::response::ApiResponse, state::AppState};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    pub index: Option<usize>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:id", get(get_collection))
}

/// 集合详情，`index` 指定浏览器初始位置
/// GET /api/social/collections/:id
async fn get_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<ApiResponse<CollectionDetail>>> {
    let detail = state.media_service.resolve_collection(&id, query.index).await?;
    Ok(Json(ApiResponse::success(detail)))
}

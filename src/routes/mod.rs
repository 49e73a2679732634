use std::sync::Arc;

use axum::{extract::State, middleware, response::Json, routing::get, Router};
use serde_json::{json, Value};

use crate::{
    error::Result,
    state::AppState,
    utils::middleware::{
        auth_middleware, rate_limit_middleware, request_id_middleware, request_logging_middleware,
    },
};

pub mod auth;
pub mod collections;
pub mod follows;
pub mod navigation;
pub mod profile;
pub mod videos;

/// 构建应用路由，使用 /api/social/ 前缀
pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/follows", follows::router())
        .nest("/videos", videos::router())
        .nest("/collections", collections::router())
        .nest("/profile", profile::router())
        .nest("/navigation", navigation::router())
        .nest("/auth", auth::router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/social", api)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    state.db.verify_connection().await?;
    Ok(Json(json!({
        "status": "ok",
        "service": "rainbow-social"
    })))
}

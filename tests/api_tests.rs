use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rainbow_social::{
    config::Config,
    routes,
    services::auth::Claims,
    services::store::{DocPath, WriteBatch},
    services::Database,
    state::AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> (Router, Arc<AppState>) {
    let config = Config::default();
    let db = Arc::new(Database::new(&config).await.unwrap());
    let state = Arc::new(AppState::new(&config, db).await.unwrap());
    (routes::app(state.clone()), state)
}

fn token_for(uid: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: uid.to_string(),
        exp: now + 3600,
        iat: now,
        name: Some(format!("Utente {}", uid)),
        picture: None,
        anonymous: false,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"development-secret")).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn health_check_reports_ok() {
    let (app, _) = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn follow_requires_authentication() {
    let (app, _) = test_app().await;
    let (status, body) = send(&app, Method::POST, "/api/social/follows/user/b/follow", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Utente non autenticato");
}

#[tokio::test]
async fn follow_public_account_flow() {
    let (app, _) = test_app().await;
    let a = token_for("a");
    let b = token_for("b");

    // 首次认证请求创建用户文档
    let (status, _) = send(&app, Method::GET, "/api/social/profile/me", Some(&b), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::POST, "/api/social/follows/user/b/follow", Some(&a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "followed");
    assert_eq!(body["data"]["status"]["isFollowing"], true);

    let (_, body) = send(&app, Method::GET, "/api/social/follows/user/b/button", Some(&a), None).await;
    assert_eq!(body["data"]["visible"], true);
    assert_eq!(body["data"]["label"], "unfollow");
    assert_eq!(body["data"]["text"], "Non seguire più");

    let (_, body) = send(&app, Method::GET, "/api/social/follows/user/b/followers", None, None).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["users"][0]["userId"], "a");

    let (_, body) = send(&app, Method::GET, "/api/social/follows/user/b/button", None, None).await;
    assert_eq!(body["data"]["visible"], false);

    let (status, body) = send(&app, Method::DELETE, "/api/social/follows/user/b/follow", Some(&a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "unfollowed");
    assert_eq!(body["data"]["status"]["isFollowing"], false);
}

#[tokio::test]
async fn private_account_request_flow() {
    let (app, _) = test_app().await;
    let a = token_for("a");
    let b = token_for("b");

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/social/profile/me/privacy",
        Some(&b),
        Some(json!({"accountType": "private"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["accountType"], "private");

    let (_, body) = send(&app, Method::POST, "/api/social/follows/user/b/toggle", Some(&a), None).await;
    assert_eq!(body["data"]["label"], "pending");
    assert_eq!(body["data"]["text"], "Richiesta inviata");

    let (_, body) = send(&app, Method::GET, "/api/social/follows/requests", Some(&b), None).await;
    let requests = body["data"].as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["id"], "a");
    assert_eq!(requests[0]["displayName"], "Utente a");

    let (_, body) = send(&app, Method::POST, "/api/social/follows/requests/a/accept", Some(&b), None).await;
    assert_eq!(body["data"], "accepted");

    let (_, body) = send(&app, Method::GET, "/api/social/follows/user/b/status", Some(&a), None).await;
    assert_eq!(body["data"]["isFollowing"], true);
    assert_eq!(body["data"]["isPending"], false);

    let (_, body) = send(&app, Method::GET, "/api/social/profile/b", Some(&a), None).await;
    assert_eq!(body["data"]["canViewContent"], true);
}

#[tokio::test]
async fn followers_only_profile_is_locked_for_strangers() {
    let (app, _) = test_app().await;
    let owner = token_for("owner");

    send(
        &app,
        Method::PATCH,
        "/api/social/profile/me/privacy",
        Some(&owner),
        Some(json!({"profileVisibility": "followers"})),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/social/profile/me/privacy",
        Some(&owner),
        Some(json!({"profileVisibility": "folowers"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::GET, "/api/social/profile/owner", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["canViewContent"], false);
    assert_eq!(body["data"]["lockReason"], "followers_only");

    let (_, body) = send(&app, Method::GET, "/api/social/profile/owner", Some(&owner), None).await;
    assert_eq!(body["data"]["isOwnProfile"], true);
    assert_eq!(body["data"]["canViewContent"], true);
}

#[tokio::test]
async fn profile_save_validates_input() {
    let (app, _) = test_app().await;
    let token = token_for("u1");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/social/profile/me",
        Some(&token),
        Some(json!({"displayName": "", "bio": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/social/profile/me",
        Some(&token),
        Some(json!({"displayName": "Giulia", "bio": "Ciao", "socialLinks": {"github": "https://github.com/giulia"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["displayName"], "Giulia");

    let (_, body) = send(&app, Method::GET, "/api/social/profile/me", Some(&token), None).await;
    assert_eq!(body["data"]["bio"], "Ciao");
    assert_eq!(body["data"]["socialLinks"]["github"], "https://github.com/giulia");
}

#[tokio::test]
async fn collection_viewer_positions_cursor() {
    let (app, state) = test_app().await;
    state
        .db
        .commit(
            WriteBatch::new()
                .set(DocPath::video("v1").unwrap(), json!({"userId": "o", "url": "https://cdn.example.com/v1.mp4"}))
                .set(DocPath::post("p1").unwrap(), json!({"userId": "o", "imageUrl": "https://cdn.example.com/p1.jpg"}))
                .set(DocPath::collection("c1").unwrap(), json!({"name": "Mix", "userId": "o", "items": ["v1", "p1"]})),
        )
        .await
        .unwrap();

    let (status, body) = send(&app, Method::GET, "/api/social/collections/c1?index=1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["type"], "video");
    assert_eq!(body["data"]["items"][1]["type"], "post");
    assert_eq!(body["data"]["viewer"]["currentIndex"], 1);
    assert_eq!(body["data"]["viewer"]["autoplay"], false);
    assert_eq!(body["data"]["viewer"]["position"], "2 / 2");

    let (_, body) = send(&app, Method::GET, "/api/social/collections/c1?index=0", None, None).await;
    assert_eq!(body["data"]["viewer"]["autoplay"], true);

    let (status, _) = send(&app, Method::GET, "/api/social/collections/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn video_like_and_owner_checks() {
    let (app, state) = test_app().await;
    state
        .db
        .commit(WriteBatch::new().set(
            DocPath::video("v1").unwrap(),
            json!({"userId": "owner", "url": "https://cdn.example.com/v1.mp4", "title": "Prima"}),
        ))
        .await
        .unwrap();
    let viewer = token_for("viewer");
    let owner = token_for("owner");

    let (_, body) = send(&app, Method::POST, "/api/social/videos/v1/like", Some(&viewer), None).await;
    assert_eq!(body["data"]["isLiked"], true);
    assert_eq!(body["data"]["likesCount"], 1);

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/social/videos/v1/comments",
        Some(&viewer),
        Some(json!({"text": "Stupendo"})),
    )
    .await;
    assert_eq!(body["data"]["text"], "Stupendo");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/social/videos/v1",
        Some(&viewer),
        Some(json!({"title": "Hack"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = send(&app, Method::GET, "/api/social/videos/v1", Some(&owner), None).await;
    assert_eq!(body["data"]["isOwner"], true);
    assert_eq!(body["data"]["likesCount"], 1);
    assert_eq!(body["data"]["comments"][0]["relativeTime"], "meno di un minuto fa");

    let (status, _) = send(&app, Method::DELETE, "/api/social/videos/v1", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/social/videos/v1", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_revokes_token() {
    let (app, _) = test_app().await;
    let token = token_for("u1");

    let (_, body) = send(&app, Method::GET, "/api/social/navigation/sidebar", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 5);

    let (status, body) = send(&app, Method::POST, "/api/social/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["redirect"], "/login");

    let (status, _) = send(&app, Method::GET, "/api/social/profile/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use tokio::time::{interval, Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rainbow_social::{
    config::Config, routes, services::Database, state::AppState, utils::middleware::prune_rate_limiter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rainbow-Social service...");

    // 初始化数据库连接
    let db = Arc::new(Database::new(&config).await?);
    if let Err(e) = db.verify_connection().await {
        error!("Database connection failed: {}", e);
        return Err(anyhow::anyhow!("Database connection failed"));
    }
    info!("Database connection established successfully");

    // 创建应用状态
    let app_state = Arc::new(AppState::new(&config, db).await?);

    if app_state.is_production() && config.uses_memory_backend() {
        warn!("Running in production with the in-memory store, data will not persist");
    }

    // 启动后台任务
    start_background_tasks(app_state.clone());

    // 配置 CORS
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .split(',')
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(origins);

    let app = routes::app(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // 启动主服务器
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

fn start_background_tasks(app_state: Arc<AppState>) {
    info!("Starting background tasks...");

    // 清理过期的注销令牌、关注状态缓存和闲置的限流条目
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let tokens = app_state.auth_service.purge_revoked();
            let statuses = app_state.follow_service.status_cache().purge_expired();
            let clients = prune_rate_limiter(&app_state.rate_limiter);
            if tokens > 0 || statuses > 0 || clients > 0 {
                info!(
                    "Purged {} revoked tokens, {} cached follow statuses and {} idle rate-limit entries",
                    tokens, statuses, clients
                );
            }
        }
    });
}

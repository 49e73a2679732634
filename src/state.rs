use std::sync::Arc;

use crate::{
    config::Config,
    error::Result,
    services::{
        auth::AuthService,
        database::Database,
        follow::FollowService,
        media::MediaService,
        profile::ProfileService,
    },
    utils::middleware::{build_rate_limiter, KeyedRateLimiter},
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 认证服务
    pub auth_service: AuthService,

    /// 关注服务
    pub follow_service: FollowService,

    /// 媒体服务
    pub media_service: MediaService,

    /// 个人资料服务
    pub profile_service: ProfileService,

    /// 按 IP 限流
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

impl AppState {
    /// 在已建立的数据库连接上初始化所有服务
    pub async fn new(config: &Config, db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            auth_service: AuthService::new(config).await?,
            follow_service: FollowService::new(db.clone()).await?,
            media_service: MediaService::new(db.clone()).await?,
            profile_service: ProfileService::new(db.clone()).await?,
            rate_limiter: Arc::new(build_rate_limiter(config.rate_limit_requests)),
            db,
        })
    }

    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }
}

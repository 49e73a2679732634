use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Database configuration
    pub database_backend: String,
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,
    pub transaction_max_attempts: u32,

    // Authentication configuration
    pub jwt_secret: String,

    // Content settings
    pub max_bio_length: usize,
    pub max_comment_length: usize,
    pub default_page_size: usize,

    // Follow status cache
    pub follow_status_ttl_secs: u64,

    // Media placeholders
    pub placeholder_video_url: String,
    pub placeholder_image_url: String,

    // Rate limiting
    pub rate_limit_requests: u32,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "rainbow_social=debug,tower_http=debug".to_string()),

            database_backend: env::var("DATABASE_BACKEND")
                .unwrap_or_else(|_| "surreal".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "rainbow".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "social".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),
            transaction_max_attempts: env::var("TRANSACTION_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,

            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,

            max_bio_length: env::var("MAX_BIO_LENGTH")
                .unwrap_or_else(|_| "160".to_string())
                .parse()?,
            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()?,
            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,

            follow_status_ttl_secs: env::var("FOLLOW_STATUS_TTL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            placeholder_video_url: env::var("PLACEHOLDER_VIDEO_URL")
                .unwrap_or_else(|_| "/placeholder-video.png".to_string()),
            placeholder_image_url: env::var("PLACEHOLDER_IMAGE_URL")
                .unwrap_or_else(|_| "/placeholder-image.png".to_string()),

            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn uses_memory_backend(&self) -> bool {
        self.database_backend.eq_ignore_ascii_case("memory")
    }
}

/// 开发与测试默认值：内存存储，固定密钥
impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "rainbow_social=debug,tower_http=debug".to_string(),
            database_backend: "memory".to_string(),
            database_url: "localhost:8000".to_string(),
            database_namespace: "rainbow".to_string(),
            database_name: "social".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),
            transaction_max_attempts: 5,
            jwt_secret: "development-secret".to_string(),
            max_bio_length: 160,
            max_comment_length: 2000,
            default_page_size: 20,
            follow_status_ttl_secs: 30,
            placeholder_video_url: "/placeholder-video.png".to_string(),
            placeholder_image_url: "/placeholder-image.png".to_string(),
            rate_limit_requests: 100,
            cors_allowed_origins: "http://localhost:5173".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_memory_backend() {
        let config = Config::default();
        assert!(config.uses_memory_backend());
        assert!(config.is_development());
        assert!(!config.is_production());
    }
}

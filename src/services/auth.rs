use crate::{config::Config, error::{AppError, Result}};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 身份令牌校验与注销
///
/// 令牌由外部认证服务签发（HS256），这里只做校验。注销的令牌记录到
/// 过期时间为止。
#[derive(Clone)]
pub struct AuthService {
    config: Config,
    revoked: Arc<DashMap<String, i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // 用户ID
    pub exp: i64,           // 过期时间
    pub iat: i64,           // 签发时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// 匿名会话
    #[serde(default)]
    pub anonymous: bool,
}

/// 已认证的请求方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub is_anonymous: bool,
    #[serde(skip)]
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthService {
    pub async fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            revoked: Arc::new(DashMap::new()),
        })
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    /// 校验令牌并解析出用户
    pub fn authenticate(&self, token: &str) -> Result<User> {
        if self.is_revoked(token) {
            return Err(AppError::Authentication("Token revoked".to_string()));
        }

        let claims = self.verify_jwt(token)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AppError::Authentication("Invalid token expiry".to_string()))?;

        Ok(User {
            id: claims.sub,
            display_name: claims.name,
            photo_url: claims.picture,
            is_anonymous: claims.anonymous,
            token: token.to_string(),
            expires_at,
        })
    }

    /// 注销令牌直到其过期
    pub fn revoke(&self, user: &User) {
        info!("Revoking session token for user: {}", user.id);
        self.revoked.insert(user.token.clone(), user.expires_at.timestamp());
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        match self.revoked.get(token) {
            Some(exp) => *exp > Utc::now().timestamp(),
            None => false,
        }
    }

    /// 清理已过期的注销记录
    pub fn purge_revoked(&self) -> usize {
        let now = Utc::now().timestamp();
        let before = self.revoked.len();
        self.revoked.retain(|_, exp| *exp > now);
        before - self.revoked.len()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .ok_or_else(|| AppError::Authentication("Utente non autenticato".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: i64) -> String {
        let claims = Claims {
            sub: "u1".into(),
            exp,
            iat: Utc::now().timestamp(),
            name: Some("Giulia".into()),
            picture: None,
            anonymous: false,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[tokio::test]
    async fn authenticates_valid_token() {
        let service = AuthService::new(&Config::default()).await.unwrap();
        let exp = Utc::now().timestamp() + 3600;
        let user = service.authenticate(&token("development-secret", exp)).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.display_name.as_deref(), Some("Giulia"));
        assert!(!user.is_anonymous);
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let service = AuthService::new(&Config::default()).await.unwrap();
        let exp = Utc::now().timestamp() + 3600;
        assert!(service.authenticate(&token("other", exp)).is_err());
    }

    #[tokio::test]
    async fn revoked_tokens_are_rejected() {
        let service = AuthService::new(&Config::default()).await.unwrap();
        let raw = token("development-secret", Utc::now().timestamp() + 3600);
        let user = service.authenticate(&raw).unwrap();

        service.revoke(&user);
        assert!(service.is_revoked(&raw));
        assert!(service.authenticate(&raw).is_err());
        assert_eq!(service.purge_revoked(), 0);
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::{AuthUser, Claims},
};

/// 用户目录协作方（Rainbow-Auth）
///
/// The comment service never stores credentials or accounts; it resolves
/// user identities through this boundary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_user(&self, user_id: &str) -> Result<AuthUser>;
}

#[derive(Debug, Deserialize)]
struct DirectoryUserResponse {
    id: String,
    username: String,
    is_active: bool,
}

/// Rainbow-Auth HTTP client.
pub struct HttpIdentityProvider {
    http_client: Client,
    base_url: String,
    service_token: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.auth_service_url.clone(),
            service_token: config.auth_service_token.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn fetch_user(&self, user_id: &str) -> Result<AuthUser> {
        let url = format!("{}/api/users/{}", self.base_url, user_id);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.service_token))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch user from Rainbow-Auth: {}", e);
                AppError::ExternalService("Failed to reach Rainbow-Auth".to_string())
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::Authentication("Unknown user".to_string()));
        }
        if !response.status().is_success() {
            warn!("Rainbow-Auth returned error status: {}", response.status());
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let user: DirectoryUserResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Rainbow-Auth response: {}", e);
            AppError::Authentication("Invalid response from Rainbow-Auth".to_string())
        })?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            is_active: user.is_active,
        })
    }
}

#[derive(Debug, Clone)]
struct CachedUser {
    user: AuthUser,
    expires_at: DateTime<Utc>,
}

/// 认证服务
///
/// Verifies handshake/request credentials locally (HS256) and resolves the
/// user through the identity collaborator, with a short in-process cache.
#[derive(Clone)]
pub struct AuthService {
    config: Config,
    provider: Arc<dyn IdentityProvider>,
    user_cache: Arc<RwLock<HashMap<String, CachedUser>>>,
}

impl AuthService {
    pub fn new(config: &Config, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config: config.clone(),
            provider,
            user_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Verify a bearer credential and return its claims.
    pub fn verify_credential(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("Credential verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("Credential verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    /// Resolve a user id to its directory record.
    pub async fn find_user(&self, user_id: &str) -> Result<AuthUser> {
        if let Some(cached) = self.get_cached_user(user_id).await {
            debug!("Using cached user data for user: {}", user_id);
            return Ok(cached);
        }

        let user = self.provider.fetch_user(user_id).await?;
        self.cache_user(user.clone()).await;
        Ok(user)
    }

    /// Full credential check used by the HTTP middleware and the WebSocket
    /// handshake: verify the token, resolve the user, reject inactive
    /// accounts.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser> {
        let claims = self.verify_credential(token)?;
        let user = self.find_user(&claims.sub).await?;

        if !user.is_active {
            return Err(AppError::Authentication("Account is inactive".to_string()));
        }

        Ok(user)
    }

    /// Username for display/broadcast purposes. Falls back to the raw id
    /// when the directory is unavailable so a mutation never fails on a
    /// cosmetic lookup.
    pub async fn username_of(&self, user_id: &str) -> String {
        match self.find_user(user_id).await {
            Ok(user) => user.username,
            Err(e) => {
                warn!("Failed to resolve username for {}: {}", user_id, e);
                user_id.to_string()
            }
        }
    }

    async fn get_cached_user(&self, user_id: &str) -> Option<AuthUser> {
        let cache = self.user_cache.read().await;
        if let Some(cached) = cache.get(user_id) {
            if cached.expires_at > Utc::now() {
                return Some(cached.user.clone());
            }
        }
        None
    }

    async fn cache_user(&self, user: AuthUser) {
        let mut cache = self.user_cache.write().await;
        cache.insert(
            user.id.clone(),
            CachedUser {
                user,
                expires_at: Utc::now() + Duration::minutes(self.config.user_cache_ttl_minutes),
            },
        );
    }

    #[cfg(test)]
    pub(crate) async fn cached_user_count(&self) -> usize {
        self.user_cache.read().await.len()
    }

    /// 清理过期缓存
    pub async fn cleanup_expired_cache(&self) {
        let now = Utc::now();
        let mut cache = self.user_cache.write().await;
        let before_count = cache.len();
        cache.retain(|_, cached| cached.expires_at > now);
        debug!(
            "Cleaned {} expired user cache entries",
            before_count - cache.len()
        );
    }
}

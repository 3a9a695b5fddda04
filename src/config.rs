use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Authentication configuration
    pub auth_service_url: String,
    pub auth_service_token: String,
    pub jwt_secret: String,
    pub user_cache_ttl_minutes: i64,

    // Content settings
    pub max_comment_length: usize,
    pub default_comments_per_page: usize,
    pub max_comments_per_page: usize,

    // WebSocket settings
    pub ws_send_buffer: usize,

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
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            auth_service_url: env::var("AUTH_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            auth_service_token: env::var("AUTH_SERVICE_TOKEN")
                .unwrap_or_else(|_| "default-token".to_string()),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            user_cache_ttl_minutes: env::var("USER_CACHE_TTL_MINUTES")
                .unwrap_or_else(|_| "15".to_string())
                .parse()?,

            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()?,
            default_comments_per_page: env::var("DEFAULT_COMMENTS_PER_PAGE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            max_comments_per_page: env::var("MAX_COMMENTS_PER_PAGE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            ws_send_buffer: env::var("WS_SEND_BUFFER")
                .unwrap_or_else(|_| "64".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
impl Config {
    /// 测试用配置，不读取环境变量
    pub fn for_tests() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            auth_service_url: "http://localhost:8080".to_string(),
            auth_service_token: "test-token".to_string(),
            jwt_secret: "test-secret".to_string(),
            user_cache_ttl_minutes: 15,
            max_comment_length: 2000,
            default_comments_per_page: 20,
            max_comments_per_page: 100,
            ws_send_buffer: 64,
            cors_allowed_origins: "http://localhost:3001".to_string(),
        }
    }
}

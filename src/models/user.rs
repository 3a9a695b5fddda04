use serde::{Deserialize, Serialize};

/// 认证用户（由 Rainbow-Auth 解析）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub is_active: bool,
}

/// JWT claims issued by the auth collaborator.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub exp: i64,    // 过期时间
    pub iat: i64,    // 签发时间
}

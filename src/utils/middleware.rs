use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::{error::AppError, models::user::AuthUser, state::AppState};

/// 认证中间件
///
/// Resolves a Bearer credential into an `AuthUser` and stashes it in the
/// request extensions. An invalid or missing token is not fatal here; the
/// request continues unauthenticated and each handler decides whether auth
/// is required.
pub async fn auth_middleware(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    if let Some(auth_header) = headers.get("authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                match app_state.auth_service.authenticate(token).await {
                    Ok(user) => {
                        debug!("Authenticated user: {} ({})", user.username, user.id);
                        request.extensions_mut().insert(user);
                    }
                    Err(e) => {
                        debug!("Request authentication failed: {}", e);
                    }
                }
            }
        }
    }

    Ok(next.run(request).await)
}

/// 可选认证提取器
pub struct OptionalAuth(pub Option<AuthUser>);

#[async_trait::async_trait]
impl<S> axum::extract::FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<AuthUser>().cloned();
        Ok(OptionalAuth(user))
    }
}

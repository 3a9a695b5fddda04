use crate::{
    error::{AppError, Result},
    models::comment::{CreateCommentRequest, ListQuery, SortBy, UpdateCommentRequest},
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_comments))
        .route("/", post(create_comment))
        .route("/:id/replies", get(get_replies))
        .route("/:id/reply", post(reply_to_comment))
        .route("/:id", put(update_comment))
        .route("/:id", delete(delete_comment))
        .route("/:id/like", post(toggle_like))
        .route("/:id/dislike", post(toggle_dislike))
}

fn paging(state: &AppState, query: &ListQuery, default_sort: SortBy) -> (usize, usize, SortBy) {
    (
        query.page.unwrap_or(1),
        query.limit.unwrap_or(state.config.default_comments_per_page),
        query.sort_by.unwrap_or(default_sort),
    )
}

async fn get_comments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let (page, limit, sort) = paging(&state, &query, SortBy::Newest);
    let viewer = user.as_ref().map(|u| u.id.as_str());

    let result = state
        .comment_service
        .list_roots(page, limit, sort, viewer)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": result
    })))
}

async fn get_replies(
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<String>,
    Query(query): Query<ListQuery>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    // Replies default to oldest-first.
    let (page, limit, sort) = paging(&state, &query, SortBy::Oldest);
    let viewer = user.as_ref().map(|u| u.id.as_str());

    let result = state
        .comment_service
        .list_replies(&comment_id, page, limit, sort, viewer)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": result
    })))
}

async fn create_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    request.validate().map_err(AppError::ValidatorError)?;

    let comment = state
        .comment_service
        .create_comment(&user.id, &request.content, None)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Comment created successfully",
        "data": comment
    })))
}

async fn reply_to_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(parent_id): Path<String>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    request.validate().map_err(AppError::ValidatorError)?;

    let comment = state
        .comment_service
        .create_comment(&user.id, &request.content, Some(&parent_id))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Reply created successfully",
        "data": comment
    })))
}

async fn update_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(comment_id): Path<String>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    request.validate().map_err(AppError::ValidatorError)?;

    let comment = state
        .comment_service
        .update_comment(&comment_id, &user.id, &request.content)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Comment updated successfully",
        "data": comment
    })))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(comment_id): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    state
        .comment_service
        .delete_comment(&comment_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Comment deleted successfully"
    })))
}

async fn toggle_like(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(comment_id): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let (comment, action) = state
        .comment_service
        .toggle_like(&comment_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Comment {} successfully", action),
        "data": comment,
        "action": action
    })))
}

async fn toggle_dislike(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(comment_id): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let (comment, action) = state
        .comment_service
        .toggle_dislike(&comment_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Comment {} successfully", action),
        "data": comment,
        "action": action
    })))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// 评论的反应类型
///
/// Each (comment, user) pair carries at most one reaction. Storing the
/// reaction as a single tagged value (instead of two membership sets) makes
/// the like/dislike mutual exclusion hold by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

/// Stored comment record.
///
/// `parent_id` is immutable after creation; `is_deleted` is sticky. Reply
/// counts are never stored here, they are derived from non-deleted children
/// at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub parent_id: Option<String>,
    /// user_id -> reaction, at most one entry per user
    pub reactions: HashMap<String, ReactionKind>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(author_id: &str, content: &str, parent_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            author_id: author_id.to_string(),
            parent_id,
            reactions: HashMap::new(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn reaction_of(&self, user_id: &str) -> Option<ReactionKind> {
        self.reactions.get(user_id).copied()
    }

    pub fn like_count(&self) -> usize {
        self.reactions
            .values()
            .filter(|r| **r == ReactionKind::Like)
            .count()
    }

    pub fn dislike_count(&self) -> usize {
        self.reactions
            .values()
            .filter(|r| **r == ReactionKind::Dislike)
            .count()
    }

    pub fn has_liked(&self, user_id: &str) -> bool {
        self.reaction_of(user_id) == Some(ReactionKind::Like)
    }

    pub fn has_disliked(&self, user_id: &str) -> bool {
        self.reaction_of(user_id) == Some(ReactionKind::Dislike)
    }
}

/// 列表排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Newest,
    Oldest,
    MostLiked,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<SortBy>,
}

/// 评论作者信息（来自 Rainbow-Auth）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: String,
    pub username: String,
}

/// Canonical wire representation of a comment.
///
/// This is the single shape every caller sees: HTTP responses and broadcast
/// payloads are both built from it and must never diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub content: String,
    pub author: CommentAuthor,
    pub parent_id: Option<String>,
    pub like_count: usize,
    pub dislike_count: usize,
    pub reply_count: usize,
    pub has_liked: bool,
    pub has_disliked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentPage {
    pub comments: Vec<CommentView>,
    pub pagination: Pagination,
}

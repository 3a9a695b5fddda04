use std::sync::Arc;
use tracing::debug;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        comment::{
            Comment, CommentAuthor, CommentPage, CommentView, Pagination, ReactionKind, SortBy,
        },
        event::CommentEvent,
    },
    services::{auth::AuthService, realtime::EventBroadcaster, store::CommentStore},
};

/// Outcome of a soft delete, carried into the broadcast payload.
#[derive(Debug, Clone)]
pub struct DeletedComment {
    pub id: String,
    pub parent_id: Option<String>,
    /// Refreshed parent snapshot (reply count recomputed) when the deleted
    /// comment was a reply.
    pub parent: Option<CommentView>,
}

/// 评论服务
///
/// Orchestrates creation, threading validation, ownership checks and
/// soft-deletion. Every successful mutation emits exactly one broadcast
/// event built from the same canonical view the HTTP caller receives.
#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn CommentStore>,
    broadcaster: Arc<EventBroadcaster>,
    auth_service: AuthService,
    config: Config,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn CommentStore>,
        broadcaster: Arc<EventBroadcaster>,
        auth_service: AuthService,
        config: &Config,
    ) -> Self {
        Self {
            store,
            broadcaster,
            auth_service,
            config: config.clone(),
        }
    }

    pub async fn create_comment(
        &self,
        author_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<CommentView> {
        let content = self.validate_content(content)?;

        if let Some(parent_id) = parent_id {
            if !self.store.exists(parent_id).await? {
                return Err(AppError::NotFound(
                    "Parent comment not found or has been deleted".to_string(),
                ));
            }
        }

        let record = Comment::new(author_id, &content, parent_id.map(String::from));
        let record = self.store.insert(record).await?;
        debug!("Comment created: {} by user: {}", record.id, author_id);

        match parent_id {
            Some(parent_id) => {
                let reply = self.format_comment(&record, None).await?;
                self.broadcaster.emit(CommentEvent::ReplyCreated {
                    reply,
                    parent_id: parent_id.to_string(),
                });
            }
            None => {
                let view = self.format_comment(&record, None).await?;
                self.broadcaster.emit(CommentEvent::Created(view));
            }
        }

        self.format_comment(&record, Some(author_id)).await
    }

    pub async fn update_comment(
        &self,
        comment_id: &str,
        requester_id: &str,
        content: &str,
    ) -> Result<CommentView> {
        let record = self
            .store
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if record.is_deleted {
            return Err(AppError::invalid_state("Cannot update deleted comment"));
        }
        if record.author_id != requester_id {
            return Err(AppError::forbidden("You can only update your own comments"));
        }

        let content = self.validate_content(content)?;
        let updated = self.store.update_content(comment_id, &content).await?;

        let view = self.format_comment(&updated, None).await?;
        self.broadcaster.emit(CommentEvent::Updated(view));

        self.format_comment(&updated, Some(requester_id)).await
    }

    pub async fn delete_comment(
        &self,
        comment_id: &str,
        requester_id: &str,
    ) -> Result<DeletedComment> {
        let record = self
            .store
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if record.is_deleted {
            return Err(AppError::invalid_state("Comment already deleted"));
        }
        if record.author_id != requester_id {
            return Err(AppError::forbidden("You can only delete your own comments"));
        }

        let deleted = self.store.set_deleted(comment_id).await?;

        // Recompute the parent snapshot after the delete so its reply count
        // reflects the removal.
        let parent = match deleted.parent_id.as_deref() {
            Some(parent_id) => match self.store.find_by_id(parent_id).await? {
                Some(parent_record) if !parent_record.is_deleted => {
                    Some(self.format_comment(&parent_record, None).await?)
                }
                _ => None,
            },
            None => None,
        };

        let author = CommentAuthor {
            id: requester_id.to_string(),
            username: self.auth_service.username_of(requester_id).await,
        };

        let result = DeletedComment {
            id: deleted.id.clone(),
            parent_id: deleted.parent_id.clone(),
            parent: parent.clone(),
        };

        self.broadcaster.emit(CommentEvent::Deleted {
            id: deleted.id,
            author,
            parent_id: deleted.parent_id,
            parent,
        });

        Ok(result)
    }

    pub async fn toggle_like(
        &self,
        comment_id: &str,
        user_id: &str,
    ) -> Result<(CommentView, &'static str)> {
        self.toggle_reaction(comment_id, user_id, ReactionKind::Like)
            .await
    }

    pub async fn toggle_dislike(
        &self,
        comment_id: &str,
        user_id: &str,
    ) -> Result<(CommentView, &'static str)> {
        self.toggle_reaction(comment_id, user_id, ReactionKind::Dislike)
            .await
    }

    async fn toggle_reaction(
        &self,
        comment_id: &str,
        user_id: &str,
        kind: ReactionKind,
    ) -> Result<(CommentView, &'static str)> {
        let (record, action) = self.store.toggle_reaction(comment_id, user_id, kind).await?;
        debug!("Comment {}: {} by user: {}", record.id, action.as_str(), user_id);

        let user = CommentAuthor {
            id: user_id.to_string(),
            username: self.auth_service.username_of(user_id).await,
        };
        let broadcast_view = self.format_comment(&record, None).await?;
        let event = match kind {
            ReactionKind::Like => CommentEvent::LikeUpdated {
                comment: broadcast_view,
                action: action.as_str().to_string(),
                user,
            },
            ReactionKind::Dislike => CommentEvent::DislikeUpdated {
                comment: broadcast_view,
                action: action.as_str().to_string(),
                user,
            },
        };
        self.broadcaster.emit(event);

        let view = self.format_comment(&record, Some(user_id)).await?;
        Ok((view, action.as_str()))
    }

    pub async fn list_roots(
        &self,
        page: usize,
        limit: usize,
        sort: SortBy,
        viewer: Option<&str>,
    ) -> Result<CommentPage> {
        let (page, limit) = self.clamp_paging(page, limit);
        let (records, total) = self.store.find_roots(sort, page, limit).await?;
        self.build_page(records, page, limit, total, viewer).await
    }

    pub async fn list_replies(
        &self,
        parent_id: &str,
        page: usize,
        limit: usize,
        sort: SortBy,
        viewer: Option<&str>,
    ) -> Result<CommentPage> {
        if !self.store.exists(parent_id).await? {
            return Err(AppError::NotFound(
                "Comment not found or has been deleted".to_string(),
            ));
        }

        let (page, limit) = self.clamp_paging(page, limit);
        let (records, total) = self.store.find_replies(parent_id, sort, page, limit).await?;
        self.build_page(records, page, limit, total, viewer).await
    }

    /// Canonicalize a record into the wire shape shared by API responses and
    /// broadcast payloads.
    pub async fn format_comment(
        &self,
        record: &Comment,
        viewer: Option<&str>,
    ) -> Result<CommentView> {
        let username = self.auth_service.username_of(&record.author_id).await;
        let reply_count = self.store.count_replies(&record.id).await?;

        Ok(CommentView {
            id: record.id.clone(),
            content: record.content.clone(),
            author: CommentAuthor {
                id: record.author_id.clone(),
                username,
            },
            parent_id: record.parent_id.clone(),
            like_count: record.like_count(),
            dislike_count: record.dislike_count(),
            reply_count,
            has_liked: viewer.map(|v| record.has_liked(v)).unwrap_or(false),
            has_disliked: viewer.map(|v| record.has_disliked(v)).unwrap_or(false),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    async fn build_page(
        &self,
        records: Vec<Comment>,
        page: usize,
        limit: usize,
        total: usize,
        viewer: Option<&str>,
    ) -> Result<CommentPage> {
        let mut comments = Vec::with_capacity(records.len());
        for record in &records {
            comments.push(self.format_comment(record, viewer).await?);
        }

        Ok(CommentPage {
            comments,
            pagination: Pagination::new(page, limit, total),
        })
    }

    fn clamp_paging(&self, page: usize, limit: usize) -> (usize, usize) {
        (
            page.max(1),
            limit.clamp(1, self.config.max_comments_per_page),
        )
    }

    fn validate_content(&self, content: &str) -> Result<String> {
        let trimmed = content.trim();
        let length = trimmed.chars().count();

        if length == 0 {
            return Err(AppError::validation("Comment content is required"));
        }
        if length > self.config.max_comment_length {
            return Err(AppError::Validation(format!(
                "Comment cannot exceed {} characters",
                self.config.max_comment_length
            )));
        }

        Ok(trimmed.to_string())
    }
}

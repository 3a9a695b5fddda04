use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::{
    error::{AppError, Result},
    models::comment::{Comment, ReactionKind, SortBy},
    services::reactions::{self, ReactionAction},
};

/// Abstract comment repository.
///
/// Mutations on a single comment are serialized inside the store via atomic
/// conditional updates; callers never do read-modify-write across calls. A
/// store whose conditional update can lose a race reports `Conflict`, which
/// the caller may retry.
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, record: Comment) -> Result<Comment>;

    /// Fetch by id, including soft-deleted records.
    async fn find_by_id(&self, id: &str) -> Result<Option<Comment>>;

    /// True when the comment exists and is not soft-deleted.
    async fn exists(&self, id: &str) -> Result<bool>;

    async fn find_roots(
        &self,
        sort: SortBy,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Comment>, usize)>;

    async fn find_replies(
        &self,
        parent_id: &str,
        sort: SortBy,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Comment>, usize)>;

    /// Replace content and bump `updated_at`. Fails `InvalidState` when the
    /// record is deleted, checked under the same lock as the write.
    async fn update_content(&self, id: &str, content: &str) -> Result<Comment>;

    /// Sticky soft delete. Fails `InvalidState` when already deleted.
    async fn set_deleted(&self, id: &str) -> Result<Comment>;

    /// Atomically toggle the (comment, user) reaction state.
    async fn toggle_reaction(
        &self,
        id: &str,
        user_id: &str,
        kind: ReactionKind,
    ) -> Result<(Comment, ReactionAction)>;

    /// Count of non-deleted children, computed on read.
    async fn count_replies(&self, parent_id: &str) -> Result<usize>;
}

/// In-memory store backed by DashMap.
///
/// Conditional mutations run under the per-entry guard, so a reaction toggle
/// racing a delete observes either the pre- or post-delete state, never a
/// torn one.
#[derive(Default)]
pub struct MemoryCommentStore {
    comments: DashMap<String, Comment>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_filtered<F>(&self, filter: F) -> Vec<Comment>
    where
        F: Fn(&Comment) -> bool,
    {
        self.comments
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn sort_comments(items: &mut [Comment], sort: SortBy, ties_newest_first: bool) {
        match sort {
            SortBy::Newest => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortBy::Oldest => items.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortBy::MostLiked => items.sort_by(|a, b| {
                b.like_count().cmp(&a.like_count()).then_with(|| {
                    if ties_newest_first {
                        b.created_at.cmp(&a.created_at)
                    } else {
                        a.created_at.cmp(&b.created_at)
                    }
                })
            }),
        }
    }

    fn paginate(mut items: Vec<Comment>, page: usize, limit: usize) -> (Vec<Comment>, usize) {
        let total = items.len();
        let start = (page.max(1) - 1).saturating_mul(limit);
        let items = if start >= total {
            Vec::new()
        } else {
            items.drain(start..).take(limit).collect()
        };
        (items, total)
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn insert(&self, record: Comment) -> Result<Comment> {
        self.comments.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Comment>> {
        Ok(self.comments.get(id).map(|entry| entry.value().clone()))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self
            .comments
            .get(id)
            .map(|entry| !entry.value().is_deleted)
            .unwrap_or(false))
    }

    async fn find_roots(
        &self,
        sort: SortBy,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Comment>, usize)> {
        let mut items = self.collect_filtered(|c| c.parent_id.is_none() && !c.is_deleted);
        // Root listings break most_liked ties newest-first.
        Self::sort_comments(&mut items, sort, true);
        Ok(Self::paginate(items, page, limit))
    }

    async fn find_replies(
        &self,
        parent_id: &str,
        sort: SortBy,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Comment>, usize)> {
        let mut items =
            self.collect_filtered(|c| c.parent_id.as_deref() == Some(parent_id) && !c.is_deleted);
        // Reply listings break most_liked ties oldest-first.
        Self::sort_comments(&mut items, sort, false);
        Ok(Self::paginate(items, page, limit))
    }

    async fn update_content(&self, id: &str, content: &str) -> Result<Comment> {
        let mut entry = self
            .comments
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if entry.is_deleted {
            return Err(AppError::invalid_state("Cannot update deleted comment"));
        }

        entry.content = content.to_string();
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    async fn set_deleted(&self, id: &str) -> Result<Comment> {
        let mut entry = self
            .comments
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if entry.is_deleted {
            return Err(AppError::invalid_state("Comment already deleted"));
        }

        entry.is_deleted = true;
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    async fn toggle_reaction(
        &self,
        id: &str,
        user_id: &str,
        kind: ReactionKind,
    ) -> Result<(Comment, ReactionAction)> {
        let mut entry = self
            .comments
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if entry.is_deleted {
            return Err(AppError::invalid_state("Cannot react to deleted comment"));
        }

        let current = entry.reaction_of(user_id);
        let (next, action) = reactions::toggle(current, kind);
        match next {
            Some(kind) => {
                entry.reactions.insert(user_id.to_string(), kind);
            }
            None => {
                entry.reactions.remove(user_id);
            }
        }
        Ok((entry.value().clone(), action))
    }

    async fn count_replies(&self, parent_id: &str) -> Result<usize> {
        Ok(self
            .comments
            .iter()
            .filter(|entry| {
                let c = entry.value();
                c.parent_id.as_deref() == Some(parent_id) && !c.is_deleted
            })
            .count())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::comment::{CommentAuthor, CommentView};

/// 广播事件信封
///
/// Every message delivered over a live connection has this exact shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Domain events emitted by the comment service, one per mutation.
#[derive(Debug, Clone)]
pub enum CommentEvent {
    Created(CommentView),
    ReplyCreated {
        reply: CommentView,
        parent_id: String,
    },
    Updated(CommentView),
    Deleted {
        id: String,
        author: CommentAuthor,
        parent_id: Option<String>,
        /// Refreshed parent snapshot so clients can update reply counts
        /// without a separate fetch. Absent for root comments.
        parent: Option<CommentView>,
    },
    LikeUpdated {
        comment: CommentView,
        action: String,
        user: CommentAuthor,
    },
    DislikeUpdated {
        comment: CommentView,
        action: String,
        user: CommentAuthor,
    },
}

impl CommentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CommentEvent::Created(_) => "comment:created",
            CommentEvent::ReplyCreated { .. } => "comment:reply_created",
            CommentEvent::Updated(_) => "comment:updated",
            CommentEvent::Deleted { .. } => "comment:deleted",
            CommentEvent::LikeUpdated { .. } => "comment:like_updated",
            CommentEvent::DislikeUpdated { .. } => "comment:dislike_updated",
        }
    }

    pub fn into_envelope(self) -> EventEnvelope {
        let event = self.name().to_string();
        let data = match self {
            CommentEvent::Created(comment) => json!(comment),
            CommentEvent::ReplyCreated { reply, parent_id } => json!({
                "reply": reply,
                "parentId": parent_id,
            }),
            CommentEvent::Updated(comment) => json!(comment),
            CommentEvent::Deleted {
                id,
                author,
                parent_id,
                parent,
            } => {
                let mut data = json!({
                    "id": id,
                    "author": author,
                });
                // Root deletions carry no parent reference at all.
                if let Some(parent_id) = parent_id {
                    data["parentId"] = json!(parent_id);
                }
                if let Some(parent) = parent {
                    data["parentComment"] = json!(parent);
                }
                data
            }
            CommentEvent::LikeUpdated {
                comment,
                action,
                user,
            } => json!({
                "commentId": comment.id,
                "likeCount": comment.like_count,
                "dislikeCount": comment.dislike_count,
                "action": action,
                "user": user,
            }),
            CommentEvent::DislikeUpdated {
                comment,
                action,
                user,
            } => json!({
                "commentId": comment.id,
                "likeCount": comment.like_count,
                "dislikeCount": comment.dislike_count,
                "action": action,
                "user": user,
            }),
        };

        EventEnvelope {
            event,
            data,
            timestamp: Utc::now(),
        }
    }
}

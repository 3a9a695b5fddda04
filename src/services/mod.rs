pub mod auth;
pub mod comment;
pub mod reactions;
pub mod realtime;
pub mod store;

// 重新导出常用类型
pub use auth::{AuthService, HttpIdentityProvider, IdentityProvider};
pub use comment::CommentService;
pub use realtime::{ConnectionHandle, ConnectionRegistry, EventBroadcaster};
pub use store::{CommentStore, MemoryCommentStore};

pub mod comments;
pub mod websocket;

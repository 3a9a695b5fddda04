use std::sync::Arc;

use crate::{
    config::Config,
    services::{AuthService, CommentService, ConnectionRegistry, EventBroadcaster},
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 认证服务
    pub auth_service: AuthService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 实时连接注册表
    pub registry: Arc<ConnectionRegistry>,

    /// 事件广播服务
    pub broadcaster: Arc<EventBroadcaster>,
}

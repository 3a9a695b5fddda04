use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, Router},
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rainbow_comments::{
    config::Config,
    routes,
    services::{
        AuthService, CommentService, ConnectionRegistry, EventBroadcaster, HttpIdentityProvider,
        MemoryCommentStore,
    },
    state::AppState,
    utils,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "rainbow_comments=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rainbow-Comments service...");

    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化所有服务
    let identity_provider = Arc::new(HttpIdentityProvider::new(&config)?);
    let auth_service = AuthService::new(&config, identity_provider);

    // 定期清理过期的用户缓存
    let cache_cleaner = auth_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            cache_cleaner.cleanup_expired_cache().await;
        }
    });

    let store = Arc::new(MemoryCommentStore::new());
    let registry = Arc::new(ConnectionRegistry::new());
    // 广播器在启动时构造一次，通过句柄传给评论服务
    let broadcaster = Arc::new(EventBroadcaster::new(registry.clone()));
    let comment_service =
        CommentService::new(store, broadcaster.clone(), auth_service.clone(), &config);

    // 创建应用状态
    let app_state = Arc::new(AppState {
        config: config.clone(),
        auth_service,
        comment_service,
        registry,
        broadcaster,
    });

    // 配置 CORS
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(
            config
                .cors_allowed_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        );

    // 构建应用路由
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/comments", routes::comments::router())
        .nest("/api/ws", routes::websocket::router())
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            utils::middleware::auth_middleware,
        ))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "Rainbow-Comments is running!"
}

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use nooc_backend::{
    AppState,
    config::Config,
    middleware::{auth_middleware, log_errors},
    routes, storage,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'nooc_backend';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // 设置 Redis 客户端（渲染缓存失效用）
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");

    // 对象存储客户端
    let blob = storage::BlobStore::new(&config);

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        redis: Arc::new(redis_client),
        blob,
    };

    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        // 注册与浏览无需登录
        .route("/users/register", post(routes::user::register))
        .route("/rooms/home", get(routes::room::home))
        .route("/rooms/list", get(routes::room::list_rooms))
        .route("/rooms/get", get(routes::room::get_room))
        .route("/posts/get", get(routes::post::get_post));

    let protected_routes = Router::new()
        // 需要会话的用户路由
        .route("/users/update-name", put(routes::user::update_name))
        .route("/users/promote", post(routes::user::promote))
        .route("/users/logout", post(routes::user::logout))
        .route("/users/delete", post(routes::user::delete_account))
        .route("/users/me", get(routes::user::me))
        // 房间路由
        .route("/rooms/create", post(routes::room::create_room))
        .route("/rooms/delete", post(routes::room::delete_room))
        .route("/rooms/mine", get(routes::room::my_rooms))
        // 投稿路由。投稿带图片，请求体上限从配置放宽，默认的2MB不够用
        .route(
            "/posts/create",
            post(routes::post::create_post)
                .layer(DefaultBodyLimit::max(config.max_upload_bytes())),
        )
        .route("/posts/delete", post(routes::post::delete_post))
        .route("/posts/mine", get(routes::post::my_posts))
        // 评论与房间聊天路由
        .route("/comments/create", post(routes::comment::create_comment))
        .route("/comments/delete", post(routes::comment::delete_comment))
        .route(
            "/room-comments/create",
            post(routes::comment::create_room_comment),
        )
        .route(
            "/room-comments/delete",
            post(routes::comment::delete_room_comment),
        )
        // 应用认证中间件
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // 创建基础路由
    let router = Router::new().nest(
        &config.api_base_uri.clone(),
        Router::new().merge(public_routes).merge(protected_routes),
    );

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        let cors = CorsLayer::permissive();
        router.layer(cors)
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}

use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;
use std::sync::Arc;
use storage::BlobStore;

pub mod cache;
pub mod config;
pub mod middleware;
pub mod storage;
pub mod utils;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub blob: BlobStore,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    /// 测试用应用状态：连接池和Redis客户端都是惰性的，
    /// 指向无人监听的端口，不触碰任何真实服务。
    pub fn state() -> AppState {
        let config = Config {
            database_url: "postgres://postgres@127.0.0.1:59999/nooc_test".to_string(),
            redis_url: "redis://127.0.0.1:59998/".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            api_base_uri: "/api".to_string(),
            blob_store_url: "http://127.0.0.1:59997/blobs".to_string(),
            blob_store_token: "test-token".to_string(),
            admin_master_password: "master".to_string(),
            session_expiration_days: 365,
            max_upload_size_mb: 1000,
        };
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool");
        let redis = redis::Client::open(config.redis_url.clone()).expect("redis client");
        AppState {
            pool,
            blob: BlobStore::new(&config),
            redis: Arc::new(redis),
            config,
        }
    }
}

use redis::{AsyncCommands, Client as RedisClient};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

// 渲染缓存相关的常量
const RENDER_CACHE_PREFIX: &str = "render:"; // 渲染缓存前缀
pub const ROOM_PAGE_CACHE_EXPIRE: u64 = 300; // 房间页缓存过期时间，单位秒

pub fn route_key(path: &str) -> String {
    format!("{}{}", RENDER_CACHE_PREFIX, path)
}

/// 变更操作之后使对应路由的渲染缓存失效。
/// 失败只记录日志，不影响请求本身。
pub async fn invalidate(redis: &Arc<RedisClient>, paths: &[&str]) {
    if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
        for path in paths {
            let _: Result<(), redis::RedisError> = conn.del(route_key(path)).await;
            tracing::debug!("Invalidated render cache: {}", path);
        }
    }
}

pub async fn get_json<T: DeserializeOwned>(redis: &Arc<RedisClient>, path: &str) -> Option<T> {
    let mut conn = redis.get_multiplexed_async_connection().await.ok()?;
    let cached: redis::RedisResult<String> = conn.get(route_key(path)).await;

    if let Ok(json_str) = cached {
        if let Ok(value) = serde_json::from_str::<T>(&json_str) {
            tracing::debug!("Get render cache: {}", path);
            return Some(value);
        }
    }
    None
}

pub async fn set_json<T: Serialize>(
    redis: &Arc<RedisClient>,
    path: &str,
    value: &T,
    expire_secs: u64,
) {
    if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
        if let Ok(json_str) = serde_json::to_string(value) {
            let _: Result<(), redis::RedisError> =
                conn.set_ex(route_key(path), json_str, expire_secs).await;
            tracing::debug!("Set render cache: {}", path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_key_format() {
        assert_eq!(route_key("/room/3"), "render:/room/3");
        assert_eq!(route_key("/"), "render:/");
    }
}

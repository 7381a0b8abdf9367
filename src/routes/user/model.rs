use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::middleware::CurrentUser;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_admin: bool,
}

/// 会话记录：不透明token到用户的映射，带过期时间
#[derive(Debug, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SessionUserRow {
    user_id: String,
    name: String,
    is_admin: bool,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
    pub name: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNameRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateNameResponse {}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub admin_password: String,
}

#[derive(Debug, Serialize)]
pub struct PromoteResponse {
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {}

impl User {
    pub async fn create(pool: &PgPool, req: RegisterRequest) -> Result<Self, sqlx::Error> {
        // 原始实现对空密码回填占位值
        let password = req
            .password
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "default_pass".to_string());

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, name, password, is_admin)
            VALUES ($1, $2, $3, false)
            RETURNING user_id, name, password, is_admin
            "#,
        )
        .bind(&req.user_id)
        .bind(&req.name)
        .bind(&password)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, name, password, is_admin
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_name(
        pool: &PgPool,
        user_id: &str,
        name: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET name = $1 WHERE user_id = $2")
            .bind(name)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn promote(pool: &PgPool, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET is_admin = true WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// 注销账号：在同一个事务内级联删除名下房间（复用房间的删除顺序）、
    /// 剩余投稿及其评论、本人发出的评论、会话，最后删除用户本身。
    /// 任一步失败则整体回滚。
    pub async fn delete_account(pool: &PgPool, user_id: &str) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        // 名下房间的聊天记录
        sqlx::query(
            "DELETE FROM room_comments WHERE room_id IN (SELECT id FROM rooms WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        // 名下房间内所有投稿（含他人投稿）的评论
        sqlx::query(
            r#"
            DELETE FROM comments WHERE post_id IN (
                SELECT id FROM posts WHERE room_id IN (SELECT id FROM rooms WHERE user_id = $1)
            )
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        // 名下房间内的投稿
        sqlx::query(
            "DELETE FROM posts WHERE room_id IN (SELECT id FROM rooms WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        // 本人在其他房间的投稿及其评论
        sqlx::query(
            "DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM posts WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        // 本人发出的评论和聊天消息
        sqlx::query("DELETE FROM comments WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM room_comments WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM rooms WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Deleted account and owned content: {}", user_id);
        Ok(())
    }
}

impl Session {
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        config: &Config,
    ) -> Result<Self, sqlx::Error> {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + config.session_expiration();

        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (token, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING token, user_id, expires_at
            "#,
        )
        .bind(&token)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// 会话是否仍然有效，到期时刻本身视为已过期
    pub fn is_active(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        expires_at > now
    }

    /// token -> 当前用户。过期或不存在返回None，调用方视为匿名。
    pub async fn resolve(pool: &PgPool, token: &str) -> Result<Option<CurrentUser>, sqlx::Error> {
        let row = sqlx::query_as::<_, SessionUserRow>(
            r#"
            SELECT u.user_id, u.name, u.is_admin, s.expires_at
            FROM sessions s
            JOIN users u ON s.user_id = u.user_id
            WHERE s.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;

        let now = Utc::now();
        Ok(row
            .filter(|r| Session::is_active(r.expires_at, now))
            .map(|r| CurrentUser {
                user_id: r.user_id,
                name: r.name,
                is_admin: r.is_admin,
            }))
    }

    pub async fn revoke(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn session_is_active_until_expiry() {
        let now = Utc::now();
        assert!(Session::is_active(now + Duration::days(1), now));
        assert!(!Session::is_active(now - Duration::seconds(1), now));
        // 到期时刻本身已过期
        assert!(!Session::is_active(now, now));
    }
}

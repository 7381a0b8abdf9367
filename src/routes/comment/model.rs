use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::middleware::CurrentUser;

/// 投稿下的评论
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub post_id: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// 房间聊天消息，结构与投稿评论相同，只是挂在房间上
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct RoomComment {
    pub id: i64,
    pub content: String,
    pub room_id: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct CommentInfo {
    pub id: i64,
    pub content: String,
    pub user_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct RoomCommentInfo {
    pub id: i64,
    pub content: String,
    pub user_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: i64,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCommentRequest {
    pub comment_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomCommentRequest {
    pub room_id: i64,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentMutationResponse {}

impl Comment {
    /// 仅评论作者或管理员可以删除
    pub fn can_be_removed_by(&self, user: &CurrentUser) -> bool {
        self.user_id == user.user_id || user.is_admin
    }

    pub async fn create(
        pool: &PgPool,
        post_id: i64,
        user_id: &str,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (content, post_id, user_id, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, content, post_id, user_id, created_at
            "#,
        )
        .bind(content)
        .bind(post_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, comment_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            "SELECT id, content, post_id, user_id, created_at FROM comments WHERE id = $1",
        )
        .bind(comment_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, comment_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// 投稿评论按时间正序，对话自上而下阅读
    pub async fn list_by_post(
        pool: &PgPool,
        post_id: i64,
    ) -> Result<Vec<CommentInfo>, sqlx::Error> {
        sqlx::query_as::<_, CommentInfo>(
            r#"
            SELECT c.id, c.content, c.user_id, u.name AS author_name, c.created_at
            FROM comments c
            JOIN users u ON c.user_id = u.user_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(pool)
        .await
    }
}

impl RoomComment {
    pub fn can_be_removed_by(&self, user: &CurrentUser) -> bool {
        self.user_id == user.user_id || user.is_admin
    }

    pub async fn create(
        pool: &PgPool,
        room_id: i64,
        user_id: &str,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, RoomComment>(
            r#"
            INSERT INTO room_comments (content, room_id, user_id, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, content, room_id, user_id, created_at
            "#,
        )
        .bind(content)
        .bind(room_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, comment_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RoomComment>(
            "SELECT id, content, room_id, user_id, created_at FROM room_comments WHERE id = $1",
        )
        .bind(comment_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, comment_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM room_comments WHERE id = $1")
            .bind(comment_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// 聊天消息倒序取最近limit条，限制载荷大小
    pub async fn list_by_room(
        pool: &PgPool,
        room_id: i64,
        limit: i64,
    ) -> Result<Vec<RoomCommentInfo>, sqlx::Error> {
        sqlx::query_as::<_, RoomCommentInfo>(
            r#"
            SELECT rc.id, rc.content, rc.user_id, u.name AS author_name, rc.created_at
            FROM room_comments rc
            JOIN users u ON rc.user_id = u.user_id
            WHERE rc.room_id = $1
            ORDER BY rc.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, is_admin: bool) -> CurrentUser {
        CurrentUser {
            user_id: id.to_string(),
            name: id.to_string(),
            is_admin,
        }
    }

    #[test]
    fn author_and_admin_can_remove_comment() {
        let comment = Comment {
            id: 1,
            content: "nice!".to_string(),
            post_id: 7,
            user_id: "bob".to_string(),
            created_at: Utc::now(),
        };
        assert!(comment.can_be_removed_by(&user("bob", false)));
        assert!(comment.can_be_removed_by(&user("alice", true)));
        assert!(!comment.can_be_removed_by(&user("alice", false)));
    }

    #[test]
    fn author_and_admin_can_remove_room_comment() {
        let message = RoomComment {
            id: 2,
            content: "hello".to_string(),
            room_id: 3,
            user_id: "bob".to_string(),
            created_at: Utc::now(),
        };
        assert!(message.can_be_removed_by(&user("bob", false)));
        assert!(message.can_be_removed_by(&user("carol", true)));
        assert!(!message.can_be_removed_by(&user("carol", false)));
    }
}

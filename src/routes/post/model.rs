use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::middleware::CurrentUser;
use crate::routes::comment::CommentInfo;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub caption: Option<String>,
    pub image_url: String,
    pub room_id: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// 房间页中的投稿条目
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub caption: Option<String>,
    pub image_url: String,
    pub user_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// 投稿详情页：附带所属房间和作者
#[derive(Debug, Serialize, FromRow)]
pub struct PostDetail {
    pub id: i64,
    pub title: String,
    pub caption: Option<String>,
    pub image_url: String,
    pub room_id: i64,
    pub room_name: String,
    pub user_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// 我的投稿列表条目，附带房间名用于展示
#[derive(Debug, Serialize, FromRow)]
pub struct MyPost {
    pub id: i64,
    pub title: String,
    pub caption: Option<String>,
    pub image_url: String,
    pub room_id: i64,
    pub room_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PostPageResponse {
    pub post: PostDetail,
    pub comments: Vec<CommentInfo>,
}

#[derive(Debug, Serialize)]
pub struct DeletePostResponse {}

impl Post {
    /// 仅作者或管理员可以删除投稿
    pub fn can_be_deleted_by(&self, user: &CurrentUser) -> bool {
        self.user_id == user.user_id || user.is_admin
    }

    pub async fn create(
        pool: &PgPool,
        title: &str,
        caption: Option<&str>,
        image_url: &str,
        room_id: i64,
        user_id: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, caption, image_url, room_id, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, title, caption, image_url, room_id, user_id, created_at
            "#,
        )
        .bind(title)
        .bind(caption)
        .bind(image_url)
        .bind(room_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, post_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, caption, image_url, room_id, user_id, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_detail(
        pool: &PgPool,
        post_id: i64,
    ) -> Result<Option<PostDetail>, sqlx::Error> {
        sqlx::query_as::<_, PostDetail>(
            r#"
            SELECT
                p.id, p.title, p.caption, p.image_url, p.room_id,
                r.name AS room_name,
                p.user_id,
                u.name AS author_name,
                p.created_at
            FROM posts p
            JOIN rooms r ON p.room_id = r.id
            JOIN users u ON p.user_id = u.user_id
            WHERE p.id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(pool)
        .await
    }

    /// 先删评论再删投稿，同一事务内完成
    pub async fn delete(pool: &PgPool, post_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Deleted post and its comments: {}", post_id);
        Ok(())
    }

    pub async fn list_by_room(
        pool: &PgPool,
        room_id: i64,
    ) -> Result<Vec<PostSummary>, sqlx::Error> {
        sqlx::query_as::<_, PostSummary>(
            r#"
            SELECT
                p.id, p.title, p.caption, p.image_url, p.user_id,
                u.name AS author_name,
                p.created_at
            FROM posts p
            JOIN users u ON p.user_id = u.user_id
            WHERE p.room_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(room_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_user(pool: &PgPool, user_id: &str) -> Result<Vec<MyPost>, sqlx::Error> {
        sqlx::query_as::<_, MyPost>(
            r#"
            SELECT
                p.id, p.title, p.caption, p.image_url, p.room_id,
                r.name AS room_name,
                p.created_at
            FROM posts p
            JOIN rooms r ON p.room_id = r.id
            WHERE p.user_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(owner: &str) -> Post {
        Post {
            id: 7,
            title: "Sketch1".to_string(),
            caption: None,
            image_url: "https://blob.example/posts/1-a.png".to_string(),
            room_id: 1,
            user_id: owner.to_string(),
            created_at: Utc::now(),
        }
    }

    fn user(id: &str, is_admin: bool) -> CurrentUser {
        CurrentUser {
            user_id: id.to_string(),
            name: id.to_string(),
            is_admin,
        }
    }

    #[test]
    fn owner_can_delete_post() {
        assert!(post("alice").can_be_deleted_by(&user("alice", false)));
    }

    #[test]
    fn admin_can_delete_any_post() {
        assert!(post("alice").can_be_deleted_by(&user("bob", true)));
    }

    #[test]
    fn stranger_cannot_delete_post() {
        assert!(!post("alice").can_be_deleted_by(&user("bob", false)));
    }
}

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::middleware::CurrentUser;
use crate::routes::comment::RoomCommentInfo;
use crate::routes::post::PostSummary;
use crate::utils::{escape_like, extract_tags, strip_tags};

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub user_id: String,
}

/// 列表展示用的房间条目，带房主昵称和投稿数
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct RoomSummary {
    pub id: i64,
    pub name: String,
    pub tags: Vec<String>,
    pub user_id: String,
    pub owner_name: String,
    pub post_count: i64,
    pub is_private: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteRoomResponse {}

/// 房间页头部：锁定状态下也会返回的最小信息
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomHeader {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub owner_name: String,
}

impl RoomHeader {
    pub fn from_summary(summary: &RoomSummary) -> Self {
        RoomHeader {
            id: summary.id,
            name: summary.name.clone(),
            display_name: strip_tags(&summary.name),
            owner_name: summary.owner_name.clone(),
        }
    }
}

/// 房间页载荷。密码不匹配时返回locked状态，只露出头部信息，
/// 标签、投稿数、私密标记等详情留到解锁后。
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomPageResponse {
    pub locked: bool,
    pub room: RoomHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<RoomSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<PostSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<Vec<RoomCommentInfo>>,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub room_count: i64,
    pub post_count: i64,
    pub popular_tags: Vec<String>,
}

impl Room {
    /// 仅房主或管理员可以删除房间
    pub fn can_be_deleted_by(&self, user: &CurrentUser) -> bool {
        self.user_id == user.user_id || user.is_admin
    }

    /// 私密房间要求明文口令严格相等；无口令的房间对所有人开放
    pub fn is_unlocked(&self, pw: Option<&str>) -> bool {
        match self.password.as_deref() {
            Some(password) => pw == Some(password),
            None => true,
        }
    }

    pub async fn create(
        pool: &PgPool,
        req: CreateRoomRequest,
        user_id: String,
    ) -> Result<Self, sqlx::Error> {
        // 标签在写入时提取，空口令归一化为无口令
        let tags = extract_tags(&req.name);
        let password = req.password.filter(|p| !p.is_empty());

        sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (name, tags, password, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, tags, password, user_id
            "#,
        )
        .bind(&req.name)
        .bind(&tags)
        .bind(&password)
        .bind(&user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, room_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Room>(
            "SELECT id, name, tags, password, user_id FROM rooms WHERE id = $1",
        )
        .bind(room_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_summary(
        pool: &PgPool,
        room_id: i64,
    ) -> Result<Option<RoomSummary>, sqlx::Error> {
        sqlx::query_as::<_, RoomSummary>(
            r#"
            SELECT
                r.id, r.name, r.tags, r.user_id,
                u.name AS owner_name,
                (SELECT COUNT(*) FROM posts p WHERE p.room_id = r.id) AS post_count,
                (r.password IS NOT NULL) AS is_private
            FROM rooms r
            JOIN users u ON r.user_id = u.user_id
            WHERE r.id = $1
            "#,
        )
        .bind(room_id)
        .fetch_optional(pool)
        .await
    }

    /// 房间列表，可选按名称子串过滤，新建在前。
    /// 搜索词按字面匹配，`%`和`_`不作为通配符。
    pub async fn list(pool: &PgPool, filter: Option<&str>) -> Result<Vec<RoomSummary>, sqlx::Error> {
        sqlx::query_as::<_, RoomSummary>(
            r#"
            SELECT
                r.id, r.name, r.tags, r.user_id,
                u.name AS owner_name,
                (SELECT COUNT(*) FROM posts p WHERE p.room_id = r.id) AS post_count,
                (r.password IS NOT NULL) AS is_private
            FROM rooms r
            JOIN users u ON r.user_id = u.user_id
            WHERE ($1 = '' OR r.name LIKE '%' || $1 || '%' ESCAPE '\')
            ORDER BY r.id DESC
            "#,
        )
        .bind(filter.map(escape_like).unwrap_or_default())
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_owner(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Vec<RoomSummary>, sqlx::Error> {
        sqlx::query_as::<_, RoomSummary>(
            r#"
            SELECT
                r.id, r.name, r.tags, r.user_id,
                u.name AS owner_name,
                (SELECT COUNT(*) FROM posts p WHERE p.room_id = r.id) AS post_count,
                (r.password IS NOT NULL) AS is_private
            FROM rooms r
            JOIN users u ON r.user_id = u.user_id
            WHERE r.user_id = $1
            ORDER BY r.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// 级联删除：聊天记录 -> 投稿评论 -> 投稿 -> 房间本体，单个事务内完成，
    /// 任一步失败整体回滚，不会留下孤儿数据。
    pub async fn delete(pool: &PgPool, room_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM room_comments WHERE room_id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE room_id = $1)")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM posts WHERE room_id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Deleted room and its contents: {}", room_id);
        Ok(())
    }

    /// 首页统计：房间数、投稿数、最热门的10个标签
    pub async fn home_stats(pool: &PgPool) -> Result<HomeResponse, sqlx::Error> {
        let room_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rooms")
            .fetch_one(pool)
            .await?;
        let post_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(pool)
            .await?;
        let popular_tags: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.tag
            FROM (SELECT unnest(tags) AS tag FROM rooms) t
            GROUP BY t.tag
            ORDER BY COUNT(*) DESC, t.tag
            LIMIT 10
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(HomeResponse {
            room_count,
            post_count,
            popular_tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(owner: &str, password: Option<&str>) -> Room {
        Room {
            id: 1,
            name: "Art #sketch #ink".to_string(),
            tags: vec!["#sketch".to_string(), "#ink".to_string()],
            password: password.map(|p| p.to_string()),
            user_id: owner.to_string(),
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
    fn owner_can_delete() {
        assert!(room("alice", None).can_be_deleted_by(&user("alice", false)));
    }

    #[test]
    fn admin_can_delete_any_room() {
        assert!(room("alice", None).can_be_deleted_by(&user("bob", true)));
    }

    #[test]
    fn stranger_cannot_delete() {
        assert!(!room("alice", None).can_be_deleted_by(&user("bob", false)));
    }

    #[test]
    fn public_room_is_open() {
        assert!(room("alice", None).is_unlocked(None));
        assert!(room("alice", None).is_unlocked(Some("anything")));
    }

    #[test]
    fn private_room_requires_exact_password() {
        let r = room("alice", Some("secret"));
        assert!(r.is_unlocked(Some("secret")));
        assert!(!r.is_unlocked(Some("Secret")));
        assert!(!r.is_unlocked(Some("")));
        assert!(!r.is_unlocked(None));
    }

    fn summary() -> RoomSummary {
        RoomSummary {
            id: 1,
            name: "Art #sketch #ink".to_string(),
            tags: vec!["#sketch".to_string(), "#ink".to_string()],
            user_id: "alice".to_string(),
            owner_name: "Alice".to_string(),
            post_count: 4,
            is_private: true,
        }
    }

    #[test]
    fn room_header_carries_stripped_display_name() {
        let header = RoomHeader::from_summary(&summary());
        assert_eq!(header.name, "Art #sketch #ink");
        assert_eq!(header.display_name, "Art");
        assert_eq!(header.owner_name, "Alice");
    }

    #[test]
    fn locked_room_page_reveals_header_only() {
        let page = RoomPageResponse {
            locked: true,
            room: RoomHeader::from_summary(&summary()),
            details: None,
            posts: None,
            chat: None,
        };
        let json = serde_json::to_string(&page).unwrap();
        assert!(json.contains("\"locked\":true"));
        assert!(json.contains("\"owner_name\":\"Alice\""));
        // 投稿数、标签、私密标记和内容都不出现在锁定载荷里
        assert!(!json.contains("post_count"));
        assert!(!json.contains("tags"));
        assert!(!json.contains("is_private"));
        assert!(!json.contains("posts"));
        assert!(!json.contains("chat"));
    }
}

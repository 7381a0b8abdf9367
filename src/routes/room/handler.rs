use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState, cache,
    middleware::CurrentUser,
    routes::comment::RoomComment,
    routes::post::Post,
    utils::{error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{CreateRoomRequest, DeleteRoomResponse, Room, RoomHeader, RoomPageResponse};

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    pub room_id: i64,
    pub pw: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRoomRequest {
    pub room_id: i64,
}

#[axum::debug_handler]
pub async fn create_room(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateRoomRequest>,
) -> impl IntoResponse {
    if req.name.is_empty() {
        return (
            StatusCode::OK,
            error_to_api_response(error_codes::VALIDATION_ERROR, "房间名不能为空".to_string()),
        );
    }

    match Room::create(&state.pool, req, user.user_id).await {
        Ok(room) => {
            cache::invalidate(&state.redis, &["/", "/my-rooms"]).await;
            (StatusCode::CREATED, success_to_api_response(room))
        }
        Err(e) => {
            tracing::error!("Failed to create room: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "创建房间失败".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn delete_room(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<DeleteRoomRequest>,
) -> impl IntoResponse {
    let room = match Room::find_by_id(&state.pool, req.room_id).await {
        Ok(Some(room)) => room,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                error_to_api_response(error_codes::NOT_FOUND, "房间不存在".to_string()),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    if !room.can_be_deleted_by(&user) {
        return (
            StatusCode::FORBIDDEN,
            error_to_api_response(
                error_codes::PERMISSION_DENIED,
                "只有房主或管理员可以删除房间".to_string(),
            ),
        );
    }

    match Room::delete(&state.pool, room.id).await {
        Ok(()) => {
            let room_path = format!("/room/{}", room.id);
            cache::invalidate(&state.redis, &["/", "/my-rooms", room_path.as_str()]).await;
            (
                StatusCode::OK,
                success_to_api_response(DeleteRoomResponse {}),
            )
        }
        Err(e) => {
            tracing::error!("Failed to delete room {}: {}", room.id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "删除房间失败".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn get_room(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
) -> impl IntoResponse {
    let room = match Room::find_by_id(&state.pool, query.room_id).await {
        Ok(Some(room)) => room,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                error_to_api_response(error_codes::NOT_FOUND, "房间不存在".to_string()),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    let summary = match Room::find_summary(&state.pool, room.id).await {
        Ok(Some(summary)) => summary,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                error_to_api_response(error_codes::NOT_FOUND, "房间不存在".to_string()),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    // 私密房间口令不匹配时只返回头部提示，投稿数和标签等详情也不给
    if !room.is_unlocked(query.pw.as_deref()) {
        return (
            StatusCode::OK,
            success_to_api_response(RoomPageResponse {
                locked: true,
                room: RoomHeader::from_summary(&summary),
                details: None,
                posts: None,
                chat: None,
            }),
        );
    }

    // 解锁后的房间页走渲染缓存
    let room_path = format!("/room/{}", room.id);
    if let Some(page) = cache::get_json::<RoomPageResponse>(&state.redis, &room_path).await {
        return (StatusCode::OK, success_to_api_response(page));
    }

    let posts = match Post::list_by_room(&state.pool, room.id).await {
        Ok(posts) => posts,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };
    let chat = match RoomComment::list_by_room(&state.pool, room.id, 50).await {
        Ok(chat) => chat,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    let page = RoomPageResponse {
        locked: false,
        room: RoomHeader::from_summary(&summary),
        details: Some(summary),
        posts: Some(posts),
        chat: Some(chat),
    };
    cache::set_json(&state.redis, &room_path, &page, cache::ROOM_PAGE_CACHE_EXPIRE).await;

    (StatusCode::OK, success_to_api_response(page))
}

#[axum::debug_handler]
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    match Room::list(&state.pool, query.q.as_deref()).await {
        Ok(rooms) => (StatusCode::OK, success_to_api_response(rooms)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn my_rooms(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    match Room::list_by_owner(&state.pool, &user.user_id).await {
        Ok(rooms) => (StatusCode::OK, success_to_api_response(rooms)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn home(State(state): State<AppState>) -> impl IntoResponse {
    match Room::home_stats(&state.pool).await {
        Ok(stats) => (StatusCode::OK, success_to_api_response(stats)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

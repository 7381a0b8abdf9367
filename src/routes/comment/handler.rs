use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState, cache,
    middleware::CurrentUser,
    utils::{error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{
    Comment, CommentMutationResponse, CreateCommentRequest, CreateRoomCommentRequest,
    DeleteCommentRequest, RoomComment,
};

#[axum::debug_handler]
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateCommentRequest>,
) -> impl IntoResponse {
    // 空内容静默忽略，与原始实现一致
    if req.content.is_empty() {
        return (
            StatusCode::OK,
            success_to_api_response(CommentMutationResponse {}),
        );
    }

    match Comment::create(&state.pool, req.post_id, &user.user_id, &req.content).await {
        Ok(comment) => {
            let post_path = format!("/post/{}", comment.post_id);
            cache::invalidate(&state.redis, &[post_path.as_str()]).await;
            (
                StatusCode::OK,
                success_to_api_response(CommentMutationResponse {}),
            )
        }
        Err(e) => {
            // 父投稿不存在同样静默忽略
            if e.to_string().contains("foreign key") {
                return (
                    StatusCode::OK,
                    success_to_api_response(CommentMutationResponse {}),
                );
            }
            tracing::error!("Failed to create comment: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "发表评论失败".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<DeleteCommentRequest>,
) -> impl IntoResponse {
    // 评论不存在或无权限都静默不处理
    let comment = match Comment::find_by_id(&state.pool, req.comment_id).await {
        Ok(Some(comment)) => comment,
        Ok(None) => {
            return (
                StatusCode::OK,
                success_to_api_response(CommentMutationResponse {}),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    if !comment.can_be_removed_by(&user) {
        return (
            StatusCode::OK,
            success_to_api_response(CommentMutationResponse {}),
        );
    }

    match Comment::delete(&state.pool, comment.id).await {
        Ok(()) => {
            let post_path = format!("/post/{}", comment.post_id);
            cache::invalidate(&state.redis, &[post_path.as_str()]).await;
            (
                StatusCode::OK,
                success_to_api_response(CommentMutationResponse {}),
            )
        }
        Err(e) => {
            tracing::error!("Failed to delete comment {}: {}", comment.id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "删除评论失败".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn create_room_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateRoomCommentRequest>,
) -> impl IntoResponse {
    if req.content.is_empty() {
        return (
            StatusCode::OK,
            success_to_api_response(CommentMutationResponse {}),
        );
    }

    match RoomComment::create(&state.pool, req.room_id, &user.user_id, &req.content).await {
        Ok(message) => {
            let room_path = format!("/room/{}", message.room_id);
            cache::invalidate(&state.redis, &[room_path.as_str()]).await;
            (
                StatusCode::OK,
                success_to_api_response(CommentMutationResponse {}),
            )
        }
        Err(e) => {
            if e.to_string().contains("foreign key") {
                return (
                    StatusCode::OK,
                    success_to_api_response(CommentMutationResponse {}),
                );
            }
            tracing::error!("Failed to create room comment: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "发送消息失败".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn delete_room_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<DeleteCommentRequest>,
) -> impl IntoResponse {
    let message = match RoomComment::find_by_id(&state.pool, req.comment_id).await {
        Ok(Some(message)) => message,
        Ok(None) => {
            return (
                StatusCode::OK,
                success_to_api_response(CommentMutationResponse {}),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    if !message.can_be_removed_by(&user) {
        return (
            StatusCode::OK,
            success_to_api_response(CommentMutationResponse {}),
        );
    }

    match RoomComment::delete(&state.pool, message.id).await {
        Ok(()) => {
            let room_path = format!("/room/{}", message.room_id);
            cache::invalidate(&state.redis, &[room_path.as_str()]).await;
            (
                StatusCode::OK,
                success_to_api_response(CommentMutationResponse {}),
            )
        }
        Err(e) => {
            tracing::error!("Failed to delete room comment {}: {}", message.id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "删除消息失败".to_string()),
            )
        }
    }
}

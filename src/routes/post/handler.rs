use axum::{
    extract::{Extension, Json, Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState, cache,
    middleware::CurrentUser,
    routes::comment::Comment,
    routes::room::Room,
    utils::{blob_key, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{DeletePostResponse, Post, PostPageResponse};

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    pub post_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DeletePostRequest {
    pub post_id: i64,
}

#[axum::debug_handler]
pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut room_id: Option<i64> = None;
    let mut title = String::new();
    let mut caption: Option<String> = None;
    let mut image: Option<(String, String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Malformed multipart body: {}", e);
                return (
                    StatusCode::OK,
                    error_to_api_response(
                        error_codes::VALIDATION_ERROR,
                        "无效的表单数据".to_string(),
                    ),
                );
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "room_id" => {
                room_id = field.text().await.ok().and_then(|v| v.parse().ok());
            }
            "title" => {
                title = field.text().await.unwrap_or_default();
            }
            "caption" => {
                caption = field.text().await.ok().filter(|c| !c.is_empty());
            }
            "image" => {
                let filename = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => image = Some((filename, content_type, bytes.to_vec())),
                    Err(e) => {
                        tracing::warn!("Failed to read image field: {}", e);
                        return (
                            StatusCode::OK,
                            error_to_api_response(
                                error_codes::VALIDATION_ERROR,
                                "读取图片数据失败".to_string(),
                            ),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    let Some(room_id) = room_id else {
        return (
            StatusCode::OK,
            error_to_api_response(error_codes::VALIDATION_ERROR, "缺少room_id参数".to_string()),
        );
    };
    let Some((filename, content_type, bytes)) = image else {
        return (
            StatusCode::OK,
            error_to_api_response(error_codes::VALIDATION_ERROR, "缺少图片数据".to_string()),
        );
    };
    if bytes.is_empty() {
        return (
            StatusCode::OK,
            error_to_api_response(error_codes::VALIDATION_ERROR, "图片数据为空".to_string()),
        );
    }
    if title.is_empty() {
        title = "Untitled".to_string();
    }

    // 先确认房间存在再上传，避免在对象存储里留下孤儿图片
    match Room::find_by_id(&state.pool, room_id).await {
        Ok(Some(_)) => {}
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
    }

    let image_url = match state.blob.put(&blob_key(&filename), &content_type, bytes).await {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Failed to upload image: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "上传图片失败".to_string()),
            );
        }
    };

    match Post::create(
        &state.pool,
        &title,
        caption.as_deref(),
        &image_url,
        room_id,
        &user.user_id,
    )
    .await
    {
        Ok(post) => {
            let room_path = format!("/room/{}", room_id);
            cache::invalidate(&state.redis, &[room_path.as_str()]).await;
            (StatusCode::CREATED, success_to_api_response(post))
        }
        Err(e) => {
            tracing::error!("Failed to create post: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "保存投稿失败".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<DeletePostRequest>,
) -> impl IntoResponse {
    let post = match Post::find_by_id(&state.pool, req.post_id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                error_to_api_response(error_codes::NOT_FOUND, "投稿不存在".to_string()),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    if !post.can_be_deleted_by(&user) {
        return (
            StatusCode::FORBIDDEN,
            error_to_api_response(
                error_codes::PERMISSION_DENIED,
                "只有作者或管理员可以删除投稿".to_string(),
            ),
        );
    }

    match Post::delete(&state.pool, post.id).await {
        Ok(()) => {
            let room_path = format!("/room/{}", post.room_id);
            let post_path = format!("/post/{}", post.id);
            cache::invalidate(&state.redis, &[room_path.as_str(), post_path.as_str()]).await;
            (
                StatusCode::OK,
                success_to_api_response(DeletePostResponse {}),
            )
        }
        Err(e) => {
            tracing::error!("Failed to delete post {}: {}", post.id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "删除投稿失败".to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn get_post(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
) -> impl IntoResponse {
    let post = match Post::find_detail(&state.pool, query.post_id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                error_to_api_response(error_codes::NOT_FOUND, "投稿不存在".to_string()),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    match Comment::list_by_post(&state.pool, post.id).await {
        Ok(comments) => (
            StatusCode::OK,
            success_to_api_response(PostPageResponse { post, comments }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn my_posts(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    match Post::list_by_user(&state.pool, &user.user_id).await {
        Ok(posts) => (StatusCode::OK, success_to_api_response(posts)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::{
        Router,
        body::{Body, to_bytes},
        extract::DefaultBodyLimit,
        http::{Request, header},
        routing::post,
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn create_post_accepts_images_beyond_default_body_limit() {
        let state = test_support::state();
        let user = CurrentUser {
            user_id: "alice".to_string(),
            name: "Alice".to_string(),
            is_admin: false,
        };
        let app = Router::new()
            .route(
                "/posts/create",
                post(create_post).layer(DefaultBodyLimit::max(state.config.max_upload_bytes())),
            )
            .layer(axum::Extension(user))
            .with_state(state);

        // 3MB图片，超过axum默认的2MB请求体上限
        let boundary = "xBOUNDARYx";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; \
                 filename=\"big.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&vec![0u8; 3 * 1024 * 1024]);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/posts/create")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        // 请求体被完整读取，随后因缺少room_id被参数校验拦下，
        // 而不是被体积上限拒绝成"无效的表单数据"
        assert!(text.contains("缺少room_id参数"), "unexpected body: {text}");
    }
}

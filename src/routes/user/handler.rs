use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{
    AppState, cache,
    middleware::{CurrentUser, SESSION_COOKIE},
    utils::{error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{
    DeleteAccountResponse, LogoutResponse, PromoteRequest, PromoteResponse, RegisterRequest,
    RegisterResponse, Session, UpdateNameRequest, UpdateNameResponse, User,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    // 检查用户ID格式
    if req.user_id.is_empty()
        || !req.user_id.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return (
            jar,
            (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::VALIDATION_ERROR,
                    "用户ID格式无效，只允许使用字母、数字和下划线".to_string(),
                ),
            ),
        );
    }
    if req.name.is_empty() {
        return (
            jar,
            (
                StatusCode::OK,
                error_to_api_response(
                    error_codes::VALIDATION_ERROR,
                    "显示名不能为空".to_string(),
                ),
            ),
        );
    }

    match User::create(&state.pool, req).await {
        Ok(user) => {
            // 注册成功后建立长期会话
            match Session::create(&state.pool, &user.user_id, &state.config).await {
                Ok(session) => {
                    let cookie = Cookie::build((SESSION_COOKIE, session.token))
                        .path("/")
                        .http_only(true)
                        .max_age(time::Duration::days(state.config.session_expiration_days))
                        .build();
                    cache::invalidate(&state.redis, &["/"]).await;
                    (
                        jar.add(cookie),
                        (
                            StatusCode::OK,
                            success_to_api_response(RegisterResponse {
                                user_id: user.user_id,
                                name: user.name,
                            }),
                        ),
                    )
                }
                Err(e) => {
                    tracing::error!("Failed to create session: {}", e);
                    (
                        jar,
                        (
                            StatusCode::OK,
                            error_to_api_response(
                                error_codes::INTERNAL_ERROR,
                                "创建会话失败".to_string(),
                            ),
                        ),
                    )
                }
            }
        }
        Err(e) => {
            // 重复注册不得改动已有用户，也不得发放会话
            if is_unique_violation(&e) {
                (
                    jar,
                    (
                        StatusCode::OK,
                        error_to_api_response(error_codes::USER_EXISTS, "用户已存在".to_string()),
                    ),
                )
            } else {
                tracing::error!("Failed to register user: {}", e);
                (
                    jar,
                    (
                        StatusCode::OK,
                        error_to_api_response(
                            error_codes::INTERNAL_ERROR,
                            "创建用户失败".to_string(),
                        ),
                    ),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn update_name(
    Extension(user): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<UpdateNameRequest>,
) -> impl IntoResponse {
    // 空名称静默忽略，与原始实现一致
    if req.name.is_empty() {
        return (StatusCode::OK, success_to_api_response(UpdateNameResponse {}));
    }

    match User::update_name(&state.pool, &user.user_id, &req.name).await {
        Ok(()) => {
            cache::invalidate(&state.redis, &["/"]).await;
            (StatusCode::OK, success_to_api_response(UpdateNameResponse {}))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn promote(
    Extension(user): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<PromoteRequest>,
) -> impl IntoResponse {
    // 管理员口令要求严格相等，任何不匹配都直接拒绝
    if req.admin_password != state.config.admin_master_password {
        return (
            StatusCode::UNAUTHORIZED,
            error_to_api_response(error_codes::AUTH_FAILED, "管理员口令错误".to_string()),
        );
    }

    match User::promote(&state.pool, &user.user_id).await {
        Ok(()) => {
            tracing::info!("Promoted user to admin: {}", user.user_id);
            cache::invalidate(&state.redis, &["/"]).await;
            (
                StatusCode::OK,
                success_to_api_response(PromoteResponse { is_admin: true }),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Err(e) = Session::revoke(&state.pool, cookie.value()).await {
            tracing::error!("Failed to revoke session: {}", e);
        }
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        (StatusCode::OK, success_to_api_response(LogoutResponse {})),
    )
}

#[axum::debug_handler]
pub async fn delete_account(
    Extension(user): Extension<CurrentUser>,
    State(state): State<AppState>,
    jar: CookieJar,
) -> impl IntoResponse {
    match User::delete_account(&state.pool, &user.user_id).await {
        Ok(()) => {
            cache::invalidate(&state.redis, &["/", "/my-rooms", "/my-illusts"]).await;
            (
                jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
                (
                    StatusCode::OK,
                    success_to_api_response(DeleteAccountResponse {}),
                ),
            )
        }
        Err(e) => {
            tracing::error!("Failed to delete account {}: {}", user.user_id, e);
            (
                jar,
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(error_codes::INTERNAL_ERROR, "注销账号失败".to_string()),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn me(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    (StatusCode::OK, success_to_api_response(user))
}

/// 用户ID主键冲突，即重复注册
fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.to_string().contains("unique constraint")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, header},
        routing::post,
    };
    use tower::ServiceExt;

    #[test]
    fn duplicate_registration_is_classified() {
        let dup = sqlx::Error::Protocol(
            "duplicate key value violates unique constraint \"users_pkey\"".into(),
        );
        assert!(is_unique_violation(&dup));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn failed_registration_issues_no_session_cookie() {
        let app = Router::new()
            .route("/users/register", post(register))
            .with_state(test_support::state());

        // 惰性连接池连不上库，注册走失败分支
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/users/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"user_id":"alice","name":"Alice"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("创建用户失败"), "unexpected body: {text}");
    }
}

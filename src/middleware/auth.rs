use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use sqlx::FromRow;

use crate::{
    AppState,
    routes::user::Session,
    utils::{error_codes, error_to_api_response},
};

/// 会话cookie的名称，cookie值只携带不透明token
pub const SESSION_COOKIE: &str = "nooc_session";

/// 认证中间件解析出的当前用户，注入到请求扩展中
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CurrentUser {
    pub user_id: String,
    pub name: String,
    pub is_admin: bool,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // 从cookie中取出会话token
    let jar = CookieJar::from_headers(request.headers());
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return unauthorized(),
    };

    // 查会话表解析用户，过期或不存在视为匿名
    match Session::resolve(&state.pool, &token).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => unauthorized(),
        Err(e) => {
            tracing::error!("Failed to resolve session: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>(error_codes::INTERNAL_ERROR, "数据库错误".to_string()),
            )
                .into_response()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        error_to_api_response::<()>(error_codes::AUTH_FAILED, "未登录或会话已过期".to_string()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::to_bytes, routing::get};
    use tower::ServiceExt;

    async fn guarded() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn requests_without_session_cookie_are_rejected() {
        let state = crate::test_support::state();
        let app = Router::new()
            .route("/guarded", get(guarded))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/guarded")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("未登录或会话已过期"));
    }
}

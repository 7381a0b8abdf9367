use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::error;

// 错误信封是小段JSON，64KB足以完整记录而不截断
const MAX_LOGGED_BODY_BYTES: usize = 64 * 1024;

/// 记录5xx响应的方法、路径和响应体，读完后原样还给客户端
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    if response.status().is_server_error() {
        let (mut parts, body) = response.into_parts();
        let bytes = match to_bytes(body, MAX_LOGGED_BODY_BYTES).await {
            Ok(b) => b,
            Err(e) => {
                error!(
                    "Failed to read error response body for {} {}: {}",
                    method, path, e
                );
                return Response::from_parts(parts, Body::empty());
            }
        };
        let body_str = String::from_utf8_lossy(&bytes);

        error!(
            "Server error occurred - {} {} - Status: {}, Body: {}",
            method, path, parts.status, body_str
        );

        // 重置body以便重新构建响应
        parts.headers.remove(axum::http::header::CONTENT_LENGTH);
        Response::from_parts(parts, Body::from(bytes))
    } else {
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "fine"
    }

    async fn failing_handler() -> (StatusCode, &'static str) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"code":5000,"msg":"内部服务器错误","resp_data":null}"#,
        )
    }

    fn app() -> Router {
        Router::new()
            .route("/ok", get(ok_handler))
            .route("/boom", get(failing_handler))
            .layer(axum::middleware::from_fn(log_errors))
    }

    #[tokio::test]
    async fn success_responses_pass_through_untouched() {
        let response = app()
            .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"fine");
    }

    #[tokio::test]
    async fn error_bodies_are_preserved_after_logging() {
        let response = app()
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("内部服务器错误"));
    }
}
